use super::goal::{CancelReason, GoalFailure, GoalId, OutcomeRecord};
use super::state::SequenceState;
use super::types::{Pose, Waypoint};
use crate::common::DomainEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WaypointFollowingEvent {
    WaypointEnqueued {
        controller_id: String,
        waypoint: Waypoint,
        priority: bool,
        timestamp: DateTime<Utc>,
    },
    RouteStarted {
        controller_id: String,
        waypoint_count: usize,
        timestamp: DateTime<Utc>,
    },
    StartRejected {
        controller_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    StateChanged {
        controller_id: String,
        from: SequenceState,
        to: SequenceState,
        timestamp: DateTime<Utc>,
    },
    GoalDispatched {
        controller_id: String,
        goal_id: GoalId,
        waypoint_index: u64,
        attempt: u32,
        pose: Pose,
        tolerance: Option<f64>,
        timestamp: DateTime<Utc>,
    },
    GoalFeedback {
        controller_id: String,
        goal_id: GoalId,
        pose: Pose,
        distance_remaining: f64,
        timestamp: DateTime<Utc>,
    },
    GoalCancelRequested {
        controller_id: String,
        goal_id: GoalId,
        reason: CancelReason,
        timestamp: DateTime<Utc>,
    },
    AttemptFailed {
        controller_id: String,
        goal_id: GoalId,
        waypoint_index: u64,
        attempt: u32,
        failure: GoalFailure,
        timestamp: DateTime<Utc>,
    },
    OutcomeRecorded {
        controller_id: String,
        record: OutcomeRecord,
        timestamp: DateTime<Utc>,
    },
    RouteFinished {
        controller_id: String,
        succeeded: u64,
        failed: u64,
        timestamp: DateTime<Utc>,
    },
}

impl WaypointFollowingEvent {
    /// High-rate events that are only useful live, not in the journal.
    pub fn is_advisory(&self) -> bool {
        matches!(self, WaypointFollowingEvent::GoalFeedback { .. })
    }
}

impl DomainEvent for WaypointFollowingEvent {
    fn event_type(&self) -> &'static str {
        match self {
            WaypointFollowingEvent::WaypointEnqueued { .. } => "WaypointEnqueued",
            WaypointFollowingEvent::RouteStarted { .. } => "RouteStarted",
            WaypointFollowingEvent::StartRejected { .. } => "StartRejected",
            WaypointFollowingEvent::StateChanged { .. } => "StateChanged",
            WaypointFollowingEvent::GoalDispatched { .. } => "GoalDispatched",
            WaypointFollowingEvent::GoalFeedback { .. } => "GoalFeedback",
            WaypointFollowingEvent::GoalCancelRequested { .. } => "GoalCancelRequested",
            WaypointFollowingEvent::AttemptFailed { .. } => "AttemptFailed",
            WaypointFollowingEvent::OutcomeRecorded { .. } => "OutcomeRecorded",
            WaypointFollowingEvent::RouteFinished { .. } => "RouteFinished",
        }
    }

    fn aggregate_id(&self) -> &str {
        match self {
            WaypointFollowingEvent::WaypointEnqueued { controller_id, .. } => controller_id,
            WaypointFollowingEvent::RouteStarted { controller_id, .. } => controller_id,
            WaypointFollowingEvent::StartRejected { controller_id, .. } => controller_id,
            WaypointFollowingEvent::StateChanged { controller_id, .. } => controller_id,
            WaypointFollowingEvent::GoalDispatched { controller_id, .. } => controller_id,
            WaypointFollowingEvent::GoalFeedback { controller_id, .. } => controller_id,
            WaypointFollowingEvent::GoalCancelRequested { controller_id, .. } => controller_id,
            WaypointFollowingEvent::AttemptFailed { controller_id, .. } => controller_id,
            WaypointFollowingEvent::OutcomeRecorded { controller_id, .. } => controller_id,
            WaypointFollowingEvent::RouteFinished { controller_id, .. } => controller_id,
        }
    }

    fn event_version(&self) -> u64 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            WaypointFollowingEvent::WaypointEnqueued { timestamp, .. } => *timestamp,
            WaypointFollowingEvent::RouteStarted { timestamp, .. } => *timestamp,
            WaypointFollowingEvent::StartRejected { timestamp, .. } => *timestamp,
            WaypointFollowingEvent::StateChanged { timestamp, .. } => *timestamp,
            WaypointFollowingEvent::GoalDispatched { timestamp, .. } => *timestamp,
            WaypointFollowingEvent::GoalFeedback { timestamp, .. } => *timestamp,
            WaypointFollowingEvent::GoalCancelRequested { timestamp, .. } => *timestamp,
            WaypointFollowingEvent::AttemptFailed { timestamp, .. } => *timestamp,
            WaypointFollowingEvent::OutcomeRecorded { timestamp, .. } => *timestamp,
            WaypointFollowingEvent::RouteFinished { timestamp, .. } => *timestamp,
        }
    }
}
