use super::types::{Pose, Waypoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

/// Handle identifying one submission to the navigation service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GoalId(pub Uuid);

impl GoalId {
    pub fn new() -> Self {
        GoalId(Uuid::new_v4())
    }
}

impl Default for GoalId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GoalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the controller hands to the navigation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalRequest {
    pub goal_id: GoalId,
    pub frame_id: String,
    pub pose: Pose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalStatus {
    Pending,
    Active,
    Succeeded,
    Failed,
    Cancelled,
}

/// Why a single attempt did not reach its waypoint.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GoalFailure {
    #[error("goal rejected: {0}")]
    Rejected(String),

    #[error("goal aborted: {0}")]
    Aborted(String),

    #[error("no progress from navigation service for {after:?}")]
    Timeout { after: Duration },
}

/// Why the controller asked the service to cancel the active goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    Operator,
    WithinTolerance,
    /// The watchdog gave up on a silent goal.
    Timeout { after: Duration },
}

/// Advisory progress report. May be coalesced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub goal_id: GoalId,
    pub pose: Pose,
    pub stamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TerminalOutcome {
    Succeeded,
    Aborted(String),
    Cancelled,
}

/// Exactly one of these ends every accepted goal. Never dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerminalEvent {
    pub goal_id: GoalId,
    pub outcome: TerminalOutcome,
}

/// The single goal currently delegated to the navigation service.
#[derive(Debug, Clone)]
pub struct Goal {
    pub id: GoalId,
    pub waypoint: Waypoint,
    pub attempt: u32,
    pub status: GoalStatus,
    pub dispatched_at: DateTime<Utc>,
    /// When the first attempt for this waypoint was dispatched.
    pub first_dispatched: Instant,
    pub last_activity: Instant,
    pub last_feedback: Option<Feedback>,
    pub cancel_requested: Option<CancelReason>,
}

impl Goal {
    pub fn new(waypoint: Waypoint, attempt: u32, first_dispatched: Instant) -> Self {
        Self {
            id: GoalId::new(),
            waypoint,
            attempt,
            status: GoalStatus::Pending,
            dispatched_at: Utc::now(),
            first_dispatched,
            last_activity: Instant::now(),
            last_feedback: None,
            cancel_requested: None,
        }
    }

    pub fn mark_active(&mut self) {
        self.status = GoalStatus::Active;
        self.last_activity = Instant::now();
    }

    pub fn record_feedback(&mut self, feedback: Feedback) {
        self.last_feedback = Some(feedback);
        self.last_activity = Instant::now();
    }

    pub fn elapsed(&self) -> Duration {
        self.first_dispatched.elapsed()
    }

    /// Planar distance from the last reported pose to the target.
    pub fn distance_remaining(&self) -> Option<f64> {
        self.last_feedback
            .as_ref()
            .map(|fb| fb.pose.planar_distance(&self.waypoint.pose))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OutcomeKind {
    Succeeded,
    FailedExhausted { failure: GoalFailure },
    OperatorCancelled,
    /// Never attempted because an earlier waypoint exhausted its retries
    /// under the abort-route policy.
    RouteAborted,
}

impl OutcomeKind {
    pub fn label(&self) -> &'static str {
        match self {
            OutcomeKind::Succeeded => "succeeded",
            OutcomeKind::FailedExhausted { .. } => "failed-exhausted",
            OutcomeKind::OperatorCancelled => "operator-cancelled",
            OutcomeKind::RouteAborted => "route-aborted",
        }
    }
}

/// Immutable log entry, one per waypoint that ever entered the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    pub waypoint_index: u64,
    pub pose: Pose,
    pub kind: OutcomeKind,
    pub attempts: u32,
    pub elapsed: Duration,
    pub recorded_at: DateTime<Utc>,
}

impl OutcomeRecord {
    pub fn new(waypoint: &Waypoint, kind: OutcomeKind, attempts: u32, elapsed: Duration) -> Self {
        Self {
            waypoint_index: waypoint.index,
            pose: waypoint.pose,
            kind,
            attempts,
            elapsed,
            recorded_at: Utc::now(),
        }
    }
}
