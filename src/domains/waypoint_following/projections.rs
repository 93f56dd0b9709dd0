use super::events::WaypointFollowingEvent;
use super::goal::{GoalId, OutcomeKind, OutcomeRecord};
use super::state::SequenceState;
use super::types::{Pose, Waypoint};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::watch;

/// The goal currently in flight, as seen by operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveGoalView {
    pub goal_id: GoalId,
    pub waypoint_index: u64,
    pub target: Pose,
    pub tolerance: Option<f64>,
    pub attempt: u32,
    pub current_pose: Option<Pose>,
    pub distance_remaining: Option<f64>,
    pub dispatched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeTotals {
    pub succeeded: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub route_aborted: u64,
}

impl OutcomeTotals {
    pub fn total(&self) -> u64 {
        self.succeeded + self.failed + self.cancelled + self.route_aborted
    }
}

/// Read-only projection of the controller: state, active goal, remaining
/// route and the most recent outcomes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub controller_id: String,
    pub state: SequenceState,
    pub active_goal: Option<ActiveGoalView>,
    /// Pending waypoints in dispatch order, for display.
    pub remaining: Vec<Waypoint>,
    pub recent_outcomes: VecDeque<OutcomeRecord>,
    pub totals: OutcomeTotals,
    pub waypoints_seen: u64,
    pub last_failure: Option<String>,
    pub last_rejection: Option<String>,
    pub last_updated: DateTime<Utc>,
    #[serde(skip)]
    history_len: usize,
}

impl StatusReport {
    pub fn new(controller_id: String, history_len: usize) -> Self {
        Self {
            controller_id,
            state: SequenceState::Idle,
            active_goal: None,
            remaining: Vec::new(),
            recent_outcomes: VecDeque::new(),
            totals: OutcomeTotals::default(),
            waypoints_seen: 0,
            last_failure: None,
            last_rejection: None,
            last_updated: Utc::now(),
            history_len: history_len.max(1),
        }
    }

    pub fn remaining_len(&self) -> usize {
        self.remaining.len()
    }

    pub fn last_outcome(&self) -> Option<&OutcomeRecord> {
        self.recent_outcomes.back()
    }

    /// One line summary for logs and the operator console.
    pub fn summary(&self) -> String {
        let active = match &self.active_goal {
            Some(goal) => format!(
                "#{} attempt {} -> ({:.2}, {:.2})",
                goal.waypoint_index, goal.attempt, goal.target.position.x, goal.target.position.y
            ),
            None => "none".to_string(),
        };
        format!(
            "state={} ({:?}) active={} remaining={} succeeded={} failed={} cancelled={}",
            self.state.as_str(),
            self.state.phase(),
            active,
            self.remaining.len(),
            self.totals.succeeded,
            self.totals.failed,
            self.totals.cancelled + self.totals.route_aborted
        )
    }

    pub fn apply_event(&mut self, event: &WaypointFollowingEvent) {
        match event {
            WaypointFollowingEvent::WaypointEnqueued {
                waypoint, priority, timestamp, ..
            } => {
                if *priority {
                    self.remaining.insert(0, *waypoint);
                } else {
                    self.remaining.push(*waypoint);
                }
                self.waypoints_seen += 1;
                self.last_updated = *timestamp;
            }
            WaypointFollowingEvent::RouteStarted { timestamp, .. } => {
                self.last_rejection = None;
                self.last_updated = *timestamp;
            }
            WaypointFollowingEvent::StartRejected { reason, timestamp, .. } => {
                self.last_rejection = Some(reason.clone());
                self.last_updated = *timestamp;
            }
            WaypointFollowingEvent::StateChanged { to, timestamp, .. } => {
                self.state = *to;
                self.last_updated = *timestamp;
            }
            WaypointFollowingEvent::GoalDispatched {
                goal_id,
                waypoint_index,
                attempt,
                pose,
                tolerance,
                timestamp,
                ..
            } => {
                self.remaining.retain(|w| w.index != *waypoint_index);
                self.active_goal = Some(ActiveGoalView {
                    goal_id: *goal_id,
                    waypoint_index: *waypoint_index,
                    target: *pose,
                    tolerance: *tolerance,
                    attempt: *attempt,
                    current_pose: None,
                    distance_remaining: None,
                    dispatched_at: *timestamp,
                });
                self.last_updated = *timestamp;
            }
            WaypointFollowingEvent::GoalFeedback {
                goal_id,
                pose,
                distance_remaining,
                timestamp,
                ..
            } => {
                if let Some(active) = self.active_goal.as_mut().filter(|a| a.goal_id == *goal_id) {
                    active.current_pose = Some(*pose);
                    active.distance_remaining = Some(*distance_remaining);
                }
                self.last_updated = *timestamp;
            }
            WaypointFollowingEvent::GoalCancelRequested { timestamp, .. } => {
                self.last_updated = *timestamp;
            }
            WaypointFollowingEvent::AttemptFailed {
                goal_id,
                waypoint_index,
                attempt,
                failure,
                timestamp,
                ..
            } => {
                self.clear_active(goal_id);
                self.last_failure = Some(format!(
                    "waypoint #{} attempt {}: {}",
                    waypoint_index, attempt, failure
                ));
                self.last_updated = *timestamp;
            }
            WaypointFollowingEvent::OutcomeRecorded { record, timestamp, .. } => {
                self.remaining.retain(|w| w.index != record.waypoint_index);
                if self
                    .active_goal
                    .as_ref()
                    .is_some_and(|a| a.waypoint_index == record.waypoint_index)
                {
                    self.active_goal = None;
                }
                match &record.kind {
                    OutcomeKind::Succeeded => self.totals.succeeded += 1,
                    OutcomeKind::FailedExhausted { failure } => {
                        self.totals.failed += 1;
                        self.last_failure = Some(format!(
                            "waypoint #{} gave up after {} attempts: {}",
                            record.waypoint_index, record.attempts, failure
                        ));
                    }
                    OutcomeKind::OperatorCancelled => self.totals.cancelled += 1,
                    OutcomeKind::RouteAborted => self.totals.route_aborted += 1,
                }
                self.recent_outcomes.push_back(record.clone());
                while self.recent_outcomes.len() > self.history_len {
                    self.recent_outcomes.pop_front();
                }
                self.last_updated = *timestamp;
            }
            WaypointFollowingEvent::RouteFinished { timestamp, .. } => {
                self.active_goal = None;
                self.last_updated = *timestamp;
            }
        }
    }

    /// A failed goal goes back to the front of the remaining list until it
    /// is either re-dispatched or gets its outcome.
    fn clear_active(&mut self, goal_id: &GoalId) {
        if !self.active_goal.as_ref().is_some_and(|a| a.goal_id == *goal_id) {
            return;
        }
        let Some(goal) = self.active_goal.take() else {
            return;
        };
        if self.remaining.iter().all(|w| w.index != goal.waypoint_index) {
            self.remaining.insert(
                0,
                Waypoint {
                    index: goal.waypoint_index,
                    pose: goal.target,
                    tolerance: goal.tolerance,
                },
            );
        }
    }
}

/// Owns the status projection and pushes it to subscribers.
pub struct StatusReporter {
    report: StatusReport,
    publisher: watch::Sender<StatusReport>,
}

impl StatusReporter {
    pub fn new(controller_id: String, history_len: usize) -> (Self, watch::Receiver<StatusReport>) {
        let report = StatusReport::new(controller_id, history_len);
        let (publisher, receiver) = watch::channel(report.clone());
        (Self { report, publisher }, receiver)
    }

    pub fn apply(&mut self, event: &WaypointFollowingEvent) {
        self.report.apply_event(event);
    }

    pub fn report(&self) -> &StatusReport {
        &self.report
    }

    /// Pushes the current projection, even with no subscribers left.
    pub fn publish(&self) {
        self.publisher.send_replace(self.report.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::waypoint_following::goal::GoalFailure;
    use std::time::Duration;

    fn waypoint(index: u64, x: f64) -> Waypoint {
        Waypoint {
            index,
            pose: Pose::from_point(x, 0.0, 0.0),
            tolerance: None,
        }
    }

    fn enqueued(w: Waypoint, priority: bool) -> WaypointFollowingEvent {
        WaypointFollowingEvent::WaypointEnqueued {
            controller_id: "c".to_string(),
            waypoint: w,
            priority,
            timestamp: Utc::now(),
        }
    }

    fn outcome(w: &Waypoint, kind: OutcomeKind) -> WaypointFollowingEvent {
        WaypointFollowingEvent::OutcomeRecorded {
            controller_id: "c".to_string(),
            record: OutcomeRecord::new(w, kind, 1, Duration::from_secs(1)),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn remaining_tracks_enqueue_dispatch_and_outcome() {
        let mut report = StatusReport::new("c".to_string(), 5);
        let a = waypoint(0, 1.0);
        let b = waypoint(1, 2.0);
        let p = waypoint(2, 9.0);
        report.apply_event(&enqueued(a, false));
        report.apply_event(&enqueued(b, false));
        report.apply_event(&enqueued(p, true));

        let order: Vec<u64> = report.remaining.iter().map(|w| w.index).collect();
        assert_eq!(order, vec![2, 0, 1]);

        let goal_id = GoalId::new();
        report.apply_event(&WaypointFollowingEvent::GoalDispatched {
            controller_id: "c".to_string(),
            goal_id,
            waypoint_index: 2,
            attempt: 1,
            pose: p.pose,
            tolerance: None,
            timestamp: Utc::now(),
        });
        assert_eq!(report.remaining_len(), 2);
        assert_eq!(report.active_goal.as_ref().unwrap().waypoint_index, 2);

        report.apply_event(&outcome(&p, OutcomeKind::Succeeded));
        assert!(report.active_goal.is_none());
        assert_eq!(report.totals.succeeded, 1);
        assert_eq!(report.waypoints_seen, 3);
    }

    #[test]
    fn failed_attempt_stays_pending_until_its_outcome() {
        let mut report = StatusReport::new("c".to_string(), 5);
        let w = Waypoint {
            index: 0,
            pose: Pose::from_point(3.0, 0.0, 0.0),
            tolerance: Some(0.3),
        };
        let next = waypoint(1, 4.0);
        report.apply_event(&enqueued(w, false));
        report.apply_event(&enqueued(next, false));

        let goal_id = GoalId::new();
        report.apply_event(&WaypointFollowingEvent::GoalDispatched {
            controller_id: "c".to_string(),
            goal_id,
            waypoint_index: 0,
            attempt: 1,
            pose: w.pose,
            tolerance: w.tolerance,
            timestamp: Utc::now(),
        });
        assert_eq!(report.active_goal.as_ref().unwrap().tolerance, Some(0.3));

        report.apply_event(&WaypointFollowingEvent::AttemptFailed {
            controller_id: "c".to_string(),
            goal_id,
            waypoint_index: 0,
            attempt: 1,
            failure: GoalFailure::Aborted("blocked".to_string()),
            timestamp: Utc::now(),
        });
        assert!(report.active_goal.is_none());
        assert_eq!(report.remaining, vec![w, next]);

        report.apply_event(&outcome(
            &w,
            OutcomeKind::FailedExhausted {
                failure: GoalFailure::Aborted("blocked".to_string()),
            },
        ));
        assert_eq!(report.remaining, vec![next]);
    }

    #[test]
    fn history_is_bounded_to_last_n() {
        let mut report = StatusReport::new("c".to_string(), 2);
        for i in 0..5 {
            let w = waypoint(i, i as f64);
            report.apply_event(&enqueued(w, false));
            report.apply_event(&outcome(&w, OutcomeKind::OperatorCancelled));
        }
        assert_eq!(report.recent_outcomes.len(), 2);
        assert_eq!(report.last_outcome().unwrap().waypoint_index, 4);
        assert_eq!(report.totals.total(), 5);
    }

    #[test]
    fn exhausted_failure_is_surfaced() {
        let mut report = StatusReport::new("c".to_string(), 5);
        let w = waypoint(0, 1.0);
        report.apply_event(&enqueued(w, false));
        report.apply_event(&outcome(
            &w,
            OutcomeKind::FailedExhausted {
                failure: GoalFailure::Aborted("no path".to_string()),
            },
        ));
        assert_eq!(report.totals.failed, 1);
        assert!(report.last_failure.as_ref().unwrap().contains("no path"));
    }

    #[test]
    fn reporter_publishes_to_subscribers() {
        let (mut reporter, rx) = StatusReporter::new("c".to_string(), 5);
        reporter.apply(&WaypointFollowingEvent::StateChanged {
            controller_id: "c".to_string(),
            from: SequenceState::Idle,
            to: SequenceState::Dispatching,
            timestamp: Utc::now(),
        });
        assert_eq!(rx.borrow().state, SequenceState::Idle);
        reporter.publish();
        assert_eq!(rx.borrow().state, SequenceState::Dispatching);
        assert_eq!(reporter.report().state, SequenceState::Dispatching);
    }
}
