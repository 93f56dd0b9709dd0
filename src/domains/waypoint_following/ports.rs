use super::actors::ControllerMessage;
use super::goal::{Feedback, GoalId, GoalRequest, TerminalEvent, TerminalOutcome};
use super::types::{Pose, WaypointSpec};
use crate::common::DomainResult;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// The navigation service refused a submission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason}")]
pub struct GoalRejected {
    pub reason: String,
}

impl GoalRejected {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Port to the external move-to-pose service.
///
/// `submit` returns once the service has accepted or refused the goal. After
/// acceptance the adapter reports progress and exactly one terminal event
/// through the supplied sink. `cancel` is a request only; the terminal event
/// is authoritative.
#[async_trait]
pub trait GoalClient: Send + Sync {
    async fn submit(&self, request: GoalRequest, events: NavigationEventSink) -> Result<(), GoalRejected>;

    async fn cancel(&self, goal_id: GoalId);
}

/// Where a navigation adapter delivers events for one goal.
///
/// Terminal events share the controller's ordered inbox with operator
/// commands and are never dropped. Feedback goes through a latest-wins slot.
#[derive(Clone)]
pub struct NavigationEventSink {
    goal_id: GoalId,
    inbox: mpsc::Sender<ControllerMessage>,
    feedback: Arc<watch::Sender<Option<Feedback>>>,
}

impl NavigationEventSink {
    pub(crate) fn new(
        goal_id: GoalId,
        inbox: mpsc::Sender<ControllerMessage>,
        feedback: Arc<watch::Sender<Option<Feedback>>>,
    ) -> Self {
        Self {
            goal_id,
            inbox,
            feedback,
        }
    }

    pub fn goal_id(&self) -> GoalId {
        self.goal_id
    }

    pub fn feedback(&self, pose: Pose) {
        self.feedback.send_replace(Some(Feedback {
            goal_id: self.goal_id,
            pose,
            stamp: Utc::now(),
        }));
    }

    pub async fn succeeded(&self) {
        self.terminal(TerminalOutcome::Succeeded).await;
    }

    pub async fn aborted(&self, reason: impl Into<String>) {
        self.terminal(TerminalOutcome::Aborted(reason.into())).await;
    }

    pub async fn cancelled(&self) {
        self.terminal(TerminalOutcome::Cancelled).await;
    }

    async fn terminal(&self, outcome: TerminalOutcome) {
        let event = TerminalEvent {
            goal_id: self.goal_id,
            outcome,
        };
        if self.inbox.send(ControllerMessage::Navigation(event)).await.is_err() {
            tracing::warn!("Controller gone, terminal event for goal {} not delivered", self.goal_id);
        }
    }
}

/// Port for anything that can supply an ordered route in one shot.
pub trait WaypointSource: Send + Sync {
    fn load_waypoints(&self) -> DomainResult<Vec<WaypointSpec>>;

    fn describe(&self) -> String;
}
