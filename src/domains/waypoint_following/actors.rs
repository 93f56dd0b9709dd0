use super::goal::TerminalEvent;
use super::projections::StatusReport;
use super::state::SequenceState;
use super::types::{Waypoint, WaypointSpec};
use crate::common::{ApplicationError, ApplicationResult, DomainResult};
use tokio::sync::{mpsc, oneshot, watch};

/// Operator intent, consumed in order by the controller loop.
#[derive(Debug)]
pub enum Command {
    Start {
        waypoints: Vec<WaypointSpec>,
        reply: oneshot::Sender<DomainResult<usize>>,
    },
    Pause,
    Resume,
    Cancel,
    InsertWaypoint {
        waypoint: WaypointSpec,
        priority: bool,
        reply: oneshot::Sender<DomainResult<Waypoint>>,
    },
    Shutdown,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Start { .. } => "Start",
            Command::Pause => "Pause",
            Command::Resume => "Resume",
            Command::Cancel => "Cancel",
            Command::InsertWaypoint { .. } => "InsertWaypoint",
            Command::Shutdown => "Shutdown",
        }
    }
}

/// Everything the controller loop consumes, in arrival order.
#[derive(Debug)]
pub enum ControllerMessage {
    Command(Command),
    Navigation(TerminalEvent),
}

/// Operator-facing handle: serializes commands onto the controller inbox and
/// exposes the latest status projection.
#[derive(Clone)]
pub struct ControlSurface {
    commands: mpsc::Sender<ControllerMessage>,
    status: watch::Receiver<StatusReport>,
}

impl ControlSurface {
    pub fn new(
        commands: mpsc::Sender<ControllerMessage>,
        status: watch::Receiver<StatusReport>,
    ) -> Self {
        Self { commands, status }
    }

    /// Appends the list to whatever is pending and begins following.
    /// An empty or malformed list is rejected and nothing is enqueued.
    pub async fn start(&self, waypoints: Vec<WaypointSpec>) -> ApplicationResult<usize> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Start { waypoints, reply }).await?;
        let accepted = Self::await_reply(response).await??;
        Ok(accepted)
    }

    pub async fn pause(&self) -> ApplicationResult<()> {
        self.send(Command::Pause).await
    }

    pub async fn resume(&self) -> ApplicationResult<()> {
        self.send(Command::Resume).await
    }

    pub async fn cancel(&self) -> ApplicationResult<()> {
        self.send(Command::Cancel).await
    }

    pub async fn insert_waypoint(
        &self,
        waypoint: WaypointSpec,
        priority: bool,
    ) -> ApplicationResult<Waypoint> {
        let (reply, response) = oneshot::channel();
        self.send(Command::InsertWaypoint {
            waypoint,
            priority,
            reply,
        })
        .await?;
        let enqueued = Self::await_reply(response).await??;
        Ok(enqueued)
    }

    /// Stops the controller loop. Any active goal is left to the service.
    pub async fn shutdown(&self) -> ApplicationResult<()> {
        self.send(Command::Shutdown).await
    }

    pub fn status(&self) -> StatusReport {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusReport> {
        self.status.clone()
    }

    /// Waits until the published status satisfies `predicate`.
    pub async fn wait_for<F>(&self, predicate: F) -> ApplicationResult<StatusReport>
    where
        F: FnMut(&StatusReport) -> bool,
    {
        let mut status = self.status.clone();
        let report = status
            .wait_for(predicate)
            .await
            .map_err(|_| ApplicationError::ControllerUnavailable("status channel closed".to_string()))?;
        Ok(report.clone())
    }

    pub async fn wait_for_state(&self, state: SequenceState) -> ApplicationResult<StatusReport> {
        self.wait_for(|report| report.state == state).await
    }

    async fn send(&self, command: Command) -> ApplicationResult<()> {
        let name = command.name();
        self.commands
            .send(ControllerMessage::Command(command))
            .await
            .map_err(|_| ApplicationError::ControllerUnavailable(format!("cannot deliver {}", name)))
    }

    async fn await_reply<T>(response: oneshot::Receiver<T>) -> ApplicationResult<T> {
        response
            .await
            .map_err(|_| ApplicationError::ControllerUnavailable("controller dropped the reply".to_string()))
    }
}
