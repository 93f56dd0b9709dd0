//! Waypoint sequencing state machine.
//!
//! One [`SequenceController`] owns the queue, the active goal and the retry
//! bookkeeping. Operator commands and terminal navigation events arrive on a
//! single ordered inbox; feedback arrives on a latest-wins slot. Every
//! handled message is one transition, after which the status projection is
//! published once.

use super::actors::{Command, ControlSurface, ControllerMessage};
use super::events::WaypointFollowingEvent;
use super::goal::{
    CancelReason, Feedback, Goal, GoalFailure, GoalId, GoalRequest, GoalStatus, OutcomeKind,
    OutcomeRecord, TerminalEvent, TerminalOutcome,
};
use super::ports::{GoalClient, NavigationEventSink};
use super::projections::StatusReporter;
use super::queue::WaypointQueue;
use super::retry::{RetryDecision, RetryPolicy};
use super::state::SequenceState;
use super::types::{Waypoint, WaypointSpec};
use crate::common::{DomainError, DomainResult, EventEnvelope, EventJournal, EventMetadata};
use crate::domains::logger::DynLogger;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep_until, Instant};

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub controller_id: String,
    pub frame_id: String,
    pub retry_policy: RetryPolicy,
    /// Watchdog bound on silence from the service while a goal is active.
    pub goal_timeout: Option<Duration>,
    /// How long to wait for the acknowledgement of our own cancel.
    pub cancel_timeout: Duration,
    pub dwell: Duration,
    pub default_tolerance: Option<f64>,
    pub history_len: usize,
    pub command_buffer: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            controller_id: "waypoint-follower".to_string(),
            frame_id: "map".to_string(),
            retry_policy: RetryPolicy::default(),
            goal_timeout: Some(Duration::from_secs(60)),
            cancel_timeout: Duration::from_secs(10),
            dwell: Duration::ZERO,
            default_tolerance: None,
            history_len: 20,
            command_buffer: 64,
        }
    }
}

/// A failed waypoint waiting to be re-submitted.
#[derive(Debug, Clone)]
struct PendingRetry {
    waypoint: Waypoint,
    next_attempt: u32,
    first_dispatched: Instant,
}

pub struct SequenceController {
    settings: ControllerSettings,
    client: Arc<dyn GoalClient>,
    logger: DynLogger,
    journal: Option<Arc<dyn EventJournal>>,
    inbox: mpsc::Receiver<ControllerMessage>,
    inbox_handle: mpsc::WeakSender<ControllerMessage>,
    feedback_tx: Arc<watch::Sender<Option<Feedback>>>,
    feedback_rx: watch::Receiver<Option<Feedback>>,
    reporter: StatusReporter,
    state: SequenceState,
    paused_from: SequenceState,
    queue: WaypointQueue,
    active: Option<Goal>,
    retry: Option<PendingRetry>,
    deferred: VecDeque<Command>,
    dwell_until: Option<Instant>,
    events: Vec<WaypointFollowingEvent>,
}

impl SequenceController {
    pub fn new(
        settings: ControllerSettings,
        client: Arc<dyn GoalClient>,
        logger: DynLogger,
    ) -> (Self, ControlSurface) {
        let (commands, inbox) = mpsc::channel(settings.command_buffer.max(1));
        let (feedback_tx, feedback_rx) = watch::channel(None);
        let (reporter, status) =
            StatusReporter::new(settings.controller_id.clone(), settings.history_len);

        let controller = Self {
            settings,
            client,
            logger,
            journal: None,
            inbox,
            inbox_handle: commands.downgrade(),
            feedback_tx: Arc::new(feedback_tx),
            feedback_rx,
            reporter,
            state: SequenceState::Idle,
            paused_from: SequenceState::Idle,
            queue: WaypointQueue::new(),
            active: None,
            retry: None,
            deferred: VecDeque::new(),
            dwell_until: None,
            events: Vec::new(),
        };
        (controller, ControlSurface::new(commands, status))
    }

    pub fn with_journal(mut self, journal: Arc<dyn EventJournal>) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn state(&self) -> SequenceState {
        self.state
    }

    /// Runs until `Shutdown` or until every sender to the inbox is gone.
    pub async fn run(mut self) {
        self.logger.info(&format!(
            "Waypoint follower {} ready (frame {}, max retries {})",
            self.settings.controller_id, self.settings.frame_id, self.settings.retry_policy.max_retries
        ));

        loop {
            let deadline = self.next_deadline();
            tokio::select! {
                message = self.inbox.recv() => match message {
                    Some(ControllerMessage::Command(Command::Shutdown)) | None => break,
                    Some(message) => self.handle(message).await,
                },
                changed = self.feedback_rx.changed() => {
                    if changed.is_ok() {
                        let latest = *self.feedback_rx.borrow_and_update();
                        if let Some(feedback) = latest {
                            self.on_feedback(feedback).await;
                        }
                    }
                }
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_deadline().await;
                }
            }
            self.replay_deferred().await;
            self.flush().await;
        }

        self.flush().await;
        self.logger.info(&format!(
            "Waypoint follower {} stopped in state {}",
            self.settings.controller_id,
            self.state.as_str()
        ));
    }

    async fn handle(&mut self, message: ControllerMessage) {
        match message {
            ControllerMessage::Command(command) => {
                if self.state == SequenceState::Cancelling && !matches!(command, Command::Cancel) {
                    tracing::debug!("Deferring {} until cancellation drains", command.name());
                    self.deferred.push_back(command);
                } else {
                    self.apply_command(command).await;
                }
            }
            ControllerMessage::Navigation(event) => self.on_terminal(event).await,
        }
    }

    async fn replay_deferred(&mut self) {
        while self.state != SequenceState::Cancelling {
            let Some(command) = self.deferred.pop_front() else {
                break;
            };
            tracing::debug!("Replaying deferred {}", command.name());
            self.apply_command(command).await;
        }
    }

    async fn apply_command(&mut self, command: Command) {
        match command {
            Command::Start { waypoints, reply } => {
                let result = self.start_route(waypoints);
                let accepted = result.is_ok();
                if reply.send(result).is_err() {
                    tracing::debug!("Start caller went away before the reply");
                }
                if accepted {
                    self.advance().await;
                }
            }
            Command::Pause => self.pause(),
            Command::Resume => self.resume().await,
            Command::Cancel => self.cancel().await,
            Command::InsertWaypoint {
                waypoint,
                priority,
                reply,
            } => match waypoint.validated() {
                Ok(spec) => {
                    let enqueued = self.enqueue(spec, priority);
                    if reply.send(Ok(enqueued)).is_err() {
                        tracing::debug!("InsertWaypoint caller went away before the reply");
                    }
                    if self.state.is_at_rest() {
                        self.advance().await;
                    }
                }
                Err(e) => {
                    self.logger.warn(&format!("Rejected waypoint insert: {}", e));
                    if reply.send(Err(e)).is_err() {
                        tracing::debug!("InsertWaypoint caller went away before the reply");
                    }
                }
            },
            Command::Shutdown => tracing::debug!("Shutdown is handled by the run loop"),
        }
    }

    fn start_route(&mut self, waypoints: Vec<WaypointSpec>) -> DomainResult<usize> {
        match Self::validate_route(&waypoints) {
            Ok(route) => {
                let count = route.len();
                for spec in route {
                    self.enqueue(spec, false);
                }
                self.logger.info(&format!(
                    "Following path with # {} waypoints...",
                    self.queue.len() + usize::from(self.active.is_some())
                ));
                self.emit(WaypointFollowingEvent::RouteStarted {
                    controller_id: self.settings.controller_id.clone(),
                    waypoint_count: count,
                    timestamp: Utc::now(),
                });
                Ok(count)
            }
            Err(e) => {
                self.logger.error(&format!("Rejecting route: {}", e));
                self.emit(WaypointFollowingEvent::StartRejected {
                    controller_id: self.settings.controller_id.clone(),
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                });
                Err(e)
            }
        }
    }

    fn validate_route(waypoints: &[WaypointSpec]) -> DomainResult<Vec<WaypointSpec>> {
        if waypoints.is_empty() {
            return Err(DomainError::configuration("waypoint list is empty"));
        }
        waypoints
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                spec.validated().map_err(|e| match e {
                    DomainError::Configuration { reason } => {
                        DomainError::configuration(format!("waypoint {}: {}", i, reason))
                    }
                    other => other,
                })
            })
            .collect()
    }

    fn enqueue(&mut self, spec: WaypointSpec, priority: bool) -> Waypoint {
        let waypoint = if priority {
            self.queue.enqueue_priority(spec)
        } else {
            self.queue.enqueue(spec)
        };
        self.logger.info(&format!(
            "Added new {}waypoint -> ({}, {}) | # Waypoints: {}",
            if priority { "priority " } else { "" },
            waypoint.pose.position.x,
            waypoint.pose.position.y,
            self.queue.len()
        ));
        self.emit(WaypointFollowingEvent::WaypointEnqueued {
            controller_id: self.settings.controller_id.clone(),
            waypoint,
            priority,
            timestamp: Utc::now(),
        });
        waypoint
    }

    fn pause(&mut self) {
        if self.state == SequenceState::Paused {
            return;
        }
        self.logger.info("Pausing: no new goals will be dispatched");
        self.paused_from = self.state;
        self.set_state(SequenceState::Paused);
    }

    async fn resume(&mut self) {
        if self.state != SequenceState::Paused {
            tracing::debug!("Resume ignored in state {}", self.state.as_str());
            return;
        }
        self.logger.info("Resuming waypoint following");
        if self.active.is_some() {
            self.set_state(SequenceState::Awaiting);
        } else if self.has_work() {
            self.set_state(SequenceState::Dispatching);
            self.advance().await;
        } else if self.paused_from.is_at_rest() {
            self.set_state(self.paused_from);
        } else {
            self.set_state(SequenceState::Dispatching);
            self.advance().await;
        }
    }

    async fn cancel(&mut self) {
        if self.state == SequenceState::Cancelling {
            tracing::debug!("Cancel already in progress");
            return;
        }
        self.logger.warn("Issuing cancel command to navigation service");
        self.set_state(SequenceState::Cancelling);

        match self.active.as_ref().map(|goal| (goal.id, goal.cancel_requested)) {
            Some((goal_id, None)) => self.request_cancel(goal_id, CancelReason::Operator).await,
            Some((goal_id, Some(reason))) => {
                tracing::debug!("Cancel for goal {} already requested ({:?})", goal_id, reason);
            }
            None => self.finish_drain(),
        }
    }

    async fn request_cancel(&mut self, goal_id: GoalId, reason: CancelReason) {
        self.client.cancel(goal_id).await;
        if let Some(goal) = self.active.as_mut() {
            goal.cancel_requested = Some(reason);
            goal.last_activity = Instant::now();
        }
        self.emit(WaypointFollowingEvent::GoalCancelRequested {
            controller_id: self.settings.controller_id.clone(),
            goal_id,
            reason,
            timestamp: Utc::now(),
        });
    }

    fn has_work(&self) -> bool {
        self.retry.is_some() || !self.queue.is_empty()
    }

    /// Dispatches the next waypoint unless something holds the controller.
    async fn advance(&mut self) {
        loop {
            if self.active.is_some()
                || matches!(self.state, SequenceState::Paused | SequenceState::Cancelling)
            {
                return;
            }
            if !self.has_work() {
                self.finish_route();
                return;
            }
            if let Some(until) = self.dwell_until {
                if Instant::now() < until {
                    self.set_state(SequenceState::Dispatching);
                    return;
                }
                self.dwell_until = None;
            }

            self.set_state(SequenceState::Dispatching);
            let (waypoint, attempt, first_dispatched) = match self.retry.take() {
                Some(retry) => (retry.waypoint, retry.next_attempt, retry.first_dispatched),
                None => {
                    let Some(waypoint) = self.queue.pop_next() else {
                        continue;
                    };
                    (waypoint, 1, Instant::now())
                }
            };
            self.dispatch(waypoint, attempt, first_dispatched).await;
        }
    }

    async fn dispatch(&mut self, waypoint: Waypoint, attempt: u32, first_dispatched: Instant) {
        let mut goal = Goal::new(waypoint, attempt, first_dispatched);
        let Some(inbox) = self.inbox_handle.upgrade() else {
            self.on_attempt_failed(goal, GoalFailure::Rejected("controller is shutting down".to_string()));
            return;
        };
        let sink = NavigationEventSink::new(goal.id, inbox, self.feedback_tx.clone());
        let request = GoalRequest {
            goal_id: goal.id,
            frame_id: self.settings.frame_id.clone(),
            pose: waypoint.pose,
        };

        self.logger.info(&format!(
            "Executing goal -> ({}, {}) for waypoint #{} (attempt {})...",
            waypoint.pose.position.x, waypoint.pose.position.y, waypoint.index, attempt
        ));

        match self.client.submit(request, sink).await {
            Ok(()) => {
                goal.mark_active();
                self.emit(WaypointFollowingEvent::GoalDispatched {
                    controller_id: self.settings.controller_id.clone(),
                    goal_id: goal.id,
                    waypoint_index: waypoint.index,
                    attempt,
                    pose: waypoint.pose,
                    tolerance: waypoint.tolerance,
                    timestamp: goal.dispatched_at,
                });
                self.active = Some(goal);
                self.set_state(SequenceState::Awaiting);
            }
            Err(rejected) => {
                self.logger.warn(&format!(
                    "Navigation service rejected waypoint #{}: {}",
                    waypoint.index, rejected
                ));
                self.on_attempt_failed(goal, GoalFailure::Rejected(rejected.reason));
            }
        }
    }

    async fn on_terminal(&mut self, event: TerminalEvent) {
        let is_current = self.active.as_ref().is_some_and(|goal| goal.id == event.goal_id);
        if !is_current {
            tracing::debug!(
                "Ignoring {:?} for goal {} that is no longer active",
                event.outcome,
                event.goal_id
            );
            return;
        }
        let Some(mut goal) = self.active.take() else {
            return;
        };

        let reached = event.outcome == TerminalOutcome::Succeeded
            || goal.cancel_requested == Some(CancelReason::WithinTolerance);

        if reached {
            goal.status = GoalStatus::Succeeded;
            self.logger.info(&format!(
                "Reached waypoint #{} after {} attempt(s)",
                goal.waypoint.index, goal.attempt
            ));
            self.record(&goal.waypoint, OutcomeKind::Succeeded, goal.attempt, goal.elapsed());
            if self.state != SequenceState::Cancelling
                && !self.settings.dwell.is_zero()
                && self.has_work()
            {
                self.logger.info(&format!("Waiting for {:.1} sec...", self.settings.dwell.as_secs_f64()));
                self.dwell_until = Some(Instant::now() + self.settings.dwell);
            }
        } else if self.state == SequenceState::Cancelling {
            goal.status = GoalStatus::Cancelled;
            self.record(
                &goal.waypoint,
                OutcomeKind::OperatorCancelled,
                goal.attempt,
                goal.elapsed(),
            );
        } else {
            let failure = match (goal.cancel_requested, event.outcome) {
                (Some(CancelReason::Timeout { after }), _) => GoalFailure::Timeout { after },
                (_, TerminalOutcome::Aborted(reason)) => GoalFailure::Aborted(reason),
                _ => GoalFailure::Aborted("goal cancelled by the navigation service".to_string()),
            };
            self.on_attempt_failed(goal, failure);
        }

        match self.state {
            SequenceState::Cancelling => self.finish_drain(),
            SequenceState::Paused => {}
            _ => self.advance().await,
        }
    }

    fn on_attempt_failed(&mut self, mut goal: Goal, failure: GoalFailure) {
        goal.status = GoalStatus::Failed;
        self.emit(WaypointFollowingEvent::AttemptFailed {
            controller_id: self.settings.controller_id.clone(),
            goal_id: goal.id,
            waypoint_index: goal.waypoint.index,
            attempt: goal.attempt,
            failure: failure.clone(),
            timestamp: Utc::now(),
        });

        match self.settings.retry_policy.decide(goal.attempt) {
            RetryDecision::Retry { next_attempt } => {
                self.logger.warn(&format!(
                    "Waypoint #{} attempt {} failed ({}); retrying",
                    goal.waypoint.index, goal.attempt, failure
                ));
                self.retry = Some(PendingRetry {
                    waypoint: goal.waypoint,
                    next_attempt,
                    first_dispatched: goal.first_dispatched,
                });
            }
            RetryDecision::SkipWaypoint => {
                self.logger.error(&format!(
                    "Giving up on waypoint #{} after {} attempt(s): {}",
                    goal.waypoint.index, goal.attempt, failure
                ));
                let elapsed = goal.elapsed();
                self.record(
                    &goal.waypoint,
                    OutcomeKind::FailedExhausted { failure },
                    goal.attempt,
                    elapsed,
                );
            }
            RetryDecision::AbortRoute => {
                self.logger.error(&format!(
                    "Waypoint #{} failed after {} attempt(s): {}; aborting the route",
                    goal.waypoint.index, goal.attempt, failure
                ));
                let elapsed = goal.elapsed();
                self.record(
                    &goal.waypoint,
                    OutcomeKind::FailedExhausted { failure },
                    goal.attempt,
                    elapsed,
                );
                self.abort_route();
            }
        }
    }

    fn abort_route(&mut self) {
        for waypoint in self.queue.clear() {
            self.record(&waypoint, OutcomeKind::RouteAborted, 0, Duration::ZERO);
        }
        self.dwell_until = None;
        self.set_state(SequenceState::Idle);
    }

    /// Cancellation has completed: everything still pending is recorded as
    /// operator-cancelled and the controller goes idle.
    fn finish_drain(&mut self) {
        if let Some(retry) = self.retry.take() {
            self.record(
                &retry.waypoint,
                OutcomeKind::OperatorCancelled,
                retry.next_attempt - 1,
                retry.first_dispatched.elapsed(),
            );
        }
        let drained = self.queue.clear();
        for waypoint in &drained {
            self.record(waypoint, OutcomeKind::OperatorCancelled, 0, Duration::ZERO);
        }
        self.dwell_until = None;
        self.logger.warn(&format!(
            "Route cancelled; {} pending waypoint(s) cleared",
            drained.len()
        ));
        self.set_state(SequenceState::Idle);
    }

    fn finish_route(&mut self) {
        if self.state.is_at_rest() {
            return;
        }
        self.logger.warn("No more waypoints to follow.");
        let totals = self.reporter.report().totals.clone();
        self.emit(WaypointFollowingEvent::RouteFinished {
            controller_id: self.settings.controller_id.clone(),
            succeeded: totals.succeeded,
            failed: totals.failed,
            timestamp: Utc::now(),
        });
        self.set_state(SequenceState::Finished);
    }

    async fn on_feedback(&mut self, feedback: Feedback) {
        let default_tolerance = self.settings.default_tolerance;
        let Some(goal) = self.active.as_mut().filter(|goal| goal.id == feedback.goal_id) else {
            tracing::trace!("Dropping feedback for inactive goal {}", feedback.goal_id);
            return;
        };
        goal.record_feedback(feedback);

        let distance = goal.distance_remaining().unwrap_or_default();
        let tolerance = goal.waypoint.tolerance.or(default_tolerance).filter(|t| *t > 0.0);
        let arrived =
            goal.cancel_requested.is_none() && tolerance.is_some_and(|t| distance <= t);
        let goal_id = goal.id;
        let index = goal.waypoint.index;

        self.emit(WaypointFollowingEvent::GoalFeedback {
            controller_id: self.settings.controller_id.clone(),
            goal_id,
            pose: feedback.pose,
            distance_remaining: distance,
            timestamp: feedback.stamp,
        });

        if arrived {
            self.logger.info(&format!(
                "Waypoint #{} within tolerance ({:.2} m left); cancelling the remaining approach",
                index, distance
            ));
            self.request_cancel(goal_id, CancelReason::WithinTolerance).await;
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        let watchdog = self.active.as_ref().and_then(|goal| {
            if goal.cancel_requested.is_some() {
                Some(goal.last_activity + self.settings.cancel_timeout)
            } else {
                self.settings.goal_timeout.map(|timeout| goal.last_activity + timeout)
            }
        });
        let dwell = self.dwell_until.filter(|_| self.state != SequenceState::Paused);
        match (watchdog, dwell) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    async fn on_deadline(&mut self) {
        let now = Instant::now();
        if let Some(goal) = self.active.as_ref() {
            let goal_id = goal.id;
            match goal.cancel_requested {
                Some(_) if now >= goal.last_activity + self.settings.cancel_timeout => {
                    self.logger.warn(&format!(
                        "No cancel acknowledgement for goal {} within {:?}; treating it as cancelled",
                        goal_id, self.settings.cancel_timeout
                    ));
                    self.on_terminal(TerminalEvent {
                        goal_id,
                        outcome: TerminalOutcome::Cancelled,
                    })
                    .await;
                    return;
                }
                None => {
                    if let Some(timeout) = self.settings.goal_timeout {
                        if now >= goal.last_activity + timeout {
                            self.on_goal_timeout(timeout).await;
                            return;
                        }
                    }
                }
                Some(_) => {}
            }
        }

        if self.dwell_until.is_some_and(|until| now >= until) {
            self.dwell_until = None;
            self.advance().await;
        }
    }

    /// The goal stays active until the service confirms the cancel (or the
    /// cancel timeout synthesizes it), so nothing is submitted on top of it.
    async fn on_goal_timeout(&mut self, after: Duration) {
        let Some((goal_id, index)) = self.active.as_ref().map(|goal| (goal.id, goal.waypoint.index)) else {
            return;
        };
        self.logger.warn(&format!(
            "No progress on waypoint #{} for {:?}; cancelling the goal",
            index, after
        ));
        self.request_cancel(goal_id, CancelReason::Timeout { after }).await;
    }

    fn record(&mut self, waypoint: &Waypoint, kind: OutcomeKind, attempts: u32, elapsed: Duration) {
        let record = OutcomeRecord::new(waypoint, kind, attempts, elapsed);
        self.emit(WaypointFollowingEvent::OutcomeRecorded {
            controller_id: self.settings.controller_id.clone(),
            record,
            timestamp: Utc::now(),
        });
    }

    fn set_state(&mut self, to: SequenceState) {
        if self.state == to {
            return;
        }
        let from = self.state;
        self.state = to;
        tracing::debug!("{}: {} -> {}", self.settings.controller_id, from.as_str(), to.as_str());
        self.emit(WaypointFollowingEvent::StateChanged {
            controller_id: self.settings.controller_id.clone(),
            from,
            to,
            timestamp: Utc::now(),
        });
    }

    fn emit(&mut self, event: WaypointFollowingEvent) {
        self.reporter.apply(&event);
        self.events.push(event);
    }

    /// Publishes the projection once and journals what happened.
    async fn flush(&mut self) {
        if self.events.is_empty() {
            return;
        }
        let events = std::mem::take(&mut self.events);
        self.reporter.publish();

        let Some(journal) = self.journal.as_ref() else {
            return;
        };
        let metadata = EventMetadata::from_source("SequenceController");
        let envelopes: Vec<EventEnvelope> = events
            .iter()
            .filter(|event| !event.is_advisory())
            .filter_map(|event| match EventEnvelope::new(event, "WaypointFollower", metadata.clone()) {
                Ok(envelope) => Some(envelope),
                Err(e) => {
                    tracing::warn!("Failed to wrap event for the journal: {}", e);
                    None
                }
            })
            .collect();
        if envelopes.is_empty() {
            return;
        }
        if let Err(e) = journal.append(envelopes).await {
            self.logger.warn(&format!("Failed to append to event journal: {}", e));
        }
    }
}
