use crate::config::SimulationConfig;
use crate::domains::waypoint_following::{
    GoalClient, GoalId, GoalRejected, GoalRequest, NavigationEventSink, Pose, Quaternion,
};
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;

const ARRIVAL_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct SimulationSettings {
    pub speed_mps: f64,
    pub feedback_interval: Duration,
    pub failure_probability: f64,
    pub start: Pose,
}

impl From<&SimulationConfig> for SimulationSettings {
    fn from(config: &SimulationConfig) -> Self {
        Self {
            speed_mps: config.speed_mps,
            feedback_interval: Duration::from_millis(config.feedback_interval_ms.max(1)),
            failure_probability: config.failure_probability,
            start: Pose::from_point(config.start.x, config.start.y, 0.0),
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self::from(&SimulationConfig::default())
    }
}

struct ActiveRun {
    goal_id: GoalId,
    cancel: Option<oneshot::Sender<()>>,
}

struct SimState {
    pose: Pose,
    active: Option<ActiveRun>,
    available: bool,
    rng: StdRng,
    accepted: u64,
}

/// A point robot that drives straight at each goal. Accepts one goal at a
/// time, like the real move-to-pose service.
#[derive(Clone)]
pub struct SimulatedNavigation {
    settings: SimulationSettings,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedNavigation {
    pub fn new(settings: SimulationSettings) -> Self {
        Self::with_rng(settings, StdRng::from_entropy())
    }

    /// Deterministic failures for tests.
    pub fn seeded(settings: SimulationSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }

    fn with_rng(settings: SimulationSettings, rng: StdRng) -> Self {
        let state = SimState {
            pose: settings.start,
            active: None,
            available: true,
            rng,
            accepted: 0,
        };
        Self {
            settings,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn pose(&self) -> Pose {
        self.lock().pose
    }

    pub fn is_busy(&self) -> bool {
        self.lock().active.is_some()
    }

    pub fn accepted_goals(&self) -> u64 {
        self.lock().accepted
    }

    /// While unavailable every submit is rejected.
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn drive(
        self,
        request: GoalRequest,
        events: NavigationEventSink,
        mut cancel: oneshot::Receiver<()>,
        fail_after: Option<f64>,
    ) {
        let target = request.pose;
        let step_len = self.settings.speed_mps * self.settings.feedback_interval.as_secs_f64();
        let mut travelled = 0.0;

        let mut ticker = tokio::time::interval(self.settings.feedback_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut cancel => {
                    self.release(request.goal_id);
                    events.cancelled().await;
                    return;
                }
                _ = ticker.tick() => {
                    let (pose, arrived) = self.step_towards(&target, step_len);
                    events.feedback(pose);
                    travelled += step_len;

                    if fail_after.is_some_and(|limit| travelled >= limit) && !arrived {
                        self.release(request.goal_id);
                        events.aborted("simulated navigation failure").await;
                        return;
                    }
                    if arrived {
                        self.release(request.goal_id);
                        events.succeeded().await;
                        return;
                    }
                }
            }
        }
    }

    fn step_towards(&self, target: &Pose, step_len: f64) -> (Pose, bool) {
        let mut state = self.lock();
        let distance = state.pose.planar_distance(target);
        if distance <= step_len.max(ARRIVAL_EPSILON) {
            state.pose = *target;
            return (state.pose, true);
        }
        let dx = target.position.x - state.pose.position.x;
        let dy = target.position.y - state.pose.position.y;
        let ratio = step_len / distance;
        state.pose.position.x += dx * ratio;
        state.pose.position.y += dy * ratio;
        state.pose.position.z = target.position.z;
        state.pose.orientation = Quaternion::from_yaw(dy.atan2(dx));
        (state.pose, false)
    }

    /// Frees the service before the terminal event goes out, so the next
    /// submit triggered by that event is accepted.
    fn release(&self, goal_id: GoalId) {
        let mut state = self.lock();
        if state.active.as_ref().is_some_and(|run| run.goal_id == goal_id) {
            state.active = None;
        }
    }
}

#[async_trait]
impl GoalClient for SimulatedNavigation {
    async fn submit(&self, request: GoalRequest, events: NavigationEventSink) -> Result<(), GoalRejected> {
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let fail_after = {
            let mut state = self.lock();
            if !state.available {
                return Err(GoalRejected::new("navigation service unavailable"));
            }
            if let Some(run) = &state.active {
                return Err(GoalRejected::new(format!("goal {} is still active", run.goal_id)));
            }

            let distance = state.pose.planar_distance(&request.pose);
            let p = self.settings.failure_probability.clamp(0.0, 1.0);
            let fail_after = state
                .rng
                .gen_bool(p)
                .then(|| distance * state.rng.gen_range(0.1..0.9));

            state.active = Some(ActiveRun {
                goal_id: request.goal_id,
                cancel: Some(cancel_tx),
            });
            state.accepted += 1;
            fail_after
        };

        tracing::debug!(
            "Simulated navigation accepted goal {} in frame {}",
            request.goal_id,
            request.frame_id
        );
        tokio::spawn(self.clone().drive(request, events, cancel_rx, fail_after));
        Ok(())
    }

    async fn cancel(&self, goal_id: GoalId) {
        let sender = {
            let mut state = self.lock();
            state
                .active
                .as_mut()
                .filter(|run| run.goal_id == goal_id)
                .and_then(|run| run.cancel.take())
        };
        match sender {
            Some(sender) => {
                let _ = sender.send(());
            }
            None => tracing::debug!("Cancel for goal {} that is not running", goal_id),
        }
    }
}
