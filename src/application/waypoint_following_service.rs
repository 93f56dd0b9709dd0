use crate::adapters::outbound::FileWaypointSource;
use crate::common::{ApplicationError, ApplicationResult, EventJournal};
use crate::config::Config;
use crate::domains::logger::DynLogger;
use crate::domains::waypoint_following::{
    ControlSurface, ControllerSettings, GoalClient, SequenceController, SequenceState,
    StatusReport, WaypointSource, WaypointSpec,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Owns the running controller task and the use cases built on its control surface.
pub struct WaypointFollowingService {
    surface: ControlSurface,
    logger: DynLogger,
    controller_task: JoinHandle<()>,
}

impl WaypointFollowingService {
    /// Spawns the controller loop onto the current runtime.
    pub fn spawn(
        settings: ControllerSettings,
        client: Arc<dyn GoalClient>,
        logger: DynLogger,
        journal: Option<Arc<dyn EventJournal>>,
    ) -> Self {
        let (controller, surface) = SequenceController::new(settings, client, logger.clone());
        let controller = match journal {
            Some(journal) => controller.with_journal(journal),
            None => controller,
        };
        let controller_task = tokio::spawn(controller.run());
        Self {
            surface,
            logger,
            controller_task,
        }
    }

    pub fn from_config(
        config: &Config,
        client: Arc<dyn GoalClient>,
        logger: DynLogger,
        journal: Option<Arc<dyn EventJournal>>,
    ) -> ApplicationResult<Self> {
        config.follower.validate()?;
        Ok(Self::spawn(
            config.follower.controller_settings(),
            client,
            logger,
            journal,
        ))
    }

    pub fn surface(&self) -> ControlSurface {
        self.surface.clone()
    }

    pub fn status(&self) -> StatusReport {
        self.surface.status()
    }

    pub async fn start_from_source(&self, source: &dyn WaypointSource) -> ApplicationResult<usize> {
        let waypoints = source.load_waypoints().map_err(|e| {
            self.logger
                .error(&format!("Could not load {}: {}", source.describe(), e));
            e
        })?;
        let accepted = self.surface.start(waypoints).await?;
        self.logger.info(&format!(
            "Started {} waypoint(s) from {}",
            accepted,
            source.describe()
        ));
        Ok(accepted)
    }

    pub async fn start_from_file(&self, path: &Path) -> ApplicationResult<usize> {
        self.start_from_source(&FileWaypointSource::new(path)).await
    }

    /// The target still being pursued, followed by everything pending
    /// (including a waypoint waiting for its retry).
    pub fn remaining_route(&self) -> Vec<WaypointSpec> {
        let report = self.surface.status();
        let active = report.active_goal.as_ref().map(|goal| WaypointSpec {
            pose: goal.target,
            tolerance: goal.tolerance,
        });
        active
            .into_iter()
            .chain(report.remaining.iter().map(|w| WaypointSpec {
                pose: w.pose,
                tolerance: w.tolerance,
            }))
            .collect()
    }

    pub fn save_remaining(&self, path: &Path) -> ApplicationResult<usize> {
        let route = self.remaining_route();
        FileWaypointSource::save(path, &route)?;
        self.logger.info(&format!(
            "Saved {} waypoint(s) to {}",
            route.len(),
            path.display()
        ));
        Ok(route.len())
    }

    /// Issues `Cancel` and waits, bounded, for the controller to go idle.
    pub async fn cancel_and_wait(&self, bound: Duration) -> ApplicationResult<StatusReport> {
        self.surface.cancel().await?;
        tokio::time::timeout(bound, self.surface.wait_for_state(SequenceState::Idle))
            .await
            .map_err(|_| {
                ApplicationError::ControllerUnavailable(format!(
                    "controller did not go idle within {:?}",
                    bound
                ))
            })?
    }

    pub async fn shutdown(self) -> ApplicationResult<()> {
        self.surface.shutdown().await?;
        self.controller_task
            .await
            .map_err(|e| ApplicationError::ControllerUnavailable(format!("controller task failed: {}", e)))
    }
}
