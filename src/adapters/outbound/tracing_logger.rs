use crate::domains::logger::{DomainLogger, DynLogger};
use std::sync::Arc;

/// Forwards the logging port into `tracing`, so domain messages share the
/// subscriber configured by the binary.
pub struct TracingLogger {
    component: &'static str,
}

impl TracingLogger {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }
}

impl DomainLogger for TracingLogger {
    fn info(&self, msg: &str) {
        tracing::info!(component = self.component, "{}", msg);
    }

    fn warn(&self, msg: &str) {
        tracing::warn!(component = self.component, "{}", msg);
    }

    fn error(&self, msg: &str) {
        tracing::error!(component = self.component, "{}", msg);
    }

    fn debug(&self, msg: &str) {
        tracing::debug!(component = self.component, "{}", msg);
    }
}

pub fn init_tracing_logger() -> DynLogger {
    Arc::new(TracingLogger::new("waypoint_follower"))
}
