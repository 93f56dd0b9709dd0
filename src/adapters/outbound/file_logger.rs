use crate::domains::logger::{DomainLogger, DynLogger, FileLogger};
use std::sync::Arc;

struct LogFacadeBridge;

impl DomainLogger for LogFacadeBridge {
    fn info(&self, msg: &str) {
        log::info!("{}", msg);
    }

    fn warn(&self, msg: &str) {
        log::warn!("{}", msg);
    }

    fn error(&self, msg: &str) {
        log::error!("{}", msg);
    }

    fn debug(&self, msg: &str) {
        log::debug!("{}", msg);
    }
}

/// Installs fast_log as the `log` backend writing to `path` and returns a
/// port that forwards into it. Can only succeed once per process.
pub fn init_file_logger(path: &str, level: log::LevelFilter) -> Result<DynLogger, String> {
    FileLogger::init(path, level).map_err(|e| format!("Failed to initialize fast_log at {}: {}", path, e))?;
    Ok(Arc::new(LogFacadeBridge))
}
