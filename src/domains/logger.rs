use chrono::Utc;
use log::{debug as log_debug, error as log_error, info as log_info, warn as log_warn};
use std::sync::Arc;

/// Logging port seen by the controller. Never fails from the caller's side.
pub trait DomainLogger: Send + Sync + 'static {
    fn info(&self, msg: &str);
    fn warn(&self, msg: &str);
    fn error(&self, msg: &str);

    fn debug(&self, _msg: &str) {}
}

pub type DynLogger = Arc<dyn DomainLogger>;

/// Writes through the `log` facade into a fast_log file appender.
pub struct FileLogger;

impl FileLogger {
    pub fn init(path: &str, level: log::LevelFilter) -> Result<(), Box<dyn std::error::Error>> {
        fast_log::init(fast_log::config::Config::new().file(path).level(level))?;
        Ok(())
    }
}

impl DomainLogger for FileLogger {
    fn info(&self, msg: &str) {
        log_info!("{} - {}", Utc::now().to_rfc3339(), msg);
    }

    fn warn(&self, msg: &str) {
        log_warn!("{} - {}", Utc::now().to_rfc3339(), msg);
    }

    fn error(&self, msg: &str) {
        log_error!("{} - {}", Utc::now().to_rfc3339(), msg);
    }

    fn debug(&self, msg: &str) {
        log_debug!("{} - {}", Utc::now().to_rfc3339(), msg);
    }
}
