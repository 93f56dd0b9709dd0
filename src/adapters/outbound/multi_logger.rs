use crate::domains::logger::{DomainLogger, DynLogger};
use std::sync::Arc;

/// Fans every message out to each attached sink in order.
pub struct MultiLogger {
    sinks: Vec<DynLogger>,
}

impl MultiLogger {
    pub fn new(sinks: Vec<DynLogger>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl DomainLogger for MultiLogger {
    fn info(&self, msg: &str) {
        self.sinks.iter().for_each(|sink| sink.info(msg));
    }

    fn warn(&self, msg: &str) {
        self.sinks.iter().for_each(|sink| sink.warn(msg));
    }

    fn error(&self, msg: &str) {
        self.sinks.iter().for_each(|sink| sink.error(msg));
    }

    fn debug(&self, msg: &str) {
        self.sinks.iter().for_each(|sink| sink.debug(msg));
    }
}

/// Tracing output plus a fast_log file when one can be opened. Falls back to
/// tracing alone, reporting why.
pub fn init_combined_logger(path: &str, level: log::LevelFilter) -> DynLogger {
    let tracing_sink = crate::adapters::outbound::init_tracing_logger();
    match crate::adapters::outbound::file_logger::init_file_logger(path, level) {
        Ok(file_sink) => Arc::new(MultiLogger::new(vec![tracing_sink, file_sink])),
        Err(e) => {
            tracing_sink.warn(&format!("File logging disabled: {}", e));
            tracing_sink
        }
    }
}
