pub mod buffered_logger;
pub mod file_journal;
pub mod file_logger;
pub mod multi_logger;
pub mod noop_logger;
pub mod simulated_navigation;
pub mod tracing_logger;
pub mod waypoint_file;

pub use buffered_logger::*;
pub use file_journal::*;
pub use file_logger::*;
pub use multi_logger::*;
pub use noop_logger::*;
pub use simulated_navigation::*;
pub use tracing_logger::*;
pub use waypoint_file::*;
