pub mod actors;
pub mod controller;
pub mod events;
pub mod goal;
pub mod ports;
pub mod projections;
pub mod queue;
pub mod retry;
pub mod state;
pub mod types;

pub use actors::*;
pub use controller::*;
pub use events::*;
pub use goal::*;
pub use ports::*;
pub use projections::*;
pub use queue::*;
pub use retry::*;
pub use state::*;
pub use types::*;
