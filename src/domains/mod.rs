pub mod logger;
pub mod waypoint_following;

pub use logger::*;
pub use waypoint_following::*;
