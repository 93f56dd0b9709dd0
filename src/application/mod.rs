pub mod waypoint_following_service;

pub use waypoint_following_service::*;
