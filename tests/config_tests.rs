use std::time::Duration;
use tempfile::TempDir;

use waypoint_follower::config::Config;
use waypoint_follower::domains::waypoint_following::ExhaustionPolicy;

const SAMPLE: &str = r#"
[follower]
frame_id = "odom"
max_retries = 2
on_exhausted = "abort_route"
goal_timeout_secs = 30.0
dwell_secs = 0.5
distance_tolerance = 0.2

[logging]
level = "debug"
file = "follower.log"

[simulation]
speed_mps = 0.8
feedback_interval_ms = 50
failure_probability = 0.1
start = { x = 1.0, y = -2.0 }
"#;

#[tokio::test]
async fn reads_every_section_from_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    tokio::fs::write(&path, SAMPLE).await.unwrap();

    let config = Config::from_file(&path).await.unwrap();
    assert_eq!(config.follower.frame_id, "odom");
    assert_eq!(config.follower.on_exhausted, ExhaustionPolicy::AbortRoute);
    assert_eq!(config.logging.file.as_deref(), Some("follower.log"));
    assert_eq!(config.logging.level_filter(), log::LevelFilter::Debug);
    assert_eq!(config.simulation.start.y, -2.0);

    let settings = config.follower.controller_settings();
    assert_eq!(settings.retry_policy.max_retries, 2);
    assert_eq!(settings.goal_timeout, Some(Duration::from_secs(30)));
    assert_eq!(settings.dwell, Duration::from_millis(500));
    assert_eq!(settings.default_tolerance, Some(0.2));
    assert_eq!(settings.cancel_timeout, Duration::from_secs(10));
}

#[tokio::test]
async fn from_file_rejects_invalid_values() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    tokio::fs::write(&path, "[follower]\ngoal_timeout_secs = -5.0\n")
        .await
        .unwrap();
    assert!(Config::from_file(&path).await.is_err());
}

#[test]
fn load_layers_environment_over_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, SAMPLE).unwrap();

    std::env::set_var("WAYPOINT_FOLLOWER__FOLLOWER__MAX_RETRIES", "5");
    let loaded = Config::load(&path);
    std::env::remove_var("WAYPOINT_FOLLOWER__FOLLOWER__MAX_RETRIES");

    let config = loaded.unwrap();
    assert_eq!(config.follower.max_retries, 5);
    assert_eq!(config.follower.frame_id, "odom");
    assert_eq!(config.simulation.feedback_interval_ms, 50);
}

#[test]
fn load_without_a_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let config = Config::load(dir.path().join("absent.toml")).unwrap();
    assert_eq!(config.follower.frame_id, "map");
    assert_eq!(config.follower.history_len, 20);
    assert!(config.logging.file.is_none());
}
