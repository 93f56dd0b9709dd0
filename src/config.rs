use crate::common::{DomainError, DomainResult};
use crate::domains::waypoint_following::{ControllerSettings, ExhaustionPolicy, RetryPolicy};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `WAYPOINT_FOLLOWER__FOLLOWER__MAX_RETRIES=3`.
pub const ENV_PREFIX: &str = "WAYPOINT_FOLLOWER";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub follower: FollowerConfig,
    pub logging: LoggingConfig,
    pub simulation: SimulationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FollowerConfig {
    pub controller_id: String,
    pub frame_id: String,
    pub max_retries: u32,
    pub on_exhausted: ExhaustionPolicy,
    /// 0 disables the watchdog.
    pub goal_timeout_secs: f64,
    pub cancel_timeout_secs: f64,
    pub dwell_secs: f64,
    /// 0 disables early arrival unless a waypoint carries its own tolerance.
    pub distance_tolerance: f64,
    pub history_len: usize,
    pub command_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StartPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub speed_mps: f64,
    pub feedback_interval_ms: u64,
    pub failure_probability: f64,
    pub start: StartPosition,
}

impl Config {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: Config = toml::from_str(&content)?;
        config.follower.validate()?;
        Ok(config)
    }

    /// Layers an optional file under environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config: Config = settings.try_deserialize()?;
        config.follower.validate()?;
        Ok(config)
    }
}

impl FollowerConfig {
    pub fn validate(&self) -> DomainResult<()> {
        let durations = [
            ("goal_timeout_secs", self.goal_timeout_secs),
            ("cancel_timeout_secs", self.cancel_timeout_secs),
            ("dwell_secs", self.dwell_secs),
        ];
        for (name, value) in durations {
            if !value.is_finite() || value < 0.0 {
                return Err(DomainError::configuration(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if self.cancel_timeout_secs == 0.0 {
            return Err(DomainError::configuration("cancel_timeout_secs must be positive"));
        }
        if !self.distance_tolerance.is_finite() || self.distance_tolerance < 0.0 {
            return Err(DomainError::configuration(format!(
                "distance_tolerance must be a non-negative number, got {}",
                self.distance_tolerance
            )));
        }
        if self.frame_id.trim().is_empty() {
            return Err(DomainError::configuration("frame_id must not be empty"));
        }
        if self.command_buffer == 0 {
            return Err(DomainError::configuration("command_buffer must be at least 1"));
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, self.on_exhausted)
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            controller_id: self.controller_id.clone(),
            frame_id: self.frame_id.clone(),
            retry_policy: self.retry_policy(),
            goal_timeout: (self.goal_timeout_secs > 0.0)
                .then(|| Duration::from_secs_f64(self.goal_timeout_secs)),
            cancel_timeout: Duration::from_secs_f64(self.cancel_timeout_secs),
            dwell: Duration::from_secs_f64(self.dwell_secs),
            default_tolerance: (self.distance_tolerance > 0.0).then_some(self.distance_tolerance),
            history_len: self.history_len,
            command_buffer: self.command_buffer,
        }
    }
}

impl LoggingConfig {
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            controller_id: "waypoint-follower".to_string(),
            frame_id: "map".to_string(),
            max_retries: 1,
            on_exhausted: ExhaustionPolicy::Skip,
            goal_timeout_secs: 60.0,
            cancel_timeout_secs: 10.0,
            dwell_secs: 0.0,
            distance_tolerance: 0.0,
            history_len: 20,
            command_buffer: 64,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            speed_mps: 0.5,
            feedback_interval_ms: 100,
            failure_probability: 0.0,
            start: StartPosition::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = Config::default();
        assert!(config.follower.validate().is_ok());
        assert_eq!(config.follower.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [follower]
            max_retries = 3
            on_exhausted = "abort_route"
            dwell_secs = 1.5
            "#,
        )
        .unwrap();
        assert_eq!(config.follower.max_retries, 3);
        assert_eq!(config.follower.on_exhausted, ExhaustionPolicy::AbortRoute);
        assert_eq!(config.follower.frame_id, "map");
        assert_eq!(config.simulation.feedback_interval_ms, 100);

        let settings = config.follower.controller_settings();
        assert_eq!(settings.dwell, Duration::from_millis(1500));
        assert_eq!(settings.goal_timeout, Some(Duration::from_secs(60)));
        assert_eq!(settings.default_tolerance, None);
    }

    #[test]
    fn zero_timeout_disables_watchdog() {
        let follower = FollowerConfig {
            goal_timeout_secs: 0.0,
            distance_tolerance: 0.25,
            ..FollowerConfig::default()
        };
        let settings = follower.controller_settings();
        assert_eq!(settings.goal_timeout, None);
        assert_eq!(settings.default_tolerance, Some(0.25));
    }

    #[test]
    fn nonsensical_values_are_rejected() {
        let negative = FollowerConfig {
            dwell_secs: -1.0,
            ..FollowerConfig::default()
        };
        assert!(matches!(negative.validate(), Err(DomainError::Configuration { .. })));

        let nan = FollowerConfig {
            distance_tolerance: f64::NAN,
            ..FollowerConfig::default()
        };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn unknown_log_level_defaults_to_info() {
        let logging = LoggingConfig {
            level: "chatty".to_string(),
            file: None,
        };
        assert_eq!(logging.level_filter(), log::LevelFilter::Info);
    }
}
