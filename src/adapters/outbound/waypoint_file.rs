use crate::common::{DomainError, DomainResult};
use crate::domains::waypoint_following::{Pose, Position3D, Quaternion, WaypointSource, WaypointSpec};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One waypoint as written in a route file. Orientation is either a yaw
/// angle in radians or a quaternion; neither means facing along +x.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointRecord {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yaw: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Quaternion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<f64>,
}

impl WaypointRecord {
    pub fn to_spec(&self) -> DomainResult<WaypointSpec> {
        let orientation = match (self.yaw, self.orientation) {
            (Some(_), Some(_)) => {
                return Err(DomainError::configuration(
                    "give either yaw or orientation for a waypoint, not both",
                ))
            }
            (Some(yaw), None) => Quaternion::from_yaw(yaw),
            (None, Some(q)) => q,
            (None, None) => Quaternion::IDENTITY,
        };
        let pose = Pose::new(
            Position3D {
                x: self.x,
                y: self.y,
                z: self.z,
            },
            orientation,
        );
        WaypointSpec {
            pose,
            tolerance: self.tolerance,
        }
        .validated()
    }

    pub fn from_spec(spec: &WaypointSpec) -> Self {
        let orientation = spec.pose.orientation;
        Self {
            x: spec.pose.position.x,
            y: spec.pose.position.y,
            z: spec.pose.position.z,
            yaw: None,
            orientation: (orientation != Quaternion::IDENTITY).then_some(orientation),
            tolerance: spec.tolerance,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct TomlRoute {
    #[serde(default)]
    waypoints: Vec<WaypointRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum JsonRoute {
    List(Vec<WaypointRecord>),
    Wrapped { waypoints: Vec<WaypointRecord> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteFormat {
    Toml,
    Json,
}

impl RouteFormat {
    pub fn from_path(path: &Path) -> DomainResult<Self> {
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("toml") => Ok(RouteFormat::Toml),
            Some("json") => Ok(RouteFormat::Json),
            _ => Err(DomainError::configuration(format!(
                "cannot tell the route format of {} (expected .toml or .json)",
                path.display()
            ))),
        }
    }
}

/// Loads an ordered route from a TOML or JSON file.
#[derive(Debug, Clone)]
pub struct FileWaypointSource {
    path: PathBuf,
}

impl FileWaypointSource {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn parse(content: &str, format: RouteFormat) -> DomainResult<Vec<WaypointSpec>> {
        let records = match format {
            RouteFormat::Toml => {
                toml::from_str::<TomlRoute>(content)
                    .map_err(|e| DomainError::configuration(format!("invalid TOML route: {}", e)))?
                    .waypoints
            }
            RouteFormat::Json => match serde_json::from_str::<JsonRoute>(content)
                .map_err(|e| DomainError::configuration(format!("invalid JSON route: {}", e)))?
            {
                JsonRoute::List(records) => records,
                JsonRoute::Wrapped { waypoints } => waypoints,
            },
        };

        if records.is_empty() {
            return Err(DomainError::configuration("route file contains no waypoints"));
        }
        records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                record.to_spec().map_err(|e| {
                    DomainError::configuration(format!("waypoint {} in route file: {}", i, e))
                })
            })
            .collect()
    }

    /// Writes `waypoints` to `path` in the format its extension names.
    pub fn save(path: &Path, waypoints: &[WaypointSpec]) -> DomainResult<()> {
        let records: Vec<WaypointRecord> = waypoints.iter().map(WaypointRecord::from_spec).collect();
        let content = match RouteFormat::from_path(path)? {
            RouteFormat::Toml => toml::to_string_pretty(&TomlRoute { waypoints: records })
                .map_err(|e| DomainError::InfrastructureError(format!("Failed to encode route: {}", e)))?,
            RouteFormat::Json => serde_json::to_string_pretty(&records)?,
        };
        std::fs::write(path, content).map_err(|e| {
            DomainError::InfrastructureError(format!("Failed to write {}: {}", path.display(), e))
        })
    }
}

impl WaypointSource for FileWaypointSource {
    fn load_waypoints(&self) -> DomainResult<Vec<WaypointSpec>> {
        let format = RouteFormat::from_path(&self.path)?;
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            DomainError::configuration(format!("cannot read route {}: {}", self.path.display(), e))
        })?;
        Self::parse(&content, format)
    }

    fn describe(&self) -> String {
        format!("route file {}", self.path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn toml_route_with_mixed_orientations() {
        let specs = FileWaypointSource::parse(
            r#"
            [[waypoints]]
            x = 1.0
            y = 2.0

            [[waypoints]]
            x = 3.0
            y = 4.0
            yaw = 1.5707963267948966
            tolerance = 0.3

            [[waypoints]]
            x = 5.0
            y = 6.0
            orientation = { x = 0.0, y = 0.0, z = 0.0, w = 2.0 }
            "#,
            RouteFormat::Toml,
        )
        .unwrap();

        assert_eq!(specs.len(), 3);
        assert_eq!(specs[0].pose.orientation, Quaternion::IDENTITY);
        assert!((specs[1].pose.orientation.yaw() - FRAC_PI_2).abs() < 1e-9);
        assert_eq!(specs[1].tolerance, Some(0.3));
        assert!((specs[2].pose.orientation.w - 1.0).abs() < 1e-12);
    }

    #[test]
    fn json_accepts_array_and_wrapped_forms() {
        let bare = FileWaypointSource::parse(r#"[{"x": 1.0, "y": 0.0}]"#, RouteFormat::Json).unwrap();
        let wrapped = FileWaypointSource::parse(
            r#"{"waypoints": [{"x": 1.0, "y": 0.0}, {"x": 2.0, "y": 0.0}]}"#,
            RouteFormat::Json,
        )
        .unwrap();
        assert_eq!(bare.len(), 1);
        assert_eq!(wrapped.len(), 2);
    }

    #[test]
    fn empty_and_malformed_routes_are_configuration_errors() {
        let empty = FileWaypointSource::parse("[]", RouteFormat::Json);
        assert!(matches!(empty, Err(DomainError::Configuration { .. })));

        let zero_quaternion = FileWaypointSource::parse(
            r#"[{"x": 1.0, "y": 0.0, "orientation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 0.0}}]"#,
            RouteFormat::Json,
        );
        assert!(matches!(zero_quaternion, Err(DomainError::Configuration { .. })));

        let both = FileWaypointSource::parse(
            r#"[{"x": 1.0, "y": 0.0, "yaw": 0.1, "orientation": {"x": 0.0, "y": 0.0, "z": 0.0, "w": 1.0}}]"#,
            RouteFormat::Json,
        );
        assert!(both.is_err());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(RouteFormat::from_path(Path::new("route.yaml")).is_err());
        assert_eq!(RouteFormat::from_path(Path::new("ROUTE.TOML")).unwrap(), RouteFormat::Toml);
    }
}
