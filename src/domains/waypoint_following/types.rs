use crate::common::{DomainError, DomainResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position3D {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

/// Unit quaternion orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    /// Rotation about the z axis.
    pub fn from_yaw(yaw: f64) -> Self {
        let half = yaw / 2.0;
        Self {
            x: 0.0,
            y: 0.0,
            z: half.sin(),
            w: half.cos(),
        }
    }

    pub fn yaw(&self) -> f64 {
        let siny_cosp = 2.0 * (self.w * self.z + self.x * self.y);
        let cosy_cosp = 1.0 - 2.0 * (self.y * self.y + self.z * self.z);
        siny_cosp.atan2(cosy_cosp)
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    pub fn normalized(&self) -> DomainResult<Self> {
        let n = self.norm();
        if !n.is_finite() || n < 1e-9 {
            return Err(DomainError::configuration(format!(
                "orientation quaternion ({}, {}, {}, {}) cannot be normalized",
                self.x, self.y, self.z, self.w
            )));
        }
        Ok(Self {
            x: self.x / n,
            y: self.y / n,
            z: self.z / n,
            w: self.w / n,
        })
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Position3D,
    #[serde(default)]
    pub orientation: Quaternion,
}

impl Pose {
    pub fn new(position: Position3D, orientation: Quaternion) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// A bare point becomes a pose facing along +x.
    pub fn from_point(x: f64, y: f64, z: f64) -> Self {
        Self::new(Position3D { x, y, z }, Quaternion::IDENTITY)
    }

    pub fn from_xy_yaw(x: f64, y: f64, yaw: f64) -> Self {
        Self::new(Position3D { x, y, z: 0.0 }, Quaternion::from_yaw(yaw))
    }

    pub fn planar_distance(&self, other: &Pose) -> f64 {
        let dx = self.position.x - other.position.x;
        let dy = self.position.y - other.position.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Checks that every component is finite and returns the pose with a unit orientation.
    pub fn validated(&self) -> DomainResult<Pose> {
        let p = &self.position;
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            return Err(DomainError::configuration(format!(
                "waypoint position ({}, {}, {}) is not finite",
                p.x, p.y, p.z
            )));
        }
        Ok(Pose::new(self.position, self.orientation.normalized()?))
    }
}

/// Pose plus the optional arrival tolerance, as supplied by a waypoint source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaypointSpec {
    pub pose: Pose,
    #[serde(default)]
    pub tolerance: Option<f64>,
}

impl WaypointSpec {
    pub fn new(pose: Pose) -> Self {
        Self {
            pose,
            tolerance: None,
        }
    }

    pub fn with_tolerance(pose: Pose, tolerance: f64) -> Self {
        Self {
            pose,
            tolerance: Some(tolerance),
        }
    }

    pub fn validated(&self) -> DomainResult<WaypointSpec> {
        if let Some(t) = self.tolerance {
            if !t.is_finite() || t < 0.0 {
                return Err(DomainError::configuration(format!(
                    "waypoint tolerance {} must be a non-negative finite distance",
                    t
                )));
            }
        }
        Ok(WaypointSpec {
            pose: self.pose.validated()?,
            tolerance: self.tolerance,
        })
    }
}

impl From<Pose> for WaypointSpec {
    fn from(pose: Pose) -> Self {
        WaypointSpec::new(pose)
    }
}

/// A pose with its stable ordinal in the route.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub index: u64,
    pub pose: Pose,
    pub tolerance: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn yaw_round_trips_through_quaternion() {
        let q = Quaternion::from_yaw(FRAC_PI_2);
        assert!((q.yaw() - FRAC_PI_2).abs() < 1e-9);
        assert!((q.norm() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn point_gets_identity_orientation() {
        let pose = Pose::from_point(1.0, 2.0, 0.0);
        assert_eq!(pose.orientation, Quaternion::IDENTITY);
        assert_eq!(pose.position.y, 2.0);
    }

    #[test]
    fn validation_normalizes_orientation() {
        let pose = Pose::new(
            Position3D { x: 0.0, y: 0.0, z: 0.0 },
            Quaternion { x: 0.0, y: 0.0, z: 0.0, w: 2.0 },
        );
        let valid = pose.validated().unwrap();
        assert_eq!(valid.orientation, Quaternion::IDENTITY);
    }

    #[test]
    fn validation_rejects_zero_quaternion_and_nan_position() {
        let zero = Pose::new(
            Position3D { x: 0.0, y: 0.0, z: 0.0 },
            Quaternion { x: 0.0, y: 0.0, z: 0.0, w: 0.0 },
        );
        assert!(matches!(zero.validated(), Err(DomainError::Configuration { .. })));

        let nan = Pose::from_point(f64::NAN, 0.0, 0.0);
        assert!(matches!(nan.validated(), Err(DomainError::Configuration { .. })));
    }

    #[test]
    fn negative_tolerance_is_rejected() {
        let spec = WaypointSpec::with_tolerance(Pose::from_point(0.0, 0.0, 0.0), -0.5);
        assert!(spec.validated().is_err());
    }
}
