//! Value types describing where a body is and how its mass is distributed.

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utilities::math_helper;

/// Position and orientation of a body or shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RigidPose {
    pub orientation: Quat,
    pub position: Vec3,
}

impl Default for RigidPose {
    #[inline(always)]
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl RigidPose {
    pub const IDENTITY: Self = Self {
        orientation: Quat::IDENTITY,
        position: Vec3::ZERO,
    };

    #[inline(always)]
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position,
            orientation,
        }
    }

    /// Unrotated pose at `position`.
    #[inline(always)]
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            orientation: Quat::IDENTITY,
        }
    }

    /// Transforms a point from the pose's local space into world space.
    #[inline(always)]
    pub fn transform(&self, v: Vec3) -> Vec3 {
        self.orientation * v + self.position
    }

    /// Transforms a world space point into the pose's local space.
    #[inline(always)]
    pub fn transform_by_inverse(&self, v: Vec3) -> Vec3 {
        self.orientation.conjugate() * (v - self.position)
    }

    #[inline(always)]
    pub fn inverse(&self) -> Self {
        let orientation = self.orientation.conjugate();
        Self {
            orientation,
            position: orientation * -self.position,
        }
    }

    /// Pose of a child placed at `local` relative to this pose.
    #[inline(always)]
    pub fn then_local(&self, local: &RigidPose) -> Self {
        Self {
            orientation: (self.orientation * local.orientation).normalize(),
            position: self.transform(local.position),
        }
    }
}

impl fmt::Display for RigidPose {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{} @ {}]", self.position, self.orientation)
    }
}

/// Mass, inertia and center of mass of a shape or body, expressed in the shape's local space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MassProperties {
    pub mass: f32,
    /// Inertia tensor about the center of mass.
    pub inertia: Mat3,
    /// Center of mass relative to the shape origin.
    pub center_of_mass: Vec3,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self {
            mass: 0.0,
            inertia: Mat3::ZERO,
            center_of_mass: Vec3::ZERO,
        }
    }
}

impl MassProperties {
    /// Shifts the inertia tensor to be expressed about a point displaced by `offset` from the center of mass
    /// (parallel axis theorem).
    pub fn inertia_about(&self, offset: Vec3) -> Mat3 {
        let d2 = offset.length_squared();
        let outer = Mat3::from_cols(offset * offset.x, offset * offset.y, offset * offset.z);
        self.inertia + (Mat3::from_diagonal(Vec3::splat(d2)) - outer) * self.mass
    }

    /// Rotates and translates the properties into a parent frame.
    pub fn transformed(&self, pose: &RigidPose) -> Self {
        let rotation = Mat3::from_quat(pose.orientation);
        Self {
            mass: self.mass,
            inertia: rotation * self.inertia * rotation.transpose(),
            center_of_mass: pose.transform(self.center_of_mass),
        }
    }

    /// Combines several parts into one set of properties with a shared center of mass.
    pub fn combine(parts: &[MassProperties]) -> Self {
        let mass: f32 = parts.iter().map(|p| p.mass).sum();
        if mass <= 0.0 {
            return Self::default();
        }
        let center_of_mass = parts.iter().map(|p| p.center_of_mass * p.mass).sum::<Vec3>() / mass;
        let inertia = parts
            .iter()
            .fold(Mat3::ZERO, |acc, p| acc + p.inertia_about(p.center_of_mass - center_of_mass));
        Self {
            mass,
            inertia,
            center_of_mass,
        }
    }

    /// Inverse inertia tensor, or zero when the tensor is singular.
    pub fn inverse_inertia(&self) -> Mat3 {
        math_helper::try_inverse(self.inertia).unwrap_or(Mat3::ZERO)
    }
}
