use glam::Vec3;

use crate::physics::handles::{BodyId, SubShapeId};

/// A ray `origin + fraction * direction` with `fraction` in `[0, 1]`; the direction carries the ray's full length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCast {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl RayCast {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Point at `fraction` along the ray.
    #[inline(always)]
    pub fn point_at(&self, fraction: f32) -> Vec3 {
        self.origin + self.direction * fraction
    }
}

/// Hit of a ray against a single shape, in the space the ray was expressed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Fraction along the ray's direction.
    pub fraction: f32,
    /// Surface normal at the hit, or zero when the ray started inside the shape.
    pub normal: Vec3,
    pub sub_shape_id: SubShapeId,
}

/// Nearest hit of a ray cast against the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastResult {
    pub body_id: BodyId,
    pub fraction: f32,
    pub sub_shape_id: SubShapeId,
}
