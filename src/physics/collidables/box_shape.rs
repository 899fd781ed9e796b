use glam::{Mat3, Vec3};

use super::shape::{check_density, ConvexShape};
use crate::physics::body_properties::MassProperties;
use crate::physics::error::PhysicsError;
use crate::utilities::bounding_box::BoundingBox;
use crate::utilities::math_helper;

/// Collision shape representing a solid cuboid centered on the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxShape {
    pub half_extents: Vec3,
    pub density: f32,
}

impl BoxShape {
    pub fn new(half_extents: Vec3, density: f32) -> Result<Self, PhysicsError> {
        if !(half_extents.cmpgt(Vec3::ZERO).all() && math_helper::is_finite(half_extents)) {
            return Err(PhysicsError::InvalidConfiguration(format!(
                "box half extents must be positive, got {half_extents}"
            )));
        }
        check_density(density)?;
        Ok(Self { half_extents, density })
    }
}

impl ConvexShape for BoxShape {
    #[inline(always)]
    fn local_bounds(&self) -> BoundingBox {
        BoundingBox::from_center_half_extents(Vec3::ZERO, self.half_extents)
    }

    #[inline(always)]
    fn support(&self, direction: Vec3) -> Vec3 {
        Vec3::new(
            math_helper::binary_sign(direction.x),
            math_helper::binary_sign(direction.y),
            math_helper::binary_sign(direction.z),
        ) * self.half_extents
    }

    #[inline(always)]
    fn interior_point(&self) -> Vec3 {
        Vec3::ZERO
    }

    fn mass_properties(&self) -> MassProperties {
        let size = self.half_extents * 2.0;
        let mass = self.density * size.x * size.y * size.z;
        let squared = size * size;
        MassProperties {
            mass,
            inertia: Mat3::from_diagonal(
                Vec3::new(squared.y + squared.z, squared.x + squared.z, squared.x + squared.y) * (mass / 12.0),
            ),
            center_of_mass: Vec3::ZERO,
        }
    }

    fn inner_radius(&self) -> f32 {
        self.half_extents.min_element()
    }

    fn ray_test(&self, origin: Vec3, direction: Vec3) -> Option<(f32, Vec3)> {
        let bounds = self.local_bounds();
        if bounds.contains_point(origin) {
            return Some((0.0, Vec3::ZERO));
        }
        let fraction = bounds.ray_entry(origin, direction, 1.0)?;
        // The entry face is the one whose plane the hit point lies on most closely.
        let hit = origin + direction * fraction;
        let scaled = hit / self.half_extents;
        let abs = scaled.abs();
        let normal = if abs.x >= abs.y && abs.x >= abs.z {
            Vec3::new(scaled.x.signum(), 0.0, 0.0)
        } else if abs.y >= abs.z {
            Vec3::new(0.0, scaled.y.signum(), 0.0)
        } else {
            Vec3::new(0.0, 0.0, scaled.z.signum())
        };
        Some((fraction, normal))
    }
}
