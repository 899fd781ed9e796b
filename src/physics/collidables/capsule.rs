use glam::{Mat3, Vec3};
use std::f32::consts::PI;

use super::shape::{check_density, ConvexShape};
use super::sphere::ray_sphere;
use crate::physics::body_properties::MassProperties;
use crate::physics::error::PhysicsError;
use crate::utilities::bounding_box::BoundingBox;
use crate::utilities::math_helper;

/// A sphere swept along a segment on the local Y axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capsule {
    /// Half the length of the inner segment.
    pub half_height: f32,
    pub radius: f32,
    pub density: f32,
}

impl Capsule {
    pub fn new(half_height: f32, radius: f32, density: f32) -> Result<Self, PhysicsError> {
        if !(radius > 0.0 && radius.is_finite()) {
            return Err(PhysicsError::InvalidConfiguration(format!(
                "capsule radius must be positive, got {radius}"
            )));
        }
        if !(half_height >= 0.0 && half_height.is_finite()) {
            return Err(PhysicsError::InvalidConfiguration(format!(
                "capsule half height must be non-negative, got {half_height}"
            )));
        }
        check_density(density)?;
        Ok(Self {
            half_height,
            radius,
            density,
        })
    }

    /// Closest point on the inner segment to `point`.
    #[inline]
    pub fn closest_segment_point(&self, point: Vec3) -> Vec3 {
        Vec3::new(0.0, point.y.clamp(-self.half_height, self.half_height), 0.0)
    }
}

impl ConvexShape for Capsule {
    fn local_bounds(&self) -> BoundingBox {
        BoundingBox::from_center_half_extents(
            Vec3::ZERO,
            Vec3::new(self.radius, self.half_height + self.radius, self.radius),
        )
    }

    #[inline(always)]
    fn support(&self, direction: Vec3) -> Vec3 {
        let tip = Vec3::new(0.0, math_helper::binary_sign(direction.y) * self.half_height, 0.0);
        tip + math_helper::normalize_or(direction, Vec3::Y) * self.radius
    }

    #[inline(always)]
    fn core_support(&self, direction: Vec3) -> Vec3 {
        Vec3::new(0.0, math_helper::binary_sign(direction.y) * self.half_height, 0.0)
    }

    #[inline(always)]
    fn convex_radius(&self) -> f32 {
        self.radius
    }

    fn interior_point(&self) -> Vec3 {
        Vec3::ZERO
    }

    fn mass_properties(&self) -> MassProperties {
        let r2 = self.radius * self.radius;
        let height = 2.0 * self.half_height;
        let cylinder_mass = self.density * PI * r2 * height;
        let hemisphere_mass = self.density * (2.0 / 3.0) * PI * r2 * self.radius;
        let axial = cylinder_mass * r2 * 0.5 + 2.0 * hemisphere_mass * 0.4 * r2;
        let lateral = cylinder_mass * (height * height / 12.0 + r2 / 4.0)
            + 2.0 * hemisphere_mass * (0.4 * r2 + height * height / 4.0 + 3.0 * height * self.radius / 8.0);
        MassProperties {
            mass: cylinder_mass + 2.0 * hemisphere_mass,
            inertia: Mat3::from_diagonal(Vec3::new(lateral, axial, lateral)),
            center_of_mass: Vec3::ZERO,
        }
    }

    fn inner_radius(&self) -> f32 {
        self.radius
    }

    fn ray_test(&self, origin: Vec3, direction: Vec3) -> Option<(f32, Vec3)> {
        if (origin - self.closest_segment_point(origin)).length_squared() <= self.radius * self.radius {
            return Some((0.0, Vec3::ZERO));
        }

        let mut best: Option<(f32, Vec3)> = None;
        let mut consider = |hit: Option<(f32, Vec3)>| {
            if let Some((t, n)) = hit {
                if best.map_or(true, |(b, _)| t < b) {
                    best = Some((t, n));
                }
            }
        };

        // Side of the cylinder, ignoring the Y axis.
        let a = direction.x * direction.x + direction.z * direction.z;
        if a > 1e-12 {
            let b = origin.x * direction.x + origin.z * direction.z;
            let c = origin.x * origin.x + origin.z * origin.z - self.radius * self.radius;
            let discriminant = b * b - a * c;
            if discriminant >= 0.0 {
                let t = (-b - discriminant.sqrt()) / a;
                let y = origin.y + direction.y * t;
                if (0.0..=1.0).contains(&t) && y.abs() <= self.half_height {
                    let hit = origin + direction * t;
                    consider(Some((t, Vec3::new(hit.x, 0.0, hit.z) / self.radius)));
                }
            }
        }
        for cap in [-self.half_height, self.half_height] {
            consider(ray_sphere(origin, direction, Vec3::new(0.0, cap, 0.0), self.radius));
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rays_hit_side_and_cap() {
        let capsule = Capsule::new(1.0, 0.5, 1.0).unwrap();
        let (t, n) = capsule.ray_test(Vec3::new(-2.0, 0.5, 0.0), Vec3::new(4.0, 0.0, 0.0)).unwrap();
        assert!((t - 0.375).abs() < 1e-5);
        assert!((n - Vec3::NEG_X).length() < 1e-5);

        let (t, n) = capsule.ray_test(Vec3::new(0.0, 4.0, 0.0), Vec3::new(0.0, -4.0, 0.0)).unwrap();
        assert!((t - 0.625).abs() < 1e-5);
        assert!((n - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn zero_height_capsule_is_a_sphere() {
        let capsule = Capsule::new(0.0, 1.0, 1.0).unwrap();
        let mass = capsule.mass_properties();
        assert!((mass.mass - 4.0 / 3.0 * PI).abs() < 1e-4);
        assert!((mass.inertia.x_axis.x - mass.inertia.y_axis.y).abs() < 1e-4);
    }
}
