use glam::{Mat3, Vec3};

use super::shape::{check_density, ConvexShape};
use crate::physics::body_properties::MassProperties;
use crate::physics::error::PhysicsError;
use crate::utilities::bounding_box::BoundingBox;
use crate::utilities::math_helper;

/// Collision shape representing a sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    /// Radius of the sphere.
    pub radius: f32,
    pub density: f32,
}

impl Sphere {
    /// Creates a sphere shape.
    pub fn new(radius: f32, density: f32) -> Result<Self, PhysicsError> {
        if !(radius > 0.0 && radius.is_finite()) {
            return Err(PhysicsError::InvalidConfiguration(format!(
                "sphere radius must be positive, got {radius}"
            )));
        }
        check_density(density)?;
        Ok(Self { radius, density })
    }
}

impl ConvexShape for Sphere {
    #[inline(always)]
    fn local_bounds(&self) -> BoundingBox {
        BoundingBox::from_center_half_extents(Vec3::ZERO, Vec3::splat(self.radius))
    }

    #[inline(always)]
    fn support(&self, direction: Vec3) -> Vec3 {
        math_helper::normalize_or(direction, Vec3::Y) * self.radius
    }

    #[inline(always)]
    fn core_support(&self, _direction: Vec3) -> Vec3 {
        Vec3::ZERO
    }

    #[inline(always)]
    fn convex_radius(&self) -> f32 {
        self.radius
    }

    #[inline(always)]
    fn interior_point(&self) -> Vec3 {
        Vec3::ZERO
    }

    fn mass_properties(&self) -> MassProperties {
        let mass = self.density * (4.0 / 3.0) * std::f32::consts::PI * self.radius.powi(3);
        MassProperties {
            mass,
            inertia: Mat3::from_diagonal(Vec3::splat(0.4 * mass * self.radius * self.radius)),
            center_of_mass: Vec3::ZERO,
        }
    }

    fn inner_radius(&self) -> f32 {
        self.radius
    }

    fn ray_test(&self, origin: Vec3, direction: Vec3) -> Option<(f32, Vec3)> {
        ray_sphere(origin, direction, Vec3::ZERO, self.radius)
    }
}

/// Intersects `origin + t * direction` with a sphere for `t` in `[0, 1]`.
///
/// A ray starting inside the sphere hits at `t = 0` with a zero normal.
pub(crate) fn ray_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<(f32, Vec3)> {
    let length = direction.length();
    let relative = origin - center;
    if relative.length_squared() <= radius * radius {
        return Some((0.0, Vec3::ZERO));
    }
    if length < 1e-12 {
        return None;
    }
    let d = direction / length;

    // Move the origin up to the earliest possible impact time to keep the quadratic well conditioned.
    let t_offset = (-relative.dot(d) - radius).max(0.0);
    let o = relative + d * t_offset;
    let b = o.dot(d);
    let c = o.dot(o) - radius * radius;
    if b > 0.0 && c > 0.0 {
        return None;
    }
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let t = (-b - discriminant.sqrt()).max(-t_offset);
    let normal = (o + d * t) / radius;
    let fraction = (t + t_offset) / length;
    (fraction <= 1.0).then_some((fraction, normal))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_hits_front_of_sphere() {
        let sphere = Sphere::new(1.0, 1.0).unwrap();
        let (fraction, normal) = sphere
            .ray_test(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 0.0))
            .unwrap();
        assert!((fraction - 0.4).abs() < 1e-5);
        assert!((normal - Vec3::NEG_X).length() < 1e-5);
        assert!(sphere.ray_test(Vec3::new(-5.0, 2.0, 0.0), Vec3::new(10.0, 0.0, 0.0)).is_none());
        assert!(sphere.ray_test(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(3.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn mass_matches_solid_sphere() {
        let sphere = Sphere::new(1.0, 1.0).unwrap();
        let mass = sphere.mass_properties();
        assert!((mass.mass - 4.18879).abs() < 1e-4);
        assert!((mass.inertia.x_axis.x - 0.4 * mass.mass).abs() < 1e-4);
    }
}
