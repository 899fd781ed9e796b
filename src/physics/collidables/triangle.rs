use glam::Vec3;

use super::shape::ConvexShape;
use crate::physics::body_properties::MassProperties;
use crate::utilities::bounding_box::BoundingBox;

/// A single mesh triangle. Only used transiently while colliding against or ray casting a mesh.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { a, b, c }
    }

    /// Unnormalized face normal; its length is twice the area.
    #[inline(always)]
    pub fn scaled_normal(&self) -> Vec3 {
        (self.b - self.a).cross(self.c - self.a)
    }

    /// Whether the triangle has (numerically) no area.
    pub fn is_degenerate(&self) -> bool {
        let longest = (self.b - self.a)
            .length_squared()
            .max((self.c - self.b).length_squared())
            .max((self.a - self.c).length_squared());
        self.scaled_normal().length_squared() <= 1e-10 * longest * longest || longest == 0.0
    }

    pub fn centroid(&self) -> Vec3 {
        (self.a + self.b + self.c) / 3.0
    }

    pub fn bounds(&self) -> BoundingBox {
        BoundingBox::new(self.a.min(self.b).min(self.c), self.a.max(self.b).max(self.c))
    }
}

impl ConvexShape for Triangle {
    fn local_bounds(&self) -> BoundingBox {
        self.bounds()
    }

    fn support(&self, direction: Vec3) -> Vec3 {
        let da = self.a.dot(direction);
        let db = self.b.dot(direction);
        let dc = self.c.dot(direction);
        if da >= db && da >= dc {
            self.a
        } else if db >= dc {
            self.b
        } else {
            self.c
        }
    }

    fn interior_point(&self) -> Vec3 {
        self.centroid()
    }

    fn mass_properties(&self) -> MassProperties {
        MassProperties::default()
    }

    fn inner_radius(&self) -> f32 {
        0.0
    }

    /// Double-sided ray test.
    fn ray_test(&self, origin: Vec3, direction: Vec3) -> Option<(f32, Vec3)> {
        let ab = self.b - self.a;
        let ac = self.c - self.a;
        let p = direction.cross(ac);
        let determinant = ab.dot(p);
        if determinant.abs() < 1e-12 {
            return None;
        }
        let inverse = 1.0 / determinant;
        let ao = origin - self.a;
        let u = ao.dot(p) * inverse;
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = ao.cross(ab);
        let v = direction.dot(q) * inverse;
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = ac.dot(q) * inverse;
        if !(0.0..=1.0).contains(&t) {
            return None;
        }
        let normal = self.scaled_normal().normalize();
        let facing = if normal.dot(direction) > 0.0 { -normal } else { normal };
        Some((t, facing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ray_hits_from_both_sides() {
        let t = Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Z);
        let (down, n_down) = t.ray_test(Vec3::new(0.2, 1.0, 0.2), Vec3::new(0.0, -2.0, 0.0)).unwrap();
        let (up, n_up) = t.ray_test(Vec3::new(0.2, -1.0, 0.2), Vec3::new(0.0, 2.0, 0.0)).unwrap();
        assert!((down - 0.5).abs() < 1e-6 && (up - 0.5).abs() < 1e-6);
        assert!(n_down.y > 0.99 && n_up.y < -0.99);
        assert!(t.ray_test(Vec3::new(0.8, 1.0, 0.8), Vec3::new(0.0, -2.0, 0.0)).is_none());
    }

    #[test]
    fn collinear_triangle_is_degenerate() {
        assert!(Triangle::new(Vec3::ZERO, Vec3::X, Vec3::X * 2.0).is_degenerate());
        assert!(Triangle::new(Vec3::ONE, Vec3::ONE, Vec3::ONE).is_degenerate());
        assert!(!Triangle::new(Vec3::ZERO, Vec3::X, Vec3::Z).is_degenerate());
    }
}
