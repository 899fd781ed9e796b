use glam::{Quat, Vec3};
use std::fmt;

/// Provides simple axis-aligned bounding box functionality.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Location with the lowest X, Y, and Z coordinates in the axis-aligned bounding box.
    pub min: Vec3,
    /// Location with the highest X, Y, and Z coordinates in the axis-aligned bounding box.
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::ZERO)
    }
}

impl BoundingBox {
    /// Constructs a bounding box from the specified minimum and maximum.
    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Constructs a bounding box centered on `center` with the given half extents.
    #[inline]
    pub fn from_center_half_extents(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Creates the smallest possible bounding box that contains a list of points.
    ///
    /// Returns `None` for an empty list.
    pub fn from_points(points: &[Vec3]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut result = Self::new(*first, *first);
        for point in rest {
            result.min = result.min.min(*point);
            result.max = result.max.max(*point);
        }
        Some(result)
    }

    /// Determines if a bounding box intersects another bounding box.
    /// Touching boxes count as intersecting.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        let no_intersection_on_axes = self.max.cmplt(other.min) | other.max.cmplt(self.min);
        !no_intersection_on_axes.any()
    }

    /// Whether `other` lies entirely within this box.
    #[inline]
    pub fn contains(&self, other: &Self) -> bool {
        self.min.cmple(other.min).all() && self.max.cmpge(other.max).all()
    }

    #[inline]
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.min.cmple(point).all() && self.max.cmpge(point).all()
    }

    /// Computes a bounding box which contains two other bounding boxes.
    #[inline]
    pub fn merged(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Returns the box grown by `margin` along every axis in both directions.
    #[inline]
    pub fn expanded(&self, margin: f32) -> Self {
        let m = Vec3::splat(margin);
        Self {
            min: self.min - m,
            max: self.max + m,
        }
    }

    /// Returns the box moved by `offset`.
    #[inline]
    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            min: self.min + offset,
            max: self.max + offset,
        }
    }

    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// Computes the volume of the bounding box.
    #[inline]
    pub fn compute_volume(&self) -> f32 {
        let diagonal = self.max - self.min;
        diagonal.x * diagonal.y * diagonal.z
    }

    /// Surface area; used as the insertion cost metric by the trees.
    #[inline]
    pub fn surface_area(&self) -> f32 {
        let d = self.max - self.min;
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }

    /// Computes the world bounds of a local box after rotating and translating it.
    pub fn transformed(&self, orientation: Quat, position: Vec3) -> Self {
        let center = orientation * self.center() + position;
        let half = self.half_extents();
        let basis = glam::Mat3::from_quat(orientation);
        let extent = Vec3::new(
            basis.x_axis.x.abs() * half.x + basis.y_axis.x.abs() * half.y + basis.z_axis.x.abs() * half.z,
            basis.x_axis.y.abs() * half.x + basis.y_axis.y.abs() * half.y + basis.z_axis.y.abs() * half.z,
            basis.x_axis.z.abs() * half.x + basis.y_axis.z.abs() * half.y + basis.z_axis.z.abs() * half.z,
        );
        Self::from_center_half_extents(center, extent)
    }

    /// Intersects a ray `origin + t * direction` against the box.
    ///
    /// Returns the entry parameter clamped to zero when the origin is inside, or `None` when the ray
    /// misses or enters beyond `max_t`.
    pub fn ray_entry(&self, origin: Vec3, direction: Vec3, max_t: f32) -> Option<f32> {
        let mut t_min = 0.0f32;
        let mut t_max = max_t;
        for axis in 0..3 {
            let o = origin[axis];
            let d = direction[axis];
            if d.abs() < 1e-12 {
                if o < self.min[axis] || o > self.max[axis] {
                    return None;
                }
                continue;
            }
            let inverse = 1.0 / d;
            let mut t0 = (self.min[axis] - o) * inverse;
            let mut t1 = (self.max[axis] - o) * inverse;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {})", self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_boxes_intersect() {
        let a = BoundingBox::new(Vec3::ZERO, Vec3::ONE);
        let b = BoundingBox::new(Vec3::new(1.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        let c = BoundingBox::new(Vec3::new(1.01, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn rotated_bounds_enclose_corners() {
        let local = BoundingBox::new(Vec3::new(-1.0, -2.0, -3.0), Vec3::new(1.0, 2.0, 3.0));
        let rotation = Quat::from_rotation_y(0.7) * Quat::from_rotation_x(0.3);
        let world = local.transformed(rotation, Vec3::new(5.0, 0.0, 0.0));
        for x in [-1.0, 1.0] {
            for y in [-2.0, 2.0] {
                for z in [-3.0, 3.0] {
                    let corner = rotation * Vec3::new(x, y, z) + Vec3::new(5.0, 0.0, 0.0);
                    assert!(world.expanded(1e-4).contains_point(corner));
                }
            }
        }
    }

    #[test]
    fn ray_entry_reports_first_hit() {
        let b = BoundingBox::new(Vec3::splat(-1.0), Vec3::splat(1.0));
        let t = b.ray_entry(Vec3::new(-5.0, 0.0, 0.0), Vec3::X, 10.0).unwrap();
        assert!((t - 4.0).abs() < 1e-5);
        assert!(b.ray_entry(Vec3::new(-5.0, 3.0, 0.0), Vec3::X, 10.0).is_none());
        assert!(b.ray_entry(Vec3::new(-5.0, 0.0, 0.0), Vec3::X, 3.0).is_none());
        assert_eq!(b.ray_entry(Vec3::ZERO, Vec3::X, 1.0), Some(0.0));
    }
}
