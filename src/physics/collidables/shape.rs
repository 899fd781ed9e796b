//! Immutable collision shapes and the settings they are baked from.

use glam::Vec3;
use std::sync::Arc;

use super::box_shape::BoxShape;
use super::capsule::Capsule;
use super::compound::{Compound, CompoundChildSettings};
use super::convex_hull::ConvexHull;
use super::mesh::Mesh;
use super::ray::RayHit;
use super::sphere::Sphere;
use crate::physics::body_properties::{MassProperties, RigidPose};
use crate::physics::error::PhysicsError;
use crate::physics::handles::SubShapeIdCreator;
use crate::utilities::bounding_box::BoundingBox;

/// Density used when shape settings do not specify one, in kg/m^3.
pub const DEFAULT_DENSITY: f32 = 1000.0;

/// Shapes usable by the convex collision routines.
pub trait ConvexShape {
    /// Bounds in the shape's local space.
    fn local_bounds(&self) -> BoundingBox;

    /// Furthest point of the shape along `direction`, in local space. `direction` need not be normalized.
    fn support(&self, direction: Vec3) -> Vec3;

    /// Support of the shape with its rounding removed. Together with [`convex_radius`](Self::convex_radius)
    /// this describes the same surface as [`support`](Self::support).
    fn core_support(&self, direction: Vec3) -> Vec3 {
        self.support(direction)
    }

    /// Radius of the sphere swept over [`core_support`](Self::core_support).
    fn convex_radius(&self) -> f32 {
        0.0
    }

    /// A point strictly inside the shape.
    fn interior_point(&self) -> Vec3 {
        self.local_bounds().center()
    }

    fn mass_properties(&self) -> MassProperties;

    /// Radius of the largest sphere centered on the interior point that fits in the shape.
    fn inner_radius(&self) -> f32;

    /// Casts a local space ray against the shape.
    fn ray_test(&self, origin: Vec3, direction: Vec3) -> Option<(f32, Vec3)>;
}

/// Discriminant used to key collision routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeKind {
    Sphere,
    Box,
    Capsule,
    ConvexHull,
    Triangle,
    Mesh,
    Compound,
}

impl ShapeKind {
    pub const ALL: [ShapeKind; 7] = [
        ShapeKind::Sphere,
        ShapeKind::Box,
        ShapeKind::Capsule,
        ShapeKind::ConvexHull,
        ShapeKind::Triangle,
        ShapeKind::Mesh,
        ShapeKind::Compound,
    ];

    #[inline]
    pub fn is_convex(&self) -> bool {
        matches!(
            self,
            ShapeKind::Sphere | ShapeKind::Box | ShapeKind::Capsule | ShapeKind::ConvexHull | ShapeKind::Triangle
        )
    }
}

/// Baked, immutable geometry. Shared between bodies through `Arc`.
#[derive(Debug, Clone)]
pub enum Shape {
    Sphere(Sphere),
    Box(BoxShape),
    Capsule(Capsule),
    ConvexHull(ConvexHull),
    Mesh(Mesh),
    Compound(Compound),
}

impl Shape {
    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Sphere(_) => ShapeKind::Sphere,
            Shape::Box(_) => ShapeKind::Box,
            Shape::Capsule(_) => ShapeKind::Capsule,
            Shape::ConvexHull(_) => ShapeKind::ConvexHull,
            Shape::Mesh(_) => ShapeKind::Mesh,
            Shape::Compound(_) => ShapeKind::Compound,
        }
    }

    /// The convex view of the shape, if it has one.
    pub fn as_convex(&self) -> Option<&dyn ConvexShape> {
        match self {
            Shape::Sphere(s) => Some(s),
            Shape::Box(s) => Some(s),
            Shape::Capsule(s) => Some(s),
            Shape::ConvexHull(s) => Some(s),
            Shape::Mesh(_) | Shape::Compound(_) => None,
        }
    }

    pub fn local_bounds(&self) -> BoundingBox {
        match self {
            Shape::Mesh(mesh) => mesh.local_bounds(),
            Shape::Compound(compound) => compound.local_bounds(),
            _ => self
                .as_convex()
                .map(|convex| convex.local_bounds())
                .unwrap_or_default(),
        }
    }

    /// Bounds of the shape placed at `pose`.
    pub fn world_bounds(&self, pose: &RigidPose) -> BoundingBox {
        match self {
            Shape::Sphere(sphere) => {
                BoundingBox::from_center_half_extents(pose.position, Vec3::splat(sphere.radius))
            }
            Shape::Compound(compound) => compound.world_bounds(pose),
            _ => self.local_bounds().transformed(pose.orientation, pose.position),
        }
    }

    pub fn mass_properties(&self) -> MassProperties {
        match self {
            Shape::Mesh(_) => MassProperties::default(),
            Shape::Compound(compound) => compound.mass_properties(),
            _ => self
                .as_convex()
                .map(|convex| convex.mass_properties())
                .unwrap_or_default(),
        }
    }

    /// Center of mass relative to the shape origin.
    pub fn center_of_mass(&self) -> Vec3 {
        self.mass_properties().center_of_mass
    }

    pub fn inner_radius(&self) -> f32 {
        match self {
            Shape::Mesh(_) => 0.0,
            Shape::Compound(compound) => compound.inner_radius(),
            _ => self.as_convex().map_or(0.0, |convex| convex.inner_radius()),
        }
    }

    /// Whether bodies using this shape must be static.
    pub fn requires_static(&self) -> bool {
        match self {
            Shape::Mesh(_) => true,
            Shape::Compound(compound) => compound.children().iter().any(|c| c.shape.requires_static()),
            _ => false,
        }
    }

    /// Casts a ray given in the shape's local space, returning the nearest hit no further than `maximum_fraction`.
    pub fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        maximum_fraction: f32,
        creator: SubShapeIdCreator,
    ) -> Option<RayHit> {
        match self {
            Shape::Mesh(mesh) => mesh.cast_ray(origin, direction, maximum_fraction, creator),
            Shape::Compound(compound) => compound.cast_ray(origin, direction, maximum_fraction, creator),
            _ => {
                let convex = self.as_convex()?;
                let (fraction, normal) = convex.ray_test(origin, direction)?;
                (fraction <= maximum_fraction).then(|| RayHit {
                    fraction,
                    normal,
                    sub_shape_id: creator.id(),
                })
            }
        }
    }
}

/// Mutable construction-time description of a shape. Baked into an immutable [`Shape`] by [`ShapeSettings::build`].
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeSettings {
    Sphere {
        radius: f32,
        density: f32,
    },
    Box {
        half_extents: Vec3,
        density: f32,
    },
    /// Capsule aligned with the local Y axis; `half_height` is half the length of the inner segment.
    Capsule {
        half_height: f32,
        radius: f32,
        density: f32,
    },
    ConvexHull {
        points: Vec<Vec3>,
        density: f32,
    },
    Mesh {
        vertices: Vec<Vec3>,
        triangles: Vec<[u32; 3]>,
    },
    Compound {
        children: Vec<CompoundChildSettings>,
    },
}

impl ShapeSettings {
    pub fn sphere(radius: f32) -> Self {
        ShapeSettings::Sphere {
            radius,
            density: DEFAULT_DENSITY,
        }
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        ShapeSettings::Box {
            half_extents,
            density: DEFAULT_DENSITY,
        }
    }

    pub fn capsule(half_height: f32, radius: f32) -> Self {
        ShapeSettings::Capsule {
            half_height,
            radius,
            density: DEFAULT_DENSITY,
        }
    }

    pub fn convex_hull(points: Vec<Vec3>) -> Self {
        ShapeSettings::ConvexHull {
            points,
            density: DEFAULT_DENSITY,
        }
    }

    pub fn mesh(vertices: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Self {
        ShapeSettings::Mesh { vertices, triangles }
    }

    pub fn compound(children: Vec<CompoundChildSettings>) -> Self {
        ShapeSettings::Compound { children }
    }

    /// Replaces the density of convex settings; other settings are returned unchanged.
    #[must_use]
    pub fn with_density(mut self, value: f32) -> Self {
        match &mut self {
            ShapeSettings::Sphere { density, .. }
            | ShapeSettings::Box { density, .. }
            | ShapeSettings::Capsule { density, .. }
            | ShapeSettings::ConvexHull { density, .. } => *density = value,
            ShapeSettings::Mesh { .. } | ShapeSettings::Compound { .. } => {}
        }
        self
    }

    /// Validates the settings and bakes the immutable shape.
    pub fn build(&self) -> Result<Arc<Shape>, PhysicsError> {
        let shape = match self {
            ShapeSettings::Sphere { radius, density } => Shape::Sphere(Sphere::new(*radius, *density)?),
            ShapeSettings::Box { half_extents, density } => Shape::Box(BoxShape::new(*half_extents, *density)?),
            ShapeSettings::Capsule {
                half_height,
                radius,
                density,
            } => Shape::Capsule(Capsule::new(*half_height, *radius, *density)?),
            ShapeSettings::ConvexHull { points, density } => Shape::ConvexHull(ConvexHull::new(points, *density)?),
            ShapeSettings::Mesh { vertices, triangles } => Shape::Mesh(Mesh::new(vertices, triangles)?),
            ShapeSettings::Compound { children } => Shape::Compound(Compound::new(children)?),
        };
        Ok(Arc::new(shape))
    }
}

pub(crate) fn check_density(density: f32) -> Result<(), PhysicsError> {
    if density > 0.0 && density.is_finite() {
        Ok(())
    } else {
        Err(PhysicsError::InvalidConfiguration(format!(
            "density must be positive and finite, got {density}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(ShapeSettings::sphere(0.0).build().is_err());
        assert!(ShapeSettings::cuboid(Vec3::new(1.0, -1.0, 1.0)).build().is_err());
        assert!(ShapeSettings::capsule(1.0, f32::NAN).build().is_err());
        assert!(ShapeSettings::sphere(1.0).with_density(0.0).build().is_err());
        assert!(ShapeSettings::compound(Vec::new()).build().is_err());
    }

    #[test]
    fn sphere_world_bounds_ignore_rotation() {
        let shape = ShapeSettings::sphere(2.0).build().unwrap();
        let pose = RigidPose::new(Vec3::new(1.0, 0.0, 0.0), glam::Quat::from_rotation_z(1.0));
        let bounds = shape.world_bounds(&pose);
        assert_eq!(bounds.min, Vec3::new(-1.0, -2.0, -2.0));
        assert_eq!(bounds.max, Vec3::new(3.0, 2.0, 2.0));
    }
}
