use glam::Vec3;
use std::sync::Arc;

use super::ray::RayHit;
use super::shape::{Shape, ShapeSettings};
use crate::physics::body_properties::{MassProperties, RigidPose};
use crate::physics::error::PhysicsError;
use crate::physics::handles::{bits_for_child_count, SubShapeIdCreator};
use crate::utilities::bounding_box::BoundingBox;

/// Construction-time description of one compound child.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundChildSettings {
    /// Placement of the child relative to the compound's origin.
    pub pose: RigidPose,
    pub shape: ShapeSettings,
}

impl CompoundChildSettings {
    pub fn new(pose: RigidPose, shape: ShapeSettings) -> Self {
        Self { pose, shape }
    }
}

#[derive(Debug, Clone)]
pub struct CompoundChild {
    pub pose: RigidPose,
    pub shape: Arc<Shape>,
}

/// A rigid collection of child shapes, each placed by a local pose. Children may be compounds themselves.
#[derive(Debug, Clone)]
pub struct Compound {
    children: Vec<CompoundChild>,
    bounds: BoundingBox,
    mass: MassProperties,
}

impl Compound {
    pub fn new(children: &[CompoundChildSettings]) -> Result<Self, PhysicsError> {
        if children.is_empty() {
            return Err(PhysicsError::InvalidConfiguration(
                "compound shape needs at least one child".to_string(),
            ));
        }
        let children = children
            .iter()
            .map(|child| {
                Ok(CompoundChild {
                    pose: child.pose,
                    shape: child.shape.build()?,
                })
            })
            .collect::<Result<Vec<_>, PhysicsError>>()?;
        Ok(Self::from_children(children))
    }

    /// Assembles a compound from already baked children.
    pub fn from_children(children: Vec<CompoundChild>) -> Self {
        let bounds = children
            .iter()
            .map(|c| c.shape.world_bounds(&c.pose))
            .reduce(|a, b| a.merged(&b))
            .unwrap_or_default();
        let parts: Vec<MassProperties> = children
            .iter()
            .map(|c| c.shape.mass_properties().transformed(&c.pose))
            .collect();
        Self {
            mass: MassProperties::combine(&parts),
            children,
            bounds,
        }
    }

    pub fn children(&self) -> &[CompoundChild] {
        &self.children
    }

    pub fn local_bounds(&self) -> BoundingBox {
        self.bounds
    }

    pub fn world_bounds(&self, pose: &RigidPose) -> BoundingBox {
        self.children
            .iter()
            .map(|c| c.shape.world_bounds(&pose.then_local(&c.pose)))
            .reduce(|a, b| a.merged(&b))
            .unwrap_or_default()
    }

    pub fn mass_properties(&self) -> MassProperties {
        self.mass
    }

    pub fn inner_radius(&self) -> f32 {
        self.children
            .iter()
            .map(|c| c.shape.inner_radius())
            .fold(f32::MAX, f32::min)
    }

    /// Number of sub-shape id bits used to address a child.
    pub fn sub_shape_bits(&self) -> u32 {
        bits_for_child_count(self.children.len())
    }

    pub fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        maximum_fraction: f32,
        creator: SubShapeIdCreator,
    ) -> Option<RayHit> {
        let bits = self.sub_shape_bits();
        let mut best: Option<RayHit> = None;
        for (index, child) in self.children.iter().enumerate() {
            let bound = best.map_or(maximum_fraction, |hit| hit.fraction);
            let local_origin = child.pose.transform_by_inverse(origin);
            let local_direction = child.pose.orientation.conjugate() * direction;
            if let Some(hit) = child.shape.cast_ray(
                local_origin,
                local_direction,
                bound,
                creator.push(index as u32, bits),
            ) {
                best = Some(RayHit {
                    normal: child.pose.orientation * hit.normal,
                    ..hit
                });
            }
        }
        best
    }
}
