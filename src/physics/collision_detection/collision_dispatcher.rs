//! Lookup of collision routines by the kinds of the two shapes involved.

use std::collections::HashMap;
use std::fmt;

use super::collision_tasks;
use super::contact_manifold::ShapeContact;
use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::{Shape, ShapeKind};
use crate::physics::handles::SubShapeIdCreator;

/// A shape placed in the world together with its path from the body's root shape.
#[derive(Debug, Clone, Copy)]
pub struct ShapeInstance<'a> {
    pub shape: &'a Shape,
    pub pose: RigidPose,
    pub sub_shape: SubShapeIdCreator,
}

impl<'a> ShapeInstance<'a> {
    /// A root shape of a body.
    pub fn new(shape: &'a Shape, pose: RigidPose) -> Self {
        Self {
            shape,
            pose,
            sub_shape: SubShapeIdCreator::default(),
        }
    }
}

/// Parameters shared by all collision routines.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollideShapeSettings {
    /// Shapes closer than this produce speculative contacts with negative penetration.
    pub speculative_distance: f32,
}

impl Default for CollideShapeSettings {
    fn default() -> Self {
        Self {
            speculative_distance: 0.02,
        }
    }
}

/// Collision routine for one ordered pair of shape kinds. Contacts are appended to the output with normals
/// pointing from the first shape towards the second.
pub type CollideFn =
    fn(&CollisionDispatcher, &CollideShapeSettings, &ShapeInstance, &ShapeInstance, &mut Vec<ShapeContact>);

/// Table of collision routines keyed by ordered shape kind pairs.
///
/// A routine registered for `(A, B)` also serves `(B, A)`: the dispatcher swaps the inputs and flips the results.
#[derive(Clone, Default)]
pub struct CollisionDispatcher {
    routines: HashMap<(ShapeKind, ShapeKind), CollideFn>,
}

impl CollisionDispatcher {
    /// A dispatcher without any routine.
    pub fn new() -> Self {
        Self::default()
    }

    /// A dispatcher with the routines for every supported shape combination.
    pub fn with_default_routines() -> Self {
        let mut dispatcher = Self::new();
        for a in ShapeKind::ALL {
            for b in ShapeKind::ALL {
                if a.is_convex() && b.is_convex() && a <= b {
                    dispatcher.register(a, b, collision_tasks::convex_pair_tester::collide_convex_shapes);
                }
            }
            dispatcher.register(ShapeKind::Compound, a, collision_tasks::compound_collision_task::collide_compound);
            if a.is_convex() {
                dispatcher.register(ShapeKind::Mesh, a, collision_tasks::mesh_convex_collision_task::collide_mesh_convex);
            }
        }
        dispatcher.register(ShapeKind::Sphere, ShapeKind::Sphere, collision_tasks::sphere_pair_tester::collide_spheres);
        dispatcher.register(ShapeKind::Sphere, ShapeKind::Box, collision_tasks::sphere_box_tester::collide_sphere_box);
        dispatcher
    }

    /// Registers or replaces the routine for `(a, b)`.
    pub fn register(&mut self, a: ShapeKind, b: ShapeKind, routine: CollideFn) {
        self.routines.insert((a, b), routine);
    }

    /// Whether some routine handles the pair in either order.
    pub fn has_routine(&self, a: ShapeKind, b: ShapeKind) -> bool {
        self.routines.contains_key(&(a, b)) || self.routines.contains_key(&(b, a))
    }

    /// Runs the routine for the two instances, appending contacts with normals pointing from `a` to `b`.
    /// Pairs without a routine produce nothing.
    pub fn collide(
        &self,
        settings: &CollideShapeSettings,
        a: &ShapeInstance,
        b: &ShapeInstance,
        out: &mut Vec<ShapeContact>,
    ) {
        let (kind_a, kind_b) = (a.shape.kind(), b.shape.kind());
        if let Some(routine) = self.routines.get(&(kind_a, kind_b)) {
            routine(self, settings, a, b, out);
        } else if let Some(routine) = self.routines.get(&(kind_b, kind_a)) {
            let start = out.len();
            routine(self, settings, b, a, out);
            let flipped: Vec<ShapeContact> = out.drain(start..).map(ShapeContact::flipped).collect();
            out.extend(flipped);
        } else {
            tracing::trace!(?kind_a, ?kind_b, "no collision routine for shape pair");
        }
    }

    /// Collides two root shapes. Returns one contact per touching pair of leaf shapes; an empty result means the
    /// shapes are further apart than the speculative distance.
    pub fn test_pair(
        &self,
        shape_a: &Shape,
        pose_a: &RigidPose,
        shape_b: &Shape,
        pose_b: &RigidPose,
        settings: &CollideShapeSettings,
    ) -> Vec<ShapeContact> {
        let mut out = Vec::new();
        self.collide(
            settings,
            &ShapeInstance::new(shape_a, *pose_a),
            &ShapeInstance::new(shape_b, *pose_b),
            &mut out,
        );
        out
    }
}

impl fmt::Debug for CollisionDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut pairs: Vec<_> = self.routines.keys().collect();
        pairs.sort();
        f.debug_struct("CollisionDispatcher").field("routines", &pairs).finish()
    }
}
