//! Persistent contact manifolds.
//!
//! Collision routines report one or a few points per step. Manifolds keep the points of previous steps alive while
//! they stay valid, so a resting box accumulates a stable four point patch and the solver can warm start from the
//! impulses each point carried last step.

use glam::Vec3;
use std::fmt;

use super::contact_listener::ContactSettings;
use crate::physics::body_properties::RigidPose;
use crate::physics::handles::{BodyId, SubShapeId};
use crate::utilities::math_helper;

/// Maximum number of points kept per manifold.
pub const MAX_CONTACT_POINTS: usize = 4;

/// Old points are discarded when the new normal deviates more than this from the previous one.
const NORMAL_COHERENCE_COS: f32 = 0.996;

/// A point reported by a collision routine, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollidePoint {
    pub on_a: Vec3,
    pub on_b: Vec3,
    /// Positive when the shapes overlap, negative for speculative contacts.
    pub penetration: f32,
}

/// Output of a collision routine for one pair of leaf shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeContact {
    /// Unit normal pointing from A towards B.
    pub normal: Vec3,
    pub sub_shape_a: SubShapeId,
    pub sub_shape_b: SubShapeId,
    pub points: Vec<CollidePoint>,
}

impl ShapeContact {
    /// Swaps the roles of the two shapes.
    pub fn flipped(mut self) -> Self {
        self.normal = -self.normal;
        std::mem::swap(&mut self.sub_shape_a, &mut self.sub_shape_b);
        for point in &mut self.points {
            std::mem::swap(&mut point.on_a, &mut point.on_b);
        }
        self
    }

    pub fn max_penetration(&self) -> f32 {
        self.points
            .iter()
            .map(|p| p.penetration)
            .fold(f32::NEG_INFINITY, f32::max)
    }
}

/// Identifies a manifold across steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContactKey {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub sub_shape_a: SubShapeId,
    pub sub_shape_b: SubShapeId,
}

impl fmt::Display for ContactKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "ContactKey<{}/{}, {}/{}>",
            self.body_a,
            self.sub_shape_a.value(),
            self.body_b,
            self.sub_shape_b.value()
        )
    }
}

/// One persistent contact point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    pub position_on_a: Vec3,
    pub position_on_b: Vec3,
    pub penetration: f32,
    /// Anchor of the point in the frame of body A.
    pub local_on_a: Vec3,
    /// Anchor of the point in the frame of body B.
    pub local_on_b: Vec3,
    /// Accumulated impulse along the normal, carried to the next step for warm starting.
    pub normal_impulse: f32,
    /// Accumulated friction impulse in world space.
    pub tangent_impulse: Vec3,
}

impl ContactPoint {
    fn new(point: &CollidePoint, pose_a: &RigidPose, pose_b: &RigidPose) -> Self {
        Self {
            position_on_a: point.on_a,
            position_on_b: point.on_b,
            penetration: point.penetration,
            local_on_a: pose_a.transform_by_inverse(point.on_a),
            local_on_b: pose_b.transform_by_inverse(point.on_b),
            normal_impulse: 0.0,
            tangent_impulse: Vec3::ZERO,
        }
    }

    /// Midpoint between the two surface points.
    #[inline]
    pub fn position(&self) -> Vec3 {
        (self.position_on_a + self.position_on_b) * 0.5
    }
}

/// Distances steering how manifold points are kept between steps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManifoldTolerances {
    /// Points separated further than this, or sliding further than this, are dropped.
    pub persistence_distance: f32,
    /// New points closer than this to an old point take over its impulses.
    pub preserve_distance: f32,
    pub warm_start: bool,
}

/// Contact between two sub shapes of two bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactManifold {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub sub_shape_a: SubShapeId,
    pub sub_shape_b: SubShapeId,
    /// Unit normal pointing from A towards B.
    pub normal: Vec3,
    pub points: Vec<ContactPoint>,
    pub settings: ContactSettings,
}

impl ContactManifold {
    pub(crate) fn new(
        body_a: BodyId,
        body_b: BodyId,
        contact: &ShapeContact,
        pose_a: &RigidPose,
        pose_b: &RigidPose,
        settings: ContactSettings,
    ) -> Self {
        let mut manifold = Self {
            body_a,
            body_b,
            sub_shape_a: contact.sub_shape_a,
            sub_shape_b: contact.sub_shape_b,
            normal: contact.normal,
            points: contact
                .points
                .iter()
                .map(|p| ContactPoint::new(p, pose_a, pose_b))
                .collect(),
            settings,
        };
        manifold.reduce();
        manifold
    }

    #[inline]
    pub fn key(&self) -> ContactKey {
        ContactKey {
            body_a: self.body_a,
            body_b: self.body_b,
            sub_shape_a: self.sub_shape_a,
            sub_shape_b: self.sub_shape_b,
        }
    }

    /// Deepest penetration among the points; negative when every point is speculative.
    pub fn max_penetration(&self) -> f32 {
        self.points
            .iter()
            .map(|p| p.penetration)
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Total normal impulse applied during the last solve.
    pub fn total_normal_impulse(&self) -> f32 {
        self.points.iter().map(|p| p.normal_impulse).sum()
    }

    /// Moves the points of last step along with the bodies, merges in the freshly detected points and keeps at
    /// most [`MAX_CONTACT_POINTS`].
    pub(crate) fn update(
        &mut self,
        contact: &ShapeContact,
        pose_a: &RigidPose,
        pose_b: &RigidPose,
        tolerances: &ManifoldTolerances,
    ) {
        let coherent = self.normal.dot(contact.normal) >= NORMAL_COHERENCE_COS;
        self.normal = contact.normal;
        if !coherent {
            self.points.clear();
        }
        self.refresh(pose_a, pose_b, tolerances.persistence_distance);

        let preserve_squared = tolerances.preserve_distance * tolerances.preserve_distance;
        for point in &contact.points {
            let mut fresh = ContactPoint::new(point, pose_a, pose_b);
            let nearest = self
                .points
                .iter()
                .enumerate()
                .map(|(i, old)| (i, old.local_on_a.distance_squared(fresh.local_on_a)))
                .min_by(|a, b| a.1.total_cmp(&b.1));
            match nearest {
                Some((index, distance_squared)) if distance_squared <= preserve_squared => {
                    if tolerances.warm_start {
                        fresh.normal_impulse = self.points[index].normal_impulse;
                        fresh.tangent_impulse = self.points[index].tangent_impulse;
                    }
                    self.points[index] = fresh;
                }
                _ => self.points.push(fresh),
            }
        }
        if !tolerances.warm_start {
            for point in &mut self.points {
                point.normal_impulse = 0.0;
                point.tangent_impulse = Vec3::ZERO;
            }
        }
        self.reduce();
    }

    /// Recomputes world positions of the kept points and drops the ones that drifted apart.
    fn refresh(&mut self, pose_a: &RigidPose, pose_b: &RigidPose, persistence_distance: f32) {
        let normal = self.normal;
        let limit_squared = persistence_distance * persistence_distance;
        self.points.retain_mut(|point| {
            point.position_on_a = pose_a.transform(point.local_on_a);
            point.position_on_b = pose_b.transform(point.local_on_b);
            let separation = point.position_on_b - point.position_on_a;
            let along_normal = separation.dot(normal);
            point.penetration = -along_normal;
            let tangential = separation - normal * along_normal;
            along_normal <= persistence_distance && tangential.length_squared() <= limit_squared
        });
        // Friction impulses are stored in world space and must stay in the contact plane.
        for point in &mut self.points {
            point.tangent_impulse -= normal * point.tangent_impulse.dot(normal);
        }
    }

    /// Keeps the deepest point, the point furthest from it, and the two points that maximize the covered area.
    fn reduce(&mut self) {
        if self.points.len() <= MAX_CONTACT_POINTS {
            return;
        }
        let positions: Vec<Vec3> = self.points.iter().map(|p| p.position_on_a).collect();
        let normal = self.normal;

        let deepest = (0..positions.len())
            .max_by(|&a, &b| self.points[a].penetration.total_cmp(&self.points[b].penetration))
            .unwrap_or(0);
        let furthest = farthest_by(&positions, &[deepest], |p| p.distance_squared(positions[deepest]));
        let third = farthest_by(&positions, &[deepest, furthest], |p| {
            triangle_area(positions[deepest], positions[furthest], p, normal)
        });
        let fourth = farthest_by(&positions, &[deepest, furthest, third], |p| {
            triangle_area(positions[deepest], positions[furthest], p, normal)
                + triangle_area(positions[furthest], positions[third], p, normal)
                + triangle_area(positions[third], positions[deepest], p, normal)
        });

        let mut keep = [deepest, furthest, third, fourth];
        keep.sort_unstable();
        let old = std::mem::take(&mut self.points);
        self.points = keep.iter().map(|&i| old[i]).collect();
    }
}

fn farthest_by(positions: &[Vec3], exclude: &[usize], metric: impl Fn(Vec3) -> f32) -> usize {
    (0..positions.len())
        .filter(|i| !exclude.contains(i))
        .max_by(|&a, &b| metric(positions[a]).total_cmp(&metric(positions[b])))
        .unwrap_or(0)
}

/// Area of the triangle projected onto the contact plane.
#[inline]
fn triangle_area(a: Vec3, b: Vec3, c: Vec3, normal: Vec3) -> f32 {
    ((b - a).cross(c - a).dot(normal) * 0.5).abs()
}

impl fmt::Display for ContactManifold {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "ContactManifold<{}, {}, normal {}, {} points>",
            self.body_a,
            self.body_b,
            math_helper::normalize_or(self.normal, Vec3::ZERO),
            self.points.len()
        )
    }
}
