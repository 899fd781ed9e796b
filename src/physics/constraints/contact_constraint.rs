//! Non-penetration and friction constraint generated from a contact manifold.

use glam::Vec3;

use super::constraint::{SolverBody, TwoBodyConstraint};
use crate::physics::collision_detection::contact_manifold::{ContactKey, ContactManifold};
use crate::physics::handles::BodyId;
use crate::utilities::math_helper;

#[derive(Debug, Clone, Copy)]
struct ContactConstraintPoint {
    /// Anchors relative to each body's center of mass, in the body frame.
    local_offset_a: Vec3,
    local_offset_b: Vec3,
    offset_a: Vec3,
    offset_b: Vec3,
    /// Velocity along the normal kept by restitution.
    bounce_velocity: f32,
    normal_mass: f32,
    tangent_mass: [f32; 2],
    target_velocity: f32,
    normal_impulse: f32,
    tangent_impulse: [f32; 2],
}

/// Keeps the points of one manifold from approaching along the normal and applies Coulomb friction within a
/// pyramid bounded by `friction * normal impulse`.
#[derive(Debug, Clone)]
pub struct ContactConstraint {
    key: ContactKey,
    normal: Vec3,
    tangents: [Vec3; 2],
    friction: f32,
    points: Vec<ContactConstraintPoint>,
}

impl ContactConstraint {
    /// Builds the constraint for `manifold`. Accumulated impulses of the manifold are carried over when
    /// `warm_start` is set.
    pub fn new(
        manifold: &ContactManifold,
        a: &SolverBody,
        b: &SolverBody,
        min_restitution_velocity: f32,
        warm_start: bool,
    ) -> Self {
        let normal = manifold.normal;
        let (t1, t2) = math_helper::build_orthonormal_basis(normal);
        let restitution = manifold.settings.combined_restitution;
        let points = manifold
            .points
            .iter()
            .map(|point| {
                let local_offset_a = a.anchor_from_shape_origin(point.local_on_a);
                let local_offset_b = b.anchor_from_shape_origin(point.local_on_b);
                let offset_a = a.world_offset(local_offset_a);
                let offset_b = b.world_offset(local_offset_b);
                let approach = (b.point_velocity(offset_b) - a.point_velocity(offset_a)).dot(normal);
                let bounce_velocity = if restitution > 0.0 && approach < -min_restitution_velocity {
                    -restitution * approach
                } else {
                    0.0
                };
                let (normal_impulse, tangent_impulse) = if warm_start {
                    (
                        point.normal_impulse,
                        [point.tangent_impulse.dot(t1), point.tangent_impulse.dot(t2)],
                    )
                } else {
                    (0.0, [0.0; 2])
                };
                ContactConstraintPoint {
                    local_offset_a,
                    local_offset_b,
                    offset_a,
                    offset_b,
                    bounce_velocity,
                    normal_mass: 0.0,
                    tangent_mass: [0.0; 2],
                    target_velocity: 0.0,
                    normal_impulse,
                    tangent_impulse,
                }
            })
            .collect();
        Self {
            key: manifold.key(),
            normal,
            tangents: [t1, t2],
            friction: manifold.settings.combined_friction,
            points,
        }
    }

    #[inline]
    pub fn key(&self) -> ContactKey {
        self.key
    }

    /// Stores the accumulated impulses in the manifold for warm starting the next step.
    pub fn write_back(&self, manifold: &mut ContactManifold) {
        for (target, point) in manifold.points.iter_mut().zip(&self.points) {
            target.normal_impulse = point.normal_impulse;
            target.tangent_impulse =
                self.tangents[0] * point.tangent_impulse[0] + self.tangents[1] * point.tangent_impulse[1];
        }
    }

    /// Sum of the accumulated normal impulses.
    pub fn total_normal_impulse(&self) -> f32 {
        self.points.iter().map(|p| p.normal_impulse).sum()
    }

    fn penetration(&self, point: &ContactConstraintPoint, a: &SolverBody, b: &SolverBody) -> f32 {
        let on_a = a.position + point.offset_a;
        let on_b = b.position + point.offset_b;
        (on_a - on_b).dot(self.normal)
    }
}

#[inline(always)]
fn inverse_or_zero(k: f32) -> f32 {
    if k > 0.0 {
        1.0 / k
    } else {
        0.0
    }
}

impl TwoBodyConstraint for ContactConstraint {
    fn bodies(&self) -> (BodyId, BodyId) {
        (self.key.body_a, self.key.body_b)
    }

    fn setup_velocity(&mut self, a: &SolverBody, b: &SolverBody, dt: f32) {
        let normal = self.normal;
        let tangents = self.tangents;
        for i in 0..self.points.len() {
            let mut point = self.points[i];
            point.offset_a = a.world_offset(point.local_offset_a);
            point.offset_b = b.world_offset(point.local_offset_b);
            point.normal_mass = inverse_or_zero(
                a.inverse_effective_mass(point.offset_a, normal) + b.inverse_effective_mass(point.offset_b, normal),
            );
            for (mass, tangent) in point.tangent_mass.iter_mut().zip(tangents) {
                *mass = inverse_or_zero(
                    a.inverse_effective_mass(point.offset_a, tangent)
                        + b.inverse_effective_mass(point.offset_b, tangent),
                );
            }
            // Separated points may close the gap within this sub step, but no further.
            let penetration = self.penetration(&point, a, b);
            let speculative = if penetration < 0.0 && dt > 0.0 {
                penetration / dt
            } else {
                0.0
            };
            point.target_velocity = point.bounce_velocity.max(speculative);
            self.points[i] = point;
        }
    }

    fn warm_start(&mut self, a: &mut SolverBody, b: &mut SolverBody, ratio: f32) {
        for point in &mut self.points {
            point.normal_impulse *= ratio;
            point.tangent_impulse[0] *= ratio;
            point.tangent_impulse[1] *= ratio;
            let impulse = self.normal * point.normal_impulse
                + self.tangents[0] * point.tangent_impulse[0]
                + self.tangents[1] * point.tangent_impulse[1];
            b.apply_impulse(impulse, point.offset_b);
            a.apply_impulse(-impulse, point.offset_a);
        }
    }

    fn solve_velocity(&mut self, a: &mut SolverBody, b: &mut SolverBody) -> f32 {
        let mut largest_change: f32 = 0.0;
        for point in &mut self.points {
            // Friction first, bounded by the normal impulse of the previous iteration.
            let max_friction = self.friction * point.normal_impulse;
            for axis in 0..2 {
                if point.tangent_mass[axis] == 0.0 {
                    continue;
                }
                let tangent = self.tangents[axis];
                let relative = b.point_velocity(point.offset_b) - a.point_velocity(point.offset_a);
                let lambda = -relative.dot(tangent) * point.tangent_mass[axis];
                let accumulated = (point.tangent_impulse[axis] + lambda).clamp(-max_friction, max_friction);
                let applied = accumulated - point.tangent_impulse[axis];
                point.tangent_impulse[axis] = accumulated;
                let impulse = tangent * applied;
                b.apply_impulse(impulse, point.offset_b);
                a.apply_impulse(-impulse, point.offset_a);
                largest_change = largest_change.max(applied.abs() / point.tangent_mass[axis]);
            }

            if point.normal_mass == 0.0 {
                continue;
            }
            let relative = b.point_velocity(point.offset_b) - a.point_velocity(point.offset_a);
            let lambda = (point.target_velocity - relative.dot(self.normal)) * point.normal_mass;
            let accumulated = (point.normal_impulse + lambda).max(0.0);
            let applied = accumulated - point.normal_impulse;
            point.normal_impulse = accumulated;
            let impulse = self.normal * applied;
            b.apply_impulse(impulse, point.offset_b);
            a.apply_impulse(-impulse, point.offset_a);
            largest_change = largest_change.max(applied.abs() / point.normal_mass);
        }
        largest_change
    }

    fn solve_position(&mut self, a: &mut SolverBody, b: &mut SolverBody, baumgarte: f32, slop: f32) -> f32 {
        let mut largest_error: f32 = 0.0;
        for i in 0..self.points.len() {
            let mut point = self.points[i];
            point.offset_a = a.world_offset(point.local_offset_a);
            point.offset_b = b.world_offset(point.local_offset_b);
            let penetration = self.penetration(&point, a, b);
            largest_error = largest_error.max(penetration);
            let error = penetration - slop;
            if error > 0.0 {
                let k = a.inverse_effective_mass(point.offset_a, self.normal)
                    + b.inverse_effective_mass(point.offset_b, self.normal);
                if k > 0.0 {
                    let impulse = self.normal * (baumgarte * error / k);
                    b.apply_position_impulse(impulse, point.offset_b);
                    a.apply_position_impulse(-impulse, point.offset_a);
                }
            }
            self.points[i] = point;
        }
        largest_error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body::{Body, MotionType};
    use crate::physics::body_description::BodyCreationSettings;
    use crate::physics::body_properties::RigidPose;
    use crate::physics::collidables::ShapeSettings;
    use crate::physics::collision_detection::contact_listener::ContactSettings;
    use crate::physics::collision_detection::contact_manifold::{CollidePoint, ShapeContact};
    use crate::physics::collision_detection::layers::ObjectLayer;
    use crate::physics::handles::SubShapeId;
    use glam::Quat;

    fn bodies(ball_velocity: Vec3) -> (SolverBody, SolverBody) {
        let ground_shape = ShapeSettings::cuboid(Vec3::new(5.0, 0.5, 5.0)).build().unwrap();
        let mut ground = Body::from_settings(&BodyCreationSettings::new(
            ground_shape,
            Vec3::ZERO,
            Quat::IDENTITY,
            MotionType::Static,
            ObjectLayer(0),
        ))
        .unwrap();
        ground.id = BodyId::new(0, 0);
        let ball_shape = ShapeSettings::sphere(0.5).build().unwrap();
        let mut ball = Body::from_settings(
            &BodyCreationSettings::new(
                ball_shape,
                Vec3::new(0.0, 0.98, 0.0),
                Quat::IDENTITY,
                MotionType::Dynamic,
                ObjectLayer(0),
            )
            .with_linear_velocity(ball_velocity),
        )
        .unwrap();
        ball.id = BodyId::new(1, 0);
        (SolverBody::from_body(&ground), SolverBody::from_body(&ball))
    }

    fn manifold(restitution: f32) -> ContactManifold {
        let contact = ShapeContact {
            normal: Vec3::Y,
            sub_shape_a: SubShapeId::EMPTY,
            sub_shape_b: SubShapeId::EMPTY,
            points: vec![CollidePoint {
                on_a: Vec3::new(0.0, 0.5, 0.0),
                on_b: Vec3::new(0.0, 0.48, 0.0),
                penetration: 0.02,
            }],
        };
        let mut settings = ContactSettings::combine(0.5, restitution, 0.5, restitution);
        settings.is_sensor = false;
        ContactManifold::new(
            BodyId::new(0, 0),
            BodyId::new(1, 0),
            &contact,
            &RigidPose::IDENTITY,
            &RigidPose::from_position(Vec3::new(0.0, 0.98, 0.0)),
            settings,
        )
    }

    fn solve(constraint: &mut ContactConstraint, a: &mut SolverBody, b: &mut SolverBody) {
        constraint.setup_velocity(a, b, 1.0 / 60.0);
        constraint.warm_start(a, b, 1.0);
        for _ in 0..10 {
            constraint.solve_velocity(a, b);
        }
    }

    #[test]
    fn approaching_body_is_stopped() {
        let (mut ground, mut ball) = bodies(Vec3::new(0.0, -2.0, 0.0));
        let mut constraint = ContactConstraint::new(&manifold(0.0), &ground, &ball, 1.0, true);
        solve(&mut constraint, &mut ground, &mut ball);
        assert!(ball.linear_velocity.y.abs() < 1e-4);
        assert!(constraint.total_normal_impulse() > 0.0);
        assert_eq!(ground.linear_velocity, Vec3::ZERO);
    }

    #[test]
    fn restitution_bounces() {
        let (mut ground, mut ball) = bodies(Vec3::new(0.0, -2.0, 0.0));
        let mut constraint = ContactConstraint::new(&manifold(0.5), &ground, &ball, 1.0, true);
        solve(&mut constraint, &mut ground, &mut ball);
        assert!((ball.linear_velocity.y - 1.0).abs() < 1e-3);
    }

    #[test]
    fn separating_body_is_left_alone() {
        let (mut ground, mut ball) = bodies(Vec3::new(0.0, 3.0, 0.0));
        let mut constraint = ContactConstraint::new(&manifold(0.0), &ground, &ball, 1.0, true);
        solve(&mut constraint, &mut ground, &mut ball);
        assert!((ball.linear_velocity.y - 3.0).abs() < 1e-5);
        assert_eq!(constraint.total_normal_impulse(), 0.0);
    }

    #[test]
    fn friction_stays_inside_the_pyramid() {
        let (mut ground, mut ball) = bodies(Vec3::new(4.0, -1.0, 0.0));
        let mut constraint = ContactConstraint::new(&manifold(0.0), &ground, &ball, 1.0, true);
        solve(&mut constraint, &mut ground, &mut ball);
        let point = constraint.points[0];
        for impulse in point.tangent_impulse {
            assert!(impulse.abs() <= 0.5 * point.normal_impulse + 1e-4);
        }
        assert!(ball.linear_velocity.x < 4.0);
    }

    #[test]
    fn position_pass_pushes_bodies_apart() {
        let (mut ground, mut ball) = bodies(Vec3::ZERO);
        let mut constraint = ContactConstraint::new(&manifold(0.0), &ground, &ball, 1.0, true);
        let before = constraint.solve_position(&mut ground, &mut ball, 1.0, 0.0);
        assert!((before - 0.02).abs() < 1e-4);
        let after = constraint.solve_position(&mut ground, &mut ball, 1.0, 0.0);
        assert!(after < 1e-3);
        assert_eq!(ground.position, Vec3::ZERO);
    }

    #[test]
    fn impulses_are_written_back() {
        let (mut ground, mut ball) = bodies(Vec3::new(0.0, -2.0, 0.0));
        let mut m = manifold(0.0);
        let mut constraint = ContactConstraint::new(&m, &ground, &ball, 1.0, true);
        solve(&mut constraint, &mut ground, &mut ball);
        constraint.write_back(&mut m);
        assert!((m.total_normal_impulse() - constraint.total_normal_impulse()).abs() < 1e-6);
    }
}
