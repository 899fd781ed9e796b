//! Sequential impulse solver running over one island at a time.
//!
//! Each sub step integrates forces into velocities, prepares every constraint, applies last step's impulses
//! (warm starting), iterates the velocity constraints until the largest impulse change drops below the convergence
//! tolerance, integrates positions and finally pushes remaining penetration and joint drift out with a few
//! Baumgarte scaled position iterations.

use glam::Vec3;
use std::collections::HashMap;

use crate::physics::constraints::{ContactConstraint, SolverBody, TwoBodyConstraint};
use crate::physics::handles::{BodyId, ConstraintId};
use crate::physics::physics_settings::PhysicsSettings;
use crate::physics::pose_integrator;

/// Everything an island solve job owns: body copies and the constraints between them.
///
/// Static and kinematic bodies referenced by a constraint are included as immovable copies; only the dynamic
/// members are integrated.
#[derive(Debug, Default)]
pub struct IslandState {
    pub bodies: Vec<SolverBody>,
    index_of: HashMap<BodyId, usize>,
    pub contacts: Vec<ContactConstraint>,
    pub joints: Vec<(ConstraintId, Box<dyn TwoBodyConstraint>)>,
}

impl IslandState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a body copy unless a copy of the same body is already present.
    pub fn add_body(&mut self, body: SolverBody) {
        if !self.index_of.contains_key(&body.id) {
            self.index_of.insert(body.id, self.bodies.len());
            self.bodies.push(body);
        }
    }

    pub fn body(&self, id: BodyId) -> Option<&SolverBody> {
        self.index_of.get(&id).map(|&i| &self.bodies[i])
    }

    fn body_indices(&self, bodies: (BodyId, BodyId)) -> Option<(usize, usize)> {
        let a = *self.index_of.get(&bodies.0)?;
        let b = *self.index_of.get(&bodies.1)?;
        (a != b).then_some((a, b))
    }
}

/// Convergence figures of one island solve.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IslandSolveStats {
    /// Largest number of velocity iterations any sub step needed.
    pub velocity_iterations: u32,
    /// Largest position error left after the last position iteration.
    pub position_error: f32,
}

/// Returns mutable references to two distinct bodies.
#[inline]
fn pair_mut(bodies: &mut [SolverBody], a: usize, b: usize) -> (&mut SolverBody, &mut SolverBody) {
    debug_assert_ne!(a, b);
    if a < b {
        let (low, high) = bodies.split_at_mut(b);
        (&mut low[a], &mut high[0])
    } else {
        let (low, high) = bodies.split_at_mut(a);
        (&mut high[0], &mut low[b])
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConstraintSolver {
    settings: PhysicsSettings,
    gravity: Vec3,
}

impl ConstraintSolver {
    pub fn new(settings: PhysicsSettings, gravity: Vec3) -> Self {
        Self { settings, gravity }
    }

    /// Advances the island by `dt`, split into `sub_steps` equal integration sub steps.
    pub fn solve_island(&self, island: &mut IslandState, dt: f32, sub_steps: u32) -> IslandSolveStats {
        let sub_steps = sub_steps.max(1);
        let sub_dt = dt / sub_steps as f32;
        let mut stats = IslandSolveStats::default();

        let contact_bodies: Vec<Option<(usize, usize)>> = island
            .contacts
            .iter()
            .map(|c| island.body_indices(c.bodies()))
            .collect();
        let joint_bodies: Vec<Option<(usize, usize)>> = island
            .joints
            .iter()
            .map(|(_, j)| island.body_indices(j.bodies()))
            .collect();

        let IslandState {
            bodies,
            contacts,
            joints,
            ..
        } = island;
        let mut for_each_constraint = |f: &mut dyn FnMut(&mut dyn TwoBodyConstraint, usize, usize)| {
            for (contact, indices) in contacts.iter_mut().zip(&contact_bodies) {
                if let Some((a, b)) = *indices {
                    f(contact, a, b);
                }
            }
            for ((_, joint), indices) in joints.iter_mut().zip(&joint_bodies) {
                if let Some((a, b)) = *indices {
                    f(joint.as_mut(), a, b);
                }
            }
        };

        let warm_start_ratio = if self.settings.use_warm_start { 1.0 } else { 0.0 };
        for _ in 0..sub_steps {
            for body in bodies.iter_mut() {
                pose_integrator::integrate_velocity(body, self.gravity, sub_dt);
            }

            for_each_constraint(&mut |constraint, a, b| {
                constraint.setup_velocity(&bodies[a], &bodies[b], sub_dt);
            });
            for_each_constraint(&mut |constraint, a, b| {
                let (a, b) = pair_mut(bodies, a, b);
                constraint.warm_start(a, b, warm_start_ratio);
            });

            let mut iterations = 0;
            for _ in 0..self.settings.num_velocity_steps {
                iterations += 1;
                let mut largest_change = 0.0f32;
                for_each_constraint(&mut |constraint, a, b| {
                    let (a, b) = pair_mut(bodies, a, b);
                    largest_change = largest_change.max(constraint.solve_velocity(a, b));
                });
                if largest_change < self.settings.convergence_tolerance {
                    break;
                }
            }
            stats.velocity_iterations = stats.velocity_iterations.max(iterations);

            for body in bodies.iter_mut() {
                if body.motion_type.is_dynamic() {
                    pose_integrator::integrate_position(body, sub_dt);
                }
            }

            let mut position_error = 0.0f32;
            for _ in 0..self.settings.num_position_steps {
                position_error = 0.0;
                for_each_constraint(&mut |constraint, a, b| {
                    let (a, b) = pair_mut(bodies, a, b);
                    let error =
                        constraint.solve_position(a, b, self.settings.baumgarte, self.settings.penetration_slop);
                    position_error = position_error.max(error);
                });
            }
            stats.position_error = position_error;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body::{Body, MotionType};
    use crate::physics::body_description::BodyCreationSettings;
    use crate::physics::collidables::ShapeSettings;
    use crate::physics::collision_detection::contact_listener::ContactSettings;
    use crate::physics::collision_detection::contact_manifold::{CollidePoint, ContactManifold, ShapeContact};
    use crate::physics::collision_detection::layers::ObjectLayer;
    use crate::physics::constraints::{PointConstraint, PointConstraintSettings};
    use crate::physics::handles::SubShapeId;
    use glam::Quat;

    fn body(id: u32, position: Vec3, motion_type: MotionType) -> Body {
        let shape = if motion_type.is_static() {
            ShapeSettings::cuboid(Vec3::new(10.0, 0.5, 10.0)).build().unwrap()
        } else {
            ShapeSettings::sphere(0.5).build().unwrap()
        };
        let settings = BodyCreationSettings::new(shape, position, Quat::IDENTITY, motion_type, ObjectLayer(0));
        let mut body = Body::from_settings(&settings).unwrap();
        body.id = BodyId::new(id, 0);
        body
    }

    fn resting_contact(ground: &Body, ball: &Body) -> ContactManifold {
        let contact = ShapeContact {
            normal: Vec3::Y,
            sub_shape_a: SubShapeId::EMPTY,
            sub_shape_b: SubShapeId::EMPTY,
            points: vec![CollidePoint {
                on_a: Vec3::new(0.0, 0.5, 0.0),
                on_b: Vec3::new(0.0, 0.5, 0.0),
                penetration: 0.0,
            }],
        };
        ContactManifold::new(
            ground.id(),
            ball.id(),
            &contact,
            &ground.pose(),
            &ball.pose(),
            ContactSettings::default(),
        )
    }

    fn settings() -> PhysicsSettings {
        PhysicsSettings {
            convergence_tolerance: 1e-6,
            ..PhysicsSettings::default()
        }
    }

    #[test]
    fn free_body_falls() {
        let ball = body(0, Vec3::new(0.0, 5.0, 0.0), MotionType::Dynamic);
        let mut island = IslandState::new();
        island.add_body(SolverBody::from_body(&ball));
        let solver = ConstraintSolver::new(settings(), Vec3::new(0.0, -10.0, 0.0));
        solver.solve_island(&mut island, 0.1, 1);
        let ball = island.body(ball.id()).unwrap();
        assert!(ball.linear_velocity.y < -0.9);
        assert!(ball.position.y < 5.0);
    }

    #[test]
    fn contact_stops_falling_body() {
        let ground = body(0, Vec3::ZERO, MotionType::Static);
        let ball = body(1, Vec3::new(0.0, 1.0, 0.0), MotionType::Dynamic);
        let manifold = resting_contact(&ground, &ball);
        let mut island = IslandState::new();
        island.add_body(SolverBody::from_body(&ground));
        island.add_body(SolverBody::from_body(&ball));
        let (a, b) = (*island.body(ground.id()).unwrap(), *island.body(ball.id()).unwrap());
        island.contacts.push(ContactConstraint::new(&manifold, &a, &b, 1.0, true));

        let solver = ConstraintSolver::new(settings(), Vec3::new(0.0, -9.81, 0.0));
        solver.solve_island(&mut island, 1.0 / 60.0, 1);
        let ball = island.body(ball.id()).unwrap();
        assert!(ball.linear_velocity.y.abs() < 1e-3);
        assert!(island.contacts[0].total_normal_impulse() > 0.0);
        assert_eq!(island.body(ground.id()).unwrap().position, Vec3::ZERO);
    }

    #[test]
    fn warm_started_island_converges_faster() {
        let ground = body(0, Vec3::ZERO, MotionType::Static);
        let ball = body(1, Vec3::new(0.0, 1.0, 0.0), MotionType::Dynamic);
        let mut manifold = resting_contact(&ground, &ball);
        let solver = ConstraintSolver::new(settings(), Vec3::new(0.0, -9.81, 0.0));

        let mut iterations = Vec::new();
        for _ in 0..2 {
            let mut island = IslandState::new();
            island.add_body(SolverBody::from_body(&ground));
            island.add_body(SolverBody::from_body(&ball));
            let (a, b) = (*island.body(ground.id()).unwrap(), *island.body(ball.id()).unwrap());
            island.contacts.push(ContactConstraint::new(&manifold, &a, &b, 1.0, true));
            iterations.push(solver.solve_island(&mut island, 1.0 / 60.0, 1).velocity_iterations);
            island.contacts[0].write_back(&mut manifold);
        }
        assert!(iterations[1] <= iterations[0], "{iterations:?}");
    }

    #[test]
    fn joint_holds_bodies_together() {
        let anchor = body(0, Vec3::new(0.0, 5.0, 0.0), MotionType::Static);
        let bob = body(1, Vec3::new(1.0, 5.0, 0.0), MotionType::Dynamic);
        let joint = PointConstraint::new(
            &PointConstraintSettings::world(Vec3::new(0.0, 5.0, 0.0)),
            &anchor,
            &bob,
        )
        .unwrap();
        let mut island = IslandState::new();
        island.add_body(SolverBody::from_body(&anchor));
        island.add_body(SolverBody::from_body(&bob));
        island.joints.push((ConstraintId::new(0, 0), Box::new(joint)));

        let solver = ConstraintSolver::new(settings(), Vec3::new(0.0, -9.81, 0.0));
        for _ in 0..30 {
            solver.solve_island(&mut island, 1.0 / 60.0, 2);
        }
        let bob = island.body(bob.id()).unwrap();
        let distance = (bob.position - Vec3::new(0.0, 5.0, 0.0)).length();
        assert!((distance - 1.0).abs() < 0.05, "distance {distance}");
    }
}
