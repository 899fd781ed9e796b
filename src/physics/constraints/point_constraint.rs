//! Joint pinning a point of one body to a point of another.

use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

use super::constraint::{ConstraintSpace, SolverBody, TwoBodyConstraint};
use crate::physics::body::Body;
use crate::physics::error::PhysicsError;
use crate::physics::handles::BodyId;
use crate::utilities::math_helper;

/// Describes a [`PointConstraint`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PointConstraintSettings {
    pub space: ConstraintSpace,
    /// Attachment on body A.
    pub point_a: Vec3,
    /// Attachment on body B.
    pub point_b: Vec3,
}

impl PointConstraintSettings {
    /// Both bodies attached at the same world space point.
    pub fn world(point: Vec3) -> Self {
        Self {
            space: ConstraintSpace::WorldSpace,
            point_a: point,
            point_b: point,
        }
    }
}

/// Removes all relative translation between two attachment points, leaving rotation free.
#[derive(Debug, Clone)]
pub struct PointConstraint {
    body_a: BodyId,
    body_b: BodyId,
    /// Attachments relative to each center of mass, in the body frame.
    local_offset_a: Vec3,
    local_offset_b: Vec3,
    offset_a: Vec3,
    offset_b: Vec3,
    effective_mass: Mat3,
    accumulated_impulse: Vec3,
}

impl PointConstraint {
    /// Creates the joint. Fails with [`PhysicsError::InvalidConstraint`] when neither body responds to impulses.
    pub fn new(settings: &PointConstraintSettings, a: &Body, b: &Body) -> Result<Self, PhysicsError> {
        if a.inverse_mass() == 0.0 && b.inverse_mass() == 0.0 {
            return Err(PhysicsError::InvalidConstraint(format!(
                "point constraint between {} and {} couples two immovable bodies",
                a.id(),
                b.id()
            )));
        }
        if a.id() == b.id() {
            return Err(PhysicsError::InvalidConstraint(format!(
                "point constraint attaches body {} to itself",
                a.id()
            )));
        }
        let (local_offset_a, local_offset_b) = match settings.space {
            ConstraintSpace::LocalToBodyCom => (settings.point_a, settings.point_b),
            ConstraintSpace::WorldSpace => (
                a.rotation().inverse() * (settings.point_a - a.center_of_mass_position()),
                b.rotation().inverse() * (settings.point_b - b.center_of_mass_position()),
            ),
        };
        Ok(Self {
            body_a: a.id(),
            body_b: b.id(),
            local_offset_a,
            local_offset_b,
            offset_a: Vec3::ZERO,
            offset_b: Vec3::ZERO,
            effective_mass: Mat3::ZERO,
            accumulated_impulse: Vec3::ZERO,
        })
    }

    /// Current world space attachments of both bodies.
    pub fn world_points(&self, a: &Body, b: &Body) -> (Vec3, Vec3) {
        (
            a.center_of_mass_position() + a.rotation() * self.local_offset_a,
            b.center_of_mass_position() + b.rotation() * self.local_offset_b,
        )
    }

    #[inline]
    pub fn accumulated_impulse(&self) -> Vec3 {
        self.accumulated_impulse
    }

    /// Inverse of `J M^-1 J^T` for the three translational rows.
    fn compute_effective_mass(a: &SolverBody, b: &SolverBody, offset_a: Vec3, offset_b: Vec3) -> Mat3 {
        let skew_a = math_helper::skew(offset_a);
        let skew_b = math_helper::skew(offset_b);
        let inverse_effective_mass = Mat3::from_diagonal(Vec3::splat(a.inverse_mass + b.inverse_mass))
            - skew_a * a.inverse_inertia * skew_a
            - skew_b * b.inverse_inertia * skew_b;
        math_helper::try_inverse(inverse_effective_mass).unwrap_or(Mat3::ZERO)
    }
}

impl TwoBodyConstraint for PointConstraint {
    fn bodies(&self) -> (BodyId, BodyId) {
        (self.body_a, self.body_b)
    }

    fn setup_velocity(&mut self, a: &SolverBody, b: &SolverBody, _dt: f32) {
        self.offset_a = a.world_offset(self.local_offset_a);
        self.offset_b = b.world_offset(self.local_offset_b);
        self.effective_mass = Self::compute_effective_mass(a, b, self.offset_a, self.offset_b);
    }

    fn warm_start(&mut self, a: &mut SolverBody, b: &mut SolverBody, ratio: f32) {
        self.accumulated_impulse *= ratio;
        b.apply_impulse(self.accumulated_impulse, self.offset_b);
        a.apply_impulse(-self.accumulated_impulse, self.offset_a);
    }

    fn solve_velocity(&mut self, a: &mut SolverBody, b: &mut SolverBody) -> f32 {
        let relative = b.point_velocity(self.offset_b) - a.point_velocity(self.offset_a);
        let impulse = self.effective_mass * -relative;
        self.accumulated_impulse += impulse;
        b.apply_impulse(impulse, self.offset_b);
        a.apply_impulse(-impulse, self.offset_a);
        relative.length()
    }

    fn solve_position(&mut self, a: &mut SolverBody, b: &mut SolverBody, baumgarte: f32, _slop: f32) -> f32 {
        let offset_a = a.world_offset(self.local_offset_a);
        let offset_b = b.world_offset(self.local_offset_b);
        let separation = (b.position + offset_b) - (a.position + offset_a);
        let error = separation.length();
        if error > 0.0 {
            let effective_mass = Self::compute_effective_mass(a, b, offset_a, offset_b);
            let impulse = effective_mass * (separation * -baumgarte);
            b.apply_position_impulse(impulse, offset_b);
            a.apply_position_impulse(-impulse, offset_a);
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body::MotionType;
    use crate::physics::body_description::BodyCreationSettings;
    use crate::physics::collidables::ShapeSettings;
    use crate::physics::collision_detection::layers::ObjectLayer;
    use glam::Quat;

    fn body(index: u32, x: f32, motion_type: MotionType) -> Body {
        let shape = ShapeSettings::sphere(0.5).build().unwrap();
        let mut body = Body::from_settings(&BodyCreationSettings::new(
            shape,
            Vec3::new(x, 0.0, 0.0),
            Quat::IDENTITY,
            motion_type,
            ObjectLayer(0),
        ))
        .unwrap();
        body.id = BodyId::new(index, 0);
        body
    }

    #[test]
    fn two_immovable_bodies_are_rejected() {
        let a = body(0, 0.0, MotionType::Static);
        let b = body(1, 1.0, MotionType::Kinematic);
        let result = PointConstraint::new(&PointConstraintSettings::world(Vec3::new(0.5, 0.0, 0.0)), &a, &b);
        assert!(matches!(result, Err(PhysicsError::InvalidConstraint(_))));
    }

    #[test]
    fn world_points_are_converted_to_body_space() {
        let a = body(0, 0.0, MotionType::Dynamic);
        let b = body(1, 1.0, MotionType::Dynamic);
        let joint = PointConstraint::new(&PointConstraintSettings::world(Vec3::new(0.5, 0.0, 0.0)), &a, &b).unwrap();
        let (pa, pb) = joint.world_points(&a, &b);
        assert!((pa - pb).length() < 1e-6);
        assert!((joint.local_offset_b - Vec3::new(-0.5, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn velocity_pass_removes_relative_motion_at_the_pivot() {
        let a = body(0, 0.0, MotionType::Dynamic);
        let mut b = body(1, 1.0, MotionType::Dynamic);
        b.set_linear_velocity(Vec3::new(0.0, 2.0, 0.0)).unwrap();
        let mut joint =
            PointConstraint::new(&PointConstraintSettings::world(Vec3::new(0.5, 0.0, 0.0)), &a, &b).unwrap();
        let (mut sa, mut sb) = (SolverBody::from_body(&a), SolverBody::from_body(&b));
        joint.setup_velocity(&sa, &sb, 1.0 / 60.0);
        joint.warm_start(&mut sa, &mut sb, 1.0);
        for _ in 0..4 {
            joint.solve_velocity(&mut sa, &mut sb);
        }
        let relative = sb.point_velocity(joint.offset_b) - sa.point_velocity(joint.offset_a);
        assert!(relative.length() < 1e-4);
        let momentum = sa.linear_velocity / sa.inverse_mass + sb.linear_velocity / sb.inverse_mass;
        assert!((momentum.y - 2.0 / sb.inverse_mass).abs() < 1e-2);
    }

    #[test]
    fn position_pass_closes_the_gap() {
        let a = body(0, 0.0, MotionType::Static);
        let b = body(1, 1.0, MotionType::Dynamic);
        let settings = PointConstraintSettings {
            space: ConstraintSpace::LocalToBodyCom,
            point_a: Vec3::new(0.5, 0.0, 0.0),
            point_b: Vec3::new(-0.3, 0.0, 0.0),
        };
        let mut joint = PointConstraint::new(&settings, &a, &b).unwrap();
        let (mut sa, mut sb) = (SolverBody::from_body(&a), SolverBody::from_body(&b));
        let before = joint.solve_position(&mut sa, &mut sb, 1.0, 0.0);
        assert!((before - 0.2).abs() < 1e-5);
        let after = joint.solve_position(&mut sa, &mut sb, 1.0, 0.0);
        assert!(after < 1e-4);
    }
}
