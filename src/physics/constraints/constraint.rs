//! Body state seen by the solver and the interface constraints implement.

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::physics::body::{Body, MotionProperties, MotionType};
use crate::physics::handles::BodyId;
use crate::utilities::math_helper;

/// Frame the attachment points of a joint are given in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConstraintSpace {
    /// Points are relative to each body's center of mass, in the body's frame.
    LocalToBodyCom,
    /// Points are in world space and converted to body space when the constraint is created.
    #[default]
    WorldSpace,
}

/// Copy of a body owned by an island solve job. Positions refer to the center of mass.
#[derive(Debug, Clone, Copy)]
pub struct SolverBody {
    pub id: BodyId,
    pub motion_type: MotionType,
    /// World position of the center of mass.
    pub position: Vec3,
    pub orientation: Quat,
    /// Center of mass relative to the shape origin, in the body frame.
    pub local_center_of_mass: Vec3,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub inverse_mass: f32,
    /// World space inverse inertia; refreshed whenever the orientation changes.
    pub inverse_inertia: Mat3,
    pub(crate) motion: MotionProperties,
}

impl SolverBody {
    pub fn from_body(body: &Body) -> Self {
        Self {
            id: body.id(),
            motion_type: body.motion_type(),
            position: body.center_of_mass_position(),
            orientation: body.rotation(),
            local_center_of_mass: body.center_of_mass,
            linear_velocity: body.linear_velocity(),
            angular_velocity: body.angular_velocity(),
            inverse_mass: body.inverse_mass(),
            inverse_inertia: body.inverse_inertia(),
            motion: body.motion,
        }
    }

    /// Writes the solved state back into the body.
    pub(crate) fn scatter(&self, body: &mut Body) {
        if body.is_static() {
            return;
        }
        body.linear_velocity = self.linear_velocity;
        body.angular_velocity = self.angular_velocity;
        body.set_center_of_mass_pose(self.position, self.orientation.normalize());
        body.update_world_bounds();
    }

    /// Whether impulses change this body's motion.
    #[inline(always)]
    pub fn is_movable(&self) -> bool {
        self.inverse_mass > 0.0
    }

    /// Converts an anchor relative to the shape origin into one relative to the center of mass.
    #[inline(always)]
    pub fn anchor_from_shape_origin(&self, local_anchor: Vec3) -> Vec3 {
        local_anchor - self.local_center_of_mass
    }

    /// World space offset from the center of mass to a center of mass relative anchor.
    #[inline(always)]
    pub fn world_offset(&self, local_offset: Vec3) -> Vec3 {
        self.orientation * local_offset
    }

    #[inline(always)]
    pub fn point_velocity(&self, offset: Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(offset)
    }

    /// Applies an impulse at `offset` from the center of mass.
    #[inline(always)]
    pub fn apply_impulse(&mut self, impulse: Vec3, offset: Vec3) {
        if !self.is_movable() {
            return;
        }
        self.linear_velocity += impulse * self.inverse_mass;
        self.angular_velocity += self.inverse_inertia * offset.cross(impulse);
    }

    /// Moves the body as if an impulse acted on it for one unit of time, without touching its velocity.
    #[inline(always)]
    pub fn apply_position_impulse(&mut self, impulse: Vec3, offset: Vec3) {
        if !self.is_movable() {
            return;
        }
        self.position += impulse * self.inverse_mass;
        let rotation = self.inverse_inertia * offset.cross(impulse);
        self.orientation = math_helper::integrate_orientation(self.orientation, rotation, 1.0);
        self.refresh_inertia();
    }

    #[inline(always)]
    pub fn refresh_inertia(&mut self) {
        self.inverse_inertia = if self.motion_type.is_dynamic() {
            math_helper::rotate_inertia(self.motion.local_inverse_inertia, self.orientation)
        } else {
            Mat3::ZERO
        };
    }

    /// Inverse mass felt by an impulse along `direction` at `offset`.
    #[inline(always)]
    pub fn inverse_effective_mass(&self, offset: Vec3, direction: Vec3) -> f32 {
        if !self.is_movable() {
            return 0.0;
        }
        let angular = offset.cross(direction);
        self.inverse_mass + angular.dot(self.inverse_inertia * angular)
    }
}

/// A constraint between two bodies solved with sequential impulses.
///
/// The solver calls `setup_velocity` once per sub step, then `warm_start`, then `solve_velocity` for each velocity
/// iteration, and after integrating positions `solve_position` for each position iteration. Body A and B are the
/// bodies returned by [`bodies`](TwoBodyConstraint::bodies), in that order.
pub trait TwoBodyConstraint: Send + Sync + fmt::Debug {
    fn bodies(&self) -> (BodyId, BodyId);

    /// Computes effective masses and velocity targets for a sub step of length `dt`.
    fn setup_velocity(&mut self, a: &SolverBody, b: &SolverBody, dt: f32);

    /// Applies the impulses accumulated so far, scaled by `ratio`.
    fn warm_start(&mut self, a: &mut SolverBody, b: &mut SolverBody, ratio: f32);

    /// One velocity iteration. Returns the largest velocity change it caused.
    fn solve_velocity(&mut self, a: &mut SolverBody, b: &mut SolverBody) -> f32;

    /// One position iteration moving a fraction `baumgarte` of the remaining error. Returns the error before
    /// correction.
    fn solve_position(&mut self, a: &mut SolverBody, b: &mut SolverBody, baumgarte: f32, slop: f32) -> f32;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body_description::BodyCreationSettings;
    use crate::physics::collidables::ShapeSettings;
    use crate::physics::collision_detection::layers::ObjectLayer;

    fn solver_body(motion_type: MotionType) -> SolverBody {
        let shape = ShapeSettings::sphere(1.0).build().unwrap();
        let settings = BodyCreationSettings::new(shape, Vec3::new(0.0, 1.0, 0.0), Quat::IDENTITY, motion_type, ObjectLayer(0));
        SolverBody::from_body(&Body::from_settings(&settings).unwrap())
    }

    #[test]
    fn immovable_bodies_ignore_impulses() {
        let mut body = solver_body(MotionType::Kinematic);
        body.apply_impulse(Vec3::X, Vec3::Y);
        body.apply_position_impulse(Vec3::X, Vec3::Y);
        assert_eq!(body.linear_velocity, Vec3::ZERO);
        assert_eq!(body.position, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(body.inverse_effective_mass(Vec3::Y, Vec3::X), 0.0);
    }

    #[test]
    fn off_center_impulse_adds_spin() {
        let mut body = solver_body(MotionType::Dynamic);
        body.apply_impulse(Vec3::X, Vec3::Y);
        assert!(body.linear_velocity.x > 0.0);
        assert!(body.angular_velocity.z < 0.0);
        assert!(body.inverse_effective_mass(Vec3::Y, Vec3::X) > body.inverse_mass);
    }
}
