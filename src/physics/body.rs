//! Rigid bodies.

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::physics::body_description::BodyCreationSettings;
use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::Shape;
use crate::physics::collision_detection::layers::ObjectLayer;
use crate::physics::error::PhysicsError;
use crate::physics::handles::BodyId;
use crate::utilities::bounding_box::BoundingBox;
use crate::utilities::math_helper;

/// How a body takes part in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MotionType {
    /// Never moves. Velocity is ignored.
    #[default]
    Static,
    /// Moved by its velocity only; behaves as infinitely heavy in collisions.
    Kinematic,
    /// Moved by forces, gravity and contacts.
    Dynamic,
}

impl MotionType {
    #[inline(always)]
    pub fn is_static(&self) -> bool {
        matches!(self, MotionType::Static)
    }

    #[inline(always)]
    pub fn is_kinematic(&self) -> bool {
        matches!(self, MotionType::Kinematic)
    }

    #[inline(always)]
    pub fn is_dynamic(&self) -> bool {
        matches!(self, MotionType::Dynamic)
    }
}

/// Whether an operation wakes the body it touches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    #[default]
    Activate,
    DontActivate,
}

/// State only meaningful for bodies that can move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MotionProperties {
    pub inverse_mass: f32,
    /// Inverse inertia about the center of mass, in the body frame.
    pub local_inverse_inertia: Mat3,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_factor: f32,
    pub max_linear_velocity: f32,
    pub max_angular_velocity: f32,
    /// Accumulated force applied at the center of mass, cleared after every step.
    pub force: Vec3,
    pub torque: Vec3,
    pub allow_sleeping: bool,
    /// Time the body has spent below the sleep threshold.
    pub sleep_timer: f32,
    /// Distance from the center of mass to the furthest point of the shape bounds.
    pub sleep_radius: f32,
}

/// A rigid body: a shape with a pose, a velocity and a material.
///
/// Position and rotation describe the shape origin. Linear velocity is the velocity of the center of mass.
#[derive(Debug, Clone)]
pub struct Body {
    pub(crate) id: BodyId,
    pub(crate) pose: RigidPose,
    pub(crate) linear_velocity: Vec3,
    pub(crate) angular_velocity: Vec3,
    pub(crate) motion_type: MotionType,
    pub(crate) object_layer: ObjectLayer,
    pub(crate) shape: Arc<Shape>,
    /// Center of mass relative to the shape origin, in the body frame.
    pub(crate) center_of_mass: Vec3,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) motion: MotionProperties,
    pub(crate) is_sensor: bool,
    pub(crate) user_data: u64,
    pub(crate) active: bool,
    pub(crate) added: bool,
    pub(crate) world_bounds: BoundingBox,
}

impl Body {
    /// Validates the settings and creates a body that is not yet part of any system.
    pub(crate) fn from_settings(settings: &BodyCreationSettings) -> Result<Self, PhysicsError> {
        if !math_helper::is_finite(settings.position) || !settings.rotation.is_finite() {
            return Err(PhysicsError::InvalidConfiguration(
                "body position and rotation must be finite".to_string(),
            ));
        }
        if settings.shape.requires_static() && !settings.motion_type.is_static() {
            return Err(PhysicsError::InvalidConfiguration(format!(
                "{:?} shapes can only be used by static bodies",
                settings.shape.kind()
            )));
        }
        if settings.friction < 0.0 || settings.restitution < 0.0 {
            return Err(PhysicsError::InvalidConfiguration(
                "friction and restitution must not be negative".to_string(),
            ));
        }

        let mass_properties = settings.mass_properties();
        let (inverse_mass, local_inverse_inertia) = if settings.motion_type.is_dynamic() {
            if !(mass_properties.mass > 0.0 && mass_properties.mass.is_finite()) {
                return Err(PhysicsError::InvalidConfiguration(format!(
                    "dynamic bodies need a positive mass, got {}",
                    mass_properties.mass
                )));
            }
            (1.0 / mass_properties.mass, mass_properties.inverse_inertia())
        } else {
            (0.0, Mat3::ZERO)
        };
        let center_of_mass = mass_properties.center_of_mass;
        let local_bounds = settings.shape.local_bounds();
        let sleep_radius = (local_bounds.center() - center_of_mass).length() + local_bounds.half_extents().length();

        let mut body = Self {
            id: BodyId::INVALID,
            pose: RigidPose::new(settings.position, settings.rotation.normalize()),
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            motion_type: settings.motion_type,
            object_layer: settings.object_layer,
            shape: Arc::clone(&settings.shape),
            center_of_mass,
            friction: settings.friction,
            restitution: settings.restitution,
            motion: MotionProperties {
                inverse_mass,
                local_inverse_inertia,
                linear_damping: settings.linear_damping.max(0.0),
                angular_damping: settings.angular_damping.max(0.0),
                gravity_factor: settings.gravity_factor,
                max_linear_velocity: settings.max_linear_velocity,
                max_angular_velocity: settings.max_angular_velocity,
                force: Vec3::ZERO,
                torque: Vec3::ZERO,
                allow_sleeping: settings.allow_sleeping,
                sleep_timer: 0.0,
                sleep_radius,
            },
            is_sensor: settings.is_sensor,
            user_data: settings.user_data,
            active: false,
            added: false,
            world_bounds: BoundingBox::default(),
        };
        if !body.motion_type.is_static() {
            body.linear_velocity = settings.linear_velocity;
            body.angular_velocity = settings.angular_velocity;
            body.clamp_velocities();
        }
        body.world_bounds = body.shape.world_bounds(&body.pose);
        Ok(body)
    }

    /// Id assigned when the body was added, or [`BodyId::INVALID`] before that.
    #[inline]
    pub fn id(&self) -> BodyId {
        self.id
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.pose.position
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.pose.orientation
    }

    #[inline]
    pub fn pose(&self) -> RigidPose {
        self.pose
    }

    /// World position of the center of mass.
    #[inline]
    pub fn center_of_mass_position(&self) -> Vec3 {
        self.pose.transform(self.center_of_mass)
    }

    #[inline]
    pub fn linear_velocity(&self) -> Vec3 {
        self.linear_velocity
    }

    #[inline]
    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    /// Velocity of a world space point attached to the body.
    #[inline]
    pub fn point_velocity(&self, point: Vec3) -> Vec3 {
        self.linear_velocity + self.angular_velocity.cross(point - self.center_of_mass_position())
    }

    #[inline]
    pub fn motion_type(&self) -> MotionType {
        self.motion_type
    }

    #[inline]
    pub fn is_static(&self) -> bool {
        self.motion_type.is_static()
    }

    #[inline]
    pub fn is_kinematic(&self) -> bool {
        self.motion_type.is_kinematic()
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.motion_type.is_dynamic()
    }

    #[inline]
    pub fn object_layer(&self) -> ObjectLayer {
        self.object_layer
    }

    #[inline]
    pub fn shape(&self) -> &Arc<Shape> {
        &self.shape
    }

    #[inline]
    pub fn friction(&self) -> f32 {
        self.friction
    }

    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction.max(0.0);
    }

    #[inline]
    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution.max(0.0);
    }

    #[inline]
    pub fn gravity_factor(&self) -> f32 {
        self.motion.gravity_factor
    }

    pub fn set_gravity_factor(&mut self, gravity_factor: f32) {
        self.motion.gravity_factor = gravity_factor;
    }

    #[inline]
    pub fn user_data(&self) -> u64 {
        self.user_data
    }

    pub fn set_user_data(&mut self, user_data: u64) {
        self.user_data = user_data;
    }

    #[inline]
    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    /// Whether the body is awake. Static bodies are never active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the body is currently part of a physics system.
    #[inline]
    pub fn is_added(&self) -> bool {
        self.added
    }

    #[inline]
    pub fn allow_sleeping(&self) -> bool {
        self.motion.allow_sleeping
    }

    /// World bounds of the shape at the current pose.
    #[inline]
    pub fn world_bounds(&self) -> BoundingBox {
        self.world_bounds
    }

    /// Inverse mass; zero for bodies that do not respond to impulses.
    #[inline]
    pub fn inverse_mass(&self) -> f32 {
        if self.is_dynamic() {
            self.motion.inverse_mass
        } else {
            0.0
        }
    }

    /// World space inverse inertia about the center of mass.
    #[inline]
    pub fn inverse_inertia(&self) -> Mat3 {
        if self.is_dynamic() {
            math_helper::rotate_inertia(self.motion.local_inverse_inertia, self.pose.orientation)
        } else {
            Mat3::ZERO
        }
    }

    pub fn set_linear_velocity(&mut self, velocity: Vec3) -> Result<(), PhysicsError> {
        self.check_movable("set the velocity of")?;
        self.linear_velocity = velocity;
        self.clamp_velocities();
        Ok(())
    }

    pub fn set_angular_velocity(&mut self, velocity: Vec3) -> Result<(), PhysicsError> {
        self.check_movable("set the velocity of")?;
        self.angular_velocity = velocity;
        self.clamp_velocities();
        Ok(())
    }

    /// Adds a force acting on the center of mass during the next step.
    pub fn add_force(&mut self, force: Vec3) -> Result<(), PhysicsError> {
        self.check_dynamic("apply a force to")?;
        self.motion.force += force;
        Ok(())
    }

    /// Adds a force acting at a world space point during the next step.
    pub fn add_force_at(&mut self, force: Vec3, point: Vec3) -> Result<(), PhysicsError> {
        self.check_dynamic("apply a force to")?;
        self.motion.force += force;
        self.motion.torque += (point - self.center_of_mass_position()).cross(force);
        Ok(())
    }

    pub fn add_torque(&mut self, torque: Vec3) -> Result<(), PhysicsError> {
        self.check_dynamic("apply a torque to")?;
        self.motion.torque += torque;
        Ok(())
    }

    /// Changes the velocity of the center of mass by `impulse / mass`.
    pub fn add_impulse(&mut self, impulse: Vec3) -> Result<(), PhysicsError> {
        self.check_dynamic("apply an impulse to")?;
        self.linear_velocity += impulse * self.motion.inverse_mass;
        self.clamp_velocities();
        Ok(())
    }

    /// Applies an impulse at a world space point, changing both linear and angular velocity.
    pub fn add_impulse_at(&mut self, impulse: Vec3, point: Vec3) -> Result<(), PhysicsError> {
        self.check_dynamic("apply an impulse to")?;
        self.linear_velocity += impulse * self.motion.inverse_mass;
        let angular = (point - self.center_of_mass_position()).cross(impulse);
        self.angular_velocity += self.inverse_inertia() * angular;
        self.clamp_velocities();
        Ok(())
    }

    pub fn add_angular_impulse(&mut self, impulse: Vec3) -> Result<(), PhysicsError> {
        self.check_dynamic("apply an angular impulse to")?;
        self.angular_velocity += self.inverse_inertia() * impulse;
        self.clamp_velocities();
        Ok(())
    }

    fn check_movable(&self, action: &str) -> Result<(), PhysicsError> {
        if self.is_static() {
            Err(PhysicsError::InvalidOperation(format!("cannot {action} static body {}", self.id)))
        } else {
            Ok(())
        }
    }

    fn check_dynamic(&self, action: &str) -> Result<(), PhysicsError> {
        if self.is_dynamic() {
            Ok(())
        } else {
            Err(PhysicsError::InvalidOperation(format!(
                "cannot {action} {:?} body {}",
                self.motion_type, self.id
            )))
        }
    }

    pub(crate) fn clamp_velocities(&mut self) {
        let max_linear = self.motion.max_linear_velocity;
        if self.linear_velocity.length_squared() > max_linear * max_linear {
            self.linear_velocity = self.linear_velocity.normalize() * max_linear;
        }
        let max_angular = self.motion.max_angular_velocity;
        if self.angular_velocity.length_squared() > max_angular * max_angular {
            self.angular_velocity = self.angular_velocity.normalize() * max_angular;
        }
    }

    /// Places the body by the pose of its center of mass.
    pub(crate) fn set_center_of_mass_pose(&mut self, center_of_mass: Vec3, orientation: Quat) {
        self.pose.orientation = orientation;
        self.pose.position = center_of_mass - orientation * self.center_of_mass;
    }

    pub(crate) fn set_pose(&mut self, pose: RigidPose) {
        self.pose = RigidPose::new(pose.position, pose.orientation.normalize());
        self.update_world_bounds();
    }

    pub(crate) fn update_world_bounds(&mut self) {
        self.world_bounds = self.shape.world_bounds(&self.pose);
    }

    pub(crate) fn reset_sleep_timer(&mut self) {
        self.motion.sleep_timer = 0.0;
    }

    /// Advances the sleep timer and returns whether the body rested long enough to sleep.
    pub(crate) fn update_sleep_timer(&mut self, dt: f32, point_velocity_threshold: f32, time_before_sleep: f32) -> bool {
        if !self.motion.allow_sleeping || self.is_static() {
            self.motion.sleep_timer = 0.0;
            return false;
        }
        let fastest_point = self.linear_velocity.length() + self.angular_velocity.length() * self.motion.sleep_radius;
        if fastest_point < point_velocity_threshold {
            self.motion.sleep_timer += dt;
        } else {
            self.motion.sleep_timer = 0.0;
        }
        self.motion.sleep_timer >= time_before_sleep
    }

    pub(crate) fn clear_accumulated_forces(&mut self) {
        self.motion.force = Vec3::ZERO;
        self.motion.torque = Vec3::ZERO;
    }
}

impl fmt::Display for Body {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Body<{}, {:?}, {}, {}>",
            self.id,
            self.motion_type,
            self.pose.position,
            if self.active { "active" } else { "inactive" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collidables::ShapeSettings;

    fn settings(motion_type: MotionType) -> BodyCreationSettings {
        let shape = ShapeSettings::cuboid(Vec3::new(1.0, 0.5, 0.5)).build().unwrap();
        BodyCreationSettings::new(shape, Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY, motion_type, ObjectLayer(1))
    }

    #[test]
    fn static_bodies_reject_velocity_writes() {
        let mut body = Body::from_settings(&settings(MotionType::Static)).unwrap();
        assert!(matches!(
            body.set_linear_velocity(Vec3::X),
            Err(PhysicsError::InvalidOperation(_))
        ));
        assert_eq!(body.linear_velocity(), Vec3::ZERO);
        assert_eq!(body.inverse_mass(), 0.0);
    }

    #[test]
    fn kinematic_bodies_move_but_ignore_impulses() {
        let mut body = Body::from_settings(&settings(MotionType::Kinematic)).unwrap();
        body.set_linear_velocity(Vec3::X).unwrap();
        assert!(body.add_impulse(Vec3::Y).is_err());
        assert_eq!(body.linear_velocity(), Vec3::X);
    }

    #[test]
    fn off_center_impulse_spins_the_body() {
        let mut body = Body::from_settings(&settings(MotionType::Dynamic)).unwrap();
        let mass = 1.0 / body.inverse_mass();
        assert!((mass - 2000.0).abs() < 1e-2);
        body.add_impulse_at(Vec3::new(0.0, 0.0, mass), Vec3::new(1.0, 2.0, 0.0)).unwrap();
        assert!((body.linear_velocity() - Vec3::Z).length() < 1e-4);
        assert!(body.angular_velocity().y < 0.0);
    }

    #[test]
    fn velocities_are_clamped() {
        let mut s = settings(MotionType::Dynamic);
        s.max_linear_velocity = 10.0;
        let body = Body::from_settings(&s.with_linear_velocity(Vec3::new(100.0, 0.0, 0.0))).unwrap();
        assert!((body.linear_velocity().length() - 10.0).abs() < 1e-4);
    }

    #[test]
    fn mesh_shapes_must_be_static() {
        let mesh = ShapeSettings::mesh(
            vec![Vec3::ZERO, Vec3::X, Vec3::Z],
            vec![[0, 1, 2]],
        )
        .build()
        .unwrap();
        let s = BodyCreationSettings::new(mesh, Vec3::ZERO, Quat::IDENTITY, MotionType::Dynamic, ObjectLayer(0));
        assert!(matches!(
            Body::from_settings(&s),
            Err(PhysicsError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn sleep_timer_accumulates_only_at_rest() {
        let mut body = Body::from_settings(&settings(MotionType::Dynamic)).unwrap();
        assert!(!body.update_sleep_timer(0.3, 0.03, 0.5));
        assert!(body.update_sleep_timer(0.3, 0.03, 0.5));
        body.set_linear_velocity(Vec3::X).unwrap();
        assert!(!body.update_sleep_timer(0.3, 0.03, 0.5));
    }
}
