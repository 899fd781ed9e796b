use glam::{Quat, Vec3};
use std::sync::Arc;

use crate::physics::body::MotionType;
use crate::physics::body_properties::MassProperties;
use crate::physics::collidables::Shape;
use crate::physics::collision_detection::layers::ObjectLayer;

/// Describes a body to create.
///
/// Only used at creation time; the resulting [`Body`](crate::physics::body::Body) does not keep a reference to it.
#[derive(Debug, Clone)]
pub struct BodyCreationSettings {
    /// Position of the shape origin.
    pub position: Vec3,
    pub rotation: Quat,
    /// Velocity of the center of mass.
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub motion_type: MotionType,
    pub object_layer: ObjectLayer,
    pub shape: Arc<Shape>,
    pub friction: f32,
    pub restitution: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub gravity_factor: f32,
    pub max_linear_velocity: f32,
    pub max_angular_velocity: f32,
    /// Whether the body may be put to sleep once it comes to rest.
    pub allow_sleeping: bool,
    /// Sensors report contacts but never collide.
    pub is_sensor: bool,
    /// Replaces the mass properties computed from the shape.
    pub mass_properties_override: Option<MassProperties>,
    pub user_data: u64,
}

impl BodyCreationSettings {
    pub fn new(
        shape: Arc<Shape>,
        position: Vec3,
        rotation: Quat,
        motion_type: MotionType,
        object_layer: ObjectLayer,
    ) -> Self {
        Self {
            position,
            rotation,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            motion_type,
            object_layer,
            shape,
            friction: 0.2,
            restitution: 0.0,
            linear_damping: 0.05,
            angular_damping: 0.05,
            gravity_factor: 1.0,
            max_linear_velocity: 500.0,
            max_angular_velocity: 0.25 * std::f32::consts::PI * 60.0,
            allow_sleeping: true,
            is_sensor: false,
            mass_properties_override: None,
            user_data: 0,
        }
    }

    #[must_use]
    pub fn with_linear_velocity(mut self, linear_velocity: Vec3) -> Self {
        self.linear_velocity = linear_velocity;
        self
    }

    #[must_use]
    pub fn with_angular_velocity(mut self, angular_velocity: Vec3) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    #[must_use]
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    #[must_use]
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    #[must_use]
    pub fn with_gravity_factor(mut self, gravity_factor: f32) -> Self {
        self.gravity_factor = gravity_factor;
        self
    }

    #[must_use]
    pub fn with_allow_sleeping(mut self, allow_sleeping: bool) -> Self {
        self.allow_sleeping = allow_sleeping;
        self
    }

    #[must_use]
    pub fn with_sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    #[must_use]
    pub fn with_mass_properties(mut self, mass_properties: MassProperties) -> Self {
        self.mass_properties_override = Some(mass_properties);
        self
    }

    #[must_use]
    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }

    /// Mass properties the body will be created with.
    pub fn mass_properties(&self) -> MassProperties {
        self.mass_properties_override
            .unwrap_or_else(|| self.shape.mass_properties())
    }
}
