//! Velocity and pose integration of solver bodies.

use glam::Vec3;

use crate::physics::constraints::SolverBody;
use crate::utilities::math_helper;

/// Applies gravity, accumulated forces and damping to a dynamic body's velocity.
pub(crate) fn integrate_velocity(body: &mut SolverBody, gravity: Vec3, dt: f32) {
    if !body.motion_type.is_dynamic() {
        return;
    }
    let motion = &body.motion;
    body.linear_velocity += (gravity * motion.gravity_factor + motion.force * body.inverse_mass) * dt;
    body.angular_velocity += body.inverse_inertia * motion.torque * dt;

    body.linear_velocity *= (1.0 - motion.linear_damping * dt).max(0.0);
    body.angular_velocity *= (1.0 - motion.angular_damping * dt).max(0.0);
    clamp_velocities(body);
}

/// Moves a dynamic or kinematic body along its velocity.
pub(crate) fn integrate_position(body: &mut SolverBody, dt: f32) {
    if body.motion_type.is_static() {
        return;
    }
    clamp_velocities(body);
    body.position += body.linear_velocity * dt;
    body.orientation = math_helper::integrate_orientation(body.orientation, body.angular_velocity, dt);
    body.refresh_inertia();
}

fn clamp_velocities(body: &mut SolverBody) {
    let max_linear = body.motion.max_linear_velocity;
    if body.linear_velocity.length_squared() > max_linear * max_linear {
        body.linear_velocity = body.linear_velocity.normalize() * max_linear;
    }
    let max_angular = body.motion.max_angular_velocity;
    if body.angular_velocity.length_squared() > max_angular * max_angular {
        body.angular_velocity = body.angular_velocity.normalize() * max_angular;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body::{Body, MotionType};
    use crate::physics::body_description::BodyCreationSettings;
    use crate::physics::collidables::ShapeSettings;
    use crate::physics::collision_detection::layers::ObjectLayer;
    use glam::Quat;

    fn solver_body(motion_type: MotionType, linear_damping: f32) -> SolverBody {
        let shape = ShapeSettings::sphere(0.5).build().unwrap();
        let mut settings = BodyCreationSettings::new(shape, Vec3::ZERO, Quat::IDENTITY, motion_type, ObjectLayer(0));
        settings.linear_damping = linear_damping;
        settings.angular_damping = 0.0;
        SolverBody::from_body(&Body::from_settings(&settings).unwrap())
    }

    #[test]
    fn gravity_accelerates_dynamic_bodies_only() {
        let gravity = Vec3::new(0.0, -9.81, 0.0);
        let mut dynamic = solver_body(MotionType::Dynamic, 0.0);
        let mut kinematic = solver_body(MotionType::Kinematic, 0.0);
        integrate_velocity(&mut dynamic, gravity, 0.5);
        integrate_velocity(&mut kinematic, gravity, 0.5);
        assert!((dynamic.linear_velocity.y + 4.905).abs() < 1e-5);
        assert_eq!(kinematic.linear_velocity, Vec3::ZERO);
    }

    #[test]
    fn damping_slows_bodies_down() {
        let mut body = solver_body(MotionType::Dynamic, 1.0);
        body.linear_velocity = Vec3::X;
        integrate_velocity(&mut body, Vec3::ZERO, 0.1);
        assert!((body.linear_velocity.x - 0.9).abs() < 1e-6);
    }

    #[test]
    fn positions_follow_velocities() {
        let mut body = solver_body(MotionType::Kinematic, 0.0);
        body.linear_velocity = Vec3::new(2.0, 0.0, 0.0);
        body.angular_velocity = Vec3::new(0.0, std::f32::consts::PI, 0.0);
        integrate_position(&mut body, 0.5);
        assert!((body.position - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-6);
        let turned = body.orientation * Vec3::X;
        assert!((turned - Vec3::NEG_Z).length() < 1e-4);
    }
}
