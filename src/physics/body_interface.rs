//! Body management on [`PhysicsSystem`]: creating, adding, moving and waking bodies.
//!
//! All operations validate the body id first and fail with [`PhysicsError::InvalidHandle`] or
//! [`PhysicsError::StaleHandle`] without side effects when it does not name a live body.

use glam::{Quat, Vec3};
use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::physics::activation::ActivationEvent;
use crate::physics::body::{Activation, Body, MotionType};
use crate::physics::body_description::BodyCreationSettings;
use crate::physics::body_properties::RigidPose;
use crate::physics::collision_detection::layers::ObjectLayer;
use crate::physics::error::PhysicsError;
use crate::physics::handles::BodyId;
use crate::physics::physics_system::PhysicsSystem;
use crate::utilities::math_helper;

impl PhysicsSystem {
    /// Creates a body from `settings` without adding it to the simulation.
    pub fn create_body(&mut self, settings: &BodyCreationSettings) -> Result<BodyId, PhysicsError> {
        let body = Body::from_settings(settings)?;
        let id = self.bodies.insert(body)?;
        tracing::trace!(%id, motion_type = ?settings.motion_type, "body created");
        Ok(id)
    }

    /// Inserts a created body into the broad phase. Static bodies never become active.
    pub fn add_body(&mut self, id: BodyId, activation: Activation) -> Result<(), PhysicsError> {
        let margin = self.settings.speculative_contact_distance;
        let body = self.bodies.get_mut(id)?;
        if body.added {
            return Err(PhysicsError::InvalidOperation(format!("{id} is already added")));
        }
        let active = activation == Activation::Activate && !body.is_static();
        body.update_world_bounds();
        self.broad_phase.insert(
            id,
            body.world_bounds().expanded(margin),
            body.object_layer(),
            body.motion_type(),
            active,
        )?;
        body.added = true;
        body.active = active;
        body.reset_sleep_timer();
        let user_data = body.user_data();
        if active {
            self.notify_activation(ActivationEvent::Activated(id, user_data));
        }
        Ok(())
    }

    pub fn create_and_add_body(
        &mut self,
        settings: &BodyCreationSettings,
        activation: Activation,
    ) -> Result<BodyId, PhysicsError> {
        let id = self.create_body(settings)?;
        if let Err(error) = self.add_body(id, activation) {
            // Leave nothing behind for a body the caller never got an id for.
            let _ = self.bodies.remove(id);
            return Err(error);
        }
        Ok(id)
    }

    /// Takes a body out of the simulation. The body keeps its slot and can be added again.
    pub fn remove_body(&mut self, id: BodyId) -> Result<(), PhysicsError> {
        let body = self.bodies.get_mut(id)?;
        if !body.added {
            return Err(PhysicsError::InvalidOperation(format!("{id} is not added")));
        }
        let was_active = body.active;
        body.added = false;
        body.active = false;
        let user_data = body.user_data();
        self.broad_phase.remove(id)?;
        self.narrow_phase.remove_body(id, self.contact_listener.as_deref());
        if was_active {
            self.notify_activation(ActivationEvent::Deactivated(id, user_data));
        }
        tracing::trace!(%id, "body removed");
        Ok(())
    }

    /// Frees the slot of a removed body and drops the constraints attached to it; `id` is invalid afterwards.
    ///
    /// Fails with [`PhysicsError::InvalidHandle`] while the body is still added.
    pub fn destroy_body(&mut self, id: BodyId) -> Result<(), PhysicsError> {
        if self.bodies.read(id)?.added {
            return Err(PhysicsError::InvalidHandle(id));
        }
        self.bodies.remove(id)?;
        let dropped = self.constraints.remove_body(id);
        tracing::trace!(%id, constraints = dropped.len(), "body destroyed");
        Ok(())
    }

    /// Removes and destroys a body in one go.
    pub fn remove_and_destroy_body(&mut self, id: BodyId) -> Result<(), PhysicsError> {
        if self.bodies.read(id)?.added {
            self.remove_body(id)?;
        }
        self.destroy_body(id)
    }

    pub fn is_added(&self, id: BodyId) -> bool {
        self.bodies.read(id).map_or(false, |b| b.added)
    }

    pub fn is_active(&self, id: BodyId) -> bool {
        self.bodies.read(id).map_or(false, |b| b.active)
    }

    /// Number of bodies holding a slot, added or not.
    #[inline]
    pub fn num_bodies(&self) -> usize {
        self.bodies.len()
    }

    #[inline]
    pub fn max_bodies(&self) -> usize {
        self.bodies.max_bodies()
    }

    /// Ids of all added bodies in slot order.
    pub fn bodies(&self) -> Vec<BodyId> {
        self.bodies
            .iter()
            .filter(|(_, body)| body.read().added)
            .map(|(id, _)| id)
            .collect()
    }

    /// Ids of all awake bodies in slot order.
    pub fn active_bodies(&self) -> Vec<BodyId> {
        self.bodies
            .iter()
            .filter(|(_, body)| {
                let body = body.read();
                body.added && body.active
            })
            .map(|(id, _)| id)
            .collect()
    }

    #[inline]
    pub fn num_active_bodies(&self) -> usize {
        self.active_bodies().len()
    }

    /// Shared access to a body. Holding the guard blocks the step from writing this body.
    pub fn read_body(&self, id: BodyId) -> Result<RwLockReadGuard<'_, Body>, PhysicsError> {
        self.bodies.read(id)
    }

    /// Exclusive access to a body. Changes to pose or shape made through the guard reach the broad phase on the next
    /// step only if the body is active.
    pub fn write_body(&self, id: BodyId) -> Result<RwLockWriteGuard<'_, Body>, PhysicsError> {
        self.bodies.write(id)
    }

    pub fn position(&self, id: BodyId) -> Result<Vec3, PhysicsError> {
        Ok(self.bodies.read(id)?.position())
    }

    pub fn rotation(&self, id: BodyId) -> Result<Quat, PhysicsError> {
        Ok(self.bodies.read(id)?.rotation())
    }

    pub fn pose(&self, id: BodyId) -> Result<RigidPose, PhysicsError> {
        Ok(self.bodies.read(id)?.pose())
    }

    pub fn center_of_mass_position(&self, id: BodyId) -> Result<Vec3, PhysicsError> {
        Ok(self.bodies.read(id)?.center_of_mass_position())
    }

    /// Teleports a body. Static bodies may be moved too; their broad phase entry follows immediately.
    pub fn set_position_and_rotation(
        &mut self,
        id: BodyId,
        position: Vec3,
        rotation: Quat,
        activation: Activation,
    ) -> Result<(), PhysicsError> {
        if !math_helper::is_finite(position) || !rotation.is_finite() {
            return Err(PhysicsError::InvalidOperation(format!("non-finite pose for {id}")));
        }
        let margin = self.settings.speculative_contact_distance;
        let body = self.bodies.get_mut(id)?;
        body.set_pose(RigidPose::new(position, rotation));
        let (added, bounds) = (body.added, body.world_bounds().expanded(margin));
        if added {
            self.broad_phase.update(id, bounds)?;
            if activation == Activation::Activate {
                self.activate_body(id)?;
            }
        }
        Ok(())
    }

    pub fn set_position(&mut self, id: BodyId, position: Vec3, activation: Activation) -> Result<(), PhysicsError> {
        let rotation = self.rotation(id)?;
        self.set_position_and_rotation(id, position, rotation, activation)
    }

    pub fn set_rotation(&mut self, id: BodyId, rotation: Quat, activation: Activation) -> Result<(), PhysicsError> {
        let position = self.position(id)?;
        self.set_position_and_rotation(id, position, rotation, activation)
    }

    pub fn linear_velocity(&self, id: BodyId) -> Result<Vec3, PhysicsError> {
        Ok(self.bodies.read(id)?.linear_velocity())
    }

    pub fn angular_velocity(&self, id: BodyId) -> Result<Vec3, PhysicsError> {
        Ok(self.bodies.read(id)?.angular_velocity())
    }

    /// Sets the velocity of the center of mass, waking the body for a non-zero velocity.
    ///
    /// Fails with [`PhysicsError::InvalidOperation`] for static bodies.
    pub fn set_linear_velocity(&mut self, id: BodyId, velocity: Vec3) -> Result<(), PhysicsError> {
        self.bodies.get_mut(id)?.set_linear_velocity(velocity)?;
        self.activate_if_moving(id, velocity)
    }

    pub fn set_angular_velocity(&mut self, id: BodyId, velocity: Vec3) -> Result<(), PhysicsError> {
        self.bodies.get_mut(id)?.set_angular_velocity(velocity)?;
        self.activate_if_moving(id, velocity)
    }

    /// Adds a force applied during the next update. Dynamic bodies only.
    pub fn add_force(&mut self, id: BodyId, force: Vec3) -> Result<(), PhysicsError> {
        self.bodies.get_mut(id)?.add_force(force)?;
        self.activate_if_moving(id, force)
    }

    /// Adds a force acting at a world space point during the next update.
    pub fn add_force_at(&mut self, id: BodyId, force: Vec3, point: Vec3) -> Result<(), PhysicsError> {
        self.bodies.get_mut(id)?.add_force_at(force, point)?;
        self.activate_if_moving(id, force)
    }

    pub fn add_torque(&mut self, id: BodyId, torque: Vec3) -> Result<(), PhysicsError> {
        self.bodies.get_mut(id)?.add_torque(torque)?;
        self.activate_if_moving(id, torque)
    }

    pub fn add_impulse(&mut self, id: BodyId, impulse: Vec3) -> Result<(), PhysicsError> {
        self.bodies.get_mut(id)?.add_impulse(impulse)?;
        self.activate_if_moving(id, impulse)
    }

    pub fn add_impulse_at(&mut self, id: BodyId, impulse: Vec3, point: Vec3) -> Result<(), PhysicsError> {
        self.bodies.get_mut(id)?.add_impulse_at(impulse, point)?;
        self.activate_if_moving(id, impulse)
    }

    pub fn add_angular_impulse(&mut self, id: BodyId, impulse: Vec3) -> Result<(), PhysicsError> {
        self.bodies.get_mut(id)?.add_angular_impulse(impulse)?;
        self.activate_if_moving(id, impulse)
    }

    /// Sets the velocities of a kinematic body so that it reaches the target pose after `dt` seconds.
    pub fn move_kinematic(
        &mut self,
        id: BodyId,
        target_position: Vec3,
        target_rotation: Quat,
        dt: f32,
    ) -> Result<(), PhysicsError> {
        let body = self.bodies.get_mut(id)?;
        if !body.is_kinematic() {
            return Err(PhysicsError::InvalidOperation(format!(
                "move_kinematic needs a kinematic body, {id} is {:?}",
                body.motion_type()
            )));
        }
        if dt <= 0.0 {
            return Ok(());
        }
        let current = body.pose();
        let linear = (target_position - current.position) / dt;
        let mut delta = target_rotation.normalize() * current.orientation.inverse();
        if delta.w < 0.0 {
            delta = -delta;
        }
        let (axis, angle) = delta.to_axis_angle();
        let angular = if angle.abs() > f32::EPSILON { axis * (angle / dt) } else { Vec3::ZERO };
        body.set_linear_velocity(linear)?;
        body.set_angular_velocity(angular)?;
        self.activate_body(id)
    }

    /// Wakes a body. Static bodies and bodies that are not added stay as they are.
    pub fn activate_body(&mut self, id: BodyId) -> Result<(), PhysicsError> {
        let body = self.bodies.get_mut(id)?;
        if body.active || !body.added || body.is_static() {
            return Ok(());
        }
        body.active = true;
        body.reset_sleep_timer();
        let user_data = body.user_data();
        self.broad_phase.set_active(id, true)?;
        self.notify_activation(ActivationEvent::Activated(id, user_data));
        Ok(())
    }

    /// Puts a body to sleep immediately, zeroing its velocity.
    pub fn deactivate_body(&mut self, id: BodyId) -> Result<(), PhysicsError> {
        let body = self.bodies.get_mut(id)?;
        if !body.active {
            return Ok(());
        }
        body.active = false;
        body.linear_velocity = Vec3::ZERO;
        body.angular_velocity = Vec3::ZERO;
        body.reset_sleep_timer();
        let user_data = body.user_data();
        self.broad_phase.set_active(id, false)?;
        self.notify_activation(ActivationEvent::Deactivated(id, user_data));
        Ok(())
    }

    pub fn motion_type(&self, id: BodyId) -> Result<MotionType, PhysicsError> {
        Ok(self.bodies.read(id)?.motion_type())
    }

    pub fn object_layer(&self, id: BodyId) -> Result<ObjectLayer, PhysicsError> {
        Ok(self.bodies.read(id)?.object_layer())
    }

    /// Moves a body to another object layer; manifolds with bodies it may no longer touch end on the next step.
    pub fn set_object_layer(&mut self, id: BodyId, object_layer: ObjectLayer) -> Result<(), PhysicsError> {
        let body = self.bodies.get_mut(id)?;
        body.object_layer = object_layer;
        if body.added {
            self.broad_phase.set_object_layer(id, object_layer)?;
        }
        Ok(())
    }

    pub fn friction(&self, id: BodyId) -> Result<f32, PhysicsError> {
        Ok(self.bodies.read(id)?.friction())
    }

    pub fn set_friction(&mut self, id: BodyId, friction: f32) -> Result<(), PhysicsError> {
        self.bodies.get_mut(id)?.set_friction(friction);
        Ok(())
    }

    pub fn restitution(&self, id: BodyId) -> Result<f32, PhysicsError> {
        Ok(self.bodies.read(id)?.restitution())
    }

    pub fn set_restitution(&mut self, id: BodyId, restitution: f32) -> Result<(), PhysicsError> {
        self.bodies.get_mut(id)?.set_restitution(restitution);
        Ok(())
    }

    pub fn gravity_factor(&self, id: BodyId) -> Result<f32, PhysicsError> {
        Ok(self.bodies.read(id)?.gravity_factor())
    }

    pub fn set_gravity_factor(&mut self, id: BodyId, gravity_factor: f32) -> Result<(), PhysicsError> {
        self.bodies.get_mut(id)?.set_gravity_factor(gravity_factor);
        Ok(())
    }

    pub fn user_data(&self, id: BodyId) -> Result<u64, PhysicsError> {
        Ok(self.bodies.read(id)?.user_data())
    }

    pub fn set_user_data(&mut self, id: BodyId, user_data: u64) -> Result<(), PhysicsError> {
        self.bodies.get_mut(id)?.set_user_data(user_data);
        Ok(())
    }

    fn activate_if_moving(&mut self, id: BodyId, change: Vec3) -> Result<(), PhysicsError> {
        if change != Vec3::ZERO {
            self.activate_body(id)?;
        }
        Ok(())
    }

    /// Delivers an activation change made outside a step right away.
    fn notify_activation(&self, event: ActivationEvent) {
        if let Some(listener) = self.activation_listener.as_deref() {
            event.deliver(listener);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collidables::ShapeSettings;
    use crate::physics::collision_detection::layers::{
        BroadPhaseLayer, BroadPhaseLayerTable, ObjectLayerPairTable, ObjectVsBroadPhaseLayerTable,
    };
    use crate::physics::type_registry;
    use std::sync::Arc;

    fn system() -> PhysicsSystem {
        type_registry::ensure_initialized();
        let table = BroadPhaseLayerTable::new(vec![BroadPhaseLayer(0)]);
        let mut pairs = ObjectLayerPairTable::new(1);
        pairs.enable_collision(ObjectLayer(0), ObjectLayer(0));
        let object_vs_broad_phase = ObjectVsBroadPhaseLayerTable::new(&table, &pairs);
        PhysicsSystem::builder()
            .with_broad_phase_layer_interface(Arc::new(table))
            .with_object_vs_broad_phase_layer_filter(Arc::new(object_vs_broad_phase))
            .with_object_layer_pair_filter(Arc::new(pairs))
            .build()
            .unwrap()
    }

    fn sphere(motion_type: MotionType) -> BodyCreationSettings {
        let shape = ShapeSettings::sphere(0.5).build().unwrap();
        BodyCreationSettings::new(shape, Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY, motion_type, ObjectLayer(0))
    }

    #[test]
    fn add_remove_destroy_cycle() {
        let mut system = system();
        let id = system.create_body(&sphere(MotionType::Dynamic)).unwrap();
        assert!(!system.is_added(id));
        system.add_body(id, Activation::Activate).unwrap();
        assert!(system.is_added(id) && system.is_active(id));
        assert!(system.broad_phase().contains(id));
        assert_eq!(system.destroy_body(id), Err(PhysicsError::InvalidHandle(id)));
        assert!(matches!(system.add_body(id, Activation::Activate), Err(PhysicsError::InvalidOperation(_))));

        system.remove_body(id).unwrap();
        assert!(!system.broad_phase().contains(id));
        system.destroy_body(id).unwrap();
        assert_eq!(system.position(id), Err(PhysicsError::InvalidHandle(id)));
    }

    #[test]
    fn reused_slot_reports_stale_handle() {
        let mut system = system();
        let first = system.create_body(&sphere(MotionType::Dynamic)).unwrap();
        system.destroy_body(first).unwrap();
        let second = system.create_body(&sphere(MotionType::Dynamic)).unwrap();
        assert_eq!(first.index(), second.index());
        assert_eq!(system.position(first), Err(PhysicsError::StaleHandle(first)));
        assert!(system.position(second).is_ok());
    }

    #[test]
    fn static_bodies_reject_velocity_and_never_wake() {
        let mut system = system();
        let id = system.create_and_add_body(&sphere(MotionType::Static), Activation::Activate).unwrap();
        assert!(!system.is_active(id));
        assert!(matches!(
            system.set_linear_velocity(id, Vec3::X),
            Err(PhysicsError::InvalidOperation(_))
        ));
        system.set_position(id, Vec3::new(5.0, 0.0, 0.0), Activation::Activate).unwrap();
        assert!(!system.is_active(id));
        assert_eq!(system.position(id).unwrap(), Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn pose_writes_wake_unless_told_not_to() {
        let mut system = system();
        let id = system.create_and_add_body(&sphere(MotionType::Dynamic), Activation::DontActivate).unwrap();
        assert!(!system.is_active(id));
        system.set_position(id, Vec3::ONE, Activation::DontActivate).unwrap();
        assert!(!system.is_active(id));
        system.set_position(id, Vec3::ZERO, Activation::Activate).unwrap();
        assert!(system.is_active(id));
        assert_eq!(system.active_bodies(), vec![id]);
    }

    #[test]
    fn move_kinematic_sets_velocities() {
        let mut system = system();
        let id = system.create_and_add_body(&sphere(MotionType::Kinematic), Activation::DontActivate).unwrap();
        let target = Quat::from_rotation_y(0.5);
        system.move_kinematic(id, Vec3::new(1.0, 2.0, 0.0), target, 0.5).unwrap();
        assert!(system.is_active(id));
        assert!((system.linear_velocity(id).unwrap() - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-5);
        assert!((system.angular_velocity(id).unwrap() - Vec3::new(0.0, 1.0, 0.0)).length() < 1e-4);

        let dynamic = system.create_and_add_body(&sphere(MotionType::Dynamic), Activation::Activate).unwrap();
        assert!(system.move_kinematic(dynamic, Vec3::ZERO, Quat::IDENTITY, 0.5).is_err());
    }

    #[test]
    fn accessors_round_trip() {
        let mut system = system();
        let id = system.create_and_add_body(&sphere(MotionType::Dynamic), Activation::Activate).unwrap();
        system.set_friction(id, 0.7).unwrap();
        system.set_restitution(id, 0.3).unwrap();
        system.set_gravity_factor(id, 0.0).unwrap();
        system.set_user_data(id, 42).unwrap();
        assert_eq!(system.friction(id).unwrap(), 0.7);
        assert_eq!(system.restitution(id).unwrap(), 0.3);
        assert_eq!(system.gravity_factor(id).unwrap(), 0.0);
        assert_eq!(system.user_data(id).unwrap(), 42);
        assert_eq!(system.motion_type(id).unwrap(), MotionType::Dynamic);
        assert_eq!(system.read_body(id).unwrap().user_data(), 42);
    }

    #[test]
    fn destroying_a_body_drops_its_joints() {
        use crate::physics::constraints::{PointConstraint, PointConstraintSettings};

        let mut system = system();
        let a = system.create_and_add_body(&sphere(MotionType::Dynamic), Activation::Activate).unwrap();
        let b = system.create_and_add_body(&sphere(MotionType::Dynamic), Activation::Activate).unwrap();
        let joint = {
            let (body_a, body_b) = (system.read_body(a).unwrap(), system.read_body(b).unwrap());
            PointConstraint::new(&PointConstraintSettings::world(Vec3::new(0.0, 2.0, 0.0)), &body_a, &body_b).unwrap()
        };
        let id = system.add_constraint(Box::new(joint)).unwrap();

        system.remove_body(a).unwrap();
        assert!(system.constraint(id).is_ok());
        system.destroy_body(a).unwrap();
        assert_eq!(system.num_constraints(), 0);
        assert!(matches!(system.constraint(id), Err(PhysicsError::InvalidConstraintHandle(_))));
    }
}
