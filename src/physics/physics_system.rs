//! The physics system: owner of every component and driver of the simulation step.

use glam::Vec3;
use std::fmt;
use std::sync::Arc;

use crate::physics::activation::{ActivationEvent, BodyActivationListener};
use crate::physics::body_store::BodyStore;
use crate::physics::collidables::{RayCast, RayCastResult};
use crate::physics::collision_detection::layers::{
    BroadPhaseLayerInterface, ObjectLayer, ObjectLayerPairFilter, ObjectVsBroadPhaseLayerFilter,
};
use crate::physics::collision_detection::{queries, BroadPhase, ContactListener, NarrowPhase};
use crate::physics::constraints::{ConstraintManager, TwoBodyConstraint};
use crate::physics::error::{PhysicsError, PhysicsUpdateError};
use crate::physics::handles::ConstraintId;
use crate::physics::physics_settings::PhysicsSettings;
use crate::physics::simulation_allocation_sizes::SimulationAllocationSizes;
use crate::physics::type_registry;
use crate::utilities::task_scheduling::JobSystem;
use crate::utilities::temp_allocator::TempAllocator;

/// Counters describing the most recent call to [`PhysicsSystem::update`].
///
/// Counts refer to the last collision step of the update; `max_velocity_iterations` is the maximum over all of them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhysicsStepStats {
    pub collision_steps: u32,
    pub body_pairs: usize,
    pub manifolds: usize,
    pub contacts_added: usize,
    pub contacts_persisted: usize,
    pub contacts_removed: usize,
    pub contact_constraints: usize,
    pub joints: usize,
    pub islands: usize,
    pub max_velocity_iterations: u32,
    pub bodies_put_to_sleep: usize,
    pub active_bodies: usize,
}

/// Collects the capability objects and sizes a [`PhysicsSystem`] is built from.
#[derive(Default)]
pub struct PhysicsSystemBuilder {
    sizes: SimulationAllocationSizes,
    settings: PhysicsSettings,
    gravity: Option<Vec3>,
    broad_phase_layer_interface: Option<Arc<dyn BroadPhaseLayerInterface>>,
    object_vs_broad_phase_layer_filter: Option<Arc<dyn ObjectVsBroadPhaseLayerFilter>>,
    object_layer_pair_filter: Option<Arc<dyn ObjectLayerPairFilter>>,
    contact_listener: Option<Arc<dyn ContactListener>>,
    body_activation_listener: Option<Arc<dyn BodyActivationListener>>,
}

impl PhysicsSystemBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_allocation_sizes(mut self, sizes: SimulationAllocationSizes) -> Self {
        self.sizes = sizes;
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: PhysicsSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_gravity(mut self, gravity: Vec3) -> Self {
        self.gravity = Some(gravity);
        self
    }

    #[must_use]
    pub fn with_broad_phase_layer_interface(mut self, interface: Arc<dyn BroadPhaseLayerInterface>) -> Self {
        self.broad_phase_layer_interface = Some(interface);
        self
    }

    #[must_use]
    pub fn with_object_vs_broad_phase_layer_filter(mut self, filter: Arc<dyn ObjectVsBroadPhaseLayerFilter>) -> Self {
        self.object_vs_broad_phase_layer_filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_object_layer_pair_filter(mut self, filter: Arc<dyn ObjectLayerPairFilter>) -> Self {
        self.object_layer_pair_filter = Some(filter);
        self
    }

    #[must_use]
    pub fn with_contact_listener(mut self, listener: Arc<dyn ContactListener>) -> Self {
        self.contact_listener = Some(listener);
        self
    }

    #[must_use]
    pub fn with_body_activation_listener(mut self, listener: Arc<dyn BodyActivationListener>) -> Self {
        self.body_activation_listener = Some(listener);
        self
    }

    /// Builds the system. The three layer capabilities are required.
    ///
    /// # Panics
    /// Panics when the runtime was not initialized with [`initialize`](crate::physics::type_registry::initialize).
    pub fn build(self) -> Result<PhysicsSystem, PhysicsError> {
        let layer_interface = self
            .broad_phase_layer_interface
            .ok_or(PhysicsError::MissingCapability("broad phase layer interface"))?;
        let object_vs_broad_phase = self
            .object_vs_broad_phase_layer_filter
            .ok_or(PhysicsError::MissingCapability("object vs broad phase layer filter"))?;
        let object_pair = self
            .object_layer_pair_filter
            .ok_or(PhysicsError::MissingCapability("object layer pair filter"))?;
        if layer_interface.num_broad_phase_layers() == 0 {
            return Err(PhysicsError::InvalidConfiguration(
                "at least one broad phase layer is required".to_string(),
            ));
        }

        let dispatcher = type_registry::acquire_system();
        tracing::debug!(
            max_bodies = self.sizes.max_bodies,
            max_body_pairs = self.sizes.max_body_pairs,
            max_contact_manifolds = self.sizes.max_contact_manifolds,
            "physics system created"
        );
        Ok(PhysicsSystem {
            settings: self.settings,
            sizes: self.sizes,
            gravity: self.gravity.unwrap_or(PhysicsSystem::DEFAULT_GRAVITY),
            bodies: BodyStore::new(self.sizes.max_bodies),
            broad_phase: BroadPhase::new(layer_interface, self.settings.broad_phase_fat_margin),
            narrow_phase: NarrowPhase::new(dispatcher, self.sizes.max_contact_manifolds),
            constraints: ConstraintManager::new(),
            object_vs_broad_phase_filter: object_vs_broad_phase,
            object_layer_pair_filter: object_pair,
            contact_listener: self.contact_listener,
            activation_listener: self.body_activation_listener,
            activation_events: Vec::new(),
            last_step_stats: PhysicsStepStats::default(),
        })
    }
}

/// A simulated world.
///
/// Bodies are managed through the body interface methods (`create_body`, `add_body`, `set_position`, ...), and the
/// world advances with [`update`](PhysicsSystem::update). Dropping the system releases it from the runtime so
/// [`shutdown`](crate::physics::type_registry::shutdown) can succeed.
pub struct PhysicsSystem {
    pub(crate) settings: PhysicsSettings,
    pub(crate) sizes: SimulationAllocationSizes,
    pub(crate) gravity: Vec3,
    pub(crate) bodies: BodyStore,
    pub(crate) broad_phase: BroadPhase,
    pub(crate) narrow_phase: NarrowPhase,
    pub(crate) constraints: ConstraintManager,
    pub(crate) object_vs_broad_phase_filter: Arc<dyn ObjectVsBroadPhaseLayerFilter>,
    pub(crate) object_layer_pair_filter: Arc<dyn ObjectLayerPairFilter>,
    pub(crate) contact_listener: Option<Arc<dyn ContactListener>>,
    pub(crate) activation_listener: Option<Arc<dyn BodyActivationListener>>,
    /// Activation changes made while stepping, delivered once the step is over.
    pub(crate) activation_events: Vec<ActivationEvent>,
    pub(crate) last_step_stats: PhysicsStepStats,
}

impl PhysicsSystem {
    pub const DEFAULT_GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

    pub fn builder() -> PhysicsSystemBuilder {
        PhysicsSystemBuilder::new()
    }

    /// Advances the world by `dt` seconds.
    ///
    /// The step is split into `collision_steps` equal parts, each running collision detection and the solver; the
    /// solver further splits each part into `integration_sub_steps`. Capacity problems never abort the step; they
    /// are reported in the returned set. A non-positive `dt` leaves the world untouched.
    ///
    /// # Panics
    /// Panics when `collision_steps` is zero, or resumes the panic of a job that panicked.
    pub fn update(
        &mut self,
        dt: f32,
        collision_steps: u32,
        integration_sub_steps: u32,
        allocator: &mut TempAllocator,
        job_system: &JobSystem,
    ) -> PhysicsUpdateError {
        assert!(collision_steps > 0, "update needs at least one collision step");
        let _span = tracing::debug_span!("physics_update", dt, collision_steps, integration_sub_steps).entered();

        let mut errors = PhysicsUpdateError::empty();
        let mut stats = PhysicsStepStats::default();
        if dt <= 0.0 {
            self.last_step_stats = stats;
            return errors;
        }

        let step_dt = dt / collision_steps as f32;
        for step in 0..collision_steps {
            let _span = tracing::debug_span!("collision_step", step).entered();
            errors |= self.step(step_dt, integration_sub_steps, allocator, job_system, &mut stats);
        }

        for body in self.bodies.iter_mut() {
            body.clear_accumulated_forces();
        }
        self.flush_activation_events();
        stats.collision_steps = collision_steps;
        stats.active_bodies = self.active_bodies().len();
        self.last_step_stats = stats;
        allocator.end_step();

        if !errors.is_empty() {
            tracing::warn!(?errors, "physics update completed with reduced accuracy");
        }
        errors
    }

    #[inline]
    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = gravity;
    }

    #[inline]
    pub fn settings(&self) -> &PhysicsSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: PhysicsSettings) {
        self.settings = settings;
    }

    #[inline]
    pub fn allocation_sizes(&self) -> &SimulationAllocationSizes {
        &self.sizes
    }

    pub fn set_contact_listener(&mut self, listener: Option<Arc<dyn ContactListener>>) {
        self.contact_listener = listener;
    }

    pub fn set_body_activation_listener(&mut self, listener: Option<Arc<dyn BodyActivationListener>>) {
        self.activation_listener = listener;
    }

    #[inline]
    pub fn last_step_stats(&self) -> PhysicsStepStats {
        self.last_step_stats
    }

    #[inline]
    pub fn broad_phase(&self) -> &BroadPhase {
        &self.broad_phase
    }

    #[inline]
    pub fn narrow_phase(&self) -> &NarrowPhase {
        &self.narrow_phase
    }

    /// Rebuilds the broad phase trees. Worth calling after adding many bodies at once.
    pub fn optimize_broad_phase(&mut self) {
        self.broad_phase.optimize();
    }

    /// Nearest body hit by the ray `origin + t * direction`, `t` in `[0, 1]`.
    pub fn cast_ray(&self, ray: &RayCast) -> Option<RayCastResult> {
        queries::cast_ray(&self.broad_phase, &self.bodies, ray, |_| true)
    }

    /// Like [`cast_ray`](PhysicsSystem::cast_ray), ignoring bodies whose object layer fails `filter`.
    pub fn cast_ray_filtered(&self, ray: &RayCast, filter: impl Fn(ObjectLayer) -> bool) -> Option<RayCastResult> {
        queries::cast_ray(&self.broad_phase, &self.bodies, ray, filter)
    }

    /// Registers a joint. Both of its bodies must exist, be distinct and at least one must respond to impulses.
    pub fn add_constraint(&mut self, constraint: Box<dyn TwoBodyConstraint>) -> Result<ConstraintId, PhysicsError> {
        let (a, b) = constraint.bodies();
        let inverse_mass_a = self.bodies.read(a)?.inverse_mass();
        let inverse_mass_b = self.bodies.read(b)?.inverse_mass();
        if a == b {
            return Err(PhysicsError::InvalidConstraint(format!("constraint attaches {a} to itself")));
        }
        if inverse_mass_a == 0.0 && inverse_mass_b == 0.0 {
            return Err(PhysicsError::InvalidConstraint(format!(
                "constraint between {a} and {b} couples two immovable bodies"
            )));
        }
        let id = self.constraints.add(constraint);
        tracing::trace!(%id, body_a = %a, body_b = %b, "constraint added");
        Ok(id)
    }

    pub fn remove_constraint(&mut self, id: ConstraintId) -> Result<Box<dyn TwoBodyConstraint>, PhysicsError> {
        self.constraints.remove(id)
    }

    pub fn constraint(&self, id: ConstraintId) -> Result<&dyn TwoBodyConstraint, PhysicsError> {
        self.constraints.get(id)
    }

    #[inline]
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub(crate) fn flush_activation_events(&mut self) {
        let events = std::mem::take(&mut self.activation_events);
        if let Some(listener) = self.activation_listener.as_deref() {
            for event in &events {
                event.deliver(listener);
            }
        }
    }
}

impl fmt::Debug for PhysicsSystem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PhysicsSystem")
            .field("gravity", &self.gravity)
            .field("bodies", &self.bodies.len())
            .field("constraints", &self.constraints.len())
            .field("manifolds", &self.narrow_phase.pair_cache().len())
            .finish()
    }
}

impl Drop for PhysicsSystem {
    fn drop(&mut self) {
        type_registry::release_system();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body::MotionType;
    use crate::physics::body_description::BodyCreationSettings;
    use crate::physics::collidables::ShapeSettings;
    use crate::physics::constraints::SolverBody;
    use crate::physics::collision_detection::layers::{
        BroadPhaseLayer, BroadPhaseLayerTable, ObjectLayerPairTable, ObjectVsBroadPhaseLayerTable,
    };
    use crate::physics::handles::BodyId;
    use glam::Quat;

    fn layers() -> (Arc<BroadPhaseLayerTable>, Arc<ObjectVsBroadPhaseLayerTable>, Arc<ObjectLayerPairTable>) {
        let table = BroadPhaseLayerTable::new(vec![BroadPhaseLayer(0), BroadPhaseLayer(1)]);
        let mut pairs = ObjectLayerPairTable::new(2);
        pairs.enable_collision(ObjectLayer(0), ObjectLayer(1));
        pairs.enable_collision(ObjectLayer(1), ObjectLayer(1));
        let object_vs_broad_phase = ObjectVsBroadPhaseLayerTable::new(&table, &pairs);
        (Arc::new(table), Arc::new(object_vs_broad_phase), Arc::new(pairs))
    }

    #[test]
    fn builder_requires_every_layer_capability() {
        type_registry::ensure_initialized();
        let (table, object_vs_broad_phase, _) = layers();
        let error = PhysicsSystem::builder()
            .with_broad_phase_layer_interface(table)
            .with_object_vs_broad_phase_layer_filter(object_vs_broad_phase)
            .build()
            .unwrap_err();
        assert_eq!(error, PhysicsError::MissingCapability("object layer pair filter"));
    }

    #[test]
    fn zero_dt_update_reports_nothing() {
        type_registry::ensure_initialized();
        let (table, object_vs_broad_phase, pairs) = layers();
        let mut system = PhysicsSystem::builder()
            .with_broad_phase_layer_interface(table)
            .with_object_vs_broad_phase_layer_filter(object_vs_broad_phase)
            .with_object_layer_pair_filter(pairs)
            .with_gravity(Vec3::new(0.0, -1.0, 0.0))
            .build()
            .unwrap();
        assert_eq!(system.gravity(), Vec3::new(0.0, -1.0, 0.0));
        let jobs = JobSystem::single_threaded(64, 4);
        let mut allocator = TempAllocator::default();
        assert!(system.update(0.0, 1, 1, &mut allocator, &jobs).is_empty());
        assert_eq!(system.last_step_stats(), PhysicsStepStats::default());
    }

    #[derive(Debug)]
    struct Tether(BodyId, BodyId);

    impl TwoBodyConstraint for Tether {
        fn bodies(&self) -> (BodyId, BodyId) {
            (self.0, self.1)
        }
        fn setup_velocity(&mut self, _: &SolverBody, _: &SolverBody, _: f32) {}
        fn warm_start(&mut self, _: &mut SolverBody, _: &mut SolverBody, _: f32) {}
        fn solve_velocity(&mut self, _: &mut SolverBody, _: &mut SolverBody) -> f32 {
            0.0
        }
        fn solve_position(&mut self, _: &mut SolverBody, _: &mut SolverBody, _: f32, _: f32) -> f32 {
            0.0
        }
    }

    #[test]
    fn constraints_need_two_distinct_bodies_and_one_movable() {
        type_registry::ensure_initialized();
        let (table, object_vs_broad_phase, pairs) = layers();
        let mut system = PhysicsSystem::builder()
            .with_broad_phase_layer_interface(table)
            .with_object_vs_broad_phase_layer_filter(object_vs_broad_phase)
            .with_object_layer_pair_filter(pairs)
            .build()
            .unwrap();
        let body = |motion_type: MotionType, layer: ObjectLayer| {
            let shape = ShapeSettings::sphere(0.5).build().unwrap();
            BodyCreationSettings::new(shape, Vec3::ZERO, Quat::IDENTITY, motion_type, layer)
        };
        let wall = system.create_body(&body(MotionType::Static, ObjectLayer(0))).unwrap();
        let floor = system.create_body(&body(MotionType::Static, ObjectLayer(0))).unwrap();
        let ball = system.create_body(&body(MotionType::Dynamic, ObjectLayer(1))).unwrap();

        let error = system.add_constraint(Box::new(Tether(wall, floor))).unwrap_err();
        assert!(matches!(error, PhysicsError::InvalidConstraint(_)));
        let error = system.add_constraint(Box::new(Tether(ball, ball))).unwrap_err();
        assert!(matches!(error, PhysicsError::InvalidConstraint(_)));
        assert_eq!(system.num_constraints(), 0);

        system.add_constraint(Box::new(Tether(wall, ball))).unwrap();
        assert_eq!(system.num_constraints(), 1);
    }
}
