//! Stages of one collision step, run in this order:
//! find body pairs -> collide pairs (parallel) -> merge manifolds -> build islands -> solve islands (parallel) ->
//! integrate kinematic bodies -> refresh broad phase bounds -> sleep.
//!
//! Jobs own copies of everything they read. Results come back through [`JobOutput`]s and are applied on the calling
//! thread after the stage barrier, which is also where listener callbacks fire.

use glam::Vec3;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::physics::activation::ActivationEvent;
use crate::physics::body::Body;
use crate::physics::collision_detection::narrow_phase::{collide_batch, CollisionBody, PairContacts};
use crate::physics::collision_detection::{BodyPair, CollideShapeSettings, ContactManifold};
use crate::physics::constraints::{ContactConstraint, SolverBody, TwoBodyConstraint};
use crate::physics::error::PhysicsUpdateError;
use crate::physics::handles::{BodyId, ConstraintId};
use crate::physics::island_builder::{build_islands, Island};
use crate::physics::island_sleeper::IslandSleeper;
use crate::physics::physics_system::{PhysicsStepStats, PhysicsSystem};
use crate::physics::pose_integrator;
use crate::physics::solver::{ConstraintSolver, IslandSolveStats, IslandState};
use crate::utilities::task_scheduling::{JobGraph, JobOutput, JobSystem};
use crate::utilities::temp_allocator::TempAllocator;

/// Body pairs collided by one narrow phase job.
const PAIRS_PER_JOB: usize = 16;

type Joint = (ConstraintId, Box<dyn TwoBodyConstraint>);

/// Schedules `graph` and waits for it, or runs it on this thread when the job system has no room for it.
fn run_stage(job_system: &JobSystem, graph: JobGraph, stage: &'static str) -> PhysicsUpdateError {
    if graph.is_empty() {
        return PhysicsUpdateError::empty();
    }
    tracing::trace!(stage, jobs = graph.len(), "running stage");
    match job_system.try_schedule(graph) {
        Ok(barrier) => {
            job_system.wait_for(barrier);
            PhysicsUpdateError::empty()
        }
        Err((error, graph)) => {
            tracing::warn!(stage, %error, "job system full, running stage on the calling thread");
            graph.run_inline();
            PhysicsUpdateError::JOB_SYSTEM_FULL
        }
    }
}

/// Whether the body is awake and moved by the solver.
#[inline]
fn is_awake_dynamic(body: &Body) -> bool {
    body.is_added() && body.is_active() && body.is_dynamic()
}

impl PhysicsSystem {
    /// Runs one collision step of length `dt`.
    pub(crate) fn step(
        &mut self,
        dt: f32,
        integration_sub_steps: u32,
        allocator: &mut TempAllocator,
        job_system: &JobSystem,
        stats: &mut PhysicsStepStats,
    ) -> PhysicsUpdateError {
        let mut errors = PhysicsUpdateError::empty();

        let pairs = self.find_body_pairs(&mut errors);
        stats.body_pairs = pairs.len();

        self.collide_pairs(pairs, allocator, job_system, &mut errors, stats);
        stats.manifolds = self.narrow_phase.pair_cache().len();

        let contacts = self.build_contact_constraints(&mut errors);
        let joints = self.take_joints();
        let islands = self.assemble_islands(&contacts, &joints, allocator);
        stats.contact_constraints = contacts.len();
        stats.joints = joints.len();
        stats.islands = islands.len();

        let iterations =
            self.solve_islands(&islands, contacts, joints, dt, integration_sub_steps, job_system, &mut errors);
        stats.max_velocity_iterations = stats.max_velocity_iterations.max(iterations);

        self.integrate_kinematic_bodies(dt);
        self.refresh_broad_phase();
        stats.bodies_put_to_sleep += self.sleep(&islands, dt);
        errors
    }

    /// Candidate pairs from the broad phase, capped at the body pair capacity.
    fn find_body_pairs(&self, errors: &mut PhysicsUpdateError) -> Vec<BodyPair> {
        let mut pairs = self
            .broad_phase
            .find_pairs(&*self.object_vs_broad_phase_filter, &*self.object_layer_pair_filter);
        if pairs.len() > self.sizes.max_body_pairs {
            tracing::warn!(
                found = pairs.len(),
                capacity = self.sizes.max_body_pairs,
                "body pair cache full, dropping pairs"
            );
            pairs.truncate(self.sizes.max_body_pairs);
            *errors |= PhysicsUpdateError::BODY_PAIR_CACHE_FULL;
        }
        pairs
    }

    /// Collides all pairs in parallel and merges the result into the manifold cache.
    fn collide_pairs(
        &mut self,
        pairs: Vec<BodyPair>,
        allocator: &mut TempAllocator,
        job_system: &JobSystem,
        errors: &mut PhysicsUpdateError,
        stats: &mut PhysicsStepStats,
    ) {
        let mut snapshots: HashMap<BodyId, CollisionBody> = HashMap::with_capacity(pairs.len());
        let mut jobs_pairs = Vec::with_capacity(pairs.len());
        for pair in &pairs {
            for id in [pair.a, pair.b] {
                if !snapshots.contains_key(&id) {
                    if let Ok(body) = self.bodies.read(id) {
                        snapshots.insert(id, CollisionBody::from_body(&body));
                    }
                }
            }
            if let (Some(a), Some(b)) = (snapshots.get(&pair.a), snapshots.get(&pair.b)) {
                jobs_pairs.push((a.clone(), b.clone()));
            }
        }
        allocator.record::<(CollisionBody, CollisionBody)>(jobs_pairs.len());

        let settings = CollideShapeSettings {
            speculative_distance: self.settings.speculative_contact_distance,
        };
        let mut graph = JobGraph::new();
        let mut outputs: Vec<JobOutput<Vec<PairContacts>>> = Vec::new();
        let mut remaining = jobs_pairs.into_iter().peekable();
        while remaining.peek().is_some() {
            let batch: Vec<(CollisionBody, CollisionBody)> = remaining.by_ref().take(PAIRS_PER_JOB).collect();
            let dispatcher = Arc::clone(self.narrow_phase.dispatcher());
            let output = JobOutput::new();
            let result = output.clone();
            graph.add_job("narrow_phase", &[], move || {
                result.set(collide_batch(&dispatcher, &settings, &batch));
            });
            outputs.push(output);
        }
        *errors |= run_stage(job_system, graph, "narrow_phase");

        let results: Vec<PairContacts> = outputs.iter().flat_map(|o| o.take().unwrap_or_default()).collect();
        let tolerances = self.settings.manifold_tolerances();
        let bodies = &self.bodies;
        // Manifolds that were not found again survive only while both bodies sleep.
        let keep = |manifold: &ContactManifold| {
            [manifold.body_a, manifold.body_b]
                .into_iter()
                .all(|id| bodies.read(id).map_or(false, |b| b.is_added() && !b.is_active()))
        };
        let update = self.narrow_phase.update_manifolds(
            results,
            &snapshots,
            &tolerances,
            self.contact_listener.as_deref(),
            keep,
        );
        if update.overflowed {
            *errors |= PhysicsUpdateError::MANIFOLD_CACHE_FULL;
        }
        stats.contacts_added = update.added;
        stats.contacts_persisted = update.persisted;
        stats.contacts_removed = update.removed;
        for id in update.wake {
            self.wake_during_step(id);
        }
    }

    /// Activates a sleeping body from within the step; the listener hears about it after the step.
    fn wake_during_step(&mut self, id: BodyId) {
        let Ok(body) = self.bodies.get_mut(id) else {
            return;
        };
        if body.is_active() || body.is_static() || !body.is_added() {
            return;
        }
        body.active = true;
        body.reset_sleep_timer();
        let event = ActivationEvent::Activated(id, body.user_data());
        if self.broad_phase.set_active(id, true).is_ok() {
            self.activation_events.push(event);
        }
    }

    /// One constraint per touching, non-sensor manifold that involves an awake dynamic body, in manifold key order.
    fn build_contact_constraints(&self, errors: &mut PhysicsUpdateError) -> Vec<ContactConstraint> {
        let mut contacts = Vec::new();
        for manifold in self.narrow_phase.pair_cache().iter() {
            if manifold.settings.is_sensor || manifold.points.is_empty() {
                continue;
            }
            let (Ok(a), Ok(b)) = (self.bodies.read(manifold.body_a), self.bodies.read(manifold.body_b)) else {
                continue;
            };
            if !is_awake_dynamic(&a) && !is_awake_dynamic(&b) {
                continue;
            }
            if contacts.len() >= self.sizes.max_contact_constraints {
                tracing::warn!(
                    capacity = self.sizes.max_contact_constraints,
                    "contact constraint buffer full, ignoring remaining contacts"
                );
                *errors |= PhysicsUpdateError::CONTACT_CONSTRAINTS_FULL;
                break;
            }
            contacts.push(ContactConstraint::new(
                manifold,
                &SolverBody::from_body(&a),
                &SolverBody::from_body(&b),
                self.settings.min_velocity_for_restitution,
                self.settings.use_warm_start,
            ));
        }
        contacts
    }

    /// Lends out the joints whose bodies are both in the simulation and of which at least one is awake. Sleeping
    /// dynamic bodies held by such a joint are woken up.
    fn take_joints(&mut self) -> Vec<Joint> {
        let mut runnable = HashSet::new();
        let mut to_wake = Vec::new();
        for (id, (a, b)) in self.constraints.iter_bodies() {
            let (Ok(body_a), Ok(body_b)) = (self.bodies.read(a), self.bodies.read(b)) else {
                continue;
            };
            if !body_a.is_added() || !body_b.is_added() {
                continue;
            }
            let (awake_a, awake_b) = (is_awake_dynamic(&body_a), is_awake_dynamic(&body_b));
            if !awake_a && !awake_b {
                continue;
            }
            if !awake_a && body_a.is_dynamic() {
                to_wake.push(a);
            }
            if !awake_b && body_b.is_dynamic() {
                to_wake.push(b);
            }
            runnable.insert(id);
        }
        for id in to_wake {
            self.wake_during_step(id);
        }
        self.constraints.take_all(|id| runnable.contains(&id))
    }

    fn assemble_islands(
        &self,
        contacts: &[ContactConstraint],
        joints: &[Joint],
        allocator: &mut TempAllocator,
    ) -> Vec<Island> {
        let awake: Vec<BodyId> = self
            .bodies
            .iter()
            .filter(|(_, body)| is_awake_dynamic(&body.read()))
            .map(|(id, _)| id)
            .collect();
        let contact_pairs: Vec<(BodyId, BodyId)> = contacts.iter().map(|c| c.bodies()).collect();
        let joint_pairs: Vec<(BodyId, BodyId)> = joints.iter().map(|(_, j)| j.bodies()).collect();
        build_islands(&awake, &contact_pairs, &joint_pairs, allocator)
    }

    /// Solves every island in its own job and scatters the results back. Returns the largest number of velocity
    /// iterations any island needed.
    #[allow(clippy::too_many_arguments)]
    fn solve_islands(
        &mut self,
        islands: &[Island],
        contacts: Vec<ContactConstraint>,
        joints: Vec<Joint>,
        dt: f32,
        integration_sub_steps: u32,
        job_system: &JobSystem,
        errors: &mut PhysicsUpdateError,
    ) -> u32 {
        let mut contacts: Vec<Option<ContactConstraint>> = contacts.into_iter().map(Some).collect();
        let mut joints: Vec<Option<Joint>> = joints.into_iter().map(Some).collect();
        let solver = ConstraintSolver::new(self.settings, self.gravity);

        let mut graph = JobGraph::new();
        let mut outputs: Vec<(usize, JobOutput<(IslandState, IslandSolveStats)>)> = Vec::with_capacity(islands.len());
        for island in islands {
            let mut state = IslandState::new();
            for &id in &island.bodies {
                self.gather(&mut state, id);
            }
            for &index in &island.contacts {
                if let Some(contact) = contacts[index].take() {
                    let (a, b) = contact.bodies();
                    self.gather(&mut state, a);
                    self.gather(&mut state, b);
                    state.contacts.push(contact);
                }
            }
            for &index in &island.joints {
                if let Some(joint) = joints[index].take() {
                    let (a, b) = joint.1.bodies();
                    self.gather(&mut state, a);
                    self.gather(&mut state, b);
                    state.joints.push(joint);
                }
            }

            let output = JobOutput::new();
            let result = output.clone();
            graph.add_job("solve_island", &[], move || {
                let stats = solver.solve_island(&mut state, dt, integration_sub_steps);
                result.set((state, stats));
            });
            outputs.push((island.bodies.len(), output));
        }
        *errors |= run_stage(job_system, graph, "solve_islands");

        // Joints not claimed by any island go straight back.
        self.constraints.restore(joints.into_iter().flatten().collect());

        let mut max_iterations = 0;
        for (member_count, output) in outputs {
            let Some((state, stats)) = output.take() else {
                continue;
            };
            max_iterations = max_iterations.max(stats.velocity_iterations);
            for solved in &state.bodies[..member_count] {
                if let Ok(mut body) = self.bodies.write(solved.id) {
                    solved.scatter(&mut body);
                }
            }
            for contact in &state.contacts {
                if let Some(manifold) = self.narrow_phase.manifold_mut(&contact.key()) {
                    contact.write_back(manifold);
                }
            }
            self.constraints.restore(state.joints);
        }
        max_iterations
    }

    fn gather(&self, state: &mut IslandState, id: BodyId) {
        if state.body(id).is_none() {
            if let Ok(body) = self.bodies.read(id) {
                state.add_body(SolverBody::from_body(&body));
            }
        }
    }

    /// Kinematic bodies follow their velocity and take no part in islands.
    fn integrate_kinematic_bodies(&mut self, dt: f32) {
        for body in self.bodies.iter_mut() {
            if body.is_added() && body.is_active() && body.is_kinematic() {
                let mut solver_body = SolverBody::from_body(body);
                pose_integrator::integrate_position(&mut solver_body, dt);
                solver_body.scatter(body);
            }
        }
    }

    /// Moves the broad phase entries of every awake body to its new bounds.
    fn refresh_broad_phase(&mut self) {
        let margin = self.settings.speculative_contact_distance;
        for (id, body) in self.bodies.iter() {
            let body = body.read();
            if body.is_added() && body.is_active() && !body.is_static() {
                if let Err(error) = self.broad_phase.update(id, body.world_bounds().expanded(margin)) {
                    tracing::warn!(%id, %error, "body missing from the broad phase");
                }
            }
        }
    }

    /// Puts islands that rested long enough to sleep. Returns the number of bodies deactivated.
    fn sleep(&mut self, islands: &[Island], dt: f32) -> usize {
        let sleeper = IslandSleeper::new(&self.settings);
        let sleepers = sleeper.collect_sleepers(&mut self.bodies, islands, dt);
        for &id in &sleepers {
            if let Ok(body) = self.bodies.get_mut(id) {
                body.active = false;
                body.linear_velocity = Vec3::ZERO;
                body.angular_velocity = Vec3::ZERO;
                body.reset_sleep_timer();
                self.activation_events.push(ActivationEvent::Deactivated(id, body.user_data()));
            }
            let _ = self.broad_phase.set_active(id, false);
        }
        if !sleepers.is_empty() {
            tracing::trace!(bodies = sleepers.len(), "islands went to sleep");
        }
        sleepers.len()
    }
}
