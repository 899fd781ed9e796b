//! Turns candidate body pairs into persistent contact manifolds.
//!
//! The narrow phase runs in two stages. Pair jobs collide batches of body snapshots on worker threads and return
//! raw [`ShapeContact`]s. After the barrier, the calling thread merges the results into the [`PairCache`] in pair
//! order, which is where listener callbacks fire and where warm starting impulses carry over.

use std::collections::HashMap;
use std::sync::Arc;

use super::broad_phase::BodyPair;
use super::collision_dispatcher::{CollideShapeSettings, CollisionDispatcher};
use super::contact_listener::{ContactListener, ContactSettings, ValidateResult};
use super::contact_manifold::{ContactKey, ContactManifold, ManifoldTolerances, ShapeContact};
use super::pair_cache::PairCache;
use crate::physics::body::{Body, MotionType};
use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::Shape;
use crate::physics::handles::BodyId;

/// Immutable copy of the body state collision needs, owned by a pair job.
#[derive(Debug, Clone)]
pub(crate) struct CollisionBody {
    pub id: BodyId,
    pub shape: Arc<Shape>,
    pub pose: RigidPose,
    pub friction: f32,
    pub restitution: f32,
    pub is_sensor: bool,
    pub motion_type: MotionType,
    pub active: bool,
}

impl CollisionBody {
    pub fn from_body(body: &Body) -> Self {
        Self {
            id: body.id(),
            shape: Arc::clone(body.shape()),
            pose: body.pose(),
            friction: body.friction(),
            restitution: body.restitution(),
            is_sensor: body.is_sensor(),
            motion_type: body.motion_type(),
            active: body.is_active(),
        }
    }
}

/// Contacts found for one body pair by a pair job.
#[derive(Debug, Clone)]
pub(crate) struct PairContacts {
    pub pair: BodyPair,
    pub contacts: Vec<ShapeContact>,
}

/// Collides every pair of the batch. Runs on a worker thread.
pub(crate) fn collide_batch(
    dispatcher: &CollisionDispatcher,
    settings: &CollideShapeSettings,
    batch: &[(CollisionBody, CollisionBody)],
) -> Vec<PairContacts> {
    batch
        .iter()
        .map(|(a, b)| {
            let mut contacts = dispatcher.test_pair(&a.shape, &a.pose, &b.shape, &b.pose, settings);
            contacts.retain(|c| !c.points.is_empty());
            contacts.sort_by_key(|c| (c.sub_shape_a, c.sub_shape_b));
            PairContacts {
                pair: BodyPair { a: a.id, b: b.id },
                contacts,
            }
        })
        .collect()
}

/// Outcome of merging one collision step's contacts into the cache.
#[derive(Debug, Default)]
pub(crate) struct ManifoldUpdate {
    pub added: usize,
    pub persisted: usize,
    pub removed: usize,
    /// Sleeping dynamic bodies touched by an awake body.
    pub wake: Vec<BodyId>,
    pub overflowed: bool,
}

fn contact_key(a: &CollisionBody, b: &CollisionBody, contact: &ShapeContact) -> ContactKey {
    ContactKey {
        body_a: a.id,
        body_b: b.id,
        sub_shape_a: contact.sub_shape_a,
        sub_shape_b: contact.sub_shape_b,
    }
}

/// Material of a contact between `a` and `b` before listeners adjust it.
fn pair_settings(a: &CollisionBody, b: &CollisionBody) -> ContactSettings {
    let mut settings = ContactSettings::combine(a.friction, a.restitution, b.friction, b.restitution);
    settings.is_sensor = a.is_sensor || b.is_sensor;
    settings
}

/// Owner of the collision routines and the manifolds that persist between steps.
#[derive(Debug)]
pub struct NarrowPhase {
    dispatcher: Arc<CollisionDispatcher>,
    pair_cache: PairCache,
}

impl NarrowPhase {
    pub fn new(dispatcher: Arc<CollisionDispatcher>, max_manifolds: usize) -> Self {
        Self {
            dispatcher,
            pair_cache: PairCache::new(max_manifolds),
        }
    }

    #[inline]
    pub fn dispatcher(&self) -> &Arc<CollisionDispatcher> {
        &self.dispatcher
    }

    #[inline]
    pub fn pair_cache(&self) -> &PairCache {
        &self.pair_cache
    }

    pub(crate) fn manifold_mut(&mut self, key: &ContactKey) -> Option<&mut ContactManifold> {
        self.pair_cache.get_mut(key)
    }

    /// Merges the contacts of one collision step into the cache.
    ///
    /// Contacts that continue a manifold of the previous step are merged first, so new pairs can only take the
    /// slots left over. New contacts are then added in broad phase pair order, which `results` must follow.
    /// Manifolds that were not detected again are kept when `keep` returns true and reported as removed otherwise.
    pub(crate) fn update_manifolds(
        &mut self,
        results: Vec<PairContacts>,
        bodies: &HashMap<BodyId, CollisionBody>,
        tolerances: &ManifoldTolerances,
        listener: Option<&dyn ContactListener>,
        keep: impl Fn(&ContactManifold) -> bool,
    ) -> ManifoldUpdate {
        let mut outcome = ManifoldUpdate::default();
        let mut update = self.pair_cache.begin_update();
        let mut touching = vec![false; results.len()];
        let mut fresh: Vec<(usize, &ShapeContact)> = Vec::new();

        for (pair_index, PairContacts { pair, contacts }) in results.iter().enumerate() {
            let (Some(a), Some(b)) = (bodies.get(&pair.a), bodies.get(&pair.b)) else {
                continue;
            };
            for contact in contacts {
                let Some(mut manifold) = update.take_previous(&contact_key(a, b, contact)) else {
                    fresh.push((pair_index, contact));
                    continue;
                };
                if !update.has_room() {
                    update.mark_overflow();
                    outcome.removed += 1;
                    if let Some(listener) = listener {
                        listener.on_contact_removed(manifold.body_a, manifold.body_b);
                    }
                    continue;
                }
                let mut settings = pair_settings(a, b);
                manifold.update(contact, &a.pose, &b.pose, tolerances);
                if let Some(listener) = listener {
                    listener.on_contact_persisted(&manifold, &mut settings);
                }
                manifold.settings = settings;
                touching[pair_index] |= !manifold.settings.is_sensor;
                update.insert(manifold);
                outcome.persisted += 1;
            }
        }

        let mut pair_decision: Option<(usize, ValidateResult)> = None;
        for (pair_index, contact) in fresh {
            let pair = results[pair_index].pair;
            let (Some(a), Some(b)) = (bodies.get(&pair.a), bodies.get(&pair.b)) else {
                continue;
            };
            match pair_decision {
                Some((index, ValidateResult::RejectAllContactsForThisBodyPair)) if index == pair_index => continue,
                Some((index, ValidateResult::AcceptAllContactsForThisBodyPair)) if index == pair_index => {}
                _ => {
                    if let Some(listener) = listener {
                        let result = listener.validate_contact(a.id, b.id, a.pose.position, contact.max_penetration());
                        if result.applies_to_pair() {
                            pair_decision = Some((pair_index, result));
                        }
                        if !result.is_accept() {
                            continue;
                        }
                    }
                }
            }

            if !update.has_room() {
                update.mark_overflow();
                continue;
            }
            let mut settings = pair_settings(a, b);
            let mut manifold = ContactManifold::new(a.id, b.id, contact, &a.pose, &b.pose, settings);
            if let Some(listener) = listener {
                listener.on_contact_added(&manifold, &mut settings);
            }
            manifold.settings = settings;
            touching[pair_index] |= !manifold.settings.is_sensor;
            if update.insert(manifold) {
                outcome.added += 1;
            }
        }

        for (PairContacts { pair, .. }, _) in results.iter().zip(&touching).filter(|(_, touching)| **touching) {
            let (Some(a), Some(b)) = (bodies.get(&pair.a), bodies.get(&pair.b)) else {
                continue;
            };
            for (sleeper, other) in [(a, b), (b, a)] {
                if !sleeper.active && sleeper.motion_type.is_dynamic() && other.active {
                    outcome.wake.push(sleeper.id);
                }
            }
        }

        let (removed, overflowed) = self.pair_cache.end_update(update, keep);
        if overflowed {
            tracing::warn!(capacity = self.pair_cache.capacity(), "manifold cache full, contacts dropped");
        }
        outcome.overflowed = overflowed;
        outcome.removed += removed.len();
        if let Some(listener) = listener {
            for manifold in &removed {
                listener.on_contact_removed(manifold.body_a, manifold.body_b);
            }
        }
        outcome
    }

    /// Drops every manifold of a body leaving the simulation.
    pub(crate) fn remove_body(&mut self, body: BodyId, listener: Option<&dyn ContactListener>) {
        let removed = self.pair_cache.remove_body(body);
        if let Some(listener) = listener {
            for manifold in &removed {
                listener.on_contact_removed(manifold.body_a, manifold.body_b);
            }
        }
    }
}
