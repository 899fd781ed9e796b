//! Storage of the manifolds that survive from one step to the next.

use std::collections::BTreeMap;

use super::contact_manifold::{ContactKey, ContactManifold};
use crate::physics::handles::BodyId;

/// Fixed capacity map from [`ContactKey`] to the manifold detected for it.
///
/// Iteration is ordered by key, which keeps the solver's constraint order independent of hashing and thread timing.
#[derive(Debug, Default)]
pub struct PairCache {
    manifolds: BTreeMap<ContactKey, ContactManifold>,
    capacity: usize,
}

impl PairCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            manifolds: BTreeMap::new(),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.manifolds.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.manifolds.is_empty()
    }

    pub fn get(&self, key: &ContactKey) -> Option<&ContactManifold> {
        self.manifolds.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &ContactKey) -> Option<&mut ContactManifold> {
        self.manifolds.get_mut(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContactManifold> {
        self.manifolds.values()
    }

    /// Whether any manifold currently links the two bodies.
    pub fn contains_pair(&self, a: BodyId, b: BodyId) -> bool {
        self.manifolds
            .values()
            .any(|m| (m.body_a == a && m.body_b == b) || (m.body_a == b && m.body_b == a))
    }

    /// Drops every manifold touching `body`, returning them.
    pub(crate) fn remove_body(&mut self, body: BodyId) -> Vec<ContactManifold> {
        let keys: Vec<ContactKey> = self
            .manifolds
            .keys()
            .filter(|k| k.body_a == body || k.body_b == body)
            .copied()
            .collect();
        keys.iter().filter_map(|k| self.manifolds.remove(k)).collect()
    }

    /// Starts a rebuild of the cache for a new collision step.
    pub(crate) fn begin_update(&mut self) -> PairCacheUpdate {
        PairCacheUpdate {
            previous: std::mem::take(&mut self.manifolds),
            next: BTreeMap::new(),
            capacity: self.capacity,
            overflowed: false,
        }
    }

    /// Installs the rebuilt cache.
    ///
    /// Manifolds from the previous step that were not detected again are carried over when `keep` says so (pairs
    /// that were not tested because they are asleep) and returned as removed otherwise.
    pub(crate) fn end_update(
        &mut self,
        mut update: PairCacheUpdate,
        keep: impl Fn(&ContactManifold) -> bool,
    ) -> (Vec<ContactManifold>, bool) {
        let mut removed = Vec::new();
        for (key, manifold) in std::mem::take(&mut update.previous) {
            if keep(&manifold) && update.next.len() < update.capacity {
                update.next.insert(key, manifold);
            } else {
                removed.push(manifold);
            }
        }
        self.manifolds = update.next;
        (removed, update.overflowed)
    }
}

/// In-flight rebuild of a [`PairCache`].
#[derive(Debug)]
pub(crate) struct PairCacheUpdate {
    previous: BTreeMap<ContactKey, ContactManifold>,
    next: BTreeMap<ContactKey, ContactManifold>,
    capacity: usize,
    overflowed: bool,
}

impl PairCacheUpdate {
    /// Takes the manifold the previous step stored under `key`.
    pub fn take_previous(&mut self, key: &ContactKey) -> Option<ContactManifold> {
        self.previous.remove(key)
    }

    /// Whether another manifold fits.
    pub fn has_room(&self) -> bool {
        self.next.len() < self.capacity
    }

    /// Stores a manifold for this step. Returns false and flags the overflow when the cache is full.
    pub fn insert(&mut self, manifold: ContactManifold) -> bool {
        if !self.has_room() && !self.next.contains_key(&manifold.key()) {
            self.overflowed = true;
            return false;
        }
        self.next.insert(manifold.key(), manifold);
        true
    }

    /// Records that a manifold could not be stored.
    pub fn mark_overflow(&mut self) {
        self.overflowed = true;
    }
}
