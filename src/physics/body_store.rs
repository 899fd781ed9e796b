//! Slot arena owning every body of a system.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::physics::body::Body;
use crate::physics::error::PhysicsError;
use crate::physics::handles::BodyId;

#[derive(Debug)]
struct BodySlot {
    sequence: u32,
    body: Option<RwLock<Body>>,
}

/// Fixed capacity arena of bodies addressed by generational [`BodyId`]s.
///
/// Each body sits behind its own reader/writer lock so queries running next to the owner never observe a half
/// written pose.
#[derive(Debug)]
pub struct BodyStore {
    slots: Vec<BodySlot>,
    free_slots: Vec<u32>,
    max_bodies: usize,
    body_count: usize,
}

impl BodyStore {
    pub fn new(max_bodies: usize) -> Self {
        Self {
            slots: Vec::with_capacity(max_bodies.min(1024)),
            free_slots: Vec::new(),
            max_bodies,
            body_count: 0,
        }
    }

    #[inline]
    pub fn max_bodies(&self) -> usize {
        self.max_bodies
    }

    /// Number of bodies occupying a slot, added or not.
    #[inline]
    pub fn len(&self) -> usize {
        self.body_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.body_count == 0
    }

    /// Moves a body into a free slot and returns its id.
    pub fn insert(&mut self, mut body: Body) -> Result<BodyId, PhysicsError> {
        let index = match self.free_slots.pop() {
            Some(index) => index,
            None => {
                if self.slots.len() >= self.max_bodies {
                    return Err(PhysicsError::BodyCapacityExceeded(self.max_bodies));
                }
                self.slots.push(BodySlot {
                    sequence: 0,
                    body: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        let id = BodyId::new(index, slot.sequence);
        body.id = id;
        slot.body = Some(RwLock::new(body));
        self.body_count += 1;
        Ok(id)
    }

    /// Frees the slot of `id`, returning the body. The slot's sequence number advances so `id` goes stale.
    pub fn remove(&mut self, id: BodyId) -> Result<Body, PhysicsError> {
        self.get(id)?;
        let slot = &mut self.slots[id.index() as usize];
        let body = slot.body.take().ok_or(PhysicsError::InvalidHandle(id))?;
        slot.sequence = slot.sequence.wrapping_add(1);
        self.free_slots.push(id.index());
        self.body_count -= 1;
        Ok(body.into_inner())
    }

    /// Resolves an id to its body lock.
    ///
    /// Ids of freed slots report [`PhysicsError::InvalidHandle`]; ids of slots that were reused by another body
    /// report [`PhysicsError::StaleHandle`].
    pub fn get(&self, id: BodyId) -> Result<&RwLock<Body>, PhysicsError> {
        let slot = self
            .slots
            .get(id.index() as usize)
            .ok_or(PhysicsError::InvalidHandle(id))?;
        let body = slot.body.as_ref().ok_or(PhysicsError::InvalidHandle(id))?;
        if slot.sequence != id.sequence() {
            return Err(PhysicsError::StaleHandle(id));
        }
        Ok(body)
    }

    /// Exclusive access without locking; the caller owns the store mutably.
    pub fn get_mut(&mut self, id: BodyId) -> Result<&mut Body, PhysicsError> {
        self.get(id)?;
        self.slots[id.index() as usize]
            .body
            .as_mut()
            .map(RwLock::get_mut)
            .ok_or(PhysicsError::InvalidHandle(id))
    }

    pub fn read(&self, id: BodyId) -> Result<RwLockReadGuard<'_, Body>, PhysicsError> {
        Ok(self.get(id)?.read())
    }

    pub fn write(&self, id: BodyId) -> Result<RwLockWriteGuard<'_, Body>, PhysicsError> {
        Ok(self.get(id)?.write())
    }

    #[inline]
    pub fn contains(&self, id: BodyId) -> bool {
        self.get(id).is_ok()
    }

    /// Ids of all stored bodies in slot order.
    pub fn ids(&self) -> Vec<BodyId> {
        self.iter().map(|(id, _)| id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BodyId, &RwLock<Body>)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.body
                .as_ref()
                .map(|body| (BodyId::new(index as u32, slot.sequence), body))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Body> {
        self.slots
            .iter_mut()
            .filter_map(|slot| slot.body.as_mut().map(RwLock::get_mut))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body::MotionType;
    use crate::physics::body_description::BodyCreationSettings;
    use crate::physics::collidables::ShapeSettings;
    use crate::physics::collision_detection::layers::ObjectLayer;
    use glam::{Quat, Vec3};

    fn body() -> Body {
        let shape = ShapeSettings::sphere(1.0).build().unwrap();
        let settings = BodyCreationSettings::new(shape, Vec3::ZERO, Quat::IDENTITY, MotionType::Dynamic, ObjectLayer(0));
        Body::from_settings(&settings).unwrap()
    }

    #[test]
    fn freed_ids_are_invalid_and_reused_ids_are_stale() {
        let mut store = BodyStore::new(4);
        let a = store.insert(body()).unwrap();
        assert_eq!(store.read(a).unwrap().id(), a);
        store.remove(a).unwrap();
        assert_eq!(store.get(a).err(), Some(PhysicsError::InvalidHandle(a)));

        let b = store.insert(body()).unwrap();
        assert_eq!(b.index(), a.index());
        assert_ne!(b.sequence(), a.sequence());
        assert_eq!(store.get(a).err(), Some(PhysicsError::StaleHandle(a)));
        assert!(store.contains(b));
    }

    #[test]
    fn capacity_is_enforced() {
        let mut store = BodyStore::new(2);
        store.insert(body()).unwrap();
        store.insert(body()).unwrap();
        assert_eq!(store.insert(body()).err(), Some(PhysicsError::BodyCapacityExceeded(2)));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn out_of_range_ids_are_invalid() {
        let store = BodyStore::new(2);
        let id = BodyId::new(7, 0);
        assert_eq!(store.get(id).err(), Some(PhysicsError::InvalidHandle(id)));
    }
}
