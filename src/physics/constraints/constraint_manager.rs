use super::constraint::TwoBodyConstraint;
use crate::physics::error::PhysicsError;
use crate::physics::handles::{BodyId, ConstraintId};

#[derive(Debug)]
struct ConstraintSlot {
    sequence: u32,
    constraint: Option<Box<dyn TwoBodyConstraint>>,
}

/// Owns the user-created constraints and hands out generational [`ConstraintId`]s.
///
/// Constraints are lent to the island solve jobs for the duration of a step through [`take_all`] and
/// [`restore`].
///
/// [`take_all`]: ConstraintManager::take_all
/// [`restore`]: ConstraintManager::restore
#[derive(Debug, Default)]
pub struct ConstraintManager {
    slots: Vec<ConstraintSlot>,
    free_slots: Vec<u32>,
    count: usize,
}

impl ConstraintManager {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn add(&mut self, constraint: Box<dyn TwoBodyConstraint>) -> ConstraintId {
        let index = match self.free_slots.pop() {
            Some(index) => index,
            None => {
                self.slots.push(ConstraintSlot {
                    sequence: 0,
                    constraint: None,
                });
                (self.slots.len() - 1) as u32
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.constraint = Some(constraint);
        self.count += 1;
        ConstraintId::new(index, slot.sequence)
    }

    pub fn remove(&mut self, id: ConstraintId) -> Result<Box<dyn TwoBodyConstraint>, PhysicsError> {
        let slot = self
            .slots
            .get_mut(id.index() as usize)
            .filter(|slot| slot.sequence == id.sequence())
            .ok_or(PhysicsError::InvalidConstraintHandle(id))?;
        let constraint = slot.constraint.take().ok_or(PhysicsError::InvalidConstraintHandle(id))?;
        slot.sequence = slot.sequence.wrapping_add(1);
        self.free_slots.push(id.index());
        self.count -= 1;
        Ok(constraint)
    }

    pub fn get(&self, id: ConstraintId) -> Result<&dyn TwoBodyConstraint, PhysicsError> {
        self.slots
            .get(id.index() as usize)
            .filter(|slot| slot.sequence == id.sequence())
            .and_then(|slot| slot.constraint.as_deref())
            .ok_or(PhysicsError::InvalidConstraintHandle(id))
    }

    #[inline]
    pub fn contains(&self, id: ConstraintId) -> bool {
        self.get(id).is_ok()
    }

    /// Removes every constraint attached to `body` and returns their ids.
    pub(crate) fn remove_body(&mut self, body: BodyId) -> Vec<ConstraintId> {
        let attached: Vec<ConstraintId> = self
            .iter_bodies()
            .filter(|&(_, (a, b))| a == body || b == body)
            .map(|(id, _)| id)
            .collect();
        for &id in &attached {
            let _ = self.remove(id);
        }
        attached
    }

    /// Ids and body pairs of every constraint, in id order.
    pub fn iter_bodies(&self) -> impl Iterator<Item = (ConstraintId, (BodyId, BodyId))> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.constraint
                .as_ref()
                .map(|c| (ConstraintId::new(index as u32, slot.sequence), c.bodies()))
        })
    }

    /// Lends out every constraint whose id passes `filter`. The slots stay reserved until [`restore`] returns them.
    ///
    /// [`restore`]: ConstraintManager::restore
    pub(crate) fn take_all(
        &mut self,
        filter: impl Fn(ConstraintId) -> bool,
    ) -> Vec<(ConstraintId, Box<dyn TwoBodyConstraint>)> {
        let mut taken = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            let id = ConstraintId::new(index as u32, slot.sequence);
            if slot.constraint.is_some() && filter(id) {
                if let Some(constraint) = slot.constraint.take() {
                    taken.push((id, constraint));
                }
            }
        }
        taken
    }

    pub(crate) fn restore(&mut self, constraints: Vec<(ConstraintId, Box<dyn TwoBodyConstraint>)>) {
        for (id, constraint) in constraints {
            if let Some(slot) = self.slots.get_mut(id.index() as usize) {
                if slot.sequence == id.sequence() {
                    slot.constraint = Some(constraint);
                }
            }
        }
    }
}
