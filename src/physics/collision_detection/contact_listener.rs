//! Callbacks raised while contacts are created, kept and destroyed.

use glam::Vec3;

use super::contact_manifold::ContactManifold;
use crate::physics::handles::BodyId;

/// Decision returned by [`ContactListener::validate_contact`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidateResult {
    /// Accept this contact and every further contact between the two bodies this step.
    #[default]
    AcceptAllContactsForThisBodyPair,
    /// Accept this contact and keep validating the remaining ones.
    AcceptContact,
    /// Drop this contact and keep validating the remaining ones.
    RejectContact,
    /// Drop every contact between the two bodies this step.
    RejectAllContactsForThisBodyPair,
}

impl ValidateResult {
    #[inline]
    pub fn is_accept(&self) -> bool {
        matches!(
            self,
            ValidateResult::AcceptAllContactsForThisBodyPair | ValidateResult::AcceptContact
        )
    }

    /// Whether the decision covers every remaining contact of the pair.
    #[inline]
    pub fn applies_to_pair(&self) -> bool {
        matches!(
            self,
            ValidateResult::AcceptAllContactsForThisBodyPair | ValidateResult::RejectAllContactsForThisBodyPair
        )
    }
}

/// Material of a contact. Seeded from the combined body materials; listeners may overwrite any field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactSettings {
    pub combined_friction: f32,
    pub combined_restitution: f32,
    /// Sensor contacts raise events but never produce a constraint.
    pub is_sensor: bool,
}

impl Default for ContactSettings {
    fn default() -> Self {
        Self {
            combined_friction: 0.0,
            combined_restitution: 0.0,
            is_sensor: false,
        }
    }
}

impl ContactSettings {
    /// Combines two body materials: geometric mean of the frictions and the larger restitution.
    pub fn combine(friction_a: f32, restitution_a: f32, friction_b: f32, restitution_b: f32) -> Self {
        Self {
            combined_friction: (friction_a * friction_b).max(0.0).sqrt(),
            combined_restitution: restitution_a.max(restitution_b),
            is_sensor: false,
        }
    }
}

/// Receives contact lifecycle events.
///
/// Events are delivered on the thread that called `update`, after the narrow phase barrier. Implementations must
/// not call back into the physics system.
pub trait ContactListener: Send + Sync {
    /// Called for a new contact before it is added. `base_offset` is the position of body A and
    /// `penetration` the deepest point of the candidate manifold.
    fn validate_contact(&self, _body_a: BodyId, _body_b: BodyId, _base_offset: Vec3, _penetration: f32) -> ValidateResult {
        ValidateResult::AcceptAllContactsForThisBodyPair
    }

    /// A pair of sub shapes started touching.
    fn on_contact_added(&self, _manifold: &ContactManifold, _settings: &mut ContactSettings) {}

    /// A pair of sub shapes that touched last step still touches.
    fn on_contact_persisted(&self, _manifold: &ContactManifold, _settings: &mut ContactSettings) {}

    /// A pair of sub shapes stopped touching, or one of the bodies was removed.
    fn on_contact_removed(&self, _body_a: BodyId, _body_b: BodyId) {}
}
