use crate::physics::handles::BodyId;

/// Receives wake and sleep notifications.
///
/// Events are queued while a step runs and delivered on the calling thread once the step reaches its final
/// barrier, or immediately for bodies activated through the body interface. Implementations must not call back
/// into the physics system.
pub trait BodyActivationListener: Send + Sync {
    fn on_body_activated(&self, body_id: BodyId, user_data: u64);

    fn on_body_deactivated(&self, body_id: BodyId, user_data: u64);
}

/// A queued activation change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActivationEvent {
    Activated(BodyId, u64),
    Deactivated(BodyId, u64),
}

impl ActivationEvent {
    pub fn deliver(&self, listener: &dyn BodyActivationListener) {
        match *self {
            ActivationEvent::Activated(id, user_data) => listener.on_body_activated(id, user_data),
            ActivationEvent::Deactivated(id, user_data) => listener.on_body_deactivated(id, user_data),
        }
    }
}
