//! Error types surfaced by the physics system.

use crate::physics::handles::{BodyId, ConstraintId};
use crate::utilities::task_scheduling::SchedulerError;
use thiserror::Error;

/// Structural errors. Each aborts only the offending call and leaves the system consistent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PhysicsError {
    /// The body id does not refer to a live body.
    #[error("invalid body handle {0}")]
    InvalidHandle(BodyId),

    /// The id refers to a slot that has since been reused by another body.
    #[error("stale body handle {0}: the slot was reused")]
    StaleHandle(BodyId),

    /// The operation is not valid for the body's current state or motion type.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Shape or body settings failed validation; nothing was created.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The constraint cannot be registered, e.g. it couples two immovable bodies.
    #[error("invalid constraint: {0}")]
    InvalidConstraint(String),

    #[error("invalid constraint handle {0}")]
    InvalidConstraintHandle(ConstraintId),

    /// All body slots are occupied.
    #[error("body capacity of {0} exceeded")]
    BodyCapacityExceeded(usize),

    #[error("the physics runtime is already initialized")]
    AlreadyInitialized,

    #[error("the physics runtime is not initialized")]
    NotInitialized,

    /// Shutdown was requested while physics systems still exist.
    #[error("cannot shut down: {0} physics systems are still alive")]
    EngineObjectsAlive(usize),

    /// A required capability object was not supplied to the builder.
    #[error("missing capability: {0}")]
    MissingCapability(&'static str),

    #[error("scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),
}

bitflags::bitflags! {
    /// Soft errors raised while stepping. The step always completes; a set bit means some interactions were
    /// dropped or processed with reduced accuracy because a fixed-capacity buffer was exhausted.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PhysicsUpdateError: u32 {
        /// More contact manifolds than the manifold cache holds.
        const MANIFOLD_CACHE_FULL = 1 << 0;
        /// More candidate pairs than the body pair cache holds.
        const BODY_PAIR_CACHE_FULL = 1 << 1;
        /// More contact constraints than the solver was sized for.
        const CONTACT_CONSTRAINTS_FULL = 1 << 2;
        /// The job system ran out of job or barrier slots; the stage ran on the calling thread.
        const JOB_SYSTEM_FULL = 1 << 3;
    }
}

impl Default for PhysicsUpdateError {
    fn default() -> Self {
        Self::empty()
    }
}
