pub mod constraint;
pub mod constraint_manager;
pub mod contact_constraint;
pub mod point_constraint;

pub use constraint::{ConstraintSpace, SolverBody, TwoBodyConstraint};
pub use constraint_manager::ConstraintManager;
pub use contact_constraint::ContactConstraint;
pub use point_constraint::{PointConstraint, PointConstraintSettings};
