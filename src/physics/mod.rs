pub mod activation;
pub mod body;
pub mod body_description;
mod body_interface;
pub mod body_properties;
pub mod body_store;
pub mod collidables;
pub mod collision_detection;
pub mod constraints;
pub mod error;
pub mod handles;
pub mod island_builder;
pub mod island_sleeper;
pub mod physics_settings;
pub mod physics_system;
pub(crate) mod pose_integrator;
pub mod simulation_allocation_sizes;
pub mod solver;
mod timestepper;
pub mod trees;
pub mod type_registry;

pub use activation::BodyActivationListener;
pub use body::{Activation, Body, MotionType};
pub use body_description::BodyCreationSettings;
pub use body_properties::{MassProperties, RigidPose};
pub use error::{PhysicsError, PhysicsUpdateError};
pub use handles::{BodyId, ConstraintId, SubShapeId, SubShapeIdCreator};
pub use physics_settings::PhysicsSettings;
pub use physics_system::{PhysicsStepStats, PhysicsSystem, PhysicsSystemBuilder};
pub use simulation_allocation_sizes::SimulationAllocationSizes;
pub use type_registry::{ensure_initialized, initialize, shutdown};
