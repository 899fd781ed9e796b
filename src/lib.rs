pub mod physics;
pub mod utilities;

pub use physics::collidables::{RayCast, RayCastResult, Shape, ShapeKind, ShapeSettings};
pub use physics::collision_detection::{
    BroadPhaseLayer, BroadPhaseLayerInterface, BroadPhaseLayerTable, ContactListener, ContactManifold, ContactSettings,
    ObjectLayer, ObjectLayerPairFilter, ObjectLayerPairTable, ObjectVsBroadPhaseLayerFilter,
    ObjectVsBroadPhaseLayerTable, ValidateResult,
};
pub use physics::constraints::{ConstraintSpace, PointConstraint, PointConstraintSettings, TwoBodyConstraint};
pub use physics::{
    ensure_initialized, initialize, shutdown, Activation, Body, BodyActivationListener, BodyCreationSettings, BodyId,
    ConstraintId, MotionType, PhysicsError, PhysicsSettings, PhysicsStepStats, PhysicsSystem, PhysicsSystemBuilder,
    PhysicsUpdateError, RigidPose, SimulationAllocationSizes,
};
pub use utilities::task_scheduling::{JobSystem, SchedulerError};
pub use utilities::temp_allocator::TempAllocator;
