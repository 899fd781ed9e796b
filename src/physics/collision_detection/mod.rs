pub mod broad_phase;
pub mod collision_dispatcher;
pub mod collision_tasks;
pub mod contact_listener;
pub mod contact_manifold;
pub mod depth_refiner;
pub mod layers;
pub mod narrow_phase;
pub mod pair_cache;
pub mod queries;
pub mod support_finder;

pub use broad_phase::{BodyPair, BroadPhase, BroadPhaseProxy};
pub use collision_dispatcher::{CollideFn, CollideShapeSettings, CollisionDispatcher, ShapeInstance};
pub use contact_listener::{ContactListener, ContactSettings, ValidateResult};
pub use contact_manifold::{CollidePoint, ContactKey, ContactManifold, ContactPoint, ShapeContact, MAX_CONTACT_POINTS};
pub use layers::{
    BroadPhaseLayer, BroadPhaseLayerInterface, BroadPhaseLayerTable, ObjectLayer, ObjectLayerPairFilter,
    ObjectLayerPairTable, ObjectVsBroadPhaseLayerFilter, ObjectVsBroadPhaseLayerTable,
};
pub use narrow_phase::NarrowPhase;
pub use pair_cache::PairCache;
