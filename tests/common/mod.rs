#![allow(dead_code)]

use glam::{Quat, Vec3};
use rust_rigidphysics::{
    Activation, BodyCreationSettings, BodyId, BroadPhaseLayer, BroadPhaseLayerTable, JobSystem, MotionType,
    ObjectLayer, ObjectLayerPairTable, ObjectVsBroadPhaseLayerTable, PhysicsSettings, PhysicsSystem,
    PhysicsSystemBuilder, PhysicsUpdateError, ShapeSettings, SimulationAllocationSizes, TempAllocator,
};
use std::sync::Arc;

pub const NON_MOVING: ObjectLayer = ObjectLayer(0);
pub const MOVING: ObjectLayer = ObjectLayer(1);
pub const DT: f32 = 1.0 / 60.0;

/// Two object layers mapped onto two broad phase layers; static bodies never collide with each other.
pub fn layer_tables() -> (BroadPhaseLayerTable, ObjectLayerPairTable, ObjectVsBroadPhaseLayerTable) {
    let table = BroadPhaseLayerTable::new(vec![BroadPhaseLayer(0), BroadPhaseLayer(1)]);
    let mut pairs = ObjectLayerPairTable::new(2);
    pairs.enable_collision(NON_MOVING, MOVING);
    pairs.enable_collision(MOVING, MOVING);
    let object_vs_broad_phase = ObjectVsBroadPhaseLayerTable::new(&table, &pairs);
    (table, pairs, object_vs_broad_phase)
}

pub fn builder() -> PhysicsSystemBuilder {
    rust_rigidphysics::ensure_initialized();
    let (table, pairs, object_vs_broad_phase) = layer_tables();
    PhysicsSystem::builder()
        .with_broad_phase_layer_interface(Arc::new(table))
        .with_object_vs_broad_phase_layer_filter(Arc::new(object_vs_broad_phase))
        .with_object_layer_pair_filter(Arc::new(pairs))
}

pub fn system() -> PhysicsSystem {
    builder().build().unwrap()
}

pub fn system_with(settings: PhysicsSettings, sizes: SimulationAllocationSizes) -> PhysicsSystem {
    builder()
        .with_settings(settings)
        .with_allocation_sizes(sizes)
        .build()
        .unwrap()
}

/// A 40 x 1 x 40 static box whose top face lies at y = 0.
pub fn add_ground(system: &mut PhysicsSystem) -> BodyId {
    let shape = ShapeSettings::cuboid(Vec3::new(20.0, 0.5, 20.0)).build().unwrap();
    let settings =
        BodyCreationSettings::new(shape, Vec3::new(0.0, -0.5, 0.0), Quat::IDENTITY, MotionType::Static, NON_MOVING);
    system.create_and_add_body(&settings, Activation::DontActivate).unwrap()
}

pub fn add_sphere(system: &mut PhysicsSystem, position: Vec3, radius: f32) -> BodyId {
    let shape = ShapeSettings::sphere(radius).build().unwrap();
    let settings = BodyCreationSettings::new(shape, position, Quat::IDENTITY, MotionType::Dynamic, MOVING);
    system.create_and_add_body(&settings, Activation::Activate).unwrap()
}

/// Runs `steps` single collision step updates and returns every error bit raised.
pub fn run(system: &mut PhysicsSystem, steps: usize) -> PhysicsUpdateError {
    let jobs = JobSystem::new(2, 1024, 8).unwrap();
    let mut allocator = TempAllocator::default();
    let mut errors = PhysicsUpdateError::empty();
    for _ in 0..steps {
        errors |= system.update(DT, 1, 1, &mut allocator, &jobs);
    }
    errors
}
