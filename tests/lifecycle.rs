mod common;

use rust_rigidphysics::PhysicsError;

// Runs as a single test so nothing else touches the process-wide runtime state meanwhile.
#[test]
fn runtime_outlives_every_physics_system() {
    rust_rigidphysics::initialize().unwrap();
    assert!(matches!(rust_rigidphysics::initialize(), Err(PhysicsError::AlreadyInitialized)));

    let system = common::system();
    assert!(matches!(rust_rigidphysics::shutdown(), Err(PhysicsError::EngineObjectsAlive(1))));
    drop(system);

    rust_rigidphysics::shutdown().unwrap();
    assert!(matches!(rust_rigidphysics::shutdown(), Err(PhysicsError::NotInitialized)));

    rust_rigidphysics::initialize().unwrap();
    let system = common::system();
    drop(system);
    rust_rigidphysics::shutdown().unwrap();
}
