//! Process-wide runtime state: the registered shape kinds and the default collision dispatch table.
//!
//! [`initialize`] must run before the first physics system is built, and [`shutdown`] only after the last one was
//! dropped.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::physics::collidables::ShapeKind;
use crate::physics::collision_detection::collision_dispatcher::CollisionDispatcher;
use crate::physics::error::PhysicsError;

#[derive(Debug)]
struct TypeRegistry {
    shape_kinds: Vec<ShapeKind>,
    dispatcher: Arc<CollisionDispatcher>,
    live_systems: usize,
}

static REGISTRY: Mutex<Option<TypeRegistry>> = Mutex::new(None);

/// Builds the registry. Fails with [`PhysicsError::AlreadyInitialized`] on a second call.
pub fn initialize() -> Result<(), PhysicsError> {
    let mut registry = REGISTRY.lock();
    if registry.is_some() {
        return Err(PhysicsError::AlreadyInitialized);
    }
    let dispatcher = CollisionDispatcher::with_default_routines();
    *registry = Some(TypeRegistry {
        shape_kinds: ShapeKind::ALL.to_vec(),
        dispatcher: Arc::new(dispatcher),
        live_systems: 0,
    });
    tracing::info!(shape_kinds = ShapeKind::ALL.len(), "physics runtime initialized");
    Ok(())
}

/// Initializes the registry unless that already happened.
pub fn ensure_initialized() {
    let _ = initialize();
}

/// Tears the registry down. Fails while physics systems are alive.
pub fn shutdown() -> Result<(), PhysicsError> {
    let mut registry = REGISTRY.lock();
    match registry.as_ref() {
        None => Err(PhysicsError::NotInitialized),
        Some(r) if r.live_systems > 0 => Err(PhysicsError::EngineObjectsAlive(r.live_systems)),
        Some(_) => {
            *registry = None;
            tracing::info!("physics runtime shut down");
            Ok(())
        }
    }
}

pub fn is_initialized() -> bool {
    REGISTRY.lock().is_some()
}

/// Shape kinds known to the runtime.
pub fn registered_shape_kinds() -> Result<Vec<ShapeKind>, PhysicsError> {
    REGISTRY
        .lock()
        .as_ref()
        .map(|r| r.shape_kinds.clone())
        .ok_or(PhysicsError::NotInitialized)
}

/// Number of physics systems currently alive.
pub fn live_system_count() -> usize {
    REGISTRY.lock().as_ref().map_or(0, |r| r.live_systems)
}

/// Registers a new system and returns the shared dispatch table.
///
/// # Panics
/// Panics when the runtime is not initialized.
pub(crate) fn acquire_system() -> Arc<CollisionDispatcher> {
    let mut registry = REGISTRY.lock();
    let registry = registry
        .as_mut()
        .unwrap_or_else(|| panic!("physics runtime used before initialize()"));
    registry.live_systems += 1;
    Arc::clone(&registry.dispatcher)
}

pub(crate) fn release_system() {
    if let Some(registry) = REGISTRY.lock().as_mut() {
        registry.live_systems = registry.live_systems.saturating_sub(1);
    }
}
