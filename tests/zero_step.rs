mod common;

use common::*;
use glam::Vec3;
use rust_rigidphysics::{JobSystem, PhysicsUpdateError, TempAllocator};

#[test]
fn zero_delta_update_changes_nothing() {
    let mut system = system();
    add_ground(&mut system);
    let bodies: Vec<_> = (0..5)
        .map(|i| add_sphere(&mut system, Vec3::new(i as f32 * 0.9, 0.6 + i as f32, 0.0), 0.5))
        .collect();
    for &body in &bodies {
        system.set_linear_velocity(body, Vec3::new(1.0, 0.0, -0.5)).unwrap();
    }
    run(&mut system, 10);

    let snapshot = |system: &rust_rigidphysics::PhysicsSystem| {
        bodies
            .iter()
            .map(|&id| {
                (
                    system.position(id).unwrap(),
                    system.rotation(id).unwrap(),
                    system.linear_velocity(id).unwrap(),
                    system.angular_velocity(id).unwrap(),
                )
            })
            .collect::<Vec<_>>()
    };
    let before = snapshot(&system);
    let manifolds_before: Vec<_> = system.narrow_phase().pair_cache().iter().cloned().collect();

    let jobs = JobSystem::new(2, 256, 8).unwrap();
    let mut allocator = TempAllocator::default();
    assert_eq!(system.update(0.0, 1, 1, &mut allocator, &jobs), PhysicsUpdateError::empty());
    assert_eq!(system.update(0.0, 1, 1, &mut allocator, &jobs), PhysicsUpdateError::empty());

    assert_eq!(snapshot(&system), before);
    let manifolds_after: Vec<_> = system.narrow_phase().pair_cache().iter().cloned().collect();
    assert_eq!(manifolds_after, manifolds_before);
}
