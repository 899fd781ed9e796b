mod common;

use common::*;
use glam::Vec3;
use rust_rigidphysics::{PointConstraint, PointConstraintSettings};

#[test]
fn point_joint_keeps_attachment_points_together() {
    let mut system = system();
    let a = add_sphere(&mut system, Vec3::new(-1.0, 10.0, 0.0), 0.5);
    let b = add_sphere(&mut system, Vec3::new(1.0, 10.0, 0.0), 0.5);
    let pivot = Vec3::new(0.0, 10.0, 0.0);

    let joint = {
        let (body_a, body_b) = (system.read_body(a).unwrap(), system.read_body(b).unwrap());
        PointConstraint::new(&PointConstraintSettings::world(pivot), &body_a, &body_b).unwrap()
    };
    system.add_constraint(Box::new(joint)).unwrap();

    let local_a = system.rotation(a).unwrap().inverse() * (pivot - system.position(a).unwrap());
    let local_b = system.rotation(b).unwrap().inverse() * (pivot - system.position(b).unwrap());
    let world_point = |system: &rust_rigidphysics::PhysicsSystem, id, local: Vec3| {
        system.position(id).unwrap() + system.rotation(id).unwrap() * local
    };

    for step in 0..100 {
        if step % 10 == 0 {
            system
                .add_impulse_at(a, Vec3::new(0.0, 300.0, 150.0), Vec3::new(-1.5, 10.0, 0.0))
                .unwrap();
        }
        if step % 15 == 0 {
            system.add_impulse(b, Vec3::new(-200.0, 0.0, 0.0)).unwrap();
        }
        run(&mut system, 1);
        let gap = world_point(&system, a, local_a).distance(world_point(&system, b, local_b));
        assert!(gap < 0.05, "attachment points drifted {gap} apart at step {step}");
    }
    assert_eq!(system.last_step_stats().joints, 1);
}

#[test]
fn joint_to_missing_body_is_rejected() {
    let mut system = system();
    let a = add_sphere(&mut system, Vec3::ZERO, 0.5);
    let b = add_sphere(&mut system, Vec3::new(2.0, 0.0, 0.0), 0.5);
    let joint = {
        let (body_a, body_b) = (system.read_body(a).unwrap(), system.read_body(b).unwrap());
        PointConstraint::new(&PointConstraintSettings::world(Vec3::X), &body_a, &body_b).unwrap()
    };
    system.remove_and_destroy_body(b).unwrap();
    assert!(system.add_constraint(Box::new(joint)).is_err());
    assert_eq!(system.num_constraints(), 0);
}
