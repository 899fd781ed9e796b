use crate::physics::collidables::Shape;
use crate::physics::collision_detection::collision_dispatcher::{CollideShapeSettings, CollisionDispatcher, ShapeInstance};
use crate::physics::collision_detection::contact_manifold::ShapeContact;

/// Compound vs any shape: every child whose bounds come within the speculative distance of the other shape is
/// dispatched on its own, with the child index appended to its sub shape id.
pub fn collide_compound(
    dispatcher: &CollisionDispatcher,
    settings: &CollideShapeSettings,
    a: &ShapeInstance,
    b: &ShapeInstance,
    out: &mut Vec<ShapeContact>,
) {
    let Shape::Compound(compound) = a.shape else {
        return;
    };
    let bounds_b = b.shape.world_bounds(&b.pose).expanded(settings.speculative_distance);
    let bits = compound.sub_shape_bits();
    for (index, child) in compound.children().iter().enumerate() {
        let pose = a.pose.then_local(&child.pose);
        if !child.shape.world_bounds(&pose).intersects(&bounds_b) {
            continue;
        }
        let child_instance = ShapeInstance {
            shape: &child.shape,
            pose,
            sub_shape: a.sub_shape.push(index as u32, bits),
        };
        dispatcher.collide(settings, &child_instance, b, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body_properties::RigidPose;
    use crate::physics::collidables::{CompoundChildSettings, ShapeSettings};
    use glam::Vec3;

    #[test]
    fn nested_compounds_encode_both_levels() {
        let inner = ShapeSettings::compound(vec![
            CompoundChildSettings::new(RigidPose::IDENTITY, ShapeSettings::sphere(0.5)),
            CompoundChildSettings::new(
                RigidPose::from_position(Vec3::new(0.0, 3.0, 0.0)),
                ShapeSettings::sphere(0.5),
            ),
        ]);
        let outer = ShapeSettings::compound(vec![
            CompoundChildSettings::new(RigidPose::from_position(Vec3::new(-5.0, 0.0, 0.0)), ShapeSettings::sphere(0.5)),
            CompoundChildSettings::new(RigidPose::IDENTITY, inner),
        ])
        .build()
        .unwrap();
        let ball = ShapeSettings::sphere(0.5).build().unwrap();

        let dispatcher = CollisionDispatcher::with_default_routines();
        let mut out = Vec::new();
        collide_compound(
            &dispatcher,
            &CollideShapeSettings::default(),
            &ShapeInstance::new(&outer, RigidPose::IDENTITY),
            &ShapeInstance::new(&ball, RigidPose::from_position(Vec3::new(0.9, 0.0, 0.0))),
            &mut out,
        );
        assert_eq!(out.len(), 1);
        let (outer_index, rest) = out[0].sub_shape_a.pop(1);
        let (inner_index, rest) = rest.pop(1);
        assert_eq!((outer_index, inner_index), (1, 0));
        assert!(rest.is_empty());
    }
}
