use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::{Shape, Triangle};
use crate::physics::collision_detection::collision_dispatcher::{CollideShapeSettings, CollisionDispatcher, ShapeInstance};
use crate::physics::collision_detection::contact_manifold::ShapeContact;

use super::convex_pair_tester::collide_convex;

/// Mesh vs convex shape: each triangle near the convex shape is collided as a convex shape of its own.
pub fn collide_mesh_convex(
    _dispatcher: &CollisionDispatcher,
    settings: &CollideShapeSettings,
    a: &ShapeInstance,
    b: &ShapeInstance,
    out: &mut Vec<ShapeContact>,
) {
    let (Shape::Mesh(mesh), Some(convex)) = (a.shape, b.shape.as_convex()) else {
        return;
    };
    let to_mesh = a.pose.inverse();
    let query = b
        .shape
        .world_bounds(&b.pose)
        .expanded(settings.speculative_distance)
        .transformed(to_mesh.orientation, to_mesh.position);
    let bits = mesh.sub_shape_bits();
    mesh.for_each_triangle_in(&query, |index, triangle| {
        let world = Triangle::new(
            a.pose.transform(triangle.a),
            a.pose.transform(triangle.b),
            a.pose.transform(triangle.c),
        );
        if let Some(contact) = collide_convex(
            &world,
            &RigidPose::IDENTITY,
            a.sub_shape.push(index, bits).id(),
            convex,
            &b.pose,
            b.sub_shape.id(),
            settings,
        ) {
            out.push(contact);
        }
    });
}
