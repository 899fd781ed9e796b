use glam::Vec3;

use crate::physics::collidables::Shape;
use crate::physics::collision_detection::collision_dispatcher::{CollideShapeSettings, CollisionDispatcher, ShapeInstance};
use crate::physics::collision_detection::contact_manifold::{CollidePoint, ShapeContact};

/// Sphere vs sphere. Orientations do not matter.
pub fn collide_spheres(
    _dispatcher: &CollisionDispatcher,
    settings: &CollideShapeSettings,
    a: &ShapeInstance,
    b: &ShapeInstance,
    out: &mut Vec<ShapeContact>,
) {
    let (Shape::Sphere(sphere_a), Shape::Sphere(sphere_b)) = (a.shape, b.shape) else {
        return;
    };
    let offset = b.pose.position - a.pose.position;
    let center_distance = offset.length();
    let penetration = sphere_a.radius + sphere_b.radius - center_distance;
    if penetration < -settings.speculative_distance {
        return;
    }
    // Arbitrarily choose +Y if the two spheres are in the same position.
    let normal = if center_distance > 0.0 { offset / center_distance } else { Vec3::Y };
    out.push(ShapeContact {
        normal,
        sub_shape_a: a.sub_shape.id(),
        sub_shape_b: b.sub_shape.id(),
        points: vec![CollidePoint {
            on_a: a.pose.position + normal * sphere_a.radius,
            on_b: b.pose.position - normal * sphere_b.radius,
            penetration,
        }],
    });
}
