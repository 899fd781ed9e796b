use glam::Vec3;

use crate::physics::collidables::Shape;
use crate::physics::collision_detection::collision_dispatcher::{CollideShapeSettings, CollisionDispatcher, ShapeInstance};
use crate::physics::collision_detection::contact_manifold::{CollidePoint, ShapeContact};
use crate::utilities::math_helper;

/// Sphere vs box, found by clamping the sphere center into the box.
pub fn collide_sphere_box(
    _dispatcher: &CollisionDispatcher,
    settings: &CollideShapeSettings,
    a: &ShapeInstance,
    b: &ShapeInstance,
    out: &mut Vec<ShapeContact>,
) {
    let (Shape::Sphere(sphere), Shape::Box(cuboid)) = (a.shape, b.shape) else {
        return;
    };
    let half = cuboid.half_extents;
    let local_center = b.pose.transform_by_inverse(a.pose.position);
    let clamped = local_center.clamp(-half, half);
    let outside = local_center - clamped;
    let distance = outside.length();

    // Normal of the box surface towards the sphere, and the box surface point, in box space.
    let (local_normal, surface, penetration) = if distance > 0.0 {
        (outside / distance, clamped, sphere.radius - distance)
    } else {
        // The center is inside the box; exit through the nearest face.
        let depth = half - local_center.abs();
        let axis = if depth.x <= depth.y && depth.x <= depth.z {
            0
        } else if depth.y <= depth.z {
            1
        } else {
            2
        };
        let mut normal = Vec3::ZERO;
        normal[axis] = math_helper::binary_sign(local_center[axis]);
        let mut surface = local_center;
        surface[axis] = normal[axis] * half[axis];
        (normal, surface, depth[axis] + sphere.radius)
    };
    if penetration < -settings.speculative_distance {
        return;
    }
    let normal = -(b.pose.orientation * local_normal);
    out.push(ShapeContact {
        normal,
        sub_shape_a: a.sub_shape.id(),
        sub_shape_b: b.sub_shape.id(),
        points: vec![CollidePoint {
            on_a: a.pose.position + normal * sphere.radius,
            on_b: b.pose.transform(surface),
            penetration,
        }],
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body_properties::RigidPose;
    use crate::physics::collidables::ShapeSettings;
    use glam::Quat;

    fn run(center: Vec3, box_pose: RigidPose) -> Vec<ShapeContact> {
        let sphere = ShapeSettings::sphere(0.5).build().unwrap();
        let cube = ShapeSettings::cuboid(Vec3::ONE).build().unwrap();
        let mut out = Vec::new();
        collide_sphere_box(
            &CollisionDispatcher::new(),
            &CollideShapeSettings::default(),
            &ShapeInstance::new(&sphere, RigidPose::from_position(center)),
            &ShapeInstance::new(&cube, box_pose),
            &mut out,
        );
        out
    }

    #[test]
    fn sphere_resting_on_face() {
        let contacts = run(Vec3::new(0.2, 1.45, -0.3), RigidPose::IDENTITY);
        let point = contacts[0].points[0];
        assert!((contacts[0].normal - Vec3::NEG_Y).length() < 1e-6);
        assert!((point.penetration - 0.05).abs() < 1e-5);
        assert!((point.on_b - Vec3::new(0.2, 1.0, -0.3)).length() < 1e-5);
    }

    #[test]
    fn deep_center_exits_through_nearest_face() {
        let contacts = run(Vec3::new(0.9, 0.1, 0.0), RigidPose::IDENTITY);
        assert!((contacts[0].normal - Vec3::NEG_X).length() < 1e-6);
        assert!((contacts[0].points[0].penetration - 0.6).abs() < 1e-5);
    }

    #[test]
    fn rotated_box_edge() {
        let pose = RigidPose::new(Vec3::ZERO, Quat::from_rotation_z(std::f32::consts::FRAC_PI_4));
        let contacts = run(Vec3::new(0.0, 1.8, 0.0), pose);
        let expected = 0.5 - (1.8 - std::f32::consts::SQRT_2);
        assert!((contacts[0].points[0].penetration - expected).abs() < 1e-4);
        assert!((contacts[0].normal - Vec3::NEG_Y).length() < 1e-4);
    }
}
