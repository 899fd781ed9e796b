use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::ConvexShape;
use crate::physics::collision_detection::collision_dispatcher::{CollideShapeSettings, CollisionDispatcher, ShapeInstance};
use crate::physics::collision_detection::contact_manifold::{CollidePoint, ShapeContact};
use crate::physics::collision_detection::depth_refiner;
use crate::physics::collision_detection::support_finder::{gjk, GjkResult, SupportFinder};
use crate::physics::handles::SubShapeId;

/// Any pair of convex shapes, through GJK and the depth refiner.
pub fn collide_convex_shapes(
    _dispatcher: &CollisionDispatcher,
    settings: &CollideShapeSettings,
    a: &ShapeInstance,
    b: &ShapeInstance,
    out: &mut Vec<ShapeContact>,
) {
    let (Some(convex_a), Some(convex_b)) = (a.shape.as_convex(), b.shape.as_convex()) else {
        return;
    };
    if let Some(contact) = collide_convex(
        convex_a,
        &a.pose,
        a.sub_shape.id(),
        convex_b,
        &b.pose,
        b.sub_shape.id(),
        settings,
    ) {
        out.push(contact);
    }
}

/// Collides two posed convex shapes.
///
/// Both shapes are inflated by half the speculative distance, so shapes up to that far apart still overlap and
/// produce a contact with negative penetration. The witness points are moved back onto the original surfaces.
pub(crate) fn collide_convex(
    a: &dyn ConvexShape,
    pose_a: &RigidPose,
    sub_shape_a: SubShapeId,
    b: &dyn ConvexShape,
    pose_b: &RigidPose,
    sub_shape_b: SubShapeId,
    settings: &CollideShapeSettings,
) -> Option<ShapeContact> {
    let margin = settings.speculative_distance * 0.5;
    let finder_a = SupportFinder::new(a, *pose_a, margin);
    let finder_b = SupportFinder::new(b, *pose_b, margin);
    let simplex = match gjk(&finder_a, &finder_b) {
        GjkResult::Intersecting(simplex) => simplex,
        GjkResult::Separated => return None,
    };
    let depth = depth_refiner::refine(&finder_a, &finder_b, &simplex)?;
    let penetration = depth.depth - 2.0 * margin;
    if penetration < -settings.speculative_distance {
        return None;
    }
    Some(ShapeContact {
        normal: depth.normal,
        sub_shape_a,
        sub_shape_b,
        points: vec![CollidePoint {
            on_a: depth.on_a - depth.normal * margin,
            on_b: depth.on_b + depth.normal * margin,
            penetration,
        }],
    })
}
