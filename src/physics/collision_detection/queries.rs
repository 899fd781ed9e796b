//! Queries against the current state of the world.

use super::broad_phase::BroadPhase;
use super::layers::ObjectLayer;
use crate::physics::body_store::BodyStore;
use crate::physics::collidables::{RayCast, RayCastResult};
use crate::physics::handles::{BodyId, SubShapeIdCreator};

/// Finds the nearest body hit by `ray` whose object layer passes `filter`.
///
/// Each candidate body is read under its shared lock, so a concurrent writer is never observed half way.
pub fn cast_ray(
    broad_phase: &BroadPhase,
    bodies: &BodyStore,
    ray: &RayCast,
    filter: impl Fn(ObjectLayer) -> bool,
) -> Option<RayCastResult> {
    let mut nearest: Option<RayCastResult> = None;
    broad_phase.cast_ray(
        ray.origin,
        ray.direction,
        1.0,
        |_| true,
        |body_id: BodyId, maximum_fraction| {
            let body = bodies.read(body_id).ok()?;
            if !filter(body.object_layer()) {
                return None;
            }
            let pose = body.pose();
            let local_origin = pose.transform_by_inverse(ray.origin);
            let local_direction = pose.orientation.inverse() * ray.direction;
            let hit = body.shape().cast_ray(
                local_origin,
                local_direction,
                maximum_fraction,
                SubShapeIdCreator::default(),
            )?;
            if nearest.map_or(true, |n| hit.fraction < n.fraction) {
                nearest = Some(RayCastResult {
                    body_id,
                    fraction: hit.fraction,
                    sub_shape_id: hit.sub_shape_id,
                });
            }
            Some(hit.fraction)
        },
    );
    nearest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body::{Body, MotionType};
    use crate::physics::body_description::BodyCreationSettings;
    use crate::physics::collidables::ShapeSettings;
    use crate::physics::collision_detection::layers::{BroadPhaseLayer, BroadPhaseLayerTable};
    use glam::{Quat, Vec3};
    use std::sync::Arc;

    fn world() -> (BroadPhase, BodyStore, Vec<BodyId>) {
        let mut broad_phase = BroadPhase::new(
            Arc::new(BroadPhaseLayerTable::new(vec![BroadPhaseLayer(0), BroadPhaseLayer(1)])),
            0.1,
        );
        let mut bodies = BodyStore::new(8);
        let sphere = ShapeSettings::sphere(1.0).build().unwrap();
        let mut ids = Vec::new();
        for (x, layer) in [(5.0, 0), (10.0, 1)] {
            let settings = BodyCreationSettings::new(
                Arc::clone(&sphere),
                Vec3::new(x, 0.0, 0.0),
                Quat::IDENTITY,
                MotionType::Dynamic,
                ObjectLayer(layer),
            );
            let body = Body::from_settings(&settings).unwrap();
            let bounds = body.world_bounds();
            let id = bodies.insert(body).unwrap();
            broad_phase
                .insert(id, bounds, ObjectLayer(layer), MotionType::Dynamic, true)
                .unwrap();
            ids.push(id);
        }
        (broad_phase, bodies, ids)
    }

    #[test]
    fn nearest_body_is_reported() {
        let (broad_phase, bodies, ids) = world();
        let ray = RayCast::new(Vec3::ZERO, Vec3::new(20.0, 0.0, 0.0));
        let hit = cast_ray(&broad_phase, &bodies, &ray, |_| true).unwrap();
        assert_eq!(hit.body_id, ids[0]);
        assert!((hit.fraction - 0.2).abs() < 1e-4);
    }

    #[test]
    fn filtered_layers_are_skipped() {
        let (broad_phase, bodies, ids) = world();
        let ray = RayCast::new(Vec3::ZERO, Vec3::new(20.0, 0.0, 0.0));
        let hit = cast_ray(&broad_phase, &bodies, &ray, |layer| layer != ObjectLayer(0)).unwrap();
        assert_eq!(hit.body_id, ids[1]);
        assert!((hit.fraction - 0.45).abs() < 1e-4);
    }

    #[test]
    fn short_ray_misses() {
        let (broad_phase, bodies, _) = world();
        let ray = RayCast::new(Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0));
        assert!(cast_ray(&broad_phase, &bodies, &ray, |_| true).is_none());
    }
}
