//! Puts islands to sleep once every member has rested long enough.

use crate::physics::body_store::BodyStore;
use crate::physics::handles::BodyId;
use crate::physics::island_builder::Island;
use crate::physics::physics_settings::PhysicsSettings;

/// Decides which islands go to sleep at the end of a step.
///
/// An island sleeps as a unit: a single member that is still moving, or that does not allow sleeping, keeps the
/// whole island awake.
#[derive(Debug, Clone, Copy)]
pub struct IslandSleeper {
    enabled: bool,
    point_velocity_threshold: f32,
    time_before_sleep: f32,
}

impl IslandSleeper {
    pub fn new(settings: &PhysicsSettings) -> Self {
        Self {
            enabled: settings.allow_sleeping,
            point_velocity_threshold: settings.point_velocity_sleep_threshold,
            time_before_sleep: settings.time_before_sleep,
        }
    }

    /// Advances the sleep timers of the island's members and returns whether the island should sleep.
    ///
    /// Every member's timer is advanced even after one of them was found to be awake, so timers of resting bodies
    /// keep accumulating while a neighbor settles.
    pub fn update_island(&self, bodies: &mut BodyStore, island: &Island, dt: f32) -> bool {
        let mut ready = self.enabled;
        for &id in &island.bodies {
            match bodies.get_mut(id) {
                Ok(body) => ready &= body.update_sleep_timer(dt, self.point_velocity_threshold, self.time_before_sleep),
                Err(_) => ready = false,
            }
        }
        ready && !island.bodies.is_empty()
    }

    /// Runs [`update_island`](IslandSleeper::update_island) over all islands and collects the bodies to deactivate.
    pub fn collect_sleepers(&self, bodies: &mut BodyStore, islands: &[Island], dt: f32) -> Vec<BodyId> {
        let mut sleepers = Vec::new();
        for island in islands {
            if self.update_island(bodies, island, dt) {
                sleepers.extend_from_slice(&island.bodies);
            }
        }
        sleepers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body::{Body, MotionType};
    use crate::physics::body_description::BodyCreationSettings;
    use crate::physics::collidables::ShapeSettings;
    use crate::physics::collision_detection::layers::ObjectLayer;
    use glam::{Quat, Vec3};

    fn store_with(velocities: &[Vec3]) -> (BodyStore, Island) {
        let mut store = BodyStore::new(8);
        let shape = ShapeSettings::sphere(0.5).build().unwrap();
        let mut island = Island::default();
        for &velocity in velocities {
            let settings =
                BodyCreationSettings::new(shape.clone(), Vec3::ZERO, Quat::IDENTITY, MotionType::Dynamic, ObjectLayer(0))
                    .with_linear_velocity(velocity);
            island.bodies.push(store.insert(Body::from_settings(&settings).unwrap()).unwrap());
        }
        (store, island)
    }

    #[test]
    fn resting_island_sleeps_after_delay() {
        let (mut store, island) = store_with(&[Vec3::ZERO, Vec3::ZERO]);
        let sleeper = IslandSleeper::new(&PhysicsSettings::default());
        assert!(!sleeper.update_island(&mut store, &island, 0.3));
        assert!(sleeper.update_island(&mut store, &island, 0.3));
    }

    #[test]
    fn one_moving_member_keeps_island_awake() {
        let (mut store, island) = store_with(&[Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)]);
        let sleeper = IslandSleeper::new(&PhysicsSettings::default());
        for _ in 0..10 {
            assert!(!sleeper.update_island(&mut store, &island, 0.3));
        }
        assert!(sleeper.collect_sleepers(&mut store, &[island], 0.3).is_empty());
    }

    #[test]
    fn disabled_sleeping_never_sleeps() {
        let (mut store, island) = store_with(&[Vec3::ZERO]);
        let settings = PhysicsSettings {
            allow_sleeping: false,
            ..PhysicsSettings::default()
        };
        let sleeper = IslandSleeper::new(&settings);
        for _ in 0..10 {
            assert!(!sleeper.update_island(&mut store, &island, 1.0));
        }
    }
}
