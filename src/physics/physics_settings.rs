use serde::{Deserialize, Serialize};

use crate::physics::collision_detection::contact_manifold::ManifoldTolerances;

/// Tunable parameters of the simulation step.
///
/// Every field has a default, so a partial JSON or TOML document is enough to configure a system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsSettings {
    /// Velocity iterations per sub step. The solver stops earlier once it converges.
    pub num_velocity_steps: u32,
    /// Position correction iterations per sub step.
    pub num_position_steps: u32,
    /// Fraction of the remaining penetration removed by each position iteration.
    pub baumgarte: f32,
    /// Shapes closer than this produce speculative contacts.
    pub speculative_contact_distance: f32,
    /// Penetration tolerated without position correction.
    pub penetration_slop: f32,
    /// A persisted contact point is dropped once its bodies drift apart further than this. Only individual points are
    /// filtered; a manifold is removed once its pair stops producing contacts within the speculative distance.
    pub contact_persistence_distance: f32,
    /// New contact points this close to a point of last step inherit its impulses.
    pub contact_point_preserve_distance: f32,
    /// Approach speeds below this do not bounce.
    pub min_velocity_for_restitution: f32,
    /// Time a body must stay below the sleep threshold before its island may sleep.
    pub time_before_sleep: f32,
    /// Speed of the fastest point of a body under which it counts as resting.
    pub point_velocity_sleep_threshold: f32,
    /// Extra margin of broad phase bounds so small motions do not restructure the trees.
    pub broad_phase_fat_margin: f32,
    /// Velocity iterations stop once no constraint changes a velocity by more than this.
    pub convergence_tolerance: f32,
    pub use_warm_start: bool,
    pub allow_sleeping: bool,
}

impl Default for PhysicsSettings {
    fn default() -> Self {
        Self {
            num_velocity_steps: 10,
            num_position_steps: 2,
            baumgarte: 0.2,
            speculative_contact_distance: 0.02,
            penetration_slop: 0.02,
            contact_persistence_distance: 0.1,
            contact_point_preserve_distance: 0.01,
            min_velocity_for_restitution: 1.0,
            time_before_sleep: 0.5,
            point_velocity_sleep_threshold: 0.03,
            broad_phase_fat_margin: 0.1,
            convergence_tolerance: 1e-4,
            use_warm_start: true,
            allow_sleeping: true,
        }
    }
}

impl PhysicsSettings {
    pub(crate) fn manifold_tolerances(&self) -> ManifoldTolerances {
        ManifoldTolerances {
            persistence_distance: self.contact_persistence_distance,
            preserve_distance: self.contact_point_preserve_distance,
            warm_start: self.use_warm_start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_documents_fill_in_defaults() {
        let settings: PhysicsSettings =
            serde_json::from_str(r#"{ "num_velocity_steps": 4, "use_warm_start": false }"#).unwrap();
        assert_eq!(settings.num_velocity_steps, 4);
        assert!(!settings.use_warm_start);
        assert_eq!(settings.num_position_steps, PhysicsSettings::default().num_position_steps);
    }
}
