use serde::{Deserialize, Serialize};

/// Capacities of the fixed-size buffers of a physics system, set once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationAllocationSizes {
    /// Body slots. Creating more bodies fails with a capacity error.
    pub max_bodies: usize,
    /// Candidate pairs processed per collision step. Excess pairs are dropped for that step.
    pub max_body_pairs: usize,
    /// Contact constraints solved per collision step. Excess contacts do not push the bodies apart.
    pub max_contact_constraints: usize,
    /// Persistent manifolds kept in the pair cache.
    pub max_contact_manifolds: usize,
}

impl SimulationAllocationSizes {
    pub fn new(
        max_bodies: usize,
        max_body_pairs: usize,
        max_contact_constraints: usize,
        max_contact_manifolds: usize,
    ) -> Self {
        Self {
            max_bodies,
            max_body_pairs,
            max_contact_constraints,
            max_contact_manifolds,
        }
    }
}

impl Default for SimulationAllocationSizes {
    fn default() -> Self {
        Self {
            max_bodies: 1024,
            max_body_pairs: 4096,
            max_contact_constraints: 4096,
            max_contact_manifolds: 4096,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let sizes: SimulationAllocationSizes = serde_json::from_str(r#"{ "max_bodies": 16 }"#).unwrap();
        assert_eq!(sizes.max_bodies, 16);
        assert_eq!(sizes.max_body_pairs, SimulationAllocationSizes::default().max_body_pairs);
    }
}
