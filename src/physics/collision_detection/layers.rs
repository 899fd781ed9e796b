//! Collision layers and the user supplied filters deciding which layers interact.
//!
//! Every body has an [`ObjectLayer`]. A [`BroadPhaseLayerInterface`] maps object layers onto a small number of
//! [`BroadPhaseLayer`]s, each of which gets its own tree in the broad phase. Two filters then decide which
//! combinations are tested at all.

use std::fmt;

/// Collision category of a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, serde::Serialize, serde::Deserialize)]
pub struct ObjectLayer(pub u16);

impl ObjectLayer {
    #[inline(always)]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ObjectLayer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "ObjectLayer<{}>", self.0)
    }
}

/// Coarse category; one broad phase tree exists per broad phase layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BroadPhaseLayer(pub u8);

impl BroadPhaseLayer {
    #[inline(always)]
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BroadPhaseLayer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BroadPhaseLayer<{}>", self.0)
    }
}

/// Maps object layers to broad phase layers.
pub trait BroadPhaseLayerInterface: Send + Sync {
    fn num_broad_phase_layers(&self) -> usize;

    /// Broad phase layer of `layer`. Must be smaller than [`num_broad_phase_layers`](Self::num_broad_phase_layers).
    fn broad_phase_layer(&self, layer: ObjectLayer) -> BroadPhaseLayer;
}

/// Decides whether an object layer can collide with anything in a broad phase layer.
pub trait ObjectVsBroadPhaseLayerFilter: Send + Sync {
    fn should_collide(&self, layer: ObjectLayer, broad_phase_layer: BroadPhaseLayer) -> bool;
}

/// Decides whether two object layers can collide.
pub trait ObjectLayerPairFilter: Send + Sync {
    fn should_collide(&self, a: ObjectLayer, b: ObjectLayer) -> bool;
}

/// Table driven [`BroadPhaseLayerInterface`].
#[derive(Debug, Clone)]
pub struct BroadPhaseLayerTable {
    mapping: Vec<BroadPhaseLayer>,
    num_broad_phase_layers: usize,
}

impl BroadPhaseLayerTable {
    /// Maps object layer `i` to `mapping[i]`.
    ///
    /// # Panics
    /// Panics when the mapping is empty.
    pub fn new(mapping: Vec<BroadPhaseLayer>) -> Self {
        assert!(!mapping.is_empty(), "a broad phase layer table needs at least one object layer");
        let num_broad_phase_layers = mapping.iter().map(|l| l.index() + 1).max().unwrap_or(1);
        Self {
            mapping,
            num_broad_phase_layers,
        }
    }

    #[inline]
    pub fn num_object_layers(&self) -> usize {
        self.mapping.len()
    }
}

impl BroadPhaseLayerInterface for BroadPhaseLayerTable {
    fn num_broad_phase_layers(&self) -> usize {
        self.num_broad_phase_layers
    }

    /// Unknown object layers fall into broad phase layer 0.
    fn broad_phase_layer(&self, layer: ObjectLayer) -> BroadPhaseLayer {
        self.mapping.get(layer.index()).copied().unwrap_or_default()
    }
}

/// Symmetric collision matrix over object layers. Starts with every pair disabled.
#[derive(Debug, Clone)]
pub struct ObjectLayerPairTable {
    num_layers: usize,
    enabled: Vec<bool>,
}

impl ObjectLayerPairTable {
    pub fn new(num_layers: usize) -> Self {
        Self {
            num_layers,
            enabled: vec![false; num_layers * num_layers],
        }
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.num_layers
    }

    pub fn enable_collision(&mut self, a: ObjectLayer, b: ObjectLayer) {
        self.set(a, b, true);
    }

    pub fn disable_collision(&mut self, a: ObjectLayer, b: ObjectLayer) {
        self.set(a, b, false);
    }

    fn set(&mut self, a: ObjectLayer, b: ObjectLayer, value: bool) {
        let (a, b) = (a.index(), b.index());
        assert!(
            a < self.num_layers && b < self.num_layers,
            "object layer out of range for a table of {} layers",
            self.num_layers
        );
        self.enabled[a * self.num_layers + b] = value;
        self.enabled[b * self.num_layers + a] = value;
    }
}

impl ObjectLayerPairFilter for ObjectLayerPairTable {
    fn should_collide(&self, a: ObjectLayer, b: ObjectLayer) -> bool {
        let (a, b) = (a.index(), b.index());
        a < self.num_layers && b < self.num_layers && self.enabled[a * self.num_layers + b]
    }
}

/// [`ObjectVsBroadPhaseLayerFilter`] derived from a pair table: an object layer collides with a broad phase layer
/// when it collides with any object layer mapped into it.
#[derive(Debug, Clone)]
pub struct ObjectVsBroadPhaseLayerTable {
    num_broad_phase_layers: usize,
    enabled: Vec<bool>,
}

impl ObjectVsBroadPhaseLayerTable {
    pub fn new(layers: &BroadPhaseLayerTable, pairs: &ObjectLayerPairTable) -> Self {
        let num_objects = layers.num_object_layers();
        let num_broad_phase_layers = layers.num_broad_phase_layers();
        let mut enabled = vec![false; num_objects * num_broad_phase_layers];
        for a in 0..num_objects {
            for b in 0..num_objects {
                if pairs.should_collide(ObjectLayer(a as u16), ObjectLayer(b as u16)) {
                    let target = layers.broad_phase_layer(ObjectLayer(b as u16)).index();
                    enabled[a * num_broad_phase_layers + target] = true;
                }
            }
        }
        Self {
            num_broad_phase_layers,
            enabled,
        }
    }
}

impl ObjectVsBroadPhaseLayerFilter for ObjectVsBroadPhaseLayerTable {
    fn should_collide(&self, layer: ObjectLayer, broad_phase_layer: BroadPhaseLayer) -> bool {
        let index = layer.index() * self.num_broad_phase_layers + broad_phase_layer.index();
        broad_phase_layer.index() < self.num_broad_phase_layers && self.enabled.get(index).copied().unwrap_or(false)
    }
}
