//! Dynamic bounding volume trees finding the body pairs that might touch.

use glam::Vec3;
use std::sync::Arc;

use super::layers::{BroadPhaseLayer, BroadPhaseLayerInterface, ObjectLayer, ObjectLayerPairFilter, ObjectVsBroadPhaseLayerFilter};
use crate::physics::body::MotionType;
use crate::physics::error::PhysicsError;
use crate::physics::handles::BodyId;
use crate::physics::trees::Tree;
use crate::utilities::bounding_box::BoundingBox;

/// Broad phase entry of one body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BroadPhaseProxy {
    pub body: BodyId,
    pub broad_phase_layer: BroadPhaseLayer,
    pub object_layer: ObjectLayer,
    /// Tight bounds last reported for the body.
    pub bounds: BoundingBox,
    pub motion_type: MotionType,
    pub active: bool,
    node: u32,
    /// Insertion order, used to order pairs deterministically.
    stamp: u64,
}

/// A pair of bodies whose bounds overlap. `a` was inserted before `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BodyPair {
    pub a: BodyId,
    pub b: BodyId,
}

/// Spatial index over the bounds of every added body, with one tree per broad phase layer.
pub struct BroadPhase {
    layer_interface: Arc<dyn BroadPhaseLayerInterface>,
    trees: Vec<Tree<BodyId>>,
    /// Indexed by body slot index.
    proxies: Vec<Option<BroadPhaseProxy>>,
    next_stamp: u64,
    proxy_count: usize,
}

impl BroadPhase {
    /// Creates one tree per broad phase layer; leaves are fattened by `fat_margin`.
    pub fn new(layer_interface: Arc<dyn BroadPhaseLayerInterface>, fat_margin: f32) -> Self {
        let trees = (0..layer_interface.num_broad_phase_layers().max(1))
            .map(|_| Tree::new(fat_margin))
            .collect();
        Self {
            layer_interface,
            trees,
            proxies: Vec::new(),
            next_stamp: 0,
            proxy_count: 0,
        }
    }

    #[inline]
    pub fn num_broad_phase_layers(&self) -> usize {
        self.trees.len()
    }

    /// Number of bodies in the index.
    #[inline]
    pub fn len(&self) -> usize {
        self.proxy_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.proxy_count == 0
    }

    pub fn proxy(&self, body: BodyId) -> Option<&BroadPhaseProxy> {
        self.proxies
            .get(body.index() as usize)
            .and_then(Option::as_ref)
            .filter(|p| p.body == body)
    }

    #[inline]
    pub fn contains(&self, body: BodyId) -> bool {
        self.proxy(body).is_some()
    }

    /// Fattened bounds the tree stores for the body.
    pub fn fat_bounds(&self, body: BodyId) -> Option<BoundingBox> {
        let proxy = self.proxy(body)?;
        Some(self.trees[proxy.broad_phase_layer.index()].leaf_bounds(proxy.node))
    }

    fn proxy_mut(&mut self, body: BodyId) -> Result<&mut BroadPhaseProxy, PhysicsError> {
        self.proxies
            .get_mut(body.index() as usize)
            .and_then(Option::as_mut)
            .filter(|p| p.body == body)
            .ok_or(PhysicsError::InvalidHandle(body))
    }

    pub fn insert(
        &mut self,
        body: BodyId,
        bounds: BoundingBox,
        object_layer: ObjectLayer,
        motion_type: MotionType,
        active: bool,
    ) -> Result<(), PhysicsError> {
        let slot = body.index() as usize;
        if self.proxies.get(slot).is_some_and(Option::is_some) {
            return Err(PhysicsError::InvalidOperation(format!("{body} is already in the broad phase")));
        }
        let broad_phase_layer = self.layer_interface.broad_phase_layer(object_layer);
        if broad_phase_layer.index() >= self.trees.len() {
            return Err(PhysicsError::InvalidConfiguration(format!(
                "{object_layer} maps to {broad_phase_layer} but only {} broad phase layers exist",
                self.trees.len()
            )));
        }
        let node = self.trees[broad_phase_layer.index()].add(bounds, body);
        if self.proxies.len() <= slot {
            self.proxies.resize(slot + 1, None);
        }
        self.proxies[slot] = Some(BroadPhaseProxy {
            body,
            broad_phase_layer,
            object_layer,
            bounds,
            motion_type,
            active,
            node,
            stamp: self.next_stamp,
        });
        self.next_stamp += 1;
        self.proxy_count += 1;
        Ok(())
    }

    pub fn remove(&mut self, body: BodyId) -> Result<(), PhysicsError> {
        let proxy = *self.proxy_mut(body)?;
        self.trees[proxy.broad_phase_layer.index()].remove(proxy.node);
        self.proxies[body.index() as usize] = None;
        self.proxy_count -= 1;
        Ok(())
    }

    /// Moves the body's entry to new bounds. Returns true when the tree had to be restructured; bounds that stay
    /// within the fattened leaf only update the tight bounds.
    pub fn update(&mut self, body: BodyId, bounds: BoundingBox) -> Result<bool, PhysicsError> {
        let proxy = self.proxy_mut(body)?;
        proxy.bounds = bounds;
        let (layer, node) = (proxy.broad_phase_layer.index(), proxy.node);
        Ok(self.trees[layer].update(node, bounds))
    }

    pub fn set_active(&mut self, body: BodyId, active: bool) -> Result<(), PhysicsError> {
        self.proxy_mut(body)?.active = active;
        Ok(())
    }

    /// Changes the object layer of a body, moving it to another tree when its broad phase layer changes.
    pub fn set_object_layer(&mut self, body: BodyId, object_layer: ObjectLayer) -> Result<(), PhysicsError> {
        let proxy = *self.proxy_mut(body)?;
        let broad_phase_layer = self.layer_interface.broad_phase_layer(object_layer);
        if broad_phase_layer == proxy.broad_phase_layer {
            self.proxy_mut(body)?.object_layer = object_layer;
            return Ok(());
        }
        self.remove(body)?;
        self.insert(body, proxy.bounds, object_layer, proxy.motion_type, proxy.active)
    }

    /// Whether a pair of entries can produce a new interaction.
    ///
    /// At least one body must be awake and able to move, and at least one must be dynamic: kinematic and static
    /// bodies do not respond to each other.
    fn can_interact(a: &BroadPhaseProxy, b: &BroadPhaseProxy) -> bool {
        let a_awake = a.active && !a.motion_type.is_static();
        let b_awake = b.active && !b.motion_type.is_static();
        (a_awake || b_awake) && (a.motion_type.is_dynamic() || b.motion_type.is_dynamic())
    }

    fn accept_pair(
        &self,
        a: BodyId,
        b: BodyId,
        object_vs_broad_phase: &dyn ObjectVsBroadPhaseLayerFilter,
        object_pair: &dyn ObjectLayerPairFilter,
    ) -> Option<BodyPair> {
        let (pa, pb) = (self.proxy(a)?, self.proxy(b)?);
        if !pa.bounds.intersects(&pb.bounds) || !Self::can_interact(pa, pb) {
            return None;
        }
        if !object_vs_broad_phase.should_collide(pa.object_layer, pb.broad_phase_layer)
            || !object_vs_broad_phase.should_collide(pb.object_layer, pa.broad_phase_layer)
            || !object_pair.should_collide(pa.object_layer, pb.object_layer)
        {
            return None;
        }
        Some(if pa.stamp <= pb.stamp {
            BodyPair { a, b }
        } else {
            BodyPair { a: b, b: a }
        })
    }

    /// Finds every pair of bodies whose tight bounds overlap and whose layers may collide.
    ///
    /// Each pair is reported once. Pairs in which neither body is awake and movable, and pairs without a dynamic
    /// body, are skipped. The result is ordered by the insertion order of the bodies.
    pub fn find_pairs(
        &self,
        object_vs_broad_phase: &dyn ObjectVsBroadPhaseLayerFilter,
        object_pair: &dyn ObjectLayerPairFilter,
    ) -> Vec<BodyPair> {
        let mut pairs = Vec::new();
        for (i, tree) in self.trees.iter().enumerate() {
            tree.self_overlaps(|_, &a, _, &b| {
                if let Some(pair) = self.accept_pair(a, b, object_vs_broad_phase, object_pair) {
                    pairs.push(pair);
                }
            });
            for other in &self.trees[i + 1..] {
                tree.overlaps_with(other, |_, &a, _, &b| {
                    if let Some(pair) = self.accept_pair(a, b, object_vs_broad_phase, object_pair) {
                        pairs.push(pair);
                    }
                });
            }
        }
        let stamp = |body: BodyId| self.proxy(body).map_or(u64::MAX, |p| p.stamp);
        pairs.sort_by_key(|pair| (stamp(pair.a), stamp(pair.b)));
        pairs
    }

    /// Walks the bodies whose fattened bounds the ray `origin + t * direction`, `t` in `[0, max_fraction]`,
    /// enters. `tester` returns the fraction of a hit with the body, which then bounds the remaining walk.
    /// Returns the closest reported fraction.
    pub fn cast_ray<F>(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_fraction: f32,
        layer_filter: impl Fn(BroadPhaseLayer) -> bool,
        mut tester: F,
    ) -> Option<f32>
    where
        F: FnMut(BodyId, f32) -> Option<f32>,
    {
        let mut closest: Option<f32> = None;
        let mut bound = max_fraction;
        for (index, tree) in self.trees.iter().enumerate() {
            if !layer_filter(BroadPhaseLayer(index as u8)) {
                continue;
            }
            let mut leaf_tester = |_: u32, body: &BodyId, maximum_t: f32| tester(*body, maximum_t);
            if let Some(t) = tree.ray_cast(origin, direction, bound, &mut leaf_tester) {
                bound = t;
                closest = Some(t);
            }
        }
        closest
    }

    /// Bodies whose fattened bounds the ray reaches, in traversal order.
    pub fn collect_ray_candidates(&self, origin: Vec3, direction: Vec3, max_fraction: f32) -> Vec<BodyId> {
        let mut candidates = Vec::new();
        self.cast_ray(origin, direction, max_fraction, |_| true, |body, _| {
            candidates.push(body);
            None
        });
        candidates
    }

    /// Reports every body whose tight bounds overlap `bounds` and whose layer passes `filter`.
    pub fn query_aabb<F>(&self, bounds: &BoundingBox, filter: impl Fn(ObjectLayer) -> bool, mut on_body: F)
    where
        F: FnMut(BodyId),
    {
        for tree in &self.trees {
            tree.query(bounds, |_, &body| {
                if let Some(proxy) = self.proxy(body) {
                    if proxy.bounds.intersects(bounds) && filter(proxy.object_layer) {
                        on_body(body);
                    }
                }
            });
        }
    }

    /// Rebuilds every tree top down. Worth calling after adding many bodies at once.
    pub fn optimize(&mut self) {
        for tree in &mut self.trees {
            tree.optimize();
        }
        tracing::debug!(bodies = self.proxy_count, "optimized broad phase");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collision_detection::layers::{
        BroadPhaseLayerTable, ObjectLayerPairTable, ObjectVsBroadPhaseLayerTable,
    };

    const NON_MOVING: ObjectLayer = ObjectLayer(0);
    const MOVING: ObjectLayer = ObjectLayer(1);

    struct Fixture {
        broad_phase: BroadPhase,
        object_vs_broad_phase: ObjectVsBroadPhaseLayerTable,
        pairs: ObjectLayerPairTable,
    }

    fn fixture() -> Fixture {
        let layers = BroadPhaseLayerTable::new(vec![BroadPhaseLayer(0), BroadPhaseLayer(1)]);
        let mut pairs = ObjectLayerPairTable::new(2);
        pairs.enable_collision(NON_MOVING, MOVING);
        pairs.enable_collision(MOVING, MOVING);
        let object_vs_broad_phase = ObjectVsBroadPhaseLayerTable::new(&layers, &pairs);
        Fixture {
            broad_phase: BroadPhase::new(Arc::new(layers), 0.1),
            object_vs_broad_phase,
            pairs,
        }
    }

    fn unit_box(center: Vec3) -> BoundingBox {
        BoundingBox::from_center_half_extents(center, Vec3::splat(0.5))
    }

    impl Fixture {
        fn add(&mut self, index: u32, center: Vec3, layer: ObjectLayer, motion_type: MotionType) -> BodyId {
            let id = BodyId::new(index, 0);
            let active = !motion_type.is_static();
            self.broad_phase
                .insert(id, unit_box(center), layer, motion_type, active)
                .unwrap();
            id
        }

        fn pairs(&self) -> Vec<BodyPair> {
            self.broad_phase.find_pairs(&self.object_vs_broad_phase, &self.pairs)
        }
    }

    #[test]
    fn only_overlapping_pairs_are_reported() {
        let mut f = fixture();
        let ground = f.add(0, Vec3::ZERO, NON_MOVING, MotionType::Static);
        let a = f.add(1, Vec3::new(0.0, 0.9, 0.0), MOVING, MotionType::Dynamic);
        let b = f.add(2, Vec3::new(0.0, 1.8, 0.0), MOVING, MotionType::Dynamic);
        // Fat bounds overlap but tight bounds do not.
        f.add(3, Vec3::new(1.05, 0.0, 0.0), MOVING, MotionType::Dynamic);

        let pairs = f.pairs();
        assert_eq!(pairs, vec![BodyPair { a: ground, b: a }, BodyPair { a, b }]);
    }

    #[test]
    fn static_and_sleeping_pairs_are_skipped() {
        let mut f = fixture();
        f.add(0, Vec3::ZERO, NON_MOVING, MotionType::Static);
        f.add(1, Vec3::new(0.5, 0.0, 0.0), NON_MOVING, MotionType::Static);
        let a = f.add(2, Vec3::new(0.0, 0.5, 0.0), MOVING, MotionType::Dynamic);
        let b = f.add(3, Vec3::new(0.5, 0.5, 0.0), MOVING, MotionType::Dynamic);
        f.broad_phase.set_active(a, false).unwrap();
        f.broad_phase.set_active(b, false).unwrap();
        assert!(f.pairs().is_empty());

        f.broad_phase.set_active(b, true).unwrap();
        let pairs = f.pairs();
        assert!(pairs.contains(&BodyPair { a, b }));
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn kinematic_bodies_ignore_statics() {
        let mut f = fixture();
        f.add(0, Vec3::ZERO, NON_MOVING, MotionType::Static);
        f.add(1, Vec3::new(0.2, 0.0, 0.0), MOVING, MotionType::Kinematic);
        assert!(f.pairs().is_empty());
    }

    #[test]
    fn removed_bodies_leave_no_trace() {
        let mut f = fixture();
        let a = f.add(0, Vec3::ZERO, MOVING, MotionType::Dynamic);
        let b = f.add(1, Vec3::new(0.2, 0.0, 0.0), MOVING, MotionType::Dynamic);
        f.broad_phase.remove(a).unwrap();
        assert!(!f.broad_phase.contains(a));
        assert!(f.pairs().is_empty());
        assert_eq!(f.broad_phase.len(), 1);
        assert!(f.broad_phase.remove(a).is_err());
        let mut seen = Vec::new();
        f.broad_phase.query_aabb(&unit_box(Vec3::ZERO), |_| true, |body| seen.push(body));
        assert_eq!(seen, vec![b]);
    }

    #[test]
    fn small_moves_stay_in_fat_bounds() {
        let mut f = fixture();
        let a = f.add(0, Vec3::ZERO, MOVING, MotionType::Dynamic);
        assert!(!f.broad_phase.update(a, unit_box(Vec3::new(0.05, 0.0, 0.0))).unwrap());
        assert!(f.broad_phase.update(a, unit_box(Vec3::new(3.0, 0.0, 0.0))).unwrap());
        assert!(f.broad_phase.fat_bounds(a).unwrap().contains(&unit_box(Vec3::new(3.0, 0.0, 0.0))));
    }

    #[test]
    fn ray_candidates_follow_the_ray() {
        let mut f = fixture();
        let near = f.add(0, Vec3::new(2.0, 0.0, 0.0), MOVING, MotionType::Dynamic);
        let far = f.add(1, Vec3::new(6.0, 0.0, 0.0), NON_MOVING, MotionType::Static);
        f.add(2, Vec3::new(2.0, 5.0, 0.0), MOVING, MotionType::Dynamic);
        let mut candidates = f.broad_phase.collect_ray_candidates(Vec3::ZERO, Vec3::new(10.0, 0.0, 0.0), 1.0);
        candidates.sort();
        assert_eq!(candidates, vec![near, far]);

        let closest = f.broad_phase.cast_ray(
            Vec3::ZERO,
            Vec3::new(10.0, 0.0, 0.0),
            1.0,
            |_| true,
            |body, _| Some(if body == near { 0.15 } else { 0.55 }),
        );
        assert_eq!(closest, Some(0.15));
    }
}
