use super::node::NULL_NODE;
use super::tree::{Tree, TRAVERSAL_STACK_CAPACITY};
use glam::Vec3;

/// Tests a ray against the payloads of leaves the ray reaches.
pub trait RayLeafTester<T> {
    /// Returns the ray parameter of a hit closer than `maximum_t`, which then becomes the new bound for the
    /// remaining traversal.
    fn test_leaf(&mut self, proxy: u32, payload: &T, maximum_t: f32) -> Option<f32>;
}

impl<T, F> RayLeafTester<T> for F
where
    F: FnMut(u32, &T, f32) -> Option<f32>,
{
    #[inline(always)]
    fn test_leaf(&mut self, proxy: u32, payload: &T, maximum_t: f32) -> Option<f32> {
        self(proxy, payload, maximum_t)
    }
}

impl<T> Tree<T> {
    /// Walks every leaf whose bounds the ray `origin + t * direction` enters for `t` in `[0, maximum_t]`.
    ///
    /// The traversal bound shrinks to the closest hit reported by the tester. Returns that closest hit.
    pub fn ray_cast<L: RayLeafTester<T>>(
        &self,
        origin: Vec3,
        direction: Vec3,
        maximum_t: f32,
        leaf_tester: &mut L,
    ) -> Option<f32> {
        if self.root == NULL_NODE {
            return None;
        }
        let mut closest: Option<f32> = None;
        let mut bound = maximum_t;
        let mut stack = Vec::with_capacity(TRAVERSAL_STACK_CAPACITY);
        stack.push(self.root);
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if node.bounds.ray_entry(origin, direction, bound).is_none() {
                continue;
            }
            match &node.payload {
                Some(payload) => {
                    if let Some(t) = leaf_tester.test_leaf(index, payload, bound) {
                        if t <= bound {
                            bound = t;
                            closest = Some(t);
                        }
                    }
                }
                None => {
                    // Visit the nearer child first so the bound tightens early.
                    let [a, b] = node.children;
                    let ta = self.nodes[a as usize].bounds.ray_entry(origin, direction, bound);
                    let tb = self.nodes[b as usize].bounds.ray_entry(origin, direction, bound);
                    match (ta, tb) {
                        (Some(ta), Some(tb)) if ta <= tb => stack.extend_from_slice(&[b, a]),
                        (Some(_), Some(_)) => stack.extend_from_slice(&[a, b]),
                        (Some(_), None) => stack.push(a),
                        (None, Some(_)) => stack.push(b),
                        (None, None) => {}
                    }
                }
            }
        }
        closest
    }
}

#[cfg(test)]
mod tests {
    use crate::physics::trees::Tree;
    use crate::utilities::bounding_box::BoundingBox;
    use glam::Vec3;

    #[test]
    fn nearest_leaf_wins() {
        let mut tree = Tree::new(0.0);
        for i in 0..10 {
            let center = Vec3::new(i as f32 * 3.0, 0.0, 0.0);
            tree.add(BoundingBox::from_center_half_extents(center, Vec3::splat(0.5)), i);
        }
        let origin = Vec3::new(100.0, 0.0, 0.0);
        let direction = Vec3::new(-200.0, 0.0, 0.0);
        let mut payloads = Vec::new();
        let hit = tree.ray_cast(origin, direction, 1.0, &mut |proxy: u32, payload: &i32, maximum_t: f32| {
            payloads.push(*payload);
            tree.leaf_bounds(proxy).ray_entry(origin, direction, maximum_t)
        });
        let expected = (100.0 - 27.5) / 200.0;
        assert!((hit.unwrap() - expected).abs() < 1e-5);
        assert!(payloads.contains(&9));
    }

    #[test]
    fn miss_reports_nothing() {
        let mut tree = Tree::new(0.0);
        tree.add(BoundingBox::from_center_half_extents(Vec3::ZERO, Vec3::ONE), 0u8);
        let hit = tree.ray_cast(Vec3::new(0.0, 5.0, 0.0), Vec3::X, 10.0, &mut |_: u32, _: &u8, t: f32| Some(t));
        assert!(hit.is_none());
    }
}
