use super::node::NULL_NODE;
use super::tree::{Tree, TRAVERSAL_STACK_CAPACITY};

impl<T> Tree<T> {
    /// Reports every pair `(leaf of self, leaf of other)` whose fattened bounds overlap.
    pub fn overlaps_with<U, F>(&self, other: &Tree<U>, mut on_pair: F)
    where
        F: FnMut(u32, &T, u32, &U),
    {
        if self.root == NULL_NODE || other.root == NULL_NODE {
            return;
        }
        let mut stack = Vec::with_capacity(TRAVERSAL_STACK_CAPACITY);
        stack.push((self.root, other.root));
        while let Some((a, b)) = stack.pop() {
            let node_a = &self.nodes[a as usize];
            let node_b = &other.nodes[b as usize];
            if !node_a.bounds.intersects(&node_b.bounds) {
                continue;
            }
            match (&node_a.payload, &node_b.payload) {
                (Some(payload_a), Some(payload_b)) => on_pair(a, payload_a, b, payload_b),
                (Some(_), None) => {
                    stack.push((a, node_b.children[0]));
                    stack.push((a, node_b.children[1]));
                }
                (None, Some(_)) => {
                    stack.push((node_a.children[0], b));
                    stack.push((node_a.children[1], b));
                }
                (None, None) => {
                    if node_a.bounds.surface_area() >= node_b.bounds.surface_area() {
                        stack.push((node_a.children[0], b));
                        stack.push((node_a.children[1], b));
                    } else {
                        stack.push((a, node_b.children[0]));
                        stack.push((a, node_b.children[1]));
                    }
                }
            }
        }
    }
}
