use super::node::NULL_NODE;
use super::tree::{Tree, TRAVERSAL_STACK_CAPACITY};
use crate::utilities::bounding_box::BoundingBox;

impl<T> Tree<T> {
    /// Reports every leaf whose fattened bounds intersect `bounds` as `(proxy, payload)`.
    pub fn query<F>(&self, bounds: &BoundingBox, mut on_leaf: F)
    where
        F: FnMut(u32, &T),
    {
        if self.root == NULL_NODE {
            return;
        }
        let mut stack = Vec::with_capacity(TRAVERSAL_STACK_CAPACITY);
        stack.push(self.root);
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if !node.bounds.intersects(bounds) {
                continue;
            }
            match &node.payload {
                Some(payload) => on_leaf(index, payload),
                None => stack.extend_from_slice(&node.children),
            }
        }
    }
}
