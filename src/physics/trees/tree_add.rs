use super::node::{Node, NULL_NODE};
use super::tree::Tree;
use crate::utilities::bounding_box::BoundingBox;

impl<T> Tree<T> {
    /// Adds a leaf with the given tight bounds, returning its proxy index.
    pub fn add(&mut self, bounds: BoundingBox, payload: T) -> u32 {
        let leaf = self.allocate_node();
        self.nodes[leaf as usize] = Node::leaf(self.fatten(bounds), payload);
        self.insert_leaf(leaf);
        self.leaf_count += 1;
        leaf
    }

    /// Moves a leaf to new tight bounds. Returns true when the leaf had to be reinserted because the bounds
    /// escaped its fattened bounds; otherwise the tree is left untouched.
    pub fn update(&mut self, proxy: u32, bounds: BoundingBox) -> bool {
        if self.nodes[proxy as usize].bounds.contains(&bounds) {
            return false;
        }
        self.remove_leaf(proxy);
        self.nodes[proxy as usize].bounds = self.fatten(bounds);
        self.insert_leaf(proxy);
        true
    }

    /// Links an allocated leaf into the hierarchy next to the sibling that minimizes the surface area increase.
    pub(crate) fn insert_leaf(&mut self, leaf: u32) {
        if self.root == NULL_NODE {
            self.root = leaf;
            self.nodes[leaf as usize].parent = NULL_NODE;
            return;
        }

        let leaf_bounds = self.nodes[leaf as usize].bounds;
        let mut sibling = self.root;
        while !self.nodes[sibling as usize].is_leaf() {
            let node = &self.nodes[sibling as usize];
            let area = node.bounds.surface_area();
            let combined_area = node.bounds.merged(&leaf_bounds).surface_area();

            // Cost of pairing with this node directly, versus pushing the leaf down into a child.
            let cost = 2.0 * combined_area;
            let inheritance_cost = 2.0 * (combined_area - area);
            let [left, right] = node.children;
            let cost_left = self.descend_cost(left, &leaf_bounds) + inheritance_cost;
            let cost_right = self.descend_cost(right, &leaf_bounds) + inheritance_cost;

            if cost < cost_left && cost < cost_right {
                break;
            }
            sibling = if cost_left < cost_right { left } else { right };
        }

        let old_parent = self.nodes[sibling as usize].parent;
        let new_parent = self.allocate_node();
        let mut parent_node = Node::internal();
        parent_node.parent = old_parent;
        parent_node.children = [sibling, leaf];
        parent_node.bounds = leaf_bounds.merged(&self.nodes[sibling as usize].bounds);
        parent_node.height = self.nodes[sibling as usize].height + 1;
        self.nodes[new_parent as usize] = parent_node;

        if old_parent == NULL_NODE {
            self.root = new_parent;
        } else {
            let slot = self.nodes[old_parent as usize].index_of_child(sibling);
            self.nodes[old_parent as usize].children[slot] = new_parent;
        }
        self.nodes[sibling as usize].parent = new_parent;
        self.nodes[leaf as usize].parent = new_parent;

        self.fix_upwards(new_parent);
    }

    fn descend_cost(&self, child: u32, leaf_bounds: &BoundingBox) -> f32 {
        let node = &self.nodes[child as usize];
        let combined = node.bounds.merged(leaf_bounds).surface_area();
        if node.is_leaf() {
            combined
        } else {
            combined - node.bounds.surface_area()
        }
    }
}
