//! Dynamic bounding volume hierarchy shared by the broad phase and mesh shapes.
//!
//! The struct is defined here and extended with `impl Tree` blocks in sibling modules.

use super::node::{Node, NULL_NODE};
use crate::utilities::bounding_box::BoundingBox;

/// Initial capacity of traversal stacks.
pub const TRAVERSAL_STACK_CAPACITY: usize = 64;

/// Self-balancing binary AABB tree with incremental insertion and removal.
///
/// Leaves store bounds expanded by [`Tree::margin`], so a leaf only needs to be reinserted once its tight bounds
/// leave the fattened ones. Leaves are addressed by the proxy index returned from [`Tree::add`], which stays valid
/// until the leaf is removed.
#[derive(Clone, Debug)]
pub struct Tree<T> {
    pub(crate) nodes: Vec<Node<T>>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) root: u32,
    pub(crate) leaf_count: usize,
    /// Distance leaf bounds are expanded by on every side.
    pub margin: f32,
}

impl<T> Default for Tree<T> {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl<T> Tree<T> {
    pub fn new(margin: f32) -> Self {
        Self {
            nodes: Vec::new(),
            free_list: Vec::new(),
            root: NULL_NODE,
            leaf_count: 0,
            margin,
        }
    }

    pub fn with_capacity(margin: f32, leaf_capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(leaf_capacity.saturating_mul(2)),
            ..Self::new(margin)
        }
    }

    #[inline(always)]
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }

    /// Height of the tree; zero when empty or holding a single leaf.
    pub fn height(&self) -> i32 {
        if self.root == NULL_NODE {
            0
        } else {
            self.nodes[self.root as usize].height
        }
    }

    /// Bounds enclosing every leaf, if any.
    pub fn root_bounds(&self) -> Option<BoundingBox> {
        (self.root != NULL_NODE).then(|| self.nodes[self.root as usize].bounds)
    }

    /// Fattened bounds of a leaf.
    #[inline]
    pub fn leaf_bounds(&self, proxy: u32) -> BoundingBox {
        self.nodes[proxy as usize].bounds
    }

    /// Payload of a live leaf.
    #[inline]
    pub fn payload(&self, proxy: u32) -> Option<&T> {
        self.nodes.get(proxy as usize).and_then(|n| n.payload.as_ref())
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free_list.clear();
        self.root = NULL_NODE;
        self.leaf_count = 0;
    }

    /// Proxies of all live leaves in ascending order.
    pub fn leaves(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.payload.is_some())
            .map(|(index, _)| index as u32)
    }

    pub(crate) fn fatten(&self, bounds: BoundingBox) -> BoundingBox {
        bounds.expanded(self.margin)
    }

    pub(crate) fn allocate_node(&mut self) -> u32 {
        match self.free_list.pop() {
            Some(index) => index,
            None => {
                self.nodes.push(Node::free());
                (self.nodes.len() - 1) as u32
            }
        }
    }

    pub(crate) fn free_node(&mut self, index: u32) {
        self.nodes[index as usize] = Node::free();
        self.free_list.push(index);
    }

    /// Recomputes the bounds and height of an internal node from its children.
    pub(crate) fn refit_node(&mut self, index: u32) {
        let [a, b] = self.nodes[index as usize].children;
        let bounds = self.nodes[a as usize].bounds.merged(&self.nodes[b as usize].bounds);
        let height = 1 + self.nodes[a as usize].height.max(self.nodes[b as usize].height);
        let node = &mut self.nodes[index as usize];
        node.bounds = bounds;
        node.height = height;
    }

    /// Walks from `start` to the root, rebalancing and refitting every ancestor.
    pub(crate) fn fix_upwards(&mut self, start: u32) {
        let mut index = start;
        while index != NULL_NODE {
            index = self.balance(index);
            self.refit_node(index);
            index = self.nodes[index as usize].parent;
        }
    }

    /// Rotates the taller child of `index` upwards when the children's heights differ by more than one.
    /// Returns the node now occupying `index`'s position.
    fn balance(&mut self, index: u32) -> u32 {
        let node = &self.nodes[index as usize];
        if node.is_leaf() || node.height < 2 {
            return index;
        }
        let [b, c] = node.children;
        let difference = self.nodes[c as usize].height - self.nodes[b as usize].height;
        if difference > 1 {
            self.rotate(index, 1)
        } else if difference < -1 {
            self.rotate(index, 0)
        } else {
            index
        }
    }

    /// Promotes the child in slot `side` of `a` to take `a`'s place.
    fn rotate(&mut self, a: u32, side: usize) -> u32 {
        let c = self.nodes[a as usize].children[side];
        let [f, g] = self.nodes[c as usize].children;
        let parent = self.nodes[a as usize].parent;

        self.nodes[c as usize].parent = parent;
        self.nodes[a as usize].parent = c;
        if parent == NULL_NODE {
            self.root = c;
        } else {
            let slot = self.nodes[parent as usize].index_of_child(a);
            self.nodes[parent as usize].children[slot] = c;
        }

        let (taller, shorter) = if self.nodes[f as usize].height > self.nodes[g as usize].height {
            (f, g)
        } else {
            (g, f)
        };
        self.nodes[c as usize].children = [a, taller];
        self.nodes[a as usize].children[side] = shorter;
        self.nodes[shorter as usize].parent = a;
        self.nodes[taller as usize].parent = c;

        self.refit_node(a);
        self.refit_node(c);
        c
    }

    /// Checks parent links, heights and bounds containment.
    #[cfg(test)]
    pub(crate) fn validate(&self) {
        if self.root == NULL_NODE {
            assert_eq!(self.leaf_count, 0);
            return;
        }
        assert_eq!(self.nodes[self.root as usize].parent, NULL_NODE);
        let mut leaves = 0;
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index as usize];
            if node.is_leaf() {
                assert!(node.payload.is_some());
                assert_eq!(node.height, 0);
                leaves += 1;
                continue;
            }
            for child in node.children {
                let child_node = &self.nodes[child as usize];
                assert_eq!(child_node.parent, index);
                assert!(node.bounds.contains(&child_node.bounds));
                stack.push(child);
            }
            let [a, b] = node.children;
            let (ha, hb) = (self.nodes[a as usize].height, self.nodes[b as usize].height);
            assert_eq!(node.height, 1 + ha.max(hb));
        }
        assert_eq!(leaves, self.leaf_count);
    }
}
