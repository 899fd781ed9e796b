use super::node::NULL_NODE;
use super::tree::Tree;

impl<T> Tree<T> {
    /// Removes a leaf, returning its payload. Unknown or already removed proxies yield `None`.
    pub fn remove(&mut self, proxy: u32) -> Option<T> {
        let node = self.nodes.get_mut(proxy as usize)?;
        let payload = node.payload.take()?;
        self.remove_leaf(proxy);
        self.free_node(proxy);
        self.leaf_count -= 1;
        Some(payload)
    }

    /// Unlinks a leaf from the hierarchy without freeing it. Its sibling takes the place of the shared parent.
    pub(crate) fn remove_leaf(&mut self, leaf: u32) {
        if leaf == self.root {
            self.root = NULL_NODE;
            return;
        }

        let parent = self.nodes[leaf as usize].parent;
        let grandparent = self.nodes[parent as usize].parent;
        let leaf_slot = self.nodes[parent as usize].index_of_child(leaf);
        let sibling = self.nodes[parent as usize].children[1 - leaf_slot];

        if grandparent == NULL_NODE {
            self.root = sibling;
            self.nodes[sibling as usize].parent = NULL_NODE;
            self.free_node(parent);
        } else {
            let slot = self.nodes[grandparent as usize].index_of_child(parent);
            self.nodes[grandparent as usize].children[slot] = sibling;
            self.nodes[sibling as usize].parent = grandparent;
            self.free_node(parent);
            self.fix_upwards(grandparent);
        }
        self.nodes[leaf as usize].parent = NULL_NODE;
    }
}
