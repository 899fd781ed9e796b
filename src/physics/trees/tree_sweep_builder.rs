use super::node::{Node, NULL_NODE};
use super::tree::Tree;
use crate::utilities::bounding_box::BoundingBox;

impl<T> Tree<T> {
    /// Rebuilds the internal nodes top-down, splitting leaves at the median of the widest centroid axis.
    ///
    /// Leaf proxies keep their indices, so handles held by callers stay valid.
    pub fn optimize(&mut self) {
        if self.leaf_count < 3 {
            return;
        }
        let mut leaves: Vec<u32> = self.leaves().collect();
        for index in 0..self.nodes.len() as u32 {
            let node = &self.nodes[index as usize];
            if node.payload.is_none() && node.height >= 0 {
                self.free_node(index);
            }
        }
        self.root = self.build_subtree(&mut leaves, NULL_NODE);
    }

    fn build_subtree(&mut self, leaves: &mut [u32], parent: u32) -> u32 {
        if let [leaf] = leaves {
            let node = &mut self.nodes[*leaf as usize];
            node.parent = parent;
            return *leaf;
        }

        let centroids = leaves
            .iter()
            .map(|&leaf| self.nodes[leaf as usize].bounds.center())
            .collect::<Vec<_>>();
        let axis = BoundingBox::from_points(&centroids)
            .map(|b| {
                let span = b.max - b.min;
                if span.x >= span.y && span.x >= span.z {
                    0
                } else if span.y >= span.z {
                    1
                } else {
                    2
                }
            })
            .unwrap_or(0);
        leaves.sort_by(|&a, &b| {
            let ca = self.nodes[a as usize].bounds.center()[axis];
            let cb = self.nodes[b as usize].bounds.center()[axis];
            ca.total_cmp(&cb).then(a.cmp(&b))
        });

        let index = self.allocate_node();
        let mut node = Node::internal();
        node.parent = parent;
        self.nodes[index as usize] = node;

        let (left, right) = leaves.split_at_mut(leaves.len() / 2);
        let a = self.build_subtree(left, index);
        let b = self.build_subtree(right, index);
        self.nodes[index as usize].children = [a, b];
        self.refit_node(index);
        index
    }
}

#[cfg(test)]
mod tests {
    use crate::physics::trees::Tree;
    use crate::utilities::bounding_box::BoundingBox;
    use glam::Vec3;

    #[test]
    fn optimize_keeps_proxies_and_lowers_height() {
        let mut tree = Tree::new(0.0);
        // Sorted insertion is a poor case for incremental building.
        let proxies: Vec<u32> = (0..256)
            .map(|i| {
                let center = Vec3::new(i as f32, 0.0, 0.0);
                tree.add(BoundingBox::from_center_half_extents(center, Vec3::splat(0.4)), i)
            })
            .collect();
        tree.optimize();
        tree.validate();
        assert!(tree.height() <= 9);
        for (i, proxy) in proxies.iter().enumerate() {
            assert_eq!(tree.payload(*proxy), Some(&i));
        }
    }
}
