use super::node::NULL_NODE;
use super::tree::{Tree, TRAVERSAL_STACK_CAPACITY};

enum PendingTest {
    /// All overlaps among the leaves below one node.
    Within(u32),
    /// Overlaps between the leaves below two disjoint subtrees.
    Between(u32, u32),
}

impl<T> Tree<T> {
    /// Reports every pair of leaves whose fattened bounds overlap. Each unordered pair is reported once.
    pub fn self_overlaps<F>(&self, mut on_pair: F)
    where
        F: FnMut(u32, &T, u32, &T),
    {
        if self.root == NULL_NODE {
            return;
        }
        let mut stack = Vec::with_capacity(TRAVERSAL_STACK_CAPACITY);
        stack.push(PendingTest::Within(self.root));
        while let Some(test) = stack.pop() {
            match test {
                PendingTest::Within(index) => {
                    let node = &self.nodes[index as usize];
                    if node.is_leaf() {
                        continue;
                    }
                    let [a, b] = node.children;
                    stack.push(PendingTest::Within(a));
                    stack.push(PendingTest::Within(b));
                    stack.push(PendingTest::Between(a, b));
                }
                PendingTest::Between(a, b) => {
                    let node_a = &self.nodes[a as usize];
                    let node_b = &self.nodes[b as usize];
                    if !node_a.bounds.intersects(&node_b.bounds) {
                        continue;
                    }
                    match (&node_a.payload, &node_b.payload) {
                        (Some(payload_a), Some(payload_b)) => on_pair(a, payload_a, b, payload_b),
                        (Some(_), None) => {
                            let [b0, b1] = node_b.children;
                            stack.push(PendingTest::Between(a, b0));
                            stack.push(PendingTest::Between(a, b1));
                        }
                        (None, Some(_)) => {
                            let [a0, a1] = node_a.children;
                            stack.push(PendingTest::Between(a0, b));
                            stack.push(PendingTest::Between(a1, b));
                        }
                        (None, None) => {
                            // Split the larger subtree to keep the candidate volumes balanced.
                            if node_a.bounds.surface_area() >= node_b.bounds.surface_area() {
                                let [a0, a1] = node_a.children;
                                stack.push(PendingTest::Between(a0, b));
                                stack.push(PendingTest::Between(a1, b));
                            } else {
                                let [b0, b1] = node_b.children;
                                stack.push(PendingTest::Between(a, b0));
                                stack.push(PendingTest::Between(a, b1));
                            }
                        }
                    }
                }
            }
        }
    }
}
