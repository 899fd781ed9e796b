mod node;
mod tree;
mod tree_add;
mod tree_intertree_queries;
mod tree_ray_cast;
mod tree_remove;
mod tree_self_queries;
mod tree_sweep_builder;
mod tree_volume_query;

pub use node::{Node, NULL_NODE};
pub use tree::Tree;
pub use tree_ray_cast::RayLeafTester;
