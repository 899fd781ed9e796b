//! Collision routines registered with the [`CollisionDispatcher`](super::collision_dispatcher::CollisionDispatcher).

pub mod compound_collision_task;
pub mod convex_pair_tester;
pub mod mesh_convex_collision_task;
pub mod sphere_box_tester;
pub mod sphere_pair_tester;
