pub mod bounding_box;
pub mod math_helper;
pub mod task_scheduling;
pub mod temp_allocator;

pub use bounding_box::BoundingBox;
