pub mod box_shape;
pub mod capsule;
pub mod compound;
pub mod convex_hull;
pub mod mesh;
pub mod ray;
pub mod shape;
pub mod sphere;
pub mod triangle;

pub use box_shape::BoxShape;
pub use capsule::Capsule;
pub use compound::{Compound, CompoundChild, CompoundChildSettings};
pub use convex_hull::{ConvexHull, HullFace};
pub use mesh::Mesh;
pub use ray::{RayCast, RayCastResult, RayHit};
pub use shape::{ConvexShape, Shape, ShapeKind, ShapeSettings, DEFAULT_DENSITY};
pub use sphere::Sphere;
pub use triangle::Triangle;
