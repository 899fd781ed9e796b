use glam::Vec3;

use super::ray::RayHit;
use super::triangle::Triangle;
use crate::physics::error::PhysicsError;
use crate::physics::handles::{bits_for_child_count, SubShapeIdCreator};
use crate::physics::trees::Tree;
use crate::utilities::bounding_box::BoundingBox;
use crate::physics::collidables::shape::ConvexShape;

/// Static triangle soup indexed by a bounding volume hierarchy.
#[derive(Debug, Clone)]
pub struct Mesh {
    vertices: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    tree: Tree<u32>,
    bounds: BoundingBox,
}

impl Mesh {
    /// Builds a mesh, skipping triangles without area. Fails when no usable triangle remains.
    pub fn new(vertices: &[Vec3], triangles: &[[u32; 3]]) -> Result<Self, PhysicsError> {
        let mut kept = Vec::with_capacity(triangles.len());
        for indices in triangles {
            let corner = |i: u32| {
                vertices.get(i as usize).copied().ok_or_else(|| {
                    PhysicsError::InvalidConfiguration(format!(
                        "mesh triangle references vertex {i} but only {} vertices exist",
                        vertices.len()
                    ))
                })
            };
            let triangle = Triangle::new(corner(indices[0])?, corner(indices[1])?, corner(indices[2])?);
            if triangle.is_degenerate() {
                continue;
            }
            kept.push(*indices);
        }
        if kept.is_empty() {
            return Err(PhysicsError::InvalidConfiguration(
                "mesh has no non-degenerate triangles".to_string(),
            ));
        }
        let skipped = triangles.len() - kept.len();
        if skipped > 0 {
            tracing::debug!(skipped, kept = kept.len(), "skipped degenerate mesh triangles");
        }

        let mut mesh = Self {
            vertices: vertices.to_vec(),
            triangles: kept,
            tree: Tree::with_capacity(0.0, triangles.len()),
            bounds: BoundingBox::default(),
        };
        for index in 0..mesh.triangles.len() as u32 {
            let bounds = mesh.triangle(index).bounds();
            mesh.tree.add(bounds, index);
        }
        mesh.tree.optimize();
        mesh.bounds = mesh.tree.root_bounds().unwrap_or_default();
        Ok(mesh)
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn triangle(&self, index: u32) -> Triangle {
        let [a, b, c] = self.triangles[index as usize];
        Triangle::new(
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        )
    }

    pub fn local_bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Number of sub-shape id bits used to address a triangle.
    pub fn sub_shape_bits(&self) -> u32 {
        bits_for_child_count(self.triangles.len())
    }

    /// Calls `on_triangle` for every triangle whose bounds overlap `bounds` (mesh local space).
    pub fn for_each_triangle_in<F: FnMut(u32, Triangle)>(&self, bounds: &BoundingBox, mut on_triangle: F) {
        self.tree.query(bounds, |_, &index| on_triangle(index, self.triangle(index)));
    }

    pub fn cast_ray(
        &self,
        origin: Vec3,
        direction: Vec3,
        maximum_fraction: f32,
        creator: SubShapeIdCreator,
    ) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        let bits = self.sub_shape_bits();
        self.tree.ray_cast(
            origin,
            direction,
            maximum_fraction,
            &mut |_: u32, index: &u32, maximum_t: f32| {
                let (fraction, normal) = self.triangle(*index).ray_test(origin, direction)?;
                if fraction > maximum_t {
                    return None;
                }
                best = Some(RayHit {
                    fraction,
                    normal,
                    sub_shape_id: creator.push(*index, bits).id(),
                });
                Some(fraction)
            },
        );
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad_with_sliver() -> Mesh {
        let vertices = vec![
            Vec3::new(-1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, 1.0),
        ];
        Mesh::new(&vertices, &[[0, 2, 1], [0, 3, 2], [0, 0, 1]]).unwrap()
    }

    #[test]
    fn degenerate_triangles_are_skipped() {
        let mesh = quad_with_sliver();
        assert_eq!(mesh.triangle_count(), 2);
        assert!(Mesh::new(&[Vec3::ZERO, Vec3::X], &[[0, 1, 1]]).is_err());
        assert!(Mesh::new(&[Vec3::ZERO], &[[0, 1, 2]]).is_err());
    }

    #[test]
    fn ray_reports_triangle_sub_shape() {
        let mesh = quad_with_sliver();
        let hit = mesh
            .cast_ray(Vec3::new(-0.5, 2.0, 0.5), Vec3::new(0.0, -4.0, 0.0), 1.0, SubShapeIdCreator::default())
            .unwrap();
        assert!((hit.fraction - 0.5).abs() < 1e-6);
        let (triangle, rest) = hit.sub_shape_id.pop(mesh.sub_shape_bits());
        assert_eq!(triangle, 1);
        assert!(rest.is_empty());
    }
}
