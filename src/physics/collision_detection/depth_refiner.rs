//! Expanding polytope refinement of penetration depth for overlapping convex shapes.

use glam::Vec3;

use super::support_finder::{minkowski_support, Simplex, SupportFinder, SupportPoint};
use crate::utilities::math_helper;

/// Penetration of two overlapping shapes as found on the Minkowski difference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenetrationDepth {
    /// Unit direction from A towards B.
    pub normal: Vec3,
    /// Distance B must move along `normal` to separate the shapes.
    pub depth: f32,
    /// Deepest point of A inside B.
    pub on_a: Vec3,
    /// Deepest point of B inside A.
    pub on_b: Vec3,
}

#[derive(Debug, Clone, Copy)]
struct Face {
    indices: [usize; 3],
    normal: Vec3,
    distance: f32,
}

const MAX_EPA_ITERATIONS: usize = 64;
const MAX_POLYTOPE_VERTICES: usize = 128;
const CONVERGENCE_TOLERANCE: f32 = 1e-4;

/// Refines an intersecting GJK simplex into the penetration depth and witness points.
///
/// Simplices with fewer than four points, left when GJK finds the origin on a vertex, edge or face, are first
/// blown up into a tetrahedron. Returns `None` only when the difference is too flat to enclose a volume.
pub fn refine(a: &SupportFinder, b: &SupportFinder, simplex: &Simplex) -> Option<PenetrationDepth> {
    let mut vertices = blow_up(a, b, simplex.points())?;
    let interior = vertices.iter().map(|p| p.v).sum::<Vec3>() / vertices.len() as f32;

    let mut faces = Vec::with_capacity(64);
    for [i, j, k] in [[0, 1, 2], [0, 3, 1], [0, 2, 3], [1, 3, 2]] {
        faces.push(make_face(&vertices, interior, i, j, k)?);
    }

    let mut best = closest_face(&faces)?;
    for _ in 0..MAX_EPA_ITERATIONS {
        best = closest_face(&faces)?;
        let support = minkowski_support(a, b, best.normal);
        let support_distance = support.v.dot(best.normal);
        if support_distance - best.distance <= CONVERGENCE_TOLERANCE * best.distance.max(1.0)
            || vertices.len() >= MAX_POLYTOPE_VERTICES
        {
            break;
        }

        let new_index = vertices.len();
        vertices.push(support);

        // Remove every face the new vertex sees and stitch the horizon to it.
        let mut horizon: Vec<(usize, usize)> = Vec::new();
        faces.retain(|face| {
            let visible = face.normal.dot(support.v - vertices[face.indices[0]].v) > 0.0;
            if visible {
                for e in 0..3 {
                    let edge = (face.indices[e], face.indices[(e + 1) % 3]);
                    if let Some(position) = horizon.iter().position(|&other| other == (edge.1, edge.0)) {
                        horizon.swap_remove(position);
                    } else {
                        horizon.push(edge);
                    }
                }
            }
            !visible
        });
        for (i, j) in horizon {
            if let Some(face) = make_face(&vertices, interior, i, j, new_index) {
                faces.push(face);
            }
        }
        if faces.is_empty() {
            break;
        }
    }

    Some(witness(&vertices, &best))
}

/// Returns four support points spanning a volume, reusing the GJK simplex where possible.
fn blow_up(a: &SupportFinder, b: &SupportFinder, simplex: &[SupportPoint]) -> Option<Vec<SupportPoint>> {
    let mut points: Vec<SupportPoint> = simplex.to_vec();
    if points.len() == 4 && tetrahedron_volume(&points).abs() > 1e-12 {
        return Some(points);
    }
    points.truncate(3);

    const DIRECTIONS: [Vec3; 6] = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];
    let candidate = |direction: Vec3| minkowski_support(a, b, direction);

    if points.len() == 1 {
        let first = points[0].v;
        let farthest = DIRECTIONS
            .iter()
            .map(|d| candidate(*d))
            .max_by(|p, q| p.v.distance_squared(first).total_cmp(&q.v.distance_squared(first)))?;
        if farthest.v.distance_squared(first) < 1e-12 {
            return None;
        }
        points.push(farthest);
    }
    if points.len() == 2 {
        let axis = math_helper::normalize_or(points[1].v - points[0].v, Vec3::X);
        let (t1, t2) = math_helper::build_orthonormal_basis(axis);
        let origin = points[0].v;
        let farthest = [t1, -t1, t2, -t2]
            .iter()
            .map(|d| candidate(*d))
            .max_by(|p, q| {
                let dp = (p.v - origin).cross(axis).length_squared();
                let dq = (q.v - origin).cross(axis).length_squared();
                dp.total_cmp(&dq)
            })?;
        if (farthest.v - origin).cross(axis).length_squared() < 1e-12 {
            return None;
        }
        points.push(farthest);
    }
    let normal = (points[1].v - points[0].v).cross(points[2].v - points[0].v);
    let normal = math_helper::normalize_or(normal, Vec3::Y);
    let above = candidate(normal);
    let below = candidate(-normal);
    let height = |p: &SupportPoint| (p.v - points[0].v).dot(normal).abs();
    let apex = if height(&above) >= height(&below) { above } else { below };
    if height(&apex) < 1e-6 {
        return None;
    }
    points.push(apex);
    Some(points)
}

fn tetrahedron_volume(points: &[SupportPoint]) -> f32 {
    let a = points[0].v;
    (points[1].v - a).dot((points[2].v - a).cross(points[3].v - a)) / 6.0
}

/// Builds a face with its normal pointing away from `interior`.
fn make_face(vertices: &[SupportPoint], interior: Vec3, i: usize, j: usize, k: usize) -> Option<Face> {
    let a = vertices[i].v;
    let normal = (vertices[j].v - a).cross(vertices[k].v - a);
    if normal.length_squared() < 1e-20 {
        return None;
    }
    let mut normal = normal.normalize();
    let mut indices = [i, j, k];
    if normal.dot(a - interior) < 0.0 {
        normal = -normal;
        indices = [i, k, j];
    }
    Some(Face {
        indices,
        normal,
        distance: normal.dot(a).max(0.0),
    })
}

fn closest_face(faces: &[Face]) -> Option<Face> {
    faces
        .iter()
        .min_by(|a, b| a.distance.total_cmp(&b.distance))
        .copied()
}

/// Maps the origin's projection onto `face` back to points on the two shapes.
fn witness(vertices: &[SupportPoint], face: &Face) -> PenetrationDepth {
    let [p0, p1, p2] = face.indices.map(|i| vertices[i]);
    let projected = face.normal * face.distance;
    let (u, v, w) = barycentric(projected, p0.v, p1.v, p2.v);
    PenetrationDepth {
        normal: face.normal,
        depth: face.distance,
        on_a: p0.on_a * u + p1.on_a * v + p2.on_a * w,
        on_b: p0.on_b * u + p1.on_b * v + p2.on_b * w,
    }
}

fn barycentric(p: Vec3, a: Vec3, b: Vec3, c: Vec3) -> (f32, f32, f32) {
    let v0 = b - a;
    let v1 = c - a;
    let v2 = p - a;
    let d00 = v0.dot(v0);
    let d01 = v0.dot(v1);
    let d11 = v1.dot(v1);
    let d20 = v2.dot(v0);
    let d21 = v2.dot(v1);
    let denominator = d00 * d11 - d01 * d01;
    if denominator.abs() < 1e-20 {
        return (1.0, 0.0, 0.0);
    }
    let v = (d11 * d20 - d01 * d21) / denominator;
    let w = (d00 * d21 - d01 * d20) / denominator;
    (1.0 - v - w, v, w)
}
