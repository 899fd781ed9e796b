use glam::{Mat3, Vec3};

use super::shape::{check_density, ConvexShape};
use crate::physics::body_properties::MassProperties;
use crate::physics::error::PhysicsError;
use crate::utilities::bounding_box::BoundingBox;
use crate::utilities::math_helper;

/// A planar face of a hull, with vertices wound counterclockwise around the outward normal.
#[derive(Debug, Clone, PartialEq)]
pub struct HullFace {
    pub normal: Vec3,
    /// Plane offset: points on the face satisfy `normal.dot(p) == offset`.
    pub offset: f32,
    pub vertices: Vec<Vec3>,
}

/// Convex hull of a point cloud.
///
/// Faces are found by testing every triple of input points as a candidate supporting plane, which is cubic in the
/// point count and meant for the small point sets collision hulls use.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvexHull {
    points: Vec<Vec3>,
    faces: Vec<HullFace>,
    mass: MassProperties,
    inner_radius: f32,
    bounds: BoundingBox,
}

impl ConvexHull {
    pub fn new(input: &[Vec3], density: f32) -> Result<Self, PhysicsError> {
        check_density(density)?;
        if input.len() < 4 {
            return Err(PhysicsError::InvalidConfiguration(format!(
                "convex hull needs at least 4 points, got {}",
                input.len()
            )));
        }
        if !input.iter().all(|p| math_helper::is_finite(*p)) {
            return Err(PhysicsError::InvalidConfiguration(
                "convex hull points must be finite".to_string(),
            ));
        }
        let bounds = BoundingBox::from_points(input).unwrap_or_default();
        let epsilon = 1e-5 * (bounds.max - bounds.min).max_element().max(1e-3);

        let faces = find_faces(input, epsilon);
        if faces.len() < 4 {
            return Err(PhysicsError::InvalidConfiguration(
                "convex hull points do not span a volume".to_string(),
            ));
        }

        let mut points: Vec<Vec3> = Vec::new();
        for face in &faces {
            for vertex in &face.vertices {
                if !points.iter().any(|p| p.distance_squared(*vertex) <= epsilon * epsilon) {
                    points.push(*vertex);
                }
            }
        }

        let mass = compute_mass(&faces, &points, density);
        if mass.mass <= 0.0 {
            return Err(PhysicsError::InvalidConfiguration(
                "convex hull points do not span a volume".to_string(),
            ));
        }
        let inner_radius = faces
            .iter()
            .map(|f| f.offset - f.normal.dot(mass.center_of_mass))
            .fold(f32::MAX, f32::min)
            .max(0.0);
        let bounds = BoundingBox::from_points(&points).unwrap_or(bounds);
        Ok(Self {
            points,
            faces,
            mass,
            inner_radius,
            bounds,
        })
    }

    /// Vertices of the hull; interior input points are discarded.
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    pub fn faces(&self) -> &[HullFace] {
        &self.faces
    }
}

fn find_faces(points: &[Vec3], epsilon: f32) -> Vec<HullFace> {
    let mut faces: Vec<HullFace> = Vec::new();
    for i in 0..points.len() {
        for j in i + 1..points.len() {
            for k in j + 1..points.len() {
                let normal = (points[j] - points[i]).cross(points[k] - points[i]);
                if normal.length_squared() < epsilon * epsilon {
                    continue;
                }
                let mut normal = normal.normalize();
                let mut offset = normal.dot(points[i]);
                let (lowest, highest) = points.iter().fold((f32::MAX, f32::MIN), |(lo, hi), p| {
                    let distance = normal.dot(*p) - offset;
                    (lo.min(distance), hi.max(distance))
                });
                if highest > epsilon {
                    if lowest < -epsilon {
                        continue;
                    }
                    normal = -normal;
                    offset = -offset;
                }
                let duplicate = faces
                    .iter()
                    .any(|f| f.normal.dot(normal) > 1.0 - 1e-4 && (f.offset - offset).abs() <= epsilon);
                if duplicate {
                    continue;
                }
                let on_plane: Vec<Vec3> = points
                    .iter()
                    .copied()
                    .filter(|p| (normal.dot(*p) - offset).abs() <= epsilon)
                    .collect();
                faces.push(HullFace {
                    normal,
                    offset,
                    vertices: wind_face(normal, on_plane, epsilon),
                });
            }
        }
    }
    faces
}

/// Orders the points of a face counterclockwise around `normal`, dropping coincident and non-extreme points.
fn wind_face(normal: Vec3, points: Vec<Vec3>, epsilon: f32) -> Vec<Vec3> {
    let centroid = points.iter().copied().sum::<Vec3>() / points.len() as f32;
    let (t1, t2) = math_helper::build_orthonormal_basis(normal);
    let mut sorted: Vec<(f32, Vec3)> = points
        .into_iter()
        .map(|p| {
            let offset = p - centroid;
            (offset.dot(t2).atan2(offset.dot(t1)), p)
        })
        .collect();
    sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut winding: Vec<Vec3> = Vec::with_capacity(sorted.len());
    for (_, p) in sorted {
        if winding.last().map_or(true, |last| last.distance_squared(p) > epsilon * epsilon) {
            winding.push(p);
        }
    }
    if winding.len() > 1 && winding[0].distance_squared(winding[winding.len() - 1]) <= epsilon * epsilon {
        winding.pop();
    }
    // Drop points lying on an edge between their neighbours.
    let mut index = 0;
    while winding.len() > 3 && index < winding.len() {
        let previous = winding[(index + winding.len() - 1) % winding.len()];
        let next = winding[(index + 1) % winding.len()];
        let incoming = winding[index] - previous;
        let outgoing = next - winding[index];
        let turn = incoming.cross(outgoing).dot(normal);
        if turn.abs() <= 1e-5 * incoming.length() * outgoing.length() {
            winding.remove(index);
        } else {
            index += 1;
        }
    }
    winding
}

/// Integrates mass, center of mass and inertia over tetrahedra fanned from an interior reference point.
fn compute_mass(faces: &[HullFace], points: &[Vec3], density: f32) -> MassProperties {
    let reference = points.iter().copied().sum::<Vec3>() / points.len() as f32;
    let canonical = Mat3::from_cols(
        Vec3::new(2.0, 1.0, 1.0),
        Vec3::new(1.0, 2.0, 1.0),
        Vec3::new(1.0, 1.0, 2.0),
    ) * (1.0 / 120.0);

    let mut volume = 0.0f32;
    let mut weighted_center = Vec3::ZERO;
    let mut covariance = Mat3::ZERO;
    for face in faces {
        let a = face.vertices[0] - reference;
        for window in face.vertices[1..].windows(2) {
            let b = window[0] - reference;
            let c = window[1] - reference;
            let columns = Mat3::from_cols(a, b, c);
            let determinant = columns.determinant();
            volume += determinant / 6.0;
            weighted_center += (a + b + c) * (determinant / 24.0);
            covariance += columns * canonical * columns.transpose() * determinant;
        }
    }
    if volume <= 0.0 {
        return MassProperties::default();
    }

    let mass = density * volume;
    let center = weighted_center / volume;
    let covariance = covariance * density;
    let trace = covariance.x_axis.x + covariance.y_axis.y + covariance.z_axis.z;
    let inertia_about_reference = Mat3::from_diagonal(Vec3::splat(trace)) - covariance;
    let outer = Mat3::from_cols(center * center.x, center * center.y, center * center.z);
    let inertia = inertia_about_reference
        - (Mat3::from_diagonal(Vec3::splat(center.length_squared())) - outer) * mass;
    MassProperties {
        mass,
        inertia,
        center_of_mass: reference + center,
    }
}

impl ConvexShape for ConvexHull {
    fn local_bounds(&self) -> BoundingBox {
        self.bounds
    }

    fn support(&self, direction: Vec3) -> Vec3 {
        let mut best = self.points[0];
        let mut best_dot = best.dot(direction);
        for p in &self.points[1..] {
            let d = p.dot(direction);
            if d > best_dot {
                best_dot = d;
                best = *p;
            }
        }
        best
    }

    fn interior_point(&self) -> Vec3 {
        self.mass.center_of_mass
    }

    fn mass_properties(&self) -> MassProperties {
        self.mass
    }

    fn inner_radius(&self) -> f32 {
        self.inner_radius
    }

    fn ray_test(&self, origin: Vec3, direction: Vec3) -> Option<(f32, Vec3)> {
        let mut t_enter = 0.0f32;
        let mut t_exit = 1.0f32;
        let mut entry_normal = None;
        for face in &self.faces {
            let denominator = face.normal.dot(direction);
            let distance = face.normal.dot(origin) - face.offset;
            if denominator.abs() < 1e-12 {
                if distance > 0.0 {
                    return None;
                }
                continue;
            }
            let t = -distance / denominator;
            if denominator < 0.0 {
                if t > t_enter {
                    t_enter = t;
                    entry_normal = Some(face.normal);
                }
            } else {
                t_exit = t_exit.min(t);
            }
            if t_enter > t_exit {
                return None;
            }
        }
        Some((t_enter, entry_normal.unwrap_or(Vec3::ZERO)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube_points() -> Vec<Vec3> {
        let mut points = Vec::new();
        for x in [-1.0, 1.0] {
            for y in [-1.0, 1.0] {
                for z in [-1.0, 1.0] {
                    points.push(Vec3::new(x, y, z));
                }
            }
        }
        // Interior points are dropped.
        points.push(Vec3::new(0.1, 0.2, -0.3));
        points
    }

    #[test]
    fn cube_hull_matches_box() {
        let hull = ConvexHull::new(&cube_points(), 1.0).unwrap();
        assert_eq!(hull.faces().len(), 6);
        assert_eq!(hull.points().len(), 8);
        assert!(hull.faces().iter().all(|f| f.vertices.len() == 4));

        let mass = hull.mass_properties();
        assert!((mass.mass - 8.0).abs() < 1e-3);
        assert!(mass.center_of_mass.length() < 1e-4);
        // Solid cube with side 2: I = m * (4 + 4) / 12.
        assert!((mass.inertia.x_axis.x - 8.0 * 8.0 / 12.0).abs() < 1e-2);
        assert!(mass.inertia.x_axis.y.abs() < 1e-3);
        assert!((hull.inner_radius() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn flat_points_are_rejected() {
        let points = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
        ];
        assert!(matches!(
            ConvexHull::new(&points, 1.0),
            Err(PhysicsError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn ray_enters_through_face() {
        let hull = ConvexHull::new(&cube_points(), 1.0).unwrap();
        let (t, normal) = hull.ray_test(Vec3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -10.0)).unwrap();
        assert!((t - 0.4).abs() < 1e-5);
        assert!((normal - Vec3::Z).length() < 1e-5);
        assert!(hull.ray_test(Vec3::new(3.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -10.0)).is_none());
    }
}
