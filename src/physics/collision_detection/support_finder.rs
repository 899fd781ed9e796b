//! Support mapping of posed convex shapes and the GJK intersection test built on it.

use glam::Vec3;

use crate::physics::body_properties::RigidPose;
use crate::physics::collidables::ConvexShape;
use crate::utilities::math_helper;

/// A convex shape placed in world space and inflated by a spherical margin.
///
/// Rounded shapes are evaluated as their core plus a radius, which keeps the polytopes built from them small.
pub struct SupportFinder<'a> {
    shape: &'a dyn ConvexShape,
    pose: RigidPose,
    margin: f32,
    radius: f32,
}

impl<'a> SupportFinder<'a> {
    pub fn new(shape: &'a dyn ConvexShape, pose: RigidPose, margin: f32) -> Self {
        Self {
            shape,
            pose,
            margin,
            radius: shape.convex_radius() + margin,
        }
    }

    #[inline(always)]
    pub fn margin(&self) -> f32 {
        self.margin
    }

    /// Furthest point of the inflated shape along `direction`, in world space.
    #[inline]
    pub fn support(&self, direction: Vec3) -> Vec3 {
        let local = self.pose.orientation.conjugate() * direction;
        let point = self.pose.transform(self.shape.core_support(local));
        if self.radius > 0.0 {
            point + math_helper::normalize_or(direction, Vec3::Y) * self.radius
        } else {
            point
        }
    }

    /// A world space point inside the shape.
    #[inline]
    pub fn interior_point(&self) -> Vec3 {
        self.pose.transform(self.shape.interior_point())
    }
}

/// A vertex of the Minkowski difference `A - B` together with the shape points that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SupportPoint {
    pub v: Vec3,
    pub on_a: Vec3,
    pub on_b: Vec3,
}

#[inline]
pub fn minkowski_support(a: &SupportFinder, b: &SupportFinder, direction: Vec3) -> SupportPoint {
    let on_a = a.support(direction);
    let on_b = b.support(-direction);
    SupportPoint {
        v: on_a - on_b,
        on_a,
        on_b,
    }
}

/// Up to four support points; the most recently added one is first.
#[derive(Debug, Clone)]
pub struct Simplex {
    points: [SupportPoint; 4],
    size: usize,
}

impl Simplex {
    fn new(first: SupportPoint) -> Self {
        Self {
            points: [first; 4],
            size: 1,
        }
    }

    fn push(&mut self, point: SupportPoint) {
        for i in (1..4).rev() {
            self.points[i] = self.points[i - 1];
        }
        self.points[0] = point;
        self.size = (self.size + 1).min(4);
    }

    fn set(&mut self, points: &[SupportPoint]) {
        for (i, p) in points.iter().enumerate().take(4) {
            self.points[i] = *p;
        }
        self.size = points.len().min(4);
    }

    pub fn points(&self) -> &[SupportPoint] {
        &self.points[..self.size]
    }
}

/// Outcome of the GJK intersection test.
#[derive(Debug, Clone)]
pub enum GjkResult {
    /// The shapes overlap; the simplex encloses or touches the origin.
    Intersecting(Simplex),
    Separated,
}

const MAX_GJK_ITERATIONS: usize = 64;

/// Tests whether the inflated shapes overlap.
pub fn gjk(a: &SupportFinder, b: &SupportFinder) -> GjkResult {
    let mut direction = a.interior_point() - b.interior_point();
    if direction.length_squared() < math_helper::DEGENERATE_LENGTH_SQUARED {
        direction = Vec3::X;
    }
    let mut simplex = Simplex::new(minkowski_support(a, b, direction));
    direction = -simplex.points[0].v;

    for _ in 0..MAX_GJK_ITERATIONS {
        if direction.length_squared() < math_helper::DEGENERATE_LENGTH_SQUARED {
            // The origin lies on the simplex.
            return GjkResult::Intersecting(simplex);
        }
        let new_point = minkowski_support(a, b, direction);
        if new_point.v.dot(direction) < 0.0 {
            return GjkResult::Separated;
        }
        simplex.push(new_point);
        if do_simplex(&mut simplex, &mut direction) {
            return GjkResult::Intersecting(simplex);
        }
    }
    GjkResult::Separated
}

fn do_simplex(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    match simplex.size {
        2 => do_simplex_line(simplex, direction),
        3 => do_simplex_triangle(simplex, direction),
        4 => do_simplex_tetrahedron(simplex, direction),
        _ => false,
    }
}

fn do_simplex_line(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    let [a, b, ..] = simplex.points;
    let ab = b.v - a.v;
    let ao = -a.v;
    if ab.dot(ao) > 0.0 {
        *direction = ab.cross(ao).cross(ab);
    } else {
        simplex.set(&[a]);
        *direction = ao;
    }
    false
}

fn do_simplex_triangle(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    let [a, b, c, _] = simplex.points;
    let ab = b.v - a.v;
    let ac = c.v - a.v;
    let ao = -a.v;
    let abc = ab.cross(ac);

    if abc.cross(ac).dot(ao) > 0.0 {
        if ac.dot(ao) > 0.0 {
            simplex.set(&[a, c]);
            *direction = ac.cross(ao).cross(ac);
        } else {
            simplex.set(&[a, b]);
            return do_simplex_line(simplex, direction);
        }
    } else if ab.cross(abc).dot(ao) > 0.0 {
        simplex.set(&[a, b]);
        return do_simplex_line(simplex, direction);
    } else if abc.dot(ao) > 0.0 {
        *direction = abc;
    } else {
        simplex.set(&[a, c, b]);
        *direction = -abc;
    }
    false
}

fn do_simplex_tetrahedron(simplex: &mut Simplex, direction: &mut Vec3) -> bool {
    let [a, b, c, d] = simplex.points;
    let ab = b.v - a.v;
    let ac = c.v - a.v;
    let ad = d.v - a.v;
    let ao = -a.v;

    if ab.cross(ac).dot(ao) > 0.0 {
        simplex.set(&[a, b, c]);
        return do_simplex_triangle(simplex, direction);
    }
    if ac.cross(ad).dot(ao) > 0.0 {
        simplex.set(&[a, c, d]);
        return do_simplex_triangle(simplex, direction);
    }
    if ad.cross(ab).dot(ao) > 0.0 {
        simplex.set(&[a, d, b]);
        return do_simplex_triangle(simplex, direction);
    }
    true
}
