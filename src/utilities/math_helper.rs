use glam::{Mat3, Quat, Vec3};

/// Squared length under which a vector is treated as zero.
pub const DEGENERATE_LENGTH_SQUARED: f32 = 1e-12;

/// Returns -1 if the value is negative and 1 otherwise.
#[inline(always)]
pub fn binary_sign(x: f32) -> f32 {
    if x < 0.0 {
        -1.0
    } else {
        1.0
    }
}

/// Normalizes `v`, falling back to `fallback` when `v` is too short to carry a direction.
#[inline(always)]
pub fn normalize_or(v: Vec3, fallback: Vec3) -> Vec3 {
    let length_squared = v.length_squared();
    if length_squared > DEGENERATE_LENGTH_SQUARED {
        v / length_squared.sqrt()
    } else {
        fallback
    }
}

/// Builds two unit tangents perpendicular to the unit vector `normal` and to each other.
#[inline]
pub fn build_orthonormal_basis(normal: Vec3) -> (Vec3, Vec3) {
    // Pick the axis least aligned with the normal to keep the cross product well conditioned.
    let helper = if normal.x.abs() < 0.57735 { Vec3::X } else { Vec3::Y };
    let t1 = normal.cross(helper).normalize();
    let t2 = normal.cross(t1);
    (t1, t2)
}

/// Cross product matrix: `skew(a) * b == a.cross(b)`.
#[inline(always)]
pub fn skew(a: Vec3) -> Mat3 {
    Mat3::from_cols(
        Vec3::new(0.0, a.z, -a.y),
        Vec3::new(-a.z, 0.0, a.x),
        Vec3::new(a.y, -a.x, 0.0),
    )
}

/// Inverts a matrix, returning `None` when it is singular.
#[inline]
pub fn try_inverse(m: Mat3) -> Option<Mat3> {
    let determinant = m.determinant();
    if determinant.abs() < 1e-12 || !determinant.is_finite() {
        None
    } else {
        Some(m.inverse())
    }
}

/// Rotates a body-local inverse inertia tensor into world space.
#[inline(always)]
pub fn rotate_inertia(local_inverse_inertia: Mat3, orientation: Quat) -> Mat3 {
    let rotation = Mat3::from_quat(orientation);
    rotation * local_inverse_inertia * rotation.transpose()
}

/// Integrates an orientation by an angular velocity over `dt`, keeping it normalized.
#[inline]
pub fn integrate_orientation(orientation: Quat, angular_velocity: Vec3, dt: f32) -> Quat {
    let rotation = angular_velocity * dt;
    let angle_squared = rotation.length_squared();
    if angle_squared < DEGENERATE_LENGTH_SQUARED {
        return orientation;
    }
    (Quat::from_scaled_axis(rotation) * orientation).normalize()
}

/// Whether every component of `v` is finite.
#[inline(always)]
pub fn is_finite(v: Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}
