//! Math types for drrkit
//!
//! World units are millimetres throughout.

use crate::error::{DrrError, Result};
pub use glam::{Mat3, Vec3};

/// Tolerance used when checking that a matrix is a proper rotation.
const ORTHONORMAL_EPSILON: f32 = 1e-4;

/// Principal axis for single-axis Euler rotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// Builds a rotation about a single principal axis.
///
/// ```
/// use drrkit_core::math::{euler_rotation, Axis, Vec3};
///
/// let r = euler_rotation(Axis::X, -90.0, true);
/// let v = r * Vec3::Y;
/// assert!(v.abs_diff_eq(-Vec3::Z, 1e-6));
/// ```
pub fn euler_rotation(axis: Axis, angle: f32, degrees: bool) -> Mat3 {
    let radians = if degrees { angle.to_radians() } else { angle };
    match axis {
        Axis::X => Mat3::from_rotation_x(radians),
        Axis::Y => Mat3::from_rotation_y(radians),
        Axis::Z => Mat3::from_rotation_z(radians),
    }
}

/// Checks that `rotation` is finite, orthonormal and right-handed.
pub fn validate_rotation(rotation: &Mat3) -> Result<()> {
    if !rotation.is_finite() {
        return Err(DrrError::InvalidGeometry(
            "rotation contains non-finite values".into(),
        ));
    }

    let gram = rotation.transpose() * *rotation;
    if !gram.abs_diff_eq(Mat3::IDENTITY, ORTHONORMAL_EPSILON) {
        return Err(DrrError::InvalidGeometry(format!(
            "rotation is not orthonormal: {:?}",
            rotation
        )));
    }

    if rotation.determinant() <= 0.0 {
        return Err(DrrError::InvalidGeometry(
            "rotation must have a positive determinant (reflections are not rigid)".into(),
        ));
    }

    Ok(())
}

pub(crate) fn validate_point(point: Vec3, what: &str) -> Result<()> {
    if point.is_finite() {
        Ok(())
    } else {
        Err(DrrError::InvalidGeometry(format!(
            "{} must be finite, got {:?}",
            what, point
        )))
    }
}

/// Rigid transform (rotation followed by translation) from a local frame into world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub rotation: Mat3,
    pub translation: Vec3,
}

impl RigidTransform {
    pub fn new(rotation: Mat3, translation: Vec3) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    pub fn identity() -> Self {
        Self {
            rotation: Mat3::IDENTITY,
            translation: Vec3::ZERO,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            rotation: Mat3::IDENTITY,
            translation,
        }
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }

    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }

    /// Inverse transform. Relies on the rotation being orthonormal.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.transpose();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    /// Applies `rotation` about `center` on top of this transform.
    pub fn rotated_about(&self, rotation: Mat3, center: Vec3) -> Self {
        Self {
            rotation: rotation * self.rotation,
            translation: rotation * (self.translation - center) + center,
        }
    }

    pub fn translated(&self, offset: Vec3) -> Self {
        Self {
            rotation: self.rotation,
            translation: self.translation + offset,
        }
    }
}

impl Default for RigidTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// A half-line with a normalized direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Axis-aligned bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    /// Slab test. Returns the parametric entry and exit distances along `ray`,
    /// with the entry clamped to zero.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<(f32, f32)> {
        let mut t_enter = 0.0_f32;
        let mut t_exit = f32::INFINITY;

        for axis in 0..3 {
            let origin = ray.origin[axis];
            let direction = ray.direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);

            if direction.abs() < f32::EPSILON {
                if origin < lo || origin > hi {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / direction;
            let mut t0 = (lo - origin) * inv;
            let mut t1 = (hi - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_enter = t_enter.max(t0);
            t_exit = t_exit.min(t1);
            if t_enter > t_exit {
                return None;
            }
        }

        Some((t_enter, t_exit))
    }
}
