use crate::error::{DrrError, Result};
use crate::math::Vec3;
use std::fmt;
use std::str::FromStr;

/// How densities are reconstructed between voxel centers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InterpolationMode {
    /// Value of the closest voxel center
    Nearest,
    /// Trilinear interpolation of the eight surrounding voxel centers
    #[default]
    Linear,
}

impl InterpolationMode {
    pub fn name(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Linear => "linear",
        }
    }
}

impl fmt::Display for InterpolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for InterpolationMode {
    type Err = DrrError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "linear" => Ok(Self::Linear),
            other => Err(DrrError::Configuration(format!(
                "unknown interpolation mode '{}', expected 'nearest' or 'linear'",
                other
            ))),
        }
    }
}

#[inline]
pub(crate) fn flat_index(dims: [usize; 3], i: usize, j: usize, k: usize) -> usize {
    i + dims[0] * (j + dims[1] * k)
}

/// Index of the voxel whose center is closest to the continuous index `q`.
#[inline]
pub(crate) fn nearest_voxel(dims: [usize; 3], q: Vec3) -> usize {
    let i = (q.x.round().max(0.0) as usize).min(dims[0] - 1);
    let j = (q.y.round().max(0.0) as usize).min(dims[1] - 1);
    let k = (q.z.round().max(0.0) as usize).min(dims[2] - 1);
    flat_index(dims, i, j, k)
}

/// Trilinear interpolation at continuous index `q`, clamping to the edge voxels.
pub(crate) fn trilinear(values: &[f32], dims: [usize; 3], q: Vec3) -> f32 {
    let axis = |coord: f32, n: usize| -> (usize, usize, f32) {
        let clamped = coord.clamp(0.0, (n - 1) as f32);
        let lo = clamped.floor() as usize;
        let hi = (lo + 1).min(n - 1);
        (lo, hi, clamped - lo as f32)
    };

    let (i0, i1, fx) = axis(q.x, dims[0]);
    let (j0, j1, fy) = axis(q.y, dims[1]);
    let (k0, k1, fz) = axis(q.z, dims[2]);

    let at = |i, j, k| values[flat_index(dims, i, j, k)];
    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;

    let c00 = lerp(at(i0, j0, k0), at(i1, j0, k0), fx);
    let c10 = lerp(at(i0, j1, k0), at(i1, j1, k0), fx);
    let c01 = lerp(at(i0, j0, k1), at(i1, j0, k1), fx);
    let c11 = lerp(at(i0, j1, k1), at(i1, j1, k1), fx);

    lerp(lerp(c00, c10, fy), lerp(c01, c11, fy), fz)
}
