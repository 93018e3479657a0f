//! Oriented density volumes.

mod interpolation;
pub mod phantom;

pub use interpolation::InterpolationMode;

use crate::error::{DrrError, Result};
use crate::math::{self, Aabb, Mat3, RigidTransform, Vec3};
use crate::scene::Material;
use interpolation::{flat_index, nearest_voxel, trilinear};
use std::sync::Arc;

/// Attenuation coefficient of water (cm⁻¹) used for Hounsfield conversion.
const MU_WATER: f32 = 0.2059;
/// Attenuation coefficient of air (cm⁻¹) used for Hounsfield conversion.
const MU_AIR: f32 = 0.0002;

/// Density and material reconstructed at a world-space point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelSample {
    /// Density in g/cm³
    pub density: f32,
    pub material: Material,
}

/// Voxel grid shared between clones of a [`Volume`]. Immutable after construction.
///
/// # Data Format
///
/// Samples are stored x-fastest: the voxel `(i, j, k)` lives at
/// `i + nx * (j + ny * k)`.
#[derive(Debug)]
pub(crate) struct VolumeData {
    /// Density in g/cm³, one per voxel
    pub density: Vec<f32>,
    /// Material label, one per voxel
    pub materials: Vec<Material>,
    /// Voxel counts along x, y, z
    pub dims: [usize; 3],
    /// Voxel size in mm along x, y, z
    pub spacing: Vec3,
}

/// A 3D density grid with a rigid pose in world space.
///
/// Cloning is cheap: clones share voxel data and carry their own pose, so a volume handed
/// to a projector stays usable by the caller.
///
/// Local coordinates place the center of voxel `(0, 0, 0)` at the origin, with voxel
/// `(i, j, k)` at `(i, j, k) * spacing`.
///
/// # Example
///
/// ```
/// use drrkit_core::math::{euler_rotation, Axis, Vec3};
/// use drrkit_core::volume::Volume;
/// use drrkit_core::scene::Material;
///
/// let mut volume = Volume::uniform([8, 8, 8], Vec3::splat(2.0), Vec3::ZERO, 1.0, Material::SoftTissue)?;
/// let center = volume.center_in_world();
/// volume.rotate(euler_rotation(Axis::X, -90.0, true), center)?;
/// volume.translate(Vec3::new(0.0, 200.0, 0.0))?;
/// assert!(volume.center_in_world().abs_diff_eq(center + Vec3::new(0.0, 200.0, 0.0), 1e-3));
/// # Ok::<(), drrkit_core::DrrError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Volume {
    data: Arc<VolumeData>,
    world_from_volume: RigidTransform,
}

impl Volume {
    /// Builds a volume from per-voxel densities (g/cm³) and materials.
    ///
    /// `origin` is the world position of the center of voxel `(0, 0, 0)`.
    ///
    /// # Errors
    ///
    /// - `Configuration` if the arrays do not match `dims` or any dimension is zero
    /// - `InvalidGeometry` if `spacing` is not finite and positive or `origin` is not finite
    pub fn from_parameters(
        density: Vec<f32>,
        materials: Vec<Material>,
        dims: [usize; 3],
        spacing: Vec3,
        origin: Vec3,
    ) -> Result<Self> {
        if dims.contains(&0) {
            return Err(DrrError::Configuration(format!(
                "volume dimensions must be non-zero, got {:?}",
                dims
            )));
        }

        let voxel_count = dims[0] * dims[1] * dims[2];
        if density.len() != voxel_count || materials.len() != voxel_count {
            return Err(DrrError::Configuration(format!(
                "expected {} voxels for dimensions {:?}, got {} densities and {} materials",
                voxel_count,
                dims,
                density.len(),
                materials.len()
            )));
        }

        if !spacing.is_finite() || spacing.min_element() <= 0.0 {
            return Err(DrrError::InvalidGeometry(format!(
                "voxel spacing must be finite and positive, got {:?}",
                spacing
            )));
        }
        math::validate_point(origin, "volume origin")?;

        if density.iter().any(|d| !d.is_finite() || *d < 0.0) {
            return Err(DrrError::Configuration(
                "densities must be finite and non-negative".into(),
            ));
        }

        Ok(Self {
            data: Arc::new(VolumeData {
                density,
                materials,
                dims,
                spacing,
            }),
            world_from_volume: RigidTransform::from_translation(origin),
        })
    }

    /// Builds a volume from Hounsfield units, deriving density and a threshold segmentation
    /// into air, soft tissue and bone.
    pub fn from_hu(hu: &[f32], dims: [usize; 3], spacing: Vec3, origin: Vec3) -> Result<Self> {
        let density = hu.iter().map(|&h| hounsfield_to_density(h)).collect();
        let materials = hu.iter().map(|&h| Material::from_hounsfield(h)).collect();
        Self::from_parameters(density, materials, dims, spacing, origin)
    }

    /// Builds a volume of constant density and material.
    pub fn uniform(
        dims: [usize; 3],
        spacing: Vec3,
        origin: Vec3,
        density: f32,
        material: Material,
    ) -> Result<Self> {
        let voxel_count = dims[0] * dims[1] * dims[2];
        Self::from_parameters(
            vec![density; voxel_count],
            vec![material; voxel_count],
            dims,
            spacing,
            origin,
        )
    }

    pub fn dims(&self) -> [usize; 3] {
        self.data.dims
    }

    pub fn spacing(&self) -> Vec3 {
        self.data.spacing
    }

    pub fn voxel_count(&self) -> usize {
        self.data.density.len()
    }

    /// Physical size of the volume box in mm.
    pub fn extent(&self) -> Vec3 {
        Vec3::new(
            self.data.dims[0] as f32,
            self.data.dims[1] as f32,
            self.data.dims[2] as f32,
        ) * self.data.spacing
    }

    pub fn world_from_volume(&self) -> RigidTransform {
        self.world_from_volume
    }

    /// Returns true if both volumes share the same voxel data.
    pub fn shares_data_with(&self, other: &Volume) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Rotates the volume about `center` (world coordinates).
    ///
    /// # Errors
    ///
    /// Returns `InvalidGeometry` if `rotation` is not a finite, orthonormal, right-handed
    /// matrix or `center` is not finite. The pose is left unchanged on error.
    pub fn rotate(&mut self, rotation: Mat3, center: Vec3) -> Result<()> {
        math::validate_rotation(&rotation)?;
        math::validate_point(center, "rotation center")?;
        self.world_from_volume = self.world_from_volume.rotated_about(rotation, center);
        Ok(())
    }

    /// Translates the volume by `offset` (world coordinates).
    pub fn translate(&mut self, offset: Vec3) -> Result<()> {
        math::validate_point(offset, "translation")?;
        self.world_from_volume = self.world_from_volume.translated(offset);
        Ok(())
    }

    /// World-space centroid of the volume box, derived from the current pose.
    pub fn center_in_world(&self) -> Vec3 {
        self.world_from_volume.transform_point(self.local_center())
    }

    fn local_center(&self) -> Vec3 {
        let dims = self.data.dims;
        Vec3::new(
            (dims[0] - 1) as f32,
            (dims[1] - 1) as f32,
            (dims[2] - 1) as f32,
        ) * 0.5
            * self.data.spacing
    }

    /// World-space corners of the volume box.
    pub fn corners_in_world(&self) -> [Vec3; 8] {
        let lo = -0.5 * self.data.spacing;
        let hi = self.extent() + lo;
        let mut corners = [Vec3::ZERO; 8];
        for (n, corner) in corners.iter_mut().enumerate() {
            let local = Vec3::new(
                if n & 1 == 0 { lo.x } else { hi.x },
                if n & 2 == 0 { lo.y } else { hi.y },
                if n & 4 == 0 { lo.z } else { hi.z },
            );
            *corner = self.world_from_volume.transform_point(local);
        }
        corners
    }

    /// Axis-aligned world bounds of the (possibly rotated) volume box.
    pub fn world_bounds(&self) -> Aabb {
        let corners = self.corners_in_world();
        let mut bounds = Aabb::new(corners[0], corners[0]);
        for corner in &corners[1..] {
            bounds.min = bounds.min.min(*corner);
            bounds.max = bounds.max.max(*corner);
        }
        bounds
    }

    /// Continuous voxel index of a world point.
    pub fn voxel_coordinates(&self, point: Vec3) -> Vec3 {
        self.world_from_volume.inverse().transform_point(point) / self.data.spacing
    }

    /// Oriented containment: true if `point` lies inside the volume box.
    pub fn contains(&self, point: Vec3) -> bool {
        self.contains_voxel_coordinates(self.voxel_coordinates(point))
    }

    fn contains_voxel_coordinates(&self, q: Vec3) -> bool {
        let dims = self.data.dims;
        q.x >= -0.5
            && q.y >= -0.5
            && q.z >= -0.5
            && q.x <= dims[0] as f32 - 0.5
            && q.y <= dims[1] as f32 - 0.5
            && q.z <= dims[2] as f32 - 0.5
    }

    /// Samples the volume at a world point, or `None` if the point lies outside it.
    ///
    /// Density follows `mode`; the material always comes from the nearest voxel.
    pub fn sample(&self, point: Vec3, mode: InterpolationMode) -> Option<VoxelSample> {
        self.sample_with(&self.world_from_volume.inverse(), point, mode)
    }

    /// Like [`Volume::sample`] with a precomputed inverse pose, for hot loops.
    pub(crate) fn sample_with(
        &self,
        volume_from_world: &RigidTransform,
        point: Vec3,
        mode: InterpolationMode,
    ) -> Option<VoxelSample> {
        let q = volume_from_world.transform_point(point) / self.data.spacing;
        if !self.contains_voxel_coordinates(q) {
            return None;
        }

        let dims = self.data.dims;
        let nearest = nearest_voxel(dims, q);
        let density = match mode {
            InterpolationMode::Nearest => self.data.density[nearest],
            InterpolationMode::Linear => trilinear(&self.data.density, dims, q),
        };

        Some(VoxelSample {
            density,
            material: self.data.materials[nearest],
        })
    }

    /// Density of voxel `(i, j, k)`, if in range.
    pub fn density_at(&self, i: usize, j: usize, k: usize) -> Option<f32> {
        let dims = self.data.dims;
        (i < dims[0] && j < dims[1] && k < dims[2])
            .then(|| self.data.density[flat_index(dims, i, j, k)])
    }

    /// Material of voxel `(i, j, k)`, if in range.
    pub fn material_at(&self, i: usize, j: usize, k: usize) -> Option<Material> {
        let dims = self.data.dims;
        (i < dims[0] && j < dims[1] && k < dims[2])
            .then(|| self.data.materials[flat_index(dims, i, j, k)])
    }
}

/// Converts Hounsfield units to density relative to water (g/cm³), clamped at zero.
pub fn hounsfield_to_density(hu: f32) -> f32 {
    let mu = hu * (MU_WATER - MU_AIR) / 1000.0 + MU_WATER;
    (mu / MU_WATER).max(0.0)
}
