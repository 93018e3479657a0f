//! Synthetic CT phantoms for demos and tests.

use crate::error::Result;
use crate::math::Vec3;
use crate::volume::Volume;

const HU_AIR: f32 = -1000.0;
const HU_LUNG: f32 = -850.0;
const HU_SOFT_TISSUE: f32 = 40.0;
const HU_RIB: f32 = 500.0;
const HU_SPINE: f32 = 800.0;

/// Rib pitch along the body axis (mm)
const RIB_PITCH_MM: f32 = 24.0;
/// Rib thickness along the body axis (mm)
const RIB_WIDTH_MM: f32 = 9.0;

/// A coarse chest CT in Hounsfield units: an elliptic torso along z with two lungs,
/// a spine, a sternum and a rib cage, surrounded by air.
///
/// The volume sits with voxel `(0, 0, 0)` at the world origin; callers position it with
/// [`Volume::translate`] and [`Volume::rotate`].
pub fn chest(dims: [usize; 3], spacing: Vec3) -> Result<Volume> {
    let extent = Vec3::new(dims[0] as f32, dims[1] as f32, dims[2] as f32) * spacing;
    let center = (Vec3::new(
        dims[0].saturating_sub(1) as f32,
        dims[1].saturating_sub(1) as f32,
        dims[2].saturating_sub(1) as f32,
    ) * 0.5)
        * spacing;

    let body = (0.45 * extent.x, 0.34 * extent.y);
    let rib_band = (0.40 * extent.x, 0.29 * extent.y);
    let lung = (0.15 * extent.x, 0.24 * extent.y);
    let lung_offset = 0.19 * extent.x;
    let spine_center = (0.0, 0.18 * extent.y);
    let spine_radius = 0.07 * extent.x.min(extent.y);
    let sternum_center = (0.0, -0.28 * extent.y);
    let sternum_radius = 0.035 * extent.x.min(extent.y);

    let inside = |x: f32, y: f32, (a, b): (f32, f32)| (x / a).powi(2) + (y / b).powi(2) <= 1.0;
    let within = |x: f32, y: f32, (cx, cy): (f32, f32), r: f32| {
        (x - cx).powi(2) + (y - cy).powi(2) <= r * r
    };

    let mut hu = Vec::with_capacity(dims[0] * dims[1] * dims[2]);
    for k in 0..dims[2] {
        let z = k as f32 * spacing.z - center.z;
        let on_rib = (z.rem_euclid(RIB_PITCH_MM)) < RIB_WIDTH_MM;

        for j in 0..dims[1] {
            let y = j as f32 * spacing.y - center.y;
            for i in 0..dims[0] {
                let x = i as f32 * spacing.x - center.x;

                let value = if !inside(x, y, body) {
                    HU_AIR
                } else if within(x, y, spine_center, spine_radius) {
                    HU_SPINE
                } else if within(x, y, sternum_center, sternum_radius) {
                    HU_RIB
                } else if inside(x - lung_offset, y, lung) || inside(x + lung_offset, y, lung) {
                    HU_LUNG
                } else if on_rib && !inside(x, y, rib_band) {
                    HU_RIB
                } else {
                    HU_SOFT_TISSUE
                };
                hu.push(value);
            }
        }
    }

    log::debug!(
        "Built chest phantom {:?} voxels at {:?} mm spacing",
        dims,
        spacing
    );

    Volume::from_hu(&hu, dims, spacing, Vec3::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Material;

    #[test]
    fn test_chest_phantom_layout() {
        let dims = [48, 40, 24];
        let volume = chest(dims, Vec3::splat(5.0)).unwrap();
        assert_eq!(volume.dims(), dims);

        // Corner is outside the torso
        assert_eq!(volume.material_at(0, 0, 0), Some(Material::Air));

        // Spine sits posterior to the center line
        let spine_j = (dims[1] as f32 * 0.5 + 0.18 * dims[1] as f32) as usize;
        assert_eq!(volume.material_at(dims[0] / 2, spine_j, 0), Some(Material::Bone));

        // Lungs segment as air-like, low density voxels
        let lung_i = (dims[0] as f32 * (0.5 + 0.19)) as usize;
        let lung_density = volume.density_at(lung_i, dims[1] / 2, dims[2] / 2).unwrap();
        assert_eq!(volume.material_at(lung_i, dims[1] / 2, dims[2] / 2), Some(Material::Air));
        assert!(lung_density < 0.3);
    }
}
