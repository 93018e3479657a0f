//! Scene composition for DRR projection.
//!
//! A [`Scene`] gathers the volumes to project, resolves their priorities into a
//! [`Compositor`] ordering, and caches everything per-ray work needs: inverse poses,
//! world bounds, and the spectrum-resolved [`AttenuationTable`].
//!
//! # Overview
//!
//! 1. **Material / AttenuationCurve** - Mass attenuation of each voxel material
//! 2. **Spectrum / AttenuationTable** - Polyenergetic weighting of those curves
//! 3. **Compositor / Priority** - Which volume owns a point where volumes overlap
//!
//! # Example
//!
//! ```
//! use drrkit_core::math::Vec3;
//! use drrkit_core::scene::{Material, Priority, Scene, Spectrum};
//! use drrkit_core::volume::{InterpolationMode, Volume};
//!
//! let bone = Volume::uniform([4, 4, 4], Vec3::ONE, Vec3::ZERO, 1.9, Material::Bone)?;
//! let tissue = Volume::uniform([4, 4, 4], Vec3::ONE, Vec3::ZERO, 1.0, Material::SoftTissue)?;
//!
//! // The tissue volume takes precedence where both overlap
//! let scene = Scene::new(
//!     vec![bone, tissue],
//!     vec![Priority::Explicit(1), Priority::Explicit(0)],
//!     Spectrum::Kv90Al40,
//! )?;
//! let (owner, sample) = scene.sample(Vec3::splat(1.5), InterpolationMode::Linear).unwrap();
//! assert_eq!(owner, 1);
//! assert_eq!(sample.material, Material::SoftTissue);
//! # Ok::<(), drrkit_core::DrrError>(())
//! ```

pub mod compositor;
pub mod material;
pub mod spectrum;

pub use compositor::{Compositor, Priority};
pub use material::{AttenuationCurve, Material};
pub use spectrum::{AttenuationTable, Spectrum};

use crate::error::{DrrError, Result};
use crate::math::{Aabb, Ray, RigidTransform, Vec3};
use crate::volume::{InterpolationMode, Volume, VoxelSample};

/// Volumes prepared for projection.
#[derive(Debug, Clone)]
pub struct Scene {
    volumes: Vec<Volume>,
    priorities: Vec<Priority>,
    compositor: Compositor,
    attenuation: AttenuationTable,

    // Pose-derived caches, rebuilt by `refresh_poses`
    volume_from_world: Vec<RigidTransform>,
    bounds: Vec<Aabb>,
    combined_bounds: Aabb,
}

impl Scene {
    /// # Errors
    ///
    /// Returns a configuration error if `volumes` is empty or `priorities` has a different length.
    pub fn new(volumes: Vec<Volume>, priorities: Vec<Priority>, spectrum: Spectrum) -> Result<Self> {
        if volumes.is_empty() {
            return Err(DrrError::Configuration(
                "a scene needs at least one volume".into(),
            ));
        }
        if priorities.len() != volumes.len() {
            return Err(DrrError::Configuration(format!(
                "got {} priorities for {} volumes",
                priorities.len(),
                volumes.len()
            )));
        }

        let compositor = Compositor::new(&priorities);
        log::debug!("Scene precedence ordering: {:?}", compositor.ordering());

        let mut scene = Self {
            volumes,
            priorities,
            compositor,
            attenuation: AttenuationTable::new(spectrum),
            volume_from_world: Vec::new(),
            bounds: Vec::new(),
            combined_bounds: Aabb::new(Vec3::ZERO, Vec3::ZERO),
        };
        scene.refresh_poses();
        Ok(scene)
    }

    /// Recomputes cached inverse poses and bounds after volumes have moved.
    pub fn refresh_poses(&mut self) {
        self.volume_from_world = self
            .volumes
            .iter()
            .map(|v| v.world_from_volume().inverse())
            .collect();
        self.bounds = self.volumes.iter().map(Volume::world_bounds).collect();
        self.combined_bounds = self
            .bounds
            .iter()
            .skip(1)
            .fold(self.bounds[0], |acc, b| acc.union(b));
    }

    pub fn volumes(&self) -> &[Volume] {
        &self.volumes
    }

    /// Mutable access to one volume. Call [`Scene::refresh_poses`] after moving it.
    pub fn volume_mut(&mut self, index: usize) -> Option<&mut Volume> {
        self.volumes.get_mut(index)
    }

    pub fn priorities(&self) -> &[Priority] {
        &self.priorities
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    pub fn attenuation(&self) -> &AttenuationTable {
        &self.attenuation
    }

    pub fn spectrum(&self) -> Spectrum {
        self.attenuation.spectrum()
    }

    /// Axis-aligned bounds of every volume together.
    pub fn bounds(&self) -> Aabb {
        self.combined_bounds
    }

    /// Samples the authoritative volume at `point`.
    ///
    /// Volumes are visited in precedence order; the first one containing the point wins.
    /// Returns the winning volume's index with its sample, or `None` for vacuum.
    pub fn sample(&self, point: Vec3, mode: InterpolationMode) -> Option<(usize, VoxelSample)> {
        self.compositor.select_map(|index| {
            if !self.bounds[index].contains(point) {
                return None;
            }
            self.volumes[index]
                .sample_with(&self.volume_from_world[index], point, mode)
                .map(|sample| (index, sample))
        })
    }

    /// Index of the volume that owns `point`, if any.
    pub fn owner(&self, point: Vec3) -> Option<usize> {
        self.compositor.select(|index| {
            self.bounds[index].contains(point) && self.volumes[index].contains(point)
        })
    }

    /// Parametric range along `ray` covered by at least one volume's bounds.
    pub fn ray_extent(&self, ray: &Ray) -> Option<(f32, f32)> {
        self.combined_bounds.intersect_ray(ray)?;

        self.bounds
            .iter()
            .filter_map(|b| b.intersect_ray(ray))
            .fold(None, |acc: Option<(f32, f32)>, (t0, t1)| match acc {
                None => Some((t0, t1)),
                Some((a0, a1)) => Some((a0.min(t0), a1.max(t1))),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(origin: Vec3, density: f32, material: Material) -> Volume {
        Volume::uniform([10, 10, 10], Vec3::ONE, origin, density, material).unwrap()
    }

    fn two_overlapping(priorities: Vec<Priority>) -> Scene {
        Scene::new(
            vec![
                block(Vec3::ZERO, 1.0, Material::SoftTissue),
                block(Vec3::new(5.0, 0.0, 0.0), 1.9, Material::Bone),
            ],
            priorities,
            Spectrum::Kv90Al40,
        )
        .unwrap()
    }

    #[test]
    fn test_scene_rejects_bad_configuration() {
        assert!(matches!(
            Scene::new(Vec::new(), Vec::new(), Spectrum::default()),
            Err(DrrError::Configuration(_))
        ));
        assert!(matches!(
            Scene::new(
                vec![block(Vec3::ZERO, 1.0, Material::Bone)],
                vec![Priority::ByOrder, Priority::ByOrder],
                Spectrum::default()
            ),
            Err(DrrError::Configuration(_))
        ));
    }

    #[test]
    fn test_single_coverage_ignores_priorities() {
        for priorities in [
            vec![Priority::Explicit(0), Priority::Explicit(1)],
            vec![Priority::Explicit(1), Priority::Explicit(0)],
            vec![Priority::ByOrder, Priority::ByOrder],
        ] {
            let scene = two_overlapping(priorities);
            let only_first = Vec3::new(2.0, 4.0, 4.0);
            let only_second = Vec3::new(12.0, 4.0, 4.0);
            assert_eq!(scene.sample(only_first, InterpolationMode::Linear).unwrap().0, 0);
            assert_eq!(scene.sample(only_second, InterpolationMode::Linear).unwrap().0, 1);
        }
    }

    #[test]
    fn test_lowest_priority_wins_in_overlap() {
        let overlap = Vec3::new(7.0, 4.0, 4.0);

        // Lower-priority volume listed second
        let scene = two_overlapping(vec![Priority::Explicit(1), Priority::Explicit(0)]);
        let (owner, sample) = scene.sample(overlap, InterpolationMode::Linear).unwrap();
        assert_eq!(owner, 1);
        assert!((sample.density - 1.9).abs() < 1e-6);

        // Lower-priority volume listed first
        let scene = two_overlapping(vec![Priority::Explicit(0), Priority::Explicit(1)]);
        let (owner, sample) = scene.sample(overlap, InterpolationMode::Linear).unwrap();
        assert_eq!(owner, 0);
        assert!((sample.density - 1.0).abs() < 1e-6);

        // Unset priorities fall back to list order
        let scene = two_overlapping(vec![Priority::ByOrder, Priority::ByOrder]);
        assert_eq!(scene.owner(overlap), Some(0));
    }

    #[test]
    fn test_swapping_priorities_only_changes_overlap() {
        let a = two_overlapping(vec![Priority::Explicit(0), Priority::Explicit(1)]);
        let b = two_overlapping(vec![Priority::Explicit(1), Priority::Explicit(0)]);

        for x in -2..18 {
            for y in [-1.0, 4.5, 9.0] {
                let point = Vec3::new(x as f32 + 0.25, y, 4.0);
                let in_both = a.volumes()[0].contains(point) && a.volumes()[1].contains(point);
                let sa = a.sample(point, InterpolationMode::Nearest).map(|(_, s)| s);
                let sb = b.sample(point, InterpolationMode::Nearest).map(|(_, s)| s);
                if in_both {
                    assert_ne!(sa, sb, "overlap at {:?} should flip", point);
                } else {
                    assert_eq!(sa, sb, "outside overlap at {:?} should match", point);
                }
            }
        }
    }

    #[test]
    fn test_vacuum_and_ray_extent() {
        let scene = two_overlapping(vec![Priority::ByOrder, Priority::ByOrder]);
        assert!(scene.sample(Vec3::splat(50.0), InterpolationMode::Linear).is_none());
        assert_eq!(scene.owner(Vec3::splat(50.0)), None);

        let through = Ray::new(Vec3::new(-10.0, 4.0, 4.0), Vec3::X);
        let (t0, t1) = scene.ray_extent(&through).unwrap();
        assert!((t0 - 9.5).abs() < 1e-4);
        assert!((t1 - 24.5).abs() < 1e-4);

        let miss = Ray::new(Vec3::new(-10.0, 40.0, 4.0), Vec3::X);
        assert!(scene.ray_extent(&miss).is_none());
    }

    #[test]
    fn test_refresh_poses_tracks_moves() {
        let mut scene = two_overlapping(vec![Priority::ByOrder, Priority::ByOrder]);
        let point = Vec3::new(4.0, 204.0, 4.0);
        assert_eq!(scene.owner(point), None);

        scene
            .volume_mut(0)
            .unwrap()
            .translate(Vec3::new(0.0, 200.0, 0.0))
            .unwrap();
        scene.refresh_poses();
        assert_eq!(scene.owner(point), Some(0));
    }
}
