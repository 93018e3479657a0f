use crate::math::Ray;
use crate::scene::{Material, Scene};
use crate::volume::InterpolationMode;

/// Marches rays through a scene and accumulates per-material line integrals.
pub(crate) struct RayIntegrator<'a> {
    scene: &'a Scene,
    step: f32,
    mode: InterpolationMode,
}

impl<'a> RayIntegrator<'a> {
    pub fn new(scene: &'a Scene, step: f32, mode: InterpolationMode) -> Self {
        Self { scene, step, mode }
    }

    /// Area density (g/cm²) of every material crossed by `ray`.
    ///
    /// Samples sit at the midpoints of `step`-long segments between the first entry into
    /// and the last exit from the scene's volumes.
    pub fn area_densities(&self, ray: &Ray) -> [f32; Material::COUNT] {
        let mut totals = [0.0_f32; Material::COUNT];

        let Some((t_enter, t_exit)) = self.scene.ray_extent(ray) else {
            return totals;
        };

        let steps = ((t_exit - t_enter) / self.step).ceil() as usize;
        for n in 0..steps {
            let t = t_enter + (n as f32 + 0.5) * self.step;
            if let Some((_, sample)) = self.scene.sample(ray.at(t), self.mode) {
                totals[sample.material.index()] += sample.density;
            }
        }

        // Density (g/cm³) times path length (mm -> cm)
        let segment_cm = self.step / 10.0;
        for total in totals.iter_mut() {
            *total *= segment_cm;
        }
        totals
    }

    /// Fraction of detected energy transmitted along `ray`.
    pub fn transmission(&self, ray: &Ray) -> f32 {
        self.scene
            .attenuation()
            .transmission(&self.area_densities(ray))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec3;
    use crate::scene::{Priority, Spectrum};
    use crate::volume::Volume;

    fn slab_scene() -> Scene {
        // 100 mm of water-density soft tissue along x
        let slab = Volume::uniform(
            [100, 10, 10],
            Vec3::ONE,
            Vec3::new(0.5, -4.5, -4.5),
            1.0,
            Material::SoftTissue,
        )
        .unwrap();
        Scene::new(vec![slab], vec![Priority::ByOrder], Spectrum::Kv90Al40).unwrap()
    }

    #[test]
    fn test_line_integral_through_slab() {
        let scene = slab_scene();
        let integrator = RayIntegrator::new(&scene, 0.1, InterpolationMode::Linear);
        let ray = Ray::new(Vec3::new(-50.0, 0.0, 0.0), Vec3::X);
        let totals = integrator.area_densities(&ray);
        // 10 cm at 1 g/cm³
        assert!((totals[Material::SoftTissue.index()] - 10.0).abs() < 0.02);
        assert_eq!(totals[Material::Bone.index()], 0.0);
    }

    #[test]
    fn test_missing_ray_has_full_transmission() {
        let scene = slab_scene();
        let integrator = RayIntegrator::new(&scene, 0.5, InterpolationMode::Nearest);
        let ray = Ray::new(Vec3::new(-50.0, 100.0, 0.0), Vec3::X);
        assert_eq!(integrator.area_densities(&ray), [0.0; Material::COUNT]);
        assert_eq!(integrator.transmission(&ray), 1.0);
    }

    #[test]
    fn test_step_size_converges() {
        let scene = slab_scene();
        let ray = Ray::new(Vec3::new(-50.0, 0.3, -0.2), Vec3::new(1.0, 0.01, 0.0));
        let coarse = RayIntegrator::new(&scene, 1.0, InterpolationMode::Linear).transmission(&ray);
        let fine = RayIntegrator::new(&scene, 0.1, InterpolationMode::Linear).transmission(&ray);
        assert!((coarse - fine).abs() < 0.01);
        assert!(fine > 0.0 && fine < 1.0);
    }
}
