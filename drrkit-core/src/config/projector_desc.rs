use crate::error::{DrrError, Result};
use crate::scene::Spectrum;
use crate::volume::InterpolationMode;

/// Configuration descriptor for a [`Projector`](crate::Projector)
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectorDesc {
    /// Ray-marching step in mm. Smaller is more accurate and slower.
    pub step: f32,
    /// Density reconstruction between voxel centers
    pub mode: InterpolationMode,
    /// Maximum number of detector blocks per axis in a single launch
    pub max_block_index: usize,
    /// Polyenergetic tube spectrum
    pub spectrum: Spectrum,
    /// Photons per pixel for quantum noise simulation
    pub photon_count: u64,
    /// Add the low-frequency scatter estimate to the primary image
    pub add_scatter: bool,
    /// Apply Poisson noise scaled by `photon_count`
    pub add_noise: bool,
    /// Seed for the per-pixel noise generators
    pub noise_seed: u64,
    /// Worker threads used for ray casting
    pub threads: usize,
    /// Output normalized negative log attenuation instead of raw transmission
    pub neglog: bool,
}

impl Default for ProjectorDesc {
    fn default() -> Self {
        Self {
            step: 0.1,
            mode: InterpolationMode::Linear,
            max_block_index: 1024,
            spectrum: Spectrum::Kv90Al40,
            photon_count: 10_000,
            add_scatter: false,
            add_noise: true,
            noise_seed: 0,
            threads: 8,
            neglog: true,
        }
    }
}

impl ProjectorDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: f32) -> Self {
        self.step = step;
        self
    }

    pub fn mode(mut self, mode: InterpolationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn max_block_index(mut self, max_block_index: usize) -> Self {
        self.max_block_index = max_block_index;
        self
    }

    pub fn spectrum(mut self, spectrum: Spectrum) -> Self {
        self.spectrum = spectrum;
        self
    }

    pub fn photon_count(mut self, photon_count: u64) -> Self {
        self.photon_count = photon_count;
        self
    }

    pub fn add_scatter(mut self, enable: bool) -> Self {
        self.add_scatter = enable;
        self
    }

    pub fn add_noise(mut self, enable: bool) -> Self {
        self.add_noise = enable;
        self
    }

    pub fn noise_seed(mut self, seed: u64) -> Self {
        self.noise_seed = seed;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn neglog(mut self, enable: bool) -> Self {
        self.neglog = enable;
        self
    }

    /// Sets the interpolation mode from its name (`"nearest"` or `"linear"`).
    pub fn mode_name(self, name: &str) -> Result<Self> {
        Ok(self.mode(name.parse()?))
    }

    /// Sets the spectrum from its identifier, e.g. `"90KV_AL40"`.
    pub fn spectrum_name(self, name: &str) -> Result<Self> {
        Ok(self.spectrum(name.parse()?))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.step.is_finite() || self.step <= 0.0 {
            return Err(DrrError::Configuration(format!(
                "step must be finite and positive, got {}",
                self.step
            )));
        }
        if self.threads == 0 {
            return Err(DrrError::Configuration(
                "at least one worker thread is required".into(),
            ));
        }
        if self.photon_count == 0 {
            return Err(DrrError::Configuration(
                "photon_count must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_and_names() {
        let desc = ProjectorDesc::new()
            .step(0.5)
            .threads(2)
            .neglog(false)
            .mode_name("nearest")
            .unwrap()
            .spectrum_name("120KV_AL43")
            .unwrap();
        assert_eq!(desc.step, 0.5);
        assert_eq!(desc.threads, 2);
        assert!(!desc.neglog);
        assert_eq!(desc.mode, InterpolationMode::Nearest);
        assert_eq!(desc.spectrum, Spectrum::Kv120Al43);
        assert!(desc.validate().is_ok());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(ProjectorDesc::new().mode_name("cubic").is_err());
        assert!(ProjectorDesc::new().spectrum_name("90KV").is_err());
        for desc in [
            ProjectorDesc::new().step(0.0),
            ProjectorDesc::new().step(f32::NAN),
            ProjectorDesc::new().threads(0),
            ProjectorDesc::new().photon_count(0),
        ] {
            assert!(matches!(desc.validate(), Err(DrrError::Configuration(_))));
        }
    }
}
