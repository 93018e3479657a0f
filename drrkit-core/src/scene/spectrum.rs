//! Polyenergetic X-ray spectra and spectrum-resolved attenuation tables.

use crate::error::{DrrError, Result};
use crate::scene::material::{AttenuationCurve, Material};
use std::fmt;
use std::str::FromStr;

/// Lowest energy bin (keV). Photons below this are fully absorbed by tube filtration.
const MIN_ENERGY_KEV: f32 = 10.0;

/// Width of each energy bin (keV).
const BIN_WIDTH_KEV: f32 = 1.0;

/// Named tube spectrum: peak voltage plus aluminium filtration.
///
/// Parsed from identifiers such as `"90KV_AL40"` (90 kVp, 4.0 mm Al).
///
/// ```
/// use drrkit_core::scene::Spectrum;
///
/// let spectrum: Spectrum = "90KV_AL40".parse().unwrap();
/// assert_eq!(spectrum, Spectrum::Kv90Al40);
/// assert_eq!(spectrum.peak_kv(), 90.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Spectrum {
    Kv60Al35,
    #[default]
    Kv90Al40,
    Kv120Al43,
}

impl Spectrum {
    pub const ALL: [Spectrum; 3] = [Spectrum::Kv60Al35, Spectrum::Kv90Al40, Spectrum::Kv120Al43];

    pub fn name(self) -> &'static str {
        match self {
            Spectrum::Kv60Al35 => "60KV_AL35",
            Spectrum::Kv90Al40 => "90KV_AL40",
            Spectrum::Kv120Al43 => "120KV_AL43",
        }
    }

    /// Tube peak voltage in kV
    pub fn peak_kv(self) -> f32 {
        match self {
            Spectrum::Kv60Al35 => 60.0,
            Spectrum::Kv90Al40 => 90.0,
            Spectrum::Kv120Al43 => 120.0,
        }
    }

    /// Aluminium filtration in millimetres
    pub fn aluminium_mm(self) -> f32 {
        match self {
            Spectrum::Kv60Al35 => 3.5,
            Spectrum::Kv90Al40 => 4.0,
            Spectrum::Kv120Al43 => 4.3,
        }
    }

    /// Energy bins as `(energy_kev, weight)` pairs; weights sum to one.
    ///
    /// Photon counts follow Kramers' law, `N(E) ∝ (kVp − E) / E`, attenuated by the
    /// aluminium filter. Each bin is then weighted by its energy, as seen by an
    /// energy-integrating detector.
    pub fn bins(self) -> Vec<(f32, f32)> {
        let kvp = self.peak_kv();
        let filter_cm = self.aluminium_mm() / 10.0;
        let aluminium = AttenuationCurve::ALUMINIUM;

        let mut bins = Vec::new();
        let mut energy = MIN_ENERGY_KEV + 0.5 * BIN_WIDTH_KEV;
        while energy < kvp {
            let photons = (kvp - energy) / energy;
            let filtered = photons * (-aluminium.at(energy) * aluminium.density * filter_cm).exp();
            bins.push((energy, filtered * energy));
            energy += BIN_WIDTH_KEV;
        }

        let total: f32 = bins.iter().map(|(_, w)| w).sum();
        for (_, weight) in bins.iter_mut() {
            *weight /= total;
        }
        bins
    }

    /// Energy-weighted mean of the spectrum in keV.
    pub fn mean_energy(self) -> f32 {
        self.bins().iter().map(|(e, w)| e * w).sum()
    }
}

impl fmt::Display for Spectrum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Spectrum {
    type Err = DrrError;

    fn from_str(s: &str) -> Result<Self> {
        let upper = s.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|spectrum| spectrum.name() == upper)
            .ok_or_else(|| {
                DrrError::Configuration(format!(
                    "unknown spectrum '{}', expected one of 60KV_AL35, 90KV_AL40, 120KV_AL43",
                    s
                ))
            })
    }
}

/// Mass attenuation of every material resolved at every bin of one spectrum.
///
/// Built once per scene so per-ray work is a small dot product per bin.
#[derive(Debug, Clone)]
pub struct AttenuationTable {
    spectrum: Spectrum,
    weights: Vec<f32>,
    /// `mass_attenuation[material][bin]` in cm²/g
    mass_attenuation: [Vec<f32>; Material::COUNT],
}

impl AttenuationTable {
    pub fn new(spectrum: Spectrum) -> Self {
        let bins = spectrum.bins();
        let weights = bins.iter().map(|&(_, w)| w).collect();
        let mass_attenuation = Material::ALL.map(|material| {
            let curve = material.curve();
            bins.iter().map(|&(energy, _)| curve.at(energy)).collect::<Vec<f32>>()
        });

        Self {
            spectrum,
            weights,
            mass_attenuation,
        }
    }

    pub fn spectrum(&self) -> Spectrum {
        self.spectrum
    }

    /// Fraction of detected energy surviving the given per-material area densities (g/cm²).
    pub fn transmission(&self, area_density: &[f32; Material::COUNT]) -> f32 {
        if area_density.iter().all(|&d| d == 0.0) {
            return 1.0;
        }

        self.weights
            .iter()
            .enumerate()
            .map(|(bin, weight)| {
                let exponent: f32 = area_density
                    .iter()
                    .zip(self.mass_attenuation.iter())
                    .map(|(density, mu)| density * mu[bin])
                    .sum();
                weight * (-exponent).exp()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spectrum_parse() {
        assert_eq!("90KV_AL40".parse::<Spectrum>().unwrap(), Spectrum::Kv90Al40);
        assert_eq!("60kv_al35".parse::<Spectrum>().unwrap(), Spectrum::Kv60Al35);
        assert!(matches!(
            "80KV_AL10".parse::<Spectrum>(),
            Err(DrrError::Configuration(_))
        ));
    }

    #[test]
    fn test_spectrum_bins_normalized() {
        for spectrum in Spectrum::ALL {
            let bins = spectrum.bins();
            let total: f32 = bins.iter().map(|(_, w)| w).sum();
            assert!((total - 1.0).abs() < 1e-4, "{}", spectrum);
            assert!(bins.iter().all(|&(e, w)| e < spectrum.peak_kv() && w >= 0.0));
        }
    }

    #[test]
    fn test_higher_voltage_is_harder() {
        assert!(Spectrum::Kv120Al43.mean_energy() > Spectrum::Kv90Al40.mean_energy());
        assert!(Spectrum::Kv90Al40.mean_energy() > Spectrum::Kv60Al35.mean_energy());
    }

    #[test]
    fn test_transmission() {
        let table = AttenuationTable::new(Spectrum::Kv90Al40);
        let vacuum = [0.0; Material::COUNT];
        assert_eq!(table.transmission(&vacuum), 1.0);

        let mut tissue = [0.0; Material::COUNT];
        tissue[Material::SoftTissue.index()] = 20.0;
        let mut bone = [0.0; Material::COUNT];
        bone[Material::Bone.index()] = 20.0;

        let t_tissue = table.transmission(&tissue);
        let t_bone = table.transmission(&bone);
        assert!(t_tissue > 0.0 && t_tissue < 1.0);
        assert!(t_bone < t_tissue);
    }
}
