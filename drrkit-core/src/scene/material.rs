//! X-ray material properties for polyenergetic attenuation.
//!
//! Mass attenuation coefficients (total, with coherent scattering) are tabulated at a
//! fixed set of reference energies and interpolated log-log in between.

/// Energies (keV) at which every [`AttenuationCurve`] is tabulated.
pub const REFERENCE_ENERGIES_KEV: [f32; 10] =
    [10.0, 15.0, 20.0, 30.0, 40.0, 50.0, 60.0, 80.0, 100.0, 150.0];

/// Mass attenuation coefficients (cm²/g) of a material across [`REFERENCE_ENERGIES_KEV`].
///
/// # Example
///
/// ```
/// use drrkit_core::scene::AttenuationCurve;
///
/// // Bone attenuates much more strongly than soft tissue at diagnostic energies
/// let bone = AttenuationCurve::BONE.at(50.0);
/// let tissue = AttenuationCurve::SOFT_TISSUE.at(50.0);
/// assert!(bone > tissue);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttenuationCurve {
    /// μ/ρ in cm²/g at each reference energy
    pub coefficients: [f32; 10],

    /// Nominal density in g/cm³
    pub density: f32,
}

impl AttenuationCurve {
    /// Dry air near sea level
    pub const AIR: Self = Self {
        coefficients: [
            5.120, 1.614, 0.7779, 0.3538, 0.2485, 0.2080, 0.1875, 0.1662, 0.1541, 0.1356,
        ],
        density: 0.001205,
    };

    /// ICRU-44 soft tissue
    pub const SOFT_TISSUE: Self = Self {
        coefficients: [
            5.379, 1.701, 0.8200, 0.3780, 0.2683, 0.2266, 0.2052, 0.1831, 0.1702, 0.1500,
        ],
        density: 1.06,
    };

    /// ICRU cortical bone
    pub const BONE: Self = Self {
        coefficients: [
            28.51, 9.032, 4.001, 1.331, 0.6655, 0.4242, 0.3148, 0.2229, 0.1855, 0.1480,
        ],
        density: 1.92,
    };

    /// Iron, for metallic tools and implants
    pub const IRON: Self = Self {
        coefficients: [
            170.6, 57.08, 25.68, 8.176, 3.629, 1.958, 1.205, 0.5952, 0.3717, 0.1964,
        ],
        density: 7.874,
    };

    /// Aluminium, used for tube filtration
    pub const ALUMINIUM: Self = Self {
        coefficients: [
            26.23, 7.955, 3.441, 1.128, 0.5685, 0.3681, 0.2778, 0.2018, 0.1704, 0.1378,
        ],
        density: 2.699,
    };

    /// Mass attenuation coefficient at `energy_kev`, log-log interpolated.
    ///
    /// Energies outside the table are clamped to its ends.
    pub fn at(&self, energy_kev: f32) -> f32 {
        let energies = &REFERENCE_ENERGIES_KEV;
        let last = energies.len() - 1;

        if energy_kev <= energies[0] {
            return self.coefficients[0];
        }
        if energy_kev >= energies[last] {
            return self.coefficients[last];
        }

        let upper = energies
            .iter()
            .position(|&e| e >= energy_kev)
            .unwrap_or(last)
            .max(1);
        let lower = upper - 1;

        let (e0, e1) = (energies[lower].ln(), energies[upper].ln());
        let (m0, m1) = (
            self.coefficients[lower].ln(),
            self.coefficients[upper].ln(),
        );
        let t = (energy_kev.ln() - e0) / (e1 - e0);
        (m0 + t * (m1 - m0)).exp()
    }

    /// Validates that the curve is strictly positive and monotonically non-increasing
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(self.density > 0.0) {
            return Err("Density must be positive");
        }
        if self.coefficients.iter().any(|&c| !(c > 0.0)) {
            return Err("Attenuation coefficients must be positive");
        }
        if self.coefficients.windows(2).any(|w| w[1] > w[0]) {
            return Err("Attenuation coefficients must not increase with energy");
        }
        Ok(())
    }
}

/// Voxel material label.
///
/// Each material maps to one [`AttenuationCurve`]. Labels are stored per voxel and are
/// never interpolated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Material {
    Air = 0,
    #[default]
    SoftTissue = 1,
    Bone = 2,
    Iron = 3,
}

impl Material {
    /// Number of material labels
    pub const COUNT: usize = 4;

    /// Every material, in index order
    pub const ALL: [Material; Self::COUNT] = [
        Material::Air,
        Material::SoftTissue,
        Material::Bone,
        Material::Iron,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Material::Air => "air",
            Material::SoftTissue => "soft tissue",
            Material::Bone => "bone",
            Material::Iron => "iron",
        }
    }

    pub fn curve(self) -> &'static AttenuationCurve {
        match self {
            Material::Air => &AttenuationCurve::AIR,
            Material::SoftTissue => &AttenuationCurve::SOFT_TISSUE,
            Material::Bone => &AttenuationCurve::BONE,
            Material::Iron => &AttenuationCurve::IRON,
        }
    }

    /// Threshold segmentation of a Hounsfield value into air, soft tissue and bone.
    pub fn from_hounsfield(hu: f32) -> Self {
        if hu <= -800.0 {
            Material::Air
        } else if hu <= 350.0 {
            Material::SoftTissue
        } else {
            Material::Bone
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_validation() {
        for material in Material::ALL {
            assert!(material.curve().validate().is_ok(), "{}", material.name());
        }
        assert!(AttenuationCurve::ALUMINIUM.validate().is_ok());

        let increasing = AttenuationCurve {
            coefficients: [1.0, 2.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            density: 1.0,
        };
        assert!(increasing.validate().is_err());
    }

    #[test]
    fn test_curve_interpolation() {
        let bone = AttenuationCurve::BONE;
        // Exact at table points
        assert!((bone.at(30.0) - 1.331).abs() < 1e-4);
        // Between neighbours
        let mid = bone.at(35.0);
        assert!(mid < 1.331 && mid > 0.6655);
        // Clamped outside the table
        assert_eq!(bone.at(1.0), bone.coefficients[0]);
        assert_eq!(bone.at(500.0), bone.coefficients[9]);
    }

    #[test]
    fn test_hounsfield_segmentation() {
        assert_eq!(Material::from_hounsfield(-1000.0), Material::Air);
        assert_eq!(Material::from_hounsfield(-800.0), Material::Air);
        assert_eq!(Material::from_hounsfield(40.0), Material::SoftTissue);
        assert_eq!(Material::from_hounsfield(350.0), Material::SoftTissue);
        assert_eq!(Material::from_hounsfield(1200.0), Material::Bone);
    }

    #[test]
    fn test_material_index_roundtrip() {
        for material in Material::ALL {
            assert_eq!(Material::from_index(material.index() as u8), Some(material));
        }
        assert_eq!(Material::from_index(42), None);
    }
}
