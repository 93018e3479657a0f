use crate::error::{DrrError, Result};
use crate::math::{self, Mat3, Ray, Vec3};

/// Fixed geometry of a C-arm device.
///
/// Defaults follow a typical mobile C-arm with a 1536 × 1536 flat panel.
#[derive(Debug, Clone, PartialEq)]
pub struct CArmGeometry {
    /// Distance from the focal spot to the isocenter (mm)
    pub source_to_isocenter: f32,
    /// Distance from the focal spot to the detector plane (mm)
    pub source_to_detector: f32,
    /// Detector columns
    pub sensor_width: usize,
    /// Detector rows
    pub sensor_height: usize,
    /// Detector pixel pitch (mm)
    pub pixel_size: f32,
    /// Orbital rotation range in degrees
    pub alpha_range: (f32, f32),
    /// Angular rotation range in degrees
    pub beta_range: (f32, f32),
}

impl Default for CArmGeometry {
    fn default() -> Self {
        Self {
            source_to_isocenter: 530.0,
            source_to_detector: 1020.0,
            sensor_width: 1536,
            sensor_height: 1536,
            pixel_size: 0.194,
            alpha_range: (-40.0, 110.0),
            beta_range: (-90.0, 90.0),
        }
    }
}

impl CArmGeometry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the detector resolution and pixel pitch.
    pub fn sensor(mut self, width: usize, height: usize, pixel_size: f32) -> Self {
        self.sensor_width = width;
        self.sensor_height = height;
        self.pixel_size = pixel_size;
        self
    }

    /// Sets the source-to-isocenter and source-to-detector distances.
    pub fn distances(mut self, source_to_isocenter: f32, source_to_detector: f32) -> Self {
        self.source_to_isocenter = source_to_isocenter;
        self.source_to_detector = source_to_detector;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let finite_positive = |v: f32| v.is_finite() && v > 0.0;
        if !finite_positive(self.source_to_isocenter) || !finite_positive(self.source_to_detector)
        {
            return Err(DrrError::InvalidGeometry(
                "C-arm distances must be finite and positive".into(),
            ));
        }
        if self.source_to_isocenter >= self.source_to_detector {
            return Err(DrrError::InvalidGeometry(format!(
                "isocenter ({} mm) must lie between source and detector ({} mm)",
                self.source_to_isocenter, self.source_to_detector
            )));
        }
        if self.sensor_width == 0 || self.sensor_height == 0 {
            return Err(DrrError::Configuration(
                "detector resolution must be non-zero".into(),
            ));
        }
        if !finite_positive(self.pixel_size) {
            return Err(DrrError::InvalidGeometry(
                "detector pixel size must be finite and positive".into(),
            ));
        }
        Ok(())
    }
}

/// Mobile C-arm: a source and flat panel detector orbiting an isocenter.
///
/// At `alpha = beta = 0` the source sits below the isocenter (−z) and the detector above
/// it (+z), with detector columns along +x and rows along +y. `alpha` rotates the arm
/// about the world x axis, `beta` about the world y axis.
///
/// # Example
///
/// ```
/// use drrkit_core::device::{CArmGeometry, MobileCArm};
/// use drrkit_core::math::Vec3;
///
/// let geometry = CArmGeometry::new().sensor(64, 64, 4.0);
/// let carm = MobileCArm::with_geometry(Vec3::new(0.0, 0.0, 100.0), geometry)?;
/// let projection = carm.projection();
/// assert!(projection.source.abs_diff_eq(Vec3::new(0.0, 0.0, -430.0), 1e-3));
/// # Ok::<(), drrkit_core::DrrError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct MobileCArm {
    isocenter: Vec3,
    /// Orbital angle in radians
    alpha: f32,
    /// Angular angle in radians
    beta: f32,
    geometry: CArmGeometry,
}

impl MobileCArm {
    /// Creates a C-arm with default geometry, pointed at `isocenter`.
    pub fn new(isocenter: Vec3) -> Result<Self> {
        Self::with_geometry(isocenter, CArmGeometry::default())
    }

    pub fn with_geometry(isocenter: Vec3, geometry: CArmGeometry) -> Result<Self> {
        math::validate_point(isocenter, "C-arm isocenter")?;
        geometry.validate()?;
        Ok(Self {
            isocenter,
            alpha: 0.0,
            beta: 0.0,
            geometry,
        })
    }

    pub fn isocenter(&self) -> Vec3 {
        self.isocenter
    }

    /// `(alpha, beta)` in degrees.
    pub fn angles(&self) -> (f32, f32) {
        (self.alpha.to_degrees(), self.beta.to_degrees())
    }

    pub fn geometry(&self) -> &CArmGeometry {
        &self.geometry
    }

    /// Moves the isocenter without touching angles or geometry.
    pub fn move_to(&mut self, isocenter: Vec3) -> Result<()> {
        math::validate_point(isocenter, "C-arm isocenter")?;
        self.isocenter = isocenter;
        Ok(())
    }

    /// Shifts the isocenter by `offset`.
    pub fn move_by(&mut self, offset: Vec3) -> Result<()> {
        self.move_to(self.isocenter + offset)
    }

    /// Sets orbit angles in degrees, clamped to the device's range.
    pub fn set_angles(&mut self, alpha: f32, beta: f32) {
        let clamp = |value: f32, (lo, hi): (f32, f32), name: &str| {
            let clamped = if value.is_finite() { value.clamp(lo, hi) } else { 0.0 };
            if clamped != value {
                log::warn!(
                    "C-arm {} of {}° is outside [{}°, {}°], using {}°",
                    name,
                    value,
                    lo,
                    hi,
                    clamped
                );
            }
            clamped
        };

        self.alpha = clamp(alpha, self.geometry.alpha_range, "alpha").to_radians();
        self.beta = clamp(beta, self.geometry.beta_range, "beta").to_radians();
    }

    /// Rotation taking the rest frame of the arm into world space.
    fn orientation(&self) -> Mat3 {
        Mat3::from_rotation_y(self.beta) * Mat3::from_rotation_x(self.alpha)
    }

    /// Source and detector pose for the current isocenter and angles.
    pub fn projection(&self) -> CameraProjection {
        let orientation = self.orientation();
        let principal = orientation * Vec3::Z;
        let source = self.isocenter - principal * self.geometry.source_to_isocenter;

        CameraProjection {
            source,
            detector_center: source + principal * self.geometry.source_to_detector,
            principal,
            u: orientation * Vec3::X,
            v: orientation * Vec3::Y,
            pixel_size: self.geometry.pixel_size,
            width: self.geometry.sensor_width,
            height: self.geometry.sensor_height,
        }
    }
}

/// Source position and detector plane for one projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraProjection {
    pub source: Vec3,
    pub detector_center: Vec3,
    /// Unit direction from source towards the detector center
    pub principal: Vec3,
    /// Unit direction of increasing detector column
    pub u: Vec3,
    /// Unit direction of increasing detector row
    pub v: Vec3,
    pub pixel_size: f32,
    pub width: usize,
    pub height: usize,
}

impl CameraProjection {
    /// World position of the center of detector pixel `(col, row)`.
    pub fn pixel_center(&self, col: usize, row: usize) -> Vec3 {
        let du = (col as f32 + 0.5 - self.width as f32 * 0.5) * self.pixel_size;
        let dv = (row as f32 + 0.5 - self.height as f32 * 0.5) * self.pixel_size;
        self.detector_center + self.u * du + self.v * dv
    }

    /// Ray from the source through the center of pixel `(col, row)`.
    pub fn pixel_ray(&self, col: usize, row: usize) -> Ray {
        Ray::new(self.source, self.pixel_center(col, row) - self.source)
    }

    /// Continuous detector coordinates `(col, row)` where `point` projects, or `None` if the
    /// point is not in front of the source.
    pub fn project_point(&self, point: Vec3) -> Option<(f32, f32)> {
        let offset = point - self.source;
        let depth = offset.dot(self.principal);
        if depth <= 0.0 {
            return None;
        }

        let sdd = (self.detector_center - self.source).dot(self.principal);
        let on_detector = offset * (sdd / depth);
        let col = on_detector.dot(self.u) / self.pixel_size + self.width as f32 * 0.5;
        let row = on_detector.dot(self.v) / self.pixel_size + self.height as f32 * 0.5;
        Some((col, row))
    }
}
