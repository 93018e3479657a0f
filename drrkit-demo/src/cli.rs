use anyhow::{Result, bail};
use clap::Parser;
use drrkit_core::math::{Axis, Vec3, euler_rotation};
use drrkit_core::volume::phantom;
use drrkit_core::{
    CArmGeometry, DrrImage, MobileCArm, Projector, ProjectorDesc, ProjectorEvent,
};

/// Projects two chest phantoms and prints a coarse preview of the radiograph.
#[derive(Parser, Debug, Clone)]
#[command(name = "drrkit-demo", version, about)]
pub struct DemoOptions {
    /// Worker threads
    #[arg(long, default_value_t = 8)]
    pub threads: usize,

    /// Square detector size in pixels
    #[arg(long, value_name = "PX", default_value_t = 128)]
    pub sensor: usize,

    /// Detector pixel pitch in mm
    #[arg(long, value_name = "MM", default_value_t = 1.5)]
    pub pixel_size: f32,

    /// Ray-marching step in mm
    #[arg(long, value_name = "MM", default_value_t = 0.5)]
    pub step: f32,

    /// Interpolation mode (nearest | linear)
    #[arg(long, default_value = "linear")]
    pub mode: String,

    /// Tube spectrum (60KV_AL35 | 90KV_AL40 | 120KV_AL43)
    #[arg(long, default_value = "90KV_AL40")]
    pub spectrum: String,

    /// C-arm alpha and beta in degrees
    #[arg(
        long,
        value_name = "ALPHA,BETA",
        value_delimiter = ',',
        num_args = 2,
        allow_negative_numbers = true,
        default_values_t = [0.0, 0.0]
    )]
    pub angles: Vec<f32>,

    /// Add the scatter estimate
    #[arg(long)]
    pub scatter: bool,

    /// Skip Poisson noise
    #[arg(long)]
    pub no_noise: bool,

    /// Noise seed
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// Output transmission instead of negative log
    #[arg(long)]
    pub raw: bool,
}

impl DemoOptions {
    fn angles(&self) -> Result<(f32, f32)> {
        match self.angles[..] {
            [alpha, beta] => Ok((alpha, beta)),
            _ => bail!("--angles expects <alpha>,<beta>, got {:?}", self.angles),
        }
    }

    fn projector_desc(&self) -> Result<ProjectorDesc> {
        Ok(ProjectorDesc::new()
            .step(self.step)
            .mode_name(&self.mode)?
            .spectrum_name(&self.spectrum)?
            .add_scatter(self.scatter)
            .add_noise(!self.no_noise)
            .noise_seed(self.seed)
            .threads(self.threads)
            .neglog(!self.raw))
    }
}

/// Projects two chest phantoms: one rotated a quarter turn about its own center, one
/// shifted 200 mm along y and given precedence where they overlap.
pub fn run(options: &DemoOptions) -> Result<()> {
    log::info!("=== Building phantoms ===");
    let mut rotated = phantom::chest([96, 96, 80], Vec3::new(3.0, 3.0, 4.0))?;
    let mut shifted = rotated.clone();

    let center = rotated.center_in_world();
    rotated.rotate(euler_rotation(Axis::X, -90.0, true), center)?;
    shifted.translate(Vec3::new(0.0, 200.0, 0.0))?;
    log::info!(
        "Phantom {:?} voxels, rotated copy centered at {:?}, shifted copy at {:?}",
        rotated.dims(),
        rotated.center_in_world(),
        shifted.center_in_world()
    );

    let geometry =
        CArmGeometry::new().sensor(options.sensor, options.sensor, options.pixel_size);
    let mut carm = MobileCArm::with_geometry(center, geometry)?;
    let (alpha, beta) = options.angles()?;
    carm.set_angles(alpha, beta);

    let mut projector = Projector::new(
        vec![rotated, shifted],
        Some(&[1, 0]),
        carm,
        options.projector_desc()?,
    )?;

    log::info!("=== Projecting ===");
    let image = {
        let mut session = projector.session()?;
        session.project()?
    };

    report(&image);
    for event in projector.poll_events() {
        match &event {
            ProjectorEvent::ProjectionCompleted { .. } => {
                if let (Some(elapsed), Some(rate)) = (event.elapsed(), event.rays_per_second()) {
                    log::info!("Projection took {:?} ({:.0} rays/s)", elapsed, rate);
                }
            }
            other => log::debug!("Event: {:?}", other),
        }
    }

    Ok(())
}

fn report(image: &DrrImage) {
    let Some((min, max)) = image.min_max() else {
        log::warn!("Empty image");
        return;
    };
    log::info!(
        "Image {}x{}: min {:.4}, max {:.4}, mean {:.4}",
        image.width(),
        image.height(),
        min,
        max,
        image.mean()
    );

    // Coarse preview, brighter characters for more attenuation
    const RAMP: &[u8] = b" .:-=+*#%@";
    let stride = (image.width().max(image.height()) / 48).max(1);
    for row in (0..image.height()).step_by(stride * 2) {
        let line: String = (0..image.width())
            .step_by(stride)
            .filter_map(|col| image.get(col, row))
            .map(|v| {
                let level = ((v.clamp(0.0, 1.0) * (RAMP.len() - 1) as f32).round()) as usize;
                RAMP[level] as char
            })
            .collect();
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<DemoOptions, clap::Error> {
        DemoOptions::try_parse_from(std::iter::once("drrkit-demo").chain(args.iter().copied()))
    }

    #[test]
    fn test_parse_defaults() {
        let options = parse(&[]).unwrap();
        assert_eq!(options.threads, 8);
        assert_eq!(options.sensor, 128);
        assert_eq!(options.pixel_size, 1.5);
        assert_eq!(options.mode, "linear");
        assert_eq!(options.spectrum, "90KV_AL40");
        assert_eq!(options.angles().unwrap(), (0.0, 0.0));
        assert!(!options.no_noise);
        assert!(!options.raw);
        assert!(options.projector_desc().is_ok());
    }

    #[test]
    fn test_parse_options() {
        let options = parse(&[
            "--threads", "2", "--sensor", "32", "--angles", "10,-5", "--no-noise", "--raw",
        ])
        .unwrap();
        assert_eq!(options.threads, 2);
        assert_eq!(options.sensor, 32);
        assert_eq!(options.angles().unwrap(), (10.0, -5.0));
        assert!(options.no_noise);
        assert!(options.raw);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(parse(&["--bogus"]).is_err());
        assert!(parse(&["--threads"]).is_err());
        assert!(parse(&["--threads", "many"]).is_err());
        assert!(parse(&["--angles", "10"]).is_err());
    }

    #[test]
    fn test_unknown_spectrum_rejected() {
        let options = parse(&["--spectrum", "75KV"]).unwrap();
        assert!(options.projector_desc().is_err());
    }
}
