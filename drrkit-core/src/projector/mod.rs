//! DRR projection.
//!
//! The [`Projector`] owns the scene, the C-arm and a CPU compute backend. Rays are cast
//! from the source through every detector pixel, marched through the composited volumes,
//! and converted to spectrum-weighted transmission. Scatter, quantum noise and the
//! negative log transform are applied to the whole image afterwards.
//!
//! The backend is acquired by [`Projector::initialize`] and released by
//! [`Projector::free`]. [`Projector::session`] ties both to a scope:
//!
//! ```
//! use drrkit_core::device::{CArmGeometry, MobileCArm};
//! use drrkit_core::math::Vec3;
//! use drrkit_core::scene::Material;
//! use drrkit_core::volume::Volume;
//! use drrkit_core::{Projector, ProjectorDesc};
//!
//! let volume = Volume::uniform([16, 16, 16], Vec3::splat(2.0), Vec3::ZERO, 1.0, Material::SoftTissue)?;
//! let carm = MobileCArm::with_geometry(
//!     volume.center_in_world(),
//!     CArmGeometry::new().sensor(8, 8, 8.0),
//! )?;
//!
//! let mut projector = Projector::new(vec![volume], None, carm, ProjectorDesc::new().step(0.5).threads(2))?;
//! {
//!     let mut session = projector.session()?;
//!     let image = session.project()?;
//!     assert_eq!(image.shape(), (8, 8));
//! }
//! assert!(!projector.is_initialized());
//! # Ok::<(), drrkit_core::DrrError>(())
//! ```

mod backend;
mod image;
mod integrator;
pub mod noise;
pub mod scatter;

pub use backend::{BLOCK_SIZE, CpuBackend, Launch, LaunchPlan, MAX_LAUNCHES};
pub use image::DrrImage;
pub use scatter::ScatterModel;

use crate::config::ProjectorDesc;
use crate::device::MobileCArm;
use crate::error::{DrrError, Result};
use crate::events::ProjectorEvent;
use crate::scene::{Priority, Scene};
use crate::volume::Volume;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use integrator::RayIntegrator;
use rayon::prelude::*;
use std::ops::{Deref, DerefMut};
use std::time::Instant;

/// Unpolled events kept; beyond this the oldest are discarded.
const EVENT_QUEUE_CAPACITY: usize = 256;

/// Multi-volume DRR projector.
pub struct Projector {
    desc: ProjectorDesc,
    carm: MobileCArm,
    scene: Scene,
    scatter: ScatterModel,

    // Present only between `initialize` and `free`
    backend: Option<CpuBackend>,
    plan: Option<LaunchPlan>,

    event_sender: Sender<ProjectorEvent>,
    event_receiver: Receiver<ProjectorEvent>,
}

impl Projector {
    /// Creates a projector over `volumes`, viewed by `carm`.
    ///
    /// `priorities` gives one value per volume; where volumes overlap, the lowest value
    /// wins and ties go to the earlier volume. `None` uses list order.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `desc` is invalid, `volumes` is empty or
    /// `priorities` does not have one entry per volume.
    pub fn new(
        volumes: Vec<Volume>,
        priorities: Option<&[i32]>,
        carm: MobileCArm,
        desc: ProjectorDesc,
    ) -> Result<Self> {
        desc.validate()?;
        let priorities = Priority::from_values(priorities, volumes.len())?;
        let scene = Scene::new(volumes, priorities, desc.spectrum)?;
        let (event_sender, event_receiver) = crossbeam_channel::bounded(EVENT_QUEUE_CAPACITY);

        log::debug!(
            "Created projector: {} volumes, step {} mm, {} interpolation, spectrum {}",
            scene.volumes().len(),
            desc.step,
            desc.mode,
            desc.spectrum
        );

        Ok(Self {
            desc,
            carm,
            scene,
            scatter: ScatterModel::default(),
            backend: None,
            plan: None,
            event_sender,
            event_receiver,
        })
    }

    /// Acquires the compute backend and builds the launch plan. Calling it again while
    /// initialized does nothing.
    ///
    /// # Errors
    ///
    /// - `ResourceExhausted` if the detector cannot be partitioned with `max_block_index`
    /// - `Device` if the worker pool cannot be created
    pub fn initialize(&mut self) -> Result<()> {
        if self.backend.is_some() {
            return Ok(());
        }

        let geometry = self.carm.geometry();
        let plan = LaunchPlan::new(
            geometry.sensor_width,
            geometry.sensor_height,
            self.desc.max_block_index,
        )?;
        let backend = CpuBackend::acquire(self.desc.threads)?;
        self.scene.refresh_poses();

        log::info!(
            "Projector initialized: {} threads, {} volumes, {} launches",
            backend.threads(),
            self.scene.volumes().len(),
            plan.launches().len()
        );
        self.emit(ProjectorEvent::Initialized {
            threads: backend.threads(),
            volumes: self.scene.volumes().len(),
            launches: plan.launches().len(),
        });

        self.backend = Some(backend);
        self.plan = Some(plan);
        Ok(())
    }

    /// Releases the compute backend. Does nothing if not initialized.
    pub fn free(&mut self) {
        self.plan = None;
        if self.backend.take().is_some() {
            log::info!("Projector freed");
            self.emit(ProjectorEvent::Freed);
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.is_some()
    }

    /// Initializes the projector and returns a guard that frees it when dropped.
    pub fn session(&mut self) -> Result<ProjectorSession<'_>> {
        self.initialize()?;
        Ok(ProjectorSession { projector: self })
    }

    /// Renders one image for the current volume poses and C-arm position.
    ///
    /// # Errors
    ///
    /// - `Device` if called before [`Projector::initialize`]
    /// - `ResourceExhausted` if the detector changed and can no longer be partitioned
    pub fn project(&mut self) -> Result<DrrImage> {
        if self.backend.is_none() {
            return Err(DrrError::Device(
                "project() called before the projector was initialized".into(),
            ));
        }

        let start = Instant::now();
        self.scene.refresh_poses();
        let camera = self.carm.projection();
        let (width, height) = (camera.width, camera.height);

        if !self.plan.as_ref().is_some_and(|plan| plan.fits(width, height)) {
            let plan = LaunchPlan::new(width, height, self.desc.max_block_index)?;
            log::debug!(
                "Rebuilt launch plan for {}x{} detector: {} launches",
                width,
                height,
                plan.launches().len()
            );
            self.emit(ProjectorEvent::PlanRebuilt {
                width,
                height,
                launches: plan.launches().len(),
            });
            self.plan = Some(plan);
        }

        let (Some(backend), Some(plan)) = (self.backend.as_ref(), self.plan.as_ref()) else {
            return Err(DrrError::Device("compute backend is not available".into()));
        };

        let integrator = RayIntegrator::new(&self.scene, self.desc.step, self.desc.mode);
        let mut values = vec![1.0_f32; width * height];
        let launch_count = plan.launches().len();

        for (index, launch) in plan.launches().iter().enumerate() {
            let pixels: Vec<(usize, usize)> = launch.pixels().collect();
            let transmission: Vec<f32> = backend.install(|| {
                pixels
                    .par_iter()
                    .map(|&(col, row)| integrator.transmission(&camera.pixel_ray(col, row)))
                    .collect()
            });

            for (&(col, row), t) in pixels.iter().zip(transmission) {
                values[row * width + col] = t;
            }
            log::debug!(
                "Launch {}/{}: columns {:?}, rows {:?}",
                index + 1,
                launch_count,
                launch.cols,
                launch.rows
            );
        }

        if self.desc.add_scatter {
            self.scatter
                .apply(&mut values, width, height, camera.pixel_size);
        }

        if self.desc.add_noise {
            let (photon_count, seed) = (self.desc.photon_count, self.desc.noise_seed);
            backend.install(|| noise::apply(&mut values, photon_count, seed));
        }

        if self.desc.neglog {
            image::neglog(&mut values);
        } else {
            image::clamp_transmission(&mut values);
        }

        let elapsed = start.elapsed();
        log::info!(
            "Projected {}x{} image in {:.1} ms ({} launches)",
            width,
            height,
            elapsed.as_secs_f64() * 1000.0,
            launch_count
        );
        self.emit(ProjectorEvent::ProjectionCompleted {
            width,
            height,
            launches: launch_count,
            rays: width * height,
            elapsed,
        });

        DrrImage::from_data(width, height, values)
            .ok_or_else(|| DrrError::Device("projected buffer does not match detector".into()))
    }

    pub fn desc(&self) -> &ProjectorDesc {
        &self.desc
    }

    pub fn carm(&self) -> &MobileCArm {
        &self.carm
    }

    /// Mutable C-arm access for repositioning between projections.
    pub fn carm_mut(&mut self) -> &mut MobileCArm {
        &mut self.carm
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Mutable access to one volume. Pose changes take effect on the next projection.
    pub fn volume_mut(&mut self, index: usize) -> Option<&mut Volume> {
        self.scene.volume_mut(index)
    }

    pub fn scatter_model(&self) -> &ScatterModel {
        &self.scatter
    }

    pub fn set_scatter_model(&mut self, scatter: ScatterModel) {
        self.scatter = scatter;
    }

    pub fn launch_plan(&self) -> Option<&LaunchPlan> {
        self.plan.as_ref()
    }

    /// Drains all pending events.
    pub fn poll_events(&self) -> Vec<ProjectorEvent> {
        self.event_receiver.try_iter().collect()
    }

    fn emit(&self, event: ProjectorEvent) {
        let event = match self.event_sender.try_send(event) {
            Ok(()) => return,
            Err(TrySendError::Full(event)) => event,
            Err(TrySendError::Disconnected(_)) => return,
        };

        // Make room by discarding the oldest unpolled event
        if let Ok(dropped) = self.event_receiver.try_recv() {
            log::debug!("Event queue full, dropping oldest event {:?}", dropped);
        }
        if self.event_sender.try_send(event).is_err() {
            log::debug!("Event queue still full, dropping projector event");
        }
    }
}

impl Drop for Projector {
    fn drop(&mut self) {
        self.free();
    }
}

impl std::fmt::Debug for Projector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projector")
            .field("desc", &self.desc)
            .field("carm", &self.carm)
            .field("volumes", &self.scene.volumes().len())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Scope guard returned by [`Projector::session`]. Frees the projector when dropped,
/// including when an error unwinds out of the scope.
pub struct ProjectorSession<'a> {
    projector: &'a mut Projector,
}

impl Deref for ProjectorSession<'_> {
    type Target = Projector;

    fn deref(&self) -> &Projector {
        self.projector
    }
}

impl DerefMut for ProjectorSession<'_> {
    fn deref_mut(&mut self) -> &mut Projector {
        self.projector
    }
}

impl Drop for ProjectorSession<'_> {
    fn drop(&mut self) {
        self.projector.free();
    }
}
