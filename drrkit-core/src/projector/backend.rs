use crate::error::{DrrError, Result};

/// Edge length of a detector block in pixels.
pub const BLOCK_SIZE: usize = 16;

/// Upper bound on launches per projection before the partitioning is rejected.
pub const MAX_LAUNCHES: usize = 4096;

/// A rectangular range of detector pixels processed in one launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Launch {
    pub cols: (usize, usize),
    pub rows: (usize, usize),
}

impl Launch {
    pub fn pixel_count(&self) -> usize {
        (self.cols.1 - self.cols.0) * (self.rows.1 - self.rows.0)
    }

    /// `(col, row)` pairs in row-major order.
    pub fn pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (self.rows.0..self.rows.1)
            .flat_map(move |row| (self.cols.0..self.cols.1).map(move |col| (col, row)))
    }
}

/// Partition of the detector into launches of at most `max_block_index` blocks per axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    width: usize,
    height: usize,
    max_block_index: usize,
    launches: Vec<Launch>,
}

impl LaunchPlan {
    /// # Errors
    ///
    /// Returns `ResourceExhausted` if `max_block_index` is zero or the detector would need
    /// more than [`MAX_LAUNCHES`] launches.
    pub fn new(width: usize, height: usize, max_block_index: usize) -> Result<Self> {
        if max_block_index == 0 {
            return Err(DrrError::ResourceExhausted(
                "max_block_index must allow at least one block per launch".into(),
            ));
        }

        let blocks_x = width.div_ceil(BLOCK_SIZE);
        let blocks_y = height.div_ceil(BLOCK_SIZE);
        let launches_x = blocks_x.div_ceil(max_block_index);
        let launches_y = blocks_y.div_ceil(max_block_index);
        let launch_count = launches_x.saturating_mul(launches_y);

        if launch_count > MAX_LAUNCHES {
            return Err(DrrError::ResourceExhausted(format!(
                "a {}x{} detector needs {} launches with max_block_index {} (limit {})",
                width, height, launch_count, max_block_index, MAX_LAUNCHES
            )));
        }

        // Large block limits mean a single launch spans the whole axis
        let span = max_block_index.saturating_mul(BLOCK_SIZE);
        let mut launches = Vec::with_capacity(launch_count);
        for ly in 0..launches_y {
            for lx in 0..launches_x {
                launches.push(Launch {
                    cols: (lx * span, (lx + 1).saturating_mul(span).min(width)),
                    rows: (ly * span, (ly + 1).saturating_mul(span).min(height)),
                });
            }
        }

        Ok(Self {
            width,
            height,
            max_block_index,
            launches,
        })
    }

    pub fn launches(&self) -> &[Launch] {
        &self.launches
    }

    pub fn max_block_index(&self) -> usize {
        self.max_block_index
    }

    /// Returns true if the plan was built for a `width` × `height` detector.
    pub fn fits(&self, width: usize, height: usize) -> bool {
        self.width == width && self.height == height
    }
}

/// CPU compute backend: a dedicated worker pool sized by the projector's `threads`.
pub struct CpuBackend {
    pool: rayon::ThreadPool,
}

impl CpuBackend {
    /// # Errors
    ///
    /// Returns a device error if the worker pool cannot be created.
    pub fn acquire(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("drrkit-worker-{}", index))
            .build()
            .map_err(|e| DrrError::Device(format!("Failed to build worker pool: {}", e)))?;

        log::debug!("Acquired CPU backend with {} workers", pool.current_num_threads());
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `op` inside the worker pool so rayon parallel iterators use its workers.
    pub fn install<OP, R>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }
}

impl std::fmt::Debug for CpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuBackend")
            .field("threads", &self.threads())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_max_block_index() {
        assert!(matches!(
            LaunchPlan::new(64, 64, 0),
            Err(DrrError::ResourceExhausted(_))
        ));
    }

    #[test]
    fn test_too_many_launches() {
        // 4096 x 4096 detector = 256 x 256 blocks, one block per launch
        assert!(matches!(
            LaunchPlan::new(4096, 4096, 1),
            Err(DrrError::ResourceExhausted(_))
        ));
        assert!(LaunchPlan::new(4096, 4096, 4).is_ok());
    }

    #[test]
    fn test_unbounded_max_block_index() {
        let plan = LaunchPlan::new(64, 48, usize::MAX).unwrap();
        assert_eq!(
            plan.launches(),
            &[Launch {
                cols: (0, 64),
                rows: (0, 48)
            }]
        );
        assert_eq!(plan.max_block_index(), usize::MAX);
    }

    #[test]
    fn test_launches_cover_detector_once() {
        let (width, height) = (70, 37);
        let plan = LaunchPlan::new(width, height, 2).unwrap();
        assert_eq!(plan.launches().len(), 3 * 2);
        assert!(plan.fits(width, height));

        let mut hits = vec![0u8; width * height];
        for launch in plan.launches() {
            for (col, row) in launch.pixels() {
                hits[row * width + col] += 1;
            }
        }
        assert!(hits.iter().all(|&h| h == 1));

        let total: usize = plan.launches().iter().map(Launch::pixel_count).sum();
        assert_eq!(total, width * height);
    }

    #[test]
    fn test_backend_acquire() {
        let backend = CpuBackend::acquire(2).unwrap();
        assert_eq!(backend.threads(), 2);
        assert_eq!(backend.install(|| rayon::current_num_threads()), 2);
    }
}
