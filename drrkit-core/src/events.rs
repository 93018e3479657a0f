//! Event types emitted by the projector

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ProjectorEvent {
    /// Compute backend acquired and launch plan built
    Initialized {
        threads: usize,
        volumes: usize,
        launches: usize,
    },
    /// One projection finished
    ProjectionCompleted {
        width: usize,
        height: usize,
        launches: usize,
        rays: usize,
        elapsed: Duration,
    },
    /// Launch plan rebuilt because the detector changed between projections
    PlanRebuilt {
        width: usize,
        height: usize,
        launches: usize,
    },
    /// Compute backend released
    Freed,
}

impl ProjectorEvent {
    /// Wall time of a completed projection.
    pub fn elapsed(&self) -> Option<Duration> {
        match self {
            Self::ProjectionCompleted { elapsed, .. } => Some(*elapsed),
            _ => None,
        }
    }

    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::Initialized { .. } | Self::Freed)
    }

    /// Rays cast per second for a completed projection.
    pub fn rays_per_second(&self) -> Option<f64> {
        match self {
            Self::ProjectionCompleted { rays, elapsed, .. } if !elapsed.is_zero() => {
                Some(*rays as f64 / elapsed.as_secs_f64())
            }
            _ => None,
        }
    }
}
