//! Priority-based overlap resolution between volumes.

use crate::error::{DrrError, Result};

/// Per-volume precedence. Lower values win where volumes overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    /// An explicit priority value
    Explicit(i32),
    /// Precedence follows the volume's position in the input list
    ByOrder,
}

impl Default for Priority {
    fn default() -> Self {
        Self::ByOrder
    }
}

impl Priority {
    /// Converts optional explicit priorities into one [`Priority`] per volume.
    ///
    /// `None` gives every volume [`Priority::ByOrder`].
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the number of priorities does not match `volume_count`.
    pub fn from_values(priorities: Option<&[i32]>, volume_count: usize) -> Result<Vec<Self>> {
        match priorities {
            None => Ok(vec![Self::ByOrder; volume_count]),
            Some(values) if values.len() == volume_count => {
                Ok(values.iter().copied().map(Self::Explicit).collect())
            }
            Some(values) => Err(DrrError::Configuration(format!(
                "got {} priorities for {} volumes",
                values.len(),
                volume_count
            ))),
        }
    }

    fn resolve(self, list_index: usize) -> i64 {
        match self {
            Self::Explicit(value) => value as i64,
            Self::ByOrder => list_index as i64,
        }
    }
}

/// Resolves which volume is authoritative at a sample point.
///
/// Priorities are resolved once into a precedence ordering; selection then walks the
/// volumes from highest to lowest precedence and returns the first that contains the
/// point.
///
/// # Example
///
/// ```
/// use drrkit_core::scene::{Compositor, Priority};
///
/// // Volume 1 takes precedence over volume 0 even though it comes later in the list
/// let compositor = Compositor::new(&[Priority::Explicit(1), Priority::Explicit(0)]);
/// assert_eq!(compositor.select(|_| true), Some(1));
/// assert_eq!(compositor.select(|index| index == 0), Some(0));
/// assert_eq!(compositor.select(|_| false), None);
/// ```
#[derive(Debug, Clone)]
pub struct Compositor {
    /// Volume indices in precedence order
    ordering: Vec<usize>,
}

impl Compositor {
    pub fn new(priorities: &[Priority]) -> Self {
        let mut ordering: Vec<usize> = (0..priorities.len()).collect();
        // Stable sort keeps list order for equal priorities
        ordering.sort_by_key(|&index| priorities[index].resolve(index));
        Self { ordering }
    }

    /// Volume indices from highest to lowest precedence.
    pub fn ordering(&self) -> &[usize] {
        &self.ordering
    }

    /// Walks volumes in precedence order and returns the first `Some` produced by `f`.
    pub fn select_map<T>(&self, f: impl FnMut(usize) -> Option<T>) -> Option<T> {
        self.ordering.iter().copied().find_map(f)
    }

    /// Returns the highest-precedence volume for which `contains` is true, or `None` for vacuum.
    pub fn select(&self, mut contains: impl FnMut(usize) -> bool) -> Option<usize> {
        self.select_map(|index| contains(index).then_some(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priorities_length_mismatch() {
        let result = Priority::from_values(Some(&[0, 1, 2]), 2);
        assert!(matches!(result, Err(DrrError::Configuration(_))));
    }

    #[test]
    fn test_none_priorities_follow_list_order() {
        let priorities = Priority::from_values(None, 3).unwrap();
        let compositor = Compositor::new(&priorities);
        assert_eq!(compositor.ordering(), &[0, 1, 2]);
        assert_eq!(compositor.select(|index| index >= 1), Some(1));
    }

    #[test]
    fn test_priority_values_override_list_order() {
        let priorities = Priority::from_values(Some(&[1, 0]), 2).unwrap();
        let compositor = Compositor::new(&priorities);
        assert_eq!(compositor.ordering(), &[1, 0]);
        assert_eq!(compositor.select(|_| true), Some(1));
    }

    #[test]
    fn test_ties_broken_by_list_order() {
        let compositor = Compositor::new(&[
            Priority::Explicit(5),
            Priority::Explicit(-3),
            Priority::Explicit(5),
        ]);
        assert_eq!(compositor.ordering(), &[1, 0, 2]);
        assert_eq!(compositor.select(|index| index != 1), Some(0));
    }

    #[test]
    fn test_non_contiguous_priorities() {
        let compositor = Compositor::new(&[
            Priority::Explicit(100),
            Priority::Explicit(-50),
            Priority::Explicit(7),
        ]);
        assert_eq!(compositor.ordering(), &[1, 2, 0]);
        assert_eq!(compositor.select(|index| index != 1), Some(2));
    }

    #[test]
    fn test_single_container_always_wins() {
        let compositor = Compositor::new(&[Priority::Explicit(9), Priority::Explicit(0)]);
        assert_eq!(compositor.select(|index| index == 0), Some(0));
        assert_eq!(compositor.select(|_| false), None);
        assert_eq!(Compositor::new(&[]).select(|_| true), None);
    }

    #[test]
    fn test_select_map_stops_at_first_hit() {
        let compositor = Compositor::new(&[
            Priority::Explicit(2),
            Priority::Explicit(0),
            Priority::Explicit(1),
        ]);
        let mut visited = Vec::new();
        let hit = compositor.select_map(|index| {
            visited.push(index);
            (index != 1).then(|| index * 10)
        });
        assert_eq!(hit, Some(20));
        assert_eq!(visited, vec![1, 2]);
    }
}
