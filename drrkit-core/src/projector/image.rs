/// Offset added before the logarithm so fully attenuated pixels stay finite.
const NEGLOG_EPSILON: f32 = 0.01;

/// A projected image: one `f32` per detector pixel, row-major, values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DrrImage {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl DrrImage {
    /// Wraps row-major pixel data. Returns `None` if `data` does not hold `width * height` values.
    pub fn from_data(width: usize, height: usize, data: Vec<f32>) -> Option<Self> {
        (data.len() == width * height).then_some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// `(rows, cols)`, matching the usual array layout of images.
    pub fn shape(&self) -> (usize, usize) {
        (self.height, self.width)
    }

    pub fn get(&self, col: usize, row: usize) -> Option<f32> {
        (col < self.width && row < self.height).then(|| self.data[row * self.width + col])
    }

    pub fn pixels(&self) -> &[f32] {
        &self.data
    }

    /// `(min, max)` over all pixels, or `None` for an empty image.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        let first = *self.data.first()?;
        Some(
            self.data
                .iter()
                .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v))),
        )
    }

    pub fn mean(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        (self.data.iter().map(|&v| v as f64).sum::<f64>() / self.data.len() as f64) as f32
    }

    /// True if every pixel is finite and inside `[0, 1]`.
    pub fn is_normalized(&self) -> bool {
        self.data
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
    }
}

/// Rescales `values` linearly onto `[0, 1]`. Returns false (and zeroes the values) if
/// they are all equal.
fn normalize(values: &mut [f32]) -> bool {
    let Some(&first) = values.first() else {
        return false;
    };
    let (lo, hi) = values
        .iter()
        .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));

    if !(hi > lo) {
        values.fill(0.0);
        return false;
    }

    let range = hi - lo;
    for v in values.iter_mut() {
        *v = ((*v - lo) / range).clamp(0.0, 1.0);
    }
    true
}

/// Negative log transform of an intensity image, normalized so the most attenuating
/// pixel maps to 1 and the least to 0. A flat image maps to all zeros.
pub(crate) fn neglog(values: &mut [f32]) {
    if !normalize(values) {
        return;
    }
    for v in values.iter_mut() {
        *v = -(*v + NEGLOG_EPSILON).ln();
    }
    normalize(values);
}

/// Clamps raw transmission into `[0, 1]`.
pub(crate) fn clamp_transmission(values: &mut [f32]) {
    for v in values.iter_mut() {
        *v = if v.is_finite() { v.clamp(0.0, 1.0) } else { 0.0 };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_accessors() {
        let image = DrrImage::from_data(3, 2, vec![0.0, 0.1, 0.2, 0.3, 0.4, 0.5]).unwrap();
        assert_eq!(image.shape(), (2, 3));
        assert_eq!(image.get(2, 1), Some(0.5));
        assert_eq!(image.get(3, 0), None);
        assert_eq!(image.min_max(), Some((0.0, 0.5)));
        assert!(image.is_normalized());
        assert!(DrrImage::from_data(3, 3, vec![0.0; 6]).is_none());
    }

    #[test]
    fn test_neglog_orders_by_attenuation() {
        let mut values = vec![1.0, 0.5, 0.05];
        neglog(&mut values);
        assert_eq!(values[0], 0.0);
        assert_eq!(values[2], 1.0);
        assert!(values[1] > 0.0 && values[1] < 1.0);
    }

    #[test]
    fn test_neglog_flat_image() {
        let mut values = vec![0.7; 5];
        neglog(&mut values);
        assert!(values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_clamp_transmission() {
        let mut values = vec![1.2, -0.1, 0.4, f32::NAN];
        clamp_transmission(&mut values);
        assert_eq!(values, vec![1.0, 0.0, 0.4, 0.0]);
    }
}
