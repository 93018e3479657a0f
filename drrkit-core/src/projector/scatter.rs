//! Low-frequency scatter estimate.
//!
//! Scatter is approximated by convolving a scatter source map with a wide Gaussian. The
//! source at each pixel is `T · (−ln T)`: zero where nothing attenuates and where
//! everything does, largest in between. Because the kernel is wide, the convolution runs
//! on a downsampled grid and is bilinearly upsampled back to the detector.

/// Target kernel width on the coarse grid, in coarse pixels.
const COARSE_SIGMA: f32 = 4.0;

/// Parameters of the scatter kernel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatterModel {
    /// Scale of the blurred source added to the primary image
    pub fraction: f32,
    /// Gaussian kernel standard deviation at the detector (mm)
    pub sigma_mm: f32,
}

impl Default for ScatterModel {
    fn default() -> Self {
        Self {
            fraction: 0.25,
            sigma_mm: 40.0,
        }
    }
}

impl ScatterModel {
    /// Scatter intensity for each pixel of a `width` × `height` primary transmission map.
    pub fn estimate(
        &self,
        primary: &[f32],
        width: usize,
        height: usize,
        pixel_size: f32,
    ) -> Vec<f32> {
        let source: Vec<f32> = primary
            .iter()
            .map(|&t| {
                let t = t.clamp(0.0, 1.0);
                if t > 0.0 { -t * t.ln() } else { 0.0 }
            })
            .collect();

        let sigma_px = (self.sigma_mm / pixel_size).max(f32::EPSILON);
        let factor = ((sigma_px / COARSE_SIGMA).floor() as usize).max(1);

        let (coarse, cw, ch) = downsample(&source, width, height, factor);
        let blurred = gaussian_blur(&coarse, cw, ch, sigma_px / factor as f32);
        let mut scatter = upsample(&blurred, cw, ch, width, height, factor);

        for value in scatter.iter_mut() {
            *value *= self.fraction;
        }
        scatter
    }

    /// Adds the scatter estimate to `primary` in place.
    pub fn apply(&self, primary: &mut [f32], width: usize, height: usize, pixel_size: f32) {
        let scatter = self.estimate(primary, width, height, pixel_size);
        for (value, s) in primary.iter_mut().zip(scatter) {
            *value += s;
        }
    }
}

/// Box-averages `factor` × `factor` tiles. Partial edge tiles average what they cover.
fn downsample(values: &[f32], width: usize, height: usize, factor: usize) -> (Vec<f32>, usize, usize) {
    let cw = width.div_ceil(factor);
    let ch = height.div_ceil(factor);
    let mut sums = vec![0.0_f32; cw * ch];
    let mut counts = vec![0u32; cw * ch];

    for y in 0..height {
        for x in 0..width {
            let index = (y / factor) * cw + x / factor;
            sums[index] += values[y * width + x];
            counts[index] += 1;
        }
    }

    for (sum, count) in sums.iter_mut().zip(&counts) {
        *sum /= *count as f32;
    }
    (sums, cw, ch)
}

fn gaussian_kernel(sigma: f32, max_radius: usize) -> Vec<f32> {
    let radius = ((3.0 * sigma).ceil() as usize).clamp(1, max_radius.max(1));
    let denom = 2.0 * sigma * sigma;
    (0..=2 * radius)
        .map(|n| {
            let d = n as f32 - radius as f32;
            (-d * d / denom).exp()
        })
        .collect()
}

/// Separable Gaussian blur; weights are renormalized where the kernel leaves the image.
fn gaussian_blur(values: &[f32], width: usize, height: usize, sigma: f32) -> Vec<f32> {
    let kernel = gaussian_kernel(sigma, width.max(height));
    let radius = (kernel.len() / 2) as isize;

    let pass = |input: &[f32], along_x: bool| -> Vec<f32> {
        let mut output = vec![0.0_f32; width * height];
        for y in 0..height {
            for x in 0..width {
                let (mut acc, mut norm) = (0.0_f32, 0.0_f32);
                for (n, weight) in kernel.iter().enumerate() {
                    let offset = n as isize - radius;
                    let (sx, sy) = if along_x {
                        (x as isize + offset, y as isize)
                    } else {
                        (x as isize, y as isize + offset)
                    };
                    if sx < 0 || sy < 0 || sx >= width as isize || sy >= height as isize {
                        continue;
                    }
                    acc += weight * input[sy as usize * width + sx as usize];
                    norm += weight;
                }
                output[y * width + x] = if norm > 0.0 { acc / norm } else { 0.0 };
            }
        }
        output
    };

    let horizontal = pass(values, true);
    pass(&horizontal, false)
}

fn upsample(
    coarse: &[f32],
    cw: usize,
    ch: usize,
    width: usize,
    height: usize,
    factor: usize,
) -> Vec<f32> {
    let coord = |p: usize, n: usize| -> (usize, usize, f32) {
        let c = ((p as f32 + 0.5) / factor as f32 - 0.5).clamp(0.0, (n - 1) as f32);
        let lo = c.floor() as usize;
        (lo, (lo + 1).min(n - 1), c - lo as f32)
    };

    let mut output = Vec::with_capacity(width * height);
    for y in 0..height {
        let (y0, y1, fy) = coord(y, ch);
        for x in 0..width {
            let (x0, x1, fx) = coord(x, cw);
            let top = coarse[y0 * cw + x0] * (1.0 - fx) + coarse[y0 * cw + x1] * fx;
            let bottom = coarse[y1 * cw + x0] * (1.0 - fx) + coarse[y1 * cw + x1] * fx;
            output.push(top * (1.0 - fy) + bottom * fy);
        }
    }
    output
}
