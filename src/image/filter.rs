//! Spatial filtering: 2D correlation, Sobel operators and the
//! Gaussian-derivative directional gradient.
//!
//! Border handling is reflect-101 (`dcb|abcd|cba`), the edge pixel itself is
//! not repeated.

use crate::error::{GhtError, Result};
use crate::image::loader::{ComplexImage, RealImage};

/// Sobel kernels: derivative [-1, 0, 1] along the axis, smoothing [1, 2, 1]
/// across it.
const SOBEL_X: [f32; 9] = [-1.0, 0.0, 1.0, -2.0, 0.0, 2.0, -1.0, 0.0, 1.0];
const SOBEL_Y: [f32; 9] = [-1.0, -2.0, -1.0, 0.0, 0.0, 0.0, 1.0, 2.0, 1.0];

/// Square, odd-sized, row-major filter kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel {
    pub values: Vec<f32>,
    pub size: usize,
}

impl Kernel {
    pub fn new(size: usize, values: Vec<f32>) -> Result<Self> {
        if size % 2 == 0 || values.len() != size * size {
            return Err(GhtError::invalid(
                "kernel",
                format!("{} values for an odd {}x{} kernel", values.len(), size, size),
            ));
        }
        Ok(Self { values, size })
    }

    #[inline]
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.values[row * self.size + col]
    }

    pub fn transpose(&self) -> Self {
        let n = self.size;
        let values = (0..n)
            .flat_map(|r| (0..n).map(move |c| (r, c)))
            .map(|(r, c)| self.at(c, r))
            .collect();
        Self { values, size: n }
    }

    /// Gaussian-derivative kernel along x.
    ///
    /// Size is `max(3, round(3 * sigma))`, bumped to the next odd number.
    /// The signed kernel is divided by the sum of the unsigned Gaussian
    /// envelope, so it sums to ~0 while its response stays comparable across
    /// sigmas.
    pub fn gaussian_derivative(sigma: f64) -> Result<Self> {
        if !(sigma.is_finite() && sigma > 0.0) {
            return Err(GhtError::invalid(
                "sigma",
                format!("must be positive and finite, got {sigma}"),
            ));
        }

        let mut size = ((3.0 * sigma).round() as usize).max(3);
        if size % 2 == 0 {
            size += 1;
        }
        let half = (size / 2) as f64;

        let mut values = vec![0.0f32; size * size];
        let mut envelope_sum = 0.0f64;
        for i in 0..size {
            for j in 0..size {
                let di = i as f64 - half;
                let dj = j as f64 - half;
                let g = (-0.5 * (di * di + dj * dj) / (sigma * sigma)).exp();
                envelope_sum += g;
                values[i * size + j] = (-dj * g) as f32;
            }
        }
        let norm = envelope_sum as f32;
        values.iter_mut().for_each(|v| *v /= norm);

        Self::new(size, values)
    }
}

#[inline]
fn reflect_101(mut idx: i64, len: i64) -> usize {
    if len == 1 {
        return 0;
    }
    // Loop covers kernels wider than the image.
    loop {
        if idx < 0 {
            idx = -idx;
        } else if idx >= len {
            idx = 2 * len - 2 - idx;
        } else {
            return idx as usize;
        }
    }
}

/// 2D correlation (kernel not flipped) anchored at the kernel centre.
pub fn filter2d(image: &RealImage, kernel: &Kernel) -> RealImage {
    let (w, h) = (image.width as i64, image.height as i64);
    let half = (kernel.size / 2) as i64;
    let mut out = RealImage::new(image.width, image.height);
    if image.is_empty() {
        return out;
    }

    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0f32;
            for ki in 0..kernel.size {
                let sy = reflect_101(y + ki as i64 - half, h);
                let row = image.row(sy as u32);
                for kj in 0..kernel.size {
                    let kv = kernel.at(ki, kj);
                    if kv == 0.0 {
                        continue;
                    }
                    let sx = reflect_101(x + kj as i64 - half, w);
                    acc += row[sx] * kv;
                }
            }
            out.set(x as u32, y as u32, acc);
        }
    }
    out
}

/// Horizontal and vertical 3x3 Sobel derivatives.
pub fn sobel_xy(image: &RealImage) -> Result<(RealImage, RealImage)> {
    let kx = Kernel::new(3, SOBEL_X.to_vec())?;
    let ky = Kernel::new(3, SOBEL_Y.to_vec())?;
    Ok((filter2d(image, &kx), filter2d(image, &ky)))
}

pub fn gradient_magnitude(gx: &RealImage, gy: &RealImage) -> Result<RealImage> {
    if gx.dimensions() != gy.dimensions() {
        return Err(GhtError::DimensionMismatch {
            expected: gx.dimensions(),
            actual: gy.dimensions(),
        });
    }
    Ok(RealImage {
        data: gx
            .data
            .iter()
            .zip(gy.data.iter())
            .map(|(&a, &b)| a.hypot(b))
            .collect(),
        width: gx.width,
        height: gx.height,
    })
}

/// Complex gradient field: the real part is the image correlated with the
/// Gaussian-derivative kernel, the imaginary part with its transpose.
pub fn directional_gradient(image: &RealImage, sigma: f64) -> Result<ComplexImage> {
    let kernel = Kernel::gaussian_derivative(sigma)?;
    let gx = filter2d(image, &kernel);
    let gy = filter2d(image, &kernel.transpose());
    ComplexImage::from_planes(&gx, &gy)
}
