//! Frequency-domain primitives for the Hough correlation.
//!
//! The 2D transform is computed row-wise, transposed, column-wise and
//! transposed back. Plans are built once per image size and shared between
//! worker threads.

use crate::error::{GhtError, Result};
use crate::image::loader::{ComplexImage, Image, Sample};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Planned 2D FFT for a fixed `width`x`height`.
pub struct Fft2d {
    width: usize,
    height: usize,
    row_forward: Arc<dyn Fft<f32>>,
    col_forward: Arc<dyn Fft<f32>>,
    row_inverse: Arc<dyn Fft<f32>>,
    col_inverse: Arc<dyn Fft<f32>>,
}

impl Fft2d {
    pub fn new(width: u32, height: u32) -> Self {
        let mut planner = FftPlanner::new();
        let (width, height) = (width as usize, height as usize);
        Self {
            width,
            height,
            row_forward: planner.plan_fft_forward(width),
            col_forward: planner.plan_fft_forward(height),
            row_inverse: planner.plan_fft_inverse(width),
            col_inverse: planner.plan_fft_inverse(height),
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width as u32, self.height as u32)
    }

    /// Forward 2D DFT.
    pub fn forward(&self, image: &ComplexImage) -> Result<ComplexImage> {
        self.check(image)?;
        let mut data = image.data.clone();
        self.process(&mut data, &self.row_forward, &self.col_forward);
        Ok(Image {
            data,
            width: image.width,
            height: image.height,
        })
    }

    /// Inverse 2D DFT scaled by `1 / (width * height)`.
    pub fn inverse_scaled(&self, spectrum: ComplexImage) -> Result<ComplexImage> {
        self.check(&spectrum)?;
        let ComplexImage {
            mut data,
            width,
            height,
        } = spectrum;
        self.process(&mut data, &self.row_inverse, &self.col_inverse);

        let normalisation = 1.0 / (self.width * self.height) as f32;
        data.iter_mut().for_each(|v| *v *= normalisation);

        Ok(Image {
            data,
            width,
            height,
        })
    }

    fn check(&self, image: &ComplexImage) -> Result<()> {
        if image.dimensions() != self.dimensions() {
            return Err(GhtError::DimensionMismatch {
                expected: self.dimensions(),
                actual: image.dimensions(),
            });
        }
        Ok(())
    }

    fn process(
        &self,
        data: &mut [Complex<f32>],
        row_fft: &Arc<dyn Fft<f32>>,
        col_fft: &Arc<dyn Fft<f32>>,
    ) {
        let (width, height) = (self.width, self.height);
        if width == 0 || height == 0 {
            return;
        }

        // Apply FFT in horizontal direction
        data.chunks_exact_mut(width)
            .for_each(|row| row_fft.process(row));

        // Transpose for vertical processing
        let mut transposed = vec![Complex::new(0.0, 0.0); width * height];
        (0..height)
            .flat_map(|y| (0..width).map(move |x| (y, x)))
            .for_each(|(y, x)| {
                transposed[x * height + y] = data[y * width + x];
            });

        transposed
            .chunks_exact_mut(height)
            .for_each(|col| col_fft.process(col));

        // Transpose back
        (0..height)
            .flat_map(|y| (0..width).map(move |x| (y, x)))
            .for_each(|(y, x)| {
                data[y * width + x] = transposed[x * height + y];
            });
    }
}

/// Wrap-around translation: the sample at `(x, y)` moves to
/// `((x + dx) mod width, (y + dy) mod height)`.
pub fn circ_shift<T: Sample>(image: &Image<T>, dx: i64, dy: i64) -> Image<T> {
    let mut out = Image::new(image.width, image.height);
    if image.is_empty() {
        return out;
    }
    let (w, h) = (image.width as i64, image.height as i64);

    for y in 0..image.height {
        let new_y = (y as i64 + dy).rem_euclid(h) as u32;
        for x in 0..image.width {
            let new_x = (x as i64 + dx).rem_euclid(w) as u32;
            out.set(new_x, new_y, image.get(x, y));
        }
    }
    out
}

/// Element-wise `a * conj(b)`: the spectrum of the cross-correlation of `a`
/// with `b`.
pub fn mul_spectrums_conj(a: &ComplexImage, b: &ComplexImage) -> Result<ComplexImage> {
    if a.dimensions() != b.dimensions() {
        return Err(GhtError::DimensionMismatch {
            expected: a.dimensions(),
            actual: b.dimensions(),
        });
    }
    Ok(Image {
        data: a
            .data
            .iter()
            .zip(b.data.iter())
            .map(|(&x, &y)| x * y.conj())
            .collect(),
        width: a.width,
        height: a.height,
    })
}
