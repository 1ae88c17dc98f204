use crate::error::{GhtError, Result};
use image::{DynamicImage, GenericImageView, GrayImage, ImageBuffer};
use rustfft::num_complex::Complex;
use std::ops::{Add, Mul};
use std::path::Path;

/// Pixel sample stored in an [`Image`].
///
/// Both real samples (masks, magnitudes, Hough responses) and complex samples
/// (gradients, spectra) support the two operations the warper and the
/// filters need: addition and weighting by a real factor.
pub trait Sample: Copy + Default + Send + Sync + Add<Output = Self> + Mul<f32, Output = Self> {}

impl Sample for f32 {}
impl Sample for Complex<f32> {}

#[derive(Debug, Clone, Copy)]
pub enum TestShape {
    Square,
    /// One-pixel outline of [`TestShape::Square`].
    SquareOutline,
    Circle,
    Cross,
    /// Asymmetric "L", useful where rotations must be told apart.
    LShape,
}

/// Represents an extreme value (min/max) and its location (value, (x, y))
pub type Extreme = (f32, (u32, u32));

/// Row-major planar image.
#[derive(Debug, Clone, PartialEq)]
pub struct Image<T> {
    pub data: Vec<T>,
    pub width: u32,
    pub height: u32,
}

pub type RealImage = Image<f32>;
pub type ComplexImage = Image<Complex<f32>>;

impl<T: Sample> Image<T> {
    /// Zero-filled image.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![T::default(); (width * height) as usize],
            width,
            height,
        }
    }

    pub fn from_vec(width: u32, height: u32, data: Vec<T>) -> Result<Self> {
        if data.len() != (width * height) as usize {
            return Err(GhtError::invalid(
                "data",
                format!(
                    "{} samples do not fill a {}x{} image",
                    data.len(),
                    width,
                    height
                ),
            ));
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> T {
        self.data[self.index(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: T) {
        let idx = self.index(x, y);
        self.data[idx] = value;
    }

    pub fn row(&self, y: u32) -> &[T] {
        let start = (y * self.width) as usize;
        &self.data[start..start + self.width as usize]
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn map<U, F>(&self, f: F) -> Image<U>
    where
        F: Fn(T) -> U,
    {
        Image {
            data: self.data.iter().map(|&v| f(v)).collect(),
            width: self.width,
            height: self.height,
        }
    }

    /// Copies `src` into `self` with its top-left corner at `(x0, y0)`.
    /// Parts of `src` falling outside `self` are dropped.
    pub fn paste(&mut self, src: &Image<T>, x0: i64, y0: i64) {
        for sy in 0..src.height {
            let dy = y0 + sy as i64;
            if dy < 0 || dy >= self.height as i64 {
                continue;
            }
            for sx in 0..src.width {
                let dx = x0 + sx as i64;
                if dx < 0 || dx >= self.width as i64 {
                    continue;
                }
                self.set(dx as u32, dy as u32, src.get(sx, sy));
            }
        }
    }
}

impl RealImage {
    /// Load image from file and convert to normalised grayscale data
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let img = image::open(path)?;
        Ok(Self::from_dynamic_image(img))
    }

    /// Convert DynamicImage to grayscale float data in [0, 1]
    pub fn from_dynamic_image(img: DynamicImage) -> Self {
        let (width, height) = img.dimensions();

        let data = match img {
            DynamicImage::ImageLuma8(img) => {
                img.pixels().map(|pixel| pixel[0] as f32 / 255.0).collect()
            }
            DynamicImage::ImageLuma16(img) => {
                img.pixels().map(|pixel| pixel[0] as f32 / 65535.0).collect()
            }
            other => other
                .to_rgb8()
                .pixels()
                .map(|pixel| {
                    (0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32)
                        / 255.0
                })
                .collect(),
        };

        Self {
            data,
            width,
            height,
        }
    }

    pub fn from_gray_image(img: &GrayImage) -> Self {
        Self {
            data: img.pixels().map(|pixel| pixel[0] as f32 / 255.0).collect(),
            width: img.width(),
            height: img.height(),
        }
    }

    /// Synthetic template of `size`x`size` pixels, white shape on black.
    pub fn create_test_template(size: u32, shape: TestShape) -> Self {
        let mut data = vec![0.0; (size * size) as usize];
        let centre = size as f32 / 2.0;

        for y in 0..size {
            for x in 0..size {
                let dx = x as f32 + 0.5 - centre;
                let dy = y as f32 + 0.5 - centre;
                let inside = match shape {
                    TestShape::Square => {
                        let half_size = size as f32 * 0.3;
                        dx.abs() <= half_size && dy.abs() <= half_size
                    }
                    TestShape::SquareOutline => {
                        let half_size = size as f32 * 0.3;
                        let d = dx.abs().max(dy.abs());
                        d <= half_size && d > half_size - 1.0
                    }
                    TestShape::Circle => (dx * dx + dy * dy).sqrt() <= size as f32 * 0.3,
                    TestShape::Cross => {
                        let thickness = size as f32 / 10.0;
                        let arm_length = size as f32 / 3.0;
                        (dx.abs() <= arm_length && dy.abs() <= thickness)
                            || (dy.abs() <= arm_length && dx.abs() <= thickness)
                    }
                    TestShape::LShape => {
                        let lo = size as f32 * 0.2;
                        let hi = size as f32 * 0.8;
                        let bar = size as f32 * 0.2;
                        let fx = x as f32 + 0.5;
                        let fy = y as f32 + 0.5;
                        let vertical = fx >= lo && fx <= lo + bar && fy >= lo && fy <= hi;
                        let horizontal = fy >= hi - bar && fy <= hi && fx >= lo && fx <= hi;
                        vertical || horizontal
                    }
                };
                if inside {
                    data[(y * size + x) as usize] = 1.0;
                }
            }
        }

        Self {
            data,
            width: size,
            height: size,
        }
    }

    /// Finds the largest and smallest values in an image and their locations.
    /// If there are multiple such values then the first in row-major order is returned.
    pub fn find_extremes(&self) -> (Extreme, Extreme) {
        let mut max_val = f32::NEG_INFINITY;
        let mut min_val = f32::INFINITY;
        let mut max_pos = (0u32, 0u32);
        let mut min_pos = (0u32, 0u32);

        for (i, &value) in self.data.iter().enumerate() {
            let y = (i as u32) / self.width;
            let x = (i as u32) % self.width;

            if value > max_val {
                max_val = value;
                max_pos = (x, y);
            }
            if value < min_val {
                min_val = value;
                min_pos = (x, y);
            }
        }

        ((max_val, max_pos), (min_val, min_pos))
    }

    /// Min-max stretch to 8-bit; a constant image maps to black.
    pub fn to_normalized_gray(&self) -> GrayImage {
        let ((max_val, _), (min_val, _)) = self.find_extremes();
        let range = max_val - min_val;
        let mut out = ImageBuffer::new(self.width, self.height);
        for (x, y, pixel) in out.enumerate_pixels_mut() {
            let v = self.data[(y * self.width + x) as usize];
            let byte_val = if range > 0.0 && range.is_finite() {
                ((v - min_val) / range * 255.0).round().clamp(0.0, 255.0) as u8
            } else {
                0
            };
            *pixel = image::Luma([byte_val]);
        }
        out
    }

    /// Save processed image to file, values clamped to [0, 1] (for debugging)
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut img_buffer = ImageBuffer::new(self.width, self.height);

        for (x, y, pixel) in img_buffer.enumerate_pixels_mut() {
            let intensity = self.data[(y * self.width + x) as usize];
            let byte_val = (intensity * 255.0).round().clamp(0.0, 255.0) as u8;
            *pixel = image::Luma([byte_val]);
        }

        img_buffer.save(path)?;
        Ok(())
    }

    /// Save with a min-max stretch, for response surfaces of arbitrary range.
    pub fn save_normalized<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_normalized_gray().save(path)?;
        Ok(())
    }
}

impl ComplexImage {
    pub fn from_planes(re: &RealImage, im: &RealImage) -> Result<Self> {
        if re.dimensions() != im.dimensions() {
            return Err(GhtError::DimensionMismatch {
                expected: re.dimensions(),
                actual: im.dimensions(),
            });
        }
        Ok(Self {
            data: re
                .data
                .iter()
                .zip(im.data.iter())
                .map(|(&r, &i)| Complex::new(r, i))
                .collect(),
            width: re.width,
            height: re.height,
        })
    }

    pub fn re_plane(&self) -> RealImage {
        self.map(|c| c.re)
    }

    pub fn im_plane(&self) -> RealImage {
        self.map(|c| c.im)
    }

    pub fn magnitude(&self) -> RealImage {
        self.map(|c| c.norm())
    }

    /// Sum of per-pixel magnitudes, accumulated in f64.
    pub fn l1_energy(&self) -> f64 {
        self.data.iter().map(|c| c.norm() as f64).sum()
    }
}
