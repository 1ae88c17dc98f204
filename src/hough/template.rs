//! Object template: binary edge mask plus complex orientation field, and its
//! per-hypothesis frequency-domain mask.

use crate::error::{GhtError, Result};
use crate::image::fft::{circ_shift, Fft2d};
use crate::image::filter::{directional_gradient, gradient_magnitude, sobel_xy};
use crate::image::loader::{ComplexImage, RealImage};
use crate::image::warp::rotate_and_scale;
use log::{debug, warn};
use rustfft::num_complex::Complex;

/// Below this L1 energy the warped orientation field is treated as empty.
const MIN_ENERGY: f64 = 1e-12;

/// Immutable template derived once per run from the template image.
#[derive(Debug, Clone)]
pub struct ObjectTemplate {
    binary_mask: RealImage,
    orientation_field: ComplexImage,
}

impl ObjectTemplate {
    /// Builds the template from a grayscale image.
    ///
    /// The edge mask keeps pixels whose Sobel magnitude exceeds
    /// `template_thresh` times the strongest magnitude in the image, so the
    /// mask does not depend on the template's contrast. The orientation field
    /// is the directional gradient of the whole image, independent of the mask.
    pub fn from_image(template: &RealImage, sigma: f64, template_thresh: f32) -> Result<Self> {
        if template.is_empty() {
            return Err(GhtError::invalid("template", "image has no pixels"));
        }

        let (gx, gy) = sobel_xy(template)?;
        let magnitude = gradient_magnitude(&gx, &gy)?;
        let ((max_magnitude, _), _) = magnitude.find_extremes();
        let threshold = template_thresh * max_magnitude;

        let binary_mask = magnitude.map(|m| if m > threshold { 1.0 } else { 0.0 });
        let edge_count = binary_mask.data.iter().filter(|&&v| v > 0.0).count();
        if edge_count == 0 {
            warn!(
                "Template {}x{} has no edges above {:.4} (max magnitude {:.4})",
                template.width, template.height, threshold, max_magnitude
            );
            return Err(GhtError::EmptyTemplate);
        }

        let orientation_field = directional_gradient(template, sigma)?;
        debug!(
            "Object template {}x{}: {} edge pixels (threshold {:.4})",
            template.width, template.height, edge_count, threshold
        );

        Ok(Self {
            binary_mask,
            orientation_field,
        })
    }

    pub fn binary_mask(&self) -> &RealImage {
        &self.binary_mask
    }

    pub fn orientation_field(&self) -> &ComplexImage {
        &self.orientation_field
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.binary_mask.dimensions()
    }

    pub fn edge_count(&self) -> usize {
        self.binary_mask.data.iter().filter(|&&v| v > 0.0).count()
    }

    /// Spatial-domain object mask for one hypothesis on a `width`x`height`
    /// canvas, with the template centre wrapped to the origin.
    ///
    /// A warped template larger than the canvas is an error here; the Hough
    /// space builder turns it into a zero surface.
    pub fn object_mask(
        &self,
        scale: f64,
        angle: f64,
        width: u32,
        height: u32,
    ) -> Result<ComplexImage> {
        let binary = rotate_and_scale(&self.binary_mask, angle, scale)?;
        let mut gradients = rotate_and_scale(&self.orientation_field, angle, scale)?;

        if binary.width > width || binary.height > height {
            return Err(GhtError::TemplateExceedsImage {
                template: binary.dimensions(),
                image: (width, height),
                scale,
                angle,
            });
        }

        // Warping moved the samples; the vectors themselves still point the
        // old way.
        let (sin, cos) = angle.sin_cos();
        let phase = Complex::new(cos as f32, sin as f32);
        gradients.data.iter_mut().for_each(|g| *g *= phase);

        let energy = gradients.l1_energy();
        if energy > MIN_ENERGY {
            let inv = (1.0 / energy) as f32;
            gradients.data.iter_mut().for_each(|g| *g *= inv);
        } else {
            warn!(
                "Zero-energy template at scale {:.3}, angle {:.3} rad; response will be zero",
                scale, angle
            );
        }

        let mut canvas = ComplexImage::new(width, height);
        for y in 0..binary.height {
            for x in 0..binary.width {
                let m = binary.get(x, y);
                if m != 0.0 {
                    canvas.set(x, y, gradients.get(x, y) * m);
                }
            }
        }

        Ok(circ_shift(
            &canvas,
            -((binary.width / 2) as i64),
            -((binary.height / 2) as i64),
        ))
    }

    /// Fourier spectrum of [`Self::object_mask`] on the transform's canvas.
    pub fn fft_object_mask(&self, scale: f64, angle: f64, fft: &Fft2d) -> Result<ComplexImage> {
        let (width, height) = fft.dimensions();
        fft.forward(&self.object_mask(scale, angle, width, height)?)
    }
}
