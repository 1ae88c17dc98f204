pub mod fft;
pub mod filter;
pub mod loader;
pub mod warp;

use crate::error::{GhtError, Result};
use crate::hough::detector::ObjectDetection;
use crate::hough::space::HoughVolume;
use crate::hough::template::ObjectTemplate;
use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};

pub use loader::{ComplexImage, Image, RealImage, TestShape};

/// Colour palette for debug annotations
pub struct DebugColors;
impl DebugColors {
    // Strong response relative to the best detection - bright green
    pub const STRONG: Rgb<u8> = Rgb([0, 255, 0]);
    // Good - yellow
    pub const GOOD: Rgb<u8> = Rgb([255, 255, 0]);
    // Fair - orange
    pub const FAIR: Rgb<u8> = Rgb([255, 165, 0]);
    // Weak, and the painted template edges - red
    pub const WEAK: Rgb<u8> = Rgb([255, 0, 0]);
    pub const TEXT: Rgb<u8> = Rgb([255, 255, 255]);
}

fn colour_for(relative: f32) -> Rgb<u8> {
    if relative > 0.9 {
        DebugColors::STRONG
    } else if relative > 0.8 {
        DebugColors::GOOD
    } else if relative > 0.7 {
        DebugColors::FAIR
    } else {
        DebugColors::WEAK
    }
}

/// Loads a TrueType/OpenType font for detection labels.
pub fn load_font<P: AsRef<Path>>(path: P) -> Result<FontVec> {
    let data = std::fs::read(path.as_ref())?;
    FontVec::try_from_vec(data).map_err(|e| {
        GhtError::Other(format!(
            "Failed to load font {}: {}",
            path.as_ref().display(),
            e
        ))
    })
}

/// Draws a box of the warped template size and a crosshair at every
/// detection, plus a text label when a font is given.
pub fn annotate_image_with_detections(
    image: &mut RgbImage,
    detections: &[ObjectDetection],
    template_width: u32,
    template_height: u32,
    font: Option<&FontVec>,
) {
    let best = detections
        .iter()
        .map(|d| d.response)
        .fold(0.0f32, f32::max);
    let scale = PxScale::from(14.0);

    for (index, d) in detections.iter().enumerate() {
        let relative = if best > 0.0 { d.response / best } else { 0.0 };
        let colour = colour_for(relative);

        let (box_w, box_h) =
            warp::warp_size(template_width.max(1), template_height.max(1), d.angle, d.scale);
        let x1 = d.x as i32 - (box_w / 2) as i32;
        let y1 = d.y as i32 - (box_h / 2) as i32;
        draw_hollow_rect_mut(image, Rect::at(x1, y1).of_size(box_w, box_h), colour);

        // Crosshair at the object centre
        let cross_size = 6.min(image.width().min(image.height()) as i32 / 4);
        let (cx, cy) = (d.x as i32, d.y as i32);
        for k in -cross_size..=cross_size {
            put_pixel_clipped(image, cx + k, cy, colour);
            put_pixel_clipped(image, cx, cy + k, colour);
        }

        if let Some(font) = font {
            let text = format!(
                "O{}: s {:.2} @ {:.0}°",
                index + 1,
                d.scale,
                d.angle.to_degrees()
            );
            draw_text_mut(
                image,
                DebugColors::TEXT,
                x1.max(0),
                (y1 - 16).max(0),
                scale,
                font,
                &text,
            );
        }

        log::debug!(
            "Detection annotation: ({}, {}) scale {:.3} angle {:.1}° response {:.4}",
            d.x,
            d.y,
            d.scale,
            d.angle.to_degrees(),
            d.response
        );
    }
}

fn put_pixel_clipped(image: &mut RgbImage, x: i32, y: i32, colour: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, colour);
    }
}

/// Test image with the template's edge mask painted in red at every
/// detection, transformed by the detection's scale and angle.
pub fn paint_detection_masks(
    test_image: &RealImage,
    template: &ObjectTemplate,
    detections: &[ObjectDetection],
) -> Result<RgbImage> {
    let mut rgb = real_image_to_rgb(test_image);
    for d in detections {
        let mask = warp::rotate_and_scale(template.binary_mask(), d.angle, d.scale)?;
        let x0 = d.x as i32 - (mask.width / 2) as i32;
        let y0 = d.y as i32 - (mask.height / 2) as i32;
        for y in 0..mask.height {
            for x in 0..mask.width {
                if mask.get(x, y) > 0.5 {
                    put_pixel_clipped(&mut rgb, x0 + x as i32, y0 + y as i32, DebugColors::WEAK);
                }
            }
        }
    }
    Ok(rgb)
}

/// Grayscale image in `[0, 1]` to RGB, clamping out-of-range samples.
pub fn real_image_to_rgb(image: &RealImage) -> RgbImage {
    let mut rgb_image = RgbImage::new(image.width, image.height);
    for (i, pixel) in rgb_image.pixels_mut().enumerate() {
        let gray = (image.data[i].clamp(0.0, 1.0) * 255.0) as u8;
        *pixel = Rgb([gray, gray, gray]);
    }
    rgb_image
}

/// Sum over all hypotheses, rescaled to `[0, 1]` for display.
pub fn hough_space_image(volume: &HoughVolume) -> RealImage {
    let sum = volume.sum_projection();
    let ((max, _), (min, _)) = sum.find_extremes();
    let range = max - min;
    if range > 0.0 {
        sum.map(|v| (v - min) / range)
    } else {
        sum.map(|_| 0.0)
    }
}

/// Configuration for debug output
#[derive(Debug, Clone)]
pub struct DebugOutputConfig {
    /// Whether debug output should be saved
    pub enabled: bool,
    /// Base directory for saved files
    pub output_dir: Option<PathBuf>,
    /// Font for detection labels; labels are skipped without one
    pub font_path: Option<PathBuf>,
}

impl Default for DebugOutputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: None,
            font_path: None,
        }
    }
}

impl DebugOutputConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    fn resolve(&self, filename: &Path) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.join(filename),
            None => filename.to_path_buf(),
        }
    }

    pub fn load_font(&self) -> Result<Option<FontVec>> {
        self.font_path.as_ref().map(load_font).transpose()
    }
}

/// Saves an annotated image according to `config`. Returns the written path,
/// `None` when output is disabled.
pub fn save_debug_output<P: AsRef<Path>>(
    image: &RgbImage,
    filename: P,
    detection_count: usize,
    processing_time: std::time::Duration,
    config: &DebugOutputConfig,
) -> Result<Option<PathBuf>> {
    if !config.enabled {
        return Ok(None);
    }

    let path = config.resolve(filename.as_ref());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    image.save(&path)?;
    log::info!(
        "Debug output saved: {} with {} detections. Processing time: {:.3}ms",
        path.display(),
        detection_count,
        processing_time.as_secs_f64() * 1000.0
    );
    Ok(Some(path))
}
