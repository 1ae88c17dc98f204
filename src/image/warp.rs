//! Rotation and uniform scaling about the image centre.
//!
//! Coordinates are pixel centres: an image of width `w` spans `0..=w-1`, its
//! centre is `(w-1)/2`. The output canvas is just large enough for the four
//! transformed corners, so a zero angle at unit scale returns the input
//! unchanged.

use crate::error::{GhtError, Result};
use crate::image::loader::{Image, RealImage, Sample};
use nalgebra::{Matrix3, Vector3};

const EPS: f64 = 1e-9;
/// Absorbs round-off in the corner projection before the canvas size is
/// truncated (e.g. cos(pi/2) != 0).
const EXTENT_SLACK: f64 = 1e-6;

fn translation(tx: f64, ty: f64) -> Matrix3<f64> {
    Matrix3::new(1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0)
}

/// Homography and canvas size for rotating by `angle` (radians) and scaling
/// by `scale` about the centre of a `width`x`height` image.
///
/// `H = T_canvas * R * S * T_origin`
pub fn rotation_scale_homography(
    width: u32,
    height: u32,
    angle: f64,
    scale: f64,
) -> (Matrix3<f64>, u32, u32) {
    let cx = (width as f64 - 1.0) / 2.0;
    let cy = (height as f64 - 1.0) / 2.0;

    let to_origin = translation(-cx, -cy);
    let (sin, cos) = angle.sin_cos();
    let rotate = Matrix3::new(cos, -sin, 0.0, sin, cos, 0.0, 0.0, 0.0, 1.0);
    let scale_m = Matrix3::new(scale, 0.0, 0.0, 0.0, scale, 0.0, 0.0, 0.0, 1.0);
    let h = rotate * scale_m * to_origin;

    let (x_max, y_max) = ((width as f64 - 1.0).max(0.0), (height as f64 - 1.0).max(0.0));
    let corners = [(0.0, 0.0), (x_max, 0.0), (0.0, y_max), (x_max, y_max)];

    let (mut x_start, mut x_end) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y_start, mut y_end) = (f64::INFINITY, f64::NEG_INFINITY);
    for (x, y) in corners {
        let p = h * Vector3::new(x, y, 1.0);
        let (px, py) = (p[0] / p[2], p[1] / p[2]);
        x_start = x_start.min(px);
        x_end = x_end.max(px);
        y_start = y_start.min(py);
        y_end = y_end.max(py);
    }

    let out_w = ((x_end - x_start + EXTENT_SLACK).floor() as u32) + 1;
    let out_h = ((y_end - y_start + EXTENT_SLACK).floor() as u32) + 1;

    // The transformed content is symmetric about the origin; move its centre
    // to the canvas centre.
    let to_canvas = translation((out_w as f64 - 1.0) / 2.0, (out_h as f64 - 1.0) / 2.0);
    (to_canvas * h, out_w, out_h)
}

/// Output canvas size of [`rotate_and_scale`]; independent of pixel content.
pub fn warp_size(width: u32, height: u32, angle: f64, scale: f64) -> (u32, u32) {
    let (_, w, h) = rotation_scale_homography(width, height, angle, scale);
    (w, h)
}

/// Maps `image` through `h` into a `width`x`height` canvas with bilinear
/// sampling; samples outside the source read as zero.
pub fn warp_perspective<T: Sample>(
    image: &Image<T>,
    h: &Matrix3<f64>,
    width: u32,
    height: u32,
) -> Result<Image<T>> {
    let inverse = h
        .try_inverse()
        .ok_or_else(|| GhtError::invalid("homography", "transform is singular"))?;

    let mut out = Image::new(width, height);
    let (src_w, src_h) = (image.width as i64, image.height as i64);

    for y in 0..height {
        for x in 0..width {
            let v = inverse * Vector3::new(x as f64, y as f64, 1.0);
            if v[2].abs() <= EPS {
                continue;
            }
            let sx = v[0] / v[2];
            let sy = v[1] / v[2];
            if !(sx > -1.0 && sy > -1.0 && sx < src_w as f64 && sy < src_h as f64) {
                continue;
            }

            let x0 = sx.floor();
            let y0 = sy.floor();
            let fx = (sx - x0) as f32;
            let fy = (sy - y0) as f32;
            let (x0, y0) = (x0 as i64, y0 as i64);

            let taps = [
                (x0, y0, (1.0 - fx) * (1.0 - fy)),
                (x0 + 1, y0, fx * (1.0 - fy)),
                (x0, y0 + 1, (1.0 - fx) * fy),
                (x0 + 1, y0 + 1, fx * fy),
            ];

            let mut acc = T::default();
            for (tx, ty, weight) in taps {
                if weight == 0.0 || tx < 0 || ty < 0 || tx >= src_w || ty >= src_h {
                    continue;
                }
                acc = acc + image.get(tx as u32, ty as u32) * weight;
            }
            out.set(x, y, acc);
        }
    }

    Ok(out)
}

/// Rotates by `angle` (radians) and scales by `scale` about the centre,
/// on an auto-sized canvas.
pub fn rotate_and_scale<T: Sample>(image: &Image<T>, angle: f64, scale: f64) -> Result<Image<T>> {
    if !(scale.is_finite() && scale > 0.0) || !angle.is_finite() {
        return Err(GhtError::invalid(
            "scale",
            format!("needs a positive scale and finite angle, got {scale} and {angle}"),
        ));
    }
    let (h, width, height) = rotation_scale_homography(image.width, image.height, angle, scale);
    warp_perspective(image, &h, width, height)
}

/// Synthetic scene: the template rotated and scaled, centred on a black canvas
/// of `2 * scale_max` times the template size.
pub fn make_test_image(
    template: &RealImage,
    angle: f64,
    scale: f64,
    scale_max: f64,
) -> Result<RealImage> {
    let small = rotate_and_scale(template, angle, scale)?;

    let width = (template.width as f64 * scale_max * 2.0) as u32;
    let height = (template.height as f64 * scale_max * 2.0) as u32;
    let mut test_image = RealImage::new(width, height);

    let x0 = (width as i64 - small.width as i64).div_euclid(2);
    let y0 = (height as i64 - small.height as i64).div_euclid(2);
    test_image.paste(&small, x0, y0);

    Ok(test_image)
}
