//! Maxima extraction in Hough space.
//!
//! The volume is collapsed to its per-pixel maximum over scales and angles,
//! thresholded relative to the global maximum and reduced to spatial local
//! maxima over the 8-neighbourhood. The volume is then scanned again to
//! recover every `(scale, angle)` cell that produced a surviving peak.

use crate::hough::space::HoughVolume;
use crate::image::loader::RealImage;
use log::debug;
use std::collections::HashMap;

/// Marks suppressed pixels; below any valid response (responses are `>= 0`).
pub const SUPPRESSED: f32 = -1.0;

/// A local maximum of the Hough space in grid coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub scale_index: usize,
    pub angle_index: usize,
    pub x: u32,
    pub y: u32,
    /// Volume value at the cell
    pub response: f32,
}

/// How a volume cell is matched against the surviving projection value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TieMatch {
    /// Bitwise-equal values only. Reliable because the projection is built
    /// from the stored cells, never recomputed.
    #[default]
    Exact,
    /// `|cell - peak| <= eps * peak`
    Relative(f32),
}

impl TieMatch {
    #[inline]
    fn matches(self, cell: f32, peak: f32) -> bool {
        match self {
            TieMatch::Exact => cell == peak,
            TieMatch::Relative(eps) => (cell - peak).abs() <= eps * peak,
        }
    }
}

/// What to do with several hypotheses reported at the same pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Report every matching `(scale, angle)` cell.
    #[default]
    KeepAll,
    /// Keep the strongest cell per `(x, y)`, the first one in scan order on
    /// equal responses.
    StrongestPerLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MaximaOptions {
    pub tie: TieMatch,
    pub duplicates: DuplicatePolicy,
}

/// Spatial non-maximum suppression of a projection.
///
/// A pixel survives when none of its in-bounds 8-neighbours is strictly
/// larger and its value exceeds `obj_thresh` times the global maximum.
/// Survivors keep their value, everything else becomes [`SUPPRESSED`].
pub fn suppress_non_maxima(max_image: &RealImage, obj_thresh: f32) -> RealImage {
    let mut bin = RealImage {
        data: vec![SUPPRESSED; max_image.data.len()],
        width: max_image.width,
        height: max_image.height,
    };
    if max_image.is_empty() {
        return bin;
    }

    let ((global_max, _), _) = max_image.find_extremes();
    let threshold = obj_thresh * global_max;
    let (w, h) = (max_image.width as i64, max_image.height as i64);

    for y in 0..h {
        for x in 0..w {
            let value = max_image.get(x as u32, y as u32);
            if !(value > threshold) {
                continue;
            }

            let mut local_max = true;
            'neighbours: for dy in -1..=1 {
                let ny = y + dy;
                if ny < 0 || ny >= h {
                    continue;
                }
                for dx in -1..=1 {
                    let nx = x + dx;
                    if nx < 0 || nx >= w {
                        continue;
                    }
                    if max_image.get(nx as u32, ny as u32) > value {
                        local_max = false;
                        break 'neighbours;
                    }
                }
            }

            if local_max {
                bin.set(x as u32, y as u32, value);
            }
        }
    }

    bin
}

/// Extracts detections from a Hough volume.
///
/// Output order is the volume scan order: scale, angle, row, column. With
/// [`DuplicatePolicy::KeepAll`], hypotheses tying at one peak are all
/// reported.
pub fn find_hough_maxima(
    volume: &HoughVolume,
    obj_thresh: f32,
    options: &MaximaOptions,
) -> Vec<Detection> {
    let max_image = volume.max_projection();
    let bin = suppress_non_maxima(&max_image, obj_thresh);
    let peaks: Vec<(u32, u32, f32)> = (0..bin.height)
        .flat_map(|y| (0..bin.width).map(move |x| (x, y)))
        .filter_map(|(x, y)| {
            let v = bin.get(x, y);
            (v != SUPPRESSED).then_some((x, y, v))
        })
        .collect();
    debug!("{} spatial peaks survive suppression", peaks.len());

    let mut detections = Vec::new();
    for (scale_index, angle_index, surface) in volume.surfaces() {
        for &(x, y, peak) in &peaks {
            let cell = surface[bin.index(x, y)];
            if options.tie.matches(cell, peak) {
                detections.push(Detection {
                    scale_index,
                    angle_index,
                    x,
                    y,
                    response: cell,
                });
            }
        }
    }

    match options.duplicates {
        DuplicatePolicy::KeepAll => detections,
        DuplicatePolicy::StrongestPerLocation => strongest_per_location(detections),
    }
}

/// Keeps the strongest detection per pixel, in order of first appearance.
fn strongest_per_location(detections: Vec<Detection>) -> Vec<Detection> {
    let mut slot: HashMap<(u32, u32), usize> = HashMap::new();
    let mut kept: Vec<Detection> = Vec::new();
    for d in detections {
        match slot.get(&(d.x, d.y)) {
            Some(&i) => {
                if d.response > kept[i].response {
                    kept[i] = d;
                }
            }
            None => {
                slot.insert((d.x, d.y), kept.len());
                kept.push(d);
            }
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume(
        scale_steps: usize,
        angle_steps: usize,
        w: u32,
        h: u32,
        surfaces: &[&[f32]],
    ) -> HoughVolume {
        let data = surfaces.iter().flat_map(|s| s.iter().copied()).collect();
        HoughVolume::from_vec(scale_steps, angle_steps, w, h, data).unwrap()
    }

    #[test]
    fn test_plateau_survives_and_boundary_is_skipped() {
        #[rustfmt::skip]
        let img = RealImage::from_vec(4, 3, vec![
            9.0, 1.0, 1.0, 1.0,
            1.0, 1.0, 5.0, 5.0,
            1.0, 1.0, 1.0, 1.0,
        ]).unwrap();
        let bin = suppress_non_maxima(&img, 0.3);
        assert_eq!(bin.get(0, 0), 9.0);
        assert_eq!(bin.get(2, 1), 5.0);
        assert_eq!(bin.get(3, 1), 5.0);
        assert_eq!(bin.get(1, 1), SUPPRESSED);
        // 1.0 is below 0.3 * 9
        assert_eq!(bin.get(0, 2), SUPPRESSED);
    }

    #[test]
    fn test_threshold_is_strict() {
        let img = RealImage::from_vec(3, 1, vec![10.0, 0.0, 5.0]).unwrap();
        assert_eq!(suppress_non_maxima(&img, 0.5).get(2, 0), SUPPRESSED);
        assert_eq!(suppress_non_maxima(&img, 0.49).get(2, 0), 5.0);
    }

    #[test]
    fn test_ties_across_hypotheses_are_all_reported() {
        let a: &[f32] = &[0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let b: &[f32] = &[0.0, 2.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.5];
        let c: &[f32] = &[0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        let vol = volume(3, 1, 4, 2, &[a, b, c]);

        let all = find_hough_maxima(&vol, 0.5, &MaximaOptions::default());
        let cells: Vec<_> = all
            .iter()
            .map(|d| (d.scale_index, d.angle_index, d.x, d.y))
            .collect();
        assert_eq!(cells, vec![(0, 0, 1, 0), (1, 0, 1, 0), (1, 0, 3, 1)]);

        let deduped = find_hough_maxima(
            &vol,
            0.5,
            &MaximaOptions {
                duplicates: DuplicatePolicy::StrongestPerLocation,
                ..MaximaOptions::default()
            },
        );
        let cells: Vec<_> = deduped.iter().map(|d| (d.scale_index, d.x, d.y)).collect();
        assert_eq!(cells, vec![(0, 1, 0), (1, 3, 1)]);
    }

    #[test]
    fn test_relative_tie_match() {
        let a: &[f32] = &[0.0, 1.0, 0.0];
        let b: &[f32] = &[0.0, 0.9999, 0.0];
        let vol = volume(1, 2, 3, 1, &[a, b]);

        assert_eq!(find_hough_maxima(&vol, 0.5, &MaximaOptions::default()).len(), 1);
        let relaxed = MaximaOptions {
            tie: TieMatch::Relative(1e-3),
            ..MaximaOptions::default()
        };
        let found = find_hough_maxima(&vol, 0.5, &relaxed);
        assert_eq!(found.len(), 2);
        assert_eq!(found[1].angle_index, 1);

        let strongest = MaximaOptions {
            tie: TieMatch::Relative(1e-3),
            duplicates: DuplicatePolicy::StrongestPerLocation,
        };
        let found = find_hough_maxima(&vol, 0.5, &strongest);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].response, 1.0);
    }

    #[test]
    fn test_count_is_monotone_in_threshold() {
        let (w, h) = (17u32, 13u32);
        let surfaces: Vec<Vec<f32>> = (0..4)
            .map(|k| {
                (0..w * h)
                    .map(|i| (((i * 37 + k * 101) % 97) as f32).sin().abs())
                    .collect()
            })
            .collect();
        let refs: Vec<&[f32]> = surfaces.iter().map(|s| s.as_slice()).collect();
        let vol = volume(2, 2, w, h, &refs);

        let counts: Vec<usize> = [0.1f32, 0.3, 0.5, 0.7, 0.9]
            .iter()
            .map(|&t| find_hough_maxima(&vol, t, &MaximaOptions::default()).len())
            .collect();
        assert!(counts[0] > 0);
        assert!(counts.windows(2).all(|p| p[1] <= p[0]), "{counts:?}");
    }

    #[test]
    fn test_zero_volume_has_no_detections() {
        let vol = HoughVolume::zeros(2, 2, 5, 5);
        assert!(find_hough_maxima(&vol, 0.0, &MaximaOptions::default()).is_empty());
    }
}
