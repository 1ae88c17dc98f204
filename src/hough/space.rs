//! Hough space over the joint scale/rotation grid.
//!
//! Every hypothesis correlates the test image's gradient spectrum with the
//! conjugate spectrum of the transformed template. Hypotheses are independent
//! and are evaluated in parallel, each one writing its own slice of the flat
//! volume.

use crate::error::{GhtError, Result};
use crate::hough::maxima::{suppress_non_maxima, Detection};
use crate::hough::params::{HoughParams, Hypothesis};
use crate::hough::template::ObjectTemplate;
use crate::image::fft::{mul_spectrums_conj, Fft2d};
use crate::image::loader::{ComplexImage, RealImage};
use crate::image::warp::warp_size;
use log::{debug, info, warn};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Cooperative cancellation flag, checked before each hypothesis.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Response surfaces for all hypotheses, stored contiguously and indexed by
/// `(scale_index, angle_index, y, x)`.
#[derive(Debug, Clone, PartialEq)]
pub struct HoughVolume {
    data: Vec<f32>,
    scale_steps: usize,
    angle_steps: usize,
    width: u32,
    height: u32,
}

impl HoughVolume {
    pub fn zeros(scale_steps: usize, angle_steps: usize, width: u32, height: u32) -> Self {
        Self {
            data: vec![0.0; scale_steps * angle_steps * (width * height) as usize],
            scale_steps,
            angle_steps,
            width,
            height,
        }
    }

    pub fn from_vec(
        scale_steps: usize,
        angle_steps: usize,
        width: u32,
        height: u32,
        data: Vec<f32>,
    ) -> Result<Self> {
        let expected = scale_steps * angle_steps * (width * height) as usize;
        if data.len() != expected {
            return Err(GhtError::invalid(
                "data",
                format!("volume needs {expected} samples, got {}", data.len()),
            ));
        }
        Ok(Self {
            data,
            scale_steps,
            angle_steps,
            width,
            height,
        })
    }

    pub fn scale_steps(&self) -> usize {
        self.scale_steps
    }

    pub fn angle_steps(&self) -> usize {
        self.angle_steps
    }

    /// Spatial size of each surface.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn area(&self) -> usize {
        (self.width * self.height) as usize
    }

    #[inline]
    pub fn index(&self, scale_index: usize, angle_index: usize, x: u32, y: u32) -> usize {
        ((scale_index * self.angle_steps + angle_index) * self.height as usize + y as usize)
            * self.width as usize
            + x as usize
    }

    #[inline]
    pub fn get(&self, scale_index: usize, angle_index: usize, x: u32, y: u32) -> f32 {
        self.data[self.index(scale_index, angle_index, x, y)]
    }

    pub fn surface(&self, scale_index: usize, angle_index: usize) -> &[f32] {
        let start = (scale_index * self.angle_steps + angle_index) * self.area();
        &self.data[start..start + self.area()]
    }

    pub fn surface_image(&self, scale_index: usize, angle_index: usize) -> RealImage {
        RealImage {
            data: self.surface(scale_index, angle_index).to_vec(),
            width: self.width,
            height: self.height,
        }
    }

    /// Surfaces in storage order: scale outer, angle inner.
    pub fn surfaces(&self) -> impl Iterator<Item = (usize, usize, &[f32])> + '_ {
        let angle_steps = self.angle_steps.max(1);
        self.data
            .chunks_exact(self.area().max(1))
            .enumerate()
            .map(move |(k, s)| (k / angle_steps, k % angle_steps, s))
    }

    /// Per-pixel maximum over all scales and angles, starting from zero.
    pub fn max_projection(&self) -> RealImage {
        let mut projection = RealImage::new(self.width, self.height);
        for (_, _, surface) in self.surfaces() {
            for (p, &v) in projection.data.iter_mut().zip(surface) {
                *p = p.max(v);
            }
        }
        projection
    }

    /// Per-pixel sum over all scales and angles.
    pub fn sum_projection(&self) -> RealImage {
        let mut projection = RealImage::new(self.width, self.height);
        for (_, _, surface) in self.surfaces() {
            for (p, &v) in projection.data.iter_mut().zip(surface) {
                *p += v;
            }
        }
        projection
    }
}

/// Running max projection with the hypothesis that produced each maximum.
///
/// The lowest flat hypothesis index wins ties, whatever order the surfaces
/// arrive in.
#[derive(Debug, Clone)]
pub struct HoughProjection {
    values: RealImage,
    hypothesis: Vec<usize>,
    angle_steps: usize,
}

impl HoughProjection {
    fn new(width: u32, height: u32, angle_steps: usize) -> Self {
        Self {
            values: RealImage::new(width, height),
            hypothesis: vec![usize::MAX; (width * height) as usize],
            angle_steps,
        }
    }

    fn accumulate(&mut self, index: usize, surface: &[f32]) {
        for ((value, best), &v) in self
            .values
            .data
            .iter_mut()
            .zip(self.hypothesis.iter_mut())
            .zip(surface)
        {
            if v > *value || (v == *value && index < *best) {
                *value = v;
                *best = index;
            }
        }
    }

    fn merge(mut self, other: Self) -> Self {
        for ((value, best), (&v, &k)) in self
            .values
            .data
            .iter_mut()
            .zip(self.hypothesis.iter_mut())
            .zip(other.values.data.iter().zip(other.hypothesis.iter()))
        {
            if v > *value || (v == *value && k < *best) {
                *value = v;
                *best = k;
            }
        }
        self
    }

    pub fn values(&self) -> &RealImage {
        &self.values
    }

    /// `(scale_index, angle_index)` of the strongest hypothesis at `(x, y)`.
    pub fn best_hypothesis(&self, x: u32, y: u32) -> Option<(usize, usize)> {
        let k = self.hypothesis[self.values.index(x, y)];
        (k != usize::MAX).then(|| (k / self.angle_steps, k % self.angle_steps))
    }

    /// One detection per spatial peak, labelled with its strongest hypothesis.
    pub fn peaks(&self, obj_thresh: f32) -> Vec<Detection> {
        let suppressed = suppress_non_maxima(&self.values, obj_thresh);
        let mut detections = Vec::new();
        for y in 0..suppressed.height {
            for x in 0..suppressed.width {
                let response = suppressed.get(x, y);
                if response < 0.0 {
                    continue;
                }
                if let Some((scale_index, angle_index)) = self.best_hypothesis(x, y) {
                    detections.push(Detection {
                        scale_index,
                        angle_index,
                        x,
                        y,
                        response,
                    });
                }
            }
        }
        detections
    }
}

/// Computes the Hough space of a test image for a template.
pub struct HoughSpaceBuilder {
    params: HoughParams,
    cancel: Option<CancelToken>,
}

impl HoughSpaceBuilder {
    pub fn new(params: HoughParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            cancel: None,
        })
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn params(&self) -> &HoughParams {
        &self.params
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => Err(GhtError::Cancelled),
            _ => Ok(()),
        }
    }

    fn prepare(
        &self,
        grad_image: &ComplexImage,
        template: &ObjectTemplate,
    ) -> Result<(Fft2d, ComplexImage)> {
        if grad_image.is_empty() {
            return Err(GhtError::invalid("gradient image", "image has no pixels"));
        }
        self.check_any_fits(template, grad_image.dimensions())?;
        let fft = Fft2d::new(grad_image.width, grad_image.height);
        let spectrum = fft.forward(grad_image)?;
        Ok((fft, spectrum))
    }

    /// Fails only when no hypothesis fits the image; single oversized
    /// hypotheses are left as zero surfaces.
    fn check_any_fits(&self, template: &ObjectTemplate, image: (u32, u32)) -> Result<()> {
        let (tw, th) = template.dimensions();
        let fits = |hyp: &Hypothesis| {
            let (w, h) = warp_size(tw, th, hyp.angle, hyp.scale);
            w <= image.0 && h <= image.1
        };
        if self.params.hypotheses().any(|hyp| fits(&hyp)) {
            return Ok(());
        }
        let first = self.params.hypothesis(0);
        Err(GhtError::TemplateExceedsImage {
            template: warp_size(tw, th, first.angle, first.scale),
            image,
            scale: first.scale,
            angle: first.angle,
        })
    }

    /// Correlates one hypothesis and writes `|re|` of the response into `out`.
    fn correlate(
        &self,
        hypothesis: &Hypothesis,
        image_spectrum: &ComplexImage,
        template: &ObjectTemplate,
        fft: &Fft2d,
        out: &mut [f32],
    ) -> Result<()> {
        let object_spectrum =
            match template.fft_object_mask(hypothesis.scale, hypothesis.angle, fft) {
                Ok(spectrum) => spectrum,
                Err(GhtError::TemplateExceedsImage { template, image, .. }) => {
                    warn!(
                        "Template {:?} at scale {:.3}, angle {:.1} deg exceeds the {:?} image; \
                         response will be zero",
                        template,
                        hypothesis.scale,
                        hypothesis.angle.to_degrees(),
                        image
                    );
                    out.fill(0.0);
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
        let product = mul_spectrums_conj(image_spectrum, &object_spectrum)?;
        let correlation = fft.inverse_scaled(product)?;

        // Only the real part carries the correlation; the imaginary residue
        // is numerical.
        for (dst, c) in out.iter_mut().zip(correlation.data.iter()) {
            *dst = c.re.abs();
        }
        Ok(())
    }

    /// Full Hough volume: one response surface per `(scale, angle)`.
    pub fn build(
        &self,
        grad_image: &ComplexImage,
        template: &ObjectTemplate,
    ) -> Result<HoughVolume> {
        let started = Instant::now();
        let (width, height) = grad_image.dimensions();
        let (fft, spectrum) = self.prepare(grad_image, template)?;
        let total = self.params.hypothesis_count();
        info!(
            "Building Hough volume: {} scales x {} angles over {}x{}",
            self.params.scale_steps, self.params.angle_steps, width, height
        );

        let mut volume =
            HoughVolume::zeros(self.params.scale_steps, self.params.angle_steps, width, height);
        let area = volume.area();

        volume
            .data
            .par_chunks_mut(area)
            .enumerate()
            .try_for_each(|(k, slot)| {
                self.check_cancelled()?;
                let hypothesis = self.params.hypothesis(k);
                self.correlate(&hypothesis, &spectrum, template, &fft, slot)?;
                debug!(
                    "Hypothesis {}/{}: scale {:.3}, angle {:.1} deg",
                    k + 1,
                    total,
                    hypothesis.scale,
                    hypothesis.angle.to_degrees()
                );
                Ok::<(), GhtError>(())
            })?;

        info!(
            "Hough volume ready: {} hypotheses in {:.3}ms",
            total,
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(volume)
    }

    /// Streaming variant: keeps only the max projection and its arg-max
    /// hypothesis instead of every surface.
    pub fn build_projection(
        &self,
        grad_image: &ComplexImage,
        template: &ObjectTemplate,
    ) -> Result<HoughProjection> {
        let started = Instant::now();
        let (width, height) = grad_image.dimensions();
        let (fft, spectrum) = self.prepare(grad_image, template)?;
        let angle_steps = self.params.angle_steps;
        let area = (width * height) as usize;

        let projection = (0..self.params.hypothesis_count())
            .into_par_iter()
            .try_fold(
                || (HoughProjection::new(width, height, angle_steps), vec![0.0f32; area]),
                |(mut acc, mut surface), k| {
                    self.check_cancelled()?;
                    let hypothesis = self.params.hypothesis(k);
                    self.correlate(&hypothesis, &spectrum, template, &fft, &mut surface)?;
                    acc.accumulate(k, &surface);
                    Ok::<_, GhtError>((acc, surface))
                },
            )
            .map(|partial| partial.map(|(acc, _)| acc))
            .try_reduce(
                || HoughProjection::new(width, height, angle_steps),
                |a, b| Ok(a.merge(b)),
            )?;

        info!(
            "Hough projection ready: {} hypotheses in {:.3}ms",
            self.params.hypothesis_count(),
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(projection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::filter::directional_gradient;
    use crate::image::loader::TestShape;

    fn scene_with_square() -> (RealImage, RealImage) {
        let templ = RealImage::create_test_template(30, TestShape::Square);
        let mut scene = RealImage::new(120, 140);
        scene.paste(&templ, 35, 55);
        (templ, scene)
    }

    #[test]
    fn test_volume_indexing() {
        let data = (0..2 * 3 * 4 * 5).map(|i| i as f32).collect();
        let volume = HoughVolume::from_vec(2, 3, 4, 5, data).unwrap();
        assert_eq!(volume.get(1, 2, 3, 4), volume.index(1, 2, 3, 4) as f32);
        assert_eq!(volume.surface(1, 0)[0], (3 * 20) as f32);
        let order: Vec<_> = volume.surfaces().map(|(s, a, _)| (s, a)).collect();
        assert_eq!(order, vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]);
        assert!(HoughVolume::from_vec(2, 3, 4, 5, vec![0.0; 7]).is_err());
    }

    #[test]
    fn test_projections() {
        let volume =
            HoughVolume::from_vec(1, 2, 2, 1, vec![1.0, 4.0, 3.0, 2.0]).unwrap();
        assert_eq!(volume.max_projection().data, vec![3.0, 4.0]);
        assert_eq!(volume.sum_projection().data, vec![4.0, 6.0]);
    }

    #[test]
    fn test_peak_at_object_centre() {
        let (templ, scene) = scene_with_square();
        let object = ObjectTemplate::from_image(&templ, 1.0, 0.3).unwrap();
        let grad = directional_gradient(&scene, 1.0).unwrap();

        let builder = HoughSpaceBuilder::new(HoughParams::single(1.0, 0.3, 0.5)).unwrap();
        let volume = builder.build(&grad, &object).unwrap();
        assert_eq!(volume.dimensions(), (120, 140));
        assert_eq!((volume.scale_steps(), volume.angle_steps()), (1, 1));

        let ((_, (x, y)), _) = volume.surface_image(0, 0).find_extremes();
        assert!((x as i64 - 50).abs() <= 1 && (y as i64 - 70).abs() <= 1, "peak at ({x}, {y})");
    }

    #[test]
    fn test_projection_matches_volume() {
        let templ = RealImage::create_test_template(16, TestShape::LShape);
        let scene = crate::image::warp::make_test_image(&templ, 0.5, 1.2, 2.0).unwrap();
        let object = ObjectTemplate::from_image(&templ, 1.0, 0.3).unwrap();
        let grad = directional_gradient(&scene, 1.0).unwrap();
        let params = HoughParams {
            scale_steps: 2,
            scale_range: [1.0, 1.2],
            angle_steps: 3,
            ..HoughParams::synthetic()
        };

        let builder = HoughSpaceBuilder::new(params).unwrap();
        let volume = builder.build(&grad, &object).unwrap();
        let projection = builder.build_projection(&grad, &object).unwrap();

        assert_eq!(projection.values(), &volume.max_projection());
        for (x, y) in [(0u32, 0u32), (31, 31), (20, 40), (63, 10)] {
            let (s, a) = projection.best_hypothesis(x, y).unwrap();
            assert_eq!(volume.get(s, a, x, y), projection.values().get(x, y));
        }
    }

    #[test]
    fn test_oversized_hypothesis_leaves_zero_surface() {
        let templ = RealImage::create_test_template(20, TestShape::SquareOutline);
        let mut scene = RealImage::new(60, 60);
        scene.paste(&templ, 20, 20);
        let object = ObjectTemplate::from_image(&templ, 1.0, 0.3).unwrap();
        let grad = directional_gradient(&scene, 1.0).unwrap();
        let params = HoughParams {
            scale_steps: 4,
            scale_range: [1.0, 4.0],
            ..HoughParams::single(1.0, 0.3, 0.5)
        };

        let builder = HoughSpaceBuilder::new(params).unwrap();
        let volume = builder.build(&grad, &object).unwrap();
        // Scale 4 warps the template to 77x77
        assert!(volume.surface(3, 0).iter().all(|&v| v == 0.0));
        assert!(volume.surface(2, 0).iter().any(|&v| v > 0.0));

        let ((_, (x, y)), _) = volume.surface_image(0, 0).find_extremes();
        assert!((x as i64 - 30).abs() <= 1 && (y as i64 - 30).abs() <= 1, "peak at ({x}, {y})");

        let projection = builder.build_projection(&grad, &object).unwrap();
        assert_eq!(projection.values(), &volume.max_projection());
    }

    #[test]
    fn test_no_fitting_hypothesis_is_an_error() {
        let templ = RealImage::create_test_template(20, TestShape::SquareOutline);
        let object = ObjectTemplate::from_image(&templ, 1.0, 0.3).unwrap();
        let grad = directional_gradient(&RealImage::new(15, 40), 1.0).unwrap();
        let builder = HoughSpaceBuilder::new(HoughParams::single(1.0, 0.3, 0.5)).unwrap();
        assert!(matches!(
            builder.build(&grad, &object),
            Err(GhtError::TemplateExceedsImage { template: (20, 20), image: (15, 40), .. })
        ));
        assert!(matches!(
            builder.build_projection(&grad, &object),
            Err(GhtError::TemplateExceedsImage { .. })
        ));
    }

    #[test]
    fn test_cancelled_build() {
        let (templ, scene) = scene_with_square();
        let object = ObjectTemplate::from_image(&templ, 1.0, 0.3).unwrap();
        let grad = directional_gradient(&scene, 1.0).unwrap();

        let token = CancelToken::new();
        token.cancel();
        let builder = HoughSpaceBuilder::new(HoughParams::single(1.0, 0.3, 0.5))
            .unwrap()
            .with_cancel_token(token.clone());
        assert!(matches!(builder.build(&grad, &object), Err(GhtError::Cancelled)));
        assert!(matches!(
            builder.build_projection(&grad, &object),
            Err(GhtError::Cancelled)
        ));
    }

    #[test]
    fn test_invalid_params_rejected() {
        let params = HoughParams {
            angle_steps: 0,
            ..HoughParams::default()
        };
        assert!(HoughSpaceBuilder::new(params).is_err());
    }
}
