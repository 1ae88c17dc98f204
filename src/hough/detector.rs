//! End-to-end detection pipeline.

use crate::error::Result;
use crate::hough::maxima::{find_hough_maxima, Detection, MaximaOptions};
use crate::hough::params::HoughParams;
use crate::hough::space::{CancelToken, HoughSpaceBuilder, HoughVolume};
use crate::hough::template::ObjectTemplate;
use crate::image::filter::directional_gradient;
use crate::image::loader::RealImage;
use log::{debug, info};
use std::time::{Duration, Instant};

/// A detected object in physical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectDetection {
    /// Column of the object centre in the test image
    pub x: u32,
    /// Row of the object centre in the test image
    pub y: u32,
    pub scale: f64,
    /// Rotation in radians
    pub angle: f64,
    pub response: f32,
    pub scale_index: usize,
    pub angle_index: usize,
}

/// Output of [`GeneralizedHough::process`].
#[derive(Debug, Clone)]
pub struct HoughResult {
    pub detections: Vec<ObjectDetection>,
    pub volume: HoughVolume,
    pub template: ObjectTemplate,
    pub processing_time: Duration,
}

/// Generalized Hough Transform detector over a scale/rotation grid.
#[derive(Debug, Clone)]
pub struct GeneralizedHough {
    params: HoughParams,
    maxima: MaximaOptions,
    cancel: Option<CancelToken>,
}

impl GeneralizedHough {
    pub fn new(params: HoughParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            maxima: MaximaOptions::default(),
            cancel: None,
        })
    }

    pub fn with_maxima_options(mut self, options: MaximaOptions) -> Self {
        self.maxima = options;
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn params(&self) -> &HoughParams {
        &self.params
    }

    pub fn maxima_options(&self) -> &MaximaOptions {
        &self.maxima
    }

    fn space_builder(&self) -> Result<HoughSpaceBuilder> {
        let builder = HoughSpaceBuilder::new(self.params.clone())?;
        Ok(match &self.cancel {
            Some(token) => builder.with_cancel_token(token.clone()),
            None => builder,
        })
    }

    pub fn build_template(&self, template_image: &RealImage) -> Result<ObjectTemplate> {
        ObjectTemplate::from_image(
            template_image,
            self.params.sigma,
            self.params.template_thresh,
        )
    }

    /// Runs the full pipeline and keeps the Hough volume for inspection.
    pub fn process(
        &self,
        template_image: &RealImage,
        test_image: &RealImage,
    ) -> Result<HoughResult> {
        let template = self.build_template(template_image)?;
        self.process_with_template(template, test_image)
    }

    /// Same as [`Self::process`] with a prebuilt template.
    pub fn process_with_template(
        &self,
        template: ObjectTemplate,
        test_image: &RealImage,
    ) -> Result<HoughResult> {
        let started = Instant::now();
        info!(
            "Generalized Hough: template {}x{} ({} edge pixels), test image {}x{}",
            template.dimensions().0,
            template.dimensions().1,
            template.edge_count(),
            test_image.width,
            test_image.height
        );

        let grad_image = directional_gradient(test_image, self.params.sigma)?;
        debug!("Directional gradient computed in {:?}", started.elapsed());

        let volume = self.space_builder()?.build(&grad_image, &template)?;
        let maxima = find_hough_maxima(&volume, self.params.obj_thresh, &self.maxima);
        let detections: Vec<ObjectDetection> =
            maxima.iter().map(|d| self.to_object_detection(d)).collect();

        let processing_time = started.elapsed();
        info!(
            "Found {} objects in {:.3}ms",
            detections.len(),
            processing_time.as_secs_f64() * 1000.0
        );
        for d in &detections {
            debug!(
                "Object at ({}, {}): scale {:.3}, angle {:.1} deg, response {:.4}",
                d.x,
                d.y,
                d.scale,
                d.angle.to_degrees(),
                d.response
            );
        }

        Ok(HoughResult {
            detections,
            volume,
            template,
            processing_time,
        })
    }

    /// Streaming detection: never materializes the volume and reports one
    /// hypothesis per spatial peak.
    pub fn detect_peaks(
        &self,
        template_image: &RealImage,
        test_image: &RealImage,
    ) -> Result<Vec<ObjectDetection>> {
        let started = Instant::now();
        let template = self.build_template(template_image)?;
        let grad_image = directional_gradient(test_image, self.params.sigma)?;
        let projection = self.space_builder()?.build_projection(&grad_image, &template)?;

        let detections: Vec<ObjectDetection> = projection
            .peaks(self.params.obj_thresh)
            .iter()
            .map(|d| self.to_object_detection(d))
            .collect();
        info!(
            "Found {} peaks in {:.3}ms (streaming)",
            detections.len(),
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(detections)
    }

    fn to_object_detection(&self, d: &Detection) -> ObjectDetection {
        ObjectDetection {
            x: d.x,
            y: d.y,
            scale: self.params.scale_at(d.scale_index),
            angle: self.params.angle_at(d.angle_index),
            response: d.response,
            scale_index: d.scale_index,
            angle_index: d.angle_index,
        }
    }
}
