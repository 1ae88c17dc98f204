//! Generalized Hough Transform shape matching
//!
//! Locates a shape given by a template image inside a test image, jointly
//! over position, scale and rotation. Votes are cast in the frequency domain:
//! every `(scale, angle)` hypothesis is one FFT correlation between the test
//! image's directional gradient field and the warped, phase-rotated template
//! orientation field.
//!
//! ## Pipeline
//!
//! 1. **Template** (`hough::template::ObjectTemplate::from_image`)
//!    - Sobel edge mask, thresholded relative to the strongest edge
//!    - Complex orientation field from a Gaussian-derivative kernel
//!
//! 2. **Hough space** (`hough::space::HoughSpaceBuilder::build`)
//!    - Test gradient spectrum computed once
//!    - Per hypothesis: warp, rotate gradient phase, L1-normalize, recentre,
//!      FFT, conjugate product, inverse FFT, `|re|`
//!    - Hypotheses run in parallel on rayon
//!
//! 3. **Maxima** (`hough::maxima::find_hough_maxima`)
//!    - Max projection over all hypotheses, threshold relative to the global
//!      maximum, 8-neighbour non-maximum suppression
//!    - Every hypothesis matching a surviving peak becomes a detection
//!
//! `hough::detector::GeneralizedHough` ties the stages together:
//!
//! ```no_run
//! use hough_shape_matching::{GeneralizedHough, HoughParams, RealImage};
//!
//! # fn main() -> hough_shape_matching::Result<()> {
//! let template = RealImage::from_file("template.png")?;
//! let scene = RealImage::from_file("scene.png")?;
//! let result = GeneralizedHough::new(HoughParams::default())?.process(&template, &scene)?;
//! for d in &result.detections {
//!     println!("({}, {}) scale {:.2} angle {:.2}", d.x, d.y, d.scale, d.angle);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod hough;
pub mod image;

pub use crate::error::{GhtError, Result};
pub use crate::hough::{
    CancelToken, Detection, DuplicatePolicy, GeneralizedHough, HoughParams, HoughResult,
    HoughVolume, MaximaOptions, ObjectDetection, ObjectTemplate, TieMatch,
};
pub use crate::image::loader::{ComplexImage, RealImage, TestShape};
pub use crate::image::{
    annotate_image_with_detections, hough_space_image, paint_detection_masks, real_image_to_rgb,
    save_debug_output, DebugOutputConfig,
};
