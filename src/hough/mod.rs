pub mod detector;
pub mod maxima;
pub mod params;
pub mod space;
pub mod template;

pub use detector::{GeneralizedHough, HoughResult, ObjectDetection};
pub use maxima::{
    find_hough_maxima, suppress_non_maxima, Detection, DuplicatePolicy, MaximaOptions, TieMatch,
};
pub use params::{HoughParams, Hypothesis};
pub use space::{CancelToken, HoughProjection, HoughSpaceBuilder, HoughVolume};
pub use template::ObjectTemplate;
