use thiserror::Error;

#[derive(Error, Debug)]
pub enum GhtError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Dimension mismatch: expected {expected:?}, got {actual:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    #[error("Template has no edge pixels above the binarization threshold")]
    EmptyTemplate,

    #[error("Warped template {template:?} exceeds {image:?} (scale {scale}, angle {angle})")]
    TemplateExceedsImage {
        template: (u32, u32),
        image: (u32, u32),
        scale: f64,
        angle: f64,
    },

    #[error("Hough space computation cancelled")]
    Cancelled,

    #[error("Other error: {0}")]
    Other(String),
}

impl GhtError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        GhtError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GhtError>;
