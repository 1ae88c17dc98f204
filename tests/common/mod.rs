// Shared helpers for the integration tests.
#![allow(dead_code)]

use hough_shape_matching::{DebugOutputConfig, RealImage};
use std::path::PathBuf;

/// Controls whether annotated images are written during test execution
pub const DEBUG_OUTPUT: bool = false;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn debug_config() -> DebugOutputConfig {
    DebugOutputConfig {
        enabled: DEBUG_OUTPUT,
        output_dir: Some(PathBuf::from("target/debug_output")),
        font_path: None,
    }
}

/// Black `width`x`height` scene with `template` pasted at `(x0, y0)`.
pub fn scene_with(template: &RealImage, width: u32, height: u32, x0: i64, y0: i64) -> RealImage {
    let mut scene = RealImage::new(width, height);
    scene.paste(template, x0, y0);
    scene
}
