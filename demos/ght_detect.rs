//! Runs the Generalized Hough detector and writes diagnostic images.
//!
//! ```text
//! cargo run --release --example ght_detect -- <template.png> <scene.png>
//! cargo run --release --example ght_detect            # synthetic scene
//! ```
//!
//! Set `GHT_FONT` to a TrueType font to label detections.

use hough_shape_matching::image::warp::make_test_image;
use hough_shape_matching::{
    annotate_image_with_detections, hough_space_image, paint_detection_masks, save_debug_output,
    DebugOutputConfig, GeneralizedHough, HoughParams, RealImage, TestShape,
};
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (template, scene, params) = match args.as_slice() {
        [template_path, scene_path] => (
            RealImage::from_file(template_path)?,
            RealImage::from_file(scene_path)?,
            HoughParams::default(),
        ),
        [] => {
            let params = HoughParams::synthetic();
            let template = RealImage::create_test_template(40, TestShape::LShape);
            let scene = make_test_image(&template, 60f64.to_radians(), 1.5, params.scale_range[1])?;
            (template, scene, params)
        }
        _ => {
            eprintln!("usage: ght_detect [<template> <scene>]");
            std::process::exit(2);
        }
    };

    let config = DebugOutputConfig {
        enabled: true,
        output_dir: Some(PathBuf::from("ght_output")),
        font_path: std::env::var_os("GHT_FONT").map(PathBuf::from),
    };
    let font = config.load_font()?;

    let result = GeneralizedHough::new(params)?.process(&template, &scene)?;

    for (i, d) in result.detections.iter().enumerate() {
        println!(
            "O{}: ({}, {}) scale {:.3} angle {:.1}° response {:.4}",
            i + 1,
            d.x,
            d.y,
            d.scale,
            d.angle.to_degrees(),
            d.response
        );
    }

    let space = hough_space_image(&result.volume);
    if let Some(dir) = &config.output_dir {
        std::fs::create_dir_all(dir)?;
        space.save_to_file(dir.join("hough_space.png"))?;
    }

    let mut annotated = paint_detection_masks(&scene, &result.template, &result.detections)?;
    annotate_image_with_detections(
        &mut annotated,
        &result.detections,
        template.width,
        template.height,
        font.as_ref(),
    );
    save_debug_output(
        &annotated,
        "detections.png",
        result.detections.len(),
        result.processing_time,
        &config,
    )?;

    Ok(())
}
