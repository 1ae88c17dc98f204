mod common;

use hough_shape_matching::hough::find_hough_maxima;
use hough_shape_matching::image::warp::make_test_image;
use hough_shape_matching::{
    annotate_image_with_detections, paint_detection_masks, save_debug_output, GeneralizedHough,
    HoughParams, MaximaOptions, ObjectDetection, RealImage, TestShape,
};
use std::f64::consts::{FRAC_PI_2, TAU};

fn strongest(detections: &[ObjectDetection]) -> ObjectDetection {
    *detections
        .iter()
        .max_by(|a, b| {
            // Lowest hypothesis wins ties
            a.response
                .total_cmp(&b.response)
                .then(b.scale_index.cmp(&a.scale_index))
                .then(b.angle_index.cmp(&a.angle_index))
        })
        .expect("no detections")
}

fn assert_near(d: &ObjectDetection, x: u32, y: u32) {
    assert!(
        (d.x as i64 - x as i64).abs() <= 1 && (d.y as i64 - y as i64).abs() <= 1,
        "expected ({x}, {y}), got ({}, {})",
        d.x,
        d.y
    );
}

#[test]
fn test_single_square_is_found_once() {
    common::init_logging();
    let template = RealImage::create_test_template(30, TestShape::Square);
    let scene = common::scene_with(&template, 120, 140, 35, 55);

    let ght = GeneralizedHough::new(HoughParams::single(1.0, 0.3, 0.5)).unwrap();
    let result = ght.process(&template, &scene).unwrap();

    assert_eq!(result.detections.len(), 1, "{:?}", result.detections);
    let d = result.detections[0];
    assert_near(&d, 50, 70);
    assert_eq!((d.scale_index, d.angle_index), (0, 0));
    assert!(d.response > 0.0);

    let mut annotated =
        paint_detection_masks(&scene, &result.template, &result.detections).unwrap();
    annotate_image_with_detections(&mut annotated, &result.detections, 30, 30, None);
    save_debug_output(
        &annotated,
        "single_square.png",
        result.detections.len(),
        result.processing_time,
        &common::debug_config(),
    )
    .unwrap();
}

#[test]
fn test_square_outline_at_50_70() {
    common::init_logging();
    let template = RealImage::create_test_template(20, TestShape::SquareOutline);
    // Centre of the pasted template lands on (50, 70)
    let scene = common::scene_with(&template, 120, 140, 40, 60);

    let ght = GeneralizedHough::new(HoughParams::single(1.0, 0.3, 0.5)).unwrap();
    let result = ght.process(&template, &scene).unwrap();

    assert_eq!(result.detections.len(), 1, "{:?}", result.detections);
    let d = result.detections[0];
    assert_near(&d, 50, 70);
    assert_eq!((d.scale_index, d.angle_index), (0, 0));
}

#[test]
fn test_oversized_scales_do_not_hide_the_object() {
    common::init_logging();
    let template = RealImage::create_test_template(20, TestShape::SquareOutline);
    let scene = common::scene_with(&template, 60, 60, 20, 20);
    let params = HoughParams {
        scale_steps: 4,
        scale_range: [1.0, 4.0],
        ..HoughParams::single(1.0, 0.3, 0.5)
    };

    let result = GeneralizedHough::new(params)
        .unwrap()
        .process(&template, &scene)
        .unwrap();

    let best = strongest(&result.detections);
    assert_near(&best, 30, 30);
    assert_eq!(best.scale_index, 0);
    assert!(result.volume.surface(3, 0).iter().all(|&v| v == 0.0));
}

#[test]
fn test_vanishing_scales_give_no_detections() {
    common::init_logging();
    let template = RealImage::create_test_template(20, TestShape::SquareOutline);
    let scene = common::scene_with(&template, 60, 60, 20, 20);
    let params = HoughParams {
        scale_steps: 2,
        scale_range: [0.01, 0.02],
        ..HoughParams::single(1.0, 0.3, 0.5)
    };

    let result = GeneralizedHough::new(params)
        .unwrap()
        .process(&template, &scene)
        .unwrap();

    let projection = result.volume.max_projection();
    assert!(projection.data.iter().all(|v| !v.is_nan()));
    assert!(projection.data.iter().all(|&v| v == 0.0));
    assert!(result.detections.is_empty());
}

#[test]
fn test_rotated_l_shape_gets_the_right_angle() {
    common::init_logging();
    let template = RealImage::create_test_template(32, TestShape::LShape);
    let scene = make_test_image(&template, FRAC_PI_2, 1.0, 2.0).unwrap();
    assert_eq!(scene.dimensions(), (128, 128));

    let params = HoughParams {
        scale_steps: 1,
        scale_range: [1.0, 1.0],
        angle_steps: 4,
        angle_range: [0.0, TAU],
        ..HoughParams::synthetic()
    };
    let result = GeneralizedHough::new(params)
        .unwrap()
        .process(&template, &scene)
        .unwrap();

    let best = strongest(&result.detections);
    assert_eq!(best.angle_index, 1);
    assert!((best.angle - FRAC_PI_2).abs() < 1e-9);
    assert_near(&best, 64, 64);
}

#[test]
fn test_synthetic_scene_recovers_scale() {
    common::init_logging();
    let template = RealImage::create_test_template(24, TestShape::Square);
    let scene = make_test_image(&template, 0.0, 2.0, 2.0).unwrap();

    let result = GeneralizedHough::new(HoughParams::synthetic())
        .unwrap()
        .process(&template, &scene)
        .unwrap();

    let best = strongest(&result.detections);
    assert_eq!(best.scale_index, 2);
    assert!((best.scale - 2.0).abs() < 1e-9);
    assert_near(&best, 47, 47);
}

#[test]
fn test_detection_count_falls_with_threshold() {
    let template = RealImage::create_test_template(20, TestShape::Circle);
    let mut scene = common::scene_with(&template, 100, 80, 5, 10);
    scene.paste(&RealImage::create_test_template(20, TestShape::Cross), 60, 40);
    scene.paste(&RealImage::create_test_template(20, TestShape::Square), 30, 50);

    let params = HoughParams {
        scale_steps: 2,
        scale_range: [0.8, 1.0],
        angle_steps: 2,
        ..HoughParams::default()
    };
    let result = GeneralizedHough::new(params)
        .unwrap()
        .process(&template, &scene)
        .unwrap();

    let counts: Vec<usize> = [0.1f32, 0.2, 0.3, 0.5, 0.7, 0.9]
        .iter()
        .map(|&t| find_hough_maxima(&result.volume, t, &MaximaOptions::default()).len())
        .collect();
    assert!(counts.windows(2).all(|p| p[1] <= p[0]), "{counts:?}");
    assert!(counts[0] >= 1);
}

#[test]
fn test_streaming_peaks_agree_with_volume() {
    let template = RealImage::create_test_template(32, TestShape::LShape);
    let scene = make_test_image(&template, FRAC_PI_2, 1.0, 2.0).unwrap();
    let params = HoughParams {
        scale_steps: 1,
        scale_range: [1.0, 1.0],
        angle_steps: 4,
        ..HoughParams::synthetic()
    };
    let ght = GeneralizedHough::new(params).unwrap();

    let best_volume = strongest(&ght.process(&template, &scene).unwrap().detections);
    let best_stream = strongest(&ght.detect_peaks(&template, &scene).unwrap());
    assert_eq!(best_volume, best_stream);
}
