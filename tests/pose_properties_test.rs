//! Property tests for the geometric pose estimator


use head_pose_guide::{
    constants::landmark_index::*, estimate_pose, DistanceStatus, Error, Landmark, Position, PoseEstimator,
    PoseThresholds,
};
use proptest::prelude::*;
use test_helpers::synthetic_face;

/// Face with a yaw of `yaw` radians applied to the eyes
fn yawed_face(yaw: f64) -> Vec<Landmark> {
    let mut landmarks = synthetic_face(1.0);
    let (sin, cos) = yaw.sin_cos();
    landmarks[LEFT_EYE] = Landmark::new(0.5 - 0.1 * cos, 0.4, 0.1 * sin);
    landmarks[RIGHT_EYE] = Landmark::new(0.5 + 0.1 * cos, 0.4, -0.1 * sin);
    landmarks
}

#[test]
fn test_bounding_box_example() {
    let mut landmarks = synthetic_face(1.0);
    landmarks[0] = Landmark::new(0.2, 0.1, 0.0);
    landmarks[2] = Landmark::new(0.8, 0.9, 0.0);

    let unmirrored = PoseEstimator::new(PoseThresholds::default(), false);
    let pose = unmirrored.estimate(&landmarks, 1280.0, 720.0).unwrap();
    assert!((pose.bounding_box.left - 256.0).abs() < 1e-6);
    assert!((pose.bounding_box.top - 72.0).abs() < 1e-6);
    assert!((pose.bounding_box.width - 768.0).abs() < 1e-6);
    assert!((pose.bounding_box.height - 576.0).abs() < 1e-6);

    // Mirrored: same size, left edge measured from the flipped side
    let pose = estimate_pose(&landmarks, 1280.0, 720.0).unwrap();
    assert!((pose.bounding_box.left - (1280.0 - 1024.0)).abs() < 1e-6);
    assert!((pose.bounding_box.width - 768.0).abs() < 1e-6);
}

#[test]
fn test_mirroring_swaps_labels_only() {
    let landmarks = yawed_face(1.2);
    let mirrored = estimate_pose(&landmarks, 640.0, 480.0).unwrap();
    let raw = PoseEstimator::new(PoseThresholds::default(), false)
        .estimate(&landmarks, 640.0, 480.0)
        .unwrap();

    assert_ne!(mirrored.position, Position::Center);
    assert_ne!(mirrored.position, raw.position);
    assert!((mirrored.side_projection - raw.side_projection).abs() < 1e-12);
    assert!((mirrored.normalized_x - raw.normalized_x).abs() < 1e-12);
    assert!((mirrored.display_x - (1.0 - raw.display_x)).abs() < 1e-12);
}

#[test]
fn test_every_required_landmark_is_named() {
    let required = [
        (NOSE_TIP, "nose tip"),
        (NOSE_BRIDGE, "nose bridge"),
        (LEFT_EYE, "left eye"),
        (RIGHT_EYE, "right eye"),
        (TOP_FOREHEAD, "top forehead"),
        (BOTTOM_CHIN, "bottom chin"),
    ];
    for (idx, name) in required {
        let mut landmarks = synthetic_face(1.0);
        landmarks[idx] = Landmark::new(f64::NAN, 0.5, 0.0);
        match estimate_pose(&landmarks, 1280.0, 720.0) {
            Err(Error::MissingLandmarks(missing)) => assert_eq!(missing, vec![name]),
            other => panic!("expected missing {name}, got {other:?}"),
        }
    }
}

#[test]
fn test_missing_cheek_is_computation_error() {
    let mut landmarks = synthetic_face(1.0);
    landmarks[RIGHT_CHEEK] = Landmark::new(f64::INFINITY, 0.5, 0.0);
    assert!(matches!(
        estimate_pose(&landmarks, 1280.0, 720.0),
        Err(Error::PoseComputation(_))
    ));
}

#[test]
fn test_result_serializes_camel_case() {
    let pose = estimate_pose(&synthetic_face(1.0), 1280.0, 720.0).unwrap();
    let json = serde_json::to_value(pose).unwrap();
    assert_eq!(json["position"], "center");
    assert_eq!(json["distanceStatus"], "good");
    assert_eq!(json["isGoodDistance"], true);
    assert!(json["boundingBox"]["width"].is_number());
    assert!(json["tiltAngle"].is_number());
}

proptest! {
    #[test]
    fn prop_estimate_is_idempotent(scale in 0.2f64..1.5, tilt in -0.5f64..0.5) {
        let mut landmarks = synthetic_face(scale);
        landmarks[RIGHT_EYE].y += tilt * 0.1 * scale;
        let first = estimate_pose(&landmarks, 1280.0, 720.0);
        let second = estimate_pose(&landmarks, 1280.0, 720.0);
        prop_assert_eq!(first.ok(), second.ok());
    }

    #[test]
    fn prop_valid_face_gives_finite_result(scale in 0.1f64..1.5, yaw in -1.2f64..1.2) {
        let mut landmarks = yawed_face(yaw);
        for landmark in &mut landmarks {
            landmark.x = 0.5 + (landmark.x - 0.5) * scale;
            landmark.y = 0.5 + (landmark.y - 0.5) * scale;
        }
        let pose = estimate_pose(&landmarks, 1280.0, 720.0).unwrap();
        prop_assert!(pose.side_projection.abs() <= 1.0 + 1e-9);
        prop_assert!(pose.forward_projection.abs() <= 1.0 + 1e-9);
        prop_assert!(pose.bounding_box.width >= 0.0);
        prop_assert!(pose.bounding_box.height >= 0.0);
        prop_assert_eq!(pose.is_good_distance, pose.distance_status == DistanceStatus::Good);
    }

    #[test]
    fn prop_short_slices_never_panic(len in 0usize..454) {
        let mut landmarks = synthetic_face(1.0);
        landmarks.truncate(len);
        prop_assert!(estimate_pose(&landmarks, 1280.0, 720.0).is_err());
    }

    #[test]
    fn prop_tilt_matches_eye_line(angle in -80f64..80.0) {
        let mut landmarks = synthetic_face(1.0);
        let (sin, cos) = angle.to_radians().sin_cos();
        landmarks[LEFT_EYE] = Landmark::new(0.5 - 0.1 * cos, 0.4 - 0.1 * sin, 0.0);
        landmarks[RIGHT_EYE] = Landmark::new(0.5 + 0.1 * cos, 0.4 + 0.1 * sin, 0.0);
        let pose = estimate_pose(&landmarks, 1280.0, 720.0).unwrap();
        prop_assert!((pose.tilt_angle - angle).abs() < 1e-6);
        prop_assert_eq!(pose.is_level, angle.abs() < 15.0);
    }

    #[test]
    fn prop_position_follows_threshold(side in -1.0f64..1.0) {
        let estimator = PoseEstimator::default();
        let position = estimator.classify_position(side);
        if side.abs() <= 0.7 {
            prop_assert_eq!(position, Position::Center);
        } else {
            prop_assert_ne!(position, Position::Center);
        }
    }
}
