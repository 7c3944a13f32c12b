//! Benchmarks for pose estimation and the detection gate

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use head_pose_guide::{
    constants::{landmark_index::*, NUM_FACE_MESH_LANDMARKS},
    landmarks::{Landmark, LandmarkFrame},
    pose_estimation::PoseEstimator,
    provider::gate::{DetectionGate, LatestFrame, ProviderStats},
    utils::safe_cast::*,
};
use std::sync::Arc;

fn synthetic_face() -> Vec<Landmark> {
    let mut landmarks = vec![Landmark::new(0.5, 0.5, 0.0); NUM_FACE_MESH_LANDMARKS];
    for (idx, x, y, z) in [
        (LEFT_EYE, 0.4, 0.4, 0.0),
        (RIGHT_EYE, 0.6, 0.4, 0.02),
        (NOSE_BRIDGE, 0.5, 0.4, 0.0),
        (NOSE_TIP, 0.5, 0.5, -0.05),
        (TOP_FOREHEAD, 0.5, 0.2, 0.0),
        (BOTTOM_CHIN, 0.52, 0.8, 0.0),
        (LEFT_CHEEK, 0.3, 0.5, 0.0),
        (RIGHT_CHEEK, 0.7, 0.5, 0.0),
    ] {
        landmarks[idx] = Landmark::new(x, y, z);
    }
    landmarks
}

fn benchmark_pose_estimation(c: &mut Criterion) {
    let mut group = c.benchmark_group("pose_estimation");

    let estimator = PoseEstimator::default();
    let landmarks = synthetic_face();

    group.bench_function("estimate_468_landmarks", |b| {
        b.iter(|| {
            let result = estimator
                .estimate(black_box(&landmarks), 1280.0, 720.0)
                .expect("Pose estimation failed");
            black_box(result);
        });
    });

    let mut partial = synthetic_face();
    partial.truncate(100);
    group.bench_function("estimate_missing_landmarks", |b| {
        b.iter(|| {
            let result = estimator.estimate(black_box(&partial), 1280.0, 720.0);
            black_box(result.is_err());
        });
    });

    let raw: Vec<f32> = (0..NUM_FACE_MESH_LANDMARKS * 3).map(|i| (i % 192) as f32).collect();
    group.bench_function("landmarks_from_flat", |b| {
        b.iter(|| {
            black_box(Landmark::from_flat(black_box(&raw), 192.0));
        });
    });

    group.finish();
}

fn benchmark_gate(c: &mut Criterion) {
    let mut group = c.benchmark_group("detection_gate");

    let gate = DetectionGate::new(Arc::new(ProviderStats::default()));
    group.bench_function("acquire_release", |b| {
        b.iter(|| {
            let permit = gate.try_begin();
            black_box(permit.is_some());
        });
    });

    let held = gate.try_begin();
    group.bench_function("reject_while_busy", |b| {
        b.iter(|| {
            black_box(gate.try_begin().is_none());
        });
    });
    drop(held);

    let latest = LatestFrame::new();
    let frame = LandmarkFrame {
        landmarks: synthetic_face(),
        width: 1280,
        height: 720,
        sequence: 0,
    };
    group.bench_function("store_and_load_latest", |b| {
        b.iter(|| {
            latest.store(Some(frame.clone()));
            black_box(latest.load());
        });
    });

    group.finish();
}

fn benchmark_utils(c: &mut Criterion) {
    let mut group = c.benchmark_group("utils");

    group.bench_function("safe_cast_f64_to_i32_clamp", |b| {
        let values: Vec<f64> = vec![10.5, -20.3, 1e10, -1e10, f64::NAN];
        b.iter(|| {
            for &val in &values {
                black_box(f64_to_i32_clamp(val, 0, 1280));
            }
        });
    });

    group.bench_function("safe_cast_usize_to_i32", |b| {
        let values: Vec<usize> = vec![0, 100, 1000, 10000, usize::MAX];
        b.iter(|| {
            for &val in &values {
                black_box(usize_to_i32(val).unwrap_or(i32::MAX));
            }
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_pose_estimation, benchmark_gate, benchmark_utils);
criterion_main!(benches);
