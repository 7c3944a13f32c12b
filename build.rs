//! Warns at build time when `OpenCV` or the default ONNX models are missing.

use std::path::Path;
use std::process::Command;

const MODELS: [(&str, &str); 2] = [
    ("assets/face_detector.onnx", "an SCRFD face detector (--detector)"),
    ("assets/face_mesh.onnx", "a 468-point face mesh (--model)"),
];

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=PKG_CONFIG_PATH");

    match pkg_config_version("opencv4").or_else(|| pkg_config_version("opencv")) {
        Some(version) => println!("cargo:warning=Found OpenCV {version}"),
        None => println!("cargo:warning=OpenCV not found via pkg-config, install libopencv-dev (or brew install opencv)"),
    }

    for (path, what) in MODELS {
        println!("cargo:rerun-if-changed={path}");
        if !Path::new(path).exists() {
            println!("cargo:warning=No model at {path}: export {what} to ONNX or pass its path at runtime");
        }
    }
}

fn pkg_config_version(package: &str) -> Option<String> {
    let output = Command::new("pkg-config").args(["--modversion", package]).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}
