//! Head pose guide: live face framing feedback from a camera or video file.

use anyhow::{Context, Result};
use clap::Parser;
use head_pose_guide::{config::Config, provider::StartOptions, FaceGuideSession, PoseResult};
use log::{info, warn};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Camera index to use
    #[arg(long)]
    cam: Option<i32>,

    /// Video file to process
    #[arg(short, long)]
    video: Option<PathBuf>,

    /// Path to the face mesh ONNX model
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Path to the SCRFD face detector ONNX model
    #[arg(long)]
    detector: Option<PathBuf>,

    /// Requested capture width
    #[arg(long)]
    width: Option<u32>,

    /// Requested capture height
    #[arg(long)]
    height: Option<u32>,

    /// Path to configuration file (YAML format)
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    /// Show the debug overlay window
    #[arg(short, long)]
    overlay: bool,

    /// Report positions and boxes in raw camera space
    #[arg(long)]
    no_mirror: bool,

    /// Delay between two polls in milliseconds
    #[arg(long)]
    interval_ms: Option<u64>,

    /// Print every poll as a JSON line
    #[arg(long)]
    json: bool,

    /// Stop after this many polls
    #[arg(long)]
    frames: Option<u64>,
}

impl Args {
    /// Command line values take precedence over the file
    fn apply(&self, config: &mut Config) {
        if let Some(cam) = self.cam {
            config.camera.index = cam;
            config.camera.video_file = None;
        }
        if let Some(video) = &self.video {
            config.camera.video_file = Some(video.clone());
        }
        if let Some(model) = &self.model {
            config.model.face_mesh = model.clone();
        }
        if let Some(detector) = &self.detector {
            config.model.face_detector = detector.clone();
        }
        if let Some(width) = self.width {
            config.camera.width = width;
        }
        if let Some(height) = self.height {
            config.camera.height = height;
        }
        if self.overlay {
            config.display.debug_overlay = true;
        }
        if self.no_mirror {
            config.display.mirrored = false;
        }
        if let Some(interval) = self.interval_ms {
            config.poll.interval_ms = interval;
        }
        if self.frames.is_some() {
            config.poll.max_polls = self.frames;
        }
    }
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger
    if args.debug {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("debug"));
    } else {
        env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
    }

    info!("Head Pose Guide");

    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Config::from_file(path).with_context(|| format!("Failed to load {}", path.display()))?
        }
        None => Config::default(),
    };
    args.apply(&mut config);

    let mut session = FaceGuideSession::new(&config)?;
    session
        .start(StartOptions {
            debug: config.display.debug_overlay,
        })
        .context("Failed to start face guide session")?;

    let interval = Duration::from_millis(config.poll.interval_ms);
    let mut polls = 0u64;
    while config.poll.max_polls.map_or(true, |max| polls < max) {
        std::thread::sleep(interval);
        polls += 1;

        let pose = session.detect_face();
        if args.json {
            print_json(&pose)?;
        } else {
            match &pose {
                Ok(pose) => println!("{}", guidance(pose)),
                Err(e) => println!("{e}"),
            }
        }

        if !session.is_running() {
            warn!("Capture ended");
            break;
        }
    }

    let stats = session.stats();
    info!(
        "Captured {} frames, dropped {}, detections {} ok / {} failed",
        stats.frames_captured, stats.frames_dropped, stats.detections_completed, stats.detections_failed
    );
    session.dispose();

    Ok(())
}

fn print_json(pose: &head_pose_guide::Result<PoseResult>) -> Result<()> {
    let line = match pose {
        Ok(pose) => serde_json::json!({ "result": pose, "error": null }),
        Err(e) => serde_json::json!({ "result": null, "error": e.to_string() }),
    };
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}

fn guidance(pose: &PoseResult) -> String {
    let mut hints = Vec::new();
    match pose.position {
        head_pose_guide::Position::Center => {}
        position => hints.push(format!("face turned {position}")),
    }
    match pose.distance_status {
        head_pose_guide::DistanceStatus::TooFar => hints.push("move closer".to_string()),
        head_pose_guide::DistanceStatus::TooClose => hints.push("move back".to_string()),
        head_pose_guide::DistanceStatus::Good => {}
    }
    if !pose.is_level {
        hints.push(format!("level your head ({:.1} deg)", pose.tilt_angle));
    }

    if hints.is_empty() {
        "Face well framed".to_string()
    } else {
        hints.join(", ")
    }
}
