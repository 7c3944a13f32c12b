//! Landmark provider: continuous capture and detection behind a
//! non-blocking "latest result" accessor.

/// `OpenCV` camera and video file frame source
pub mod camera;

/// `ONNX` SCRFD face detector locating the face to crop
pub mod face_detection;

/// `ONNX` face mesh landmark model
pub mod face_mesh;

/// Single in-flight detection gate and latest-wins result slot
pub mod gate;

/// Square face crop and its mapping back to the frame
pub mod region;

use crate::{landmarks::LandmarkFrame, landmarks::Landmark, Error, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use gate::{DetectionGate, DetectionPermit, LatestFrame, ProviderStats, StatsSnapshot};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Pause after a failed frame read before trying again
const READ_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Options applied when a provider starts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartOptions {
    /// Render frames and landmarks to a debug window
    pub debug: bool,
}

/// Source of the most recent facial landmarks
pub trait LandmarkProvider: Send {
    /// Begin continuous capture and detection
    ///
    /// # Errors
    ///
    /// Returns `MissingDependency` or `InitializationFailure` when the
    /// frame source or the model cannot be started.
    fn start(&mut self, options: StartOptions) -> Result<()>;

    /// Halt capture, release every resource and clear the cached result.
    /// Calling it on a stopped provider does nothing.
    fn stop(&mut self);

    /// Most recently completed detection; never blocks on detection
    fn latest(&self) -> Option<Arc<LandmarkFrame>>;

    fn is_running(&self) -> bool;

    fn stats(&self) -> StatsSnapshot {
        StatsSnapshot::default()
    }
}

/// A captured frame with a known pixel size
pub trait VideoFrame: Send + 'static {
    /// `(width, height)` in pixels
    fn dimensions(&self) -> (u32, u32);
}

/// Produces frames at its own pace
pub trait FrameSource: Send + 'static {
    type Frame: VideoFrame;

    /// Block until the next frame is available. `Ok(None)` ends the stream.
    ///
    /// # Errors
    ///
    /// Returns an error if a frame cannot be read; the capture loop retries.
    fn next_frame(&mut self) -> Result<Option<Self::Frame>>;

    /// Release the underlying device
    ///
    /// # Errors
    ///
    /// Returns an error if the device refuses to close.
    fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Turns a frame into face mesh landmarks
pub trait LandmarkModel<F>: Send + 'static {
    /// `Ok(None)` when no face is present
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails.
    fn detect(&mut self, frame: &F) -> Result<Option<Vec<Landmark>>>;
}

/// Receives every processed frame, used by the debug overlay
pub trait FrameObserver<F>: Send {
    /// # Errors
    ///
    /// Returns an error if rendering fails; the observer is then detached.
    fn observe(&mut self, frame: &F, landmarks: Option<&[Landmark]>) -> Result<()>;
}

type Factory<T> = Box<dyn FnMut() -> Result<T> + Send>;

struct DetectionJob<F> {
    frame: F,
    sequence: u64,
    _permit: DetectionPermit,
}

/// [`LandmarkProvider`] driving a [`FrameSource`] and a [`LandmarkModel`]
/// on two threads.
///
/// The capture thread reads frames continuously. A frame is handed to the
/// detection thread only if no detection is in flight; otherwise it is
/// dropped.
pub struct CaptureProvider<S: FrameSource, M: LandmarkModel<S::Frame>> {
    open_source: Factory<S>,
    load_model: Factory<M>,
    observer_factory: Option<Factory<Box<dyn FrameObserver<S::Frame>>>>,
    running: Arc<AtomicBool>,
    gate: Arc<DetectionGate>,
    latest: Arc<LatestFrame>,
    stats: Arc<ProviderStats>,
    capture_thread: Option<JoinHandle<()>>,
    detection_thread: Option<JoinHandle<()>>,
}

impl<S, M> CaptureProvider<S, M>
where
    S: FrameSource,
    M: LandmarkModel<S::Frame>,
{
    /// Create a stopped provider. The factories run on every `start`.
    pub fn new<OS, LM>(open_source: OS, load_model: LM) -> Self
    where
        OS: FnMut() -> Result<S> + Send + 'static,
        LM: FnMut() -> Result<M> + Send + 'static,
    {
        let stats = Arc::new(ProviderStats::default());
        Self {
            open_source: Box::new(open_source),
            load_model: Box::new(load_model),
            observer_factory: None,
            running: Arc::new(AtomicBool::new(false)),
            gate: DetectionGate::new(Arc::clone(&stats)),
            latest: Arc::new(LatestFrame::new()),
            stats,
            capture_thread: None,
            detection_thread: None,
        }
    }

    /// Observer created when the provider starts with `debug` set
    #[must_use]
    pub fn with_debug_observer<OF>(mut self, factory: OF) -> Self
    where
        OF: FnMut() -> Result<Box<dyn FrameObserver<S::Frame>>> + Send + 'static,
    {
        self.observer_factory = Some(Box::new(factory));
        self
    }

    fn spawn_threads(&mut self, source: S, model: M, observer: Option<Box<dyn FrameObserver<S::Frame>>>) -> Result<()> {
        let (tx, rx) = bounded::<DetectionJob<S::Frame>>(1);

        let running = Arc::clone(&self.running);
        let latest = Arc::clone(&self.latest);
        let stats = Arc::clone(&self.stats);
        let detection = thread::Builder::new()
            .name("landmark-detection".to_string())
            .spawn(move || detection_loop(model, &rx, &running, &latest, &stats, observer))?;
        self.detection_thread = Some(detection);

        let running = Arc::clone(&self.running);
        let gate = Arc::clone(&self.gate);
        let stats = Arc::clone(&self.stats);
        let capture = thread::Builder::new()
            .name("frame-capture".to_string())
            .spawn(move || capture_loop(source, &tx, &running, &gate, &stats))?;
        self.capture_thread = Some(capture);

        Ok(())
    }
}

impl<S, M> LandmarkProvider for CaptureProvider<S, M>
where
    S: FrameSource,
    M: LandmarkModel<S::Frame>,
{
    fn start(&mut self, options: StartOptions) -> Result<()> {
        if self.capture_thread.is_some() {
            return Err(Error::ProviderError("Provider is already running".to_string()));
        }

        let source = (self.open_source)().map_err(as_init_error)?;
        let model = (self.load_model)().map_err(as_init_error)?;

        let observer = match (options.debug, self.observer_factory.as_mut()) {
            (true, Some(factory)) => Some(factory().map_err(as_init_error)?),
            (true, None) => {
                warn!("Debug overlay requested but not supported by this provider");
                None
            }
            (false, _) => None,
        };

        self.stats.reset();
        self.latest.clear();
        self.running.store(true, Ordering::Release);

        if let Err(e) = self.spawn_threads(source, model, observer) {
            self.stop();
            return Err(Error::InitializationFailure(format!("Failed to spawn provider threads: {e}")));
        }

        info!("Landmark provider started (debug overlay: {})", options.debug);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        let handles = [self.capture_thread.take(), self.detection_thread.take()];
        let was_running = handles.iter().any(Option::is_some);
        for handle in handles.into_iter().flatten() {
            if handle.join().is_err() {
                warn!("Provider thread panicked during shutdown");
            }
        }

        self.latest.clear();
        if was_running {
            info!("Landmark provider stopped: {:?}", self.stats.snapshot());
        }
    }

    fn latest(&self) -> Option<Arc<LandmarkFrame>> {
        self.latest.load()
    }

    fn is_running(&self) -> bool {
        let alive = |handle: &Option<JoinHandle<()>>| handle.as_ref().is_some_and(|h| !h.is_finished());
        self.running.load(Ordering::Acquire) && (alive(&self.capture_thread) || alive(&self.detection_thread))
    }

    fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl<S, M> Drop for CaptureProvider<S, M>
where
    S: FrameSource,
    M: LandmarkModel<S::Frame>,
{
    fn drop(&mut self) {
        self.stop();
    }
}

/// Keep the start-up error kinds, fold everything else into an
/// initialization failure.
fn as_init_error(error: Error) -> Error {
    match error {
        Error::MissingDependency(_) | Error::InitializationFailure(_) => error,
        other => Error::InitializationFailure(other.to_string()),
    }
}

fn capture_loop<S: FrameSource>(
    mut source: S,
    tx: &Sender<DetectionJob<S::Frame>>,
    running: &AtomicBool,
    gate: &Arc<DetectionGate>,
    stats: &ProviderStats,
) {
    let mut sequence: u64 = 0;

    while running.load(Ordering::Acquire) {
        match source.next_frame() {
            Ok(Some(frame)) => {
                sequence += 1;
                stats.frames_captured.fetch_add(1, Ordering::Relaxed);

                // Busy detector: this frame is dropped by the gate
                let Some(permit) = gate.try_begin() else {
                    continue;
                };
                let job = DetectionJob {
                    frame,
                    sequence,
                    _permit: permit,
                };
                if tx.send(job).is_err() {
                    warn!("Detection thread is gone, stopping capture");
                    break;
                }
            }
            Ok(None) => {
                info!("Frame source reached end of stream after {} frames", sequence);
                break;
            }
            Err(e) => {
                warn!("Failed to read frame, retrying: {}", e);
                thread::sleep(READ_RETRY_DELAY);
            }
        }
    }

    if let Err(e) = source.release() {
        warn!("Failed to release frame source: {}", e);
    }
    debug!("Capture loop finished");
}

fn detection_loop<F: VideoFrame, M: LandmarkModel<F>>(
    mut model: M,
    rx: &Receiver<DetectionJob<F>>,
    running: &AtomicBool,
    latest: &LatestFrame,
    stats: &ProviderStats,
    mut observer: Option<Box<dyn FrameObserver<F>>>,
) {
    for job in rx {
        if !running.load(Ordering::Acquire) {
            break;
        }

        let (width, height) = job.frame.dimensions();
        let landmarks = match model.detect(&job.frame) {
            Ok(landmarks) => {
                stats.detections_completed.fetch_add(1, Ordering::Relaxed);
                landmarks
            }
            Err(e) => {
                stats.detections_failed.fetch_add(1, Ordering::Relaxed);
                warn!("Landmark detection failed on frame {}: {}", job.sequence, e);
                None
            }
        };

        if let Some(obs) = observer.as_mut() {
            if let Err(e) = obs.observe(&job.frame, landmarks.as_deref()) {
                warn!("Debug overlay failed, detaching it: {}", e);
                observer = None;
            }
        }

        latest.store(landmarks.map(|landmarks| LandmarkFrame {
            landmarks,
            width,
            height,
            sequence: job.sequence,
        }));
        // job (and its permit) dropped here: gate back to idle
    }
    // Source ended or provider stopped: nothing left is current
    latest.clear();
    debug!("Detection loop finished");
}
