//! Latest-wins coordination between frame capture and landmark detection.
//!
//! The [`DetectionGate`] allows at most one detection in flight. Capture
//! asks for a [`DetectionPermit`] per frame; when a detection is already
//! running the frame is dropped instead of queued. Completed detections
//! replace whatever [`LatestFrame`] holds.

use crate::landmarks::LandmarkFrame;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

const IDLE: u8 = 0;
const DETECTING: u8 = 1;

/// Observable gate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Detecting,
}

/// Counters shared by the capture and detection threads
#[derive(Debug, Default)]
pub struct ProviderStats {
    pub frames_captured: AtomicU64,
    pub frames_dropped: AtomicU64,
    pub detections_completed: AtomicU64,
    pub detections_failed: AtomicU64,
}

impl ProviderStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            detections_completed: self.detections_completed.load(Ordering::Relaxed),
            detections_failed: self.detections_failed.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.frames_captured.store(0, Ordering::Relaxed);
        self.frames_dropped.store(0, Ordering::Relaxed);
        self.detections_completed.store(0, Ordering::Relaxed);
        self.detections_failed.store(0, Ordering::Relaxed);
    }
}

/// Point-in-time copy of [`ProviderStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatsSnapshot {
    pub frames_captured: u64,
    pub frames_dropped: u64,
    pub detections_completed: u64,
    pub detections_failed: u64,
}

/// `idle -> detecting -> idle` state machine
#[derive(Debug)]
pub struct DetectionGate {
    state: AtomicU8,
    stats: Arc<ProviderStats>,
}

impl DetectionGate {
    #[must_use]
    pub fn new(stats: Arc<ProviderStats>) -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(IDLE),
            stats,
        })
    }

    pub fn state(&self) -> GateState {
        match self.state.load(Ordering::Acquire) {
            IDLE => GateState::Idle,
            _ => GateState::Detecting,
        }
    }

    /// Move to `detecting` if idle. Returns `None` and counts a dropped
    /// frame when a detection is already in flight.
    pub fn try_begin(self: &Arc<Self>) -> Option<DetectionPermit> {
        match self
            .state
            .compare_exchange(IDLE, DETECTING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Some(DetectionPermit {
                gate: Arc::clone(self),
            }),
            Err(_) => {
                self.stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    fn finish(&self) {
        self.state.store(IDLE, Ordering::Release);
    }
}

/// Proof that the holder owns the single detection slot. Dropping it
/// returns the gate to `idle`.
#[derive(Debug)]
pub struct DetectionPermit {
    gate: Arc<DetectionGate>,
}

impl Drop for DetectionPermit {
    fn drop(&mut self) {
        self.gate.finish();
    }
}

/// Slot holding the most recently completed detection
#[derive(Debug, Default)]
pub struct LatestFrame {
    slot: RwLock<Option<Arc<LandmarkFrame>>>,
}

impl LatestFrame {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached detection; `None` records a frame without a face
    pub fn store(&self, frame: Option<LandmarkFrame>) {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *slot = frame.map(Arc::new);
    }

    pub fn load(&self) -> Option<Arc<LandmarkFrame>> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn clear(&self) {
        self.store(None);
    }
}
