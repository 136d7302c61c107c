//! Observable pipeline progress
//!
//! Stage transitions are pure side effects: the sink sees them, control
//! flow never depends on them, and consumers may ignore them entirely.

use std::sync::Mutex;

use serde::Serialize;

/// Transient progress marker for one encryption or decryption operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PipelineStage {
    Idle,
    Validating,
    Encrypting,
    Fetching,
    KeyServerExchange,
    Authorizing,
    Finalizing,
    Completed,
    Error,
}

impl PipelineStage {
    /// Human-readable label for UI display.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Encrypting => "encrypting",
            Self::Fetching => "fetching",
            Self::KeyServerExchange => "key-server exchange",
            Self::Authorizing => "authorizing",
            Self::Finalizing => "finalizing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// Receiver for stage transitions.
pub trait ProgressSink: Send + Sync {
    fn on_stage(&self, stage: PipelineStage);
}

/// Sink that discards every transition.
#[derive(Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_stage(&self, _stage: PipelineStage) {}
}

/// Sink that records every transition, for tests and diagnostics.
#[derive(Default)]
pub struct RecordingProgress {
    stages: Mutex<Vec<PipelineStage>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// All transitions seen so far, in order.
    pub fn stages(&self) -> Vec<PipelineStage> {
        self.stages.lock().expect("stage log poisoned").clone()
    }
}

impl ProgressSink for RecordingProgress {
    fn on_stage(&self, stage: PipelineStage) {
        self.stages.lock().expect("stage log poisoned").push(stage);
    }
}
