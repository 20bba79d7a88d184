// tuner-core/src/lib.rs

//! The core logic for the four-string instrument tuner.
//! This crate is responsible for audio capture, pitch detection,
//! and nearest-string classification. It is completely headless
//! and contains no UI code.

pub mod audio;
pub mod config;
pub mod error;
pub mod estimator;
pub mod fft;
pub mod pitch;
pub mod synth;
pub mod tuning;

pub use config::TunerConfig;
pub use error::{CaptureFailure, TunerError};
pub use estimator::{Analyzer, EstimatorState, PitchEstimator};
pub use pitch::DetectionStrategy;
pub use tuning::{ReferencePitch, TuningAccuracy, TuningInstruction};

/// A block of mono samples captured at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Normalized samples in [-1, 1].
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Frame duration in seconds, zero for a degenerate sample rate.
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f32 / self.sample_rate as f32
        }
    }
}

/// Represents the result of analysing a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct PitchEstimate {
    /// The detected frequency in Hz.
    pub frequency_hz: f32,
    /// Label of the nearest reference pitch.
    pub closest_reference: String,
    /// Frequency of that reference in Hz.
    pub reference_hz: f32,
    /// The deviation from the reference in cents.
    pub deviation_cents: f32,
}

impl PitchEstimate {
    pub fn instruction(&self, in_tune_cents: f32) -> TuningInstruction {
        TuningInstruction::from_cents(self.deviation_cents, in_tune_cents)
    }

    pub fn accuracy(&self, in_tune_cents: f32) -> TuningAccuracy {
        TuningAccuracy::from_cents(self.deviation_cents, in_tune_cents)
    }

    pub fn needle_offset(&self) -> f32 {
        tuning::needle_offset(self.deviation_cents)
    }
}
