//! Tuner configuration.
//!
//! Everything the estimator needs is fixed up front in a [`TunerConfig`]
//! and validated once. The config round-trips through JSON so a tuning
//! setup can be saved and loaded.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audio::{BUFFER_SIZE, DEFAULT_SAMPLE_RATE};
use crate::error::{Result, TunerError};
use crate::pitch::{DetectionStrategy, MIN_FRAME_LEN};
use crate::tuning::{self, ReferencePitch, ReferenceSet};

/// Lowest frequency accepted as a real note by default.
pub const DEFAULT_MIN_HZ: f32 = 50.0;

/// Highest frequency accepted as a real note by default.
pub const DEFAULT_MAX_HZ: f32 = 1000.0;

/// Minimum RMS amplitude for pitch detection.
pub const DEFAULT_SILENCE_THRESHOLD: f32 = 0.01;

/// Configuration for the pitch estimator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerConfig {
    /// Open-string targets, in tie-break order.
    pub reference_pitches: Vec<ReferencePitch>,
    /// Lowest plausible frequency in Hz.
    pub min_hz: f32,
    /// Highest plausible frequency in Hz.
    pub max_hz: f32,
    /// Frames with a lower RMS amplitude are treated as silence.
    pub silence_threshold: f32,
    /// Frequency estimation algorithm.
    pub strategy: DetectionStrategy,
    /// Samples per analysed frame.
    pub frame_size: usize,
    /// Sample rate requested from the capture device.
    pub sample_rate: u32,
    /// Deviation below which a string is reported in tune.
    pub in_tune_cents: f32,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            reference_pitches: tuning::standard_ukulele(),
            min_hz: DEFAULT_MIN_HZ,
            max_hz: DEFAULT_MAX_HZ,
            silence_threshold: DEFAULT_SILENCE_THRESHOLD,
            strategy: DetectionStrategy::default(),
            frame_size: BUFFER_SIZE,
            sample_rate: DEFAULT_SAMPLE_RATE,
            in_tune_cents: tuning::DEFAULT_IN_TUNE_CENTS,
        }
    }
}

impl TunerConfig {
    /// Builds a validated config from references, bounds and the silence
    /// gate. Everything else takes its default.
    pub fn new(
        reference_pitches: Vec<ReferencePitch>,
        min_hz: f32,
        max_hz: f32,
        silence_threshold: f32,
    ) -> Result<Self> {
        let config = Self {
            reference_pitches,
            min_hz,
            max_hz,
            silence_threshold,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_strategy(mut self, strategy: DetectionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_frame_size(mut self, frame_size: usize) -> Self {
        self.frame_size = frame_size;
        self
    }

    /// Checks every field, returning the first problem found.
    pub fn validate(&self) -> Result<()> {
        ReferenceSet::new(self.reference_pitches.clone())?;

        if !self.min_hz.is_finite() || !self.max_hz.is_finite() || self.min_hz <= 0.0 {
            return Err(TunerError::Configuration(format!(
                "frequency bounds must be positive and finite (got {}..{})",
                self.min_hz, self.max_hz
            )));
        }
        if self.min_hz >= self.max_hz {
            return Err(TunerError::Configuration(format!(
                "min_hz ({}) must be below max_hz ({})",
                self.min_hz, self.max_hz
            )));
        }
        if !self.silence_threshold.is_finite() || self.silence_threshold < 0.0 {
            return Err(TunerError::Configuration(format!(
                "silence threshold must be a non-negative number (got {})",
                self.silence_threshold
            )));
        }
        if self.frame_size < MIN_FRAME_LEN {
            return Err(TunerError::Configuration(format!(
                "frame size must be at least {} samples (got {})",
                MIN_FRAME_LEN, self.frame_size
            )));
        }
        if self.sample_rate == 0 {
            return Err(TunerError::Configuration("sample rate must be positive".into()));
        }
        if !self.in_tune_cents.is_finite() || self.in_tune_cents < 0.0 {
            return Err(TunerError::Configuration(format!(
                "in-tune window must be a non-negative number of cents (got {})",
                self.in_tune_cents
            )));
        }
        Ok(())
    }

    /// Loads and validates a config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())?;
        let config: TunerConfig = serde_json::from_str(&data)?;
        config.validate()?;
        log::debug!("Loaded tuner config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Saves the config as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json_string = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json_string)?;
        log::debug!("Saved tuner config to {}", path.as_ref().display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TunerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reference_pitches.len(), 4);
        assert_eq!(config.frame_size, 2048);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let err = TunerConfig::new(tuning::standard_ukulele(), 1000.0, 50.0, 0.01).unwrap_err();
        assert!(matches!(err, TunerError::Configuration(_)));
        assert!(TunerConfig::new(tuning::standard_ukulele(), 440.0, 440.0, 0.01).is_err());
    }

    #[test]
    fn empty_references_are_rejected() {
        assert!(matches!(
            TunerConfig::new(vec![], 50.0, 1000.0, 0.01),
            Err(TunerError::Configuration(_))
        ));
    }

    #[test]
    fn negative_silence_threshold_is_rejected() {
        assert!(TunerConfig::new(tuning::standard_ukulele(), 50.0, 1000.0, -0.1).is_err());
    }

    #[test]
    fn tiny_frame_is_rejected() {
        let config = TunerConfig::default().with_frame_size(2);
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_uses_defaults() {
        let json = r#"{ "min_hz": 80.0, "strategy": "zero-crossing" }"#;
        let config: TunerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.min_hz, 80.0);
        assert_eq!(config.max_hz, DEFAULT_MAX_HZ);
        assert_eq!(config.strategy, DetectionStrategy::ZeroCrossing);
        assert_eq!(config.reference_pitches, tuning::standard_ukulele());
    }

    #[test]
    fn save_then_load() {
        let path = std::env::temp_dir()
            .join(format!("uke-tuner-config-{}.json", std::process::id()));
        let config = TunerConfig::default().with_strategy(DetectionStrategy::Spectral);
        config.save(&path).unwrap();
        let loaded = TunerConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, config);
    }

    #[test]
    fn loading_invalid_file_fails_validation() {
        let path = std::env::temp_dir().join(format!("uke-tuner-bad-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "min_hz": 900.0, "max_hz": 100.0 }"#).unwrap();
        let result = TunerConfig::load(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(TunerError::Configuration(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let result = TunerConfig::load("/nonexistent/uke-tuner.json");
        assert!(matches!(result, Err(TunerError::Io(_))));
    }
}
