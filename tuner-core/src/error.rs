//! Error types for the tuner.
//!
//! Only setup and capture problems are errors. A frame that is silent, out
//! of range or has no clear period is an ordinary `None` estimate.

use std::fmt;

/// Why the capture source could not be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureFailure {
    /// The platform refused access to the microphone.
    PermissionDenied,
    /// No input device exists.
    NoDevice,
    /// The device exists but is held by another application.
    DeviceBusy,
    /// Any other backend error, with the backend's own description.
    Backend(String),
}

impl fmt::Display for CaptureFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureFailure::PermissionDenied => write!(f, "microphone access denied"),
            CaptureFailure::NoDevice => write!(f, "no audio input device found"),
            CaptureFailure::DeviceBusy => write!(f, "audio input device is busy"),
            CaptureFailure::Backend(msg) => write!(f, "audio backend error: {}", msg),
        }
    }
}

/// Errors returned by the tuner.
#[derive(Debug, Clone, PartialEq)]
pub enum TunerError {
    /// Invalid reference pitches or bounds. Raised before any capture.
    Configuration(String),

    /// The capture source could not be started. Retrying later may work.
    CaptureUnavailable(CaptureFailure),

    /// The environment is not trusted for audio capture.
    InsecureContext,

    /// `start` was called while the estimator was already listening.
    AlreadyListening,

    /// Reading or writing a config file failed.
    Io(String),

    /// A config file could not be parsed or serialized.
    Parse(String),
}

impl TunerError {
    /// A message suitable for showing to the person holding the instrument.
    pub fn user_message(&self) -> String {
        match self {
            TunerError::InsecureContext => {
                "Microphone capture requires a secure context.".to_string()
            }
            TunerError::CaptureUnavailable(CaptureFailure::PermissionDenied) => {
                "Microphone access was not allowed. Check the permission settings.".to_string()
            }
            TunerError::CaptureUnavailable(CaptureFailure::NoDevice) => {
                "No microphone found. Check that one is connected and working.".to_string()
            }
            TunerError::CaptureUnavailable(CaptureFailure::DeviceBusy) => {
                "The microphone could not be used. Is another application using it?".to_string()
            }
            TunerError::CaptureUnavailable(CaptureFailure::Backend(msg)) => {
                format!("Starting the microphone failed: {}", msg)
            }
            other => other.to_string(),
        }
    }

    /// Whether calling `start` again later can succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            TunerError::CaptureUnavailable(_) | TunerError::InsecureContext
        )
    }
}

impl fmt::Display for TunerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TunerError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            TunerError::CaptureUnavailable(reason) => write!(f, "Capture unavailable: {}", reason),
            TunerError::InsecureContext => write!(f, "Capture refused: insecure context"),
            TunerError::AlreadyListening => write!(f, "Estimator is already listening"),
            TunerError::Io(msg) => write!(f, "I/O error: {}", msg),
            TunerError::Parse(msg) => write!(f, "Parse error: {}", msg),
        }
    }
}

impl std::error::Error for TunerError {}

impl From<CaptureFailure> for TunerError {
    fn from(reason: CaptureFailure) -> Self {
        TunerError::CaptureUnavailable(reason)
    }
}

impl From<std::io::Error> for TunerError {
    fn from(err: std::io::Error) -> Self {
        TunerError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TunerError {
    fn from(err: serde_json::Error) -> Self {
        TunerError::Parse(err.to_string())
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, TunerError>;
