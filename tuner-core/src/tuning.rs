//! # Musical Tuning Module
//!
//! Reference pitches for the instrument's open strings, nearest-string
//! lookup, cent deviation and the feedback shown to the player.
//!
//! ## Features
//! - Standard ukulele GCEA reference set
//! - Nearest reference lookup with a fixed tie-break
//! - Cent deviation calculations for tuning accuracy
//! - Tighten / loosen / in-tune instruction and needle offset

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TunerError};

/// Cent window inside which a string counts as in tune.
pub const DEFAULT_IN_TUNE_CENTS: f32 = 5.0;

/// Upper bound of the "close" accuracy band, in cents.
const CLOSE_CENTS: f32 = 15.0;

/// Half-width of the needle travel.
const NEEDLE_RANGE: f32 = 50.0;

/// One open-string target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePitch {
    /// String label (e.g., "A4", "G4")
    pub label: String,
    /// Target frequency in Hz
    pub frequency_hz: f32,
}

impl ReferencePitch {
    pub fn new(label: impl Into<String>, frequency_hz: f32) -> Self {
        Self {
            label: label.into(),
            frequency_hz,
        }
    }
}

/// Reference pitches of a ukulele in standard GCEA tuning.
///
/// Order matters: it is the iteration order of the nearest-string search
/// and therefore decides ties.
static STANDARD_UKULELE: Lazy<Vec<ReferencePitch>> = Lazy::new(|| {
    [("G4", 392.00), ("C4", 261.63), ("E4", 329.63), ("A4", 440.00)]
        .into_iter()
        .map(|(label, freq)| ReferencePitch::new(label, freq))
        .collect()
});

/// Returns the standard GCEA ukulele reference set.
pub fn standard_ukulele() -> Vec<ReferencePitch> {
    STANDARD_UKULELE.clone()
}

/// Calculates the deviation from a target frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
pub fn cents_between(freq: f32, target_freq: f32) -> f32 {
    1200.0 * (freq / target_freq).log2()
}

/// A validated, non-empty set of reference pitches.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceSet {
    pitches: Vec<ReferencePitch>,
}

impl ReferenceSet {
    /// Builds a set, rejecting an empty list and unusable frequencies.
    pub fn new(pitches: Vec<ReferencePitch>) -> Result<Self> {
        if pitches.is_empty() {
            return Err(TunerError::Configuration(
                "at least one reference pitch is required".into(),
            ));
        }
        if let Some(bad) = pitches
            .iter()
            .find(|p| !p.frequency_hz.is_finite() || p.frequency_hz <= 0.0)
        {
            return Err(TunerError::Configuration(format!(
                "reference pitch {} has invalid frequency {}",
                bad.label, bad.frequency_hz
            )));
        }
        Ok(Self { pitches })
    }

    /// Finds the reference closest to `freq` in absolute Hz and the deviation
    /// from it in cents.
    ///
    /// Uses strict less-than over the configured order, so when two
    /// references are exactly equidistant the one listed first wins.
    pub fn closest(&self, freq: f32) -> Option<(&ReferencePitch, f32)> {
        if !freq.is_finite() || freq <= 0.0 {
            return None;
        }
        let mut best: Option<&ReferencePitch> = None;
        let mut best_diff = f32::INFINITY;
        for pitch in &self.pitches {
            let diff = (freq - pitch.frequency_hz).abs();
            if diff < best_diff {
                best_diff = diff;
                best = Some(pitch);
            }
        }
        best.map(|pitch| (pitch, cents_between(freq, pitch.frequency_hz)))
    }
}

/// What the player should do with the string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningInstruction {
    InTune,
    /// Pitch is flat.
    Tighten,
    /// Pitch is sharp.
    Loosen,
}

impl TuningInstruction {
    pub fn from_cents(cents: f32, in_tune_cents: f32) -> Self {
        if cents.abs() < in_tune_cents {
            TuningInstruction::InTune
        } else if cents > 0.0 {
            TuningInstruction::Loosen
        } else {
            TuningInstruction::Tighten
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TuningInstruction::InTune => "in tune",
            TuningInstruction::Tighten => "tighten",
            TuningInstruction::Loosen => "loosen",
        }
    }
}

/// Coarse accuracy band, used for colouring the needle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuningAccuracy {
    Good,
    Close,
    Off,
}

impl TuningAccuracy {
    /// `in_tune_cents` is the same window [`TuningInstruction::from_cents`]
    /// uses, so "in tune" always reads as `Good`.
    pub fn from_cents(cents: f32, in_tune_cents: f32) -> Self {
        let cents = cents.abs();
        if cents < in_tune_cents {
            TuningAccuracy::Good
        } else if cents < CLOSE_CENTS {
            TuningAccuracy::Close
        } else {
            TuningAccuracy::Off
        }
    }
}

/// Needle displacement for a deviation, two units per cent, clamped to ±50.
pub fn needle_offset(cents: f32) -> f32 {
    (cents * 2.0).clamp(-NEEDLE_RANGE, NEEDLE_RANGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set() -> ReferenceSet {
        ReferenceSet::new(standard_ukulele()).unwrap()
    }

    #[test]
    fn empty_set_is_rejected() {
        assert!(matches!(
            ReferenceSet::new(vec![]),
            Err(TunerError::Configuration(_))
        ));
    }

    #[test]
    fn non_positive_reference_is_rejected() {
        let pitches = vec![ReferencePitch::new("X", 0.0)];
        assert!(ReferenceSet::new(pitches).is_err());
    }

    #[test]
    fn exact_reference_has_zero_cents() {
        let set = set();
        let (pitch, cents) = set.closest(329.63).unwrap();
        assert_eq!(pitch.label, "E4");
        assert!(cents.abs() < 1e-4);
    }

    #[test]
    fn one_octave_is_1200_cents() {
        assert!((cents_between(880.0, 440.0) - 1200.0).abs() < 1e-3);
        assert!((cents_between(220.0, 440.0) + 1200.0).abs() < 1e-3);
    }

    #[test]
    fn degenerate_frequency_has_no_closest() {
        assert!(set().closest(0.0).is_none());
        assert!(set().closest(-5.0).is_none());
        assert!(set().closest(f32::NAN).is_none());
    }

    #[test]
    fn instruction_follows_sign() {
        assert_eq!(TuningInstruction::from_cents(2.0, 5.0), TuningInstruction::InTune);
        assert_eq!(TuningInstruction::from_cents(-4.9, 5.0), TuningInstruction::InTune);
        assert_eq!(TuningInstruction::from_cents(12.0, 5.0), TuningInstruction::Loosen);
        assert_eq!(TuningInstruction::from_cents(-12.0, 5.0), TuningInstruction::Tighten);
        assert_eq!(TuningInstruction::from_cents(5.0, 5.0), TuningInstruction::Loosen);
    }

    #[test]
    fn accuracy_bands() {
        assert_eq!(TuningAccuracy::from_cents(-3.0, 5.0), TuningAccuracy::Good);
        assert_eq!(TuningAccuracy::from_cents(10.0, 5.0), TuningAccuracy::Close);
        assert_eq!(TuningAccuracy::from_cents(-30.0, 5.0), TuningAccuracy::Off);
    }

    #[test]
    fn accuracy_follows_a_wider_in_tune_window() {
        assert_eq!(TuningInstruction::from_cents(7.0, 10.0), TuningInstruction::InTune);
        assert_eq!(TuningAccuracy::from_cents(7.0, 10.0), TuningAccuracy::Good);
        assert_eq!(TuningAccuracy::from_cents(12.0, 10.0), TuningAccuracy::Close);
    }

    #[test]
    fn needle_is_clamped() {
        assert_eq!(needle_offset(10.0), 20.0);
        assert_eq!(needle_offset(80.0), 50.0);
        assert_eq!(needle_offset(-80.0), -50.0);
    }
}
