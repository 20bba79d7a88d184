//! # Pitch Detection Module
//!
//! Frequency estimators for a single frame of audio. All of them are pure
//! functions of the frame; the caller applies the silence gate and the
//! plausible-range check.
//!
//! ## Features
//! - Autocorrelation with peak picking and parabolic interpolation (primary)
//! - Zero-crossing rate (cheap, less accurate on inharmonic signals)
//! - FFT peak picking with log-parabolic refinement

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::fft::SpectrumAnalyzer;

/// Fraction of the strongest autocorrelation peak a shorter lag must reach
/// to be chosen over it. Keeps octave multiples of the period from winning.
const PEAK_SELECTION_RATIO: f32 = 0.9;

/// Frames shorter than this cannot hold a meaningful period.
pub const MIN_FRAME_LEN: usize = 4;

/// How a frame's dominant frequency is estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionStrategy {
    /// Time-domain autocorrelation. Robust to harmonic content.
    #[default]
    Autocorrelation,
    /// Zero-crossing rate. Cheaper, but inharmonic or noisy signals
    /// produce extra crossings and skew the result.
    ZeroCrossing,
    /// Strongest spectral peak. Can lock onto a loud overtone.
    Spectral,
}

impl DetectionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            DetectionStrategy::Autocorrelation => "autocorrelation",
            DetectionStrategy::ZeroCrossing => "zero-crossing",
            DetectionStrategy::Spectral => "spectral",
        }
    }
}

impl fmt::Display for DetectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DetectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "autocorrelation" | "acf" => Ok(DetectionStrategy::Autocorrelation),
            "zero-crossing" | "zcr" => Ok(DetectionStrategy::ZeroCrossing),
            "spectral" | "fft" => Ok(DetectionStrategy::Spectral),
            other => Err(format!("unknown detection strategy '{}'", other)),
        }
    }
}

/// Root-mean-square amplitude of a signal. Zero for an empty signal.
pub fn rms(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

/// Estimates frequency by autocorrelation.
///
/// For each lag `L` up to half the frame, `r(L)` sums `x[i] * x[i + L]`
/// over the first half of the frame. Each lag is scored as
/// `2 * r(L) - e(L)`, where `e(L)` is the energy of the lagged window; this
/// is the correlation minus the energy it gains from the window sliding,
/// and it peaks exactly at multiples of the period instead of being pulled
/// by the frame edges. Local maxima of the score are the candidate periods;
/// the shortest one reaching `PEAK_SELECTION_RATIO` of the strongest wins.
/// Lags longer than one period of `min_hz` are not searched. Parabolic
/// interpolation around the winner gives sub-sample precision.
///
/// # Returns
/// * `Some(frequency)` - Estimated frequency in Hz
/// * `None` - No correlation peak (flat, DC-only or too short a signal)
pub fn detect_autocorrelation(signal: &[f32], sample_rate: u32, min_hz: f32) -> Option<f32> {
    let half = signal.len() / 2;
    if signal.len() < MIN_FRAME_LEN || sample_rate == 0 {
        return None;
    }

    // --- Lag window ---
    let sr = sample_rate as f32;
    let max_lag = if min_hz > 0.0 {
        ((sr / min_hz).ceil() as usize).clamp(1, half - 1)
    } else {
        half - 1
    };

    // --- Scores, one extra lag past the window for peak tests ---
    let mut lagged_energy: f32 = signal[..half].iter().map(|s| s * s).sum();
    let mut score = Vec::with_capacity(max_lag + 2);
    for lag in 0..=max_lag + 1 {
        if lag > 0 {
            let leaving = signal[lag - 1];
            let entering = signal[lag + half - 1];
            lagged_energy += entering * entering - leaving * leaving;
        }
        let corr: f32 = signal[..half]
            .iter()
            .zip(&signal[lag..lag + half])
            .map(|(a, b)| a * b)
            .sum();
        score.push(2.0 * corr - lagged_energy);
    }
    let at = |lag: usize| score[lag];

    let peaks: Vec<usize> = (1..=max_lag)
        .filter(|&lag| at(lag) > at(lag - 1) && at(lag) >= at(lag + 1) && at(lag) > 0.0)
        .collect();
    let strongest = peaks.iter().map(|&lag| at(lag)).fold(0.0_f32, f32::max);
    if strongest <= 0.0 {
        return None;
    }
    let period = *peaks
        .iter()
        .find(|&&lag| at(lag) >= PEAK_SELECTION_RATIO * strongest)?;

    // --- Parabolic interpolation for better precision ---
    let y1 = at(period - 1);
    let y2 = at(period);
    let y3 = at(period + 1);
    let curvature = y1 - 2.0 * y2 + y3;
    let period_float = if curvature != 0.0 {
        period as f32 + (y1 - y3) / (2.0 * curvature)
    } else {
        period as f32
    };

    let frequency = sr / period_float;
    (frequency.is_finite() && frequency > 0.0).then_some(frequency)
}

/// Estimates frequency from the zero-crossing rate.
///
/// A periodic signal crosses its mean twice per period, so
/// `f = sample_rate * crossings / (2 * span)`. The span is measured between
/// the first and last crossing (linearly interpolated), which removes the
/// partial periods at the frame edges from the count.
pub fn detect_zero_crossing(signal: &[f32], sample_rate: u32) -> Option<f32> {
    if signal.len() < MIN_FRAME_LEN || sample_rate == 0 {
        return None;
    }

    let mean = signal.iter().sum::<f32>() / signal.len() as f32;
    let mut first: Option<f32> = None;
    let mut last = 0.0_f32;
    let mut crossings = 0usize;

    for (i, pair) in signal.windows(2).enumerate() {
        let a = pair[0] - mean;
        let b = pair[1] - mean;
        if (a < 0.0) != (b < 0.0) {
            // Fractional position of the crossing between i and i + 1.
            let position = i as f32 + a / (a - b);
            if first.is_none() {
                first = Some(position);
            }
            last = position;
            crossings += 1;
        }
    }

    let first = first?;
    let span = last - first;
    if crossings < 2 || span <= 0.0 {
        return None;
    }
    let frequency = sample_rate as f32 * (crossings - 1) as f32 / (2.0 * span);
    (frequency.is_finite() && frequency > 0.0).then_some(frequency)
}

/// Estimates frequency from the strongest spectral peak, refined by
/// log-parabolic interpolation.
pub fn detect_spectral(
    analyzer: &SpectrumAnalyzer,
    signal: &[f32],
    sample_rate: u32,
) -> Option<f32> {
    if signal.len() < MIN_FRAME_LEN || sample_rate == 0 {
        return None;
    }
    let magnitudes = analyzer.magnitudes(signal)?;
    let bin_hz = sample_rate as f32 / signal.len() as f32;

    // Bin 0 is DC.
    let (peak_bin, &peak) = magnitudes
        .iter()
        .enumerate()
        .skip(1)
        .max_by(|a, b| a.1.total_cmp(b.1))?;
    if peak <= f32::EPSILON {
        return None;
    }
    let frequency = interpolate_peak(&magnitudes, peak_bin) * bin_hz;
    (frequency.is_finite() && frequency > 0.0).then_some(frequency)
}

/// Fractional position of the spectral peak at `peak_bin`.
///
/// Fits a parabola through the log magnitudes of the peak and its two
/// neighbours. A Hann-windowed sinusoid is close to Gaussian around its
/// peak, so the log fit is nearly exact. Falls back to the bin itself at
/// the spectrum edges or when a neighbour is silent.
pub fn interpolate_peak(magnitudes: &[f32], peak_bin: usize) -> f32 {
    let fallback = peak_bin as f32;
    if peak_bin == 0 || peak_bin + 1 >= magnitudes.len() {
        return fallback;
    }

    let [left, centre, right] =
        [peak_bin - 1, peak_bin, peak_bin + 1].map(|bin| magnitudes[bin].ln());
    if !(left.is_finite() && centre.is_finite() && right.is_finite()) {
        return fallback;
    }

    let curvature = 2.0 * centre - left - right;
    if curvature.abs() < 1e-6 {
        return fallback;
    }
    // The vertex lies within half a bin of a true local maximum.
    let shift = ((right - left) / (2.0 * curvature)).clamp(-0.5, 0.5);
    fallback + shift
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::sine_wave;

    fn assert_close(actual: f32, expected: f32, tolerance: f32) {
        assert!(
            (actual - expected).abs() <= expected * tolerance,
            "expected {} within {}%, got {}",
            expected,
            tolerance * 100.0,
            actual
        );
    }

    #[test]
    fn rms_of_constant_is_its_magnitude() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[-0.5; 16]) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn rms_of_sine_is_amplitude_over_sqrt2() {
        let wave = sine_wave(441.0, 44100, 4410, 1.0);
        assert!((rms(&wave) - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-3);
    }

    #[test]
    fn autocorrelation_finds_a4() {
        let wave = sine_wave(440.0, 44100, 2048, 0.5);
        let freq = detect_autocorrelation(&wave, 44100, 50.0).unwrap();
        assert_close(freq, 440.0, 0.005);
    }

    #[test]
    fn autocorrelation_avoids_octave_errors_on_harmonics() {
        // Fundamental plus a louder second harmonic.
        let fundamental = sine_wave(196.0, 44100, 2048, 0.3);
        let harmonic = sine_wave(392.0, 44100, 2048, 0.5);
        let signal: Vec<f32> = fundamental.iter().zip(&harmonic).map(|(a, b)| a + b).collect();
        let freq = detect_autocorrelation(&signal, 44100, 50.0).unwrap();
        assert_close(freq, 196.0, 0.03);
    }

    #[test]
    fn autocorrelation_reports_high_tones_unclamped() {
        // Range rejection is the caller's job; the detector must not fold a
        // high tone down onto a subharmonic.
        let wave = sine_wave(1500.0, 44100, 2048, 0.5);
        let freq = detect_autocorrelation(&wave, 44100, 50.0).unwrap();
        assert_close(freq, 1500.0, 0.01);
    }

    #[test]
    fn autocorrelation_rejects_dc() {
        let signal = vec![0.5; 2048];
        assert!(detect_autocorrelation(&signal, 44100, 50.0).is_none());
    }

    #[test]
    fn autocorrelation_handles_tiny_frames() {
        assert!(detect_autocorrelation(&[0.1, -0.1], 44100, 50.0).is_none());
        assert!(detect_autocorrelation(&[0.1; 64], 0, 50.0).is_none());
    }

    #[test]
    fn zero_crossing_finds_c4() {
        let wave = sine_wave(261.63, 44100, 2048, 0.5);
        let freq = detect_zero_crossing(&wave, 44100).unwrap();
        assert_close(freq, 261.63, 0.01);
    }

    #[test]
    fn zero_crossing_ignores_dc_offset() {
        let signal: Vec<f32> = sine_wave(329.63, 48000, 2048, 0.3)
            .into_iter()
            .map(|s| s + 0.2)
            .collect();
        let freq = detect_zero_crossing(&signal, 48000).unwrap();
        assert_close(freq, 329.63, 0.01);
    }

    #[test]
    fn zero_crossing_needs_two_crossings() {
        assert!(detect_zero_crossing(&[0.2; 128], 44100).is_none());
    }

    #[test]
    fn spectral_finds_g4() {
        let analyzer = SpectrumAnalyzer::new(4096);
        let wave = sine_wave(392.0, 44100, 4096, 0.5);
        let freq = detect_spectral(&analyzer, &wave, 44100).unwrap();
        assert_close(freq, 392.0, 0.01);
    }

    #[test]
    fn peak_interpolation_leans_toward_the_louder_neighbour() {
        let magnitudes = [0.1, 0.5, 1.0, 0.8, 0.1];
        let bin = interpolate_peak(&magnitudes, 2);
        assert!(bin > 2.0 && bin < 2.5, "{}", bin);
        // Symmetric neighbours leave the peak where it is.
        assert_eq!(interpolate_peak(&[0.1, 0.5, 1.0, 0.5, 0.1], 2), 2.0);
    }

    #[test]
    fn peak_interpolation_falls_back_at_the_edges() {
        assert_eq!(interpolate_peak(&[1.0, 0.5, 0.1], 0), 0.0);
        assert_eq!(interpolate_peak(&[0.1, 0.5, 1.0], 2), 2.0);
        assert_eq!(interpolate_peak(&[0.0, 1.0, 0.5], 1), 1.0);
    }

    #[test]
    fn strategy_names_round_trip() {
        for strategy in [
            DetectionStrategy::Autocorrelation,
            DetectionStrategy::ZeroCrossing,
            DetectionStrategy::Spectral,
        ] {
            assert_eq!(strategy.name().parse::<DetectionStrategy>(), Ok(strategy));
        }
        assert!("yin".parse::<DetectionStrategy>().is_err());
    }
}
