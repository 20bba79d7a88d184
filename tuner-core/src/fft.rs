//! # Fast Fourier Transform (FFT) Module
//!
//! Frequency-domain helpers for the spectral detection strategy: DC
//! removal, Hann windowing, a forward FFT planned once per frame size, and
//! magnitude extraction.

use std::sync::Arc;

use rustfft::{Fft, FftPlanner, num_complex::Complex};

/// Removes the DC offset from a signal by making its average value zero.
pub fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Applies a Hann window to the input buffer to reduce spectral leakage.
pub fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// A forward FFT for one fixed frame size.
///
/// Planning is the expensive part, so the plan is kept and reused for every
/// frame of the same size.
#[derive(Clone)]
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f32>>,
    size: usize,
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("size", &self.size)
            .finish()
    }
}

impl SpectrumAnalyzer {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        Self { fft, size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Performs a forward FFT on a signal and returns the complex spectrum.
    ///
    /// The signal is DC-corrected and Hann-windowed first. Returns `None`
    /// when the signal length does not match the planned size.
    pub fn perform_fft(&self, signal: &[f32]) -> Option<Vec<Complex<f32>>> {
        if signal.len() != self.size {
            return None;
        }

        let mut processed_signal = signal.to_vec();
        remove_dc_offset(&mut processed_signal);
        apply_hann_window(&mut processed_signal);

        let mut buffer: Vec<Complex<f32>> = processed_signal
            .into_iter()
            .map(|sample| Complex { re: sample, im: 0.0 })
            .collect();

        self.fft.process(&mut buffer);
        Some(buffer)
    }

    /// Convenience wrapper returning the magnitude spectrum directly.
    pub fn magnitudes(&self, signal: &[f32]) -> Option<Vec<f32>> {
        self.perform_fft(signal)
            .map(|spectrum| spectrum_to_magnitudes(&spectrum))
    }
}

/// Calculates the magnitude vector from a complex spectrum.
///
/// Only the first half of the spectrum (up to Nyquist) is kept.
pub fn spectrum_to_magnitudes(spectrum: &[Complex<f32>]) -> Vec<f32> {
    spectrum
        .iter()
        .take(spectrum.len() / 2)
        .map(|c| c.norm()) // .norm() is sqrt(re^2 + im^2)
        .collect()
}
