//! Synthetic signals.
//!
//! [`ToneSource`] stands in for a microphone: it plays a steady sine into
//! the estimator at real-time pace, which is enough to demo the tuner
//! without hardware and to exercise the full start/stop lifecycle in tests.

use std::f32::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::AudioFrame;
use crate::audio::{ActiveCapture, CaptureSource, FrameSink};
use crate::error::CaptureFailure;

/// Generates `len` samples of a sine at `freq` Hz.
pub fn sine_wave(freq: f32, sample_rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
    let step = 2.0 * PI * freq / sample_rate as f32;
    (0..len).map(|i| amplitude * (step * i as f32).sin()).collect()
}

/// A capture source that produces a pure tone.
#[derive(Debug, Clone)]
pub struct ToneSource {
    frequency_hz: f32,
    sample_rate: u32,
    amplitude: f32,
    paced: bool,
}

impl ToneSource {
    pub fn new(frequency_hz: f32, sample_rate: u32) -> Self {
        Self {
            frequency_hz,
            sample_rate,
            amplitude: 0.5,
            paced: true,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Without pacing, frames are produced as fast as they are accepted.
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }
}

impl CaptureSource for ToneSource {
    fn open(&mut self, sink: FrameSink) -> Result<Box<dyn ActiveCapture>, CaptureFailure> {
        if self.sample_rate == 0 {
            return Err(CaptureFailure::Backend("sample rate must be positive".into()));
        }

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let source = self.clone();
        let frame_size = sink.frame_size();

        let handle = thread::Builder::new()
            .name("tone-source".into())
            .spawn(move || {
                let step = 2.0 * PI * source.frequency_hz / source.sample_rate as f32;
                let mut phase = 0.0_f32;
                while flag.load(Ordering::Acquire) {
                    let samples: Vec<f32> = (0..frame_size)
                        .map(|_| {
                            let s = source.amplitude * phase.sin();
                            phase = (phase + step) % (2.0 * PI);
                            s
                        })
                        .collect();
                    let frame = AudioFrame::new(samples, source.sample_rate);
                    let frame_period = Duration::from_secs_f32(frame.duration_secs());
                    sink.deliver(frame);
                    if source.paced {
                        thread::sleep(frame_period);
                    } else {
                        thread::yield_now();
                    }
                }
            })
            .map_err(|e| CaptureFailure::Backend(e.to_string()))?;

        Ok(Box::new(ToneCapture {
            running,
            handle: Some(handle),
        }))
    }
}

struct ToneCapture {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ActiveCapture for ToneCapture {
    fn release(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("Tone source thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_wave_has_requested_shape() {
        let wave = sine_wave(1000.0, 4000, 8, 0.5);
        // Quarter-period steps: 0, peak, 0, trough.
        assert!(wave[0].abs() < 1e-6);
        assert!((wave[1] - 0.5).abs() < 1e-5);
        assert!(wave[2].abs() < 1e-5);
        assert!((wave[3] + 0.5).abs() < 1e-5);
    }

    #[test]
    fn zero_sample_rate_cannot_open() {
        let (tx, _rx) = crossbeam_channel::bounded(1);
        let sink = FrameSink::new(tx, Arc::new(AtomicBool::new(true)), 16);
        let mut source = ToneSource::new(440.0, 0);
        assert!(source.open(sink).is_err());
    }
}
