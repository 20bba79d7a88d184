//! # Pitch Estimator
//!
//! [`Analyzer`] turns one frame into an optional [`PitchEstimate`] and holds
//! nothing but the validated configuration. [`PitchEstimator`] owns the
//! capture lifecycle around it:
//!
//! ```text
//! Idle --start()--> Listening --stop()--> Idle
//! ```
//!
//! While listening, the capture source pushes frames through a one-slot
//! channel to a worker thread, which analyses each frame and forwards the
//! result. A frame that arrives while the worker is busy is dropped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};

use crate::audio::{ActiveCapture, CaptureSource, FrameSink};
use crate::config::TunerConfig;
use crate::error::{Result, TunerError};
use crate::fft::SpectrumAnalyzer;
use crate::pitch::{self, DetectionStrategy, MIN_FRAME_LEN};
use crate::tuning::{ReferencePitch, ReferenceSet, cents_between};
use crate::{AudioFrame, PitchEstimate};

/// Lifecycle state of a [`PitchEstimator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorState {
    Idle,
    Listening,
}

/// Stateless per-frame analysis.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: TunerConfig,
    references: ReferenceSet,
    spectrum: Option<SpectrumAnalyzer>,
}

impl Analyzer {
    pub fn new(config: TunerConfig) -> Result<Self> {
        config.validate()?;
        let references = ReferenceSet::new(config.reference_pitches.clone())?;
        let spectrum = (config.strategy == DetectionStrategy::Spectral)
            .then(|| SpectrumAnalyzer::new(config.frame_size));
        Ok(Self {
            config,
            references,
            spectrum,
        })
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Analyses one frame.
    ///
    /// Returns `None` for silence, for frames without a clear period and for
    /// candidates outside the configured range. Never panics.
    pub fn process_frame(&self, frame: &AudioFrame) -> Option<PitchEstimate> {
        let samples = &frame.samples;
        if samples.len() < MIN_FRAME_LEN || frame.sample_rate == 0 {
            return None;
        }

        // --- Noise gate ---
        if pitch::rms(samples) < self.config.silence_threshold {
            return None;
        }

        let raw = self.estimate_frequency(frame)?;

        // --- Plausible range ---
        let Some(candidate) = snap_to_range(raw, self.config.min_hz, self.config.max_hz) else {
            log::trace!("Discarding out-of-range candidate {:.2} Hz", raw);
            return None;
        };

        let (reference, deviation_cents) = self.references.closest(candidate)?;
        Some(PitchEstimate {
            frequency_hz: candidate,
            closest_reference: reference.label.clone(),
            reference_hz: reference.frequency_hz,
            deviation_cents,
        })
    }

    fn estimate_frequency(&self, frame: &AudioFrame) -> Option<f32> {
        let AudioFrame {
            samples,
            sample_rate,
        } = frame;
        match self.config.strategy {
            DetectionStrategy::Autocorrelation => {
                pitch::detect_autocorrelation(samples, *sample_rate, self.config.min_hz)
            }
            DetectionStrategy::ZeroCrossing => pitch::detect_zero_crossing(samples, *sample_rate),
            DetectionStrategy::Spectral => match &self.spectrum {
                Some(spectrum) if spectrum.size() == samples.len() => {
                    pitch::detect_spectral(spectrum, samples, *sample_rate)
                }
                // Off-size frames need their own plan.
                _ => pitch::detect_spectral(
                    &SpectrumAnalyzer::new(samples.len()),
                    samples,
                    *sample_rate,
                ),
            },
        }
    }
}

/// How far outside `[min_hz, max_hz]` a candidate may land and still count
/// as the bound itself. Covers detector rounding for tones exactly at a
/// bound.
const RANGE_TOLERANCE_CENTS: f32 = 1.0;

/// Returns `candidate` if it lies in `[min_hz, max_hz]`, the bound if it
/// misses one by at most `RANGE_TOLERANCE_CENTS`, and `None` otherwise.
fn snap_to_range(candidate: f32, min_hz: f32, max_hz: f32) -> Option<f32> {
    if !candidate.is_finite() || candidate <= 0.0 {
        return None;
    }
    if candidate < min_hz {
        (cents_between(min_hz, candidate) <= RANGE_TOLERANCE_CENTS).then_some(min_hz)
    } else if candidate > max_hz {
        (cents_between(candidate, max_hz) <= RANGE_TOLERANCE_CENTS).then_some(max_hz)
    } else {
        Some(candidate)
    }
}

/// Everything owned by one listening session.
struct Session {
    listening: Arc<AtomicBool>,
    shutdown_tx: Sender<()>,
    worker: Option<JoinHandle<()>>,
    capture: Option<Box<dyn ActiveCapture>>,
}

/// A pitch estimator with an explicit capture lifecycle.
pub struct PitchEstimator {
    analyzer: Arc<Analyzer>,
    session: Option<Session>,
}

impl std::fmt::Debug for PitchEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PitchEstimator")
            .field("analyzer", &self.analyzer)
            .field("state", &self.state())
            .finish()
    }
}

impl PitchEstimator {
    /// Creates an idle estimator from a full configuration.
    pub fn new(config: TunerConfig) -> Result<Self> {
        let analyzer = Analyzer::new(config)?;
        log::debug!(
            "Configured estimator: {} references, {}..{} Hz, {} strategy",
            analyzer.config.reference_pitches.len(),
            analyzer.config.min_hz,
            analyzer.config.max_hz,
            analyzer.config.strategy
        );
        Ok(Self {
            analyzer: Arc::new(analyzer),
            session: None,
        })
    }

    /// Creates an idle estimator from references, bounds and the silence
    /// gate, with defaults for everything else.
    pub fn configure(
        reference_pitches: Vec<ReferencePitch>,
        min_hz: f32,
        max_hz: f32,
        silence_threshold: f32,
    ) -> Result<Self> {
        Self::new(TunerConfig::new(
            reference_pitches,
            min_hz,
            max_hz,
            silence_threshold,
        )?)
    }

    pub fn config(&self) -> &TunerConfig {
        self.analyzer.config()
    }

    pub fn state(&self) -> EstimatorState {
        match &self.session {
            Some(session) if session.listening.load(Ordering::Acquire) => {
                EstimatorState::Listening
            }
            _ => EstimatorState::Idle,
        }
    }

    /// Analyses one frame synchronously, independent of the lifecycle.
    pub fn process_frame(&self, frame: &AudioFrame) -> Option<PitchEstimate> {
        self.analyzer.process_frame(frame)
    }

    /// Starts consuming frames from `source`.
    ///
    /// Returns a receiver yielding one item per analysed frame. On error the
    /// estimator stays idle and `start` may be retried.
    ///
    /// Dropping the receiver ends the session: the state turns idle and
    /// further frames are discarded. The capture device is still held until
    /// `stop`, drop, or the next `start`.
    pub fn start<S>(&mut self, source: &mut S) -> Result<Receiver<Option<PitchEstimate>>>
    where
        S: CaptureSource + ?Sized,
    {
        match self.state() {
            EstimatorState::Listening => return Err(TunerError::AlreadyListening),
            // A session whose receiver went away still owns its capture.
            EstimatorState::Idle => self.stop(),
        }
        if !source.is_secure_context() {
            log::warn!("Refusing to capture outside a secure context");
            return Err(TunerError::InsecureContext);
        }

        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<AudioFrame>(1);
        let (estimate_tx, estimate_rx) = crossbeam_channel::unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let listening = Arc::new(AtomicBool::new(true));

        let sink = FrameSink::new(frame_tx, Arc::clone(&listening), self.config().frame_size);
        let capture = match source.open(sink) {
            Ok(capture) => capture,
            Err(reason) => {
                listening.store(false, Ordering::Release);
                log::warn!("Could not start capture: {}", reason);
                return Err(TunerError::CaptureUnavailable(reason));
            }
        };

        let analyzer = Arc::clone(&self.analyzer);
        let flag = Arc::clone(&listening);
        let spawned = thread::Builder::new()
            .name("pitch-estimator".into())
            .spawn(move || run_worker(&analyzer, &flag, &frame_rx, &shutdown_rx, &estimate_tx));
        let worker = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                listening.store(false, Ordering::Release);
                let mut capture = capture;
                capture.release();
                return Err(TunerError::CaptureUnavailable(
                    crate::error::CaptureFailure::Backend(e.to_string()),
                ));
            }
        };

        self.session = Some(Session {
            listening,
            shutdown_tx,
            worker: Some(worker),
            capture: Some(capture),
        });
        log::info!("Estimator listening");
        Ok(estimate_rx)
    }

    /// Stops listening and releases the capture. Safe to call repeatedly.
    ///
    /// The state flips to idle before anything is torn down, so frames
    /// delivered during shutdown are discarded.
    pub fn stop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.listening.store(false, Ordering::Release);
        let _ = session.shutdown_tx.try_send(());

        if let Some(handle) = session.worker.take() {
            if handle.join().is_err() {
                log::error!("Estimator worker panicked");
            }
        }
        if let Some(mut capture) = session.capture.take() {
            capture.release();
        }
        log::info!("Estimator stopped");
    }
}

impl Drop for PitchEstimator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    analyzer: &Analyzer,
    listening: &AtomicBool,
    frames: &Receiver<AudioFrame>,
    shutdown: &Receiver<()>,
    estimates: &Sender<Option<PitchEstimate>>,
) {
    log::debug!("Estimator worker started");
    loop {
        crossbeam_channel::select! {
            recv(frames) -> msg => match msg {
                Ok(frame) => {
                    if !listening.load(Ordering::Acquire) {
                        break;
                    }
                    let estimate = analyzer.process_frame(&frame);
                    if estimates.send(estimate).is_err() {
                        log::debug!("Estimate receiver dropped");
                        break;
                    }
                }
                Err(_) => {
                    log::debug!("Frame channel closed");
                    break;
                }
            },
            recv(shutdown) -> _ => break,
        }
    }
    listening.store(false, Ordering::Release);
    log::debug!("Estimator worker finished");
}
