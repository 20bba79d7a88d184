//! # Audio Capture Module
//!
//! The estimator never talks to a sound card directly. It hands a
//! [`FrameSink`] to a [`CaptureSource`], and the source pushes fixed-size
//! frames into it from whatever thread its platform uses. [`CpalCapture`] is
//! the real microphone backend; tests and demos inject their own sources.
//!
//! ## Features
//! - Injectable capture sources with an explicit release step
//! - Automatic cpal input device and config selection
//! - Re-chunking of callback buffers into fixed-size mono frames
//! - Frames are dropped, never queued, when the estimator is busy

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample, SupportedStreamConfig, SupportedStreamConfigRange};
use crossbeam_channel::{Sender, TrySendError};

use crate::AudioFrame;
use crate::error::CaptureFailure;

/// Default number of samples per audio frame.
///
/// Larger frames give more frequency resolution but increase latency.
pub const BUFFER_SIZE: usize = 2048;

/// Sample rate requested from the device when nothing else is configured.
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// The receiving end a capture source pushes frames into.
///
/// Delivery never blocks: a frame is dropped when the previous one is still
/// being analysed, and every frame is dropped once the estimator stops
/// listening.
#[derive(Debug, Clone)]
pub struct FrameSink {
    sender: Sender<AudioFrame>,
    listening: Arc<AtomicBool>,
    frame_size: usize,
}

impl FrameSink {
    pub(crate) fn new(
        sender: Sender<AudioFrame>,
        listening: Arc<AtomicBool>,
        frame_size: usize,
    ) -> Self {
        Self {
            sender,
            listening,
            frame_size,
        }
    }

    /// Number of samples per frame the estimator expects.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Acquire)
    }

    /// Offers a frame to the estimator. Returns `true` if it was accepted.
    pub fn deliver(&self, frame: AudioFrame) -> bool {
        if !self.is_listening() {
            return false;
        }
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::trace!("Estimator busy, dropping frame");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

/// A running capture that can be shut down.
pub trait ActiveCapture {
    /// Stops the device. Called exactly once by the estimator.
    fn release(&mut self);
}

/// Something that can produce audio frames on demand.
pub trait CaptureSource {
    /// Whether the environment is trusted for capture. Sources that run
    /// where this notion exists (e.g. a sandboxed host) override it.
    fn is_secure_context(&self) -> bool {
        true
    }

    /// Starts producing frames into `sink`.
    fn open(&mut self, sink: FrameSink) -> Result<Box<dyn ActiveCapture>, CaptureFailure>;
}

/// Accumulates interleaved callback buffers and emits mono frames of a
/// fixed size.
#[derive(Debug)]
pub struct FrameChunker {
    buffer: Vec<f32>,
    frame_size: usize,
    channels: usize,
}

impl FrameChunker {
    pub fn new(frame_size: usize, channels: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(frame_size * 2),
            frame_size,
            channels: channels.max(1),
        }
    }

    /// Appends interleaved samples and calls `emit` for every full frame.
    pub fn push(&mut self, data: &[f32], mut emit: impl FnMut(Vec<f32>)) {
        if self.channels == 1 {
            self.buffer.extend_from_slice(data);
        } else {
            let scale = 1.0 / self.channels as f32;
            self.buffer.extend(
                data.chunks(self.channels)
                    .map(|frame| frame.iter().sum::<f32>() * scale),
            );
        }

        // While we have enough data for a full frame, emit it.
        while self.buffer.len() >= self.frame_size {
            let frame: Vec<f32> = self.buffer.drain(..self.frame_size).collect();
            emit(frame);
        }
    }

    /// Samples waiting for the next full frame.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Microphone capture through the platform's default cpal host.
#[derive(Debug, Clone)]
pub struct CpalCapture {
    preferred_sample_rate: u32,
}

impl CpalCapture {
    pub fn new(preferred_sample_rate: u32) -> Self {
        Self {
            preferred_sample_rate,
        }
    }
}

impl Default for CpalCapture {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

impl CaptureSource for CpalCapture {
    /// Opens the default input device.
    ///
    /// This function:
    /// 1. Selects the default audio input device
    /// 2. Picks the supported config closest to the preferred sample rate
    /// 3. Builds a stream whose callback re-chunks audio into frames
    fn open(&mut self, sink: FrameSink) -> Result<Box<dyn ActiveCapture>, CaptureFailure> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(CaptureFailure::NoDevice)?;

        log::info!(
            "Using audio input device: {}",
            device.name().unwrap_or_else(|_| "unknown".to_string())
        );

        let configs = device
            .supported_input_configs()
            .map_err(|err| match err {
                cpal::SupportedStreamConfigsError::DeviceNotAvailable => CaptureFailure::NoDevice,
                other => classify_backend_error(other.to_string()),
            })?
            .collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, self.preferred_sample_rate)
            .ok_or_else(|| CaptureFailure::Backend("no suitable input format found".into()))?;

        let sample_format = supported_config.sample_format();
        let config: cpal::StreamConfig = supported_config.into();
        log::info!(
            "Selected {} Hz, {} channel(s), {:?}",
            config.sample_rate.0,
            config.channels,
            sample_format
        );

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, sink),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, sink),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, sink),
            other => {
                return Err(CaptureFailure::Backend(format!(
                    "unsupported sample format {:?}",
                    other
                )));
            }
        }
        .map_err(|err| match err {
            cpal::BuildStreamError::DeviceNotAvailable => CaptureFailure::NoDevice,
            other => classify_backend_error(other.to_string()),
        })?;

        stream.play().map_err(|err| match err {
            cpal::PlayStreamError::DeviceNotAvailable => CaptureFailure::NoDevice,
            other => classify_backend_error(other.to_string()),
        })?;

        Ok(Box::new(CpalStream {
            stream: Some(stream),
        }))
    }
}

/// Handle owning a playing cpal input stream.
struct CpalStream {
    stream: Option<cpal::Stream>,
}

impl ActiveCapture for CpalStream {
    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.pause() {
                log::warn!("Error pausing stream: {}", e);
            }
            drop(stream);
            log::debug!("Audio stream released");
        }
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sink: FrameSink,
) -> Result<cpal::Stream, cpal::BuildStreamError>
where
    T: Sample + SizedSample,
    f32: FromSample<T>,
{
    let sample_rate = config.sample_rate.0;
    let mut chunker = FrameChunker::new(sink.frame_size(), config.channels as usize);
    let mut converted: Vec<f32> = Vec::new();

    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            if !sink.is_listening() {
                return;
            }
            converted.clear();
            converted.extend(data.iter().map(|s| s.to_sample::<f32>()));
            chunker.push(&converted, |samples| {
                sink.deliver(AudioFrame::new(samples, sample_rate));
            });
        },
        stream_error,
        None,
    )
}

fn stream_error(err: cpal::StreamError) {
    log::error!("An error occurred on the audio stream: {}", err);
}

/// Backends report permission problems as free text.
fn classify_backend_error(message: String) -> CaptureFailure {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
        CaptureFailure::PermissionDenied
    } else if lower.contains("busy") || lower.contains("in use") {
        CaptureFailure::DeviceBusy
    } else {
        CaptureFailure::Backend(message)
    }
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Ranks by distance from the target rate, then prefers 32-bit float, then
/// mono. The chosen rate is clamped into the config's supported range.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfig> {
    configs
        .into_iter()
        .filter(|c| {
            matches!(
                c.sample_format(),
                cpal::SampleFormat::F32 | cpal::SampleFormat::I16 | cpal::SampleFormat::U16
            )
        })
        .min_by_key(|c| {
            let min = c.min_sample_rate().0;
            let max = c.max_sample_rate().0;
            let rate_diff = if target_rate < min {
                min - target_rate
            } else {
                target_rate.saturating_sub(max)
            };
            let format_penalty = u8::from(c.sample_format() != cpal::SampleFormat::F32);
            let channel_penalty = u8::from(c.channels() != 1);
            (rate_diff, format_penalty, channel_penalty)
        })
        .map(|c| {
            let rate = target_rate.clamp(c.min_sample_rate().0, c.max_sample_rate().0);
            c.with_sample_rate(cpal::SampleRate(rate))
        })
}
