//! Terminal rendering of the estimate stream.

use std::collections::VecDeque;

use tuner_core::{PitchEstimate, TuningAccuracy};

/// Number of estimates averaged for the displayed cents.
const SMOOTHING_FACTOR: usize = 5;

/// Character cells on each side of the needle's centre.
const NEEDLE_HALF_WIDTH: usize = 10;

/// Moving average over the most recent deviations of one string.
///
/// The history is cleared when the detected string changes.
#[derive(Debug, Default)]
pub struct CentSmoother {
    reference: Option<String>,
    history: VecDeque<f32>,
}

impl CentSmoother {
    pub fn push(&mut self, estimate: &PitchEstimate) -> f32 {
        if self.reference.as_deref() != Some(estimate.closest_reference.as_str()) {
            self.reference = Some(estimate.closest_reference.clone());
            self.history.clear();
        }
        self.history.push_back(estimate.deviation_cents);
        if self.history.len() > SMOOTHING_FACTOR {
            self.history.pop_front();
        }
        self.history.iter().sum::<f32>() / self.history.len() as f32
    }
}

/// Draws the needle as `[----|----]` with `^` marking a needle offset in
/// `-50..=50`.
pub fn render_needle(offset: f32) -> String {
    let cells = NEEDLE_HALF_WIDTH as f32;
    let position = ((offset.clamp(-50.0, 50.0) / 50.0) * cells).round() as isize;
    let marker = (NEEDLE_HALF_WIDTH as isize + position) as usize;
    let body: String = (0..=NEEDLE_HALF_WIDTH * 2)
        .map(|i| {
            if i == marker {
                '^'
            } else if i == NEEDLE_HALF_WIDTH {
                '|'
            } else {
                '-'
            }
        })
        .collect();
    format!("[{}]", body)
}

/// One status line for an estimate, showing `cents` (the smoothed
/// deviation) in place of the frame's own.
pub fn render_line(estimate: &PitchEstimate, cents: f32, in_tune_cents: f32) -> String {
    let shown = PitchEstimate {
        deviation_cents: cents,
        ..estimate.clone()
    };
    let accuracy = match shown.accuracy(in_tune_cents) {
        TuningAccuracy::Good => "ok",
        TuningAccuracy::Close => "close",
        TuningAccuracy::Off => "off",
    };
    format!(
        "{:<4} {:>7.1} Hz  {:>+6.1} cents  {}  {:<7} ({})",
        shown.closest_reference,
        shown.frequency_hz,
        shown.deviation_cents,
        render_needle(shown.needle_offset()),
        shown.instruction(in_tune_cents).label(),
        accuracy
    )
}
