//! # uke-tuner - Terminal Instrument Tuner
//!
//! Headless front end for `tuner-core`. It starts the pitch estimator on
//! the microphone (or a synthetic tone), prints the nearest string with a
//! text needle, and stops cleanly when Enter is pressed.
//!
//! ## Architecture
//! - **Main Thread**: owns the estimator and renders results
//! - **Estimator Thread**: analyses frames inside `tuner-core`
//! - **Input Thread**: waits for Enter on stdin
//! - **Communication**: Crossbeam channels between all three

mod args;
mod display;

use std::io::{self, BufRead, Write};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::Receiver;
use tuner_core::audio::{CaptureSource, CpalCapture};
use tuner_core::synth::ToneSource;
use tuner_core::{PitchEstimate, PitchEstimator, TunerConfig};

use args::{Options, USAGE};
use display::{CentSmoother, render_line};

fn main() -> Result<()> {
    env_logger::init();

    let options = Options::parse(std::env::args().skip(1))?;
    if options.help {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = match &options.config {
        Some(path) => TunerConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => TunerConfig::default(),
    };
    if let Some(strategy) = options.strategy {
        config.strategy = strategy;
    }

    if let Some(path) = &options.write_config {
        config
            .save(path)
            .with_context(|| format!("writing config to {}", path.display()))?;
        println!("Wrote settings to {}", path.display());
        return Ok(());
    }

    let in_tune_cents = config.in_tune_cents;
    let mut source: Box<dyn CaptureSource> = match options.tone_hz {
        Some(hz) => Box::new(ToneSource::new(hz, config.sample_rate)),
        None => Box::new(CpalCapture::new(config.sample_rate)),
    };

    let mut estimator = PitchEstimator::new(config)?;
    let estimates = match estimator.start(source.as_mut()) {
        Ok(rx) => rx,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Err(anyhow!(e));
        }
    };

    print_reference_table(&estimator);
    match options.seconds {
        Some(seconds) => println!("Listening for {} s...", seconds),
        None => println!("Listening... press Enter to stop."),
    }

    let deadline = match options.seconds {
        Some(seconds) => crossbeam_channel::after(Duration::from_secs(seconds)),
        None => crossbeam_channel::never(),
    };
    let enter = spawn_enter_listener();

    run_display_loop(&estimates, &enter, &deadline, in_tune_cents)?;

    estimator.stop();
    println!();
    log::info!("Tuner stopped");
    Ok(())
}

fn print_reference_table(estimator: &PitchEstimator) {
    let config = estimator.config();
    println!("Strategy: {}", config.strategy);
    println!("Strings:");
    for pitch in &config.reference_pitches {
        println!("  {:<4} {:>7.2} Hz", pitch.label, pitch.frequency_hz);
    }
}

/// Fires once when a line (or EOF) is read from stdin.
fn spawn_enter_listener() -> Receiver<()> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    thread::spawn(move || {
        let mut line = String::new();
        let _ = io::stdin().lock().read_line(&mut line);
        let _ = tx.send(());
    });
    rx
}

/// Redraws the status line for every detected pitch. Silent or unclear
/// frames leave the previous line in place.
fn run_display_loop(
    estimates: &Receiver<Option<PitchEstimate>>,
    enter: &Receiver<()>,
    deadline: &Receiver<std::time::Instant>,
    in_tune_cents: f32,
) -> Result<()> {
    let mut smoother = CentSmoother::default();
    let mut stdout = io::stdout();
    loop {
        crossbeam_channel::select! {
            recv(estimates) -> msg => match msg {
                Ok(Some(estimate)) => {
                    let cents = smoother.push(&estimate);
                    write!(stdout, "\r{}", render_line(&estimate, cents, in_tune_cents))?;
                    stdout.flush()?;
                }
                Ok(None) => {}
                Err(_) => {
                    log::warn!("Estimate stream closed");
                    break;
                }
            },
            recv(enter) -> _ => break,
            recv(deadline) -> _ => break,
        }
    }
    Ok(())
}
