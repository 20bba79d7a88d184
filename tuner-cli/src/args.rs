//! Command-line options.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use tuner_core::DetectionStrategy;

pub const USAGE: &str = "\
Usage: uke-tuner [OPTIONS]

Options:
  --config PATH          Load tuner settings from a JSON file
  --strategy NAME        autocorrelation | zero-crossing | spectral
  --tone HZ              Use a synthetic tone instead of the microphone
  --seconds N            Stop after N seconds instead of waiting for Enter
  --write-config PATH    Write the effective settings as JSON and exit
  -h, --help             Show this help";

/// Parsed command-line options.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Options {
    pub config: Option<PathBuf>,
    pub strategy: Option<DetectionStrategy>,
    pub tone_hz: Option<f32>,
    pub seconds: Option<u64>,
    pub write_config: Option<PathBuf>,
    pub help: bool,
}

impl Options {
    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Options::default();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |name: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{} needs a value", name))
            };
            match arg.as_str() {
                "--config" => options.config = Some(PathBuf::from(value("--config")?)),
                "--strategy" => {
                    let name = value("--strategy")?;
                    options.strategy = Some(name.parse().map_err(|e: String| anyhow!(e))?);
                }
                "--tone" => {
                    let hz: f32 = value("--tone")?
                        .parse()
                        .context("--tone expects a frequency in Hz")?;
                    if !hz.is_finite() || hz <= 0.0 {
                        bail!("--tone must be a positive frequency");
                    }
                    options.tone_hz = Some(hz);
                }
                "--seconds" => {
                    let seconds = value("--seconds")?
                        .parse()
                        .context("--seconds expects a whole number")?;
                    options.seconds = Some(seconds);
                }
                "--write-config" => {
                    options.write_config = Some(PathBuf::from(value("--write-config")?))
                }
                "-h" | "--help" => options.help = true,
                other => bail!("unknown argument '{}'\n\n{}", other, USAGE),
            }
        }
        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Options> {
        Options::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn no_arguments_means_defaults() {
        assert_eq!(parse(&[]).unwrap(), Options::default());
    }

    #[test]
    fn all_options_are_read() {
        let options = parse(&[
            "--config", "uke.json", "--strategy", "zcr", "--tone", "392", "--seconds", "3",
        ])
        .unwrap();
        assert_eq!(options.config, Some(PathBuf::from("uke.json")));
        assert_eq!(options.strategy, Some(DetectionStrategy::ZeroCrossing));
        assert_eq!(options.tone_hz, Some(392.0));
        assert_eq!(options.seconds, Some(3));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(parse(&["--strategy", "yin"]).is_err());
        assert!(parse(&["--tone", "-1"]).is_err());
        assert!(parse(&["--seconds"]).is_err());
        assert!(parse(&["--verbose"]).is_err());
    }
}
