//! trdlet CLI: transform tracklet words into calibrated space points.
#![allow(clippy::uninlined_format_args)]

use clap::{Parser, Subcommand, ValueEnum};

use std::fs;
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use trdlet_transform::{DecodingMode, Frame, RawTracklet, Setup, TrackletTransformer};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transform error: {0}")]
    Transform(#[from] trdlet_transform::Error),

    #[error("invalid tracklet word '{0}'")]
    InvalidWord(String),

    #[error("no tracklet words given")]
    NoInput,
}

/// Output frame selection.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum FrameArg {
    /// Chamber-local frame
    Local,
    /// Sector tracking frame
    Tracking,
}

impl From<FrameArg> for Frame {
    fn from(frame: FrameArg) -> Self {
        match frame {
            FrameArg::Local => Frame::Local,
            FrameArg::Tracking => Frame::Tracking,
        }
    }
}

/// Calibrated space points from TRD tracklet words.
#[derive(Parser)]
#[command(name = "trdlet")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON setup file (geometry, calibration, transformer); nominal if omitted
    #[arg(short, long, global = true)]
    setup: Option<PathBuf>,

    /// Decode position/slope with the legacy XOR-flipped convention
    #[arg(long, global = true)]
    legacy_xor: bool,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform tracklet words (hex with 0x prefix, or decimal)
    Transform {
        /// Tracklet words
        words: Vec<String>,

        /// File with one tracklet word per line
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Output frame
        #[arg(short, long, value_enum, default_value = "local")]
        frame: FrameArg,
    },

    /// Show the bit fields of tracklet words
    Decode {
        /// Tracklet words
        #[arg(required = true)]
        words: Vec<String>,
    },

    /// Timebin of drift coordinates
    Timebin {
        /// Detector index
        #[arg(short, long, default_value = "0")]
        detector: u16,

        /// Drift coordinates (cm, anode plane at 0)
        #[arg(required = true, allow_negative_numbers = true)]
        x: Vec<f64>,
    },
}

fn parse_word(text: &str) -> Result<RawTracklet> {
    let text = text.trim();
    let parsed = match text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
    {
        Some(hex) => u64::from_str_radix(&hex.replace('_', ""), 16),
        None => text.parse::<u64>(),
    };
    parsed
        .map(RawTracklet::from_word)
        .map_err(|_| CliError::InvalidWord(text.to_string()))
}

fn read_words(words: &[String], input: Option<&PathBuf>) -> Result<Vec<RawTracklet>> {
    let mut tracklets = words
        .iter()
        .map(|w| parse_word(w))
        .collect::<Result<Vec<_>>>()?;
    if let Some(path) = input {
        let contents = fs::read_to_string(path)?;
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            tracklets.push(parse_word(line)?);
        }
    }
    if tracklets.is_empty() {
        return Err(CliError::NoInput);
    }
    Ok(tracklets)
}

fn load_setup(path: Option<&PathBuf>, legacy_xor: bool) -> Result<Setup> {
    let mut setup = match path {
        Some(path) => {
            log::info!("loading setup from {}", path.display());
            Setup::from_file(path)?
        }
        None => Setup::default(),
    };
    if legacy_xor {
        setup.transformer = setup.transformer.with_decoding(DecodingMode::LegacyXor);
    }
    Ok(setup)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let setup = load_setup(cli.setup.as_ref(), cli.legacy_xor)?;

    match cli.command {
        Commands::Transform {
            words,
            input,
            frame,
        } => {
            let tracklets = read_words(&words, input.as_ref())?;
            let transformer = TrackletTransformer::new(
                &setup.geometry,
                &setup.calibration,
                setup.transformer.clone(),
            )?;

            let start = Instant::now();
            let calibrated = transformer.transform_batch(&tracklets, frame.into())?;
            log::info!(
                "transformed {} tracklets in {:.3} ms",
                calibrated.len(),
                start.elapsed().as_secs_f64() * 1e3
            );

            for (tracklet, point) in tracklets.iter().zip(&calibrated) {
                let line = serde_json::json!({
                    "word": format!("{:#018x}", tracklet.word()),
                    "detector": tracklet.detector(),
                    "x": point.x,
                    "y": point.y,
                    "z": point.z,
                    "dy": point.dy,
                });
                println!("{line}");
            }
        }

        Commands::Decode { words } => {
            let transformer = TrackletTransformer::new(
                &setup.geometry,
                &setup.calibration,
                setup.transformer.clone(),
            )?;
            println!("decoding: {:?}", transformer.config().decoding);
            println!(
                "{:<18} | {:>4} | {:>4} | {:>6} | {:>3} | {:>8} | {:>5}",
                "word", "det", "side", "padrow", "col", "position", "slope"
            );
            println!("{:-<68}", "");
            for word in &words {
                let tracklet = parse_word(word)?;
                let (position, slope) = transformer.decode(&tracklet);
                println!(
                    "{:#018x} | {:>4} | {:>4} | {:>6} | {:>3} | {:>8} | {:>5}",
                    tracklet.word(),
                    tracklet.detector(),
                    tracklet.side(),
                    tracklet.padrow(),
                    tracklet.column(),
                    position,
                    slope
                );
            }
        }

        Commands::Timebin { detector, x } => {
            let transformer = TrackletTransformer::new(
                &setup.geometry,
                &setup.calibration,
                setup.transformer.clone(),
            )?;
            for x in x {
                println!("{x:>8.3} -> {:.3}", transformer.timebin_from_x(detector, x));
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_word_hex_and_decimal() {
        let t = parse_word("0x0001_e000_0000_0000").unwrap();
        assert_eq!(t.padrow(), 15);
        assert_eq!(parse_word("42").unwrap().word(), 42);
        assert_eq!(parse_word(" 0XFF ").unwrap().word(), 0xFF);
    }

    #[test]
    fn test_parse_word_rejects_garbage() {
        assert!(matches!(parse_word("0xZZ"), Err(CliError::InvalidWord(_))));
        assert!(matches!(parse_word("-1"), Err(CliError::InvalidWord(_))));
    }

    #[test]
    fn test_read_words_requires_input() {
        assert!(matches!(read_words(&[], None), Err(CliError::NoInput)));
    }

    #[test]
    fn test_cli_parses_transform() {
        let cli = Cli::try_parse_from(["trdlet", "transform", "--frame", "tracking", "0x10"])
            .unwrap();
        assert!(!cli.legacy_xor);
        assert!(matches!(
            cli.command,
            Commands::Transform {
                frame: FrameArg::Tracking,
                ..
            }
        ));
    }

    #[test]
    fn test_legacy_flag_switches_decoding() {
        let setup = load_setup(None, true).unwrap();
        assert_eq!(setup.transformer.decoding, DecodingMode::LegacyXor);
    }
}
