// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cardscan: command-line front end.
//
// Entry point. Initialises logging, loads the photo and settings, runs the
// card detector, and writes the rectified card.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use cardscan_core::config::ChannelOrder;
use cardscan_core::error::{CardScanError, Result};
use cardscan_core::human_errors::humanize_error;
use cardscan_core::{DetectConfig, OrderedQuad};
use cardscan_detect::{CardDetector, QuadSource};
use clap::Parser;
use serde::Serialize;
use tracing::{error, info, instrument, warn};

/// Directory used when no output path is given.
const DEFAULT_OUTPUT_DIR: &str = "result";

/// Exit status when no card was found.
const EXIT_REJECTED: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "cardscan")]
#[command(version, about = "Find an ID card in a photo and write it back upright and cropped")]
struct Args {
    /// Photo to process.
    input: PathBuf,

    /// Where to write the rectified card [default: result/<input file name>].
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON settings file; fields it leaves out keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Height the photo is resized to before detection; 0 keeps the native size.
    #[arg(long)]
    working_height: Option<u32>,

    /// Treat the decoded channels as BGR.
    #[arg(long)]
    bgr: bool,

    /// Write the full-frame image even when no card was found.
    #[arg(long)]
    keep_rejected: bool,

    /// Print a JSON summary of the detection on stdout.
    #[arg(long)]
    json: bool,
}

/// What `run` did with the photo.
#[derive(Debug, PartialEq)]
enum Outcome {
    /// A card was found and written here.
    Written(PathBuf),
    /// No card was found; the full frame was written only with `--keep-rejected`.
    Rejected { written: Option<PathBuf> },
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    input: &'a Path,
    output: Option<&'a Path>,
    accepted: bool,
    source: QuadSource,
    quad: OrderedQuad,
    width: u32,
    height: u32,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    match run(&args) {
        Ok(Outcome::Written(path)) => {
            info!(path = %path.display(), "Card written");
            ExitCode::SUCCESS
        }
        Ok(Outcome::Rejected { written }) => {
            match written {
                Some(path) => warn!(path = %path.display(), "No card found; full frame written"),
                None => warn!("No card found; nothing written"),
            }
            ExitCode::from(EXIT_REJECTED)
        }
        Err(err) => {
            let human = humanize_error(&err);
            error!(error = %err, class = ?human.class, "cardscan failed");
            eprintln!("{}\n  {}\n  details: {}", human.message, human.suggestion, err);
            ExitCode::FAILURE
        }
    }
}

/// Settings file (if any) with command-line overrides applied on top.
fn load_config(args: &Args) -> Result<DetectConfig> {
    let mut config = match &args.config {
        Some(path) => DetectConfig::from_json(&fs::read_to_string(path)?)?,
        None => DetectConfig::default(),
    };
    if let Some(height) = args.working_height {
        config.working_height = (height > 0).then_some(height);
    }
    if args.bgr {
        config.channel_order = ChannelOrder::Bgr;
    }
    Ok(config)
}

fn default_output(input: &Path) -> Result<PathBuf> {
    let name = input.file_name().ok_or_else(|| {
        CardScanError::InvalidImage(format!("{} does not name a file", input.display()))
    })?;
    Ok(Path::new(DEFAULT_OUTPUT_DIR).join(name))
}

#[instrument(skip_all, fields(input = %args.input.display()))]
fn run(args: &Args) -> Result<Outcome> {
    let detector = CardDetector::new(load_config(args)?)?;

    let image = image::open(&args.input).map_err(|err| {
        CardScanError::ImageError(format!("failed to open {}: {}", args.input.display(), err))
    })?;
    info!(width = image.width(), height = image.height(), "Photo loaded");

    let detection = detector.detect_dynamic(&image)?;

    let output = match &args.output {
        Some(path) => path.clone(),
        None => default_output(&args.input)?,
    };
    let write = detection.accepted || args.keep_rejected;

    if write {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        detection.image.save(&output).map_err(|err| {
            CardScanError::ImageError(format!("failed to write {}: {}", output.display(), err))
        })?;
    }

    if args.json {
        let summary = Summary {
            input: &args.input,
            output: write.then_some(output.as_path()),
            accepted: detection.accepted,
            source: detection.source,
            quad: detection.quad,
            width: detection.image.width(),
            height: detection.image.height(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    Ok(match (detection.accepted, write) {
        (true, _) => Outcome::Written(output),
        (false, true) => Outcome::Rejected {
            written: Some(output),
        },
        (false, false) => Outcome::Rejected { written: None },
    })
}
