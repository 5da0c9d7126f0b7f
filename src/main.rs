//! Command-line front end for batch CSI analysis.
//!
//! Every input file is processed on its own; a failure in one file is
//! reported and the remaining files are still processed.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};

use rusty_csi::config::{MalformedPolicy, PipelineConfig};
use rusty_csi::data::{export, loader};
use rusty_csi::signal::SmoothingMode;
use rusty_csi::Pipeline;

#[derive(Parser)]
#[command(name = "rusty-csi")]
#[command(author, version, about = "Offline WiFi CSI analysis", long_about = None)]
struct Cli {
    /// JSON configuration file; flags override its values
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for result files (default: next to each input)
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Fail a file on its first malformed record instead of skipping it
    #[arg(long, global = true)]
    strict: bool,

    /// Enable verbose output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SmoothingArgs {
    /// Moving-average window in rows
    #[arg(long)]
    window: Option<usize>,

    /// Window alignment (trailing, centered)
    #[arg(long)]
    mode: Option<SmoothingMode>,

    /// Valid samples required per window
    #[arg(long)]
    min_periods: Option<usize>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the amplitude (or phase) spectrum of every row
    Amplitude {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Write phase in radians instead of amplitude
        #[arg(long)]
        phase: bool,
    },

    /// Write time-smoothed amplitude spectra
    Smooth {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        smoothing: SmoothingArgs,

        /// Decimal places kept in the output
        #[arg(long)]
        precision: Option<u32>,
    },

    /// Correlate every smoothed spectrum with a reference row
    Correlate {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Input row of the reference spectrum (blank and malformed rows count)
        #[arg(short, long)]
        reference: Option<usize>,

        /// Ignore subcarriers up to and including this index (-1 keeps all)
        #[arg(long, allow_hyphen_values = true)]
        exclude_low: Option<i64>,

        #[command(flatten)]
        smoothing: SmoothingArgs,
    },

    /// Flag motion from lagged differences of smoothed amplitudes
    Detect {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Rows between compared spectra
        #[arg(long)]
        lag: Option<usize>,

        /// MSE above which a row counts as motion
        #[arg(long)]
        threshold: Option<f64>,

        /// Subtract each spectrum's mean before differencing
        #[arg(long)]
        normalize: bool,

        #[command(flatten)]
        smoothing: SmoothingArgs,
    },
}

impl SmoothingArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(window) = self.window {
            config.smoothing.window = window;
        }
        if let Some(mode) = self.mode {
            config.smoothing.mode = mode;
        }
        if let Some(min_periods) = self.min_periods {
            config.smoothing.min_periods = min_periods;
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if cli.strict {
        config.on_malformed = MalformedPolicy::Abort;
    }
    let files = apply_overrides(&cli.command, &mut config);
    let pipeline = Pipeline::new(config).context("invalid configuration")?;

    if let Some(dir) = &cli.output_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;
    }

    let mut failures = 0;
    for path in files {
        info!("Processing {}", path.display());
        if let Err(e) = process_file(&pipeline, &cli.command, path, cli.output_dir.as_deref()) {
            error!("{}: {e:#}", path.display());
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{failures} of {} files failed", files.len());
    }
    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

/// Fold command flags into the configuration; returns the input files.
fn apply_overrides<'a>(command: &'a Commands, config: &mut PipelineConfig) -> &'a [PathBuf] {
    match command {
        Commands::Amplitude { files, .. } => files.as_slice(),
        Commands::Smooth {
            files,
            smoothing,
            precision,
        } => {
            smoothing.apply(config);
            if precision.is_some() {
                config.smoothing.precision = *precision;
            }
            files.as_slice()
        }
        Commands::Correlate {
            files,
            reference,
            exclude_low,
            smoothing,
        } => {
            smoothing.apply(config);
            if reference.is_some() {
                config.correlation.reference_index = *reference;
            }
            if let Some(cutoff) = exclude_low {
                config.correlation.exclude_low_index = *cutoff;
            }
            files.as_slice()
        }
        Commands::Detect {
            files,
            lag,
            threshold,
            normalize,
            smoothing,
        } => {
            smoothing.apply(config);
            if let Some(lag) = lag {
                config.detection.lag = *lag;
            }
            if let Some(threshold) = threshold {
                config.detection.threshold = *threshold;
            }
            if *normalize {
                config.detection.normalize = true;
            }
            files.as_slice()
        }
    }
}

fn process_file(
    pipeline: &Pipeline,
    command: &Commands,
    path: &Path,
    output_dir: Option<&Path>,
) -> Result<()> {
    let records = loader::load_file(path)?;

    let (suffix, written) = match command {
        Commands::Amplitude { phase, .. } => {
            let capture = pipeline.decode(&records)?;
            report_dropped(&capture);
            let (suffix, series) = if *phase {
                ("phase", &capture.phase)
            } else {
                ("amplitude", &capture.amplitude)
            };
            let out = export::output_path(path, output_dir, suffix);
            export::write_series(export::create_output(&out)?, series)?;
            (suffix, out)
        }
        Commands::Smooth { .. } => {
            let capture = pipeline.decode(&records)?;
            report_dropped(&capture);
            let smoothed = pipeline.smooth(&capture.amplitude)?;
            let out = export::output_path(path, output_dir, "smoothed");
            export::write_series(export::create_output(&out)?, &smoothed)?;
            ("smoothed", out)
        }
        Commands::Correlate { .. } => {
            let result = pipeline.run_correlation(&records)?;
            let undefined = result.undefined_count();
            if undefined > 0 {
                warn!("{undefined} of {} correlations undefined", result.len());
            }
            let out = export::output_path(path, output_dir, "correlation");
            export::write_correlation(export::create_output(&out)?, &result)?;
            ("correlation", out)
        }
        Commands::Detect { .. } => {
            let result = pipeline.run_changes(&records)?;
            match (result.first_event(), result.last_event()) {
                (Some(first), Some(last)) => info!(
                    "Motion in {} of {} rows, {} .. {}",
                    result.event_count(),
                    result.len(),
                    first.timestamp,
                    last.timestamp
                ),
                _ => info!("No motion above {} in {} rows", result.threshold, result.len()),
            }
            let out = export::output_path(path, output_dir, "mse");
            export::write_changes(export::create_output(&out)?, &result)?;
            ("mse", out)
        }
    };

    info!("Wrote {suffix} output to {}", written.display());
    Ok(())
}

fn report_dropped(capture: &rusty_csi::DecodedCapture) {
    if !capture.skipped.is_empty() {
        warn!("{} malformed rows skipped", capture.skipped.len());
    }
    if capture.blank > 0 {
        info!("{} blank rows ignored", capture.blank);
    }
}
