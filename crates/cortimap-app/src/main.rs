//! Cortimap Application
//!
//! Command-line entry point for the retinotopic mapping pipeline.
//!
//! # Usage
//!
//! ```bash
//! # Segment a synthetic mirrored field and print the areas as JSON
//! cortimap synth --rows 64 --cols 96 --mirror-column 48
//!
//! # Same, with a configuration file
//! cortimap --config retinotopy.toml synth --noise 0.2
//!
//! # Print the effective configuration
//! cortimap --config retinotopy.toml config
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use cortimap_core::{Area, RetinotopyConfig};
use cortimap_native::{MapStatistics, RetinotopicAnalyzer, RetinotopyReport, SyntheticRetinotopy};
use serde::Serialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Cortimap retinotopy
#[derive(Parser, Debug)]
#[command(name = "cortimap")]
#[command(author, version, about = "Retinotopic mapping and visual area segmentation", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// TOML configuration file (defaults apply to missing fields)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full pipeline on a synthetic drifting-bar field
    Synth {
        /// Image rows
        #[arg(long, default_value = "32")]
        rows: usize,

        /// Image columns
        #[arg(long, default_value = "48")]
        cols: usize,

        /// Time samples per axis
        #[arg(long, default_value = "64")]
        frames: usize,

        /// Stimulus cycles over the recording
        #[arg(long, default_value = "8")]
        cycles: usize,

        /// Column where the horizontal progression reverses
        #[arg(long)]
        mirror_column: Option<usize>,

        /// Uniform noise amplitude
        #[arg(long, default_value = "0.0")]
        noise: f64,

        /// Noise seed
        #[arg(long, default_value = "1")]
        seed: u64,

        /// Linear image scale
        #[arg(long, default_value = "10.0")]
        pixels_per_mm: f64,
    },

    /// Print the effective configuration as TOML
    Config,
}

/// Per-area line of the JSON report
#[derive(Serialize)]
struct AreaSummary {
    name: String,
    id: u32,
    size_mm2: f64,
    pixels: usize,
    center: (f64, f64),
    sign: f64,
    neighbors: Vec<u32>,
}

impl From<&Area> for AreaSummary {
    fn from(area: &Area) -> Self {
        Self {
            name: area.name.clone(),
            id: area.id,
            size_mm2: area.size,
            pixels: area.pixel_count(),
            center: area.center,
            sign: area.sign,
            neighbors: area.neighbors.iter().copied().collect(),
        }
    }
}

/// JSON report of a synthetic run
#[derive(Serialize)]
struct RunSummary {
    stimulus_bin: usize,
    valid_fraction_horizontal: f64,
    valid_fraction_vertical: f64,
    median_snr_horizontal: f64,
    areas: Vec<AreaSummary>,
}

impl RunSummary {
    fn from_report(report: &RetinotopyReport) -> anyhow::Result<Self> {
        let snr = MapStatistics::selectivity(&report.maps.horizontal.snr, None)?;
        Ok(Self {
            stimulus_bin: report.maps.horizontal.stimulus_bin,
            valid_fraction_horizontal: report.maps.horizontal.valid_fraction(),
            valid_fraction_vertical: report.maps.vertical.valid_fraction(),
            median_snr_horizontal: snr.median,
            areas: report.areas.values().map(AreaSummary::from).collect(),
        })
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Cortimap v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Synth {
            rows,
            cols,
            frames,
            cycles,
            mirror_column,
            noise,
            seed,
            pixels_per_mm,
        } => {
            let mut field = SyntheticRetinotopy::new(rows, cols, frames, cycles).with_noise(noise, seed);
            if let Some(column) = mirror_column {
                field = field.with_mirror_column(column);
            }
            run_synthetic(config, &field, pixels_per_mm)?;
        }
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
        }
    }

    Ok(())
}

/// Read and validate the configuration file, or fall back to defaults
fn load_config(path: Option<&Path>) -> anyhow::Result<RetinotopyConfig> {
    let Some(path) = path else {
        return Ok(RetinotopyConfig::default());
    };

    let document = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration {}", path.display()))?;
    let config = RetinotopyConfig::from_toml_str(&document)
        .with_context(|| format!("Invalid configuration {}", path.display()))?;

    info!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Run the pipeline on a synthetic field and print the JSON report
fn run_synthetic(
    config: RetinotopyConfig,
    field: &SyntheticRetinotopy,
    pixels_per_mm: f64,
) -> anyhow::Result<()> {
    info!(
        "Synthetic field: {}x{} px, {} frames, {} cycles",
        field.rows, field.cols, field.frames, field.cycles
    );

    let (horizontal, vertical) = field.pair().context("Failed to build synthetic responses")?;
    let analyzer = RetinotopicAnalyzer::new(config)?;
    let report = analyzer.analyze_and_segment(&horizontal, &vertical, pixels_per_mm)?;

    let summary = RunSummary::from_report(&report)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
