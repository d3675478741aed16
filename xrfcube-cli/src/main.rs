//! xrfcube command-line interface.
//!
//! Runs cube operations against a folder of data sources and prints the
//! results as JSON on stdout. Logs go to stderr.

use clap::{Args, Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;
use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};
use xrfcube_core::{CubeConfig, DataSourceStore, PixelRect};
use xrfcube_io::JsonWorkspace;
use xrfcube_spectral::{CubeService, SelectionTarget};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("Core error: {0}")]
    Core(#[from] xrfcube_core::Error),

    #[error("{0}")]
    Spectral(#[from] xrfcube_spectral::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Query and process XRF data cubes.
#[derive(Parser)]
#[command(name = "xrfcube")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Backend configuration (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Rectangle on the base image, corners in any order.
#[derive(Args, Debug, Clone)]
struct RectArgs {
    /// Corners as `x0 y0 x1 y1`
    #[arg(long, num_args = 4, value_names = ["X0", "Y0", "X1", "Y1"])]
    rect: Option<Vec<u32>>,
}

impl RectArgs {
    fn rect(&self) -> Option<PixelRect> {
        match self.rect.as_deref() {
            Some(&[x0, y0, x1, y1]) => Some(PixelRect::new(x0, y0, x1, y1)),
            _ => None,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Elemental cube dimensions and energy offset
    Info { data_source: String },

    /// Element names of the elemental cube
    Elements { data_source: String },

    /// Average element abundances, optionally within a rectangle
    ElementAverages {
        data_source: String,
        #[command(flatten)]
        region: RectArgs,
    },

    /// Convert an elemental cube to DMS
    Convert { data_source: String, cube: String },

    /// Persisted spectral parameters
    Params { data_source: String },

    /// Energy of the first spectral channel (keV)
    Offset { data_source: String },

    /// Bin the spectral cube with its persisted parameters
    Bin { data_source: String },

    /// Average spectrum, optionally within a rectangle
    Spectrum {
        data_source: String,
        #[command(flatten)]
        region: RectArgs,
    },
}

/// Elemental cube dimensions plus the spectral energy offset.
///
/// A data source without a readable sidecar still reports its dimensions;
/// the offset is then `null` and the reason is logged.
fn info<S: DataSourceStore>(service: &CubeService<S>, data_source: &str) -> Result<Value> {
    let dims = service.cube_dimensions(data_source)?;
    let energy_offset = service
        .energy_offset(data_source)
        .inspect_err(|err| {
            tracing::warn!(data_source, error = %err, "energy offset unavailable");
        })
        .ok();
    Ok(json!({
        "dimensions": dims,
        "energyOffset": energy_offset,
    }))
}

fn run(cli: Cli) -> Result<Value> {
    let config = CubeConfig::from_file(&cli.config)?;
    let service = CubeService::new(config.clone(), JsonWorkspace::new(config))?;

    let value = match cli.command {
        Commands::Info { data_source } => info(&service, &data_source)?,
        Commands::Elements { data_source } => json!(service.element_names(&data_source)?),
        Commands::ElementAverages {
            data_source,
            region,
        } => match region.rect() {
            Some(rect) => {
                let mask =
                    service.mask_for_image_rectangle(&data_source, &rect, SelectionTarget::Elemental)?;
                json!(service.element_averages_for_selection(&data_source, &mask)?)
            }
            None => json!(service.element_averages(&data_source)?),
        },
        Commands::Convert { data_source, cube } => {
            json!(service.convert_cube_to_native_format(&data_source, &cube)?)
        }
        Commands::Params { data_source } => json!(service.spectral_params(&data_source)?),
        Commands::Offset { data_source } => json!(service.energy_offset(&data_source)?),
        Commands::Bin { data_source } => json!(service.bin_raw_data(&data_source)?),
        Commands::Spectrum {
            data_source,
            region,
        } => match region.rect() {
            Some(rect) => {
                let mask =
                    service.mask_for_image_rectangle(&data_source, &rect, SelectionTarget::Spectral)?;
                json!(service.average_spectrum_for_selection(&data_source, &mask)?)
            }
            None => json!(service.average_spectrum_global(&data_source)?),
        },
    };
    Ok(value)
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).and_then(|value| Ok(serde_json::to_string_pretty(&value)?)) {
        Ok(text) => {
            println!("{text}");
            std::process::ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            eprintln!("Error: {err}");
            std::process::ExitCode::FAILURE
        }
    }
}
