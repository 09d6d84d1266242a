//! GEDI subsetting command.
//!
//! Subsets local GEDI granules to an area of interest and a row filter,
//! and writes the combined rows as GeoJSON.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use gedi_common::AreaOfInterest;
use gedi_subset::config::parse_columns;
use gedi_subset::{BeamFilter, SubsetConfig, Subsetter};
use h5frame::{silence_hdf5_errors, H5Group};
use subsetter::{collect_inputs, run_granules, write_output};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "gedi-subset")]
#[command(about = "Subset GEDI granules to an area of interest")]
struct Args {
    /// Granule files or directories of granules
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// GeoJSON file with the area of interest
    #[arg(long)]
    aoi: PathBuf,

    /// Output GeoJSON file
    #[arg(short, long, default_value = "gedi_subset.geojson")]
    output: PathBuf,

    /// Comma-separated datasets to emit as columns
    #[arg(short, long, env = "GEDI_SUBSET_COLUMNS")]
    columns: Option<String>,

    /// Row filter, e.g. "l2_quality_flag == 1 and sensitivity > 0.95"
    #[arg(short, long, env = "GEDI_SUBSET_QUERY")]
    query: Option<String>,

    /// Beams: all, coverage, power, or a comma-separated list such as 0000,0101
    #[arg(short, long, env = "GEDI_SUBSET_BEAMS")]
    beams: Option<BeamFilter>,

    /// Latitude dataset
    #[arg(long, env = "GEDI_SUBSET_LAT")]
    lat: Option<String>,

    /// Longitude dataset
    #[arg(long, env = "GEDI_SUBSET_LON")]
    lon: Option<String>,

    /// Number of granules processed in parallel
    #[arg(short, long, env = "GEDI_SUBSET_WORKERS")]
    workers: Option<usize>,

    /// Skip granules that fail instead of aborting
    #[arg(long)]
    skip_failed: bool,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Shorthand for --log-level debug
    #[arg(short, long)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    /// Layer command line values over the environment configuration.
    fn config(&self) -> Result<SubsetConfig> {
        let mut config = SubsetConfig::from_env()?;

        if let Some(columns) = &self.columns {
            config.columns = parse_columns(columns);
        }
        if let Some(query) = &self.query {
            config.query = Some(query.clone()).filter(|q| !q.trim().is_empty());
        }
        if let Some(beams) = &self.beams {
            config.beams = beams.clone();
        }
        if let Some(lat) = &self.lat {
            config.lat_col = lat.clone();
        }
        if let Some(lon) = &self.lon {
            config.lon_col = lon.clone();
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        config.skip_failed |= self.skip_failed;

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = if args.verbose {
        Level::DEBUG
    } else {
        match args.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    };

    let builder = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true);
    if args.json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }

    silence_hdf5_errors();

    let config = args.config()?;
    info!(
        columns = ?config.columns,
        query = ?config.query,
        beams = %config.beams,
        lat = %config.lat_col,
        lon = %config.lon_col,
        "Loaded configuration"
    );

    let aoi = AreaOfInterest::from_path(&args.aoi)
        .with_context(|| format!("failed to read AOI {}", args.aoi.display()))?;
    let inputs = collect_inputs(&args.inputs)?;
    if inputs.is_empty() {
        warn!("No granules found");
    }

    let subsetter = Subsetter::from_config(&config);
    let summary = run_granules(
        &inputs,
        |path: &Path| H5Group::open(path),
        &subsetter,
        &aoi,
        config.workers,
        config.skip_failed,
    )?;

    if summary.result.is_empty() {
        warn!("No rows matched; nothing written");
        return Ok(());
    }

    write_output(&args.output, &summary.result)?;
    info!(
        output = %args.output.display(),
        rows = summary.result.nrows(),
        granules = summary.with_rows,
        failed = summary.failed.len(),
        "Wrote subset"
    );

    Ok(())
}
