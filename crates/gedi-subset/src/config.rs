//! Configuration for subsetting runs.

use serde::{Deserialize, Serialize};

use crate::beams::BeamFilter;
use crate::error::{Result, SubsetError};
use crate::subset::{DEFAULT_LAT, DEFAULT_LON};

/// Options shared by every granule of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsetConfig {
    /// Latitude dataset, relative to each beam group.
    pub lat_col: String,

    /// Longitude dataset, relative to each beam group.
    pub lon_col: String,

    /// Beams to include.
    pub beams: BeamFilter,

    /// Datasets to emit as columns.
    pub columns: Vec<String>,

    /// Row filter expression.
    pub query: Option<String>,

    /// Number of granules processed concurrently.
    pub workers: usize,

    /// Log and skip granules that fail instead of aborting the run.
    pub skip_failed: bool,
}

impl Default for SubsetConfig {
    fn default() -> Self {
        Self {
            lat_col: DEFAULT_LAT.to_string(),
            lon_col: DEFAULT_LON.to_string(),
            beams: BeamFilter::All,
            columns: Vec::new(),
            query: None,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            skip_failed: false,
        }
    }
}

impl SubsetConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset or unparsable variables keep their defaults, except
    /// `GEDI_SUBSET_BEAMS`, which is an error when invalid.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GEDI_SUBSET_LAT") {
            config.lat_col = val;
        }

        if let Ok(val) = std::env::var("GEDI_SUBSET_LON") {
            config.lon_col = val;
        }

        if let Ok(val) = std::env::var("GEDI_SUBSET_BEAMS") {
            config.beams = BeamFilter::parse(&val)?;
        }

        if let Ok(val) = std::env::var("GEDI_SUBSET_COLUMNS") {
            config.columns = parse_columns(&val);
        }

        if let Ok(val) = std::env::var("GEDI_SUBSET_QUERY") {
            if !val.trim().is_empty() {
                config.query = Some(val);
            }
        }

        if let Ok(val) = std::env::var("GEDI_SUBSET_WORKERS") {
            if let Ok(workers) = val.parse() {
                config.workers = workers;
            }
        }

        if let Ok(val) = std::env::var("GEDI_SUBSET_SKIP_FAILED") {
            config.skip_failed = val.to_lowercase() == "true" || val == "1";
        }

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(SubsetError::InvalidConfig(
                "at least one column must be selected".to_string(),
            ));
        }

        if self.lat_col.trim().is_empty() || self.lon_col.trim().is_empty() {
            return Err(SubsetError::InvalidConfig(
                "coordinate dataset names must not be empty".to_string(),
            ));
        }

        if self.workers == 0 {
            return Err(SubsetError::InvalidConfig("workers must be > 0".to_string()));
        }

        Ok(())
    }
}

/// Split a comma-separated column list, dropping blanks.
pub fn parse_columns(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}
