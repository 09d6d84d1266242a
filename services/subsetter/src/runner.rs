//! Parallel subsetting of many granules.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use gedi_common::AreaOfInterest;
use gedi_subset::{GeoFrame, Subsetter};
use h5frame::HierarchicalGroup;
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Outcome of a run over several granules.
#[derive(Debug)]
pub struct RunSummary {
    /// Rows of all granules, in input order.
    pub result: GeoFrame,
    /// Granules that produced rows.
    pub with_rows: usize,
    /// Granules that produced no rows.
    pub empty: usize,
    /// Granules skipped after a failure.
    pub failed: Vec<PathBuf>,
}

/// Subset every granule in `paths` on a pool of `workers` threads.
///
/// `open` is called on the worker thread that processes the granule. When
/// `skip_failed` is false the first failure (in input order) aborts the
/// run; otherwise failures are logged and the granule is skipped.
pub fn run_granules<G, F>(
    paths: &[PathBuf],
    open: F,
    subsetter: &Subsetter,
    aoi: &AreaOfInterest,
    workers: usize,
    skip_failed: bool,
) -> Result<RunSummary>
where
    G: HierarchicalGroup,
    F: Fn(&Path) -> h5frame::Result<G> + Sync,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .context("failed to build worker pool")?;

    info!(granules = paths.len(), workers, "Subsetting granules");

    let outcomes: Vec<Result<GeoFrame>> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| {
                let granule = open(path)
                    .with_context(|| format!("failed to open {}", path.display()))?;
                subsetter
                    .subset_hdf5(&granule, aoi)
                    .with_context(|| format!("failed to subset {}", path.display()))
            })
            .collect()
    });

    let mut frames = Vec::new();
    let mut empty = 0;
    let mut failed = Vec::new();
    for (path, outcome) in paths.iter().zip(outcomes) {
        match outcome {
            Ok(frame) if frame.is_empty() => {
                debug!(granule = %path.display(), "No rows in granule");
                empty += 1;
            }
            Ok(frame) => frames.push(frame),
            Err(e) if skip_failed => {
                warn!(granule = %path.display(), error = %format!("{:#}", e), "Skipping failed granule");
                failed.push(path.clone());
            }
            Err(e) => return Err(e),
        }
    }

    let with_rows = frames.len();
    let result = if frames.is_empty() {
        GeoFrame::default()
    } else {
        GeoFrame::concat(&frames).context("failed to combine granules")?
    };

    info!(
        rows = result.nrows(),
        with_rows,
        empty,
        failed = failed.len(),
        "Subsetting complete"
    );

    Ok(RunSummary {
        result,
        with_rows,
        empty,
        failed,
    })
}
