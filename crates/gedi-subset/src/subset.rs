//! Beam and granule subsetting.
//!
//! A beam is subset in four steps: the filter query narrows the rows, the
//! requested columns are selected from what is left, a point is built for
//! each row from the coordinate datasets, and rows outside the AOI are
//! dropped. A granule is subset by running every selected beam and stacking
//! the results.

use std::path::Path;
use std::sync::Arc;

use filter_expr::TokenTable;
use gedi_common::{AreaOfInterest, CrsCode, Point};
use h5frame::{parse_key, plan_one, ColumnSelector, FrameError, HierarchicalGroup, LazyTable};
use tracing::{debug, info};

use crate::beams::{BeamFilter, BEAM_PREFIX};
use crate::config::SubsetConfig;
use crate::error::{Result, SubsetError};
use crate::geoframe::GeoFrame;

/// Column holding the source file name.
pub const FILENAME_COLUMN: &str = "filename";

/// Column holding the beam number (group name without the `BEAM` prefix).
pub const BEAM_COLUMN: &str = "BEAM";

/// Default latitude dataset.
pub const DEFAULT_LAT: &str = "lat_lowestmode";

/// Default longitude dataset.
pub const DEFAULT_LON: &str = "lon_lowestmode";

/// Subsets beams and granules with one set of options.
#[derive(Debug, Clone)]
pub struct Subsetter {
    lat_col: String,
    lon_col: String,
    beams: BeamFilter,
    columns: Vec<String>,
    query: Option<String>,
    tokens: Arc<TokenTable>,
}

impl Subsetter {
    /// Select `columns` from every beam, located by the default coordinates.
    pub fn new<S: AsRef<str>>(columns: &[S]) -> Self {
        Self {
            lat_col: DEFAULT_LAT.to_string(),
            lon_col: DEFAULT_LON.to_string(),
            beams: BeamFilter::All,
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
            query: None,
            tokens: Arc::new(TokenTable::new()),
        }
    }

    /// Build from a configuration.
    pub fn from_config(config: &SubsetConfig) -> Self {
        Self::new(&config.columns)
            .with_coordinates(&config.lat_col, &config.lon_col)
            .with_beams(config.beams.clone())
            .with_query(config.query.as_deref())
    }

    /// Use other datasets (possibly nested paths) as coordinates.
    pub fn with_coordinates(mut self, lat_col: &str, lon_col: &str) -> Self {
        self.lat_col = lat_col.to_string();
        self.lon_col = lon_col.to_string();
        self
    }

    pub fn with_beams(mut self, beams: BeamFilter) -> Self {
        self.beams = beams;
        self
    }

    /// Filter rows with a query. Blank queries are ignored.
    pub fn with_query(mut self, query: Option<&str>) -> Self {
        self.query = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string);
        self
    }

    /// Share a token table with other components.
    pub fn with_tokens(mut self, tokens: Arc<TokenTable>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn beams(&self) -> &BeamFilter {
        &self.beams
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Requested columns without repeats, in request order.
    fn output_columns(&self) -> Vec<&str> {
        let mut columns: Vec<&str> = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            if !columns.contains(&column.as_str()) {
                columns.push(column);
            }
        }
        columns
    }

    /// Output column names for a granule with no selected beam.
    ///
    /// Slice keys are expanded against the matching dataset of `beam` (any
    /// beam of the granule) so the names agree with those a selected beam
    /// would have produced. Keys that cannot be resolved are kept as given.
    fn expected_columns<G: HierarchicalGroup>(&self, beam: Option<&G>) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for key in self.output_columns() {
            let expanded = match (beam, parse_key(key).1) {
                (Some(beam), Some(ColumnSelector::Slice { .. })) => match plan_one(beam, key) {
                    Ok(planned) => planned.iter().map(|p| p.name().to_string()).collect(),
                    Err(e) => {
                        debug!(column = %key, error = %e, "Keeping unresolved column name");
                        vec![key.to_string()]
                    }
                },
                _ => vec![key.to_string()],
            };
            for name in expanded {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    /// Subset one beam group.
    ///
    /// The result holds the requested columns (in request order) for the
    /// rows that satisfy the query and lie within `aoi`, with a point per
    /// row. Coordinate datasets only appear as columns when requested.
    pub fn subset_beam<G: HierarchicalGroup>(
        &self,
        beam: &G,
        aoi: &AreaOfInterest,
    ) -> Result<GeoFrame> {
        let beam_name = beam.basename();
        let mut table = LazyTable::new(beam.clone(), Arc::clone(&self.tokens));

        if let Some(query) = &self.query {
            table = table.query(query)?;
        }

        let lats = self.coordinates(&table, &beam_name, &self.lat_col)?;
        let lons = self.coordinates(&table, &beam_name, &self.lon_col)?;

        let frame = table.get_many(&self.output_columns())?;
        let geometry: Vec<Point> = lons
            .iter()
            .zip(&lats)
            .map(|(&lon, &lat)| Point::new(lon, lat))
            .collect();
        let selected = GeoFrame::new(frame, geometry, CrsCode::Epsg4326)?;

        let inside = aoi.contains_all(&lons, &lats)?;
        let result = selected.filter(&inside)?;

        debug!(
            beam = %beam_name,
            queried = selected.nrows(),
            rows = result.nrows(),
            "Subset beam"
        );
        Ok(result)
    }

    fn coordinates<G: HierarchicalGroup>(
        &self,
        table: &LazyTable<G>,
        beam: &str,
        column: &str,
    ) -> Result<Vec<f64>> {
        let values = table.column(column).map_err(|e| match e {
            FrameError::KeyNotFound(_) | FrameError::DatasetNotFound { .. } => {
                SubsetError::MissingCoordinates {
                    beam: beam.to_string(),
                    column: column.to_string(),
                }
            }
            other => other.into(),
        })?;
        values
            .data()
            .to_f64_vec()
            .ok_or_else(|| SubsetError::NonNumericCoordinates {
                beam: beam.to_string(),
                column: column.to_string(),
            })
    }

    /// Subset every selected beam of a granule.
    ///
    /// Beams are taken in name order and stacked. The result starts with a
    /// `filename` column (the base name of the granule file) and a `BEAM`
    /// column. When no beam is selected the result is empty but still has
    /// the expected columns.
    pub fn subset_hdf5<G: HierarchicalGroup>(
        &self,
        granule: &G,
        aoi: &AreaOfInterest,
    ) -> Result<GeoFrame> {
        let filename = granule.filename();
        let filename = Path::new(&filename)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or(filename);

        let mut results = Vec::new();
        let mut first_beam = None;
        for name in granule.member_names()? {
            if !name.starts_with(BEAM_PREFIX) {
                continue;
            }
            let Some(beam) = granule.group(&name)? else {
                continue;
            };
            if first_beam.is_none() {
                first_beam = Some(beam.clone());
            }
            if !self.beams.matches(&beam)? {
                debug!(beam = %name, beams = %self.beams, "Skipping beam");
                continue;
            }

            let mut subset = self.subset_beam(&beam, aoi)?;
            let number = &name[BEAM_PREFIX.len()..];
            subset.insert_constant(0, BEAM_COLUMN, number)?;
            results.push(subset);
        }

        let mut combined = if results.is_empty() {
            let mut columns = vec![BEAM_COLUMN.to_string()];
            columns.extend(self.expected_columns(first_beam.as_ref()));
            GeoFrame::empty(&columns)?
        } else {
            GeoFrame::concat(&results)?
        };
        combined.insert_constant(0, FILENAME_COLUMN, &filename)?;

        info!(
            filename = %filename,
            beams = results.len(),
            rows = combined.nrows(),
            "Subset granule"
        );
        Ok(combined)
    }
}

/// Subset one beam with no shared token table.
pub fn subset_beam<G: HierarchicalGroup>(
    beam: &G,
    aoi: &AreaOfInterest,
    lat_col: &str,
    lon_col: &str,
    columns: &[String],
    query: Option<&str>,
) -> Result<GeoFrame> {
    Subsetter::new(columns)
        .with_coordinates(lat_col, lon_col)
        .with_query(query)
        .subset_beam(beam, aoi)
}

/// Subset a granule.
pub fn subset_hdf5<G: HierarchicalGroup>(
    granule: &G,
    aoi: &AreaOfInterest,
    lat_col: &str,
    lon_col: &str,
    beams: BeamFilter,
    columns: &[String],
    query: Option<&str>,
) -> Result<GeoFrame> {
    Subsetter::new(columns)
        .with_coordinates(lat_col, lon_col)
        .with_beams(beams)
        .with_query(query)
        .subset_hdf5(granule, aoi)
}
