//! Coordinate reference system of subset output.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GeoError;

/// CRS codes understood for AOI input and subset output.
///
/// GEDI geolocation is always WGS84 longitude/latitude, so that is the only
/// system the subsetter produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CrsCode {
    /// WGS84 Geographic (lon/lat in degrees)
    #[default]
    Epsg4326,
}

impl CrsCode {
    /// Parse a CRS identifier.
    ///
    /// Accepts "EPSG:4326", "CRS:84" and the OGC URN form used in GeoJSON
    /// `crs` members, case-insensitively.
    pub fn parse(s: &str) -> Result<Self, GeoError> {
        let normalized = s.trim().to_uppercase();

        match normalized.as_str() {
            "EPSG:4326" | "CRS:84" | "URN:OGC:DEF:CRS:OGC:1.3:CRS84" | "URN:OGC:DEF:CRS:EPSG::4326" => {
                Ok(CrsCode::Epsg4326)
            }
            _ => Err(GeoError::UnsupportedCrs(s.to_string())),
        }
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        matches!(self, CrsCode::Epsg4326)
    }
}

impl fmt::Display for CrsCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            CrsCode::Epsg4326 => "EPSG:4326",
        };
        write!(f, "{}", code)
    }
}
