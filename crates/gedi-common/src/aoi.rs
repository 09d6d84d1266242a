//! Area-of-interest polygons and point containment.
//!
//! An AOI is one or more polygons in EPSG:4326 (longitude/latitude degrees).
//! It is normally loaded from a GeoJSON file holding a `Polygon`,
//! `MultiPolygon`, `Feature` or `FeatureCollection`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::bbox::BoundingBox;
use crate::crs::CrsCode;
use crate::error::{GeoError, GeoResult};

/// Tolerance used when deciding whether a point lies on a polygon edge.
const EDGE_EPSILON: f64 = 1e-12;

/// A point geometry (x = longitude, y = latitude).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A polygon with one exterior ring and zero or more holes.
///
/// Rings are stored as `(lon, lat)` vertices. A closing vertex equal to the
/// first one is accepted but not required.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    exterior: Vec<(f64, f64)>,
    holes: Vec<Vec<(f64, f64)>>,
    bbox: BoundingBox,
}

impl Polygon {
    /// Create a polygon from its exterior ring.
    pub fn new(exterior: Vec<(f64, f64)>) -> GeoResult<Self> {
        Self::with_holes(exterior, Vec::new())
    }

    /// Create a polygon from an exterior ring and interior rings.
    pub fn with_holes(exterior: Vec<(f64, f64)>, holes: Vec<Vec<(f64, f64)>>) -> GeoResult<Self> {
        let exterior = normalize_ring(exterior)?;
        let holes = holes
            .into_iter()
            .map(normalize_ring)
            .collect::<GeoResult<Vec<_>>>()?;
        let bbox = BoundingBox::from_points(&exterior)
            .ok_or_else(|| GeoError::InvalidPolygon("empty exterior ring".to_string()))?;

        Ok(Self {
            exterior,
            holes,
            bbox,
        })
    }

    /// Axis-aligned rectangle, handy for simple AOIs.
    pub fn rectangle(bbox: BoundingBox) -> GeoResult<Self> {
        Self::new(vec![
            (bbox.min_x, bbox.min_y),
            (bbox.max_x, bbox.min_y),
            (bbox.max_x, bbox.max_y),
            (bbox.min_x, bbox.max_y),
        ])
    }

    pub fn exterior(&self) -> &[(f64, f64)] {
        &self.exterior
    }

    pub fn holes(&self) -> &[Vec<(f64, f64)>] {
        &self.holes
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// Check if a point is inside the polygon or on its boundary.
    ///
    /// Points strictly inside a hole are outside the polygon; points on a
    /// hole's edge are on the polygon boundary and therefore inside.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if !self.bbox.contains_point(lon, lat) {
            return false;
        }
        if !ring_contains(&self.exterior, lon, lat) {
            return false;
        }
        !self
            .holes
            .iter()
            .any(|hole| !on_ring_boundary(hole, lon, lat) && ring_contains(hole, lon, lat))
    }
}

/// Drop a duplicated closing vertex and reject degenerate rings.
fn normalize_ring(mut ring: Vec<(f64, f64)>) -> GeoResult<Vec<(f64, f64)>> {
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    if ring.len() < 3 {
        return Err(GeoError::InvalidPolygon(format!(
            "ring needs at least 3 distinct vertices, got {}",
            ring.len()
        )));
    }
    if let Some(&(x, y)) = ring.iter().find(|(x, y)| !x.is_finite() || !y.is_finite()) {
        return Err(GeoError::InvalidCoordinate(format!("({}, {})", x, y)));
    }
    Ok(ring)
}

/// Ray casting with edges counted as inside.
fn ring_contains(ring: &[(f64, f64)], lon: f64, lat: f64) -> bool {
    if on_ring_boundary(ring, lon, lat) {
        return true;
    }

    let n = ring.len();
    let mut inside = false;
    let mut j = n - 1;

    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];

        if ((yi > lat) != (yj > lat)) && (lon < (xj - xi) * (lat - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }

    inside
}

fn on_ring_boundary(ring: &[(f64, f64)], lon: f64, lat: f64) -> bool {
    let n = ring.len();
    (0..n).any(|i| on_segment(ring[i], ring[(i + 1) % n], (lon, lat)))
}

fn on_segment(a: (f64, f64), b: (f64, f64), p: (f64, f64)) -> bool {
    let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
    let scale = (b.0 - a.0).abs().max((b.1 - a.1).abs()).max(1.0);
    if cross.abs() > EDGE_EPSILON * scale {
        return false;
    }
    p.0 >= a.0.min(b.0) - EDGE_EPSILON
        && p.0 <= a.0.max(b.0) + EDGE_EPSILON
        && p.1 >= a.1.min(b.1) - EDGE_EPSILON
        && p.1 <= a.1.max(b.1) + EDGE_EPSILON
}

/// One or more polygons in EPSG:4326.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterest {
    polygons: Vec<Polygon>,
    bbox: BoundingBox,
    crs: CrsCode,
}

impl AreaOfInterest {
    /// Create an AOI from polygons. At least one polygon is required.
    pub fn new(polygons: Vec<Polygon>) -> GeoResult<Self> {
        let bbox = polygons
            .iter()
            .map(|p| *p.bbox())
            .reduce(|a, b| a.union(&b))
            .ok_or(GeoError::EmptyAoi)?;

        Ok(Self {
            polygons,
            bbox,
            crs: CrsCode::Epsg4326,
        })
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// Bounding box enclosing every polygon.
    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn crs(&self) -> CrsCode {
        self.crs
    }

    /// Check if a point falls within (or on the edge of) any polygon.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.bbox.contains_point(lon, lat) && self.polygons.iter().any(|p| p.contains(lon, lat))
    }

    /// Containment mask for paired coordinate arrays.
    pub fn contains_all(&self, lons: &[f64], lats: &[f64]) -> GeoResult<Vec<bool>> {
        if lons.len() != lats.len() {
            return Err(GeoError::CoordinateLengthMismatch {
                lon: lons.len(),
                lat: lats.len(),
            });
        }
        Ok(lons
            .iter()
            .zip(lats)
            .map(|(&lon, &lat)| self.contains(lon, lat))
            .collect())
    }

    /// Load an AOI from a GeoJSON file.
    pub fn from_path(path: impl AsRef<Path>) -> GeoResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| GeoError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let aoi = Self::from_geojson_str(&text)?;
        debug!(
            path = %path.display(),
            polygons = aoi.polygons.len(),
            "Loaded AOI"
        );
        Ok(aoi)
    }

    /// Parse an AOI from GeoJSON text.
    pub fn from_geojson_str(text: &str) -> GeoResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_geojson(&value)
    }

    /// Build an AOI from a parsed GeoJSON object.
    pub fn from_geojson(value: &Value) -> GeoResult<Self> {
        if let Some(name) = value
            .get("crs")
            .and_then(|crs| crs.get("properties"))
            .and_then(|props| props.get("name"))
            .and_then(Value::as_str)
        {
            CrsCode::parse(name)?;
        }

        let mut polygons = Vec::new();
        collect_polygons(value, &mut polygons)?;
        Self::new(polygons)
    }
}

fn collect_polygons(value: &Value, out: &mut Vec<Polygon>) -> GeoResult<()> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| GeoError::UnsupportedGeometry("missing 'type' member".to_string()))?;

    match kind {
        "FeatureCollection" => {
            let features = value
                .get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| GeoError::InvalidPolygon("missing 'features' array".to_string()))?;
            for feature in features {
                collect_polygons(feature, out)?;
            }
        }
        "Feature" => match value.get("geometry") {
            Some(geometry) if !geometry.is_null() => collect_polygons(geometry, out)?,
            _ => return Err(GeoError::UnsupportedGeometry("null geometry".to_string())),
        },
        "GeometryCollection" => {
            let geometries = value
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    GeoError::InvalidPolygon("missing 'geometries' array".to_string())
                })?;
            for geometry in geometries {
                collect_polygons(geometry, out)?;
            }
        }
        "Polygon" => out.push(parse_polygon(coordinates(value)?)?),
        "MultiPolygon" => {
            let parts = coordinates(value)?
                .as_array()
                .ok_or_else(|| GeoError::InvalidPolygon("coordinates must be an array".into()))?;
            for part in parts {
                out.push(parse_polygon(part)?);
            }
        }
        other => return Err(GeoError::UnsupportedGeometry(other.to_string())),
    }
    Ok(())
}

fn coordinates(value: &Value) -> GeoResult<&Value> {
    value
        .get("coordinates")
        .ok_or_else(|| GeoError::InvalidPolygon("missing 'coordinates' member".to_string()))
}

fn parse_polygon(value: &Value) -> GeoResult<Polygon> {
    let rings = value
        .as_array()
        .ok_or_else(|| GeoError::InvalidPolygon("polygon must be an array of rings".into()))?;
    let mut rings = rings.iter().map(parse_ring);
    let exterior = rings
        .next()
        .ok_or_else(|| GeoError::InvalidPolygon("polygon has no rings".to_string()))??;
    let holes = rings.collect::<GeoResult<Vec<_>>>()?;
    Polygon::with_holes(exterior, holes)
}

fn parse_ring(value: &Value) -> GeoResult<Vec<(f64, f64)>> {
    let positions = value
        .as_array()
        .ok_or_else(|| GeoError::InvalidPolygon("ring must be an array of positions".into()))?;
    positions
        .iter()
        .map(|position| {
            let pair = position.as_array().filter(|p| p.len() >= 2);
            match pair.map(|p| (p[0].as_f64(), p[1].as_f64())) {
                Some((Some(lon), Some(lat))) => Ok((lon, lat)),
                _ => Err(GeoError::InvalidCoordinate(position.to_string())),
            }
        })
        .collect()
}
