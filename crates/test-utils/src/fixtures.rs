//! Common test fixtures for subsetting tests.
//!
//! The fixture granule mirrors a small GEDI L4A file: two beams of three
//! shots each, one coverage beam and one full power beam. The first and
//! last shot of every beam fall inside [`aoi`]; the middle shot lies south
//! of it.

use gedi_common::{AreaOfInterest, BoundingBox, ColumnData, Matrix, Polygon};
use h5frame::{GroupBuilder, MemoryGroup};

/// File name reported by the fixture granule.
pub const GRANULE_FILENAME: &str = "temp.h5";

/// Shot latitudes shared by both beams.
pub const LAT_LOWESTMODE: [f64; 3] = [-1.82556, -9.82514, -1.82471];

/// Shot longitudes shared by both beams.
pub const LON_LOWESTMODE: [f64; 3] = [12.06648, 12.06678, 12.06707];

/// Coordinates of the two AOI polygons. They share the `lat = 0` edge.
pub mod aoi_rings {
    pub const NORTH: [(f64, f64); 5] = [
        (8.45, 2.35),
        (14.35, 2.35),
        (14.35, 0.0),
        (8.45, 0.0),
        (8.45, 2.35),
    ];

    pub const SOUTH: [(f64, f64); 5] = [
        (8.45, 0.0),
        (14.35, 0.0),
        (14.35, -4.15),
        (8.45, -4.15),
        (8.45, 0.0),
    ];
}

/// Per-beam values that differ between the two fixture beams.
struct BeamValues {
    name: &'static str,
    description: &'static str,
    beam: u16,
    agbd: [f32; 3],
    agbd_se: [f32; 3],
    sensitivity: [f32; 3],
    xvar: [[f64; 2]; 3],
    treecover: [f64; 3],
}

const BEAM0000: BeamValues = BeamValues {
    name: "BEAM0000",
    description: "Coverage beam",
    beam: 0,
    agbd: [1.271942, 1.3311168, 1.1160929],
    agbd_se: [3.057197, 3.053778, 3.06673],
    sensitivity: [0.9, 0.97, 0.99],
    xvar: [[10.0, 15.0], [20.0, 10.0], [15.0, 20.0]],
    treecover: [77.0, 98.0, 95.0],
};

const BEAM1011: BeamValues = BeamValues {
    name: "BEAM1011",
    description: "Full power beam",
    beam: 11,
    agbd: [1.1715966, 1.630395, 3.5265787],
    agbd_se: [3.063243, 3.037882, 2.9968245],
    sensitivity: [0.93, 0.96, 0.98],
    xvar: [[15.0, 20.0], [25.0, 15.0], [20.0, 25.0]],
    treecover: [68.0, 85.0, 83.0],
};

fn beam_group(values: &BeamValues) -> GroupBuilder {
    let xvar: Vec<Vec<f64>> = values.xvar.iter().map(|row| row.to_vec()).collect();
    let xvar = Matrix::from_rows(&xvar).expect("fixture xvar is rectangular");

    GroupBuilder::new(values.name)
        .attr("description", values.description)
        .dataset("beam", ColumnData::UInt16(vec![values.beam; 3]))
        .dataset("shot_number", ColumnData::UInt64(vec![0, 1, 2]))
        .dataset("agbd", ColumnData::Float32(values.agbd.to_vec()))
        .dataset("agbd_se", ColumnData::Float32(values.agbd_se.to_vec()))
        .dataset("l2_quality_flag", ColumnData::Int8(vec![0, 1, 1]))
        .dataset("l4_quality_flag", ColumnData::Int8(vec![1, 0, 1]))
        .dataset("lat_lowestmode", ColumnData::Float64(LAT_LOWESTMODE.to_vec()))
        .dataset("lon_lowestmode", ColumnData::Float64(LON_LOWESTMODE.to_vec()))
        .dataset(
            "lat_highestreturn",
            ColumnData::Float64(vec![-0.82556, -8.82514, -0.82471]),
        )
        .dataset(
            "lon_highestreturn",
            ColumnData::Float64(vec![13.06648, 13.06678, 13.06707]),
        )
        .dataset("sensitivity", ColumnData::Float32(values.sensitivity.to_vec()))
        .dataset_2d("xvar", xvar)
        .group(GroupBuilder::new("land_cover_data").dataset(
            "landsat_treecover",
            ColumnData::Float64(values.treecover.to_vec()),
        ))
        .group(
            GroupBuilder::new("geolocation")
                .dataset(
                    "latitude_instrument",
                    ColumnData::Float64(vec![-2.82556, -10.82514, -2.82471]),
                )
                .dataset(
                    "longitude_instrument",
                    ColumnData::Float64(vec![13.06648, 13.06678, 13.06707]),
                ),
        )
}

/// The coverage beam `BEAM0000` on its own.
pub fn coverage_beam() -> GroupBuilder {
    beam_group(&BEAM0000)
}

/// The full power beam `BEAM1011` on its own.
pub fn power_beam() -> GroupBuilder {
    beam_group(&BEAM1011)
}

/// The two-beam fixture granule, with `METADATA` and `ANCILLARY` groups that
/// subsetting must ignore.
pub fn gedi_granule() -> MemoryGroup {
    GroupBuilder::new("/")
        .group(GroupBuilder::new("ANCILLARY").dataset("model_data", ColumnData::Int32(vec![1])))
        .group(coverage_beam())
        .group(power_beam())
        .group(GroupBuilder::new("METADATA").attr("short_name", "GEDI_L4A"))
        .build(GRANULE_FILENAME)
}

/// The `BEAM0000` group of a fresh fixture granule.
pub fn beam0000() -> MemoryGroup {
    use h5frame::HierarchicalGroup;

    gedi_granule()
        .group("BEAM0000")
        .ok()
        .flatten()
        .expect("fixture granule has a BEAM0000 group")
}

/// The fixture AOI: two rectangles covering lon 8.45..14.35 and
/// lat -4.15..2.35.
pub fn aoi() -> AreaOfInterest {
    let polygons = [aoi_rings::NORTH, aoi_rings::SOUTH]
        .into_iter()
        .map(|ring| Polygon::new(ring.to_vec()))
        .collect::<Result<Vec<_>, _>>();
    polygons
        .and_then(AreaOfInterest::new)
        .expect("fixture AOI is valid")
}

/// An AOI covering the whole globe.
pub fn global_aoi() -> AreaOfInterest {
    let polygon = Polygon::rectangle(BoundingBox::new(-180.0, -90.0, 180.0, 90.0));
    polygon
        .and_then(|p| AreaOfInterest::new(vec![p]))
        .expect("global AOI is valid")
}

/// The fixture AOI as a GeoJSON FeatureCollection.
pub fn aoi_geojson() -> String {
    let ring = |coords: &[(f64, f64)]| {
        let points: Vec<String> = coords
            .iter()
            .map(|(x, y)| format!("[{}, {}]", x, y))
            .collect();
        format!("[[{}]]", points.join(", "))
    };
    let feature = |coords: &[(f64, f64)]| {
        format!(
            r#"{{"type": "Feature", "properties": {{}}, "geometry": {{"type": "Polygon", "coordinates": {}}}}}"#,
            ring(coords)
        )
    };
    format!(
        r#"{{"type": "FeatureCollection", "features": [{}, {}]}}"#,
        feature(&aoi_rings::NORTH),
        feature(&aoi_rings::SOUTH)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use h5frame::{Dataset, HierarchicalGroup};

    #[test]
    fn test_granule_layout() {
        let granule = gedi_granule();
        assert_eq!(granule.filename(), GRANULE_FILENAME);
        assert_eq!(
            granule.member_names().unwrap(),
            vec!["ANCILLARY", "BEAM0000", "BEAM1011", "METADATA"]
        );
        let xvar = granule.dataset("BEAM1011/xvar").unwrap().unwrap();
        assert_eq!(xvar.shape(), vec![3, 2]);
    }

    #[test]
    fn test_aoi_matches_geojson() {
        let from_json = AreaOfInterest::from_geojson_str(&aoi_geojson()).unwrap();
        let built = aoi();
        assert_eq!(from_json.polygons().len(), 2);
        for (lon, lat) in LON_LOWESTMODE.iter().zip(LAT_LOWESTMODE.iter()) {
            assert_eq!(from_json.contains(*lon, *lat), built.contains(*lon, *lat));
        }
    }
}
