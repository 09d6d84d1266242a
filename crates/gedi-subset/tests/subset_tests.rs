//! End-to-end subsetting of the fixture granule.

use std::collections::BTreeSet;

use gedi_common::{ColumnData, Point};
use gedi_subset::{
    subset_beam, subset_hdf5, BeamFilter, GeoFrame, SubsetError, Subsetter, DEFAULT_LAT, DEFAULT_LON,
};
use h5frame::{FrameError, HierarchicalGroup};
use test_utils::fixtures;

fn run(columns: &[&str], query: Option<&str>) -> GeoFrame {
    Subsetter::new(columns)
        .with_query(query)
        .subset_hdf5(&fixtures::gedi_granule(), &fixtures::aoi())
        .unwrap()
}

fn assert_shape(result: &GeoFrame, columns: &[&str], rows: usize) {
    let mut expected: BTreeSet<&str> = columns.iter().copied().collect();
    expected.extend(["filename", "BEAM", "geometry"]);
    let actual: BTreeSet<&str> = result.column_names().into_iter().collect();

    assert_eq!(actual, expected);
    assert_eq!(result.nrows(), rows);
    assert_eq!(result.frame().nrows(), rows);
}

// ============================================================================
// Granule scenarios
// ============================================================================

#[test]
fn test_query_matching_nothing() {
    let result = run(&["agbd"], Some("sensitivity < 0.9"));
    assert_shape(&result, &["agbd"], 0);
    assert!(result.is_empty());
}

#[test]
fn test_sensitivity_and_l4_quality() {
    let columns = ["agbd", "agbd_se"];
    let result = run(&columns, Some("sensitivity > 0.95 and l4_quality_flag == 1"));
    assert_shape(&result, &columns, 2);
    assert_eq!(
        result.column("agbd").unwrap().data(),
        &ColumnData::Float32(vec![1.1160929, 3.5265787])
    );
}

#[test]
fn test_agbd_and_l2_quality() {
    let columns = ["sensitivity", "agbd"];
    assert_shape(&run(&columns, Some("agbd > 1 and l2_quality_flag == 1")), &columns, 2);
}

#[test]
fn test_filter_on_requested_column() {
    let columns = ["sensitivity", "agbd", "agbd_se"];
    assert_shape(&run(&columns, Some("agbd_se > 3")), &columns, 3);
}

#[test]
fn test_float32_threshold_is_inclusive() {
    let columns = ["agbd", "lat_lowestmode", "lon_lowestmode"];
    let result = run(&columns, Some("sensitivity >= 0.9"));
    assert_shape(&result, &columns, 4);

    let lats = result.column("lat_lowestmode").unwrap().data().to_f64_vec().unwrap();
    let points: Vec<f64> = result.geometry().iter().map(|p| p.y).collect();
    assert_eq!(lats, points);
}

#[test]
fn test_strict_float32_threshold() {
    let columns = ["sensitivity", "agbd", "agbd_se"];
    assert_shape(&run(&columns, Some("sensitivity > 0.96")), &columns, 2);
}

#[test]
fn test_trailing_index_column_with_ampersand() {
    let result = run(&["xvar0"], Some("l2_quality_flag == 1 & sensitivity > 0.9"));
    assert_shape(&result, &["xvar0"], 2);
    assert_eq!(
        result.column("xvar0").unwrap().data(),
        &ColumnData::Float64(vec![15.0, 20.0])
    );
}

#[test]
fn test_dot_and_backtick_paths_agree() {
    let columns = ["land_cover_data/landsat_treecover"];
    let dotted = run(&columns, Some("land_cover_data.landsat_treecover > 60.0"));
    let quoted = run(&columns, Some("`land_cover_data/landsat_treecover` > 60.0"));

    assert_shape(&dotted, &columns, 4);
    assert_shape(&quoted, &columns, 4);
    assert_eq!(
        dotted.column(columns[0]).unwrap().data(),
        quoted.column(columns[0]).unwrap().data()
    );
    assert_eq!(dotted.geometry(), quoted.geometry());

    let narrower = run(&columns, Some("land_cover_data.landsat_treecover > 70.0"));
    assert_eq!(narrower.nrows(), 3);
}

#[test]
fn test_no_query_keeps_aoi_rows() {
    let columns = ["sensitivity", "agbd", "agbd_se"];
    assert_shape(&run(&columns, None), &columns, 4);
    assert_shape(&run(&["sensitivity"], Some("   ")), &["sensitivity"], 4);
}

#[test]
fn test_filename_and_beam_columns() {
    let result = run(&["agbd"], None);
    assert_eq!(result.column_names(), vec!["filename", "BEAM", "agbd", "geometry"]);
    assert_eq!(
        result.column("filename").unwrap().data(),
        &ColumnData::Utf8(vec!["temp.h5".to_string(); 4])
    );
    assert_eq!(
        result.column("BEAM").unwrap().data(),
        &ColumnData::Utf8(
            ["0000", "0000", "1011", "1011"]
                .iter()
                .map(|s| s.to_string())
                .collect()
        )
    );
    assert_eq!(result.geometry()[0], Point::new(12.06648, -1.82556));
}

// ============================================================================
// Beam selection
// ============================================================================

#[test]
fn test_coverage_filter_excludes_power_beam() {
    let result = Subsetter::new(&["agbd"])
        .with_beams(BeamFilter::Coverage)
        .subset_hdf5(&fixtures::gedi_granule(), &fixtures::global_aoi())
        .unwrap();

    assert_eq!(result.nrows(), 3);
    assert_eq!(
        result.column("BEAM").unwrap().data(),
        &ColumnData::Utf8(vec!["0000".to_string(); 3])
    );
}

#[test]
fn test_power_and_named_filters() {
    let granule = fixtures::gedi_granule();
    let aoi = fixtures::aoi();

    let power = Subsetter::new(&["agbd"])
        .with_beams(BeamFilter::Power)
        .subset_hdf5(&granule, &aoi)
        .unwrap();
    assert_eq!(
        power.column("BEAM").unwrap().data(),
        &ColumnData::Utf8(vec!["1011".to_string(); 2])
    );

    let named = Subsetter::new(&["agbd"])
        .with_beams(BeamFilter::parse("1011").unwrap())
        .subset_hdf5(&granule, &aoi)
        .unwrap();
    assert_eq!(named.nrows(), 2);
}

#[test]
fn test_no_selected_beams_gives_empty_result_with_columns() {
    let result = Subsetter::new(&["agbd", "sensitivity"])
        .with_beams(BeamFilter::parse("0001").unwrap())
        .subset_hdf5(&fixtures::gedi_granule(), &fixtures::aoi())
        .unwrap();

    assert!(result.is_empty());
    assert_eq!(
        result.column_names(),
        vec!["filename", "BEAM", "agbd", "sensitivity", "geometry"]
    );
}

#[test]
fn test_empty_result_expands_slices_like_a_selected_beam() {
    let granule = fixtures::gedi_granule();
    let aoi = fixtures::aoi();
    let columns = ["xvar[:]", "xvar[1]", "nope[:]"];

    let empty = Subsetter::new(&columns)
        .with_beams(BeamFilter::parse("0001").unwrap())
        .subset_hdf5(&granule, &aoi)
        .unwrap();
    assert!(empty.is_empty());
    assert_eq!(
        empty.column_names(),
        vec!["filename", "BEAM", "xvar[0]", "xvar[1]", "nope[:]", "geometry"]
    );

    let selected = Subsetter::new(&["xvar[:]"]).subset_hdf5(&granule, &aoi).unwrap();
    assert_eq!(
        selected.column_names(),
        vec!["filename", "BEAM", "xvar[0]", "xvar[1]", "geometry"]
    );
}

// ============================================================================
// Beam level behaviour
// ============================================================================

#[test]
fn test_free_functions_take_coordinates() {
    let columns = vec!["agbd".to_string()];
    let beam = subset_beam(
        &fixtures::beam0000(),
        &fixtures::aoi(),
        "geolocation/latitude_instrument",
        "geolocation/longitude_instrument",
        &columns,
        None,
    )
    .unwrap();
    assert_eq!(beam.nrows(), 2);
    assert_eq!(beam.geometry()[0], Point::new(13.06648, -2.82556));

    let granule = subset_hdf5(
        &fixtures::gedi_granule(),
        &fixtures::aoi(),
        DEFAULT_LAT,
        DEFAULT_LON,
        BeamFilter::Power,
        &columns,
        Some("l2_quality_flag == 1"),
    )
    .unwrap();
    assert_eq!(granule.nrows(), 1);
    assert_eq!(granule.geometry()[0], Point::new(12.06707, -1.82471));
}

#[test]
fn test_subset_beam_with_nested_coordinates() {
    let beam = fixtures::beam0000();
    let result = Subsetter::new(&["agbd"])
        .with_coordinates("geolocation/latitude_instrument", "geolocation/longitude_instrument")
        .subset_beam(&beam, &fixtures::aoi())
        .unwrap();

    assert_eq!(result.column_names(), vec!["agbd", "geometry"]);
    assert_eq!(result.nrows(), 2);
    assert_eq!(result.geometry()[0], Point::new(13.06648, -2.82556));
}

#[test]
fn test_duplicate_columns_emitted_once() {
    let result = Subsetter::new(&["agbd", "agbd", "lat_lowestmode"])
        .subset_beam(&fixtures::beam0000(), &fixtures::aoi())
        .unwrap();
    assert_eq!(result.column_names(), vec!["agbd", "lat_lowestmode", "geometry"]);
}

#[test]
fn test_query_reads_are_limited_to_referenced_datasets() {
    let granule = fixtures::gedi_granule();
    let beam = granule.group("BEAM0000").unwrap().unwrap();
    Subsetter::new(&["agbd"])
        .with_query(Some("sensitivity > 0.95"))
        .subset_beam(&beam, &fixtures::aoi())
        .unwrap();

    let mut reads = granule.reads();
    reads.sort();
    assert_eq!(
        reads,
        vec![
            "/BEAM0000/agbd",
            "/BEAM0000/lat_lowestmode",
            "/BEAM0000/lon_lowestmode",
            "/BEAM0000/sensitivity",
        ]
    );
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn test_whole_2d_column_is_rejected() {
    let err = Subsetter::new(&["xvar"])
        .subset_hdf5(&fixtures::gedi_granule(), &fixtures::aoi())
        .unwrap_err();
    assert!(matches!(
        err,
        SubsetError::Frame(FrameError::Ambiguous2D { .. })
    ));
}

#[test]
fn test_missing_coordinates() {
    let err = Subsetter::new(&["agbd"])
        .with_coordinates("lat_nope", "lon_lowestmode")
        .subset_beam(&fixtures::beam0000(), &fixtures::aoi())
        .unwrap_err();
    assert!(matches!(
        err,
        SubsetError::MissingCoordinates { ref beam, ref column } if beam == "BEAM0000" && column == "lat_nope"
    ));
}

#[test]
fn test_undefined_query_name_propagates() {
    let err = Subsetter::new(&["agbd"])
        .with_query(Some("no_such_dataset > 1"))
        .subset_hdf5(&fixtures::gedi_granule(), &fixtures::aoi())
        .unwrap_err();
    assert!(matches!(err, SubsetError::Frame(FrameError::Expression(_))));
}
