//! Projection of fixture beam datasets into columns.

use filter_expr::TokenTable;
use gedi_common::ColumnData;
use h5frame::{ArrayData, FrameError, HierarchicalGroup, Projector};
use test_utils::fixtures;

fn xvar_column(projection: &h5frame::Projection, key: &str) -> ColumnData {
    match projection.get(key) {
        Some(ArrayData::OneD(data)) => data.clone(),
        other => panic!("expected 1D entry for {}, got {:?}", key, other),
    }
}

// ============================================================================
// Plain keys
// ============================================================================

#[test]
fn test_single_name_matches_source_length() {
    let beam = fixtures::beam0000();
    let tokens = TokenTable::new();
    let projection = Projector::new(&beam, &tokens).project(&["agbd"]).unwrap();

    assert_eq!(projection.keys(), vec!["agbd"]);
    assert_eq!(projection.get("agbd").unwrap().nrows(), 3);
    assert_eq!(beam.reads(), vec!["/BEAM0000/agbd"]);
}

#[test]
fn test_nested_path_and_whole_2d() {
    let beam = fixtures::beam0000();
    let tokens = TokenTable::new();
    let projection = Projector::new(&beam, &tokens)
        .project(&["land_cover_data/landsat_treecover", "xvar"])
        .unwrap();

    assert_eq!(
        projection.keys(),
        vec!["land_cover_data/landsat_treecover", "xvar"]
    );
    assert!(matches!(projection.get("xvar"), Some(ArrayData::TwoD(_))));
}

#[test]
fn test_missing_dataset_and_group() {
    let beam = fixtures::beam0000();
    let tokens = TokenTable::new();
    let projector = Projector::new(&beam, &tokens);

    assert!(matches!(
        projector.project(&["missing"]),
        Err(FrameError::DatasetNotFound { .. })
    ));
    assert!(matches!(
        projector.project(&["land_cover_data"]),
        Err(FrameError::DatasetNotFound { .. })
    ));
}

#[test]
fn test_duplicate_requests_are_idempotent() {
    let beam = fixtures::beam0000();
    let tokens = TokenTable::new();
    let projection = Projector::new(&beam, &tokens)
        .project(&["agbd", "xvar[0]", "agbd", "xvar[:1]"])
        .unwrap();

    assert_eq!(projection.keys(), vec!["agbd", "xvar[0]"]);
}

// ============================================================================
// Index and slice suffixes
// ============================================================================

#[test]
fn test_full_slice_lists_every_column() {
    let beam = fixtures::beam0000();
    let tokens = TokenTable::new();
    let projection = Projector::new(&beam, &tokens).project(&["xvar[:]"]).unwrap();

    assert_eq!(projection.keys(), vec!["xvar[0]", "xvar[1]"]);
    assert_eq!(
        xvar_column(&projection, "xvar[1]"),
        ColumnData::Float64(vec![15.0, 10.0, 20.0])
    );
}

#[test]
fn test_negative_slice_keeps_negative_names() {
    let beam = fixtures::beam0000();
    let tokens = TokenTable::new();
    let projector = Projector::new(&beam, &tokens);

    assert_eq!(
        projector.project(&["xvar[-2:]"]).unwrap().keys(),
        vec!["xvar[-2]", "xvar[-1]"]
    );
    assert_eq!(
        projector.project(&["xvar[-1:]"]).unwrap().keys(),
        vec!["xvar[-1]"]
    );
}

#[test]
fn test_index_agrees_with_slice() {
    let beam = fixtures::beam0000();
    let tokens = TokenTable::new();
    let projector = Projector::new(&beam, &tokens);
    let all = projector.project(&["xvar[:]"]).unwrap();

    for i in 0..2 {
        let key = format!("xvar[{}]", i);
        let single = projector.project(&[key.as_str()]).unwrap();
        assert_eq!(xvar_column(&single, &key), xvar_column(&all, &key));
    }

    let last = projector.project(&["xvar[-1]"]).unwrap();
    assert_eq!(xvar_column(&last, "xvar[-1]"), xvar_column(&all, "xvar[1]"));
}

#[test]
fn test_out_of_range_slice_is_empty() {
    let beam = fixtures::beam0000();
    let tokens = TokenTable::new();
    let projection = Projector::new(&beam, &tokens).project(&["xvar[100:]"]).unwrap();

    assert!(projection.is_empty());
    assert_eq!(projection.into_frame(false).unwrap().ncols(), 0);
}

#[test]
fn test_out_of_range_index_is_an_error() {
    let beam = fixtures::beam0000();
    let tokens = TokenTable::new();
    assert!(matches!(
        Projector::new(&beam, &tokens).project(&["xvar[2]"]),
        Err(FrameError::IndexOutOfRange { index: 2, length: 2 })
    ));
}

#[test]
fn test_suffix_on_1d_dataset_is_rank_mismatch() {
    let beam = fixtures::beam0000();
    let tokens = TokenTable::new();
    let projector = Projector::new(&beam, &tokens);

    for key in ["agbd[0]", "agbd[:]", "agbd[-1:]"] {
        assert!(
            matches!(projector.project(&[key]), Err(FrameError::RankMismatch { .. })),
            "{} should be rejected",
            key
        );
    }
}

// ============================================================================
// Tabular conversion and mangled keys
// ============================================================================

#[test]
fn test_select_expands_2d() {
    let beam = fixtures::beam0000();
    let tokens = TokenTable::new();
    let projector = Projector::new(&beam, &tokens);

    let expanded = projector.select("xvar").unwrap();
    assert_eq!(expanded.column_names(), vec!["0", "1"]);

    let rows = projector.select_many(&["xvar", "agbd"]).unwrap();
    assert_eq!(rows.column_names(), vec!["xvar", "agbd"]);
    assert!(matches!(rows.column("xvar").unwrap().data(), ColumnData::Rows(_)));
    assert_eq!(rows.nrows(), 3);
}

#[test]
fn test_mangled_keys_are_recovered() {
    let beam = fixtures::beam0000();
    let tokens = TokenTable::new();
    let mangled = tokens.sanitize("land_cover_data/landsat_treecover");
    assert_ne!(mangled, "land_cover_data/landsat_treecover");

    let projection = Projector::new(&beam, &tokens).project(&[mangled]).unwrap();
    assert_eq!(projection.keys(), vec!["land_cover_data/landsat_treecover"]);

    let sliced = tokens.sanitize("xvar[-1]");
    let projection = Projector::new(&beam, &tokens).project(&[sliced]).unwrap();
    assert_eq!(projection.keys(), vec!["xvar[-1]"]);
}

#[test]
fn test_projection_reads_only_named_datasets() {
    let granule = fixtures::gedi_granule();
    let beam = granule.group("BEAM1011").unwrap().unwrap();
    let tokens = TokenTable::new();
    Projector::new(&beam, &tokens)
        .project(&["sensitivity", "xvar[0]"])
        .unwrap();

    assert_eq!(
        granule.reads(),
        vec!["/BEAM1011/sensitivity", "/BEAM1011/xvar"]
    );
}
