//! Tests for the native HDF5 backend.
//!
//! Run with `cargo test -p h5frame --features hdf5`.

#![cfg(feature = "hdf5")]

use std::path::Path;
use std::sync::Arc;

use filter_expr::TokenTable;
use gedi_common::ColumnData;
use h5frame::{silence_hdf5_errors, Dataset, H5Group, HierarchicalGroup, LazyTable};
use hdf5::types::VarLenUnicode;
use h5frame::FrameError;
use test_utils::{require_test_file, temp_test_dir};

/// Write a one-beam granule with a 1D, a 2D and a nested dataset.
fn write_granule(path: &Path) -> hdf5::Result<()> {
    let file = hdf5::File::create(path)?;
    let beam = file.create_group("BEAM0000")?;

    let description: VarLenUnicode = "Coverage beam".parse().expect("ascii");
    beam.new_attr::<VarLenUnicode>()
        .create("description")?
        .write_scalar(&description)?;

    beam.new_dataset_builder()
        .with_data(&[1.271942_f32, 1.3311168, 1.1160929])
        .create("agbd")?;
    beam.new_dataset_builder()
        .with_data(&[0_i8, 1, 1])
        .create("l2_quality_flag")?;

    let xvar = beam.new_dataset::<f64>().shape((3, 2)).create("xvar")?;
    xvar.write_raw(&[10.0, 15.0, 20.0, 10.0, 15.0, 20.0])?;

    let rh: Vec<f32> = (0..3)
        .flat_map(|row| (0..101).map(move |col| (row * 1000 + col) as f32))
        .collect();
    let rh_dataset = beam.new_dataset::<f32>().shape((3, 101)).create("rh")?;
    rh_dataset.write_raw(&rh)?;

    let land_cover = beam.create_group("land_cover_data")?;
    land_cover
        .new_dataset_builder()
        .with_data(&[77.0_f64, 98.0, 95.0])
        .create("landsat_treecover")?;

    Ok(())
}

fn open_beam(dir: &tempfile::TempDir) -> H5Group {
    let path = dir.path().join("granule.h5");
    write_granule(&path).expect("write granule");
    let granule = H5Group::open(&path).expect("open granule");
    granule.group("BEAM0000").unwrap().expect("beam exists")
}

// ============================================================================
// Group access
// ============================================================================

#[test]
fn test_group_members_and_attributes() {
    silence_hdf5_errors();
    let dir = temp_test_dir();
    let beam = open_beam(&dir);

    assert_eq!(beam.basename(), "BEAM0000");
    assert!(beam.filename().ends_with("granule.h5"));
    assert_eq!(
        beam.member_names().unwrap(),
        vec!["agbd", "l2_quality_flag", "land_cover_data", "rh", "xvar"]
    );
    assert_eq!(beam.attr("description").unwrap().as_deref(), Some("Coverage beam"));
    assert_eq!(beam.attr("missing").unwrap(), None);
    assert!(beam.get("missing").unwrap().is_none());
    assert!(beam.dataset("land_cover_data").unwrap().is_none());
}

#[test]
fn test_dataset_reads() {
    let dir = temp_test_dir();
    let beam = open_beam(&dir);

    let flags = beam.dataset("l2_quality_flag").unwrap().unwrap();
    assert_eq!(flags.shape(), vec![3]);
    assert_eq!(flags.read().unwrap().into_column(), ColumnData::Int8(vec![0, 1, 1]));

    let xvar = beam.dataset("xvar").unwrap().unwrap();
    assert_eq!(xvar.ndim(), 2);
    assert_eq!(
        xvar.read_column(1).unwrap(),
        ColumnData::Float64(vec![15.0, 10.0, 20.0])
    );
}

#[test]
fn test_read_single_column() {
    let dir = temp_test_dir();
    let beam = open_beam(&dir);

    let rh = beam.dataset("rh").unwrap().unwrap();
    assert_eq!(rh.shape(), vec![3, 101]);
    assert_eq!(
        rh.read_column(100).unwrap(),
        ColumnData::Float32(vec![100.0, 1100.0, 2100.0])
    );
    assert_eq!(
        rh.read_column(0).unwrap(),
        ColumnData::Float32(vec![0.0, 1000.0, 2000.0])
    );
    assert!(matches!(
        rh.read_column(101),
        Err(FrameError::IndexOutOfRange { index: 101, length: 101 })
    ));

    let agbd = beam.dataset("agbd").unwrap().unwrap();
    assert!(matches!(agbd.read_column(0), Err(FrameError::RankMismatch { .. })));
}

#[test]
fn test_slice_key_reads_columns() {
    let dir = temp_test_dir();
    let table = LazyTable::new(open_beam(&dir), Arc::new(TokenTable::new()));

    let frame = table.get_many(&["rh[-2:]"]).unwrap();
    assert_eq!(frame.column_names(), vec!["rh[-2]", "rh[-1]"]);
    assert_eq!(
        frame.column("rh[-1]").unwrap().data(),
        &ColumnData::Float32(vec![100.0, 1100.0, 2100.0])
    );
}

// ============================================================================
// Lazy tables over a file
// ============================================================================

#[test]
fn test_query_over_file() {
    let dir = temp_test_dir();
    let table = LazyTable::new(open_beam(&dir), Arc::new(TokenTable::new()));

    let filtered = table
        .query("l2_quality_flag == 1 and `land_cover_data/landsat_treecover` > 96")
        .unwrap();
    let frame = filtered.get_many(&["agbd", "xvar[0]"]).unwrap();

    assert_eq!(frame.nrows(), 1);
    assert_eq!(
        frame.column("agbd").unwrap().data(),
        &ColumnData::Float32(vec![1.3311168])
    );
    assert_eq!(
        frame.column("xvar[0]").unwrap().data(),
        &ColumnData::Float64(vec![20.0])
    );
}

#[test]
fn test_open_missing_file() {
    let dir = temp_test_dir();
    let err = H5Group::open(dir.path().join("absent.h5")).err().unwrap();
    assert!(err.to_string().contains("absent.h5"));
}

// ============================================================================
// Real granules (skipped unless present)
// ============================================================================

#[test]
fn test_real_l4a_granule() {
    let path = require_test_file!("GEDI04_A_2019146134206_O02558_01_T05641_02_002_02_V002.h5");
    let granule = H5Group::open(&path).unwrap();

    let beam = granule.group("BEAM0000").unwrap().expect("BEAM0000");
    let table = LazyTable::new(beam, Arc::new(TokenTable::new()));
    let frame = table
        .get_many(&["agbd", "lat_lowestmode", "lon_lowestmode"])
        .unwrap();
    assert!(frame.nrows() > 0);
}
