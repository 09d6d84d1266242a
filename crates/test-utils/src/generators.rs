//! Generators for synthetic beams.
//!
//! Shots are laid out along a straight ground track so tests can reason
//! about which of them fall inside an AOI without listing coordinates.

use gedi_common::{ColumnData, Matrix};
use h5frame::GroupBuilder;

/// Creates shot coordinates along a track.
///
/// Shot `i` is at `(start_lon + i * step_lon, start_lat + i * step_lat)`.
///
/// # Returns
///
/// `(lons, lats)`, each of length `n`.
///
/// # Example
///
/// ```
/// use test_utils::create_ground_track;
///
/// let (lons, lats) = create_ground_track(3, (10.0, 0.0), (0.5, -1.0));
/// assert_eq!(lons, vec![10.0, 10.5, 11.0]);
/// assert_eq!(lats, vec![0.0, -1.0, -2.0]);
/// ```
pub fn create_ground_track(
    n: usize,
    start: (f64, f64),
    step: (f64, f64),
) -> (Vec<f64>, Vec<f64>) {
    (0..n)
        .map(|i| {
            let i = i as f64;
            (start.0 + i * step.0, start.1 + i * step.1)
        })
        .unzip()
}

/// Creates a beam group with `n` shots along a ground track.
///
/// Datasets:
/// - `shot_number`: `0..n` (u64)
/// - `lat_lowestmode`/`lon_lowestmode`: the ground track
/// - `sensitivity`: cycles through `0.90, 0.92, ..., 0.98` (f32)
/// - `quality_flag`: 1 for even shots, 0 for odd (i8)
/// - `rh`: `n x ncols` matrix, row `i` column `j` is `i * 100 + j`
pub fn create_beam(
    name: &str,
    description: &str,
    n: usize,
    start: (f64, f64),
    step: (f64, f64),
    ncols: usize,
) -> GroupBuilder {
    let (lons, lats) = create_ground_track(n, start, step);
    let sensitivity: Vec<f32> = (0..n).map(|i| 0.90 + 0.02 * (i % 5) as f32).collect();
    let quality: Vec<i8> = (0..n).map(|i| if i % 2 == 0 { 1 } else { 0 }).collect();
    let rh: Vec<f64> = (0..n)
        .flat_map(|i| (0..ncols).map(move |j| (i * 100 + j) as f64))
        .collect();
    let rh = Matrix::new(ColumnData::Float64(rh), n, ncols).expect("rh has n * ncols values");

    GroupBuilder::new(name)
        .attr("description", description)
        .dataset("shot_number", ColumnData::UInt64((0..n as u64).collect()))
        .dataset("lat_lowestmode", ColumnData::Float64(lats))
        .dataset("lon_lowestmode", ColumnData::Float64(lons))
        .dataset("sensitivity", ColumnData::Float32(sensitivity))
        .dataset("quality_flag", ColumnData::Int8(quality))
        .dataset_2d("rh", rh)
}

/// Creates a granule holding the given beams.
pub fn create_granule(filename: &str, beams: Vec<GroupBuilder>) -> h5frame::MemoryGroup {
    beams
        .into_iter()
        .fold(GroupBuilder::new("/"), GroupBuilder::group)
        .build(filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use h5frame::{ArrayData, Dataset, HierarchicalGroup};

    #[test]
    fn test_create_ground_track() {
        let (lons, lats) = create_ground_track(4, (0.0, 1.0), (1.0, 0.5));
        assert_eq!(lons, vec![0.0, 1.0, 2.0, 3.0]);
        assert_eq!(lats, vec![1.0, 1.5, 2.0, 2.5]);
    }

    #[test]
    fn test_create_beam() {
        let granule = create_granule(
            "synthetic.h5",
            vec![create_beam("BEAM0101", "Full power beam", 5, (0.0, 0.0), (1.0, 0.0), 3)],
        );
        let rh = granule.dataset("BEAM0101/rh").unwrap().unwrap();
        assert_eq!(rh.shape(), vec![5, 3]);
        match rh.read().unwrap() {
            ArrayData::TwoD(matrix) => {
                assert_eq!(matrix.column(2).unwrap(), ColumnData::Float64(vec![2.0, 102.0, 202.0, 302.0, 402.0]));
            }
            ArrayData::OneD(_) => panic!("rh should be 2D"),
        }
        let flags = granule.dataset("BEAM0101/quality_flag").unwrap().unwrap();
        assert_eq!(
            flags.read().unwrap(),
            ArrayData::OneD(ColumnData::Int8(vec![1, 0, 1, 0, 1]))
        );
    }
}
