use log::debug;
use ndarray::{Array2, s};

use crate::enums::Orientation;
use crate::volume::VolumeBuffer;

/// A 2-D plane cut from a volume, rows first.
#[derive(Clone, Debug, PartialEq)]
pub struct SlicePlane {
    pub orientation: Orientation,
    data: Array2<f32>,
}

impl SlicePlane {
    pub(crate) fn from_array(orientation: Orientation, data: Array2<f32>) -> Self {
        Self { orientation, data }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// Plane values indexed `[row, column]`
    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn get(&self, column: usize, row: usize) -> Option<f32> {
        self.data.get([row, column]).copied()
    }

    /// Row-major copy of the plane values.
    pub fn scalar_data(&self) -> Vec<f32> {
        self.data.iter().copied().collect()
    }
}

/// Clamp a requested index (possibly negative) into `[0, max_slice]`.
pub fn clamp_slice_index(volume: &VolumeBuffer, orientation: Orientation, index: i64) -> usize {
    let max = volume.max_slice(orientation);
    let clamped = index.clamp(0, max as i64) as usize;
    if clamped as i64 != index {
        debug!(
            "clamped {} slice index {index} to {clamped}",
            orientation.name()
        );
    }
    clamped
}

/// Cut a plane out of `volume`.
///
/// Axial planes are `width x height`, sagittal planes have a row per depth
/// and a column per height, coronal planes a row per depth and a column per
/// width. The result never aliases the volume. Returns `None` if no volume
/// is loaded; an out-of-range `index` is clamped.
pub fn extract_slice(
    volume: Option<&VolumeBuffer>,
    orientation: Orientation,
    index: usize,
) -> Option<SlicePlane> {
    let volume = volume?;
    let index = clamp_slice_index(volume, orientation, index.min(i64::MAX as usize) as i64);
    let data = volume.data();
    let plane = match orientation {
        Orientation::Axial => data.slice(s![index, .., ..]),
        Orientation::Sagittal => data.slice(s![.., .., index]),
        Orientation::Coronal => data.slice(s![.., index, ..]),
    };
    Some(SlicePlane::from_array(orientation, plane.to_owned()))
}
