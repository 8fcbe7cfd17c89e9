use ndarray::Array3;
use thiserror::Error;

use crate::enums::Orientation;

#[derive(Debug, Error, PartialEq)]
pub enum VolumeError {
    #[error("Volume dimensions must be positive, got {0:?}")]
    ZeroDimension((usize, usize, usize)),

    #[error("Scalar data length {actual} does not match dimensions (expected {expected})")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Voxel spacing must be finite and positive, got {0:?}")]
    InvalidSpacing((f32, f32, f32)),
}

/// Physical size of one voxel in millimeters along (x, y, z).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spacing {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Spacing {
    pub const UNIT: Spacing = Spacing {
        x: 1.0,
        y: 1.0,
        z: 1.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Result<Self, VolumeError> {
        let valid = |v: f32| v.is_finite() && v > 0.0;
        if !(valid(x) && valid(y) && valid(z)) {
            return Err(VolumeError::InvalidSpacing((x, y, z)));
        }
        Ok(Self { x, y, z })
    }

    pub fn min(&self) -> f32 {
        self.x.min(self.y).min(self.z)
    }

    /// In-plane spacing of a slice as (column, row).
    pub fn in_plane(&self, orientation: Orientation) -> (f32, f32) {
        match orientation {
            Orientation::Axial => (self.x, self.y),
            Orientation::Sagittal => (self.y, self.z),
            Orientation::Coronal => (self.x, self.z),
        }
    }
}

impl Default for Spacing {
    fn default() -> Self {
        Self::UNIT
    }
}

/// An immutable scan volume.
///
/// Intensities are stored as `(depth, height, width)` in standard layout, so
/// the flat index of voxel `(x, y, z)` is `z * width * height + y * width + x`.
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeBuffer {
    data: Array3<f32>,
    spacing: Option<Spacing>,
}

impl VolumeBuffer {
    /// Build a volume from flattened scalar data.
    ///
    /// # Errors
    ///
    /// Returns an error if any dimension is zero or the data length is not
    /// `width * height * depth`.
    pub fn new(
        scalar_data: Vec<f32>,
        dimensions: (usize, usize, usize),
        spacing: Option<Spacing>,
    ) -> Result<Self, VolumeError> {
        let (width, height, depth) = dimensions;
        if width == 0 || height == 0 || depth == 0 {
            return Err(VolumeError::ZeroDimension(dimensions));
        }
        let expected = width
            .checked_mul(height)
            .and_then(|n| n.checked_mul(depth))
            .ok_or(VolumeError::LengthMismatch {
                expected: usize::MAX,
                actual: scalar_data.len(),
            })?;
        if scalar_data.len() != expected {
            return Err(VolumeError::LengthMismatch {
                expected,
                actual: scalar_data.len(),
            });
        }
        let data = Array3::from_shape_vec((depth, height, width), scalar_data).map_err(|_| {
            VolumeError::LengthMismatch {
                expected,
                actual: width * height * depth,
            }
        })?;
        Ok(Self { data, spacing })
    }

    /// Get the dimensions of the volume (width, height, depth)
    pub fn dimensions(&self) -> (usize, usize, usize) {
        let (depth, height, width) = self.data.dim();
        (width, height, depth)
    }

    /// Get a reference to the underlying data, indexed `[z, y, x]`
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    /// Spacing as supplied at load time, `None` if the source had none.
    pub fn known_spacing(&self) -> Option<Spacing> {
        self.spacing
    }

    /// Spacing with the unit default applied.
    pub fn spacing(&self) -> Spacing {
        self.spacing.unwrap_or_default()
    }

    pub fn voxel(&self, x: usize, y: usize, z: usize) -> Option<f32> {
        self.contains(x, y, z).then(|| self.data[[z, y, x]])
    }

    /// Highest valid slice index for an orientation.
    pub fn max_slice(&self, orientation: Orientation) -> usize {
        let (width, height, depth) = self.dimensions();
        match orientation {
            Orientation::Axial => depth - 1,
            Orientation::Sagittal => width - 1,
            Orientation::Coronal => height - 1,
        }
    }

    pub fn contains(&self, x: usize, y: usize, z: usize) -> bool {
        let (width, height, depth) = self.dimensions();
        x < width && y < height && z < depth
    }
}
