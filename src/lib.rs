//! # MPR-volume library
//!
//! This crate turns a flattened scan volume (CT or MRI) into displayable
//! 2-D images along the three medical planes:
//!  - Axial
//!  - Sagittal
//!  - Coronal
//!
//! Raw intensities are mapped to grayscale with a window/level (center and
//! width), either set by hand or picked from the static [`Preset`] table.
//! On-image distances, angles and areas are measured in millimeters when
//! the volume carries voxel spacing, in pixels otherwise.
//!
//! A [`SliceController`] drives one viewport: it owns the current slice
//! indices, window/level and layout, re-renders on every change and keeps
//! late volume responses from overwriting newer ones. Several controllers
//! may share one [`VolumeBuffer`] through an [`std::sync::Arc`].
//!
//! Volumes are assumed to have the following properties:
//!  - Intensities stored with width varying fastest, then height, then depth
//!  - Depth is the axial (slice) axis
//!  - Spacing in millimeters along (width, height, depth), unit if absent
//!
//! # Examples
//!
//! ## Rendering the middle sagittal slice
//!
//! ```no_run
//! # use mpr_volume::{VolumeLoader, SliceController, ViewerConfig, Layout, Orientation, Preset};
//! let volume = VolumeLoader::load_from_file("volumes/series-1.json")
//!     .expect("should have loaded volume file");
//! let mut controller = SliceController::new(&ViewerConfig {
//!     layout: Layout::Single(Orientation::Sagittal),
//!     ..Default::default()
//! });
//! controller.set_volume("series-1", volume);
//! controller.apply_preset(Preset::Brain);
//! let frame = controller
//!     .frame(Orientation::Sagittal)
//!     .expect("should have rendered the sagittal plane");
//! frame.image.save("result.png").expect("should have written png");
//! ```
//!
//! ## Measuring a distance
//!
//! ```
//! # use mpr_volume::{MeasurementEngine, MeasurementKind, Point};
//! let mut engine = MeasurementEngine::new(Some((2.0, 2.0)));
//! engine.select_tool(Some(MeasurementKind::Distance));
//! engine.add_point(Point::new(0.0, 0.0));
//! let measurement = engine.add_point(Point::new(3.0, 4.0)).unwrap();
//! assert_eq!(measurement.value, 10.0);
//! assert_eq!(measurement.unit.as_str(), "mm");
//! ```

pub mod config;
pub mod enums;
mod interpolator;
pub mod measurement;
pub mod slice;
pub mod slice_controller;
pub mod volume;
pub mod volume_loader;
pub mod window_level;

pub use config::{Layout, ViewerConfig};
pub use enums::{Interpolation, Orientation};
pub use measurement::{Measurement, MeasurementEngine, MeasurementKind, Point, Unit};
pub use slice::{SlicePlane, extract_slice};
pub use slice_controller::{ControllerState, LoadTicket, RenderedSlice, SliceController};
pub use volume::{Spacing, VolumeBuffer, VolumeError};
pub use volume_loader::{
    JsonFileSource, VolumeLoader, VolumeLoaderError, VolumeResponse, VolumeSource,
};
pub use window_level::{Preset, WindowLevel, map_plane};
