//! Per-viewport state machine driving extraction and rendering.
//!
//! ```text
//! Empty --begin_load--> Loading --complete_load(Ok)--> Ready
//!                          |    \--complete_load(Err)--> Error
//!                          \--cancel_load--> Ready | Empty
//! Ready | Error --begin_load--> Loading
//! ```
//!
//! Every mutation renders synchronously before returning, so a frame is
//! never older than the last processed event.

use futures::future::{AbortHandle, AbortRegistration, Abortable};
use image::RgbaImage;
use log::{debug, info, warn};
use std::sync::Arc;

use crate::config::{Layout, ViewerConfig};
use crate::enums::{Interpolation, Orientation};
use crate::interpolator::Interpolator;
use crate::slice::{SlicePlane, clamp_slice_index, extract_slice};
use crate::volume::VolumeBuffer;
use crate::volume_loader::{VolumeLoaderError, VolumeSource};
use crate::window_level::{Preset, WindowLevel, map_plane};

#[derive(Clone, Debug, PartialEq)]
pub enum ControllerState {
    Empty,
    Loading,
    Ready,
    Error { message: String },
}

/// Identifies one volume request. Completions carrying an outdated ticket
/// are discarded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    series_id: String,
}

impl LoadTicket {
    pub fn series_id(&self) -> &str {
        &self.series_id
    }
}

/// A requested load whose fetch has not run yet.
pub struct PendingLoad {
    pub ticket: LoadTicket,
    registration: AbortRegistration,
}

impl PendingLoad {
    /// Fetch and validate the volume. Resolves to
    /// [`VolumeLoaderError::Cancelled`] if the load is cancelled or
    /// superseded first.
    pub async fn fetch<S: VolumeSource>(
        self,
        source: &S,
    ) -> (LoadTicket, Result<VolumeBuffer, VolumeLoaderError>) {
        let PendingLoad {
            ticket,
            registration,
        } = self;
        let result = match Abortable::new(source.fetch(&ticket.series_id), registration).await {
            Ok(response) => response.and_then(|response| response.into_volume()),
            Err(_aborted) => Err(VolumeLoaderError::Cancelled),
        };
        (ticket, result)
    }
}

/// Pixels for one orientation, ready to paint.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedSlice {
    pub orientation: Orientation,
    pub slice_index: usize,
    pub max_slice: usize,
    pub image: RgbaImage,
}

impl RenderedSlice {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Raw RGBA bytes, row-major.
    pub fn rgba(&self) -> &[u8] {
        self.image.as_raw()
    }
}

#[derive(Clone, Debug, Default)]
struct ViewState {
    slice_index: usize,
    plane: Option<SlicePlane>,
    frame: Option<RenderedSlice>,
}

pub struct SliceController {
    state: ControllerState,
    generation: u64,
    series_id: Option<String>,
    in_flight: Option<AbortHandle>,
    volume: Option<Arc<VolumeBuffer>>,
    views: [ViewState; 3],
    restore: [Option<usize>; 3],
    window_level: WindowLevel,
    layout: Layout,
    interpolation: Interpolation,
    extractions: u64,
}

impl Default for SliceController {
    fn default() -> Self {
        Self::new(&ViewerConfig::default())
    }
}

impl SliceController {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            state: ControllerState::Empty,
            generation: 0,
            series_id: None,
            in_flight: None,
            volume: None,
            views: Default::default(),
            restore: [None; 3],
            window_level: config.window_level,
            layout: config.layout,
            interpolation: config.interpolation,
            extractions: 0,
        }
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    /// Series of the volume on display.
    pub fn series_id(&self) -> Option<&str> {
        self.series_id.as_deref()
    }

    pub fn volume(&self) -> Option<&Arc<VolumeBuffer>> {
        self.volume.as_ref()
    }

    pub fn window_level(&self) -> WindowLevel {
        self.window_level
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Number of planes cut from the volume so far.
    pub fn extraction_count(&self) -> u64 {
        self.extractions
    }

    /// Start loading `series_id`, superseding any load in flight.
    ///
    /// The current volume stays displayed until the new one is accepted,
    /// and remains after a failed load.
    pub fn begin_load(&mut self, series_id: &str) -> PendingLoad {
        self.abort_in_flight();
        self.generation += 1;
        self.state = ControllerState::Loading;

        let (handle, registration) = AbortHandle::new_pair();
        self.in_flight = Some(handle);
        debug!("loading series {series_id} (generation {})", self.generation);

        PendingLoad {
            ticket: LoadTicket {
                generation: self.generation,
                series_id: series_id.to_owned(),
            },
            registration,
        }
    }

    /// Apply the outcome of a fetch. Returns `false` if the ticket is
    /// stale and the result was discarded.
    pub fn complete_load<V: Into<Arc<VolumeBuffer>>>(
        &mut self,
        ticket: &LoadTicket,
        result: Result<V, VolumeLoaderError>,
    ) -> bool {
        if self.is_stale(ticket) {
            debug!(
                "discarding stale volume response for series {} (generation {}, current {})",
                ticket.series_id, ticket.generation, self.generation
            );
            return false;
        }
        match result {
            Ok(volume) => self.accept(ticket, volume.into()),
            Err(err) => self.fail(ticket, &err),
        }
        true
    }

    /// Fetch `series_id` from `source` and apply the result.
    pub async fn load_series<S: VolumeSource>(
        &mut self,
        source: &S,
        series_id: &str,
    ) -> Result<(), VolumeLoaderError> {
        let pending = self.begin_load(series_id);
        let (ticket, result) = pending.fetch(source).await;
        match result {
            Ok(volume) => {
                self.complete_load(&ticket, Ok::<_, VolumeLoaderError>(volume));
                Ok(())
            }
            Err(err) => {
                if !self.is_stale(&ticket) {
                    self.fail(&ticket, &err);
                }
                Err(err)
            }
        }
    }

    /// Install an already loaded volume, as if fetched for `series_id`.
    pub fn set_volume(&mut self, series_id: &str, volume: impl Into<Arc<VolumeBuffer>>) {
        let pending = self.begin_load(series_id);
        self.complete_load(&pending.ticket, Ok::<_, VolumeLoaderError>(volume));
    }

    /// Abandon the load in flight, if any. The controller returns to
    /// `Ready` when a volume is still held, `Empty` otherwise.
    pub fn cancel_load(&mut self) {
        if self.state != ControllerState::Loading {
            return;
        }
        self.abort_in_flight();
        self.generation += 1;
        self.state = if self.volume.is_some() {
            ControllerState::Ready
        } else {
            ControllerState::Empty
        };
    }

    /// Slice indices to use instead of the mid-volume default the next
    /// time a volume becomes ready.
    pub fn restore_slices(&mut self, slices: &[(Orientation, usize)]) {
        for &(orientation, index) in slices {
            self.restore[orientation.index()] = Some(index);
        }
    }

    pub fn slice_index(&self, orientation: Orientation) -> Option<usize> {
        self.volume
            .as_ref()
            .map(|_| self.views[orientation.index()].slice_index)
    }

    pub fn max_slice(&self, orientation: Orientation) -> Option<usize> {
        self.volume
            .as_deref()
            .map(|volume| volume.max_slice(orientation))
    }

    /// Move to slice `index`, clamped into range. Returns the index in
    /// effect, or `None` without a volume.
    pub fn set_slice(&mut self, orientation: Orientation, index: i64) -> Option<usize> {
        let volume = self.volume.as_deref()?;
        let clamped = clamp_slice_index(volume, orientation, index);
        let view = &mut self.views[orientation.index()];
        if view.slice_index != clamped || view.plane.is_none() {
            view.slice_index = clamped;
            if self.layout.shows(orientation) {
                self.render(orientation, true);
            } else {
                view.plane = None;
                view.frame = None;
            }
        }
        Some(clamped)
    }

    /// Step the slice by `delta`, clamped.
    pub fn scroll(&mut self, orientation: Orientation, delta: i64) -> Option<usize> {
        let current = self.slice_index(orientation)? as i64;
        self.set_slice(orientation, current.saturating_add(delta))
    }

    /// Change contrast. Visible frames are re-mapped from their cached
    /// planes without touching the volume.
    pub fn set_window_level(&mut self, window_level: WindowLevel) {
        if self.window_level == window_level {
            return;
        }
        self.window_level = window_level;
        for &orientation in self.layout.orientations() {
            self.render(orientation, false);
        }
    }

    pub fn apply_preset(&mut self, preset: Preset) {
        self.set_window_level(preset.window_level());
    }

    /// Switch layout, extracting planes for newly visible orientations.
    pub fn set_layout(&mut self, layout: Layout) {
        let previous = self.layout;
        self.layout = layout;
        for &orientation in layout.orientations() {
            if !previous.shows(orientation) {
                self.render(orientation, true);
            }
        }
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        if self.interpolation == interpolation {
            return;
        }
        self.interpolation = interpolation;
        for &orientation in self.layout.orientations() {
            self.render(orientation, true);
        }
    }

    /// Latest frame of a visible orientation.
    pub fn frame(&self, orientation: Orientation) -> Option<&RenderedSlice> {
        if !self.layout.shows(orientation) {
            return None;
        }
        self.views[orientation.index()].frame.as_ref()
    }

    /// Plane behind the latest frame, after display resampling.
    pub fn plane(&self, orientation: Orientation) -> Option<&SlicePlane> {
        self.views[orientation.index()].plane.as_ref()
    }

    /// Millimeters per displayed pixel as (column, row), `None` when the
    /// volume carried no spacing.
    pub fn measurement_spacing(&self, orientation: Orientation) -> Option<(f32, f32)> {
        let volume = self.volume.as_deref()?;
        let spacing = volume.known_spacing()?;
        let (column_spacing, row_spacing) = spacing.in_plane(orientation);

        let view = &self.views[orientation.index()];
        match (&view.plane, Self::source_plane_dim(volume, orientation)) {
            (Some(plane), (width, height)) => Some((
                column_spacing * width as f32 / plane.width() as f32,
                row_spacing * height as f32 / plane.height() as f32,
            )),
            (None, _) => Some((column_spacing, row_spacing)),
        }
    }

    fn source_plane_dim(volume: &VolumeBuffer, orientation: Orientation) -> (usize, usize) {
        let (width, height, depth) = volume.dimensions();
        match orientation {
            Orientation::Axial => (width, height),
            Orientation::Sagittal => (height, depth),
            Orientation::Coronal => (width, depth),
        }
    }

    fn is_stale(&self, ticket: &LoadTicket) -> bool {
        ticket.generation != self.generation || self.state != ControllerState::Loading
    }

    fn accept(&mut self, ticket: &LoadTicket, volume: Arc<VolumeBuffer>) {
        self.in_flight = None;
        self.series_id = Some(ticket.series_id.clone());
        let (width, height, depth) = volume.dimensions();
        info!(
            "series {} ready: {width}x{height}x{depth}, spacing {:?}",
            ticket.series_id,
            volume.known_spacing()
        );
        self.enter_ready(volume);
    }

    fn fail(&mut self, ticket: &LoadTicket, err: &VolumeLoaderError) {
        self.in_flight = None;
        warn!("failed to load series {}: {err}", ticket.series_id);
        self.state = ControllerState::Error {
            message: err.to_string(),
        };
    }

    fn enter_ready(&mut self, volume: Arc<VolumeBuffer>) {
        for orientation in Orientation::ALL {
            let default = volume.max_slice(orientation) / 2;
            let index = self.restore[orientation.index()]
                .take()
                .map_or(default, |index| index.min(volume.max_slice(orientation)));
            self.views[orientation.index()] = ViewState {
                slice_index: index,
                ..Default::default()
            };
        }
        self.volume = Some(volume);
        self.state = ControllerState::Ready;
        for &orientation in self.layout.orientations() {
            self.render(orientation, true);
        }
    }

    fn render(&mut self, orientation: Orientation, re_extract: bool) {
        let Some(volume) = self.volume.clone() else {
            return;
        };
        let view = &mut self.views[orientation.index()];

        if re_extract || view.plane.is_none() {
            let plane = extract_slice(Some(volume.as_ref()), orientation, view.slice_index);
            let Some(plane) = plane else {
                return;
            };
            self.extractions += 1;
            let plane = match (self.interpolation, orientation) {
                (Interpolation::Bilinear, Orientation::Sagittal | Orientation::Coronal) => {
                    match Interpolator::isotropic_plane_dimensions(
                        volume.spacing(),
                        orientation,
                        (plane.width(), plane.height()),
                    ) {
                        Some((width, height)) => {
                            Interpolator::resample_plane(&plane, width, height)
                        }
                        None => plane,
                    }
                }
                _ => plane,
            };
            view.plane = Some(plane);
        }

        if let Some(plane) = &view.plane {
            view.frame = Some(RenderedSlice {
                orientation,
                slice_index: view.slice_index,
                max_slice: volume.max_slice(orientation),
                image: map_plane(plane, self.window_level),
            });
        }
    }

    fn abort_in_flight(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }
}

impl Drop for SliceController {
    fn drop(&mut self) {
        self.abort_in_flight();
    }
}
