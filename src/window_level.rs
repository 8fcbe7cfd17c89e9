use image::{ImageBuffer, Rgba, RgbaImage};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::slice::SlicePlane;

/// Window width used in place of zero, negative or non-finite widths.
pub const MIN_WINDOW_WIDTH: f32 = 1.0;

/// Linear contrast window over raw intensities.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowLevel {
    pub center: f32,
    pub width: f32,
}

impl WindowLevel {
    pub fn new(center: f32, width: f32) -> Self {
        Self { center, width }
    }

    /// Width actually used for mapping.
    pub fn effective_width(&self) -> f32 {
        if self.width > 0.0 && self.width.is_finite() {
            self.width
        } else {
            MIN_WINDOW_WIDTH
        }
    }

    /// Lowest intensity that maps above black.
    pub fn lower_bound(&self) -> f32 {
        self.center - self.effective_width() / 2.0
    }

    pub fn upper_bound(&self) -> f32 {
        self.center + self.effective_width() / 2.0
    }
}

impl Default for WindowLevel {
    fn default() -> Self {
        Self::new(40.0, 400.0)
    }
}

impl From<Preset> for WindowLevel {
    fn from(preset: Preset) -> Self {
        preset.window_level()
    }
}

/// Named window/level settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Brain,
    Bone,
    Lung,
    SoftTissue,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::Brain, Preset::Bone, Preset::Lung, Preset::SoftTissue];

    pub const fn window_level(self) -> WindowLevel {
        let (center, width) = match self {
            Preset::Brain => (40.0, 80.0),
            Preset::Bone => (400.0, 2000.0),
            Preset::Lung => (-600.0, 1500.0),
            Preset::SoftTissue => (50.0, 350.0),
        };
        WindowLevel { center, width }
    }

    pub fn name(self) -> &'static str {
        match self {
            Preset::Brain => "Brain",
            Preset::Bone => "Bone",
            Preset::Lung => "Lung",
            Preset::SoftTissue => "Soft Tissue",
        }
    }

    /// The preset whose values equal `window_level`, if any.
    pub fn matching(window_level: WindowLevel) -> Option<Preset> {
        Self::ALL
            .into_iter()
            .find(|preset| preset.window_level() == window_level)
    }
}

/// Map one intensity to display brightness.
///
/// Values at or below `center - width / 2` are black, values at or above
/// `center + width / 2` are white, rounded half away from zero in between.
/// NaN maps to black.
#[inline]
pub fn map_value(value: f32, window_level: WindowLevel) -> u8 {
    if value.is_nan() {
        return 0;
    }
    let width = window_level.effective_width();
    let normalized = (value - (window_level.center - width / 2.0)) / width;
    (normalized * 255.0).clamp(0.0, 255.0).round() as u8
}

/// Render a plane as opaque grayscale RGBA.
pub fn map_plane(plane: &SlicePlane, window_level: WindowLevel) -> RgbaImage {
    if window_level.effective_width() != window_level.width {
        debug!(
            "window width {} is degenerate, using {MIN_WINDOW_WIDTH}",
            window_level.width
        );
    }
    let pixel_data: Vec<u8> = plane
        .data()
        .par_iter()
        .flat_map_iter(|&v| {
            let c = map_value(v, window_level);
            [c, c, c, u8::MAX]
        })
        .collect();

    let (width, height) = (plane.width() as u32, plane.height() as u32);
    // the buffer holds exactly width * height pixels
    ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(width, height, pixel_data)
        .unwrap_or_else(|| RgbaImage::new(width, height))
}
