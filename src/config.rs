use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::enums::{Interpolation, Orientation};
use crate::window_level::WindowLevel;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Window width must be positive, got {0}")]
    InvalidWindowWidth(f32),
}

/// Which orientations a viewport shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "orientation")]
pub enum Layout {
    Single(Orientation),
    MultiPlanar,
}

impl Layout {
    pub fn orientations(&self) -> &'static [Orientation] {
        match self {
            Layout::Single(Orientation::Axial) => &[Orientation::Axial],
            Layout::Single(Orientation::Sagittal) => &[Orientation::Sagittal],
            Layout::Single(Orientation::Coronal) => &[Orientation::Coronal],
            Layout::MultiPlanar => &Orientation::ALL,
        }
    }

    pub fn shows(&self, orientation: Orientation) -> bool {
        self.orientations().contains(&orientation)
    }
}

impl Default for Layout {
    fn default() -> Self {
        Layout::Single(Orientation::Axial)
    }
}

/// Viewport settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window_level: WindowLevel,
    pub layout: Layout,
    pub interpolation: Interpolation,
    pub volume_dir: PathBuf,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            window_level: WindowLevel::default(),
            layout: Layout::default(),
            interpolation: Interpolation::None,
            volume_dir: PathBuf::from("volumes"),
        }
    }
}

impl ViewerConfig {
    pub fn from_json(bytes: &[u8]) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read(path.as_ref())?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let width = self.window_level.width;
        if !(width > 0.0 && width.is_finite()) {
            return Err(ConfigError::InvalidWindowWidth(width));
        }
        Ok(())
    }
}
