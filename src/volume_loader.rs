use crate::volume::{Spacing, VolumeBuffer, VolumeError};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("Series {0} not found")]
    NotFound(String),

    #[error("Invalid series identifier {0:?}")]
    InvalidSeriesId(String),

    #[error("Malformed volume: {0}")]
    Malformed(#[from] VolumeError),

    #[error("Volume fetch was cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Volume dimensions as sent by the imaging service. Both a
/// `[width, height, depth]` array and a keyed object are accepted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseDimensions {
    Array([usize; 3]),
    Keyed {
        width: usize,
        height: usize,
        depth: usize,
    },
}

impl ResponseDimensions {
    pub fn as_tuple(&self) -> (usize, usize, usize) {
        match *self {
            ResponseDimensions::Array([width, height, depth]) => (width, height, depth),
            ResponseDimensions::Keyed {
                width,
                height,
                depth,
            } => (width, height, depth),
        }
    }
}

/// Body of a volume fetch.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VolumeResponse {
    pub volume: Vec<f32>,
    pub dimensions: ResponseDimensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spacing: Option<[f32; 3]>,
}

impl VolumeResponse {
    /// Validate the response and build the volume it describes.
    ///
    /// # Errors
    ///
    /// Returns [`VolumeLoaderError::Malformed`] on a length mismatch, a zero
    /// dimension or unusable spacing.
    pub fn into_volume(self) -> Result<VolumeBuffer, VolumeLoaderError> {
        let spacing = self
            .spacing
            .map(|[x, y, z]| Spacing::new(x, y, z))
            .transpose()?;
        Ok(VolumeBuffer::new(
            self.volume,
            self.dimensions.as_tuple(),
            spacing,
        )?)
    }
}

/// Supplier of volumes by series identifier.
#[allow(async_fn_in_trait)]
pub trait VolumeSource {
    async fn fetch(&self, series_id: &str) -> Result<VolumeResponse, VolumeLoaderError>;
}

/// Reads `<dir>/<series_id>.json` volume responses.
#[derive(Clone, Debug)]
pub struct JsonFileSource {
    dir: PathBuf,
}

impl JsonFileSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, series_id: &str) -> Result<PathBuf, VolumeLoaderError> {
        let valid = !series_id.is_empty()
            && series_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
            && series_id != "."
            && series_id != "..";
        if !valid {
            return Err(VolumeLoaderError::InvalidSeriesId(series_id.to_owned()));
        }
        Ok(self.dir.join(format!("{series_id}.json")))
    }
}

impl VolumeSource for JsonFileSource {
    async fn fetch(&self, series_id: &str) -> Result<VolumeResponse, VolumeLoaderError> {
        let path = self.path_for(series_id)?;
        let bytes = tokio::fs::read(&path).await.map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => VolumeLoaderError::NotFound(series_id.to_owned()),
            _ => VolumeLoaderError::Io(err),
        })?;
        VolumeLoader::parse_response(&bytes)
    }
}

pub struct VolumeLoader;

impl VolumeLoader {
    /// Parse a JSON volume response without validating it.
    pub fn parse_response(bytes: &[u8]) -> Result<VolumeResponse, VolumeLoaderError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Load a volume from a JSON response body
    ///
    /// # Errors
    ///
    /// Returns error if the body is not a volume response or is malformed
    pub fn load_from_json(bytes: &[u8]) -> Result<VolumeBuffer, VolumeLoaderError> {
        Self::parse_response(bytes)?.into_volume()
    }

    /// Load a volume from a JSON file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<VolumeBuffer, VolumeLoaderError> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::load_from_json(&bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn accepts_array_dimensions() {
        let body = br#"{"volume":[0,1,2,3,4,5,6,7],"dimensions":[2,2,2],"spacing":[0.5,0.5,2.0]}"#;
        let volume = VolumeLoader::load_from_json(body).unwrap();
        assert_eq!(volume.dimensions(), (2, 2, 2));
        assert_eq!(volume.known_spacing(), Some(Spacing::new(0.5, 0.5, 2.0).unwrap()));
        assert_eq!(volume.voxel(1, 1, 1), Some(7.0));
    }

    #[test]
    fn accepts_keyed_dimensions_without_spacing() {
        let body = br#"{"volume":[1,2,3,4,5,6],"dimensions":{"width":3,"height":2,"depth":1}}"#;
        let volume = VolumeLoader::load_from_json(body).unwrap();
        assert_eq!(volume.dimensions(), (3, 2, 1));
        assert_eq!(volume.known_spacing(), None);
    }

    #[test]
    fn rejects_length_mismatch_before_construction() {
        let body = br#"{"volume":[0,1,2],"dimensions":[2,2,2]}"#;
        assert!(matches!(
            VolumeLoader::load_from_json(body),
            Err(VolumeLoaderError::Malformed(VolumeError::LengthMismatch {
                expected: 8,
                actual: 3
            }))
        ));
    }

    #[test]
    fn rejects_bad_spacing_and_garbage() {
        let body = br#"{"volume":[0],"dimensions":[1,1,1],"spacing":[1,-1,1]}"#;
        assert!(matches!(
            VolumeLoader::load_from_json(body),
            Err(VolumeLoaderError::Malformed(VolumeError::InvalidSpacing(_)))
        ));
        assert!(matches!(
            VolumeLoader::load_from_json(b"not json"),
            Err(VolumeLoaderError::Json(_))
        ));
    }

    #[test]
    fn series_id_cannot_escape_directory() {
        let source = JsonFileSource::new("volumes");
        assert!(source.path_for("1.2.840.113619").is_ok());
        assert!(matches!(
            source.path_for("../secrets"),
            Err(VolumeLoaderError::InvalidSeriesId(_))
        ));
        assert!(source.path_for("").is_err());
    }

    #[tokio::test]
    async fn file_source_reads_series() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("s1.json")).unwrap();
        file.write_all(br#"{"volume":[9],"dimensions":[1,1,1]}"#)
            .unwrap();
        let source = JsonFileSource::new(dir.path());

        let response = source.fetch("s1").await.unwrap();
        assert_eq!(response.volume, vec![9.0]);
        assert!(matches!(
            source.fetch("missing").await,
            Err(VolumeLoaderError::NotFound(id)) if id == "missing"
        ));
    }
}
