//! Dataset model and loaders for the shapesearch engine.
//!
//! The engine core treats data loading as a replaceable collaborator: anything
//! implementing [`DatasetLoader`] can hand it a [`ShapeDataset`] snapshot.
//! This crate ships the wire-format model plus three loaders:
//!
//! - [`HttpDatasetLoader`] fetches the dataset files from a remote store and
//!   caches them on disk (behind the `download_data` feature).
//! - [`DirDatasetLoader`] reads the dataset files from a local directory.
//! - [`MemoryDatasetLoader`] wraps an already-built in-memory snapshot,
//!   used by tests and by callers that assemble their own data.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, instrument};

pub mod model;
pub mod test_data;

#[cfg(feature = "download_data")]
mod fetch;

#[cfg(feature = "download_data")]
pub use fetch::HttpDatasetLoader;
pub use model::{
    BoundingBox, GeoType, POSTINGS_FILE_NAME, ReferenceMetadata, SHAPE_FILE_NAME, ShapeDataset,
    ShapeRecord, parse_shape_records,
};

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum DataError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[cfg(feature = "download_data")]
        #[error("HTTP error: {0}")]
        Http(#[from] reqwest::Error),
        #[error("Serialization error: {0}")]
        Serde(#[from] serde_json::Error),
        #[error("Shape record file not found at {0}")]
        ShapeFileNotFound(std::path::PathBuf),
        #[error("Dataset contained no usable shape records")]
        EmptyDataset,
        #[error("Unable to fetch `{file}`: {reason}")]
        FetchRejected { file: String, reason: String },
    }

    pub type Result<T> = std::result::Result<T, DataError>;
}

pub use error::{DataError, Result};

/// Default directory used to cache downloaded dataset files when the
/// `system-dirs` feature is disabled.
pub const CACHE_DIR_DEFAULT: &str = "./shapesearch_data";

/// Resolve the on-disk cache root for dataset files.
///
/// Honors the `SHAPESEARCH_DATA_DIR` environment variable, then the platform
/// cache directory (with the `system-dirs` feature), then
/// [`CACHE_DIR_DEFAULT`].
pub fn default_cache_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SHAPESEARCH_DATA_DIR") {
        return PathBuf::from(dir);
    }
    #[cfg(feature = "system-dirs")]
    if let Some(dirs) = directories::ProjectDirs::from("", "", "shapesearch") {
        return dirs.cache_dir().to_path_buf();
    }
    PathBuf::from(CACHE_DIR_DEFAULT)
}

/// A source of dataset snapshots.
///
/// Implementations own retrieval and caching; the engine core only ever sees
/// the returned snapshot. `version` selects a published dataset version
/// (`None` means current) and `force_refresh` bypasses any local cache.
pub trait DatasetLoader: Send + Sync {
    fn load_dataset(&self, version: Option<&str>, force_refresh: bool) -> Result<ShapeDataset>;
}

/// Loader that reads `shape_records.json` (required) and `ngram_postings.json`
/// (optional) from a local directory. `version` and `force_refresh` are
/// irrelevant for a plain directory and are ignored.
#[derive(Debug, Clone)]
pub struct DirDatasetLoader {
    dir: PathBuf,
}

impl DirDatasetLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DatasetLoader for DirDatasetLoader {
    #[instrument(name = "Load dataset from directory", skip_all, level = "info")]
    fn load_dataset(&self, _version: Option<&str>, _force_refresh: bool) -> Result<ShapeDataset> {
        read_dataset_dir(&self.dir)
    }
}

/// Loader serving a fixed in-memory snapshot.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatasetLoader {
    dataset: ShapeDataset,
}

impl MemoryDatasetLoader {
    pub fn new(dataset: ShapeDataset) -> Self {
        Self { dataset }
    }
}

impl DatasetLoader for MemoryDatasetLoader {
    fn load_dataset(&self, _version: Option<&str>, _force_refresh: bool) -> Result<ShapeDataset> {
        if self.dataset.is_empty() {
            return Err(DataError::EmptyDataset);
        }
        Ok(self.dataset.clone())
    }
}

/// Read a dataset snapshot from `dir`.
///
/// The shape file must exist and parse as JSON; individual malformed records
/// within it are skipped. The postings file is optional.
pub fn read_dataset_dir(dir: &Path) -> Result<ShapeDataset> {
    let shape_path = dir.join(SHAPE_FILE_NAME);
    if !shape_path.exists() {
        return Err(DataError::ShapeFileNotFound(shape_path));
    }

    let raw = fs::read_to_string(&shape_path)?;
    let shapes = parse_shape_records(serde_json::from_str(&raw)?);
    if shapes.is_empty() {
        return Err(DataError::EmptyDataset);
    }

    let postings_path = dir.join(POSTINGS_FILE_NAME);
    let postings = if postings_path.exists() {
        let raw = fs::read_to_string(&postings_path)?;
        Some(serde_json::from_str(&raw)?)
    } else {
        None
    };

    info!(
        shapes = shapes.len(),
        has_postings = postings.is_some(),
        dir = %dir.display(),
        "Dataset read from directory"
    );
    Ok(ShapeDataset { shapes, postings })
}

/// Write a dataset snapshot into `dir`, creating it if necessary. Used both
/// by the download cache and by tooling that re-publishes snapshots.
pub fn write_dataset_dir(dir: &Path, dataset: &ShapeDataset) -> Result<()> {
    fs::create_dir_all(dir)?;
    let shapes: std::collections::HashMap<&str, &ShapeRecord> = dataset
        .shapes
        .iter()
        .map(|s| (s.reference_code.as_str(), s))
        .collect();
    fs::write(
        dir.join(SHAPE_FILE_NAME),
        serde_json::to_vec(&shapes)?,
    )?;
    if let Some(postings) = &dataset.postings {
        fs::write(dir.join(POSTINGS_FILE_NAME), serde_json::to_vec(postings)?)?;
    }
    info!(dir = %dir.display(), "Dataset cached to directory");
    Ok(())
}
