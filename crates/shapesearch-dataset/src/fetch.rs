//! Remote dataset retrieval with local disk caching.

use std::fs;
use std::path::PathBuf;

use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::{
    DataError, DatasetLoader, POSTINGS_FILE_NAME, Result, SHAPE_FILE_NAME, ShapeDataset,
    default_cache_dir, parse_shape_records, read_dataset_dir, write_dataset_dir,
};

/// Loader that fetches the two dataset files from a remote store.
///
/// Downloaded snapshots are cached under `cache_dir/<version or "current">`
/// and served from there on subsequent loads unless `force_refresh` is set.
#[derive(Debug, Clone)]
pub struct HttpDatasetLoader {
    base_url: String,
    cache_dir: PathBuf,
    cache_local: bool,
}

impl HttpDatasetLoader {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            cache_dir: default_cache_dir(),
            cache_local: true,
        }
    }

    /// Override the on-disk cache root.
    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Disable writing fetched snapshots to the local cache.
    #[must_use]
    pub fn without_local_cache(mut self) -> Self {
        self.cache_local = false;
        self
    }

    fn version_url(&self, version: Option<&str>) -> String {
        let base = self.base_url.trim_end_matches('/');
        match version {
            Some(v) => format!("{base}/v/{v}/"),
            None => format!("{base}/"),
        }
    }

    fn version_cache_dir(&self, version: Option<&str>) -> PathBuf {
        self.cache_dir.join(version.unwrap_or("current"))
    }
}

impl DatasetLoader for HttpDatasetLoader {
    #[instrument(name = "Load dataset over HTTP", skip_all, level = "info")]
    fn load_dataset(&self, version: Option<&str>, force_refresh: bool) -> Result<ShapeDataset> {
        let local = self.version_cache_dir(version);
        if local.join(SHAPE_FILE_NAME).exists() && !force_refresh {
            info!(dir = %local.display(), "Serving dataset from local cache");
            return read_dataset_dir(&local);
        }

        let base = self.version_url(version);
        let (shape_file, postings_file) = download_dataset_files(&base)?;

        let shapes = {
            let raw = fs::read_to_string(shape_file.path())?;
            parse_shape_records(serde_json::from_str(&raw)?)
        };
        if shapes.is_empty() {
            return Err(DataError::EmptyDataset);
        }
        let postings = match postings_file {
            Some(file) => {
                let raw = fs::read_to_string(file.path())?;
                Some(serde_json::from_str(&raw)?)
            }
            None => None,
        };

        let dataset = ShapeDataset { shapes, postings };
        if self.cache_local {
            write_dataset_dir(&local, &dataset)?;
        }
        Ok(dataset)
    }
}

/// The shape file is required; posting lists are a dataset option, so a
/// failed postings download degrades to computing grams locally.
#[instrument(name = "Download dataset files", skip_all, level = "info")]
fn download_dataset_files(base_url: &str) -> Result<(NamedTempFile, Option<NamedTempFile>)> {
    let rt = tokio::runtime::Runtime::new()?;

    rt.block_on(async {
        let client = Client::new();

        let shape_url = format!("{base_url}{SHAPE_FILE_NAME}");
        let postings_url = format!("{base_url}{POSTINGS_FILE_NAME}");
        let (shape_file, postings_file) = tokio::join!(
            download_to_temp_file(&client, &shape_url),
            download_to_temp_file(&client, &postings_url),
        );

        let postings_file = match postings_file {
            Ok(file) => Some(file),
            Err(e) => {
                warn!(error = %e, "Postings download failed, grams will be computed locally");
                None
            }
        };
        Ok((shape_file?, postings_file))
    })
}

async fn download_to_temp_file(client: &Client, url: &str) -> Result<NamedTempFile> {
    info!(url, "Starting download");
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        let file = url.split('/').next_back().unwrap_or(url).to_string();
        let reason = format!("status {}", response.status());
        return Err(DataError::FetchRejected { file, reason });
    }

    let total_size = response.content_length().unwrap_or(0);

    let pb = ProgressBar::new(total_size);
    pb.set_style(ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})").expect("Progress bar template")
        .progress_chars("█░"));
    pb.set_message(format!(
        "Downloading {}",
        url.split('/').next_back().unwrap_or(url)
    ));

    let temp_file = NamedTempFile::new()?;
    let mut dest_file = tokio::fs::File::create(temp_file.path()).await?;

    let mut stream = response.bytes_stream();
    while let Some(item) = stream.next().await {
        let chunk = item?;
        dest_file.write_all(&chunk).await?;
        pb.inc(chunk.len() as u64);
    }
    dest_file.flush().await?;
    pb.finish_and_clear();
    Ok(temp_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_paths_are_built_correctly() {
        let loader = HttpDatasetLoader::new("https://store.example.com/geo/");
        assert_eq!(
            loader.version_url(None),
            "https://store.example.com/geo/"
        );
        assert_eq!(
            loader.version_url(Some("2024-06-01")),
            "https://store.example.com/geo/v/2024-06-01/"
        );
    }

    #[test]
    fn cache_dir_is_keyed_by_version() {
        let loader = HttpDatasetLoader::new("https://store.example.com").with_cache_dir("/tmp/sd");
        assert_eq!(
            loader.version_cache_dir(None),
            PathBuf::from("/tmp/sd/current")
        );
        assert_eq!(
            loader.version_cache_dir(Some("42")),
            PathBuf::from("/tmp/sd/42")
        );
    }

    #[test]
    fn cached_snapshot_is_served_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = crate::test_data::small_dataset();
        write_dataset_dir(&dir.path().join("current"), &dataset).unwrap();

        // Unroutable base URL: any network attempt would fail.
        let loader =
            HttpDatasetLoader::new("http://invalid.localdomain").with_cache_dir(dir.path());
        let loaded = loader.load_dataset(None, false).unwrap();
        assert_eq!(loaded.shapes.len(), dataset.shapes.len());
    }
}
