use crate::atomic_io::{atomic_write, remove_if_exists};
use crate::Result;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const COMPRESSED_SUFFIX: &str = ".gz";

/// Which on-disk form a structured cache write produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredForm {
    Plain,
    Compressed,
}

/// JSON cache file with an optional gzip sibling (`<path>.gz`).
///
/// At most one of the two forms is current at a time: each write removes the other one.
#[derive(Debug, Clone)]
pub struct StructuredCache {
    path: PathBuf,
    compress_threshold: usize,
}

impl StructuredCache {
    pub fn new(path: impl Into<PathBuf>, compress_threshold: usize) -> Self {
        Self {
            path: path.into(),
            compress_threshold,
        }
    }

    pub fn plain_path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn compressed_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(COMPRESSED_SUFFIX);
        PathBuf::from(name)
    }

    pub async fn write<T: Serialize>(&self, value: &T) -> Result<StoredForm> {
        let bytes = serde_json::to_vec(value)?;
        if bytes.len() >= self.compress_threshold {
            let compressed = compress_gzip(&bytes)?;
            atomic_write(&self.compressed_path(), &compressed).await?;
            remove_if_exists(&self.path).await?;
            Ok(StoredForm::Compressed)
        } else {
            atomic_write(&self.path, &bytes).await?;
            remove_if_exists(&self.compressed_path()).await?;
            Ok(StoredForm::Plain)
        }
    }

    /// Read the cached value, trying the plain form first. Any failure reads as a miss.
    pub async fn read<T: DeserializeOwned>(&self) -> Option<T> {
        if let Ok(bytes) = tokio::fs::read(&self.path).await {
            match serde_json::from_slice(&bytes) {
                Ok(value) => return Some(value),
                Err(err) => log::warn!("Cache corrupted {}: {err}", self.path.display()),
            }
        }

        let compressed_path = self.compressed_path();
        let bytes = tokio::fs::read(&compressed_path).await.ok()?;
        let decoded = match decompress_gzip(&bytes) {
            Ok(decoded) => decoded,
            Err(err) => {
                log::warn!("Cache corrupted {}: {err}", compressed_path.display());
                return None;
            }
        };
        match serde_json::from_slice(&decoded) {
            Ok(value) => Some(value),
            Err(err) => {
                log::warn!("Cache corrupted {}: {err}", compressed_path.display());
                None
            }
        }
    }
}

fn compress_gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

fn decompress_gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}
