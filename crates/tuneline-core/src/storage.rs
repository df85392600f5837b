//! Object locations and a local object store.
//!
//! `gs://bucket/key` URIs resolve under a configured mirror root, so the same
//! configuration works against a synced bucket directory or a scratch folder.

use crate::error::{PipelineError, PipelineResult};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// A parsed storage location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectUri {
    Gcs { bucket: String, key: String },
    Local(PathBuf),
}

impl ObjectUri {
    pub fn parse(uri: &str) -> PipelineResult<Self> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(PipelineError::Storage("empty storage URI".to_string()));
        }

        if let Some(rest) = uri.strip_prefix("gs://") {
            let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
            if bucket.is_empty() {
                return Err(PipelineError::Storage(format!("missing bucket in {uri}")));
            }
            return Ok(Self::Gcs {
                bucket: bucket.to_string(),
                key: key.trim_matches('/').to_string(),
            });
        }

        if let Some(path) = uri.strip_prefix("file://") {
            if !path.starts_with('/') {
                return Err(PipelineError::Storage(format!("file URI must be absolute: {uri}")));
            }
            return Ok(Self::Local(PathBuf::from(path)));
        }

        if uri.contains("://") {
            return Err(PipelineError::Storage(format!("unsupported URI scheme: {uri}")));
        }
        Ok(Self::Local(PathBuf::from(uri)))
    }

    /// Append a `/`-separated relative path.
    #[must_use]
    pub fn join(&self, relative: &str) -> Self {
        let relative = relative.trim_matches('/');
        match self {
            Self::Gcs { bucket, key } if key.is_empty() => {
                Self::Gcs { bucket: bucket.clone(), key: relative.to_string() }
            }
            Self::Gcs { bucket, key } => {
                Self::Gcs { bucket: bucket.clone(), key: format!("{key}/{relative}") }
            }
            Self::Local(path) => Self::Local(path.join(relative)),
        }
    }
}

impl std::fmt::Display for ObjectUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gcs { bucket, key } => write!(f, "gs://{bucket}/{key}"),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Byte-level access to stage inputs and outputs.
pub trait ObjectStore: Send + Sync {
    fn read(&self, uri: &ObjectUri) -> PipelineResult<Vec<u8>>;

    fn write(&self, uri: &ObjectUri, bytes: &[u8]) -> PipelineResult<()>;

    /// Copy `local` to `dest`, or every file under a directory, keeping relative paths.
    /// Returns the number of files copied.
    fn upload(&self, local: &Path, dest: &ObjectUri) -> PipelineResult<usize> {
        if local.is_file() {
            let name = local
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    PipelineError::Storage(format!("no file name: {}", local.display()))
                })?;
            self.write(&dest.join(&name), &std::fs::read(local)?)?;
            return Ok(1);
        }

        let mut copied = 0;
        for (relative, path) in walk_files(local)? {
            self.write(&dest.join(&relative), &std::fs::read(&path)?)?;
            copied += 1;
        }
        debug!(source = %local.display(), dest = %dest, files = copied, "mirrored directory");
        Ok(copied)
    }
}

/// Filesystem-backed store.
#[derive(Debug, Clone, Default)]
pub struct LocalObjectStore {
    mirror_root: Option<PathBuf>,
}

impl LocalObjectStore {
    #[must_use]
    pub fn new(mirror_root: Option<PathBuf>) -> Self {
        Self { mirror_root }
    }

    /// Local path backing `uri`.
    pub fn resolve(&self, uri: &ObjectUri) -> PipelineResult<PathBuf> {
        match uri {
            ObjectUri::Local(path) => Ok(path.clone()),
            ObjectUri::Gcs { bucket, key } => {
                let root = self.mirror_root.as_ref().ok_or_else(|| {
                    PipelineError::Storage(format!(
                        "{uri} needs storage.mirror_root to resolve gs:// locations"
                    ))
                })?;
                let mut path = root.join(bucket);
                for part in key.split('/').filter(|p| !p.is_empty()) {
                    if part == ".." {
                        return Err(PipelineError::Storage(format!("path escapes bucket: {uri}")));
                    }
                    path.push(part);
                }
                Ok(path)
            }
        }
    }
}

impl ObjectStore for LocalObjectStore {
    fn read(&self, uri: &ObjectUri) -> PipelineResult<Vec<u8>> {
        let path = self.resolve(uri)?;
        std::fs::read(&path)
            .map_err(|e| PipelineError::Storage(format!("failed to read {uri}: {e}")))
    }

    fn write(&self, uri: &ObjectUri, bytes: &[u8]) -> PipelineResult<()> {
        let path = self.resolve(uri)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)
            .map_err(|e| PipelineError::Storage(format!("failed to write {uri}: {e}")))
    }
}

/// Files under `root` as (`a/b.json`, full path), sorted.
fn walk_files(root: &Path) -> PipelineResult<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            PipelineError::Storage(format!("failed to walk {}: {e}", root.display()))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push((rel, entry.into_path()));
        }
    }
    files.sort();
    Ok(files)
}
