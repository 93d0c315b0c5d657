//! Stage-owned artifact directories and the typed handles passed between stages.
//!
//! Each stage writes only under `<artifacts_root>/<stage dir>`. Writes go to a temporary
//! sibling and are renamed into place, so readers (the prediction path in particular)
//! never observe a partially written file.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::Stage;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stage_dir(&self, stage: Stage) -> PathBuf {
        self.root.join(stage.dir_name())
    }

    pub fn ensure_stage_dir(&self, stage: Stage) -> Result<PathBuf> {
        let dir = self.stage_dir(stage);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Atomically write `bytes` to `path` and return a reference carrying its digest.
    pub fn write_bytes(&self, stage: Stage, path: &Path, bytes: &[u8]) -> Result<ArtifactRef> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = tmp_path(path);
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, path)?;

        let artifact = ArtifactRef {
            stage,
            path: path.to_path_buf(),
            sha256: sha256_hex(bytes),
        };
        debug!("Wrote artifact {} ({} bytes, sha256:{})", path.display(), bytes.len(), artifact.sha256);
        Ok(artifact)
    }

    pub fn write_json<T: Serialize>(&self, stage: Stage, path: &Path, value: &T) -> Result<ArtifactRef> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(stage, path, &bytes)
    }

    /// Finalize a file the stage produced through another writer (e.g. the CSV writer).
    pub fn register(&self, stage: Stage, path: &Path) -> Result<ArtifactRef> {
        let bytes = fs::read(path)?;
        Ok(ArtifactRef {
            stage,
            path: path.to_path_buf(),
            sha256: sha256_hex(&bytes),
        })
    }

    /// Rebuild a reference to an artifact produced by an earlier run.
    pub fn locate(&self, stage: Stage, path: &Path) -> Result<ArtifactRef> {
        if !path.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} artifact not found at {}", stage.dir_name(), path.display()),
            )
            .into());
        }
        self.register(stage, path)
    }

    pub fn locate_dataset(&self, path: &Path) -> Result<DatasetHandle> {
        self.locate(Stage::Ingestion, path).map(DatasetHandle)
    }

    pub fn locate_split(&self, train: &Path, test: &Path) -> Result<SplitHandle> {
        Ok(SplitHandle {
            train: self.locate(Stage::Transformation, train)?,
            test: self.locate(Stage::Transformation, test)?,
        })
    }

    pub fn locate_model(&self, path: &Path) -> Result<ModelHandle> {
        self.locate(Stage::Training, path).map(ModelHandle)
    }
}

/// A persisted stage output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub stage: Stage,
    pub path: PathBuf,
    pub sha256: String,
}

/// Cleaned dataset produced by ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetHandle(pub ArtifactRef);

/// Validation status report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReportHandle(pub ArtifactRef);

/// Train/test CSV pair produced by transformation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitHandle {
    pub train: ArtifactRef,
    pub test: ArtifactRef,
}

/// Serialized regressor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle(pub ArtifactRef);

/// Evaluation scores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsHandle(pub ArtifactRef);

macro_rules! impl_path {
    ($($handle:ty),*) => {
        $(impl $handle {
            pub fn path(&self) -> &Path {
                &self.0.path
            }
        })*
    };
}

impl_path!(DatasetHandle, StatusReportHandle, ModelHandle, MetricsHandle);

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
