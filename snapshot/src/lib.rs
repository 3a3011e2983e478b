//! JSON snapshot of one run's collected content.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::path::{Path, PathBuf};
use subdigest_core::{CollectionResult, SnapshotError};
use tracing::{debug, info};


const INDENT: &[u8] = b"    ";

/// Writes the collection to a fixed path, replacing the previous run's file.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    path: PathBuf,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn write(&self, result: &CollectionResult) -> Result<PathBuf, SnapshotError> {
        let bytes = to_pretty_json(result)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| io_error(parent, source))?;
        }

        // Write next to the target, then swap it in.
        let staging = staging_path(&self.path);
        tokio::fs::write(&staging, &bytes)
            .await
            .map_err(|source| io_error(&staging, source))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|source| io_error(&self.path, source))?;

        info!(
            path = %self.path.display(),
            bytes = bytes.len(),
            discussions = result.discussions.len(),
            "Snapshot written"
        );
        Ok(self.path.clone())
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<CollectionResult, SnapshotError> {
        let path = path.as_ref();
        let raw = tokio::fs::read(path)
            .await
            .map_err(|source| io_error(path, source))?;
        debug!(path = %path.display(), bytes = raw.len(), "Snapshot read");
        Ok(serde_json::from_slice(&raw)?)
    }
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<Vec<u8>, SnapshotError> {
    let mut out = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(INDENT));
    value.serialize(&mut serializer)?;
    out.push(b'\n');
    Ok(out)
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn io_error(path: &Path, source: std::io::Error) -> SnapshotError {
    SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    }
}
