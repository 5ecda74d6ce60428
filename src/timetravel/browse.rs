//! Browsing file and directory entries inside a snapshot view.

use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::contain::{clean_relative, contain};
use crate::error::{Error, Result};
use crate::ignore::should_ignore;
use crate::zfs::ZfsEngine;

use super::resolve_view;

/// One file or directory inside a snapshot view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// File name without path.
    pub name: String,
    /// Path relative to the snapshot root.
    pub path: PathBuf,
    /// True for directories.
    pub is_dir: bool,
    /// Size in bytes.
    pub size: u64,
    /// Modification time, RFC 3339.
    pub mod_time: String,
    /// Rendered permission string, e.g. `-rw-r--r--`.
    pub mode: String,
}

/// Result of browsing a path inside a snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BrowseResult {
    /// The path named a regular file.
    File { entry: SnapshotEntry },
    /// The path named a directory; entries are its direct children.
    Directory { entries: Vec<SnapshotEntry> },
}

/// Resolves snapshot-relative paths to entries in the hidden snapshot view.
pub struct TimeTravelBrowser<E: ZfsEngine> {
    engine: E,
}

impl<E: ZfsEngine> TimeTravelBrowser<E> {
    /// Creates a browser over the given engine.
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Browses `relative_path` (default `/`) inside `snapshot`
    /// (`dataset@label`). Directory listings drop system junk and any name
    /// matching `ignore_patterns`.
    pub async fn browse(
        &self,
        snapshot: &str,
        relative_path: &str,
        ignore_patterns: &[String],
    ) -> Result<BrowseResult> {
        let view = resolve_view(&self.engine, snapshot).await?;
        let relative_path = if relative_path.is_empty() {
            "/"
        } else {
            relative_path
        };

        let resolved = contain(&view.view_root, relative_path)?;
        let clean = clean_relative(&view.view_root, relative_path)?;

        tracing::debug!(
            dataset = %view.dataset,
            path = %resolved.display(),
            "browsing snapshot view"
        );

        let meta = match tokio::fs::metadata(&resolved).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!(
                    "path '{}' not found in snapshot '{}'",
                    clean.display(),
                    snapshot
                )));
            }
            Err(e) => return Err(e.into()),
        };

        if !meta.is_dir() {
            let entry = build_entry(&resolved, &clean, &meta);
            return Ok(BrowseResult::File { entry });
        }

        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&resolved).await?;
        while let Some(child) = dir.next_entry().await? {
            let name = child.file_name().to_string_lossy().into_owned();
            if should_ignore(&name, ignore_patterns) {
                continue;
            }
            // A child that vanished or cannot be stat'd is skipped, not fatal.
            let child_meta = match child.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    tracing::debug!(name = %name, error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            entries.push(build_entry(&child.path(), &clean.join(&name), &child_meta));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(BrowseResult::Directory { entries })
    }
}

/// Projects filesystem metadata into a [`SnapshotEntry`].
fn build_entry(full: &Path, relative: &Path, meta: &std::fs::Metadata) -> SnapshotEntry {
    let name = full
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mod_time = meta
        .modified()
        .map(|t| chrono::DateTime::<chrono::Utc>::from(t).to_rfc3339())
        .unwrap_or_default();

    SnapshotEntry {
        name,
        path: relative.to_path_buf(),
        is_dir: meta.is_dir(),
        size: meta.len(),
        mod_time,
        mode: unix_mode::to_string(meta.mode()),
    }
}
