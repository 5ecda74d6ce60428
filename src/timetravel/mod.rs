//! Temporal file access through the hidden per-snapshot view tree.
//!
//! ZFS exposes every snapshot of a mounted dataset read-only at
//! `<mountpoint>/.zfs/snapshot/<label>/`. [`TimeTravelBrowser`] lists
//! entries inside that view and [`FileRestorer`] copies single files from
//! it back into the live tree. Both resolve paths through
//! [`crate::contain`] so neither boundary can be escaped.

mod browse;
mod restore;

pub use browse::{BrowseResult, SnapshotEntry, TimeTravelBrowser};
pub use restore::{FileRestorer, RestoreOutcome};

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::validate::ensure_snapshot;
use crate::zfs::ZfsEngine;

/// Directory name under which ZFS exposes the snapshot namespace.
pub const SNAPSHOT_MARKER: &str = ".zfs";

/// Subdirectory of the marker that holds per-snapshot views.
const SNAPSHOT_VIEW_DIR: &str = "snapshot";

/// A resolved snapshot view: the live mountpoint plus the read-only root
/// of one snapshot's historical tree. Computed per request, never stored.
#[derive(Debug, Clone)]
pub(crate) struct SnapshotView {
    pub dataset: String,
    pub mountpoint: PathBuf,
    pub view_root: PathBuf,
}

/// Splits `dataset@label`, resolves the dataset's mountpoint, and computes
/// the snapshot view root. Fails validation for malformed ids and for
/// datasets without a usable mountpoint (`-`, `none`, `legacy`).
pub(crate) async fn resolve_view<E: ZfsEngine>(engine: &E, snapshot: &str) -> Result<SnapshotView> {
    ensure_snapshot(snapshot)?;
    let (dataset, label) = snapshot
        .split_once('@')
        .ok_or_else(|| Error::Validation(format!("invalid snapshot '{}'", snapshot)))?;

    let mountpoint = engine.get_property(dataset, "mountpoint").await?;
    if matches!(mountpoint.as_str(), "" | "-" | "none" | "legacy") {
        return Err(Error::Validation(format!(
            "dataset '{}' has no usable mountpoint ('{}')",
            dataset, mountpoint
        )));
    }

    let mountpoint = PathBuf::from(mountpoint);
    let view_root = mountpoint
        .join(SNAPSHOT_MARKER)
        .join(SNAPSHOT_VIEW_DIR)
        .join(label);

    Ok(SnapshotView {
        dataset: dataset.to_string(),
        mountpoint,
        view_root,
    })
}
