//! ZFS engine abstraction.
//!
//! This module defines the [`ZfsEngine`] trait that all lifecycle and
//! time-travel components talk to, plus the row types its list operations
//! return. The engine is an injected collaborator, not a singleton:
//! production code uses [`CliZfs`] (which shells out to the `zfs` binary),
//! while tests substitute [`MemoryZfs`].

mod cli;
pub mod memory;

pub use cli::{CliZfs, DEFAULT_COMMAND_TIMEOUT, DEFAULT_ZFS_PATH};
pub use memory::MemoryZfs;

use async_trait::async_trait;

use crate::error::Result;

/// Sentinel the engine reports for an absent property value (e.g. the
/// `origin` of a dataset that is not a clone).
pub const PROPERTY_NONE: &str = "-";

/// One filesystem-type dataset row from a list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilesystemRow {
    /// Full dataset name, e.g. `tank/sandboxes/t1`.
    pub name: String,
    /// Origin snapshot if the dataset is a clone.
    pub origin: Option<String>,
    /// Space used, as reported (human-readable, e.g. `1.5G`).
    pub used: String,
    /// Mountpoint, as reported (may be `none` or `legacy`).
    pub mountpoint: String,
    /// Creation time, as reported.
    pub creation: String,
}

/// One snapshot row from a list query, ordered by creation ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRow {
    /// Full snapshot name, e.g. `tank/data@daily-2025-02-15`.
    pub name: String,
    /// Space used by the snapshot itself.
    pub used: String,
    /// Referenced size at the time of the snapshot.
    pub refer: String,
    /// Creation time, as reported.
    pub creation: String,
}

/// The copy-on-write primitive operations this engine consumes.
///
/// All calls are synchronous from the caller's point of view - they block on
/// the external operation, bounded by the engine's command timeout. A
/// timeout surfaces as [`crate::Error::Primitive`]; there is no automatic
/// retry.
#[async_trait]
pub trait ZfsEngine: Send + Sync {
    /// Creates the snapshot `dataset@label` (full name supplied).
    async fn create_snapshot(&self, snapshot: &str) -> Result<()>;

    /// Destroys a snapshot. Fails while any clone still references it.
    async fn destroy_snapshot(&self, snapshot: &str) -> Result<()>;

    /// Creates a filesystem dataset. With `parents`, missing ancestors are
    /// created and an already-existing dataset is not an error.
    async fn create_dataset(&self, dataset: &str, parents: bool) -> Result<()>;

    /// Clones `snapshot` into the writable dataset `target`.
    async fn clone_snapshot(&self, snapshot: &str, target: &str) -> Result<()>;

    /// Recursively destroys a dataset and everything beneath it.
    async fn destroy_dataset_recursive(&self, dataset: &str) -> Result<()>;

    /// Reads a single property value (e.g. `mountpoint`, `origin`).
    /// Absent values come back as [`PROPERTY_NONE`].
    async fn get_property(&self, dataset: &str, property: &str) -> Result<String>;

    /// Lists all filesystem-type datasets.
    async fn list_filesystems(&self) -> Result<Vec<FilesystemRow>>;

    /// Lists snapshots of `dataset` and its descendants, creation ascending.
    async fn list_snapshots(&self, dataset: &str) -> Result<Vec<SnapshotRow>>;
}

// Shared engines are common (one pool, many managers), so delegate through
// Arc.
#[async_trait]
impl<E: ZfsEngine + ?Sized> ZfsEngine for std::sync::Arc<E> {
    async fn create_snapshot(&self, snapshot: &str) -> Result<()> {
        (**self).create_snapshot(snapshot).await
    }

    async fn destroy_snapshot(&self, snapshot: &str) -> Result<()> {
        (**self).destroy_snapshot(snapshot).await
    }

    async fn create_dataset(&self, dataset: &str, parents: bool) -> Result<()> {
        (**self).create_dataset(dataset, parents).await
    }

    async fn clone_snapshot(&self, snapshot: &str, target: &str) -> Result<()> {
        (**self).clone_snapshot(snapshot, target).await
    }

    async fn destroy_dataset_recursive(&self, dataset: &str) -> Result<()> {
        (**self).destroy_dataset_recursive(dataset).await
    }

    async fn get_property(&self, dataset: &str, property: &str) -> Result<String> {
        (**self).get_property(dataset, property).await
    }

    async fn list_filesystems(&self) -> Result<Vec<FilesystemRow>> {
        (**self).list_filesystems().await
    }

    async fn list_snapshots(&self, dataset: &str) -> Result<Vec<SnapshotRow>> {
        (**self).list_snapshots(dataset).await
    }
}
