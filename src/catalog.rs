//! Snapshot catalog: the set of recovery points for a dataset.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::validate::ensure_dataset;
use crate::zfs::ZfsEngine;

/// One point-in-time snapshot of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotDescriptor {
    /// Full snapshot name, e.g. `tank/data@daily-2025-02-15`.
    pub name: String,
    /// Owning dataset, e.g. `tank/data`.
    pub dataset: String,
    /// Snapshot label after the `@`, e.g. `daily-2025-02-15`.
    pub label: String,
    /// Creation time, as reported by the engine.
    pub creation: String,
    /// Space used by the snapshot itself.
    pub used: String,
    /// Referenced size at snapshot time.
    pub refer: String,
}

/// Lists a dataset's snapshots, ordered by creation ascending.
pub struct SnapshotCatalog<E: ZfsEngine> {
    engine: E,
}

impl<E: ZfsEngine> SnapshotCatalog<E> {
    /// Creates a catalog over the given engine.
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Lists snapshots of `dataset` and its descendants, creation ascending.
    pub async fn list(&self, dataset: &str) -> Result<Vec<SnapshotDescriptor>> {
        ensure_dataset(dataset)?;

        let rows = self.engine.list_snapshots(dataset).await?;
        let descriptors = rows
            .into_iter()
            .filter_map(|row| {
                // The engine only returns snapshot rows, but guard the split
                // so a malformed name cannot produce a bogus descriptor.
                let (dataset, label) = row.name.split_once('@')?;
                Some(SnapshotDescriptor {
                    dataset: dataset.to_string(),
                    label: label.to_string(),
                    name: row.name.clone(),
                    creation: row.creation,
                    used: row.used,
                    refer: row.refer,
                })
            })
            .collect();
        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zfs::MemoryZfs;
    use crate::Error;
    use tempfile::TempDir;

    #[tokio::test]
    async fn list_rejects_invalid_dataset_before_engine_access() {
        let temp = TempDir::new().unwrap();
        let catalog = SnapshotCatalog::new(MemoryZfs::new(temp.path()));
        let err = catalog.list("tank;evil").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn list_splits_names_into_dataset_and_label() {
        let temp = TempDir::new().unwrap();
        let zfs = MemoryZfs::new(temp.path());
        zfs.create_dataset("tank/data", true).await.unwrap();
        zfs.create_snapshot("tank/data@daily-1").await.unwrap();
        zfs.create_snapshot("tank/data@daily-2").await.unwrap();

        let catalog = SnapshotCatalog::new(zfs);
        let versions = catalog.list("tank/data").await.unwrap();
        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].dataset, "tank/data");
        assert_eq!(versions[0].label, "daily-1");
        assert_eq!(versions[1].name, "tank/data@daily-2");
    }

    #[tokio::test]
    async fn list_includes_descendant_snapshots() {
        let temp = TempDir::new().unwrap();
        let zfs = MemoryZfs::new(temp.path());
        zfs.create_dataset("tank/data/photos", true).await.unwrap();
        zfs.create_snapshot("tank/data@root").await.unwrap();
        zfs.create_snapshot("tank/data/photos@nested").await.unwrap();

        let catalog = SnapshotCatalog::new(zfs);
        let versions = catalog.list("tank/data").await.unwrap();
        let names: Vec<&str> = versions.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["tank/data@root", "tank/data/photos@nested"]);
    }

    #[tokio::test]
    async fn list_propagates_missing_dataset() {
        let temp = TempDir::new().unwrap();
        let catalog = SnapshotCatalog::new(MemoryZfs::new(temp.path()));
        let err = catalog.list("tank/nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
