//! In-memory ZFS engine for tests.
//!
//! Models the create/destroy/clone/list/get semantics of a real pool,
//! including the dependency rule that a snapshot cannot be destroyed while
//! a clone references it. Dataset mountpoints are real directories beneath
//! a caller-supplied root, so browse and restore tests can lay out files
//! on disk. Fault injection switches simulate primitive failures for
//! compensation-path tests.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};

use super::{FilesystemRow, SnapshotRow, ZfsEngine, PROPERTY_NONE};

#[derive(Debug, Clone)]
struct DatasetNode {
    origin: Option<String>,
    stamp: u64,
}

#[derive(Debug, Clone)]
struct SnapshotNode {
    stamp: u64,
}

#[derive(Default)]
struct State {
    next_stamp: u64,
    datasets: BTreeMap<String, DatasetNode>,
    snapshots: BTreeMap<String, SnapshotNode>,
}

impl State {
    fn stamp(&mut self) -> u64 {
        self.next_stamp += 1;
        self.next_stamp
    }
}

/// In-memory [`ZfsEngine`] with tempdir-backed mountpoints.
pub struct MemoryZfs {
    root: PathBuf,
    state: Mutex<State>,
    fail_create_snapshot: AtomicBool,
    fail_clone: AtomicBool,
    fail_destroy_snapshot: AtomicBool,
    fail_destroy_dataset: AtomicBool,
}

impl MemoryZfs {
    /// Creates an empty pool namespace whose mountpoints live under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            state: Mutex::new(State::default()),
            fail_create_snapshot: AtomicBool::new(false),
            fail_clone: AtomicBool::new(false),
            fail_destroy_snapshot: AtomicBool::new(false),
            fail_destroy_dataset: AtomicBool::new(false),
        }
    }

    /// Arms a one-shot failure for the next `create_snapshot` call.
    pub fn fail_next_create_snapshot(&self) {
        self.fail_create_snapshot.store(true, Ordering::SeqCst);
    }

    /// Arms a one-shot failure for the next `clone_snapshot` call.
    pub fn fail_next_clone(&self) {
        self.fail_clone.store(true, Ordering::SeqCst);
    }

    /// Arms a one-shot failure for the next `destroy_snapshot` call.
    pub fn fail_next_destroy_snapshot(&self) {
        self.fail_destroy_snapshot.store(true, Ordering::SeqCst);
    }

    /// Arms a one-shot failure for the next `destroy_dataset_recursive` call.
    pub fn fail_next_destroy_dataset(&self) {
        self.fail_destroy_dataset.store(true, Ordering::SeqCst);
    }

    /// True if `dataset` currently exists.
    pub fn dataset_exists(&self, dataset: &str) -> bool {
        self.state
            .lock()
            .expect("state lock poisoned")
            .datasets
            .contains_key(dataset)
    }

    /// True if `snapshot` currently exists.
    pub fn snapshot_exists(&self, snapshot: &str) -> bool {
        self.state
            .lock()
            .expect("state lock poisoned")
            .snapshots
            .contains_key(snapshot)
    }

    /// Mountpoint directory the engine reports for `dataset`.
    pub fn mountpoint_of(&self, dataset: &str) -> PathBuf {
        self.root.join(dataset)
    }

    fn take(flag: &AtomicBool) -> bool {
        flag.swap(false, Ordering::SeqCst)
    }

    fn ensure_mount_dir(&self, dataset: &str) {
        let dir = self.mountpoint_of(dataset);
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(dir = %dir.display(), error = %e, "failed to create fake mountpoint");
        }
    }

    fn parent_of(dataset: &str) -> Option<&str> {
        dataset.rsplit_once('/').map(|(parent, _)| parent)
    }
}

fn snapshot_dataset(snapshot: &str) -> &str {
    snapshot.split('@').next().unwrap_or(snapshot)
}

#[async_trait]
impl ZfsEngine for MemoryZfs {
    async fn create_snapshot(&self, snapshot: &str) -> Result<()> {
        if Self::take(&self.fail_create_snapshot) {
            return Err(Error::Primitive {
                command: "snapshot".to_string(),
                reason: "injected snapshot failure".to_string(),
            });
        }
        let mut state = self.state.lock().expect("state lock poisoned");
        if !state.datasets.contains_key(snapshot_dataset(snapshot)) {
            return Err(Error::NotFound(format!(
                "cannot create '{}': dataset does not exist",
                snapshot
            )));
        }
        if state.snapshots.contains_key(snapshot) {
            return Err(Error::Primitive {
                command: "snapshot".to_string(),
                reason: format!("cannot create '{}': snapshot already exists", snapshot),
            });
        }
        let stamp = state.stamp();
        state
            .snapshots
            .insert(snapshot.to_string(), SnapshotNode { stamp });
        Ok(())
    }

    async fn destroy_snapshot(&self, snapshot: &str) -> Result<()> {
        if Self::take(&self.fail_destroy_snapshot) {
            return Err(Error::Primitive {
                command: "destroy".to_string(),
                reason: "injected destroy failure".to_string(),
            });
        }
        let mut state = self.state.lock().expect("state lock poisoned");
        if state
            .datasets
            .values()
            .any(|node| node.origin.as_deref() == Some(snapshot))
        {
            return Err(Error::Primitive {
                command: "destroy".to_string(),
                reason: format!("cannot destroy '{}': snapshot has dependent clones", snapshot),
            });
        }
        if state.snapshots.remove(snapshot).is_none() {
            return Err(Error::NotFound(format!(
                "cannot destroy '{}': snapshot does not exist",
                snapshot
            )));
        }
        Ok(())
    }

    async fn create_dataset(&self, dataset: &str, parents: bool) -> Result<()> {
        let mut state = self.state.lock().expect("state lock poisoned");
        if state.datasets.contains_key(dataset) {
            if parents {
                return Ok(());
            }
            return Err(Error::Primitive {
                command: "create".to_string(),
                reason: format!("cannot create '{}': dataset already exists", dataset),
            });
        }
        if parents {
            let mut ancestors = Vec::new();
            let mut cursor = dataset;
            while let Some(parent) = Self::parent_of(cursor) {
                ancestors.push(parent.to_string());
                cursor = &dataset[..parent.len()];
            }
            for ancestor in ancestors.into_iter().rev() {
                if !state.datasets.contains_key(&ancestor) {
                    let stamp = state.stamp();
                    state.datasets.insert(
                        ancestor.clone(),
                        DatasetNode {
                            origin: None,
                            stamp,
                        },
                    );
                    drop(state);
                    self.ensure_mount_dir(&ancestor);
                    state = self.state.lock().expect("state lock poisoned");
                }
            }
        } else if let Some(parent) = Self::parent_of(dataset) {
            if !state.datasets.contains_key(parent) {
                return Err(Error::Primitive {
                    command: "create".to_string(),
                    reason: format!("cannot create '{}': parent does not exist", dataset),
                });
            }
        }
        let stamp = state.stamp();
        state.datasets.insert(
            dataset.to_string(),
            DatasetNode {
                origin: None,
                stamp,
            },
        );
        drop(state);
        self.ensure_mount_dir(dataset);
        Ok(())
    }

    async fn clone_snapshot(&self, snapshot: &str, target: &str) -> Result<()> {
        if Self::take(&self.fail_clone) {
            return Err(Error::Primitive {
                command: "clone".to_string(),
                reason: "injected clone failure".to_string(),
            });
        }
        let mut state = self.state.lock().expect("state lock poisoned");
        if !state.snapshots.contains_key(snapshot) {
            return Err(Error::NotFound(format!(
                "cannot clone '{}': snapshot does not exist",
                snapshot
            )));
        }
        if state.datasets.contains_key(target) {
            return Err(Error::Primitive {
                command: "clone".to_string(),
                reason: format!("cannot clone to '{}': dataset already exists", target),
            });
        }
        if let Some(parent) = Self::parent_of(target) {
            if !state.datasets.contains_key(parent) {
                return Err(Error::NotFound(format!(
                    "cannot clone to '{}': parent does not exist",
                    target
                )));
            }
        }
        let stamp = state.stamp();
        state.datasets.insert(
            target.to_string(),
            DatasetNode {
                origin: Some(snapshot.to_string()),
                stamp,
            },
        );
        drop(state);
        self.ensure_mount_dir(target);
        Ok(())
    }

    async fn destroy_dataset_recursive(&self, dataset: &str) -> Result<()> {
        if Self::take(&self.fail_destroy_dataset) {
            return Err(Error::Primitive {
                command: "destroy".to_string(),
                reason: "injected destroy failure".to_string(),
            });
        }
        let mut state = self.state.lock().expect("state lock poisoned");
        if !state.datasets.contains_key(dataset) {
            return Err(Error::NotFound(format!(
                "cannot destroy '{}': dataset does not exist",
                dataset
            )));
        }
        let child_prefix = format!("{}/", dataset);
        let snap_prefix = format!("{}@", dataset);
        state
            .datasets
            .retain(|name, _| name != dataset && !name.starts_with(&child_prefix));
        state.snapshots.retain(|name, _| {
            !name.starts_with(&snap_prefix) && !name.starts_with(&child_prefix)
        });
        drop(state);
        let dir = self.mountpoint_of(dataset);
        if dir.exists() {
            let _ = std::fs::remove_dir_all(&dir);
        }
        Ok(())
    }

    async fn get_property(&self, dataset: &str, property: &str) -> Result<String> {
        let state = self.state.lock().expect("state lock poisoned");
        let node = state.datasets.get(dataset).ok_or_else(|| {
            Error::NotFound(format!("cannot open '{}': dataset does not exist", dataset))
        })?;
        match property {
            "mountpoint" => Ok(self.mountpoint_of(dataset).display().to_string()),
            "origin" => Ok(node
                .origin
                .clone()
                .unwrap_or_else(|| PROPERTY_NONE.to_string())),
            other => Err(Error::Primitive {
                command: "get".to_string(),
                reason: format!("bad property '{}'", other),
            }),
        }
    }

    async fn list_filesystems(&self) -> Result<Vec<FilesystemRow>> {
        let state = self.state.lock().expect("state lock poisoned");
        let mut rows: Vec<(u64, FilesystemRow)> = state
            .datasets
            .iter()
            .map(|(name, node)| {
                (
                    node.stamp,
                    FilesystemRow {
                        name: name.clone(),
                        origin: node.origin.clone(),
                        used: "24K".to_string(),
                        mountpoint: self.mountpoint_of(name).display().to_string(),
                        creation: format!("#{}", node.stamp),
                    },
                )
            })
            .collect();
        rows.sort_by_key(|(stamp, _)| *stamp);
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    async fn list_snapshots(&self, dataset: &str) -> Result<Vec<SnapshotRow>> {
        let state = self.state.lock().expect("state lock poisoned");
        if !state.datasets.contains_key(dataset) {
            return Err(Error::NotFound(format!(
                "cannot open '{}': dataset does not exist",
                dataset
            )));
        }
        let child_prefix = format!("{}/", dataset);
        let mut rows: Vec<(u64, SnapshotRow)> = state
            .snapshots
            .iter()
            .filter(|(name, _)| {
                let owner = snapshot_dataset(name);
                owner == dataset || owner.starts_with(&child_prefix)
            })
            .map(|(name, node)| {
                (
                    node.stamp,
                    SnapshotRow {
                        name: name.clone(),
                        used: "0B".to_string(),
                        refer: "24K".to_string(),
                        creation: format!("#{}", node.stamp),
                    },
                )
            })
            .collect();
        rows.sort_by_key(|(stamp, _)| *stamp);
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn pool(temp: &TempDir) -> MemoryZfs {
        MemoryZfs::new(temp.path())
    }

    #[tokio::test]
    async fn snapshot_requires_existing_dataset() {
        let temp = TempDir::new().unwrap();
        let zfs = pool(&temp);
        let err = zfs.create_snapshot("tank/data@s1").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn snapshot_with_dependent_clone_cannot_be_destroyed() {
        let temp = TempDir::new().unwrap();
        let zfs = pool(&temp);
        zfs.create_dataset("tank/data", true).await.unwrap();
        zfs.create_snapshot("tank/data@base").await.unwrap();
        zfs.clone_snapshot("tank/data@base", "tank/clone")
            .await
            .unwrap();

        let err = zfs.destroy_snapshot("tank/data@base").await.unwrap_err();
        assert!(matches!(err, Error::Primitive { .. }));

        // Once the clone is gone, the snapshot can go too.
        zfs.destroy_dataset_recursive("tank/clone").await.unwrap();
        zfs.destroy_snapshot("tank/data@base").await.unwrap();
    }

    #[tokio::test]
    async fn create_with_parents_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let zfs = pool(&temp);
        zfs.create_dataset("tank/sandboxes", true).await.unwrap();
        zfs.create_dataset("tank/sandboxes", true).await.unwrap();
        assert!(zfs.dataset_exists("tank"));
        assert!(zfs.dataset_exists("tank/sandboxes"));
    }

    #[tokio::test]
    async fn recursive_destroy_removes_children_and_their_snapshots() {
        let temp = TempDir::new().unwrap();
        let zfs = pool(&temp);
        zfs.create_dataset("tank/box/nested", true).await.unwrap();
        zfs.create_snapshot("tank/box/nested@s1").await.unwrap();

        zfs.destroy_dataset_recursive("tank/box").await.unwrap();
        assert!(!zfs.dataset_exists("tank/box"));
        assert!(!zfs.dataset_exists("tank/box/nested"));
        assert!(!zfs.snapshot_exists("tank/box/nested@s1"));
        assert!(zfs.dataset_exists("tank"));
    }

    #[tokio::test]
    async fn list_snapshots_orders_by_creation() {
        let temp = TempDir::new().unwrap();
        let zfs = pool(&temp);
        zfs.create_dataset("tank/data", true).await.unwrap();
        zfs.create_snapshot("tank/data@first").await.unwrap();
        zfs.create_snapshot("tank/data@second").await.unwrap();
        zfs.create_snapshot("tank/data@third").await.unwrap();

        let names: Vec<String> = zfs
            .list_snapshots("tank/data")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(
            names,
            vec!["tank/data@first", "tank/data@second", "tank/data@third"]
        );
    }

    #[tokio::test]
    async fn fault_injection_is_one_shot() {
        let temp = TempDir::new().unwrap();
        let zfs = pool(&temp);
        zfs.create_dataset("tank/data", true).await.unwrap();

        zfs.fail_next_create_snapshot();
        assert!(zfs.create_snapshot("tank/data@s1").await.is_err());
        assert!(zfs.create_snapshot("tank/data@s1").await.is_ok());
    }

    #[tokio::test]
    async fn mountpoints_are_real_directories() {
        let temp = TempDir::new().unwrap();
        let zfs = pool(&temp);
        zfs.create_dataset("tank/data", true).await.unwrap();
        let mp = zfs.get_property("tank/data", "mountpoint").await.unwrap();
        assert!(Path::new(&mp).is_dir());
    }
}
