//! Single-file restore from a snapshot view into the live tree.

use std::path::{Component, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::contain::contain;
use crate::error::{Error, Result};
use crate::zfs::ZfsEngine;

use super::{resolve_view, SNAPSHOT_MARKER};

/// Outcome of a completed restore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreOutcome {
    /// Absolute path of the historical source file.
    pub source: PathBuf,
    /// Absolute path the file was restored to.
    pub destination: PathBuf,
    /// Bytes copied.
    pub size: u64,
    /// Elapsed copy time in milliseconds.
    pub duration_ms: u64,
}

/// Copies single historical files back into the live dataset.
///
/// Directory restore is deliberately unsupported; recovering a whole tree
/// is a dataset-level rollback, not a file copy.
pub struct FileRestorer<E: ZfsEngine> {
    engine: E,
}

impl<E: ZfsEngine> FileRestorer<E> {
    /// Creates a restorer over the given engine.
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Restores `source_rel` from `snapshot` (`dataset@label`) to
    /// `dest_rel` in the live tree (defaults to the same relative path).
    /// An existing destination is only replaced when `overwrite` is set.
    pub async fn restore(
        &self,
        snapshot: &str,
        source_rel: &str,
        dest_rel: Option<&str>,
        overwrite: bool,
    ) -> Result<RestoreOutcome> {
        let view = resolve_view(&self.engine, snapshot).await?;

        let source = contain(&view.view_root, source_rel)?;

        let dest_rel = dest_rel.unwrap_or(source_rel);
        let destination = contain(&view.mountpoint, dest_rel)?;
        // The live-tree boundary alone is not enough: a destination inside
        // the snapshot marker would write back into historical views.
        let dest_tail = destination
            .strip_prefix(&view.mountpoint)
            .unwrap_or(&destination);
        if dest_tail
            .components()
            .any(|c| c == Component::Normal(SNAPSHOT_MARKER.as_ref()))
        {
            return Err(Error::Containment {
                root: view.mountpoint.clone(),
                candidate: dest_rel.to_string(),
            });
        }

        let src_meta = match tokio::fs::metadata(&source).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!(
                    "source '{}' not found in snapshot '{}'",
                    source_rel, snapshot
                )));
            }
            Err(e) => return Err(e.into()),
        };
        if src_meta.is_dir() {
            return Err(Error::Validation(format!(
                "'{}' is a directory; restore single files or roll back the dataset",
                source_rel
            )));
        }

        if tokio::fs::metadata(&destination).await.is_ok() && !overwrite {
            return Err(Error::Conflict { path: destination });
        }

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let start = Instant::now();
        let mut reader = tokio::fs::File::open(&source).await?;
        let mut writer = tokio::fs::File::create(&destination).await?;
        let size = tokio::io::copy(&mut reader, &mut writer).await?;
        // Durably flush before reporting success.
        writer.sync_all().await?;
        let duration_ms = start.elapsed().as_millis() as u64;

        // Permission bits follow the historical file; ownership and
        // timestamps intentionally do not.
        if let Err(e) = tokio::fs::set_permissions(&destination, src_meta.permissions()).await {
            tracing::warn!(
                destination = %destination.display(),
                error = %e,
                "restored file but could not reapply permissions"
            );
        }

        tracing::info!(
            source = %source.display(),
            destination = %destination.display(),
            size,
            "restored file from snapshot"
        );

        Ok(RestoreOutcome {
            source,
            destination,
            size,
            duration_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zfs::MemoryZfs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    async fn engine_with_view(temp: &TempDir) -> MemoryZfs {
        let zfs = MemoryZfs::new(temp.path());
        zfs.create_dataset("tank/data", true).await.unwrap();

        let view = zfs
            .mountpoint_of("tank/data")
            .join(".zfs/snapshot/daily-1");
        std::fs::create_dir_all(view.join("photos")).unwrap();
        std::fs::write(view.join("photos/vacation.jpg"), b"original bytes").unwrap();
        std::fs::set_permissions(
            view.join("photos/vacation.jpg"),
            std::fs::Permissions::from_mode(0o640),
        )
        .unwrap();
        zfs
    }

    #[tokio::test]
    async fn restore_copies_bytes_and_permission_bits() {
        let temp = TempDir::new().unwrap();
        let zfs = engine_with_view(&temp).await;
        let live = zfs.mountpoint_of("tank/data");
        let restorer = FileRestorer::new(zfs);

        let outcome = restorer
            .restore("tank/data@daily-1", "photos/vacation.jpg", None, false)
            .await
            .unwrap();

        assert_eq!(outcome.size, 14);
        assert_eq!(outcome.destination, live.join("photos/vacation.jpg"));
        assert_eq!(
            std::fs::read(&outcome.destination).unwrap(),
            b"original bytes"
        );
        let mode = std::fs::metadata(&outcome.destination)
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o640);
    }

    #[tokio::test]
    async fn restore_to_alternate_destination_creates_parents() {
        let temp = TempDir::new().unwrap();
        let zfs = engine_with_view(&temp).await;
        let live = zfs.mountpoint_of("tank/data");
        let restorer = FileRestorer::new(zfs);

        let outcome = restorer
            .restore(
                "tank/data@daily-1",
                "photos/vacation.jpg",
                Some("recovered/deep/vacation.jpg"),
                false,
            )
            .await
            .unwrap();

        assert_eq!(
            outcome.destination,
            live.join("recovered/deep/vacation.jpg")
        );
        assert!(outcome.destination.exists());
    }

    #[tokio::test]
    async fn existing_destination_conflicts_without_overwrite() {
        let temp = TempDir::new().unwrap();
        let zfs = engine_with_view(&temp).await;
        let live = zfs.mountpoint_of("tank/data");
        std::fs::create_dir_all(live.join("photos")).unwrap();
        std::fs::write(live.join("photos/vacation.jpg"), b"newer content").unwrap();
        let restorer = FileRestorer::new(zfs);

        let err = restorer
            .restore("tank/data@daily-1", "photos/vacation.jpg", None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { .. }));

        // The destination's bytes are untouched.
        assert_eq!(
            std::fs::read(live.join("photos/vacation.jpg")).unwrap(),
            b"newer content"
        );
    }

    #[tokio::test]
    async fn overwrite_replaces_existing_destination() {
        let temp = TempDir::new().unwrap();
        let zfs = engine_with_view(&temp).await;
        let live = zfs.mountpoint_of("tank/data");
        std::fs::create_dir_all(live.join("photos")).unwrap();
        std::fs::write(live.join("photos/vacation.jpg"), b"newer content").unwrap();
        let restorer = FileRestorer::new(zfs);

        restorer
            .restore("tank/data@daily-1", "photos/vacation.jpg", None, true)
            .await
            .unwrap();
        assert_eq!(
            std::fs::read(live.join("photos/vacation.jpg")).unwrap(),
            b"original bytes"
        );
    }

    #[tokio::test]
    async fn directory_sources_are_rejected() {
        let temp = TempDir::new().unwrap();
        let restorer = FileRestorer::new(engine_with_view(&temp).await);

        let err = restorer
            .restore("tank/data@daily-1", "photos", None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn missing_sources_are_not_found() {
        let temp = TempDir::new().unwrap();
        let restorer = FileRestorer::new(engine_with_view(&temp).await);

        let err = restorer
            .restore("tank/data@daily-1", "photos/gone.jpg", None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn traversal_in_either_path_is_contained() {
        let temp = TempDir::new().unwrap();
        let restorer = FileRestorer::new(engine_with_view(&temp).await);

        let err = restorer
            .restore("tank/data@daily-1", "../../../etc/passwd", None, false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Containment { .. }));

        let err = restorer
            .restore(
                "tank/data@daily-1",
                "photos/vacation.jpg",
                Some("../outside.jpg"),
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Containment { .. }));
    }

    #[tokio::test]
    async fn destination_inside_snapshot_marker_is_rejected() {
        let temp = TempDir::new().unwrap();
        let restorer = FileRestorer::new(engine_with_view(&temp).await);

        let err = restorer
            .restore(
                "tank/data@daily-1",
                "photos/vacation.jpg",
                Some(".zfs/snapshot/daily-1/photos/vacation.jpg"),
                false,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Containment { .. }));
    }
}
