//! Ephemeral sandbox lifecycle: clone-based writable copies of a live
//! dataset.
//!
//! A sandbox is a ZFS clone whose origin snapshot was created by this
//! module specifically as that sandbox's base (`sandbox-base-<name>`). The
//! snapshot and the clone form a single lifecycle unit: creation is
//! two-phase with a compensating teardown, and destruction removes the
//! clone first, then its base snapshot.

use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::validate::{ensure_dataset, ensure_sandbox_name};
use crate::zfs::ZfsEngine;

/// Name of the per-pool container dataset that holds sandbox clones.
pub const SANDBOX_CONTAINER: &str = "sandboxes";

/// Label prefix of the base snapshots owned by sandboxes.
pub const BASE_SNAPSHOT_PREFIX: &str = "sandbox-base-";

/// Descriptor returned by a successful sandbox creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxCreated {
    /// Full sandbox dataset id, e.g. `tank/sandboxes/t1`.
    pub sandbox: String,
    /// Mountpoint of the clone (`-` if it could not be resolved).
    pub mountpoint: String,
    /// The base snapshot the clone originates from.
    pub origin: String,
    /// Total creation time in milliseconds.
    pub duration_ms: u64,
}

/// One active sandbox, as enumerated by [`SandboxManager::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxDescriptor {
    /// Full sandbox dataset id.
    pub name: String,
    /// Origin snapshot of the clone.
    pub origin: String,
    /// Space used by the clone.
    pub used: String,
    /// Mountpoint of the clone.
    pub mountpoint: String,
    /// Creation time, as reported by the engine.
    pub creation: String,
}

/// Outcome of a sandbox destruction.
///
/// `origin_cleaned` is false when the clone was destroyed but the base
/// snapshot could not be - the one non-clean exit. The clone is already
/// gone at that point, so the failure cannot be rolled back; it is reported
/// here so callers can reconcile the orphaned snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxDestroyed {
    /// The destroyed sandbox dataset id.
    pub destroyed: String,
    /// Whether the owning base snapshot was destroyed as well.
    pub origin_cleaned: bool,
    /// The origin-destroy failure, when `origin_cleaned` is false because
    /// of an error rather than a missing origin.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin_error: Option<String>,
}

/// Create/list/destroy of clone-based sandboxes.
pub struct SandboxManager<E: ZfsEngine> {
    engine: E,
}

impl<E: ZfsEngine> SandboxManager<E> {
    /// Creates a manager over the given engine.
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    /// Creates a sandbox of `dataset`.
    ///
    /// Phase A snapshots the dataset (`dataset@sandbox-base-<name>`); a
    /// failure there is terminal with nothing to undo. Phase B clones the
    /// snapshot into `<pool>/sandboxes/<name>`; if the clone fails, the
    /// base snapshot is destroyed again (best effort) so failed creations
    /// leave no residue behind.
    pub async fn create(&self, dataset: &str, name: Option<&str>) -> Result<SandboxCreated> {
        ensure_dataset(dataset)?;
        let name = match name {
            Some(given) => ensure_sandbox_name(given)?.to_string(),
            None => default_sandbox_name(),
        };

        let start = Instant::now();

        // Phase A: base snapshot.
        let base_snapshot = format!("{}@{}{}", dataset, BASE_SNAPSHOT_PREFIX, name);
        self.engine.create_snapshot(&base_snapshot).await?;

        // Phase B: ensure the container, then clone.
        let pool = pool_of(dataset);
        let container = format!("{}/{}", pool, SANDBOX_CONTAINER);
        if let Err(e) = self.engine.create_dataset(&container, true).await {
            // The clone below surfaces the real failure if the container is
            // genuinely unusable.
            tracing::warn!(container = %container, error = %e, "could not ensure sandbox container");
        }

        let sandbox = format!("{}/{}", container, name);
        if let Err(clone_err) = self.engine.clone_snapshot(&base_snapshot, &sandbox).await {
            if let Err(cleanup_err) = self.engine.destroy_snapshot(&base_snapshot).await {
                tracing::warn!(
                    snapshot = %base_snapshot,
                    error = %cleanup_err,
                    "failed to clean up base snapshot after clone failure"
                );
            }
            return Err(clone_err);
        }

        let mountpoint = match self.engine.get_property(&sandbox, "mountpoint").await {
            Ok(mp) => mp,
            Err(e) => {
                // The sandbox exists; a property read failure is not worth
                // rolling it back over.
                tracing::warn!(sandbox = %sandbox, error = %e, "could not resolve sandbox mountpoint");
                crate::zfs::PROPERTY_NONE.to_string()
            }
        };

        tracing::info!(
            sandbox = %sandbox,
            origin = %base_snapshot,
            mountpoint = %mountpoint,
            "created sandbox"
        );

        Ok(SandboxCreated {
            sandbox,
            mountpoint,
            origin: base_snapshot,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Lists active sandboxes: clone datasets one level beneath a
    /// `<pool>/sandboxes` container. Plain (non-clone) datasets someone
    /// placed under a container are filtered out.
    pub async fn list(&self) -> Result<Vec<SandboxDescriptor>> {
        let rows = self.engine.list_filesystems().await?;
        Ok(rows
            .into_iter()
            .filter(|row| is_sandbox_dataset(&row.name))
            .filter_map(|row| {
                let origin = row.origin?;
                Some(SandboxDescriptor {
                    name: row.name,
                    origin,
                    used: row.used,
                    mountpoint: row.mountpoint,
                    creation: row.creation,
                })
            })
            .collect())
    }

    /// Destroys a sandbox and its owning base snapshot.
    ///
    /// Only datasets with an interior `sandboxes` path segment are
    /// accepted; this operation must never be reachable against arbitrary
    /// datasets. The clone is destroyed before the snapshot, respecting the
    /// clone→snapshot dependency.
    pub async fn destroy(&self, sandbox: &str) -> Result<SandboxDestroyed> {
        ensure_dataset(sandbox)?;
        if !is_sandbox_path(sandbox) {
            return Err(Error::Validation(format!(
                "'{}' is not a sandbox dataset (expected <pool>/{}/<name>)",
                sandbox, SANDBOX_CONTAINER
            )));
        }

        // Read the origin before the clone disappears.
        let origin = match self.engine.get_property(sandbox, "origin").await {
            Ok(value) if value != crate::zfs::PROPERTY_NONE && !value.is_empty() => Some(value),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(sandbox = %sandbox, error = %e, "could not read sandbox origin");
                None
            }
        };

        self.engine.destroy_dataset_recursive(sandbox).await?;

        let (origin_cleaned, origin_error) = match &origin {
            Some(snapshot) => match self.engine.destroy_snapshot(snapshot).await {
                Ok(()) => (true, None),
                Err(e) => {
                    tracing::warn!(
                        snapshot = %snapshot,
                        error = %e,
                        "sandbox destroyed but base snapshot survives; manual cleanup needed"
                    );
                    (false, Some(e.to_string()))
                }
            },
            None => (false, None),
        };

        tracing::info!(sandbox = %sandbox, origin_cleaned, "destroyed sandbox");

        Ok(SandboxDestroyed {
            destroyed: sandbox.to_string(),
            origin_cleaned,
            origin_error,
        })
    }
}

/// Pool component of a dataset id (`tank/docker` → `tank`).
fn pool_of(dataset: &str) -> &str {
    dataset.split('/').next().unwrap_or(dataset)
}

/// True for ids one level beneath a `*/sandboxes` container.
fn is_sandbox_dataset(name: &str) -> bool {
    let mut components = name.rsplit('/');
    let leaf = components.next();
    let parent = components.next();
    leaf.is_some() && parent == Some(SANDBOX_CONTAINER) && components.next().is_some()
}

/// True if the id contains an interior `sandboxes` path segment.
fn is_sandbox_path(name: &str) -> bool {
    let components: Vec<&str> = name.split('/').collect();
    components.len() >= 3
        && components[1..components.len() - 1].contains(&SANDBOX_CONTAINER)
}

/// Timestamp-seeded default sandbox name, second granularity.
fn default_sandbox_name() -> String {
    format!("sandbox-{}", chrono::Utc::now().format("%Y%m%d-%H%M%S"))
}
