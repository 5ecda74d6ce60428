//! ZFS engine backed by the `zfs` command-line tool.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Error, Result};

use super::{FilesystemRow, SnapshotRow, ZfsEngine};

/// Default path to the zfs binary.
pub const DEFAULT_ZFS_PATH: &str = "/usr/sbin/zfs";

/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// [`ZfsEngine`] implementation that invokes the `zfs` binary.
///
/// Stderr is logged separately and never mixed into parsed stdout, so
/// warning chatter (e.g. "pool is DEGRADED") cannot be misread as data.
pub struct CliZfs {
    zfs_path: PathBuf,
    timeout: Duration,
}

impl Default for CliZfs {
    fn default() -> Self {
        Self::new()
    }
}

impl CliZfs {
    /// Creates an engine using the default binary path and timeout.
    pub fn new() -> Self {
        Self {
            zfs_path: PathBuf::from(DEFAULT_ZFS_PATH),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Creates an engine with an explicit binary path and timeout.
    pub fn with_options(zfs_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            zfs_path: zfs_path.into(),
            timeout,
        }
    }

    /// Runs `zfs` with the given arguments, bounded by the command timeout.
    /// Returns captured stdout.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let command = args.first().copied().unwrap_or("zfs");

        let output = Command::new(&self.zfs_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Ok(result) => result.map_err(|e| Error::Primitive {
                command: command.to_string(),
                reason: format!("failed to invoke {}: {}", self.zfs_path.display(), e),
            })?,
            Err(_) => {
                tracing::error!(command, args = ?args, timeout = ?self.timeout, "zfs command timed out");
                return Err(Error::Primitive {
                    command: command.to_string(),
                    reason: format!("timed out after {:?}", self.timeout),
                });
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if !stderr.is_empty() {
            tracing::warn!(command, args = ?args, stderr = %stderr, "zfs stderr");
        }

        if !output.status.success() {
            if stderr.contains("does not exist") {
                return Err(Error::NotFound(stderr.to_string()));
            }
            return Err(Error::Primitive {
                command: command.to_string(),
                reason: if stderr.is_empty() {
                    format!("exited with {}", output.status)
                } else {
                    stderr.to_string()
                },
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl ZfsEngine for CliZfs {
    async fn create_snapshot(&self, snapshot: &str) -> Result<()> {
        self.run(&["snapshot", snapshot]).await.map(|_| ())
    }

    async fn destroy_snapshot(&self, snapshot: &str) -> Result<()> {
        self.run(&["destroy", snapshot]).await.map(|_| ())
    }

    async fn create_dataset(&self, dataset: &str, parents: bool) -> Result<()> {
        if parents {
            self.run(&["create", "-p", dataset]).await.map(|_| ())
        } else {
            self.run(&["create", dataset]).await.map(|_| ())
        }
    }

    async fn clone_snapshot(&self, snapshot: &str, target: &str) -> Result<()> {
        self.run(&["clone", snapshot, target]).await.map(|_| ())
    }

    async fn destroy_dataset_recursive(&self, dataset: &str) -> Result<()> {
        self.run(&["destroy", "-r", dataset]).await.map(|_| ())
    }

    async fn get_property(&self, dataset: &str, property: &str) -> Result<String> {
        let out = self
            .run(&["get", "-H", "-o", "value", property, dataset])
            .await?;
        Ok(out.trim().to_string())
    }

    async fn list_filesystems(&self) -> Result<Vec<FilesystemRow>> {
        let out = self
            .run(&[
                "list",
                "-t",
                "filesystem",
                "-H",
                "-o",
                "name,origin,used,mountpoint,creation",
            ])
            .await?;
        Ok(parse_filesystem_list(&out))
    }

    async fn list_snapshots(&self, dataset: &str) -> Result<Vec<SnapshotRow>> {
        let out = self
            .run(&[
                "list",
                "-t",
                "snapshot",
                "-H",
                "-o",
                "name,used,refer,creation",
                "-s",
                "creation",
                "-r",
                dataset,
            ])
            .await?;
        Ok(parse_snapshot_list(&out))
    }
}

/// Parses `zfs list -t filesystem -H -o name,origin,used,mountpoint,creation`
/// output. `-H` output is tab-delimited; the creation column may contain
/// spaces. Malformed lines are skipped.
fn parse_filesystem_list(output: &str) -> Vec<FilesystemRow> {
    let mut rows = Vec::new();
    for line in output.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.splitn(5, '\t').collect();
        if parts.len() < 4 {
            tracing::warn!(line, "skipping malformed filesystem list line");
            continue;
        }
        let origin = parts[1].trim();
        rows.push(FilesystemRow {
            name: parts[0].trim().to_string(),
            origin: if origin == super::PROPERTY_NONE || origin.is_empty() {
                None
            } else {
                Some(origin.to_string())
            },
            used: parts[2].trim().to_string(),
            mountpoint: parts[3].trim().to_string(),
            creation: parts.get(4).map(|s| s.trim()).unwrap_or("").to_string(),
        });
    }
    rows
}

/// Parses `zfs list -t snapshot -H -o name,used,refer,creation` output.
fn parse_snapshot_list(output: &str) -> Vec<SnapshotRow> {
    let mut rows = Vec::new();
    for line in output.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.splitn(4, '\t').collect();
        if parts.len() < 3 {
            tracing::warn!(line, "skipping malformed snapshot list line");
            continue;
        }
        if !parts[0].contains('@') {
            continue;
        }
        rows.push(SnapshotRow {
            name: parts[0].trim().to_string(),
            used: parts[1].trim().to_string(),
            refer: parts[2].trim().to_string(),
            creation: parts.get(3).map(|s| s.trim()).unwrap_or("").to_string(),
        });
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_filesystem_rows_with_tab_fields() {
        let out = "tank/sandboxes/t1\ttank/docker@sandbox-base-t1\t24K\t/tank/sandboxes/t1\tSat Feb 15 12:00 2025\n";
        let rows = parse_filesystem_list(out);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "tank/sandboxes/t1");
        assert_eq!(
            rows[0].origin.as_deref(),
            Some("tank/docker@sandbox-base-t1")
        );
        assert_eq!(rows[0].used, "24K");
        assert_eq!(rows[0].mountpoint, "/tank/sandboxes/t1");
        assert_eq!(rows[0].creation, "Sat Feb 15 12:00 2025");
    }

    #[test]
    fn filesystem_origin_dash_becomes_none() {
        let out = "tank/data\t-\t10G\t/tank/data\tFri Jan 10 08:30 2025\n";
        let rows = parse_filesystem_list(out);
        assert_eq!(rows[0].origin, None);
    }

    #[test]
    fn filesystem_parser_skips_malformed_lines() {
        let out = "garbage line without tabs\ntank\t-\t1G\t/tank\tnow\n";
        let rows = parse_filesystem_list(out);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "tank");
    }

    #[test]
    fn parses_snapshot_rows_and_keeps_creation_spaces() {
        let out = "tank/data@daily-1\t1.5G\t10.2G\tSat Feb 15  3:00 2025\n\
                   tank/data@daily-2\t0B\t10.2G\tSun Feb 16  3:00 2025\n";
        let rows = parse_snapshot_list(out);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "tank/data@daily-1");
        assert_eq!(rows[0].used, "1.5G");
        assert_eq!(rows[0].refer, "10.2G");
        assert_eq!(rows[0].creation, "Sat Feb 15  3:00 2025");
    }

    #[test]
    fn snapshot_parser_skips_rows_without_separator() {
        let out = "tank/data\t1G\t1G\tnow\ntank/data@ok\t1G\t1G\tnow\n";
        let rows = parse_snapshot_list(out);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "tank/data@ok");
    }

    #[test]
    fn empty_output_parses_to_empty_lists() {
        assert!(parse_filesystem_list("").is_empty());
        assert!(parse_snapshot_list("\n").is_empty());
    }
}
