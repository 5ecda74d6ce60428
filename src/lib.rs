//! snaplab - ephemeral ZFS sandboxes and time-travel file recovery
//!
//! This library orchestrates snapshot lifecycles on top of ZFS primitives:
//! disposable writable clones of live datasets for isolated testing, and
//! safe browsing/restoring of individual files from historical snapshot
//! views. The ZFS side is an injected [`zfs::ZfsEngine`]; production code
//! uses [`zfs::CliZfs`], tests use [`zfs::MemoryZfs`].

pub mod catalog;
pub mod config;
pub mod contain;
pub mod error;
pub mod ignore;
pub mod sandbox;
pub mod timetravel;
pub mod validate;
pub mod zfs;

pub use catalog::{SnapshotCatalog, SnapshotDescriptor};
pub use config::Config;
pub use contain::contain;
pub use error::{Error, Result};
pub use sandbox::{SandboxCreated, SandboxDescriptor, SandboxDestroyed, SandboxManager};
pub use timetravel::{
    BrowseResult, FileRestorer, RestoreOutcome, SnapshotEntry, TimeTravelBrowser,
};
pub use zfs::{CliZfs, MemoryZfs, ZfsEngine};
