//! Identifier validation for datasets, snapshots, and sandbox names.
//!
//! Every identifier that ends up in a `zfs` argument list passes through
//! these checks first; nothing reaches the engine unvalidated.

use crate::error::{Error, Result};

/// Maximum dataset name length accepted by the engine.
pub const MAX_DATASET_LEN: usize = 200;

/// Maximum full snapshot name (`dataset@label`) length.
pub const MAX_SNAPSHOT_LEN: usize = 250;

/// Maximum sandbox name length. Sandbox names are embedded in generated
/// child-dataset paths, so the cap is tighter than for datasets.
pub const MAX_SANDBOX_NAME_LEN: usize = 64;

fn is_body_char(c: char, allow_slash: bool) -> bool {
    c.is_ascii_alphanumeric()
        || c == '_'
        || c == '-'
        || c == '.'
        || (allow_slash && c == '/')
}

/// Returns true if `name` is a structurally valid dataset identifier
/// (`pool/path/...`): starts with an alphanumeric character, and uses only
/// alphanumerics, `/`, `_`, `-`, and `.`.
pub fn is_valid_dataset(name: &str) -> bool {
    if name.is_empty() || name.len() > MAX_DATASET_LEN {
        return false;
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| is_body_char(c, true))
}

/// Returns true if `name` is a valid full snapshot identifier
/// (`dataset@label`, exactly one `@`).
pub fn is_valid_snapshot(name: &str) -> bool {
    if name.len() < 3 || name.len() > MAX_SNAPSHOT_LEN {
        return false;
    }
    let Some((dataset, label)) = name.split_once('@') else {
        return false;
    };
    if label.contains('@') {
        return false;
    }
    let mut label_chars = label.chars();
    let label_ok = match label_chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => label_chars.all(|c| is_body_char(c, false)),
        _ => false,
    };
    is_valid_dataset(dataset) && label_ok
}

/// Returns true if `name` is a safe sandbox name: 1-64 characters, all from
/// `[A-Za-z0-9._-]`. The allow-list implicitly rejects the shell and path
/// metacharacters (`@ / ; | & $ backtick backslash quote space`) that would
/// be dangerous inside a generated child-dataset path.
pub fn is_valid_sandbox_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_SANDBOX_NAME_LEN
        && name.chars().all(|c| is_body_char(c, false))
}

/// Validates a dataset identifier, returning it on success.
pub fn ensure_dataset(name: &str) -> Result<&str> {
    if is_valid_dataset(name) {
        Ok(name)
    } else {
        Err(Error::Validation(format!("invalid dataset name '{}'", name)))
    }
}

/// Validates a full snapshot identifier, returning it on success.
pub fn ensure_snapshot(name: &str) -> Result<&str> {
    if is_valid_snapshot(name) {
        Ok(name)
    } else {
        Err(Error::Validation(format!(
            "invalid snapshot name '{}' (expected dataset@label)",
            name
        )))
    }
}

/// Validates a sandbox name, returning it on success.
pub fn ensure_sandbox_name(name: &str) -> Result<&str> {
    if is_valid_sandbox_name(name) {
        Ok(name)
    } else {
        Err(Error::Validation(format!("invalid sandbox name '{}'", name)))
    }
}
