//! Path containment for browse and restore boundaries.
//!
//! Two independent boundaries exist: the hidden per-snapshot view tree and
//! the live dataset tree. Every caller-supplied relative path is resolved
//! through [`contain`] before any filesystem access on either side.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Lexically normalizes `candidate` and joins it onto `root`, guaranteeing
/// the result stays inside `root`.
///
/// Leading root components are stripped, so an "absolute" candidate is
/// interpreted relative to the boundary. `..` segments are resolved against
/// the already-accepted segments; popping past the boundary is a
/// [`Error::Containment`] violation. The joined path is verified with a true
/// path-segment prefix check, so a root of `/data` never admits
/// `/data-evil`.
pub fn contain(root: &Path, candidate: &str) -> Result<PathBuf> {
    let violation = || Error::Containment {
        root: root.to_path_buf(),
        candidate: candidate.to_string(),
    };

    let mut segments: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(candidate).components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Prefix(_) => return Err(violation()),
            Component::ParentDir => {
                if segments.pop().is_none() {
                    return Err(violation());
                }
            }
            Component::Normal(seg) => segments.push(seg),
        }
    }

    let mut resolved = root.to_path_buf();
    for seg in segments {
        resolved.push(seg);
    }

    // Lexical cleaning above already guarantees this, but the boundary check
    // is the invariant, so verify it on the final path.
    if !resolved.starts_with(root) {
        return Err(violation());
    }

    Ok(resolved)
}

/// Returns the candidate relative to `root`, normalized, as cleaned by
/// [`contain`]. Useful for reporting entry paths without the boundary
/// prefix.
pub fn clean_relative(root: &Path, candidate: &str) -> Result<PathBuf> {
    let resolved = contain(root, candidate)?;
    Ok(resolved
        .strip_prefix(root)
        .unwrap_or(Path::new(""))
        .to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root() -> PathBuf {
        PathBuf::from("/data/tank")
    }

    #[test]
    fn contain_joins_simple_relative_paths() {
        let resolved = contain(&root(), "photos/vacation.jpg").unwrap();
        assert_eq!(resolved, PathBuf::from("/data/tank/photos/vacation.jpg"));
    }

    #[test]
    fn contain_treats_absolute_candidates_as_relative() {
        let resolved = contain(&root(), "/photos").unwrap();
        assert_eq!(resolved, PathBuf::from("/data/tank/photos"));
    }

    #[test]
    fn contain_collapses_internal_dot_dot() {
        let resolved = contain(&root(), "a/b/../c").unwrap();
        assert_eq!(resolved, PathBuf::from("/data/tank/a/c"));
    }

    #[test]
    fn contain_rejects_escaping_dot_dot() {
        assert!(matches!(
            contain(&root(), "../../etc/passwd"),
            Err(Error::Containment { .. })
        ));
        assert!(matches!(
            contain(&root(), "a/../../etc"),
            Err(Error::Containment { .. })
        ));
    }

    #[test]
    fn contain_rejects_dot_dot_after_absolute_prefix() {
        assert!(matches!(
            contain(&root(), "/../outside"),
            Err(Error::Containment { .. })
        ));
    }

    #[test]
    fn contain_empty_candidate_resolves_to_root() {
        assert_eq!(contain(&root(), "").unwrap(), root());
        assert_eq!(contain(&root(), "/").unwrap(), root());
        assert_eq!(contain(&root(), ".").unwrap(), root());
    }

    #[test]
    fn prefix_check_is_segment_wise_not_string_wise() {
        // A sibling directory sharing the root's string prefix must not pass.
        let resolved = contain(Path::new("/data"), "file").unwrap();
        assert!(resolved.starts_with("/data"));
        assert!(!PathBuf::from("/data-evil/file").starts_with("/data"));
    }

    #[test]
    fn clean_relative_strips_boundary() {
        let rel = clean_relative(&root(), "/photos/img.jpg").unwrap();
        assert_eq!(rel, PathBuf::from("photos/img.jpg"));
    }
}
