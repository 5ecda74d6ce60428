//! System-junk ignore list for snapshot browsing.

/// File names hidden by default in snapshot directory listings.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    ".DS_Store",
    ".Thumbs.db",
    "desktop.ini",
    ".Spotlight-V100",
    ".fseventsd",
    ".Trashes",
    ".TemporaryItems",
    "@eaDir",
    ".synology_working",
    "#recycle",
    ".stversions",
];

/// Returns true if `name` matches the default ignore list or any of the
/// caller-supplied patterns. Matching is case-insensitive; a pattern of the
/// form `*.ext` matches by suffix, anything else matches exactly.
pub fn should_ignore(name: &str, custom_patterns: &[String]) -> bool {
    let defaults = DEFAULT_IGNORE_PATTERNS.iter().copied();
    let custom = custom_patterns.iter().map(String::as_str);

    for pattern in defaults.chain(custom) {
        if name.eq_ignore_ascii_case(pattern) {
            return true;
        }
        if let Some(ext) = pattern.strip_prefix('*') {
            if pattern.starts_with("*.") && name.to_lowercase().ends_with(&ext.to_lowercase()) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_junk_is_ignored() {
        assert!(should_ignore(".DS_Store", &[]));
        assert!(should_ignore("#recycle", &[]));
        assert!(should_ignore("@eaDir", &[]));
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert!(should_ignore(".ds_store", &[]));
        assert!(should_ignore("DESKTOP.INI", &[]));
    }

    #[test]
    fn regular_files_pass() {
        assert!(!should_ignore("vacation.jpg", &[]));
        assert!(!should_ignore("README.md", &[]));
    }

    #[test]
    fn custom_exact_patterns_apply() {
        let custom = vec!["node_modules".to_string()];
        assert!(should_ignore("node_modules", &custom));
        assert!(!should_ignore("node_modules.bak", &custom));
    }

    #[test]
    fn custom_suffix_globs_apply() {
        let custom = vec!["*.tmp".to_string()];
        assert!(should_ignore("scratch.tmp", &custom));
        assert!(should_ignore("SCRATCH.TMP", &custom));
        assert!(!should_ignore("scratch.tmpl", &custom));
    }
}
