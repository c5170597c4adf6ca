//! Small pure decision functions shared across phases. Grounded on
//! `conda/core/solve.py`'s `_should_freeze`, `get_major_minor_version`,
//! and the hardcoded sticky-package list at the top of that file.

use indexmap::IndexSet;
use solver_types::{MatchSpec, PackageRecord};

/// Package names `conda/core/solve.py` always keeps a bare spec for, so
/// the solver notices drift in them even when the user never asked for
/// them directly.
pub const STICKY_PACKAGES: &[&str] = &[
    "anaconda",
    "conda",
    "conda-build",
    "python.app",
    "console_shortcut",
    "powershell_shortcut",
];

/// True if `name` is one of [`STICKY_PACKAGES`].
pub fn is_sticky(name: &str) -> bool {
    STICKY_PACKAGES.iter().any(|n| n.eq_ignore_ascii_case(name))
}

/// The first two dot-separated segments of a version string, e.g.
/// `"3.11.4"` -> `"3.11"`. Thin wrapper so callers don't need to reach
/// into `solver_types::Version` directly for this one policy rule.
pub fn get_major_minor(version: &solver_types::Version) -> Option<&str> {
    version.major_minor()
}

/// Whether a record should be pinned exactly because `FREEZE_INSTALLED`
/// is in effect for it specifically.
///
/// `history_nonempty` is whether the user has ever requested anything;
/// `conflict_specs` and `explicit_pool` are keyed by normalized name.
pub fn should_freeze(
    record: &PackageRecord,
    name: &str,
    history_nonempty: bool,
    freeze_installed: bool,
    conflict_specs: &IndexSet<String>,
    explicit_pool: &indexmap::IndexMap<String, Vec<PackageRecord>>,
) -> bool {
    if !history_nonempty || !freeze_installed {
        return false;
    }
    let normalized = name.to_ascii_lowercase();
    if conflict_specs.contains(&normalized) {
        return false;
    }
    match explicit_pool.get(&normalized) {
        None => true,
        Some(candidates) => candidates.iter().any(|r| r.record_id() == record.record_id()),
    }
}

/// Builds the fully-pinned spec `to_match_spec_for` produces, re-exported
/// here since every phase-5 branch needs it by the same name the
/// orchestration script uses (`to_match_spec`).
pub fn to_match_spec(record: &PackageRecord) -> MatchSpec {
    MatchSpec::to_match_spec_for(record)
}

/// True if `record` was installed by something other than this package
/// manager (feeds the `CannotUnlinkUnmanageable` guard). The record's own
/// `is_unmanageable` flag is authoritative; a record sitting in the
/// foreign-install subdir (the "pypi" marker) is unmanageable too even if
/// the flag itself was left unset by an index that doesn't track it.
pub fn is_unmanageable(record: &PackageRecord, config: &crate::config::SolverConfig) -> bool {
    record.is_unmanageable || record.subdir.eq_ignore_ascii_case(&config.foreign_install_subdir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn record(name: &str) -> PackageRecord {
        PackageRecord {
            name: solver_types::PackageName::new_unchecked(name),
            version: solver_types::Version::from_str("1.0.0").unwrap(),
            build_string: "0".to_owned(),
            build_number: 0,
            channel: "conda-forge".to_owned(),
            subdir: "linux-64".to_owned(),
            depends: Vec::new(),
            constrains: Vec::new(),
            features: Vec::new(),
            track_features: Vec::new(),
            noarch: solver_types::NoArchType::None,
            timestamp: None,
            is_unmanageable: false,
        }
    }

    #[test]
    fn sticky_list_is_case_insensitive() {
        assert!(is_sticky("CONDA"));
        assert!(!is_sticky("flask"));
    }

    #[test]
    fn should_freeze_false_without_history() {
        let record = record("numpy");
        let empty_set = IndexSet::new();
        let empty_pool = indexmap::IndexMap::new();
        assert!(!should_freeze(&record, "numpy", false, true, &empty_set, &empty_pool));
    }

    #[test]
    fn should_freeze_false_when_conflicting() {
        let record = record("numpy");
        let mut conflicts = IndexSet::new();
        conflicts.insert("numpy".to_owned());
        let empty_pool = indexmap::IndexMap::new();
        assert!(!should_freeze(&record, "numpy", true, true, &conflicts, &empty_pool));
    }

    #[test]
    fn should_freeze_true_when_frozen_and_not_conflicting() {
        let record = record("numpy");
        let empty_set = IndexSet::new();
        let empty_pool = indexmap::IndexMap::new();
        assert!(should_freeze(&record, "numpy", true, true, &empty_set, &empty_pool));
    }
}
