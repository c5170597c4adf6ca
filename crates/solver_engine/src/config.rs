//! Immutable configuration passed into [`crate::SolveEngine::new`].
//!
//! `conda/core/solve.py` reads most of this from a process-wide `context`
//! singleton (`context.aggressive_update_packages`,
//! `context.pinned_packages`, and so on). That global is deliberately not
//! reproduced here: every value the engine needs is gathered once, by the
//! caller, and handed in explicitly.

use indexmap::IndexSet;

/// Context a [`crate::SolveEngine`] needs beyond the specs it is asked to
/// solve. Construct once per solve; nothing here is mutated during a
/// solve.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Ordered channels, highest priority first. Carried through for
    /// diagnostics; channel fetching itself is out of scope here.
    pub channels: Vec<String>,
    /// Platform subdirectories considered, e.g. `["linux-64", "noarch"]`.
    pub subdirs: Vec<String>,
    /// Package names that should float to the newest compatible version
    /// even without an explicit user request, the moment they appear in
    /// the prefix.
    pub aggressive_update_packages: IndexSet<String>,
    /// The package name this solve engine instance considers "itself": the
    /// conda-self rule generalized to any self-hosting package manager, not
    /// just conda. `None` disables the rule.
    pub self_package: Option<String>,
    /// When set, pinned specs are not applied at all, as if
    /// `ignore_pinned` had been passed for this entire solve.
    pub ignore_pinned: bool,
    /// Subdir value used to mark a record as installed outside the
    /// package manager's own channels (a "foreign install" marker, e.g.
    /// packages `pip` installed inside a conda prefix).
    pub foreign_install_subdir: String,
}

impl SolverConfig {
    /// A config with conda's own defaults: the sticky-adjacent
    /// aggressive-update set conda ships (`ca-certificates`,
    /// `certifi`, `openssl`), `self_package = "conda"`, foreign marker
    /// `"pypi"`.
    pub fn conda_defaults(channels: Vec<String>, subdirs: Vec<String>) -> Self {
        SolverConfig {
            channels,
            subdirs,
            aggressive_update_packages: ["ca-certificates", "certifi", "openssl"]
                .into_iter()
                .map(str::to_owned)
                .collect(),
            self_package: Some("conda".to_owned()),
            ignore_pinned: false,
            foreign_install_subdir: "pypi".to_owned(),
        }
    }

    /// True if `name` is in the aggressive-update set.
    pub fn is_aggressive_update(&self, name: &str) -> bool {
        self.aggressive_update_packages
            .iter()
            .any(|n| n.eq_ignore_ascii_case(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggressive_update_membership_is_case_insensitive() {
        let config = SolverConfig::conda_defaults(vec![], vec![]);
        assert!(config.is_aggressive_update("OpenSSL"));
        assert!(!config.is_aggressive_update("flask"));
    }
}
