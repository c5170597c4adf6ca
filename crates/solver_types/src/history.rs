//! The user's request history: every spec a user has ever explicitly asked
//! to add, in the order they asked. Grounded on
//! `rattler_conda_types::prefix_record`'s `PrefixRecord`-adjacent history
//! parsing in `rattler`'s `history` module, trimmed to the in-memory shape
//! a solver actually needs — reading the on-disk history file format is out
//! of scope.

use indexmap::IndexMap;

use crate::match_spec::MatchSpec;

/// User-requested specs, keyed by package name, most-recent request per
/// name retained. This is what `conda/core/solve.py` calls
/// `specs_from_history_map`: the set of specs the solver must keep
/// satisfied unless the user explicitly removes them.
#[derive(Debug, Clone, Default)]
pub struct HistoryMap {
    entries: IndexMap<String, MatchSpec>,
}

impl HistoryMap {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that the user asked for `spec`, overwriting any earlier
    /// request for the same name so only the latest request is kept.
    pub fn record(&mut self, spec: MatchSpec) {
        if let Some(name) = spec.name_str() {
            self.entries.insert(name.to_ascii_lowercase(), spec);
        }
    }

    /// Forgets any history entry for `name`, used when the user explicitly
    /// removes a package.
    pub fn forget(&mut self, name: &str) {
        self.entries.shift_remove(&name.to_ascii_lowercase());
    }

    /// The most recent spec the user requested for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&MatchSpec> {
        self.entries.get(&name.to_ascii_lowercase())
    }

    /// All historical specs, in the order they were first requested.
    pub fn specs(&self) -> impl Iterator<Item = &MatchSpec> {
        self.entries.values()
    }

    /// True if the user has ever explicitly requested `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn record_then_forget_round_trips() {
        let mut history = HistoryMap::new();
        history.record(MatchSpec::from_str("flask >=2.0").unwrap());
        assert!(history.contains("flask"));
        history.forget("Flask");
        assert!(!history.contains("flask"));
    }

    #[test]
    fn later_request_overwrites_earlier_one() {
        let mut history = HistoryMap::new();
        history.record(MatchSpec::from_str("flask >=1.0").unwrap());
        history.record(MatchSpec::from_str("flask >=2.0").unwrap());
        assert_eq!(history.specs().count(), 1);
        assert_eq!(history.get("flask").unwrap().to_string(), "flask >=2.0");
    }
}
