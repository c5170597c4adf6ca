//! The mutable working state of a single solve: a plain mutable record
//! with no behavior beyond holding fields. Grounded on
//! `conda/core/solve.py`'s `SolverStateContainer` (`ssc`), which is
//! threaded through every phase method and mutated in place — kept here as
//! an explicit, named struct rather than a loosely-typed "dumping ground"
//! object.

use indexmap::{IndexMap, IndexSet};
use solver_types::{HistoryMap, MatchSpec, PackageRecord, PinnedSpecs};

/// Everything one `SolveEngine::solve_final_state` call reads and mutates
/// as it runs through phases 1-7. Constructed fresh per top-level call;
/// the `UPDATE_DEPS` recursive re-entry in phase 7 builds its own fresh
/// `SolverState` rather than reusing this one, since that path re-runs
/// `solve_final_state` from scratch rather than continuing in place.
#[derive(Debug, Clone)]
pub struct SolverState {
    /// Records currently in the prefix, as read at the start of the solve.
    /// Never mutated after construction.
    pub prefix_records: Vec<PackageRecord>,
    /// The user's historical requests, most recent per name.
    pub history: HistoryMap,
    /// Pins loaded from `conda-meta/pinned` plus configured pins.
    pub pinned_specs: PinnedSpecs,
    /// The specs this call was asked to add.
    pub specs_to_add: IndexSet<MatchSpec>,
    /// The specs this call was asked to remove.
    pub specs_to_remove: IndexSet<MatchSpec>,

    /// Name -> spec, the policy layer's working assembly. Phase 2 seeds it,
    /// phase 5 rewrites entries, phase 6 reads it to build
    /// `final_environment_specs`.
    pub specs_map: IndexMap<String, MatchSpec>,
    /// The working solution: starts as `prefix_records`, mutated by
    /// removal, inconsistency repair, and the SAT result.
    pub solution_precs: Vec<PackageRecord>,
    /// Names whose installed record was dropped from `solution_precs` as
    /// inconsistent, paired with the spec that was in force for them
    /// before the drop (`None` if there wasn't one).
    pub add_back_map: IndexMap<String, (PackageRecord, Option<MatchSpec>)>,
    /// Names phase 6 determined are genuinely in conflict, used by
    /// `should_freeze` and the pinned-spec overlay.
    pub conflict_specs: IndexSet<String>,
    /// The final per-name specs, narrowed relative to history, that phase 6
    /// produces for the caller's diagnostics.
    pub neutered_specs: IndexMap<String, MatchSpec>,
}

impl SolverState {
    /// Seeds a fresh state from the installed prefix and the user's
    /// request. `solution_precs` starts as a copy of `prefix_records`;
    /// every other derived field starts empty and is filled in by the
    /// engine's phases.
    pub fn new(
        prefix_records: Vec<PackageRecord>,
        history: HistoryMap,
        pinned_specs: PinnedSpecs,
        specs_to_add: IndexSet<MatchSpec>,
        specs_to_remove: IndexSet<MatchSpec>,
    ) -> Self {
        let solution_precs = prefix_records.clone();
        SolverState {
            prefix_records,
            history,
            pinned_specs,
            specs_to_add,
            specs_to_remove,
            specs_map: IndexMap::new(),
            solution_precs,
            add_back_map: IndexMap::new(),
            conflict_specs: IndexSet::new(),
            neutered_specs: IndexMap::new(),
        }
    }

    /// The record currently installed under `name`, if any.
    pub fn installed(&self, name: &str) -> Option<&PackageRecord> {
        self.prefix_records
            .iter()
            .find(|r| r.name.as_normalized() == name.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_with_solution_equal_to_prefix() {
        let record = crate::test_support::record("numpy", vec![]);
        let state = SolverState::new(
            vec![record.clone()],
            HistoryMap::new(),
            PinnedSpecs::from_specs(vec![]),
            IndexSet::new(),
            IndexSet::new(),
        );
        assert_eq!(state.solution_precs, vec![record]);
        assert!(state.specs_map.is_empty());
    }

    #[test]
    fn installed_looks_up_by_normalized_name() {
        let record = crate::test_support::record("NumPy", vec![]);
        let state = SolverState::new(
            vec![record],
            HistoryMap::new(),
            PinnedSpecs::from_specs(vec![]),
            IndexSet::new(),
            IndexSet::new(),
        );
        assert!(state.installed("numpy").is_some());
    }
}
