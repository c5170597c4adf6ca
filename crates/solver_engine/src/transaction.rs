//! Diffing two solved environments into an ordered set of link/unlink
//! operations. Grounded on
//! `rattler::install::transaction::Transaction::from_current_and_desired`
//! for the operation taxonomy and the noarch-python relink rule, with the
//! ordering and `force_reinstall`/unmanageable-guard behavior supplemented
//! from `conda/core/solve.py`'s `solve_for_diff`/`solve_for_transaction`.

use std::collections::HashSet;

use solver_types::{MatchSpec, PackageRecord, RecordId};

use crate::config::SolverConfig;
use crate::error::SolveError;
use crate::graph::PrefixGraph;
use crate::policy;

/// One step needed to bring a prefix from `previous` to `final`.
#[derive(Debug, Clone)]
pub enum TransactionOperation {
    /// Link a package that wasn't there before.
    Install(PackageRecord),
    /// Unlink `old`, link `new`: a version/build/channel change.
    Change { old: PackageRecord, new: PackageRecord },
    /// Unlink and relink the same record, e.g. a noarch:python package
    /// after the interpreter's major.minor changed.
    Reinstall(PackageRecord),
    /// Unlink a package that is no longer wanted.
    Remove(PackageRecord),
}

/// The ordered unlink/link plan for moving a prefix from one solved state
/// to another.
#[derive(Debug, Clone)]
pub struct TransactionDiff {
    pub operations: Vec<TransactionOperation>,
    /// Records to unlink, in reverse topological order of `previous`.
    pub unlink: Vec<PackageRecord>,
    /// Records to link, in topological order of `final`.
    pub link: Vec<PackageRecord>,
}

impl TransactionDiff {
    /// Diffs `previous` against `final_state`. `specs_to_add` drives the
    /// `force_reinstall` override; `config` supplies the unmanageable
    /// check used to reject an impossible unlink.
    pub fn compute(
        previous: Vec<PackageRecord>,
        final_state: Vec<PackageRecord>,
        specs_to_add: &[MatchSpec],
        force_reinstall: bool,
        config: &SolverConfig,
    ) -> Result<Self, SolveError> {
        let previous_graph = PrefixGraph::new(previous.clone());
        let final_graph = PrefixGraph::new(final_state.clone());

        let previous_ids: HashSet<RecordId> =
            previous.iter().map(PackageRecord::record_id).collect();
        let final_ids: HashSet<RecordId> =
            final_state.iter().map(PackageRecord::record_id).collect();

        let mut force_reinstall_ids: HashSet<RecordId> = HashSet::new();
        if force_reinstall {
            for spec in specs_to_add {
                if let Some(record) = final_state.iter().find(|r| spec.matches(r)) {
                    force_reinstall_ids.insert(record.record_id());
                }
            }
        }

        let needs_python_relink = python_relink_required(&previous, &final_state);

        let mut operations = Vec::new();
        let mut by_name_final: std::collections::HashMap<String, &PackageRecord> = final_state
            .iter()
            .map(|r| (r.name.as_normalized(), r))
            .collect();

        for record in &previous {
            let name = record.name.as_normalized();
            match by_name_final.remove(&name) {
                None => operations.push(TransactionOperation::Remove(record.clone())),
                Some(desired) => {
                    let same_identity = desired.record_id() == record.record_id();
                    if force_reinstall_ids.contains(&desired.record_id()) && same_identity {
                        operations.push(TransactionOperation::Reinstall(record.clone()));
                    } else if !same_identity {
                        operations.push(TransactionOperation::Change {
                            old: record.clone(),
                            new: desired.clone(),
                        });
                    } else if desired.noarch.is_python() && needs_python_relink {
                        operations.push(TransactionOperation::Reinstall(record.clone()));
                    }
                }
            }
        }
        let mut remaining: Vec<&PackageRecord> = by_name_final.into_values().collect();
        remaining.sort_by_key(|r| r.name.as_normalized());
        for record in remaining {
            operations.push(TransactionOperation::Install(record.clone()));
        }

        let mut unlink: Vec<PackageRecord> = previous_graph
            .topological_order()
            .into_iter()
            .rev()
            .filter(|r| {
                !final_ids.contains(&r.record_id())
                    || (needs_python_relink && r.noarch.is_python())
                    || force_reinstall_ids.contains(&r.record_id())
            })
            .collect();
        let mut link: Vec<PackageRecord> = final_graph
            .topological_order()
            .into_iter()
            .filter(|r| {
                !previous_ids.contains(&r.record_id())
                    || (needs_python_relink && r.noarch.is_python())
                    || force_reinstall_ids.contains(&r.record_id())
            })
            .collect();
        unlink.dedup_by_key(|r| r.record_id());
        link.dedup_by_key(|r| r.record_id());

        if let Some(unmanageable) = unlink.iter().find(|r| policy::is_unmanageable(r, config)) {
            return Err(SolveError::CannotUnlinkUnmanageable(vec![unmanageable.clone()]));
        }

        Ok(TransactionDiff { operations, unlink, link })
    }
}

fn python_relink_required(previous: &[PackageRecord], final_state: &[PackageRecord]) -> bool {
    let prev_python = previous.iter().find(|r| r.name.as_normalized() == "python");
    let final_python = final_state.iter().find(|r| r.name.as_normalized() == "python");
    match (prev_python, final_python) {
        (Some(a), Some(b)) => a.version.major_minor() != b.version.major_minor(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::record;

    #[test]
    fn pure_addition_only_links() {
        let previous = vec![record("python", vec![])];
        let final_state = vec![record("python", vec![]), record("flask", vec!["python"])];
        let config = SolverConfig::conda_defaults(vec![], vec![]);
        let diff = TransactionDiff::compute(previous, final_state, &[], false, &config).unwrap();
        assert!(diff.unlink.is_empty());
        assert_eq!(diff.link.len(), 1);
        assert_eq!(diff.link[0].name.as_source(), "flask");
    }

    #[test]
    fn removal_unlinks_in_reverse_topological_order() {
        let previous = vec![record("python", vec![]), record("flask", vec!["python"])];
        let final_state = vec![];
        let config = SolverConfig::conda_defaults(vec![], vec![]);
        let diff = TransactionDiff::compute(previous, final_state, &[], false, &config).unwrap();
        let names: Vec<_> = diff.unlink.iter().map(|r| r.name.as_source().to_owned()).collect();
        assert_eq!(names, vec!["flask", "python"]);
    }

    #[test]
    fn unmanageable_unlink_is_rejected() {
        let mut foreign = record("numpy", vec![]);
        foreign.subdir = "pypi".to_owned();
        let previous = vec![foreign];
        let final_state = vec![];
        let config = SolverConfig::conda_defaults(vec![], vec![]);
        let result = TransactionDiff::compute(previous, final_state, &[], false, &config);
        assert!(matches!(result, Err(SolveError::CannotUnlinkUnmanageable(_))));
    }
}
