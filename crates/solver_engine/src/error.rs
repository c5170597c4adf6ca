//! The orchestration-level error taxonomy. Grounded on
//! `rattler_solve::SolveError`'s `thiserror` style and the exception
//! classes `conda/core/solve.py` raises (`PackagesNotFoundError`,
//! `UnsatisfiableError`, `SpecsConfigurationConflictError`).

use solver_types::{MatchSpec, PackageRecord};

/// Every way `SolveEngine::solve_final_state` (and its callers) can fail.
#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    /// A spec had zero matching candidates anywhere in the index.
    #[error("packages not found: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    PackagesNotFound(Vec<MatchSpec>),

    /// The SAT call rejected the final spec assembly. `conflict_chain` is a
    /// best-effort, human-readable description of which specs participated.
    #[error("unsatisfiable: {}", .conflict_chain.join(" -> "))]
    Unsatisfiable { conflict_chain: Vec<String> },

    /// A backend that cannot produce a structured conflict chain reported
    /// failure as free text instead.
    #[error("unsatisfiable: {0}")]
    RawStrUnsatisfiable(String),

    /// A pinned spec conflicts with what the user explicitly asked for.
    #[error(
        "pinned specs conflict with requested specs in {prefix}: requested [{}], pinned [{}]",
        .user_specs.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "),
        .pinned_specs.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    )]
    SpecsConfigurationConflict {
        user_specs: Vec<MatchSpec>,
        pinned_specs: Vec<MatchSpec>,
        prefix: String,
    },

    /// A required unlink targets a record installed outside this package
    /// manager's own bookkeeping (e.g. a foreign `pip install`).
    #[error(
        "cannot unlink unmanageable record(s): {}",
        .0.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", ")
    )]
    CannotUnlinkUnmanageable(Vec<PackageRecord>),

    /// An invariant the orchestration phases rely on did not hold — e.g.
    /// two records matched a single spec slot, or a name appeared twice in
    /// `solution_precs`. Always a defect in the caller or this crate, never
    /// a legitimate user-facing conflict.
    #[error("internal invariant violated: {0}")]
    InternalInvariantViolated(String),

    /// A combination of inputs this engine deliberately does not support,
    /// e.g. simultaneous `force_remove` and non-empty `specs_to_add`.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl From<solver_pool::SolveError> for SolveError {
    fn from(err: solver_pool::SolveError) -> Self {
        match err {
            solver_pool::SolveError::Unsatisfiable(chain) => {
                SolveError::Unsatisfiable { conflict_chain: chain }
            }
            solver_pool::SolveError::UnknownName(name) => {
                SolveError::RawStrUnsatisfiable(format!("unknown package name `{name}`"))
            }
        }
    }
}
