//! The SAT façade: everything the orchestration engine in `solver_engine`
//! needs from a concrete satisfiability solver, behind a trait boundary so
//! the underlying SAT algorithm stays swappable. Grounded on
//! `rattler_solve::SolverBackend` for the trait-seam idea, and on
//! `conda/core/solve.py`'s `Resolver` usage for the exact method contract
//! (that orchestration module expects a richer surface than
//! `rattler_solve` exposes — pool introspection, conflict diagnosis — so
//! the trait here is modeled after the Python `conda.resolve.Resolver`
//! class that file drives, not after `rattler_solve` directly).

mod resolvo_backend;
mod sorting;

pub use resolvo_backend::ResolvoResolver;

use solver_types::{MatchSpec, PackageName, PackageRecord};

/// An error produced while resolving a set of specs.
#[derive(Debug, thiserror::Error)]
pub enum SolveError {
    /// No assignment of candidates satisfies every spec. Carries a
    /// best-effort, human-readable conflict chain.
    #[error("could not satisfy: {}", .0.join(", "))]
    Unsatisfiable(Vec<String>),
    /// A candidate referenced a package name with zero known records; this
    /// indicates a gap in the supplied index rather than an unsatisfiable
    /// constraint.
    #[error("unknown package name `{0}`")]
    UnknownName(String),
}

/// The SAT façade a [`crate::ResolvoResolver`] (or any other backend)
/// implements.
pub trait Resolver {
    /// Candidates for `name`, sorted by channel priority, then version
    /// descending, then build number descending.
    fn groups(&self, name: &PackageName) -> Vec<PackageRecord>;

    /// Candidates matching `spec`.
    fn find_matches(&self, spec: &MatchSpec) -> Vec<PackageRecord>;

    /// The transitive closure of candidates reachable from `specs`,
    /// grouped by name.
    fn get_package_pool(&self, specs: &[MatchSpec]) -> Vec<(String, Vec<PackageRecord>)>;

    /// Splits `records` into the subset whose declared dependencies are
    /// satisfiable by other records in the same set, and the subset that
    /// is not. `specs` are the constraints those records must additionally
    /// honor (history/pinned specs still in force).
    fn bad_installed(
        &self,
        records: &[PackageRecord],
        specs: &[MatchSpec],
    ) -> (Vec<PackageRecord>, Vec<PackageRecord>);

    /// A minimal-ish subset of `all_specs` that, together with
    /// `specs_to_add`, cannot be satisfied simultaneously. Empty if the
    /// whole set is satisfiable.
    fn get_conflicting_specs(&self, all_specs: &[MatchSpec], specs_to_add: &[MatchSpec])
        -> Vec<MatchSpec>;

    /// Runs the SAT search. `should_retry` signals the caller is willing
    /// to neuter specs and retry on failure; a backend may use it to
    /// decide how much effort to spend producing a detailed conflict
    /// chain versus failing fast. Deterministic for identical inputs.
    fn solve(
        &self,
        final_specs: &[MatchSpec],
        specs_to_add: &[MatchSpec],
        history_specs: &[MatchSpec],
        should_retry: bool,
    ) -> Result<Vec<PackageRecord>, SolveError>;

    /// Fails with a user-facing unsatisfiability report if `specs` cannot
    /// all hold simultaneously; succeeds silently otherwise.
    fn find_conflicts(&self, specs: &[MatchSpec]) -> Result<(), SolveError>;
}
