//! The flags a caller passes into [`crate::SolveEngine::solve_final_state`].
//! Grounded on `conda/core/solve.py`'s `UpdateModifier`/`DepsModifier`
//! enums and the `Command` values `conda/cli` dispatches with.

/// How aggressively the solve should move installed packages off their
/// current version.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum UpdateModifier {
    /// Default behavior: satisfy new specs, leave everything else alone
    /// unless a conflict forces a change.
    #[default]
    None,
    /// If `specs_to_add` are already satisfied and nothing needs removing
    /// or pruning, return the current prefix unchanged without invoking
    /// the resolver at all.
    SpecsSatisfiedSkipSolve,
    /// Pin every currently installed record exactly, then solve only for
    /// the new specs on top.
    FreezeInstalled,
    /// Let requested specs float up to their newest compatible version;
    /// everything else stays pinned unless a conflict forces otherwise.
    UpdateSpecs,
    /// Let every historically requested spec float to its newest
    /// compatible version.
    UpdateAll,
    /// Additionally update the transitive dependencies of the requested
    /// specs, not just the specs themselves.
    UpdateDeps,
}

/// How the solve should treat a requested spec's dependencies.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum DepsModifier {
    /// No special handling.
    #[default]
    NotSet,
    /// Install only the requested specs, dropping any dependency that is
    /// not itself requested or otherwise needed.
    NoDeps,
    /// Remove the requested specs themselves once their dependencies are
    /// installed, keeping only what they pulled in.
    OnlyDeps,
    /// Update the dependencies of the requested specs (interacts with
    /// [`UpdateModifier::UpdateDeps`]; `phase7_post_solve` settles the
    /// ordering between the two).
    UpdateDeps,
    /// `OnlyDeps` combined with `UpdateDeps`.
    UpdateDepsOnlyDeps,
    /// Treat every currently installed record as frozen while still
    /// expanding the requested spec's dependency set.
    FreezeInstalled,
}

/// What higher-level operation triggered this solve. Recorded for
/// diagnostics only; the orchestration phases do not branch on it except
/// for the short-circuit `force_remove` interaction in phase 1.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Command {
    /// Installing new specs into an existing or fresh prefix.
    Install,
    /// Updating already-installed packages.
    Update,
    /// Removing packages from a prefix.
    Remove,
    /// Creating a brand new prefix.
    Create,
}
