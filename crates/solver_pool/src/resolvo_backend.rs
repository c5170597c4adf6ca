//! Concrete [`crate::Resolver`] backed by the real `resolvo` SAT engine.
//! Grounded on `rattler_solve::resolvo::mod.rs`'s `CondaDependencyProvider`
//! and `Solver` — the raw SAT algorithm itself stays out of scope and
//! entirely inside the `resolvo` crate; this module only adapts its
//! `DependencyProvider` seam to `solver_types`.
//!
//! One deliberate simplification versus `rattler_solve`: candidates are held
//! behind `Rc` rather than borrowed references, trading a little memory for
//! dropping the extra lifetime parameter `CondaDependencyProvider<'a>`
//! carries there. The indexes this crate solves over are orders of
//! magnitude smaller than a full channel's repodata, so the clone cost is
//! immaterial.

use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use itertools::Itertools;
use resolvo::{
    Candidates, Dependencies, DependencyProvider, NameId, Pool, SolvableDisplay, SolvableId,
    Solver as ResolvoSolver, SolverCache, VersionSet, VersionSetId,
};

use solver_types::{
    GenericVirtualPackage, Index, MatchSpec, PackageName, PackageRecord, RecordId, Version,
};

use crate::sorting;
use crate::{SolveError, Resolver};

/// Wraps a [`MatchSpec`] so it can serve as `resolvo`'s `VersionSet`.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub(crate) struct SolverMatchSpec(MatchSpec);

impl fmt::Display for SolverMatchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl VersionSet for SolverMatchSpec {
    type V = SolverPackageRecord;

    fn contains(&self, v: &Self::V) -> bool {
        match v {
            SolverPackageRecord::Record(rec) => self.0.matches(rec),
            SolverPackageRecord::VirtualPackage(vp) => {
                if let Some(name) = self.0.name_str() {
                    if !name.eq_ignore_ascii_case(vp.name.as_normalized().as_str()) {
                        return false;
                    }
                }
                if let Some(version_spec) = &self.0.version {
                    if !version_spec.matches(&vp.version) {
                        return false;
                    }
                }
                if let Some(build) = &self.0.build {
                    if build != &vp.build_string {
                        return false;
                    }
                }
                true
            }
        }
    }
}

/// A resolvo solvable: either a real candidate or a platform-provided
/// virtual package.
#[derive(Debug, Clone)]
pub(crate) enum SolverPackageRecord {
    /// A record sourced from the index passed to [`ResolvoResolver::new`].
    Record(Rc<PackageRecord>),
    /// A platform capability the solver may depend on but never installs.
    VirtualPackage(Rc<GenericVirtualPackage>),
}

impl SolverPackageRecord {
    pub(crate) fn version(&self) -> &Version {
        match self {
            SolverPackageRecord::Record(rec) => &rec.version,
            SolverPackageRecord::VirtualPackage(vp) => &vp.version,
        }
    }

    pub(crate) fn track_features(&self) -> &[String] {
        const EMPTY: &[String] = &[];
        match self {
            SolverPackageRecord::Record(rec) => &rec.track_features,
            SolverPackageRecord::VirtualPackage(_) => EMPTY,
        }
    }

    pub(crate) fn build_number(&self) -> u64 {
        match self {
            SolverPackageRecord::Record(rec) => rec.build_number,
            SolverPackageRecord::VirtualPackage(_) => 0,
        }
    }

    pub(crate) fn timestamp(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        match self {
            SolverPackageRecord::Record(rec) => rec.timestamp,
            SolverPackageRecord::VirtualPackage(_) => None,
        }
    }

    fn as_record(&self) -> Option<&PackageRecord> {
        match self {
            SolverPackageRecord::Record(rec) => Some(rec),
            SolverPackageRecord::VirtualPackage(_) => None,
        }
    }
}

impl fmt::Display for SolverPackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverPackageRecord::Record(rec) => write!(f, "{rec}"),
            SolverPackageRecord::VirtualPackage(vp) => {
                write!(f, "{} {}", vp.name, vp.version)
            }
        }
    }
}

impl PartialEq for SolverPackageRecord {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SolverPackageRecord::Record(a), SolverPackageRecord::Record(b)) => {
                a.record_id() == b.record_id()
            }
            (SolverPackageRecord::VirtualPackage(a), SolverPackageRecord::VirtualPackage(b)) => {
                a.name == b.name && a.version == b.version
            }
            _ => false,
        }
    }
}

impl Eq for SolverPackageRecord {}

impl PartialOrd for SolverPackageRecord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SolverPackageRecord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.version()
            .cmp(other.version())
            .then_with(|| self.build_number().cmp(&other.build_number()))
    }
}

/// Feeds `resolvo` candidates and dependency expansions sourced from a
/// [`solver_types::Index`]. Constructed fresh for every [`ResolvoResolver`]
/// call so the pool only ever contains the names relevant to that call's
/// root requirements and their transitive dependencies.
#[derive(Default)]
pub(crate) struct ResolvoDependencyProvider {
    pool: Pool<SolverMatchSpec, String>,
    records: HashMap<NameId, Candidates>,
    match_spec_highest_version: RefCell<HashMap<VersionSetId, Option<(Version, bool)>>>,
    parse_cache: RefCell<HashMap<String, VersionSetId>>,
}

impl ResolvoDependencyProvider {
    /// `favored`/`locked` are the records a `MatchSpec::target` points at,
    /// split into a soft preference and a hard one the way
    /// `CondaDependencyProvider::from_solver_task` splits `locked_packages`
    /// from `pinned_packages`.
    fn from_index(
        index: &Index,
        virtual_packages: &[GenericVirtualPackage],
        favored: &HashSet<RecordId>,
        locked: &HashSet<RecordId>,
    ) -> Self {
        let pool = Pool::default();
        let mut records: HashMap<NameId, Candidates> = HashMap::default();

        for vp in virtual_packages {
            let name = pool.intern_package_name(vp.name.as_normalized());
            let solvable = pool.intern_solvable(
                name,
                SolverPackageRecord::VirtualPackage(Rc::new(vp.clone())),
            );
            records.entry(name).or_default().candidates.push(solvable);
        }

        for package_name in index.names() {
            let name = pool.intern_package_name(package_name.to_ascii_lowercase());
            let candidates = records.entry(name).or_default();
            for record in index.records_for(&PackageName::from(package_name)) {
                let solvable = pool.intern_solvable(
                    name,
                    SolverPackageRecord::Record(Rc::new(record.clone())),
                );
                candidates.candidates.push(solvable);
                candidates.hint_dependencies_available.push(solvable);
                let id = record.record_id();
                if locked.contains(&id) {
                    candidates.locked = Some(solvable);
                } else if favored.contains(&id) {
                    candidates.favored = Some(solvable);
                }
            }
        }

        Self {
            pool,
            records,
            match_spec_highest_version: RefCell::default(),
            parse_cache: RefCell::default(),
        }
    }

    fn intern_spec(&self, spec_str: &str) -> Result<VersionSetId, SolveError> {
        if let Some(id) = self.parse_cache.borrow().get(spec_str) {
            return Ok(*id);
        }
        let spec = MatchSpec::from_str(spec_str)
            .map_err(|_| SolveError::UnknownName(spec_str.to_owned()))?;
        let name = spec
            .name_str()
            .ok_or_else(|| SolveError::UnknownName(spec_str.to_owned()))?;
        let name_id = self.pool.intern_package_name(name.to_ascii_lowercase());
        let version_set_id = self.pool.intern_version_set(name_id, SolverMatchSpec(spec));
        self.parse_cache
            .borrow_mut()
            .insert(spec_str.to_owned(), version_set_id);
        Ok(version_set_id)
    }
}

impl DependencyProvider<SolverMatchSpec> for ResolvoDependencyProvider {
    fn pool(&self) -> &Pool<SolverMatchSpec, String> {
        &self.pool
    }

    fn sort_candidates(
        &self,
        solver: &SolverCache<SolverMatchSpec, String, Self>,
        solvables: &mut [SolvableId],
    ) {
        let mut highest = self.match_spec_highest_version.borrow_mut();
        solvables.sort_by(|&a, &b| sorting::compare_candidates(a, b, solver, &mut highest));
    }

    fn get_candidates(&self, name: NameId) -> Option<Candidates> {
        self.records.get(&name).cloned()
    }

    fn get_dependencies(&self, solvable: SolvableId) -> Dependencies {
        let mut dependencies = Dependencies::default();
        let Some(record) = self.pool.resolve_solvable(solvable).inner().as_record() else {
            return dependencies;
        };
        for depends in &record.depends {
            match self.intern_spec(depends) {
                Ok(id) => dependencies.requirements.push(id),
                Err(_) => continue,
            }
        }
        for constrains in &record.constrains {
            match self.intern_spec(constrains) {
                Ok(id) => dependencies.constrains.push(id),
                Err(_) => continue,
            }
        }
        dependencies
    }
}

struct ConflictDisplay;

impl SolvableDisplay<SolverMatchSpec> for ConflictDisplay {
    fn display_candidates(
        &self,
        pool: &Pool<SolverMatchSpec, String>,
        merged_candidates: &[SolvableId],
    ) -> String {
        merged_candidates
            .iter()
            .map(|&id| pool.resolve_solvable(id).inner().version())
            .sorted()
            .map(ToString::to_string)
            .join(" | ")
    }
}

/// A [`crate::Resolver`] implemented on top of the real `resolvo` crate.
pub struct ResolvoResolver {
    index: Index,
    virtual_packages: Vec<GenericVirtualPackage>,
}

impl ResolvoResolver {
    /// Builds a resolver over every record in `index`, with `virtual_packages`
    /// available as extra, unremovable candidates.
    pub fn new(index: Index, virtual_packages: Vec<GenericVirtualPackage>) -> Self {
        ResolvoResolver {
            index,
            virtual_packages,
        }
    }

    fn intern_roots(
        &self,
        provider: &ResolvoDependencyProvider,
        specs: &[MatchSpec],
    ) -> Vec<VersionSetId> {
        specs
            .iter()
            .filter_map(|spec| {
                let name = spec.name_str()?;
                let name_id = provider.pool.intern_package_name(name.to_ascii_lowercase());
                Some(
                    provider
                        .pool
                        .intern_version_set(name_id, SolverMatchSpec(spec.clone())),
                )
            })
            .collect()
    }

    /// Resolves a [`MatchSpec::target`] (a `RecordId::to_string()` hint) back
    /// to the record it names.
    fn resolve_target(&self, target: &str) -> Option<PackageRecord> {
        self.index.names().find_map(|name| {
            self.index
                .records_for(&PackageName::from(name))
                .find(|record| record.record_id().to_string() == target)
                .cloned()
        })
    }

    /// Splits `final_specs` into the favored/locked record identities a
    /// [`MatchSpec::target`] names, by its `optional` strength.
    fn target_sets(&self, final_specs: &[MatchSpec]) -> (HashSet<RecordId>, HashSet<RecordId>) {
        let mut favored = HashSet::new();
        let mut locked = HashSet::new();
        for spec in final_specs {
            let Some(target) = spec.target.as_deref() else {
                continue;
            };
            let Some(record) = self.resolve_target(target) else {
                continue;
            };
            if spec.optional {
                locked.insert(record.record_id());
            } else {
                favored.insert(record.record_id());
            }
        }
        (favored, locked)
    }
}

impl Resolver for ResolvoResolver {
    fn groups(&self, name: &PackageName) -> Vec<PackageRecord> {
        let mut records: Vec<PackageRecord> = self.index.records_for(name).cloned().collect();
        records.extend(
            self.virtual_packages
                .iter()
                .filter(|vp| vp.name == *name)
                .cloned()
                .map(GenericVirtualPackage::into_record),
        );
        records.sort_by(sorting::compare_records);
        records
    }

    fn find_matches(&self, spec: &MatchSpec) -> Vec<PackageRecord> {
        let Some(name) = spec.name_str() else {
            return Vec::new();
        };
        self.groups(&PackageName::from(name))
            .into_iter()
            .filter(|record| spec.matches(record))
            .collect()
    }

    fn get_package_pool(&self, specs: &[MatchSpec]) -> Vec<(String, Vec<PackageRecord>)> {
        let mut seen = std::collections::HashSet::new();
        let mut queue: Vec<String> = specs
            .iter()
            .filter_map(|s| s.name_str().map(str::to_owned))
            .collect();
        let mut pool: indexmap::IndexMap<String, Vec<PackageRecord>> = indexmap::IndexMap::new();

        while let Some(name) = queue.pop() {
            let normalized = name.to_ascii_lowercase();
            if !seen.insert(normalized.clone()) {
                continue;
            }
            let records = self.groups(&PackageName::from(name.as_str()));
            for record in &records {
                for dep in &record.depends {
                    queue.push(solver_types::package_name_from_expression(dep).to_owned());
                }
            }
            pool.insert(normalized, records);
        }
        pool.into_iter().collect()
    }

    fn bad_installed(
        &self,
        records: &[PackageRecord],
        specs: &[MatchSpec],
    ) -> (Vec<PackageRecord>, Vec<PackageRecord>) {
        let present: std::collections::HashSet<String> = records
            .iter()
            .map(|r| r.name.as_normalized())
            .chain(specs.iter().filter_map(|s| s.name_str()).map(str::to_ascii_lowercase))
            .chain(self.virtual_packages.iter().map(|vp| vp.name.as_normalized()))
            .collect();

        let mut ok = Vec::new();
        let mut bad = Vec::new();
        for record in records {
            let satisfiable = record.depends.iter().all(|dep| {
                let dep_name = solver_types::package_name_from_expression(dep).to_ascii_lowercase();
                if !present.contains(&dep_name) {
                    return false;
                }
                MatchSpec::from_str(dep)
                    .map(|spec| {
                        records.iter().any(|candidate| spec.matches(candidate))
                            || self
                                .virtual_packages
                                .iter()
                                .any(|vp| spec.matches(&vp.clone().into_record()))
                    })
                    .unwrap_or(false)
            });
            if satisfiable {
                ok.push(record.clone());
            } else {
                bad.push(record.clone());
            }
        }
        (ok, bad)
    }

    fn get_conflicting_specs(
        &self,
        all_specs: &[MatchSpec],
        specs_to_add: &[MatchSpec],
    ) -> Vec<MatchSpec> {
        let mut combined = all_specs.to_vec();
        combined.extend(specs_to_add.iter().cloned());
        if self.find_conflicts(&combined).is_ok() {
            return Vec::new();
        }
        // Minimal-ish: drop specs one at a time and keep whichever removal
        // restores satisfiability, mirroring conda's iterative relaxation
        // rather than a full minimal-unsat-core search.
        let mut conflicting = Vec::new();
        for (idx, _) in combined.iter().enumerate() {
            let mut probe = combined.clone();
            let removed = probe.remove(idx);
            if self.find_conflicts(&probe).is_ok() {
                conflicting.push(removed);
            }
        }
        conflicting
    }

    #[tracing::instrument(level = "debug", skip_all, fields(num_specs = final_specs.len()))]
    fn solve(
        &self,
        final_specs: &[MatchSpec],
        _specs_to_add: &[MatchSpec],
        _history_specs: &[MatchSpec],
        _should_retry: bool,
    ) -> Result<Vec<PackageRecord>, SolveError> {
        let (favored, locked) = self.target_sets(final_specs);
        let provider =
            ResolvoDependencyProvider::from_index(&self.index, &self.virtual_packages, &favored, &locked);
        let roots = self.intern_roots(&provider, final_specs);
        let mut solver = ResolvoSolver::new(provider);
        let solvables = solver.solve(roots).map_err(|problem| {
            let message = problem
                .display_user_friendly(&solver, &ConflictDisplay)
                .to_string();
            tracing::debug!(%message, "resolvo reported unsatisfiable request");
            SolveError::Unsatisfiable(vec![message])
        })?;
        Ok(solvables
            .into_iter()
            .filter_map(|id| match solver.pool().resolve_solvable(id).inner() {
                SolverPackageRecord::Record(rec) => Some((**rec).clone()),
                SolverPackageRecord::VirtualPackage(_) => None,
            })
            .collect())
    }

    fn find_conflicts(&self, specs: &[MatchSpec]) -> Result<(), SolveError> {
        self.solve(specs, &[], &[], false).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solver_types::NoArchType;

    fn record(name: &str, version: &str, depends: Vec<&str>) -> PackageRecord {
        PackageRecord {
            name: PackageName::new_unchecked(name),
            version: Version::from_str(version).unwrap(),
            build_string: "0".to_owned(),
            build_number: 0,
            channel: "conda-forge".to_owned(),
            subdir: "linux-64".to_owned(),
            depends: depends.into_iter().map(str::to_owned).collect(),
            constrains: Vec::new(),
            features: Vec::new(),
            track_features: Vec::new(),
            noarch: NoArchType::None,
            timestamp: None,
            is_unmanageable: false,
        }
    }

    fn sample_index() -> Index {
        let mut index = Index::new();
        index.insert(record("flask", "1.0.0", vec![]));
        index.insert(record("flask", "2.0.0", vec!["werkzeug >=1.0"]));
        index.insert(record("werkzeug", "1.0.0", vec![]));
        index.insert(record("werkzeug", "0.9.0", vec![]));
        index
    }

    #[test]
    fn solve_picks_highest_version_satisfying_transitive_deps() {
        let resolver = ResolvoResolver::new(sample_index(), Vec::new());
        let specs = vec![MatchSpec::from_str("flask").unwrap()];
        let result = resolver.solve(&specs, &specs, &[], false).unwrap();
        let names: Vec<_> = result.iter().map(|r| r.name.as_normalized()).collect();
        assert!(names.contains(&"flask".to_owned()));
        assert!(names.contains(&"werkzeug".to_owned()));
    }

    #[test]
    fn find_conflicts_reports_unsatisfiable_pin() {
        let resolver = ResolvoResolver::new(sample_index(), Vec::new());
        let specs = vec![
            MatchSpec::from_str("flask ==2.0.0").unwrap(),
            MatchSpec::from_str("werkzeug ==0.9.0").unwrap(),
        ];
        assert!(resolver.find_conflicts(&specs).is_err());
    }

    #[test]
    fn groups_sorts_highest_version_first() {
        let resolver = ResolvoResolver::new(sample_index(), Vec::new());
        let groups = resolver.groups(&PackageName::from("flask"));
        assert_eq!(groups[0].version.as_str(), "2.0.0");
    }

    fn glibc() -> GenericVirtualPackage {
        GenericVirtualPackage {
            name: PackageName::new_unchecked("__glibc"),
            version: Version::from_str("2.17").unwrap(),
            build_string: "0".to_owned(),
        }
    }

    #[test]
    fn groups_includes_virtual_packages() {
        let resolver = ResolvoResolver::new(Index::new(), vec![glibc()]);
        let groups = resolver.groups(&PackageName::from("__glibc"));
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].version.as_str(), "2.17");
    }

    #[test]
    fn find_matches_resolves_virtual_package_spec() {
        let resolver = ResolvoResolver::new(Index::new(), vec![glibc()]);
        let spec = MatchSpec::from_str("__glibc").unwrap();
        assert_eq!(resolver.find_matches(&spec).len(), 1);
    }

    #[test]
    fn bad_installed_treats_virtual_dependency_as_satisfied() {
        let resolver = ResolvoResolver::new(Index::new(), vec![glibc()]);
        let installed = vec![record("somepkg", "1.0.0", vec!["__glibc >=2.12"])];
        let (ok, bad) = resolver.bad_installed(&installed, &[]);
        assert_eq!(ok.len(), 1);
        assert!(bad.is_empty());
    }
}
