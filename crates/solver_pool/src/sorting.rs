//! Candidate ordering. Grounded on
//! `rattler_solve::resolvo::conda_util::compare_candidates`: track_features
//! presence beats everything, then version descending, then build_number
//! descending, then (for resolvo's candidate sort, which additionally has
//! access to each candidate's own dependency graph) a dependency-version
//! score, then repodata timestamp descending.

use std::cmp::Ordering;
use std::collections::HashMap;

use resolvo::{SolvableId, SolverCache, VersionSetId};
use solver_types::{PackageRecord, Version};

use crate::resolvo_backend::{ResolvoDependencyProvider, SolverMatchSpec, SolverPackageRecord};

/// Orders two plain records the way [`crate::Resolver::groups`] and
/// [`crate::Resolver::find_matches`] present candidates: no access to a
/// dependency graph, so this stops at the timestamp tiebreak.
pub(crate) fn compare_records(a: &PackageRecord, b: &PackageRecord) -> Ordering {
    let a_tracked = !a.track_features.is_empty();
    let b_tracked = !b.track_features.is_empty();
    a_tracked
        .cmp(&b_tracked)
        .then_with(|| b.version.cmp(&a.version))
        .then_with(|| b.build_number.cmp(&a.build_number))
        .then_with(|| b.timestamp.cmp(&a.timestamp))
}

/// Orders two resolvo solvables the way `conda.resolve.Resolve.features`
/// ranks candidates during SAT search: identical to [`compare_records`] up
/// through build_number, then broken further by which candidate pulls in
/// higher-versioned, feature-free dependencies, and only then by
/// timestamp.
pub(crate) fn compare_candidates(
    a: SolvableId,
    b: SolvableId,
    solver: &SolverCache<SolverMatchSpec, String, ResolvoDependencyProvider>,
    match_spec_highest_version: &mut HashMap<VersionSetId, Option<(Version, bool)>>,
) -> Ordering {
    let pool = solver.pool();
    let a_record = pool.resolve_solvable(a).inner();
    let b_record = pool.resolve_solvable(b).inner();

    let a_tracked = !a_record.track_features().is_empty();
    let b_tracked = !b_record.track_features().is_empty();
    match a_tracked.cmp(&b_tracked) {
        Ordering::Equal => {}
        ord => return ord,
    }

    match a_record.version().cmp(b_record.version()) {
        Ordering::Equal => {}
        ord => return ord.reverse(),
    }

    match a_record.build_number().cmp(&b_record.build_number()) {
        Ordering::Equal => {}
        ord => return ord.reverse(),
    }

    let a_deps = solver
        .get_or_cache_dependencies(a)
        .requirements
        .iter()
        .map(|id| (pool.resolve_version_set_package_name(*id), *id))
        .collect::<Vec<_>>();
    let b_specs_by_name: HashMap<_, _> = solver
        .get_or_cache_dependencies(b)
        .requirements
        .iter()
        .map(|id| (pool.resolve_version_set_package_name(*id), *id))
        .collect();

    let mut total_score = 0i32;
    for (name, a_spec_id) in a_deps {
        let Some(b_spec_id) = b_specs_by_name.get(&name) else {
            continue;
        };
        if a_spec_id == *b_spec_id {
            continue;
        }
        let highest_a = find_highest_version(a_spec_id, solver, match_spec_highest_version);
        let highest_b = find_highest_version(*b_spec_id, solver, match_spec_highest_version);
        let (Some((a_version, a_tracked)), Some((b_version, b_tracked))) = (highest_a, highest_b)
        else {
            continue;
        };

        if a_tracked != b_tracked {
            total_score += if a_tracked { -100 } else { 100 };
            continue;
        }
        total_score += match a_version.cmp(&b_version) {
            Ordering::Less => 1,
            Ordering::Equal => 0,
            Ordering::Greater => -1,
        };
    }

    if total_score != 0 {
        return total_score.cmp(&0);
    }

    b_record.timestamp().cmp(&a_record.timestamp())
}

fn find_highest_version(
    version_set_id: VersionSetId,
    solver: &SolverCache<SolverMatchSpec, String, ResolvoDependencyProvider>,
    cache: &mut HashMap<VersionSetId, Option<(Version, bool)>>,
) -> Option<(Version, bool)> {
    cache
        .entry(version_set_id)
        .or_insert_with(|| {
            solver
                .get_or_cache_matching_candidates(version_set_id)
                .iter()
                .map(|id| solver.pool().resolve_solvable(*id).inner())
                .fold(None, |acc, record| {
                    Some(acc.map_or_else(
                        || {
                            (
                                record.version().clone(),
                                !record.track_features().is_empty(),
                            )
                        },
                        |(version, has_tracked): (Version, bool)| {
                            (
                                version.max(record.version().clone()),
                                has_tracked && record.track_features().is_empty(),
                            )
                        },
                    ))
                })
        })
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn record(name: &str, version: &str, build_number: u64) -> PackageRecord {
        PackageRecord {
            name: solver_types::PackageName::new_unchecked(name),
            version: Version::from_str(version).unwrap(),
            build_string: format!("build_{build_number}"),
            build_number,
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
    fn higher_version_sorts_first() {
        let low = record("flask", "1.0.0", 0);
        let high = record("flask", "2.0.0", 0);
        assert_eq!(compare_records(&high, &low), Ordering::Less);
    }

    #[test]
    fn tracked_features_sort_last_regardless_of_version() {
        let mut tracked = record("flask", "9.0.0", 0);
        tracked.track_features.push("old".to_owned());
        let untracked = record("flask", "1.0.0", 0);
        assert_eq!(compare_records(&untracked, &tracked), Ordering::Less);
    }

    #[test]
    fn higher_build_number_breaks_version_tie() {
        let low = record("flask", "1.0.0", 0);
        let high = record("flask", "1.0.0", 5);
        assert_eq!(compare_records(&high, &low), Ordering::Less);
    }
}
