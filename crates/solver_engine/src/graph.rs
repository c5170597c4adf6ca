//! `PrefixGraph`: the dependency DAG over an ordered set of installed
//! records, laid out as arena-allocated nodes with integer indices and
//! edges as sorted adjacency lists rather than a pointer graph. The Python
//! `conda.models.prefix_graph.PrefixGraph` this mirrors (referenced
//! throughout `conda/core/solve.py`, e.g. `graph.remove_spec`,
//! `graph.all_ancestors`,
//! `graph.remove_youngest_descendant_nodes_with_specs`, `graph.prune`) was
//! not available to read directly, so its behavior is reconstructed from
//! those call sites.
//!
//! Terminology follows the Python original: a node's "ancestors" are its
//! transitive dependencies (the packages it needs, installed logically
//! before it); a node's "descendants" are the packages that transitively
//! depend on it (installed logically after it). Topological order lists
//! ancestors before descendants, satisfying "no record precedes one of
//! its dependencies".

use std::collections::HashSet;

use ahash::AHashSet;
use indexmap::IndexMap;
use solver_types::{package_name_from_expression, MatchSpec, PackageRecord};

/// A dependency DAG over a fixed set of [`PackageRecord`]s. Node indices
/// are stable for the lifetime of the graph; removal tombstones a node
/// rather than shifting indices.
#[derive(Debug, Clone)]
pub struct PrefixGraph {
    nodes: Vec<PackageRecord>,
    removed: AHashSet<usize>,
    index_by_name: IndexMap<String, usize>,
    /// `dependencies[i]` = direct ancestors of node `i` (what it depends on).
    dependencies: Vec<Vec<usize>>,
    /// `dependents[i]` = direct descendants of node `i` (what depends on it).
    dependents: Vec<Vec<usize>>,
}

impl PrefixGraph {
    /// Builds a graph from an ordered set of records, resolving each
    /// record's `depends` entries against the other records by name.
    /// Dependencies outside this record set (e.g. virtual packages) are
    /// silently skipped: the graph only models edges between nodes it
    /// actually holds.
    pub fn new(records: impl IntoIterator<Item = PackageRecord>) -> Self {
        let nodes: Vec<PackageRecord> = records.into_iter().collect();
        let mut index_by_name = IndexMap::new();
        for (idx, record) in nodes.iter().enumerate() {
            index_by_name.insert(record.name.as_normalized(), idx);
        }
        let mut dependencies = vec![Vec::new(); nodes.len()];
        let mut dependents = vec![Vec::new(); nodes.len()];
        for (idx, record) in nodes.iter().enumerate() {
            for depends in &record.depends {
                let dep_name = package_name_from_expression(depends).to_ascii_lowercase();
                if let Some(&dep_idx) = index_by_name.get(&dep_name) {
                    if dep_idx != idx {
                        dependencies[idx].push(dep_idx);
                        dependents[dep_idx].push(idx);
                    }
                }
            }
        }
        PrefixGraph {
            nodes,
            removed: AHashSet::new(),
            index_by_name,
            dependencies,
            dependents,
        }
    }

    fn is_live(&self, idx: usize) -> bool {
        !self.removed.contains(&idx)
    }

    /// Every record still present in the graph, in arbitrary (insertion)
    /// order. Use [`Self::topological_order`] for a dependency-respecting
    /// order.
    pub fn records(&self) -> impl Iterator<Item = &PackageRecord> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(idx, _)| self.is_live(*idx))
            .map(|(_, record)| record)
    }

    /// The node index holding `name`, if it is still live.
    pub fn node_by_name(&self, name: &str) -> Option<usize> {
        self.index_by_name
            .get(&name.to_ascii_lowercase())
            .copied()
            .filter(|&idx| self.is_live(idx))
    }

    /// A stable order where every record appears after all of its
    /// dependencies. Ties are broken by name, then build_number
    /// descending, then version descending, for determinism.
    pub fn topological_order(&self) -> Vec<PackageRecord> {
        let mut in_degree: Vec<usize> = vec![0; self.nodes.len()];
        for idx in 0..self.nodes.len() {
            if !self.is_live(idx) {
                continue;
            }
            in_degree[idx] = self.dependencies[idx]
                .iter()
                .filter(|&&dep| self.is_live(dep))
                .count();
        }

        let mut ready: Vec<usize> = (0..self.nodes.len())
            .filter(|&idx| self.is_live(idx) && in_degree[idx] == 0)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut remaining = in_degree;

        while !ready.is_empty() {
            ready.sort_by(|&a, &b| tie_break(&self.nodes[a], &self.nodes[b]));
            let idx = ready.remove(0);
            order.push(self.nodes[idx].clone());
            for &dependent in &self.dependents[idx] {
                if !self.is_live(dependent) {
                    continue;
                }
                remaining[dependent] -= 1;
                if remaining[dependent] == 0 {
                    ready.push(dependent);
                }
            }
        }
        order
    }

    fn ancestor_indices(&self, idx: usize) -> HashSet<usize> {
        let mut seen = HashSet::new();
        let mut stack = self.dependencies[idx].clone();
        while let Some(current) = stack.pop() {
            if !self.is_live(current) || !seen.insert(current) {
                continue;
            }
            stack.extend(self.dependencies[current].iter().copied());
        }
        seen
    }

    /// The transitive closure of `idx`'s dependencies (its ancestors),
    /// not including `idx` itself.
    pub fn all_ancestors(&self, idx: usize) -> Vec<PackageRecord> {
        self.ancestor_indices(idx)
            .into_iter()
            .map(|current| self.nodes[current].clone())
            .collect()
    }

    /// The transitive closure of `idx`'s dependents (its descendants),
    /// not including `idx` itself.
    pub fn all_descendants(&self, idx: usize) -> Vec<usize> {
        let mut seen = HashSet::new();
        let mut stack = self.dependents[idx].clone();
        let mut result = Vec::new();
        while let Some(current) = stack.pop() {
            if !self.is_live(current) || !seen.insert(current) {
                continue;
            }
            result.push(current);
            stack.extend(self.dependents[current].iter().copied());
        }
        result
    }

    /// Removes exactly the live nodes matching `spec`, with no cascade to
    /// their dependents — the `force_remove` path drops matching records
    /// and returns them, deliberately leaving a broken environment behind
    /// rather than repairing it by cascading, which is what distinguishes
    /// this from [`Self::remove_spec`].
    pub fn remove_matching(&mut self, spec: &MatchSpec) -> Vec<PackageRecord> {
        let mut matches: Vec<usize> = (0..self.nodes.len())
            .filter(|&idx| self.is_live(idx) && spec.matches(&self.nodes[idx]))
            .collect();
        matches.sort_by(|&a, &b| tie_break(&self.nodes[a], &self.nodes[b]));
        for &idx in &matches {
            self.removed.insert(idx);
        }
        matches.into_iter().map(|idx| self.nodes[idx].clone()).collect()
    }

    /// Removes every live node matching `spec`, along with every node
    /// that transitively depends on one of them (since a dependency
    /// disappearing breaks anything that needed it).
    pub fn remove_spec(&mut self, spec: &MatchSpec) -> Vec<PackageRecord> {
        let matches: Vec<usize> = (0..self.nodes.len())
            .filter(|&idx| self.is_live(idx) && spec.matches(&self.nodes[idx]))
            .collect();

        let mut to_remove: HashSet<usize> = matches.iter().copied().collect();
        for &idx in &matches {
            to_remove.extend(self.all_descendants(idx));
        }

        let mut removed: Vec<usize> = to_remove.into_iter().collect();
        removed.sort_by(|&a, &b| tie_break(&self.nodes[a], &self.nodes[b]));
        for &idx in &removed {
            self.removed.insert(idx);
        }
        removed.into_iter().map(|idx| self.nodes[idx].clone()).collect()
    }

    /// Among the live nodes matching any spec in `specs`, removes only
    /// the ones that are not themselves an ancestor (dependency) of
    /// another matched node — the "youngest" matches. Backs `ONLY_DEPS`
    /// handling: `conda install --only-deps python flask` should drop
    /// `flask` but keep `python`, since flask depends on it.
    pub fn remove_youngest_descendant_nodes_with_specs(
        &mut self,
        specs: &[MatchSpec],
    ) -> Vec<PackageRecord> {
        let matched: Vec<usize> = (0..self.nodes.len())
            .filter(|&idx| {
                self.is_live(idx) && specs.iter().any(|spec| spec.matches(&self.nodes[idx]))
            })
            .collect();

        let ancestor_index_sets: Vec<(usize, HashSet<usize>)> = matched
            .iter()
            .map(|&idx| (idx, self.ancestor_indices(idx)))
            .collect();

        let youngest: Vec<usize> = matched
            .iter()
            .copied()
            .filter(|&idx| {
                !ancestor_index_sets
                    .iter()
                    .any(|(other, ancestors)| *other != idx && ancestors.contains(&idx))
            })
            .collect();

        let mut removed = youngest;
        removed.sort_by(|&a, &b| tie_break(&self.nodes[a], &self.nodes[b]));
        for &idx in &removed {
            self.removed.insert(idx);
        }
        removed.into_iter().map(|idx| self.nodes[idx].clone()).collect()
    }

    /// Removes every live node that is not reachable (as an ancestor) from
    /// some node matching one of `keep_specs`. Backs the `prune = true`
    /// handling in post-solve refinement.
    pub fn prune(&mut self, keep_specs: &[MatchSpec]) {
        let roots: Vec<usize> = (0..self.nodes.len())
            .filter(|&idx| {
                self.is_live(idx) && keep_specs.iter().any(|spec| spec.matches(&self.nodes[idx]))
            })
            .collect();

        let mut keep: HashSet<usize> = roots.iter().copied().collect();
        for &root in &roots {
            keep.extend(self.ancestor_indices(root));
        }

        for idx in 0..self.nodes.len() {
            if self.is_live(idx) && !keep.contains(&idx) {
                self.removed.insert(idx);
            }
        }
    }
}

fn tie_break(a: &PackageRecord, b: &PackageRecord) -> std::cmp::Ordering {
    a.name
        .as_normalized()
        .cmp(&b.name.as_normalized())
        .then_with(|| b.build_number.cmp(&a.build_number))
        .then_with(|| b.version.cmp(&a.version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use solver_types::{NoArchType, PackageName, Version};

    fn record(name: &str, depends: Vec<&str>) -> PackageRecord {
        PackageRecord {
            name: PackageName::new_unchecked(name),
            version: Version::from_str("1.0.0").unwrap(),
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

    #[test]
    fn topological_order_lists_dependencies_first() {
        let graph = PrefixGraph::new(vec![record("b", vec!["a"]), record("a", vec![])]);
        let order = graph.topological_order();
        let names: Vec<_> = order.iter().map(|r| r.name.as_source().to_owned()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn remove_matching_leaves_dependents_in_place() {
        let mut graph = PrefixGraph::new(vec![record("a", vec![]), record("b", vec!["a"])]);
        let removed = graph.remove_matching(&MatchSpec::from_str("a").unwrap());
        let names: Vec<_> = removed.iter().map(|r| r.name.as_source().to_owned()).collect();
        assert_eq!(names, vec!["a"]);
        assert_eq!(graph.records().count(), 1);
    }

    #[test]
    fn remove_spec_cascades_to_dependents() {
        let mut graph = PrefixGraph::new(vec![record("a", vec![]), record("b", vec!["a"])]);
        let removed = graph.remove_spec(&MatchSpec::from_str("a").unwrap());
        let names: std::collections::HashSet<_> =
            removed.iter().map(|r| r.name.as_source().to_owned()).collect();
        assert!(names.contains("a"));
        assert!(names.contains("b"));
        assert_eq!(graph.records().count(), 0);
    }

    #[test]
    fn only_deps_keeps_ancestor_drops_descendant() {
        let mut graph = PrefixGraph::new(vec![record("python", vec![]), record("flask", vec!["python"])]);
        let specs = vec![
            MatchSpec::from_str("python").unwrap(),
            MatchSpec::from_str("flask").unwrap(),
        ];
        let removed = graph.remove_youngest_descendant_nodes_with_specs(&specs);
        let names: Vec<_> = removed.iter().map(|r| r.name.as_source().to_owned()).collect();
        assert_eq!(names, vec!["flask"]);
        assert_eq!(graph.records().count(), 1);
    }

    #[test]
    fn prune_keeps_only_reachable_from_kept_specs() {
        let mut graph = PrefixGraph::new(vec![
            record("python", vec![]),
            record("flask", vec!["python"]),
            record("orphan", vec![]),
        ]);
        graph.prune(&[MatchSpec::from_str("flask").unwrap()]);
        let names: std::collections::HashSet<_> =
            graph.records().map(|r| r.name.as_source().to_owned()).collect();
        assert!(names.contains("flask"));
        assert!(names.contains("python"));
        assert!(!names.contains("orphan"));
    }
}
