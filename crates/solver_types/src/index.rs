//! The candidate pool: every [`PackageRecord`] available to the solver,
//! keyed by identity and grouped by name. Grounded on
//! `rattler_conda_types::repo_data::SparseRepoData` and the `virtual_packages`
//! module's `GenericVirtualPackage`, collapsed to the in-memory shape a
//! solver needs (repodata fetching/parsing itself is out of scope).

use indexmap::{IndexMap, IndexSet};

use crate::package_name::PackageName;
use crate::package_record::{PackageRecord, RecordId};
use crate::version::Version;

/// All candidate records available to a solve, already deduplicated by
/// [`RecordId`] and grouped by name for fast resolver lookups. Construction
/// (reading repodata, merging channel priority) happens upstream of this
/// crate.
#[derive(Debug, Clone, Default)]
pub struct Index {
    by_id: IndexMap<RecordId, PackageRecord>,
    by_name: IndexMap<String, IndexSet<RecordId>>,
}

impl Index {
    /// An empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `record`, replacing any prior record with the same identity.
    /// Channel-priority ordering (which duplicate wins) is the caller's
    /// responsibility: insert in priority order, highest first.
    pub fn insert(&mut self, record: PackageRecord) {
        let id = record.record_id();
        if self.by_id.contains_key(&id) {
            tracing::debug!(%id, "replacing existing record with same identity");
        }
        self.by_name
            .entry(id.name.clone())
            .or_default()
            .insert(id.clone());
        self.by_id.insert(id, record);
    }

    /// The record with the given identity, if present.
    pub fn get(&self, id: &RecordId) -> Option<&PackageRecord> {
        self.by_id.get(id)
    }

    /// All records for `name`, in insertion order. Callers needing a
    /// specific ordering should sort this themselves; the index imposes
    /// none beyond insertion order.
    pub fn records_for(&self, name: &PackageName) -> impl Iterator<Item = &PackageRecord> {
        self.by_name
            .get(&name.as_normalized())
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.by_id.get(id))
    }

    /// Every distinct package name with at least one candidate record.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Total number of records held, across all names.
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// True if this index holds no records.
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// A virtual package the target platform provides, e.g. `__glibc 2.17`.
/// Matches against ordinary [`crate::MatchSpec`]s the way a real record
/// would, but is never unlinked/relinked since it has no files.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct GenericVirtualPackage {
    /// The virtual package's name, conventionally prefixed with `__`.
    pub name: PackageName,
    /// The detected platform capability version.
    pub version: Version,
    /// An opaque build string, usually `"0"`.
    pub build_string: String,
}

impl GenericVirtualPackage {
    /// Wraps this virtual package as a full [`PackageRecord`] so it can be
    /// inserted into an [`Index`] alongside ordinary channel records.
    pub fn into_record(self) -> PackageRecord {
        PackageRecord {
            name: self.name,
            version: self.version,
            build_string: self.build_string,
            build_number: 0,
            channel: String::new(),
            subdir: String::new(),
            depends: Vec::new(),
            constrains: Vec::new(),
            features: Vec::new(),
            track_features: Vec::new(),
            noarch: crate::no_arch::NoArchType::None,
            timestamp: None,
            is_unmanageable: false,
        }
    }
}

/// Detects which virtual packages the current platform provides. Platform
/// detection itself is out of scope; this is the seam a host application
/// plugs it into.
pub trait VirtualPackageProvider {
    /// Returns every virtual package this platform provides.
    fn detect(&self) -> Vec<GenericVirtualPackage>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package_record::tests::sample_record;

    #[test]
    fn insert_then_lookup_by_identity() {
        let mut index = Index::new();
        let record = sample_record("flask", "2.0.0", 0);
        let id = record.record_id();
        index.insert(record.clone());
        assert_eq!(index.get(&id), Some(&record));
    }

    #[test]
    fn records_for_name_groups_by_normalized_name() {
        let mut index = Index::new();
        index.insert(sample_record("Flask", "1.0.0", 0));
        index.insert(sample_record("flask", "2.0.0", 0));
        let name = PackageName::from("FLASK");
        assert_eq!(index.records_for(&name).count(), 2);
    }

    #[test]
    fn duplicate_identity_replaces_prior_insert() {
        let mut index = Index::new();
        index.insert(sample_record("flask", "2.0.0", 0));
        index.insert(sample_record("flask", "2.0.0", 0));
        let name = PackageName::from("flask");
        assert_eq!(index.records_for(&name).count(), 1);
    }
}
