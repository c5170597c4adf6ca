//! The metadata record for a single package build, as found in channel
//! repodata. Grounded on `rattler_conda_types::repo_data::PackageRecord`,
//! trimmed to the fields a solver actually reads plus the handful
//! `conda/core/solve.py` reads directly (`track_features`, `timestamp`).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::no_arch::NoArchType;
use crate::package_name::PackageName;
use crate::version::Version;

/// The identity of a record: the tuple a solver uses to tell two records
/// for "the same build" apart. Two records with equal
/// identity are the same package and are deduplicated by [`crate::Index`].
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct RecordId {
    /// Originating channel, e.g. `"conda-forge"`.
    pub channel: String,
    /// Platform subdirectory, e.g. `"linux-64"` or `"noarch"`.
    pub subdir: String,
    /// Package name.
    pub name: String,
    /// Package version.
    pub version: String,
    /// Build string, e.g. `"py310h5588dad_0"`.
    pub build: String,
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}::{}-{}-{}",
            self.channel, self.subdir, self.name, self.version, self.build
        )
    }
}

/// A single package build as described by channel repodata, or synthesized
/// for a virtual package. Immutable once constructed: the solver never
/// mutates a record in place, only replaces which records are selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Package name.
    pub name: PackageName,
    /// Package version.
    pub version: Version,
    /// Build string, e.g. `"py310h5588dad_0"`.
    pub build_string: String,
    /// Build number; higher is preferred at equal version.
    pub build_number: u64,
    /// Originating channel.
    pub channel: String,
    /// Platform subdirectory.
    pub subdir: String,
    /// Dependency expressions, each parseable as a [`crate::MatchSpec`].
    pub depends: Vec<String>,
    /// Constraint expressions: narrow what may coexist, without forcing
    /// that package to be installed.
    pub constrains: Vec<String>,
    /// Legacy feature tags this build provides.
    pub features: Vec<String>,
    /// Feature tags this build tracks (and thus "wants gone" once a
    /// feature-free build of the same name becomes available).
    pub track_features: Vec<String>,
    /// Architecture-independence classification.
    #[serde(default)]
    pub noarch: NoArchType,
    /// Repodata file mtime, used only as a last-resort tiebreaker: newer
    /// timestamp wins among otherwise-equal candidates.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// True if this record was installed by something other than this
    /// package manager (e.g. a system package, or `pip` running inside the
    /// prefix). Never unlinked implicitly, never targeted by the SAT
    /// solver for a fresh install; the `CannotUnlinkUnmanageable` guard
    /// relies on this flag directly.
    #[serde(default)]
    pub is_unmanageable: bool,
}

impl PackageRecord {
    /// This record's identity tuple, used as the key in [`crate::Index`].
    pub fn record_id(&self) -> RecordId {
        RecordId {
            channel: self.channel.clone(),
            subdir: self.subdir.clone(),
            name: self.name.as_normalized(),
            version: self.version.as_str().to_owned(),
            build: self.build_string.clone(),
        }
    }
}

impl fmt::Display for PackageRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}",
            self.name, self.version, self.build_string
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::str::FromStr;

    /// Builds a minimal record for `name`/`version`/`build_number`, with no
    /// dependencies, used across this crate's unit tests.
    pub(crate) fn sample_record(name: &str, version: &str, build_number: u64) -> PackageRecord {
        PackageRecord {
            name: PackageName::new_unchecked(name),
            version: Version::from_str(version).unwrap(),
            build_string: format!("build_{build_number}"),
            build_number,
            channel: "conda-forge".to_owned(),
            subdir: "linux-64".to_owned(),
            depends: Vec::new(),
            constrains: Vec::new(),
            features: Vec::new(),
            track_features: Vec::new(),
            noarch: NoArchType::None,
            timestamp: None,
            is_unmanageable: false,
        }
    }

    #[test]
    fn record_id_reflects_identity_fields() {
        let record = sample_record("flask", "2.0.0", 1);
        let id = record.record_id();
        assert_eq!(id.name, "flask");
        assert_eq!(id.version, "2.0.0");
    }

    #[test]
    fn display_matches_conda_triple() {
        let record = sample_record("flask", "2.0.0", 1);
        assert_eq!(record.to_string(), "flask-2.0.0-build_1");
    }
}
