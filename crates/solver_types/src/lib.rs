//! Data types shared by every stage of the dependency solver: package
//! identity and ordering ([`Version`], [`PackageName`]), constraint
//! expressions ([`MatchSpec`], [`VersionSpec`]), channel metadata
//! ([`PackageRecord`], [`Index`]), and the user-facing state a solve reads
//! as input ([`HistoryMap`], [`PinnedSpecs`]).
//!
//! Grounded throughout on `rattler_conda_types`: this crate is the subset
//! of that crate's type model the solver core actually touches.

mod history;
mod index;
mod match_spec;
mod no_arch;
mod package_name;
mod package_record;
mod pinned;
mod version;
mod version_spec;

pub use history::HistoryMap;
pub use index::{GenericVirtualPackage, Index, VirtualPackageProvider};
pub use match_spec::{
    exact_version_spec, package_name_from_expression, MatchSpec, ParseMatchSpecError,
    SpecsConfigurationConflict, Strictness,
};
pub use no_arch::NoArchType;
pub use package_name::PackageName;
pub use package_record::{PackageRecord, RecordId};
pub use pinned::{parse_pinned_file, ParsePinnedError, PinnedSpecs};
pub use version::{ParseVersionError, Version};
pub use version_spec::{Constraint, ParseVersionSpecError, VersionSpec};
