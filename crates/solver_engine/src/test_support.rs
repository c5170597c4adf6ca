//! Shared fixture builders for this crate's `#[cfg(test)]` modules.

use std::str::FromStr;

use solver_types::{NoArchType, PackageName, PackageRecord, Version};

pub fn record(name: &str, depends: Vec<&str>) -> PackageRecord {
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

pub fn record_versioned(name: &str, version: &str, build_number: u64) -> PackageRecord {
    PackageRecord {
        version: Version::from_str(version).unwrap(),
        build_number,
        ..record(name, vec![])
    }
}

pub fn record_full(name: &str, version: &str, build_number: u64, depends: Vec<&str>) -> PackageRecord {
    PackageRecord {
        version: Version::from_str(version).unwrap(),
        build_number,
        ..record(name, depends)
    }
}
