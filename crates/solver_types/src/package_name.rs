//! Conda package names are case-insensitive identifiers. This struct keeps
//! the source spelling for display while normalizing to lowercase for
//! comparison and hashing, matching `rattler_conda_types::package_name`.

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// A conda package name.
#[derive(Debug, Clone, Eq, Serialize)]
#[serde(transparent)]
pub struct PackageName {
    source: String,
}

impl PackageName {
    /// Constructs a name from a string, without validating that it only
    /// contains characters conda allows. Use this when reading trusted
    /// repodata.
    pub fn new_unchecked(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    /// The string this name was constructed from.
    pub fn as_source(&self) -> &str {
        &self.source
    }

    /// The lowercase, comparison-normalized form of this name.
    pub fn as_normalized(&self) -> String {
        self.source.to_ascii_lowercase()
    }
}

impl PartialEq for PackageName {
    fn eq(&self, other: &Self) -> bool {
        self.as_normalized() == other.as_normalized()
    }
}

impl Hash for PackageName {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_normalized().hash(state);
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl From<&str> for PackageName {
    fn from(value: &str) -> Self {
        Self::new_unchecked(value)
    }
}

impl From<String> for PackageName {
    fn from(value: String) -> Self {
        Self::new_unchecked(value)
    }
}

impl<'de> Deserialize<'de> for PackageName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(PackageName::new_unchecked(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_is_case_insensitive() {
        assert_eq!(PackageName::from("NumPy"), PackageName::from("numpy"));
    }

    #[test]
    fn display_preserves_source_casing() {
        assert_eq!(PackageName::from("NumPy").to_string(), "NumPy");
    }
}
