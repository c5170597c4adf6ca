//! Noarch classification of a package ("Noarch(python)" and friends).
//! Mirrors `rattler_conda_types::no_arch_type`.

use serde::{Deserialize, Serialize};

/// Whether a package is architecture-independent, and if so, of what kind.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Serialize, Deserialize)]
pub enum NoArchType {
    /// Tied to a specific platform/architecture.
    #[default]
    None,
    /// Architecture-independent, but not Python-ABI-dependent either.
    Generic,
    /// Architecture-independent but tied to the Python ABI: must be
    /// relinked whenever the installed Python's major.minor changes.
    Python,
}

impl NoArchType {
    /// True for [`NoArchType::None`].
    pub fn is_none(&self) -> bool {
        matches!(self, NoArchType::None)
    }

    /// True for [`NoArchType::Python`].
    pub fn is_python(&self) -> bool {
        matches!(self, NoArchType::Python)
    }

    /// True for [`NoArchType::Generic`].
    pub fn is_generic(&self) -> bool {
        matches!(self, NoArchType::Generic)
    }
}
