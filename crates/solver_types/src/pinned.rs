//! Pinned specs: constraints an environment carries regardless of what the
//! user asks for, conventionally stored one per line in a prefix's
//! `conda-meta/pinned` file. Grounded on `rattler`'s `pinned` handling in
//! `rattler_virtual_packages`-adjacent config loading; reading the file
//! itself from disk is left to the host application (filesystem/channel
//! I/O is out of scope here), but the text format it produces is parsed
//! here since `conda/core/solve.py` treats pinned specs as first-class
//! solver input.

use std::str::FromStr;

use thiserror::Error;

use crate::match_spec::{MatchSpec, ParseMatchSpecError};

/// The specs an environment pins, independent of user history. Folded in
/// as non-optional during constraint assembly unless `ignore_pinned` is
/// set on the solve.
#[derive(Debug, Clone, Default)]
pub struct PinnedSpecs {
    specs: Vec<MatchSpec>,
}

/// An error while parsing a pinned-specs file.
#[derive(Debug, Error)]
#[error("line {line}: {source}")]
pub struct ParsePinnedError {
    /// 1-based line number within the file.
    pub line: usize,
    #[source]
    source: ParseMatchSpecError,
}

impl PinnedSpecs {
    /// No pins.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an already-parsed set of pinned specs, each forced optional
    /// regardless of how the caller built it, so a pin can never, by
    /// itself, make a solve fail; the constraint-assembly overlay is what
    /// later promotes a specific pin to non-optional when it applies.
    pub fn from_specs(specs: Vec<MatchSpec>) -> Self {
        PinnedSpecs {
            specs: specs
                .into_iter()
                .map(|mut spec| {
                    spec.optional = true;
                    spec
                })
                .collect(),
        }
    }

    /// All pinned specs.
    pub fn specs(&self) -> &[MatchSpec] {
        &self.specs
    }

    /// The pin for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&MatchSpec> {
        self.specs
            .iter()
            .find(|spec| spec.name_str().is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }
}

/// Parses a `conda-meta/pinned`-style file: one match spec per line,
/// blank lines and `#`-prefixed comments ignored.
pub fn parse_pinned_file(contents: &str) -> Result<PinnedSpecs, ParsePinnedError> {
    let mut specs = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let spec = MatchSpec::from_str(line).map_err(|source| ParsePinnedError {
            line: idx + 1,
            source,
        })?;
        specs.push(spec);
    }
    Ok(PinnedSpecs::from_specs(specs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lines_skipping_comments_and_blanks() {
        let pinned = parse_pinned_file("# pin python\npython 3.11.*\n\nnumpy >=1.20\n").unwrap();
        assert_eq!(pinned.specs().len(), 2);
        assert!(pinned.get("python").is_some());
        assert!(pinned.get("numpy").is_some());
        assert!(pinned.get("flask").is_none());
    }

    #[test]
    fn rejects_malformed_line() {
        let result = parse_pinned_file("python >=,1.0\n");
        assert!(result.is_err());
    }
}
