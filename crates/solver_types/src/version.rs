//! Conda-style version ordering.
//!
//! Conda version strings are not compared lexically. They are split into an
//! optional epoch, a sequence of dot/underscore-separated segments, and an
//! optional `+`-separated local version, exactly as described in
//! `rattler_conda_types::version`. Each segment is further split into runs of
//! digits and runs of letters so that `1.2.alpha1` and `1.2.0alpha1` compare
//! equal, and a handful of well-known words (`dev`, `post`, `rc`, `alpha`,
//! `beta`, ...) are given a fixed relative weight so that pre-releases sort
//! below a bare release and post-releases sort above it.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// An error produced while parsing a [`Version`] from a string.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ParseVersionError {
    /// The version string was empty.
    #[error("empty version string")]
    Empty,
    /// The version string contained an empty segment (e.g. `1..2`).
    #[error("version `{0}` contains an empty segment")]
    EmptySegment(String),
    /// The epoch prefix (before `!`) was not a valid integer.
    #[error("version `{0}` has a non-numeric epoch")]
    InvalidEpoch(String),
}

/// A single alphanumeric run within a version segment.
///
/// Numeric runs compare by value. Alphabetic runs compare by a fixed weight
/// table first (so `dev < alpha < beta < rc < "" < post`), falling back to
/// lexical order for unrecognized words, and always sort below any numeric
/// run (so `1.0a` < `1.0.0`, matching conda's "insert an implicit 0" rule).
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
enum Atom {
    Numeral(u64),
    Word(String),
}

impl Atom {
    /// Relative weight of well-known pre/post-release markers. Lower sorts
    /// earlier. Unknown words fall back to lexical comparison but are always
    /// placed between `rc` and the empty-string marker used for bare
    /// releases, matching conda's "non-strict" fallback behavior.
    fn word_weight(word: &str) -> i8 {
        match word {
            "dev" => -4,
            "alpha" | "a" => -3,
            "beta" | "b" => -2,
            "rc" | "c" => -1,
            "" => 0,
            "post" => 1,
            _ => 0,
        }
    }
}

impl Ord for Atom {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Atom::Numeral(a), Atom::Numeral(b)) => a.cmp(b),
            (Atom::Word(a), Atom::Word(b)) => {
                let (wa, wb) = (Atom::word_weight(a), Atom::word_weight(b));
                wa.cmp(&wb).then_with(|| a.cmp(b))
            }
            // A word always sorts below a numeral at the same position: this
            // is what makes `1.0a1 == 1.0.0a1` and `1.0 > 1.0rc1` work once
            // the implicit-zero padding described below is in place.
            (Atom::Word(_), Atom::Numeral(_)) => Ordering::Less,
            (Atom::Numeral(_), Atom::Word(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for Atom {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One dot/underscore-delimited component of a version, broken down further
/// into alternating numeral/word atoms (`"2g"` -> `[Numeral(2), Word("g")]`).
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
struct Segment(Vec<Atom>);

impl Segment {
    fn parse(raw: &str) -> Self {
        let mut atoms = Vec::new();
        let mut chars = raw.chars().peekable();
        // If a segment starts with a letter, conda inserts an implicit
        // leading `0` so that `"1.1.a1"` compares as `"1.1.0a1"`.
        if let Some(c) = chars.peek() {
            if c.is_ascii_alphabetic() {
                atoms.push(Atom::Numeral(0));
            }
        }
        let mut current = String::new();
        let mut current_is_digit: Option<bool> = None;
        for c in raw.chars() {
            let is_digit = c.is_ascii_digit();
            if current_is_digit == Some(is_digit) || current.is_empty() {
                current.push(c);
                current_is_digit = Some(is_digit);
            } else {
                atoms.push(Self::finish_run(&current, current_is_digit.unwrap()));
                current = c.to_string();
                current_is_digit = Some(is_digit);
            }
        }
        if !current.is_empty() {
            atoms.push(Self::finish_run(&current, current_is_digit.unwrap()));
        }
        Segment(atoms)
    }

    fn finish_run(run: &str, is_digit: bool) -> Atom {
        if is_digit {
            Atom::Numeral(run.parse().unwrap_or(0))
        } else {
            Atom::Word(run.to_ascii_lowercase())
        }
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        let max_len = self.0.len().max(other.0.len());
        for i in 0..max_len {
            let a = self.0.get(i).cloned().unwrap_or(Atom::Numeral(0));
            let b = other.0.get(i).cloned().unwrap_or(Atom::Numeral(0));
            match a.cmp(&b) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A parsed, comparable conda version.
///
/// `Ord` implements the conda version-ordering algorithm: epoch first, then
/// the dot/underscore segments component-wise, then the local version
/// (`+...` suffix), only once the upstream parts compare equal.
#[derive(Debug, Clone, Eq)]
pub struct Version {
    source: String,
    epoch: u64,
    segments: Vec<Segment>,
    local: Vec<Segment>,
}

/// Equality follows the same semantic comparison as [`Ord`], not the raw
/// source text: `1.1.a1` and `1.1.0a1` parse to the same segments (the
/// leading-letter zero-padding rule) and must compare equal even though
/// their source strings differ.
impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Version {
    /// Returns the original string this version was parsed from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns the first two dot-separated segments of the source string
    /// (e.g. `"3.11.2"` -> `"3.11"`), used by the Python-ABI pinning rule.
    /// Mirrors `get_major_minor_version` in `conda/core/solve.py`.
    pub fn major_minor(&self) -> Option<&str> {
        let mut parts = self.source.splitn(3, '.');
        let major = parts.next()?;
        let minor = parts.next()?;
        let end = major.len() + 1 + minor.len();
        self.source.get(..end)
    }

    fn split(body: &str) -> Vec<Segment> {
        body.split(['.', '_'])
            .map(Segment::parse)
            .collect()
    }

    /// Whether this version's dotted segments begin with `prefix`'s
    /// segments, component by component. Backs the `N.N.*` fuzzy-match
    /// clause in [`crate::VersionSpec`]; comparing parsed segments instead
    /// of the raw string keeps `1.2.*` from matching `1.20.0` (whose source
    /// text happens to start with `"1.2"` but whose second segment is `20`,
    /// not `2`).
    pub(crate) fn starts_with_segments(&self, prefix: &Version) -> bool {
        self.epoch == prefix.epoch
            && prefix.segments.len() <= self.segments.len()
            && self.segments[..prefix.segments.len()] == prefix.segments[..]
    }
}

impl FromStr for Version {
    type Err = ParseVersionError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ParseVersionError::Empty);
        }
        let (epoch_str, rest) = match raw.split_once('!') {
            Some((epoch, rest)) => (Some(epoch), rest),
            None => (None, raw),
        };
        let epoch = match epoch_str {
            Some(e) => e
                .parse()
                .map_err(|_| ParseVersionError::InvalidEpoch(raw.to_owned()))?,
            None => 0,
        };
        let (body, local) = match rest.split_once('+') {
            Some((body, local)) => (body, local),
            None => (rest, ""),
        };
        if body.split(['.', '_']).any(str::is_empty) {
            return Err(ParseVersionError::EmptySegment(raw.to_owned()));
        }
        Ok(Version {
            source: raw.to_owned(),
            epoch,
            segments: Self::split(body),
            local: if local.is_empty() {
                Vec::new()
            } else {
                Self::split(local)
            },
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| {
                let max_len = self.segments.len().max(other.segments.len());
                for i in 0..max_len {
                    let empty = Segment(Vec::new());
                    let a = self.segments.get(i).unwrap_or(&empty);
                    let b = other.segments.get(i).unwrap_or(&empty);
                    match a.cmp(b) {
                        Ordering::Equal => continue,
                        ord => return ord,
                    }
                }
                Ordering::Equal
            })
            .then_with(|| {
                let max_len = self.local.len().max(other.local.len());
                for i in 0..max_len {
                    let empty = Segment(Vec::new());
                    let a = self.local.get(i).unwrap_or(&empty);
                    let b = other.local.get(i).unwrap_or(&empty);
                    match a.cmp(b) {
                        Ordering::Equal => continue,
                        ord => return ord,
                    }
                }
                Ordering::Equal
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::hash::Hash for Version {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        // Must agree with the semantic `PartialEq` above, not the raw
        // source text, or equal versions could land in different hash
        // buckets.
        self.epoch.hash(state);
        self.segments.hash(state);
        self.local.hash(state);
    }
}

impl serde::Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> serde::Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Version::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::from_str(s).unwrap()
    }

    #[test]
    fn numeric_segments_compare_by_value_not_lexically() {
        assert!(v("1.9") < v("1.10"));
        assert!(v("2.0") > v("1.99"));
    }

    #[test]
    fn epoch_dominates() {
        assert!(v("1!0.1") > v("2.0"));
    }

    #[test]
    fn prerelease_sorts_below_release() {
        assert!(v("1.0rc1") < v("1.0"));
        assert!(v("1.0a1") < v("1.0rc1"));
        assert!(v("1.0dev1") < v("1.0a1"));
    }

    #[test]
    fn postrelease_sorts_above_release() {
        assert!(v("1.0post1") > v("1.0"));
    }

    #[test]
    fn implicit_zero_padding_for_leading_letters() {
        assert_eq!(v("1.1.a1"), v("1.1.0a1"));
    }

    #[test]
    fn local_version_breaks_ties_only() {
        assert!(v("1.0+local1") > v("1.0"));
        assert!(v("1.0+local2") > v("1.0+local1"));
    }

    #[test]
    fn major_minor_extraction() {
        assert_eq!(v("3.11.4").major_minor(), Some("3.11"));
        assert_eq!(v("3.11").major_minor(), Some("3.11"));
    }

    #[test]
    fn rejects_empty_segments() {
        assert!(Version::from_str("1..2").is_err());
    }

    #[test]
    fn segment_prefix_match_is_component_wise_not_textual() {
        assert!(v("1.2.9").starts_with_segments(&v("1.2")));
        assert!(!v("1.20.0").starts_with_segments(&v("1.2")));
    }
}
