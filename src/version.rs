//! Permissive semantic versions with mixed numeric/text component ordering.
//!
//! Used to pick the highest of several toolchain, profile or package
//! versions.  Parsing accepts `[vV]?N(.N)?(.N)?` followed by optional
//! prerelease (`-…`) and build metadata (`+…`) sections.
//!
//! Equality and ordering are intentionally different relations: two versions
//! are equal only when their original text matches (ignoring ASCII case),
//! while [`SemanticVersion::compare`] orders by the decomposed components.
//! `1.0` and `1.0.0` therefore compare as different but sort next to each
//! other.  Because of this the type does not implement `PartialOrd`/`Ord`.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chumsky::prelude::*;

// ═══════════════════════════════════════════════════════════════════════════════
//  Components
// ═══════════════════════════════════════════════════════════════════════════════

/// A token of a prerelease or build-metadata section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Component {
    Numeric(u64),
    Text(String),
}

impl Component {
    fn classify(token: &str) -> Self {
        match token.parse::<u64>() {
            Ok(n) if token.bytes().all(|b| b.is_ascii_digit()) => Component::Numeric(n),
            _ => Component::Text(token.to_string()),
        }
    }

    /// Numeric tokens sort above text tokens; same-kind tokens compare by
    /// value (numbers) or ordinally (text).
    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Component::Numeric(a), Component::Numeric(b)) => a.cmp(b),
            (Component::Text(a), Component::Text(b)) => a.cmp(b),
            (Component::Numeric(_), Component::Text(_)) => Ordering::Greater,
            (Component::Text(_), Component::Numeric(_)) => Ordering::Less,
        }
    }
}

/// Split `alpha.10rc2` into `alpha`, `10`, `rc`, `2`: every dotted run is cut
/// again wherever digits meet non-digits.
fn tokenize(section: &str) -> Vec<Component> {
    let mut components = Vec::new();

    for run in section.split('.') {
        let mut start = 0;
        let bytes = run.as_bytes();
        for i in 1..bytes.len() {
            if bytes[i].is_ascii_digit() != bytes[i - 1].is_ascii_digit() {
                components.push(Component::classify(&run[start..i]));
                start = i;
            }
        }
        components.push(Component::classify(&run[start..]));
    }

    components
}

fn compare_components(a: &[Component], b: &[Component]) -> Ordering {
    a.iter()
        .zip(b)
        .map(|(x, y)| x.compare(y))
        .find(|o| o.is_ne())
        .unwrap_or_else(|| a.len().cmp(&b.len()))
}

// ═══════════════════════════════════════════════════════════════════════════════
//  SemanticVersion
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct SemanticVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Vec<Component>,
    pub build_metadata: Vec<Component>,
    original_text: String,
}

/// Returned by [`SemanticVersion::from_str`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a version")]
pub struct VersionParseError(pub String);

/// Parser for the numeric core `[vV]?N(.N)?(.N)?`.
fn core_parser<'a>() -> impl Parser<'a, &'a str, (u64, u64, u64), extra::Err<Rich<'a, char>>> {
    let number = text::digits(10)
        .to_slice()
        .try_map(|digits: &str, span| digits.parse::<u64>().map_err(|e| Rich::custom(span, e)));

    one_of("vV")
        .or_not()
        .ignore_then(number.clone())
        .then(just('.').ignore_then(number.clone()).or_not())
        .then(just('.').ignore_then(number).or_not())
        .then_ignore(end())
        .map(|((major, minor), patch)| (major, minor.unwrap_or(0), patch.unwrap_or(0)))
}

/// Cut a marker section off the end of `text`.  Returns the remaining prefix
/// and the section after the marker, which is `None` when the marker is the
/// last character.
fn split_marker(text: &str, at: usize) -> (&str, Option<&str>) {
    let section = (at + 1 < text.len()).then(|| &text[at + 1..]);
    (&text[..at], section)
}

impl SemanticVersion {
    /// Parse a version string, returning `None` when the numeric core does not
    /// match `[vV]?N(.N)?(.N)?`.
    pub fn parse(text: &str) -> Option<Self> {
        let original_text = text.to_string();
        let mut rest = text;
        let mut prerelease = None;
        let mut build_metadata = None;

        let dash = text.find('-');
        let plus = text.find('+');

        // Whichever marker comes later is the outer delimiter and is cut off
        // first; the other one is then searched for in what is left.
        let plus_is_outer = match (dash, plus) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(dash), Some(plus)) => plus > dash,
        };

        if let (true, Some(plus)) = (plus_is_outer, plus) {
            let (head, section) = split_marker(rest, plus);
            build_metadata = section;
            rest = head;
            if let Some(dash) = dash {
                let (head, section) = split_marker(rest, dash);
                prerelease = section;
                rest = head;
            }
        } else if let Some(dash) = dash {
            let (head, section) = split_marker(rest, dash);
            prerelease = section;
            rest = head;
            if let Some(plus) = plus {
                let (head, section) = split_marker(rest, plus);
                build_metadata = section;
                rest = head;
            }
        }

        let (major, minor, patch) = core_parser().parse(rest).into_result().ok()?;

        Some(Self {
            major,
            minor,
            patch,
            prerelease: prerelease.map(tokenize).unwrap_or_default(),
            build_metadata: build_metadata.map(tokenize).unwrap_or_default(),
            original_text,
        })
    }

    /// The text this version was parsed from.
    pub fn original_text(&self) -> &str {
        &self.original_text
    }

    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    /// Total order over versions by component precedence.
    ///
    /// Major, minor and patch compare numerically; a release sorts above any
    /// prerelease of the same core; prerelease and then build-metadata
    /// components compare pairwise and then by count; the last tiebreak is the
    /// original text without a leading `v`, ignoring ASCII case.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (self.is_prerelease(), other.is_prerelease()) {
                (false, true) => Ordering::Greater,
                (true, false) => Ordering::Less,
                _ => compare_components(&self.prerelease, &other.prerelease),
            })
            .then_with(|| compare_components(&self.build_metadata, &other.build_metadata))
            .then_with(|| {
                let a = strip_v(&self.original_text).to_ascii_lowercase();
                let b = strip_v(&other.original_text).to_ascii_lowercase();
                a.cmp(&b)
            })
    }

    /// The highest version in `versions` by [`compare`](Self::compare).
    pub fn max_of<'a>(versions: impl IntoIterator<Item = &'a SemanticVersion>) -> Option<&'a SemanticVersion> {
        versions.into_iter().max_by(|a, b| a.compare(b))
    }
}

fn strip_v(text: &str) -> &str {
    text.strip_prefix(['v', 'V']).unwrap_or(text)
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.original_text.eq_ignore_ascii_case(&other.original_text)
    }
}

impl Eq for SemanticVersion {}

impl Hash for SemanticVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.original_text.to_ascii_lowercase().hash(state);
    }
}

impl FromStr for SemanticVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| VersionParseError(s.to_string()))
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original_text)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    fn v(text: &str) -> SemanticVersion {
        SemanticVersion::parse(text).unwrap()
    }

    fn assert_ascending(texts: &[&str]) {
        for pair in texts.windows(2) {
            assert_eq!(
                v(pair[0]).compare(&v(pair[1])),
                Ordering::Less,
                "{} should sort below {}",
                pair[0],
                pair[1]
            );
            assert_eq!(v(pair[1]).compare(&v(pair[0])), Ordering::Greater);
        }
    }

    // ── Parsing ──────────────────────────────────────────────────────────

    #[test]
    fn parse_full_version() {
        let version = v("1.2.3-beta.4+build.5");
        assert_eq!((version.major, version.minor, version.patch), (1, 2, 3));
        assert_eq!(
            version.prerelease,
            [Component::Text("beta".into()), Component::Numeric(4)]
        );
        assert_eq!(
            version.build_metadata,
            [Component::Text("build".into()), Component::Numeric(5)]
        );
    }

    #[test]
    fn parse_defaults_minor_and_patch() {
        let version = v("V7");
        assert_eq!((version.major, version.minor, version.patch), (7, 0, 0));
        assert_eq!(version.original_text(), "V7");
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(SemanticVersion::parse("").is_none());
        assert!(SemanticVersion::parse("latest").is_none());
        assert!(SemanticVersion::parse("1.2.3.4").is_none());
        assert!("x1".parse::<SemanticVersion>().is_err());
    }

    #[test]
    fn dash_inside_build_metadata() {
        // The '-' comes after the '+', so it is the outer delimiter.
        let version = v("1.0.0+meta-data");
        assert_eq!((version.major, version.minor, version.patch), (1, 0, 0));
        assert_eq!(version.prerelease, [Component::Text("data".into())]);
        assert_eq!(version.build_metadata, [Component::Text("meta".into())]);
    }

    #[test]
    fn plus_after_prerelease() {
        let version = v("2.0.0-rc1+abc");
        assert_eq!(
            version.prerelease,
            [Component::Text("rc".into()), Component::Numeric(1)]
        );
        assert_eq!(version.build_metadata, [Component::Text("abc".into())]);
    }

    #[test]
    fn trailing_marker_has_no_section() {
        let version = v("1.0.0-");
        assert!(!version.is_prerelease());
        let version = v("1.0.0+");
        assert!(version.build_metadata.is_empty());
    }

    #[test]
    fn tokenize_splits_digit_boundaries() {
        assert_eq!(
            tokenize("alpha10rc.2"),
            [
                Component::Text("alpha".into()),
                Component::Numeric(10),
                Component::Text("rc".into()),
                Component::Numeric(2),
            ]
        );
    }

    // ── Ordering ─────────────────────────────────────────────────────────

    #[test]
    fn core_components_order_numerically() {
        assert_ascending(&["1.2.3", "1.2.4", "1.10.0", "2.0"]);
    }

    #[test]
    fn release_sorts_above_prerelease() {
        assert_ascending(&["1.2.3-beta", "1.2.3", "1.2.4"]);
    }

    #[test]
    fn numeric_prerelease_tokens_compare_by_value() {
        assert_ascending(&["1.0.0-alpha.1", "1.0.0-alpha.2", "1.0.0-alpha.10"]);
    }

    #[test]
    fn numeric_token_beats_text_token() {
        assert_ascending(&["1.0.0-alpha.beta", "1.0.0-alpha.1"]);
    }

    #[test]
    fn longer_prerelease_wins_on_shared_prefix() {
        assert_ascending(&["1.0.0-alpha", "1.0.0-alpha.1"]);
    }

    #[test]
    fn build_metadata_breaks_ties() {
        assert_ascending(&["1.0.0+1", "1.0.0+2"]);
    }

    #[test]
    fn original_text_is_last_tiebreak() {
        assert_eq!(v("1.0").compare(&v("1.0.0")), Ordering::Less);
        assert_eq!(v("v1.0.0").compare(&v("1.0.0")), Ordering::Equal);
    }

    // ── Equality ─────────────────────────────────────────────────────────

    #[test]
    fn equality_is_original_text() {
        assert_eq!(v("1.0.0"), v("1.0.0"));
        assert_eq!(v("1.0.0-RC"), v("1.0.0-rc"));
        assert_ne!(v("1.0"), v("1.0.0"));
        assert_ne!(v("v1.0.0"), v("1.0.0"));
    }

    #[test]
    fn max_of_picks_highest() {
        let versions = [v("4.5.0"), v("4.6.1-preview1"), v("4.6.1")];
        assert_eq!(SemanticVersion::max_of(&versions).map(|m| m.original_text()), Some("4.6.1"));
    }
}
