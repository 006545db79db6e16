//! Version tag parsing and ordering
//!
//! Profile versions are published as repository tags shaped like
//! `vMAJOR.MINOR.PATCH[-prerelease]`. Canonical tags go through the `semver`
//! parser; anything else with a numeric leading component is parsed loosely
//! so that tags like `v1.2` or `1.0.0.1` still order sensibly.
//!
//! Ordering never fails. A tag that cannot be parsed at all (e.g. `latest`)
//! sorts before every parseable tag, and two such tags compare by their raw
//! text, which keeps [`compare`] a total order.

use std::cmp::Ordering;
use std::fmt;

/// A single dot/hyphen separated component of a version tag
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Segment {
    /// Numeric components sort before alphanumeric ones
    Numeric(u64),
    Text(String),
}

impl Segment {
    fn parse(part: &str) -> Self {
        if !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = part.parse::<u64>() {
                return Segment::Numeric(n);
            }
        }
        Segment::Text(part.to_string())
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Numeric(n) => write!(f, "{n}"),
            Segment::Text(s) => f.write_str(s),
        }
    }
}

/// A parsed version tag
#[derive(Debug, Clone)]
pub struct VersionTag {
    release: Vec<Segment>,
    pre: Vec<Segment>,
}

impl VersionTag {
    /// Parse a tag, returning `None` when it has no numeric leading component
    pub fn parse(tag: &str) -> Option<Self> {
        let trimmed = tag.trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        // Build metadata never participates in precedence
        let without_build = trimmed
            .split_once('+')
            .map(|(version, _)| version)
            .unwrap_or(trimmed);

        if let Ok(version) = semver::Version::parse(without_build) {
            return Some(Self::from_semver(&version));
        }

        Self::parse_loose(without_build)
    }

    fn from_semver(version: &semver::Version) -> Self {
        let pre = if version.pre.is_empty() {
            Vec::new()
        } else {
            version.pre.as_str().split(['.', '-']).map(Segment::parse).collect()
        };

        Self {
            release: vec![
                Segment::Numeric(version.major),
                Segment::Numeric(version.minor),
                Segment::Numeric(version.patch),
            ],
            pre,
        }
    }

    fn parse_loose(version: &str) -> Option<Self> {
        let (release, pre) = match version.split_once('-') {
            Some((release, pre)) => (release, Some(pre)),
            None => (version, None),
        };

        let release: Vec<Segment> = release.split('.').map(Segment::parse).collect();
        if !matches!(release.first(), Some(Segment::Numeric(_))) {
            return None;
        }

        let pre = pre
            .map(|p| p.split(['.', '-']).map(Segment::parse).collect())
            .unwrap_or_default();

        Some(Self { release, pre })
    }

}

impl Ord for VersionTag {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_release(&self.release, &other.release)
            .then_with(|| compare_prerelease(&self.pre, &other.pre))
    }
}

impl PartialOrd for VersionTag {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Equality follows ordering, so `v1.2` == `v1.2.0`.
impl PartialEq for VersionTag {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionTag {}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let release: Vec<String> = self.release.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", release.join("."))?;
        if !self.pre.is_empty() {
            let pre: Vec<String> = self.pre.iter().map(|s| s.to_string()).collect();
            write!(f, "-{}", pre.join("."))?;
        }
        Ok(())
    }
}

fn compare_release(a: &[Segment], b: &[Segment]) -> Ordering {
    let zero = Segment::Numeric(0);
    let len = a.len().max(b.len());

    for i in 0..len {
        let left = a.get(i).unwrap_or(&zero);
        let right = b.get(i).unwrap_or(&zero);
        match left.cmp(right) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    Ordering::Equal
}

fn compare_prerelease(a: &[Segment], b: &[Segment]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        // A release sorts after any of its prereleases
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(b),
    }
}

/// Compare two version tags
///
/// Unparseable tags sort before all parseable ones.
pub fn compare(a: &str, b: &str) -> Ordering {
    match (VersionTag::parse(a), VersionTag::parse(b)) {
        (Some(left), Some(right)) => left.cmp(&right),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

/// Whether `candidate` is provably newer than `bound`
///
/// An unparseable candidate is never newer.
pub fn is_newer(candidate: &str, bound: &str) -> bool {
    VersionTag::parse(candidate).is_some() && compare(candidate, bound) == Ordering::Greater
}

/// Sort tags ascending; ties between equivalent tags fall back to the raw text
pub fn sort_tags(tags: &mut [String]) {
    tags.sort_by(|a, b| compare(a, b).then_with(|| a.cmp(b)));
}
