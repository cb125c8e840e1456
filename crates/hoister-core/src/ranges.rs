//! npm-style version range handling.
//!
//! Ranges arriving from manifests are data, not trusted input: anything that
//! fails to parse is carried verbatim and treated as *non-semver*. The
//! intersection operation never errors; unparseable or disjoint inputs both
//! yield `None`.

use semver::{Comparator, Op, Version, VersionReq};

/// Check whether a range parses as a semver range.
///
/// OR ranges (`^1 || ^2`) are valid when every alternative parses. Git URLs,
/// tags, and local paths are not.
#[must_use]
pub fn is_valid_range(range: &str) -> bool {
    range.split("||").all(|alt| parse_single(alt).is_some())
}

/// Check whether `version` satisfies `range`.
///
/// Supports OR ranges; an unparseable alternative is skipped rather than
/// failing the whole check.
#[must_use]
pub fn satisfies(version: &Version, range: &str) -> bool {
    range
        .split("||")
        .filter_map(parse_single)
        .any(|req| req.matches(version))
}

/// Check whether a version string satisfies `range`.
///
/// An unparseable version satisfies nothing.
#[must_use]
pub fn version_satisfies(version: &str, range: &str) -> bool {
    Version::parse(version.trim()).is_ok_and(|v| satisfies(&v, range))
}

/// Intersect two ranges.
///
/// Returns the range satisfied by exactly those versions that satisfy both
/// inputs, or `None` when the inputs are disjoint or either fails to parse.
/// When one input already equals the intersection, that input is returned
/// verbatim (`b` preferred), so callers can detect "key unchanged" by string
/// equality.
#[must_use]
pub fn intersect(a: &str, b: &str) -> Option<String> {
    let (a, b) = (a.trim(), b.trim());
    // OR ranges do not intersect cleanly; callers fall back to exact-text
    // grouping for them.
    if a.contains("||") || b.contains("||") {
        return None;
    }

    let ia = range_interval(a)?;
    let ib = range_interval(b)?;
    let ic = intersect_intervals(&ia, &ib)?;

    if ic == ib {
        return Some(b.to_string());
    }
    if ic == ia {
        return Some(a.to_string());
    }
    Some(render_interval(&ic))
}

/// Lowest version a range admits, used for planner tie-breaking.
///
/// Returns `None` for OR ranges and non-semver ranges. An unbounded-below
/// range floors at `0.0.0`.
#[must_use]
pub fn range_floor(range: &str) -> Option<Version> {
    if range.contains("||") {
        return None;
    }
    let interval = range_interval(range.trim())?;
    Some(match interval.lo {
        Some(bound) => bound.version,
        None => Version::new(0, 0, 0),
    })
}

/// Parse a single range (no `||`), handling npm syntax the `semver` crate
/// does not accept directly: hyphen ranges and space-separated AND
/// comparators. Wildcards (`1.x`, `*`) parse natively.
fn parse_single(range: &str) -> Option<VersionReq> {
    let range = range.trim();

    // npm treats the empty range as "any version".
    if range.is_empty() {
        return Some(VersionReq::STAR);
    }

    // A bare full version is an exact pin, not the caret default the
    // semver crate would apply to it.
    if let Ok(version) = Version::parse(range) {
        return VersionReq::parse(&format!("={version}")).ok();
    }

    // Hyphen range: "1.0.0 - 2.0.0" means ">=1.0.0, <=2.0.0".
    if let Some((start, end)) = range.split_once(" - ") {
        let (start, end) = (start.trim(), end.trim());
        if start.is_empty() || end.is_empty() {
            return None;
        }
        return VersionReq::parse(&format!(">={start}, <={end}")).ok();
    }

    VersionReq::parse(&join_comparators(range)).ok()
}

/// Normalize space-separated AND comparators to the comma form the `semver`
/// crate requires: ">= 2.1.2 < 3.0.0" becomes ">=2.1.2, <3.0.0".
fn join_comparators(range: &str) -> String {
    let mut parts: Vec<String> = Vec::new();
    for token in range.split_whitespace() {
        match parts.last_mut() {
            // A bare operator ("<", ">=") binds to the version token after it.
            Some(last) if last_is_bare_op(last) => last.push_str(token),
            _ => parts.push(token.to_string()),
        }
    }
    parts.join(", ")
}

fn last_is_bare_op(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| matches!(c, '>' | '<' | '=' | '~' | '^'))
}

/// One endpoint of a version interval.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Bound {
    version: Version,
    inclusive: bool,
}

impl Bound {
    fn inclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: true,
        }
    }

    fn exclusive(version: Version) -> Self {
        Self {
            version,
            inclusive: false,
        }
    }
}

/// A contiguous version interval. `None` endpoints are unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct Interval {
    lo: Option<Bound>,
    hi: Option<Bound>,
}

fn range_interval(range: &str) -> Option<Interval> {
    let req = parse_single(range)?;
    let mut interval = Interval::default();
    for comparator in &req.comparators {
        let next = comparator_interval(comparator)?;
        interval = intersect_intervals(&interval, &next)?;
    }
    Some(interval)
}

/// Translate one comparator into an interval, following the `semver` crate's
/// semantics for partial versions (`^1`, `<=2.3`, `1.x`).
#[allow(clippy::too_many_lines)]
fn comparator_interval(c: &Comparator) -> Option<Interval> {
    let major = c.major;
    let base = {
        let mut v = Version::new(major, c.minor.unwrap_or(0), c.patch.unwrap_or(0));
        v.pre = c.pre.clone();
        v
    };

    let interval = match c.op {
        Op::Exact | Op::Wildcard => match (c.minor, c.patch) {
            (None, _) => span(Version::new(major, 0, 0), Version::new(major + 1, 0, 0)),
            (Some(minor), None) => span(
                Version::new(major, minor, 0),
                Version::new(major, minor + 1, 0),
            ),
            (Some(_), Some(_)) => Interval {
                lo: Some(Bound::inclusive(base.clone())),
                hi: Some(Bound::inclusive(base)),
            },
        },
        Op::Greater => match (c.minor, c.patch) {
            (None, _) => from(Bound::inclusive(Version::new(major + 1, 0, 0))),
            (Some(minor), None) => from(Bound::inclusive(Version::new(major, minor + 1, 0))),
            (Some(_), Some(_)) => from(Bound::exclusive(base)),
        },
        Op::GreaterEq => from(Bound::inclusive(base)),
        Op::Less => match (c.minor, c.patch) {
            (None, _) => until(Bound::exclusive(Version::new(major, 0, 0))),
            (Some(minor), None) => until(Bound::exclusive(Version::new(major, minor, 0))),
            (Some(_), Some(_)) => until(Bound::exclusive(base)),
        },
        Op::LessEq => match (c.minor, c.patch) {
            (None, _) => until(Bound::exclusive(Version::new(major + 1, 0, 0))),
            (Some(minor), None) => until(Bound::exclusive(Version::new(major, minor + 1, 0))),
            (Some(_), Some(_)) => until(Bound::inclusive(base)),
        },
        Op::Tilde => match (c.minor, c.patch) {
            (None, _) => span(Version::new(major, 0, 0), Version::new(major + 1, 0, 0)),
            (Some(minor), None) => span(
                Version::new(major, minor, 0),
                Version::new(major, minor + 1, 0),
            ),
            (Some(minor), Some(_)) => Interval {
                lo: Some(Bound::inclusive(base)),
                hi: Some(Bound::exclusive(Version::new(major, minor + 1, 0))),
            },
        },
        Op::Caret => caret_interval(c, base),
        // Op is non_exhaustive; anything unknown is unrepresentable.
        _ => return None,
    };

    Some(interval)
}

fn caret_interval(c: &Comparator, base: Version) -> Interval {
    let major = c.major;
    if major > 0 {
        return Interval {
            lo: Some(Bound::inclusive(base)),
            hi: Some(Bound::exclusive(Version::new(major + 1, 0, 0))),
        };
    }
    match (c.minor, c.patch) {
        // ^0 admits all of 0.x.y.
        (None, _) => span(Version::new(0, 0, 0), Version::new(1, 0, 0)),
        (Some(0), None) => span(Version::new(0, 0, 0), Version::new(0, 1, 0)),
        (Some(0), Some(patch)) => Interval {
            lo: Some(Bound::inclusive(base)),
            hi: Some(Bound::exclusive(Version::new(0, 0, patch + 1))),
        },
        (Some(minor), _) => Interval {
            lo: Some(Bound::inclusive(base)),
            hi: Some(Bound::exclusive(Version::new(0, minor + 1, 0))),
        },
    }
}

fn span(lo: Version, hi: Version) -> Interval {
    Interval {
        lo: Some(Bound::inclusive(lo)),
        hi: Some(Bound::exclusive(hi)),
    }
}

fn from(lo: Bound) -> Interval {
    Interval {
        lo: Some(lo),
        hi: None,
    }
}

fn until(hi: Bound) -> Interval {
    Interval {
        lo: None,
        hi: Some(hi),
    }
}

/// Intersect two intervals; `None` means the result is empty.
fn intersect_intervals(a: &Interval, b: &Interval) -> Option<Interval> {
    let lo = tighter_lo(a.lo.as_ref(), b.lo.as_ref());
    let hi = tighter_hi(a.hi.as_ref(), b.hi.as_ref());

    if let (Some(lo), Some(hi)) = (&lo, &hi) {
        if lo.version > hi.version {
            return None;
        }
        if lo.version == hi.version && !(lo.inclusive && hi.inclusive) {
            return None;
        }
    }

    Some(Interval { lo, hi })
}

fn tighter_lo(a: Option<&Bound>, b: Option<&Bound>) -> Option<Bound> {
    match (a, b) {
        (None, other) | (other, None) => other.cloned(),
        (Some(a), Some(b)) => {
            if a.version > b.version || (a.version == b.version && !a.inclusive) {
                Some(a.clone())
            } else {
                Some(b.clone())
            }
        }
    }
}

fn tighter_hi(a: Option<&Bound>, b: Option<&Bound>) -> Option<Bound> {
    match (a, b) {
        (None, other) | (other, None) => other.cloned(),
        (Some(a), Some(b)) => {
            if a.version < b.version || (a.version == b.version && !a.inclusive) {
                Some(a.clone())
            } else {
                Some(b.clone())
            }
        }
    }
}

/// Render an interval back to an npm-parseable range string.
fn render_interval(interval: &Interval) -> String {
    match (&interval.lo, &interval.hi) {
        (Some(lo), Some(hi))
            if lo.version == hi.version && lo.inclusive && hi.inclusive =>
        {
            lo.version.to_string()
        }
        (None, None) => "*".to_string(),
        (lo, hi) => {
            let mut parts = Vec::new();
            if let Some(lo) = lo {
                let op = if lo.inclusive { ">=" } else { ">" };
                parts.push(format!("{op}{}", lo.version));
            }
            if let Some(hi) = hi {
                let op = if hi.inclusive { "<=" } else { "<" };
                parts.push(format!("{op}{}", hi.version));
            }
            parts.join(" ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_valid_ranges() {
        assert!(is_valid_range("^1.2.0"));
        assert!(is_valid_range("~1.4.1"));
        assert!(is_valid_range("1.2.3"));
        assert!(is_valid_range("*"));
        assert!(is_valid_range("1.x"));
        assert!(is_valid_range(">=2.1.2 <3.0.0"));
        assert!(is_valid_range("1.0.0 - 2.0.0"));
        assert!(is_valid_range("^1.0.0 || ^2.0.0"));
        assert!(is_valid_range(""));
    }

    #[test]
    fn test_non_semver_ranges() {
        assert!(!is_valid_range("github:org/repo#tag"));
        assert!(!is_valid_range("git+https://github.com/org/repo.git"));
        assert!(!is_valid_range("latest"));
        assert!(!is_valid_range("file:../local"));
    }

    #[test]
    fn test_satisfies_basic() {
        assert!(satisfies(&v("4.17.21"), "^4.17.0"));
        assert!(!satisfies(&v("3.10.0"), "^4.17.0"));
        assert!(satisfies(&v("1.4.2"), "~1.4.1"));
        assert!(!satisfies(&v("1.5.0"), "~1.4.1"));
    }

    #[test]
    fn test_satisfies_or_range() {
        assert!(satisfies(&v("1.5.0"), "^1.0.0 || ^2.0.0"));
        assert!(satisfies(&v("2.5.0"), "^1.0.0 || ^2.0.0"));
        assert!(!satisfies(&v("3.0.0"), "^1.0.0 || ^2.0.0"));
    }

    #[test]
    fn test_satisfies_space_separated() {
        assert!(satisfies(&v("2.5.0"), ">= 2.1.2 < 3.0.0"));
        assert!(!satisfies(&v("3.0.0"), ">= 2.1.2 < 3.0.0"));
        assert!(satisfies(&v("2.1.2"), ">=2.1.2 <3.0.0"));
    }

    #[test]
    fn test_satisfies_hyphen_and_wildcard() {
        assert!(satisfies(&v("1.5.0"), "1.0.0 - 2.0.0"));
        assert!(satisfies(&v("2.0.0"), "1.0.0 - 2.0.0"));
        assert!(!satisfies(&v("2.0.1"), "1.0.0 - 2.0.0"));
        assert!(satisfies(&v("1.9.9"), "1.x"));
        assert!(!satisfies(&v("2.0.0"), "1.x"));
    }

    #[test]
    fn test_bare_version_is_exact_pin() {
        assert!(satisfies(&v("1.2.3"), "1.2.3"));
        assert!(!satisfies(&v("1.2.4"), "1.2.3"));
        assert!(!satisfies(&v("1.9.0"), "1.2.3"));
    }

    #[test]
    fn test_version_satisfies_bad_version() {
        assert!(!version_satisfies("not-a-version", "^1.0.0"));
        assert!(version_satisfies("1.2.3", "^1.0.0"));
    }

    #[test]
    fn test_intersect_subset_returns_existing_verbatim() {
        // The narrower range comes back as its literal input text.
        assert_eq!(
            intersect("^1.2.0", "~1.4.1").as_deref(),
            Some("~1.4.1")
        );
        assert_eq!(
            intersect("~1.4.1", "^1.2.0").as_deref(),
            Some("~1.4.1")
        );
    }

    #[test]
    fn test_intersect_disjoint() {
        assert_eq!(intersect("^3.0.0", "^4.0.0"), None);
        assert_eq!(intersect("~1.2.0", "~1.4.0"), None);
        assert_eq!(intersect("<1.0.0", ">=1.0.0"), None);
    }

    #[test]
    fn test_intersect_identical() {
        assert_eq!(intersect("^4.17.0", "^4.17.0").as_deref(), Some("^4.17.0"));
    }

    #[test]
    fn test_intersect_exact_within_range() {
        assert_eq!(intersect("1.2.3", "^1.0.0").as_deref(), Some("1.2.3"));
        assert_eq!(intersect("^1.0.0", "1.2.3").as_deref(), Some("1.2.3"));
    }

    #[test]
    fn test_intersect_partial_overlap_renders_compound() {
        let result = intersect(">=1.0.0 <1.5.0", "^1.2.0").unwrap();
        assert_eq!(result, ">=1.2.0 <1.5.0");
        // The rendered range must itself be a valid range.
        assert!(is_valid_range(&result));
        assert!(satisfies(&v("1.4.9"), &result));
        assert!(!satisfies(&v("1.5.0"), &result));
        assert!(!satisfies(&v("1.1.0"), &result));
    }

    #[test]
    fn test_intersect_unparseable_is_none_not_error() {
        assert_eq!(intersect("github:org/repo#tag", "^1.0.0"), None);
        assert_eq!(intersect("^1.0.0", "latest"), None);
        assert_eq!(intersect("latest", "latest"), None);
    }

    #[test]
    fn test_intersect_or_ranges_never_intersect() {
        assert_eq!(intersect("^1.0.0 || ^2.0.0", "^1.0.0"), None);
    }

    #[test]
    fn test_intersect_star() {
        assert_eq!(intersect("*", "^2.0.0").as_deref(), Some("^2.0.0"));
    }

    #[test]
    fn test_intersect_touching_bounds() {
        // [_, 2.0.0] and [2.0.0, _] meet at a single point.
        assert_eq!(intersect("<=2.0.0", ">=2.0.0").as_deref(), Some("2.0.0"));
        assert_eq!(intersect("<2.0.0", ">=2.0.0"), None);
    }

    #[test]
    fn test_range_floor() {
        assert_eq!(range_floor("^4.0.0"), Some(v("4.0.0")));
        assert_eq!(range_floor("~1.4.1"), Some(v("1.4.1")));
        assert_eq!(range_floor("*"), Some(v("0.0.0")));
        assert_eq!(range_floor("<2.0.0"), Some(v("0.0.0")));
        assert_eq!(range_floor("github:org/repo"), None);
        assert_eq!(range_floor("^1.0.0 || ^2.0.0"), None);
    }

    #[test]
    fn test_partial_version_ops() {
        assert!(satisfies(&v("2.5.0"), "2"));
        assert!(satisfies(&v("2.5.0"), "^2"));
        assert!(!satisfies(&v("3.0.0"), "2"));
        assert!(satisfies(&v("2.9.9"), "<=2"));
        assert!(!satisfies(&v("3.0.0"), "<=2"));
    }

    #[test]
    fn test_prerelease_bound() {
        assert!(satisfies(&v("2.0.0-beta.2"), ">=2.0.0-beta.1 <2.0.0"));
        assert!(!satisfies(&v("2.0.0"), ">=2.0.0-beta.1 <2.0.0"));
    }
}
