//! Version parsing and version ranges
//!
//! Versions are plain `semver::Version`s, parsed leniently so that `1` and
//! `1.2` are accepted as `1.0.0` and `1.2.0`. Ranges are intervals with
//! inclusive or exclusive bounds and an optional floating behavior.
//!
//! Accepted range syntax:
//! - `1.0.0` - minimum version, inclusive (`>= 1.0.0`)
//! - `[1.0.0]` - exact version
//! - `[1.0.0, 2.0.0)`, `(1.0.0, )`, `(, 2.0.0]` - interval notation
//! - `^1.2.3`, `~1.2.3` - caret and tilde shorthands
//! - `*`, `1.*`, `1.2.*` - floating ranges (highest matching version wins)

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("Invalid version '{0}'")]
    InvalidVersion(String),

    #[error("Invalid version range '{input}': {reason}")]
    InvalidRange { input: String, reason: String },
}

impl VersionError {
    fn range(input: &str, reason: impl Into<String>) -> Self {
        Self::InvalidRange {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// Parse a version, padding missing minor/patch components with zero
pub fn parse_version(input: &str) -> Result<Version, VersionError> {
    let trimmed = input.trim();
    let invalid = || VersionError::InvalidVersion(input.to_string());

    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split_at);

    let parts: Vec<&str> = core.split('.').collect();
    if parts.len() > 3
        || parts
            .iter()
            .any(|p| p.is_empty() || !p.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(invalid());
    }

    let mut normalized = parts.join(".");
    for _ in parts.len()..3 {
        normalized.push_str(".0");
    }
    normalized.push_str(suffix);

    Version::parse(&normalized).map_err(|_| invalid())
}

/// Which component of a floating range is allowed to move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FloatBehavior {
    /// `*` - any version
    Major,
    /// `1.*` - any minor/patch of a fixed major
    Minor,
    /// `1.2.*` - any patch of a fixed major.minor
    Patch,
}

/// A possibly-open interval over versions
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionRange {
    min: Option<Version>,
    min_inclusive: bool,
    max: Option<Version>,
    max_inclusive: bool,
    float: Option<FloatBehavior>,
}

impl VersionRange {
    /// `[version, )`
    pub fn at_least(version: Version) -> Self {
        Self {
            min: Some(version),
            min_inclusive: true,
            max: None,
            max_inclusive: false,
            float: None,
        }
    }

    /// `[version]`
    pub fn exact(version: Version) -> Self {
        Self {
            min: Some(version.clone()),
            min_inclusive: true,
            max: Some(version),
            max_inclusive: true,
            float: None,
        }
    }

    /// Any stable version (`[0.0.0, )`)
    pub fn any() -> Self {
        Self::at_least(Version::new(0, 0, 0))
    }

    /// Build an interval from explicit bounds
    pub fn between(
        min: Option<Version>,
        min_inclusive: bool,
        max: Option<Version>,
        max_inclusive: bool,
    ) -> Result<Self, VersionError> {
        let range = Self {
            min,
            min_inclusive,
            max,
            max_inclusive,
            float: None,
        };
        range.check_bounds()?;
        Ok(range)
    }

    fn check_bounds(&self) -> Result<(), VersionError> {
        if self.min.is_none() && self.max.is_none() {
            return Err(VersionError::range(&self.to_string(), "at least one bound is required"));
        }
        if let (Some(min), Some(max)) = (&self.min, &self.max) {
            match min.cmp(max) {
                Ordering::Greater => {
                    return Err(VersionError::range(
                        &self.to_string(),
                        "minimum is greater than maximum",
                    ))
                }
                Ordering::Equal if !(self.min_inclusive && self.max_inclusive) => {
                    return Err(VersionError::range(&self.to_string(), "range is empty"))
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn min_version(&self) -> Option<&Version> {
        self.min.as_ref()
    }

    pub fn max_version(&self) -> Option<&Version> {
        self.max.as_ref()
    }

    pub fn is_min_inclusive(&self) -> bool {
        self.min_inclusive
    }

    pub fn is_max_inclusive(&self) -> bool {
        self.max_inclusive
    }

    pub fn is_floating(&self) -> bool {
        self.float.is_some()
    }

    pub fn float_behavior(&self) -> Option<FloatBehavior> {
        self.float
    }

    /// Whether this range pins exactly one version
    pub fn is_exact(&self) -> bool {
        matches!((&self.min, &self.max), (Some(min), Some(max)) if min == max)
            && self.min_inclusive
            && self.max_inclusive
    }

    /// Check whether `version` lies inside this range.
    ///
    /// Pre-release versions only satisfy a range when one of its bounds is
    /// itself a pre-release.
    pub fn satisfies(&self, version: &Version) -> bool {
        if !version.pre.is_empty() && !self.allows_prerelease() {
            return false;
        }

        if let Some(min) = &self.min {
            match version.cmp(min) {
                Ordering::Less => return false,
                Ordering::Equal if !self.min_inclusive => return false,
                _ => {}
            }
        }

        if let Some(max) = &self.max {
            match version.cmp(max) {
                Ordering::Greater => return false,
                Ordering::Equal if !self.max_inclusive => return false,
                _ => {}
            }
        }

        true
    }

    fn allows_prerelease(&self) -> bool {
        self.min.as_ref().is_some_and(|v| !v.pre.is_empty())
            || self.max.as_ref().is_some_and(|v| !v.pre.is_empty())
    }

    /// Pick the best version out of `candidates`.
    ///
    /// Fixed ranges take the lowest satisfying version; floating ranges take
    /// the highest.
    pub fn find_best_match<'a, I>(&self, candidates: I) -> Option<&'a Version>
    where
        I: IntoIterator<Item = &'a Version>,
    {
        let satisfying = candidates.into_iter().filter(|v| self.satisfies(v));
        if self.is_floating() {
            satisfying.max()
        } else {
            satisfying.min()
        }
    }

    /// Whether some version could satisfy both ranges
    pub fn intersects(&self, other: &VersionRange) -> bool {
        let (lower, lower_inclusive) = tighter_lower(
            (self.min.as_ref(), self.min_inclusive),
            (other.min.as_ref(), other.min_inclusive),
        );
        let (upper, upper_inclusive) = tighter_upper(
            (self.max.as_ref(), self.max_inclusive),
            (other.max.as_ref(), other.max_inclusive),
        );

        match (lower, upper) {
            (Some(lower), Some(upper)) => match lower.cmp(upper) {
                Ordering::Less => true,
                Ordering::Equal => lower_inclusive && upper_inclusive,
                Ordering::Greater => false,
            },
            _ => true,
        }
    }

    /// Human-readable form used in diagnostics (`>= 1.0.0`, `= 2.0.0`)
    pub fn pretty(&self) -> String {
        if self.float.is_some() {
            return self.to_string();
        }
        if self.is_exact() {
            if let Some(min) = &self.min {
                return format!("= {}", min);
            }
        }

        let lower = self.min.as_ref().map(|v| {
            let op = if self.min_inclusive { ">=" } else { ">" };
            format!("{} {}", op, v)
        });
        let upper = self.max.as_ref().map(|v| {
            let op = if self.max_inclusive { "<=" } else { "<" };
            format!("{} {}", op, v)
        });

        match (lower, upper) {
            (Some(lower), Some(upper)) => format!("{} && {}", lower, upper),
            (Some(lower), None) => lower,
            (None, Some(upper)) => upper,
            (None, None) => String::new(),
        }
    }

    fn parse_interval(input: &str) -> Result<Self, VersionError> {
        let min_inclusive = input.starts_with('[');
        let max_inclusive = match input.chars().last() {
            Some(']') => true,
            Some(')') => false,
            _ => return Err(VersionError::range(input, "interval must end with ']' or ')'")),
        };
        if input.len() < 2 {
            return Err(VersionError::range(input, "empty interval"));
        }

        let inner = &input[1..input.len() - 1];
        let Some((left, right)) = inner.split_once(',') else {
            if !(min_inclusive && max_inclusive) {
                return Err(VersionError::range(input, "single-version interval must use [ ]"));
            }
            return Ok(Self::exact(parse_version(inner)?));
        };

        let bound = |s: &str| -> Result<Option<Version>, VersionError> {
            let s = s.trim();
            if s.is_empty() {
                Ok(None)
            } else {
                parse_version(s).map(Some)
            }
        };

        let min = bound(left)?;
        let max = bound(right)?;
        let range = Self {
            min_inclusive: min_inclusive && min.is_some(),
            max_inclusive: max_inclusive && max.is_some(),
            min,
            max,
            float: None,
        };
        range
            .check_bounds()
            .map_err(|_| VersionError::range(input, "invalid interval bounds"))?;
        Ok(range)
    }

    fn parse_floating(input: &str) -> Result<Self, VersionError> {
        let parts: Vec<&str> = input.split('.').collect();
        let Some((last, fixed)) = parts.split_last() else {
            return Err(VersionError::range(input, "empty floating range"));
        };
        if *last != "*" || fixed.iter().any(|p| p.contains('*')) || fixed.len() > 2 {
            return Err(VersionError::range(input, "only the last component may float"));
        }

        let numbers = fixed
            .iter()
            .map(|p| p.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| VersionError::range(input, "non-numeric version component"))?;

        let (float, min, max) = match numbers.as_slice() {
            [] => (FloatBehavior::Major, Version::new(0, 0, 0), None),
            [major] => (
                FloatBehavior::Minor,
                Version::new(*major, 0, 0),
                Some(Version::new(bump(input, *major)?, 0, 0)),
            ),
            [major, minor] => (
                FloatBehavior::Patch,
                Version::new(*major, *minor, 0),
                Some(Version::new(*major, bump(input, *minor)?, 0)),
            ),
            _ => return Err(VersionError::range(input, "too many components")),
        };

        Ok(Self {
            min: Some(min),
            min_inclusive: true,
            max,
            max_inclusive: false,
            float: Some(float),
        })
    }

    fn parse_caret(input: &str, version: &str) -> Result<Self, VersionError> {
        let min = parse_version(version)?;
        let max = if min.major > 0 {
            Version::new(bump(input, min.major)?, 0, 0)
        } else if min.minor > 0 {
            Version::new(0, bump(input, min.minor)?, 0)
        } else {
            Version::new(0, 0, bump(input, min.patch)?)
        };
        Self::between(Some(min), true, Some(max), false)
            .map_err(|_| VersionError::range(input, "invalid caret range"))
    }

    fn parse_tilde(input: &str, version: &str) -> Result<Self, VersionError> {
        let min = parse_version(version)?;
        let max = Version::new(min.major, bump(input, min.minor)?, 0);
        Self::between(Some(min), true, Some(max), false)
            .map_err(|_| VersionError::range(input, "invalid tilde range"))
    }
}

/// Next value of a version component, used for exclusive upper bounds
fn bump(input: &str, component: u64) -> Result<u64, VersionError> {
    component
        .checked_add(1)
        .ok_or_else(|| VersionError::range(input, "version component out of range"))
}

fn tighter_lower<'a>(
    a: (Option<&'a Version>, bool),
    b: (Option<&'a Version>, bool),
) -> (Option<&'a Version>, bool) {
    match (a.0, b.0) {
        (None, _) => b,
        (_, None) => a,
        (Some(va), Some(vb)) => match va.cmp(vb) {
            Ordering::Greater => a,
            Ordering::Less => b,
            Ordering::Equal => (Some(va), a.1 && b.1),
        },
    }
}

fn tighter_upper<'a>(
    a: (Option<&'a Version>, bool),
    b: (Option<&'a Version>, bool),
) -> (Option<&'a Version>, bool) {
    match (a.0, b.0) {
        (None, _) => b,
        (_, None) => a,
        (Some(va), Some(vb)) => match va.cmp(vb) {
            Ordering::Less => a,
            Ordering::Greater => b,
            Ordering::Equal => (Some(va), a.1 && b.1),
        },
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(VersionError::range(s, "empty range"));
        }

        if input.starts_with('[') || input.starts_with('(') {
            Self::parse_interval(input)
        } else if let Some(rest) = input.strip_prefix('^') {
            Self::parse_caret(input, rest)
        } else if let Some(rest) = input.strip_prefix('~') {
            Self::parse_tilde(input, rest)
        } else if input.contains('*') {
            Self::parse_floating(input)
        } else {
            Ok(Self::at_least(parse_version(input)?))
        }
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(float), Some(min)) = (self.float, &self.min) {
            return match float {
                FloatBehavior::Major => write!(f, "*"),
                FloatBehavior::Minor => write!(f, "{}.*", min.major),
                FloatBehavior::Patch => write!(f, "{}.{}.*", min.major, min.minor),
            };
        }

        if self.is_exact() {
            if let Some(min) = &self.min {
                return write!(f, "[{}]", min);
            }
        }

        let open = if self.min_inclusive { '[' } else { '(' };
        let close = if self.max_inclusive { ']' } else { ')' };
        let min = self.min.as_ref().map(ToString::to_string).unwrap_or_default();
        match &self.max {
            Some(max) => write!(f, "{}{}, {}{}", open, min, max, close),
            None => write!(f, "{}{}, {}", open, min, close),
        }
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
