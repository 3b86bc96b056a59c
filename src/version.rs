//! Plugin versions and version matching policies.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Semantic version of a plugin.
///
/// Ordering compares major, then minor, then patch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Version {
    /// Major version.
    pub major: u32,
    /// Minor version.
    pub minor: u32,
    /// Patch version.
    pub patch: u32,
}

impl Version {
    /// Create a new version.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse from a string like "1.4.2".
    pub fn parse(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.trim().split('.').collect();
        if parts.len() != 3 {
            return Err(Error::InvalidVersion(s.to_string()));
        }

        let field = |part: &str| {
            part.parse::<u32>()
                .map_err(|_| Error::InvalidVersion(s.to_string()))
        };

        Ok(Self {
            major: field(parts[0])?,
            minor: field(parts[1])?,
            patch: field(parts[2])?,
        })
    }

    /// Extract the version embedded in a plugin file name.
    ///
    /// Only the last path component is looked at. It is split on `-`, with
    /// runs of dashes counting as one separator; the first token containing
    /// a digit is the major version and the two tokens after it are minor
    /// and patch, so `"plugins/renderer_gl-0-2-11.so"` yields `0.2.11`. Each token
    /// contributes its leading digits, which lets the patch token carry the
    /// file extension.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
        let mut tokens = base
            .split('-')
            .filter(|token| !token.is_empty())
            .skip_while(|token| !token.bytes().any(|b| b.is_ascii_digit()));

        let major = leading_number(tokens.next()?);
        let minor = leading_number(tokens.next()?);
        let patch = leading_number(tokens.next()?);
        Some(Self::new(major, minor, patch))
    }

    /// Three-way comparison with `other`.
    pub fn compare(&self, other: &Version) -> Ordering {
        self.cmp(other)
    }

    /// The `major-minor-patch` token used in plugin file names.
    pub fn file_token(&self) -> String {
        format!("{}-{}-{}", self.major, self.minor, self.patch)
    }
}

/// Digits at the start of `token`, or 0 when there are none.
fn leading_number(token: &str) -> u32 {
    let digits = token.bytes().take_while(u8::is_ascii_digit).count();
    token[..digits].parse().unwrap_or(0)
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

/// How a candidate version is matched against a requested one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum VersionPolicy {
    /// Major, minor and patch must all be equal.
    Exact,
    /// The candidate must be at least the requested version.
    #[default]
    Minimum,
}

impl VersionPolicy {
    /// Whether `candidate` satisfies this policy for `target`.
    pub fn accepts(&self, candidate: &Version, target: &Version) -> bool {
        let ordering = candidate.compare(target);
        match self {
            Self::Exact => ordering == Ordering::Equal,
            Self::Minimum => ordering != Ordering::Less,
        }
    }

    /// Policy name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Minimum => "minimum",
        }
    }
}

impl fmt::Display for VersionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "exact" => Ok(Self::Exact),
            "minimum" => Ok(Self::Minimum),
            other => Err(Error::InvalidPolicy(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        let v = Version::parse("0.18.5").unwrap();
        assert_eq!(v, Version::new(0, 18, 5));

        assert!(Version::parse("1.0").is_err());
        assert!(Version::parse("1.x.0").is_err());
        assert!(Version::parse("1.2.3.4").is_err());
    }

    #[test]
    fn test_version_from_file_name() {
        assert_eq!(
            Version::from_file_name("plugins/foo-1-0-0.so"),
            Some(Version::new(1, 0, 0))
        );
        assert_eq!(
            Version::from_file_name("plugins/renderer_gl-0-2-11.dll"),
            Some(Version::new(0, 2, 11))
        );
        assert_eq!(
            Version::from_file_name("plugins/lib-menu-2-1-3-debug.so"),
            Some(Version::new(2, 1, 3))
        );
        assert_eq!(
            Version::from_file_name("/tmp/build2/plugins/foo-1-4-0.so"),
            Some(Version::new(1, 4, 0))
        );
        assert_eq!(
            Version::from_file_name("plugins/foo-1-2--3.so"),
            Some(Version::new(1, 2, 3))
        );
        assert_eq!(
            Version::from_file_name("plugins/foo--0-4-1-.so"),
            Some(Version::new(0, 4, 1))
        );
        assert_eq!(Version::from_file_name("plugins/foo-1-0.so"), None);
        assert_eq!(Version::from_file_name("plugins/foo.so"), None);
    }

    #[test]
    fn test_version_ordering() {
        let v = Version::new(1, 5, 0);
        assert!(Version::new(2, 0, 0) > v);
        assert!(Version::new(1, 6, 0) > v);
        assert!(Version::new(1, 5, 1) > v);
        assert!(Version::new(1, 4, 9) < v);
        assert!(Version::new(0, 9, 9) < v);
    }

    #[test]
    fn test_policy_accepts() {
        let target = Version::new(1, 5, 0);

        assert!(VersionPolicy::Minimum.accepts(&Version::new(2, 0, 0), &target));
        assert!(VersionPolicy::Minimum.accepts(&Version::new(1, 5, 0), &target));
        assert!(!VersionPolicy::Minimum.accepts(&Version::new(1, 0, 0), &target));

        assert!(VersionPolicy::Exact.accepts(&Version::new(1, 5, 0), &target));
        assert!(!VersionPolicy::Exact.accepts(&Version::new(2, 0, 0), &target));
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("exact".parse::<VersionPolicy>().unwrap(), VersionPolicy::Exact);
        assert_eq!("minimum".parse::<VersionPolicy>().unwrap(), VersionPolicy::Minimum);
        assert!("newest".parse::<VersionPolicy>().is_err());
        assert_eq!(VersionPolicy::default(), VersionPolicy::Minimum);
    }

    #[test]
    fn test_file_token() {
        assert_eq!(Version::new(1, 2, 3).file_token(), "1-2-3");
        assert_eq!(Version::new(1, 2, 3).to_string(), "1.2.3");
    }
}
