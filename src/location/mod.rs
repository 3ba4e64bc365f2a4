//! Data locations
//!
//! A `DataLocation` is the absolute, fully-qualified URI of a table or
//! partition data directory: an optional scheme and authority followed by an
//! absolute path. Parsing canonicalises the path (repeated and trailing
//! slashes collapse) so that two spellings of one directory compare equal.
//!
//! Accepted forms:
//! - `/warehouse/db.db/t1`
//! - `hdfs://namenode:8020/warehouse/db.db/t1`
//! - `file:///tmp/t1` (scheme with empty authority)
//! - `file:/tmp/t1` (scheme without authority)

mod encoder;
mod rebase;

pub use encoder::{decode, encode, encode_str};
pub use rebase::{rebase, Rebaser};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ReplError, ReplResult};

/// Absolute location of a data directory
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataLocation {
    scheme: Option<String>,
    authority: Option<String>,
    /// Canonical absolute path, always starting with `/`
    path: String,
}

impl DataLocation {
    /// Parses and canonicalises a location.
    ///
    /// # Errors
    ///
    /// Returns `ReplError::Encoding` for empty or relative paths, control
    /// characters, `.`/`..` segments and malformed schemes.
    pub fn parse(raw: &str) -> ReplResult<Self> {
        if raw.is_empty() {
            return Err(ReplError::encoding("empty location"));
        }
        if raw.chars().any(|c| c.is_control()) {
            return Err(ReplError::encoding(format!(
                "location contains control characters: {:?}",
                raw
            )));
        }

        let (scheme, authority, path) = match split_scheme(raw)? {
            Some((scheme, rest)) => match rest.strip_prefix("//") {
                Some(after) => {
                    let (authority, path) = match after.find('/') {
                        Some(idx) => (&after[..idx], &after[idx..]),
                        None => (after, "/"),
                    };
                    let authority = if authority.is_empty() {
                        None
                    } else {
                        Some(authority.to_string())
                    };
                    (Some(scheme.to_ascii_lowercase()), authority, path)
                }
                None => (Some(scheme.to_ascii_lowercase()), None, rest),
            },
            None => (None, None, raw),
        };

        if !path.starts_with('/') {
            return Err(ReplError::encoding(format!(
                "location is not absolute: {}",
                raw
            )));
        }

        Ok(Self {
            scheme,
            authority,
            path: canonical_path(path, raw)?,
        })
    }

    /// Builds a location from a bare absolute path.
    pub fn from_path(path: &str) -> ReplResult<Self> {
        if !path.starts_with('/') {
            return Err(ReplError::encoding(format!(
                "location is not absolute: {}",
                path
            )));
        }
        Self::parse(path)
    }

    /// URI scheme, lowercased
    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// URI authority (host and port)
    pub fn authority(&self) -> Option<&str> {
        self.authority.as_deref()
    }

    /// Canonical absolute path
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Non-empty path segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    /// Appends a relative fragment (e.g. `country=india`) to the path.
    pub fn join(&self, fragment: &str) -> ReplResult<Self> {
        let joined = format!("{}/{}", self.path, fragment);
        Ok(Self {
            scheme: self.scheme.clone(),
            authority: self.authority.clone(),
            path: canonical_path(&joined, &joined)?,
        })
    }

    /// Same scheme and authority with an already canonical `path`.
    pub(crate) fn with_canonical_path(&self, path: String) -> Self {
        debug_assert!(path.starts_with('/'));
        Self {
            scheme: self.scheme.clone(),
            authority: self.authority.clone(),
            path,
        }
    }

    /// Whether `self` equals `ancestor` or lies below it.
    pub fn is_within(&self, ancestor: &DataLocation) -> bool {
        if self.scheme != ancestor.scheme || self.authority != ancestor.authority {
            return false;
        }
        if ancestor.path == "/" {
            return true;
        }
        self.path == ancestor.path
            || self
                .path
                .strip_prefix(&ancestor.path)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Splits `scheme:` off the front of a location, if there is one.
fn split_scheme(raw: &str) -> ReplResult<Option<(&str, &str)>> {
    let colon = match raw.find(':') {
        Some(idx) => idx,
        None => return Ok(None),
    };
    // A colon after the first slash belongs to the path
    if raw.find('/').is_some_and(|slash| slash < colon) {
        return Ok(None);
    }

    let scheme = &raw[..colon];
    let valid = scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid {
        return Err(ReplError::encoding(format!("invalid scheme in location: {}", raw)));
    }

    Ok(Some((scheme, &raw[colon + 1..])))
}

fn canonical_path(path: &str, raw: &str) -> ReplResult<String> {
    let mut segments = Vec::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        if segment == "." || segment == ".." {
            return Err(ReplError::encoding(format!(
                "relative segment in location: {}",
                raw
            )));
        }
        segments.push(segment);
    }
    Ok(format!("/{}", segments.join("/")))
}

impl fmt::Display for DataLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.scheme, &self.authority) {
            (Some(scheme), Some(authority)) => write!(f, "{}://{}{}", scheme, authority, self.path),
            (Some(scheme), None) => write!(f, "{}://{}", scheme, self.path),
            (None, _) => write!(f, "{}", self.path),
        }
    }
}

impl FromStr for DataLocation {
    type Err = ReplError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DataLocation {
    type Error = ReplError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DataLocation> for String {
    fn from(value: DataLocation) -> Self {
        value.to_string()
    }
}
