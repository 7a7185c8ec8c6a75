//! Semantic wrapper for Android package identifiers.
//!
//! This module provides the [`PackageId`] newtype used wherever the
//! application-under-test namespace flows through the rebuild pipeline.

use std::fmt;

/// A reverse-domain Android package identifier such as `com.example.app`.
///
/// The identifier is caller-declared and trusted: it is substituted verbatim
/// into the manifest template, so no escaping or syntax validation happens
/// here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageId(String);

impl PackageId {
    /// Create a new package identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return a variant of the identifier safe to embed in file names.
    ///
    /// Characters outside `[A-Za-z0-9._-]` are replaced with `_`.
    ///
    /// # Examples
    ///
    /// ```
    /// use harness_repack::package_id::PackageId;
    ///
    /// let id = PackageId::from("com.example/app");
    /// assert_eq!(id.file_stem(), "com.example_app");
    /// ```
    #[must_use]
    pub fn file_stem(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl AsRef<str> for PackageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PackageId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for PackageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
