//! Template resource lookup.
//!
//! Templates (the manifest template and the prebuilt harness package) are
//! addressed by relative resource names such as
//! `prebuild/selendroid-server-0.17.0.apk`. A [`ResourceLocator`] resolves a
//! name against its configured search roots first and the working directory
//! last. Absolute paths bypass the search.

use crate::error::{RepackError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fmt;

/// Resource name of the default manifest template.
pub const DEFAULT_MANIFEST_TEMPLATE: &str = "AndroidManifestTemplate.xml";

/// Default base name of the prebuilt harness package.
pub const DEFAULT_HARNESS_NAME: &str = "selendroid-server";

/// Harness version used when none is configured.
pub const DEFAULT_HARNESS_VERSION: &str = "0.17.0";

/// Directory holding prebuilt harness packages, relative to a search root.
pub const PREBUILD_DIR: &str = "prebuild";

/// Identity of a prebuilt harness package: a base name and a version.
///
/// The version is configuration, independent of this crate's own version.
///
/// # Examples
///
/// ```
/// use harness_repack::resources::HarnessTemplate;
///
/// let template = HarnessTemplate::new("0.17.0");
/// assert_eq!(
///     template.resource_name().as_str(),
///     "prebuild/selendroid-server-0.17.0.apk"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessTemplate {
    name: String,
    version: String,
}

impl HarnessTemplate {
    /// A template with the default base name and the given version.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            name: DEFAULT_HARNESS_NAME.to_owned(),
            version: version.into(),
        }
    }

    /// Replace the base name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Base name of the package.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Version string.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Relative resource name, `prebuild/<name>-<version>.apk`.
    #[must_use]
    pub fn resource_name(&self) -> Utf8PathBuf {
        Utf8PathBuf::from(PREBUILD_DIR).join(format!("{}-{}.apk", self.name, self.version))
    }
}

impl Default for HarnessTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_HARNESS_VERSION)
    }
}

impl fmt::Display for HarnessTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

/// Resolves resource names against an ordered list of directories.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceLocator {
    roots: Vec<Utf8PathBuf>,
}

impl ResourceLocator {
    /// A locator searching `roots` in order, then the working directory.
    #[must_use]
    pub fn new(roots: Vec<Utf8PathBuf>) -> Self {
        Self { roots }
    }

    /// Append a search root.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<Utf8PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    /// Configured search roots, excluding the working directory.
    #[must_use]
    pub fn roots(&self) -> &[Utf8PathBuf] {
        &self.roots
    }

    /// Find the file for `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`RepackError::ResourceNotFound`] naming the resource, every
    /// location probed, and the working directory when no file matches.
    pub fn locate(&self, resource: &Utf8Path) -> Result<Utf8PathBuf> {
        if resource.is_absolute() {
            if resource.is_file() {
                return Ok(resource.to_owned());
            }
            return Err(resource_not_found(resource, &[resource.to_owned()]));
        }

        let mut searched = Vec::with_capacity(self.roots.len() + 1);
        let cwd = std::env::current_dir()
            .ok()
            .and_then(|dir| Utf8PathBuf::try_from(dir).ok());
        for root in self.roots.iter().chain(cwd.as_ref()) {
            let candidate = root.join(resource);
            if candidate.is_file() {
                debug!("resolved resource {resource} to {candidate}");
                return Ok(candidate);
            }
            searched.push(candidate);
        }

        Err(resource_not_found(resource, &searched))
    }
}

pub(crate) fn resource_not_found(resource: &Utf8Path, searched: &[Utf8PathBuf]) -> RepackError {
    let cwd = std::env::current_dir().map_or_else(
        |_| "<unknown>".to_owned(),
        |dir| dir.display().to_string(),
    );
    RepackError::ResourceNotFound {
        resource: resource.to_string(),
        searched: searched
            .iter()
            .map(Utf8PathBuf::as_path)
            .map(Utf8Path::as_str)
            .collect::<Vec<_>>()
            .join(", "),
        cwd,
    }
}
