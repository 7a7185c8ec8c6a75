//! Build configuration.
//!
//! A [`BuildConfig`] is an immutable value assembled with
//! [`BuildConfigBuilder`]. Every field has a default except the application
//! under test, whose absence makes [`BuildConfigBuilder::build`] fail before
//! any filesystem work happens.

use crate::aut::ApplicationUnderTest;
use crate::error::{RepackError, Result};
use crate::package_id::PackageId;
use crate::resources::{DEFAULT_MANIFEST_TEMPLATE, HarnessTemplate, ResourceLocator};
use crate::scratch::CleanupPolicy;
use crate::signing::SigningIdentity;
use camino::{Utf8Path, Utf8PathBuf};

/// Where the prebuilt harness package comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HarnessSource {
    /// A named, versioned resource resolved through the [`ResourceLocator`].
    Template(HarnessTemplate),
    /// An explicit file path.
    Path(Utf8PathBuf),
}

impl HarnessSource {
    /// Resource name or path to hand to the locator.
    #[must_use]
    pub fn resource_name(&self) -> Utf8PathBuf {
        match self {
            Self::Template(template) => template.resource_name(),
            Self::Path(path) => path.clone(),
        }
    }
}

impl Default for HarnessSource {
    fn default() -> Self {
        Self::Template(HarnessTemplate::default())
    }
}

/// Inputs for one harness rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConfig {
    aut: PackageId,
    output: Option<Utf8PathBuf>,
    output_dir: Option<Utf8PathBuf>,
    manifest_template: Utf8PathBuf,
    harness: HarnessSource,
    signing: SigningIdentity,
    cleanup: CleanupPolicy,
    resources: ResourceLocator,
}

impl BuildConfig {
    /// Start assembling a configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use harness_repack::aut::AutDescriptor;
    /// use harness_repack::config::BuildConfig;
    /// use harness_repack::error::ErrorClass;
    ///
    /// let missing = BuildConfig::builder().build().unwrap_err();
    /// assert_eq!(missing.class(), ErrorClass::Precondition);
    ///
    /// let aut = AutDescriptor::new("io.selendroid.testapp");
    /// let config = BuildConfig::builder().with_aut(&aut).build()?;
    /// assert_eq!(config.aut().as_str(), "io.selendroid.testapp");
    /// # Ok::<(), harness_repack::error::RepackError>(())
    /// ```
    #[must_use]
    pub fn builder() -> BuildConfigBuilder {
        BuildConfigBuilder::default()
    }

    /// Package id of the application under test.
    #[must_use]
    pub fn aut(&self) -> &PackageId {
        &self.aut
    }

    /// Explicit output path, if one was requested.
    #[must_use]
    pub fn output(&self) -> Option<&Utf8Path> {
        self.output.as_deref()
    }

    /// Parent directory for a synthesised output path.
    #[must_use]
    pub fn output_dir(&self) -> Option<&Utf8Path> {
        self.output_dir.as_deref()
    }

    /// Manifest template resource name or path.
    #[must_use]
    pub fn manifest_template(&self) -> &Utf8Path {
        &self.manifest_template
    }

    /// Harness package source.
    #[must_use]
    pub fn harness(&self) -> &HarnessSource {
        &self.harness
    }

    /// Signing identity.
    #[must_use]
    pub fn signing(&self) -> &SigningIdentity {
        &self.signing
    }

    /// Scratch cleanup policy.
    #[must_use]
    pub const fn cleanup(&self) -> CleanupPolicy {
        self.cleanup
    }

    /// Resource locator used for both templates.
    #[must_use]
    pub fn resources(&self) -> &ResourceLocator {
        &self.resources
    }
}

/// Accumulates [`BuildConfig`] options.
#[derive(Debug, Clone, Default)]
pub struct BuildConfigBuilder {
    aut: Option<PackageId>,
    output: Option<Utf8PathBuf>,
    output_dir: Option<Utf8PathBuf>,
    manifest_template: Option<Utf8PathBuf>,
    harness: HarnessSource,
    signing: SigningIdentity,
    cleanup: CleanupPolicy,
    resources: ResourceLocator,
}

impl BuildConfigBuilder {
    /// Target the given application. Only its package id is retained.
    #[must_use]
    pub fn with_aut(mut self, aut: &dyn ApplicationUnderTest) -> Self {
        self.aut = Some(aut.base_package().clone());
        self
    }

    /// Target the application with package id `package`.
    #[must_use]
    pub fn with_package(mut self, package: impl Into<PackageId>) -> Self {
        self.aut = Some(package.into());
        self
    }

    /// Write the signed package to exactly this path.
    #[must_use]
    pub fn with_output(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.output = Some(path.into());
        self
    }

    /// Place synthesised output paths under `dir` instead of the system
    /// temporary directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Use a different manifest template.
    #[must_use]
    pub fn with_manifest_template(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.manifest_template = Some(path.into());
        self
    }

    /// Use a specific harness package.
    #[must_use]
    pub fn with_harness(mut self, harness: HarnessSource) -> Self {
        self.harness = harness;
        self
    }

    /// Sign with `identity`.
    #[must_use]
    pub fn with_signing(mut self, identity: SigningIdentity) -> Self {
        self.signing = identity;
        self
    }

    /// Choose what happens to scratch files.
    #[must_use]
    pub const fn with_cleanup(mut self, policy: CleanupPolicy) -> Self {
        self.cleanup = policy;
        self
    }

    /// Keep scratch files on disk when `keep` is true.
    #[must_use]
    pub const fn with_keep_temp_files(mut self, keep: bool) -> Self {
        if keep {
            self.cleanup = CleanupPolicy::Retain;
        }
        self
    }

    /// Resolve resources with `locator`.
    #[must_use]
    pub fn with_resources(mut self, locator: ResourceLocator) -> Self {
        self.resources = locator;
        self
    }

    /// Finish the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RepackError::Precondition`] if no application under test
    /// was supplied.
    pub fn build(self) -> Result<BuildConfig> {
        let aut = self.aut.ok_or(RepackError::Precondition(
            "an application under test is required",
        ))?;
        Ok(BuildConfig {
            aut,
            output: self.output,
            output_dir: self.output_dir,
            manifest_template: self
                .manifest_template
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_MANIFEST_TEMPLATE)),
            harness: self.harness,
            signing: self.signing,
            cleanup: self.cleanup,
            resources: self.resources,
        })
    }
}
