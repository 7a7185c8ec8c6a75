//! The application under test.

use crate::error::{RepackError, Result};
use crate::package_id::PackageId;
use crate::tool::{CommandExecutor, run_tool};
use camino::{Utf8Path, Utf8PathBuf};

/// What the rebuild pipeline needs to know about the application under test.
///
/// The pipeline borrows the implementation and never manages its lifecycle.
pub trait ApplicationUnderTest {
    /// Package identifier, e.g. `io.selendroid.testapp`.
    fn base_package(&self) -> &PackageId;

    /// Location of the application's package, when known.
    fn apk_path(&self) -> Option<&Utf8Path> {
        None
    }
}

/// A concrete application descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutDescriptor {
    package: PackageId,
    apk: Option<Utf8PathBuf>,
}

impl AutDescriptor {
    /// Describe an application by package id alone.
    #[must_use]
    pub fn new(package: impl Into<PackageId>) -> Self {
        Self {
            package: package.into(),
            apk: None,
        }
    }

    /// Read the package id from the APK at `path` with `aapt dump badging`.
    ///
    /// # Errors
    ///
    /// Returns [`RepackError::ToolExecution`] if `aapt` fails, or
    /// [`RepackError::AutMetadata`] if its output names no package.
    pub fn from_apk(
        path: &Utf8Path,
        aapt: &Utf8Path,
        executor: &dyn CommandExecutor,
    ) -> Result<Self> {
        let args = ["dump", "badging", path.as_str()].map(str::to_owned);
        let output = run_tool(executor, aapt.as_str(), &args)?;
        let package = parse_badging_package(&output).ok_or_else(|| RepackError::AutMetadata {
            path: path.to_owned(),
            reason: "aapt badging output has no package name".to_owned(),
        })?;
        Ok(Self {
            package: PackageId::from(package),
            apk: Some(path.to_owned()),
        })
    }
}

impl ApplicationUnderTest for AutDescriptor {
    fn base_package(&self) -> &PackageId {
        &self.package
    }

    fn apk_path(&self) -> Option<&Utf8Path> {
        self.apk.as_deref()
    }
}

/// Extract `name` from the `package:` line of `aapt dump badging` output.
fn parse_badging_package(output: &str) -> Option<&str> {
    output
        .lines()
        .find_map(|line| line.strip_prefix("package:"))
        .and_then(|line| line.split_once("name='"))
        .and_then(|(_, rest)| rest.split_once('\''))
        .map(|(name, _)| name)
        .filter(|name| !name.is_empty())
}
