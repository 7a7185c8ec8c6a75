//! Test support utilities for the repack integration tests.
//!
//! Each test gets its own resource directory holding the default manifest
//! template and harness package, plus a separate output directory.

use camino::{Utf8Path, Utf8PathBuf};
use harness_repack::archive::PackageArchive;
use harness_repack::config::{BuildConfig, BuildConfigBuilder};
use harness_repack::dirs::BaseDirs;
use harness_repack::resources::{HarnessTemplate, ResourceLocator};
use harness_repack::test_utils::{utf8_temp_dir, write_harness_resources};
use std::path::PathBuf;
use tempfile::TempDir;

/// Home directory reported to the signer for debug-keystore lookups.
pub const FAKE_HOME: &str = "/home/tester";

/// Reports [`FAKE_HOME`] as the home directory.
pub struct FakeHome;

impl BaseDirs for FakeHome {
    fn home_dir(&self) -> Option<PathBuf> {
        Some(PathBuf::from(FAKE_HOME))
    }
}

/// An isolated resource and output layout.
pub struct Workspace {
    _dir: TempDir,
    root: Utf8PathBuf,
}

impl Workspace {
    /// Lays out the default resources in a fresh temporary directory.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create workspace");
        let root = utf8_temp_dir(&dir);
        std::fs::create_dir_all(root.join("resources")).expect("create resources dir");
        write_harness_resources(&root.join("resources"), &HarnessTemplate::default());
        Self { _dir: dir, root }
    }

    /// The resource directory.
    pub fn resources(&self) -> Utf8PathBuf {
        self.root.join("resources")
    }

    /// The directory generated outputs are written under.
    pub fn output_dir(&self) -> Utf8PathBuf {
        self.root.join("out")
    }

    /// Path of a file directly under the workspace root.
    pub fn path(&self, name: &str) -> Utf8PathBuf {
        self.root.join(name)
    }

    /// A builder for `package` wired to this workspace.
    pub fn config(&self, package: &str) -> BuildConfigBuilder {
        BuildConfig::builder()
            .with_package(package)
            .with_output_dir(self.output_dir())
            .with_resources(ResourceLocator::new(vec![self.resources()]))
    }
}

/// Entry names of the package at `path`, in order.
pub fn entry_names(path: &Utf8Path) -> Vec<String> {
    PackageArchive::open(path)
        .expect("open package")
        .entry_names()
        .expect("list entries")
}

/// The manifest entry of the package at `path`, as text.
pub fn manifest_text(path: &Utf8Path) -> String {
    let bytes = PackageArchive::open(path)
        .expect("open package")
        .read_entry("AndroidManifest.xml")
        .expect("read manifest");
    String::from_utf8(bytes).expect("manifest should be UTF-8")
}
