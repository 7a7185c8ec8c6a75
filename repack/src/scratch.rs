//! Scratch space owned by a single build.
//!
//! Each build gets its own uniquely named temporary directory, so concurrent
//! builds never share intermediate files. What happens to the directory
//! afterwards is decided by [`CleanupPolicy`].

use crate::error::{RepackError, Result};
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::Deserialize;
use tempfile::TempDir;

/// Lifecycle of a build's scratch directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CleanupPolicy {
    /// Delete when the build result is dropped.
    #[default]
    Deferred,
    /// Delete before the build returns.
    Eager,
    /// Keep on disk for inspection.
    Retain,
}

#[derive(Debug)]
enum Holder {
    Owned(TempDir),
    Retained,
}

/// A temporary directory holding the intermediate files of one build.
///
/// Unless the policy is [`CleanupPolicy::Retain`], the directory and its
/// contents are removed when the value is dropped, including when a build
/// step fails part-way.
#[derive(Debug)]
pub struct ScratchSpace {
    holder: Holder,
    path: Utf8PathBuf,
    policy: CleanupPolicy,
}

impl ScratchSpace {
    /// Create a scratch directory under the system temporary directory.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created.
    pub fn create(label: &str, policy: CleanupPolicy) -> Result<Self> {
        Self::create_in(&std::env::temp_dir(), label, policy)
    }

    /// Create a scratch directory under `parent`.
    ///
    /// The directory name is `harness-repack-<label>-` followed by a random
    /// suffix.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the directory cannot be created, or
    /// [`RepackError::NonUtf8Path`] if its path is not UTF-8.
    pub fn create_in(parent: &std::path::Path, label: &str, policy: CleanupPolicy) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("harness-repack-{label}-"))
            .tempdir_in(parent)?;
        let (holder, path) = if policy == CleanupPolicy::Retain {
            (Holder::Retained, dir.keep())
        } else {
            let path = dir.path().to_path_buf();
            (Holder::Owned(dir), path)
        };
        let path =
            Utf8PathBuf::try_from(path).map_err(|e| RepackError::NonUtf8Path(e.into_path_buf()))?;
        debug!("created scratch directory {path} ({policy:?})");

        Ok(Self {
            holder,
            path,
            policy,
        })
    }

    /// Root of the scratch directory.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// The cleanup policy this scratch space was created with.
    #[must_use]
    pub const fn policy(&self) -> CleanupPolicy {
        self.policy
    }

    /// Path of a file named `name` inside the scratch directory.
    #[must_use]
    pub fn file(&self, name: &str) -> Utf8PathBuf {
        self.path.join(name)
    }

    /// Remove the directory now, reporting any failure.
    ///
    /// Retained directories are left alone.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if removal fails.
    pub fn close(self) -> Result<()> {
        match self.holder {
            Holder::Owned(dir) => {
                dir.close()
                    .map_err(|e| RepackError::file_io(self.path.clone(), e))?;
                debug!("removed scratch directory {}", self.path);
                Ok(())
            }
            Holder::Retained => Ok(()),
        }
    }
}

/// Create a uniquely named directory that outlives the build.
///
/// Final packages are written here so that scratch cleanup never removes
/// them.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created, or
/// [`RepackError::NonUtf8Path`] if its path is not UTF-8.
pub fn persistent_output_dir(parent: &Utf8Path, label: &str) -> Result<Utf8PathBuf> {
    std::fs::create_dir_all(parent).map_err(|e| RepackError::file_io(parent, e))?;
    let dir = tempfile::Builder::new()
        .prefix(&format!("harness-repack-{label}-"))
        .tempdir_in(parent)
        .map_err(|e| RepackError::file_io(parent, e))?;
    Utf8PathBuf::try_from(dir.keep()).map_err(|e| RepackError::NonUtf8Path(e.into_path_buf()))
}
