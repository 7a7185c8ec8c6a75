//! Directory resolution abstraction for platform-specific paths.
//!
//! Only the home directory is needed: the Android debug keystore lives under
//! `~/.android/`. The trait exists so tests can point it somewhere else.

use std::path::PathBuf;

/// Source of well-known user directories.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// The current user's home directory, if it can be determined.
    fn home_dir(&self) -> Option<PathBuf>;
}

/// [`BaseDirs`] backed by the operating system.
///
/// # Examples
///
/// ```no_run
/// use harness_repack::dirs::{BaseDirs, SystemBaseDirs};
///
/// let dirs = SystemBaseDirs::new().expect("home directory is known");
/// assert!(dirs.home_dir().is_some());
/// ```
#[derive(Debug, Clone)]
pub struct SystemBaseDirs {
    inner: directories_next::BaseDirs,
}

impl SystemBaseDirs {
    /// Query the operating system for the user's directories.
    ///
    /// Returns `None` when no home directory is configured.
    #[must_use]
    pub fn new() -> Option<Self> {
        directories_next::BaseDirs::new().map(|inner| Self { inner })
    }
}

impl BaseDirs for SystemBaseDirs {
    fn home_dir(&self) -> Option<PathBuf> {
        Some(self.inner.home_dir().to_path_buf())
    }
}

/// [`BaseDirs`] for environments where no home directory is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBaseDirs;

impl BaseDirs for NoBaseDirs {
    fn home_dir(&self) -> Option<PathBuf> {
        None
    }
}
