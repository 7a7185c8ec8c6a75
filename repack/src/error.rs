//! Error types for the harness rebuild pipeline.
//!
//! Every fatal failure surfaces as a [`RepackError`]. Callers that need to
//! branch on the kind of failure use [`RepackError::class`] rather than
//! inspecting the message text.

use crate::archive::ArchiveError;
use crate::settings::ConfigError;
use camino::Utf8PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Coarse classification of a [`RepackError`].
///
/// The launcher maps each class to its own process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The caller misused the API (for example, no application under test).
    Precondition,
    /// Caller-supplied input is malformed or inconsistent.
    BadInput,
    /// A template, SDK component, or other dependency could not be located.
    MissingDependency,
    /// An external tool failed to launch, exited non-zero, or timed out.
    ExternalTool,
    /// A local filesystem operation failed.
    Io,
}

impl ErrorClass {
    /// Process exit code used by the launcher for this class.
    #[must_use]
    pub const fn exit_code(self) -> i32 {
        match self {
            Self::Precondition => 64,
            Self::BadInput => 65,
            Self::MissingDependency => 66,
            Self::ExternalTool => 70,
            Self::Io => 74,
        }
    }
}

/// Errors that can occur while rebuilding or re-signing a package.
#[derive(Debug, Error)]
pub enum RepackError {
    /// A required input was never supplied.
    #[error("precondition violated: {0}")]
    Precondition(&'static str),

    /// A template resource could not be located.
    #[error("resource '{resource}' was not found (searched: {searched}; working directory: {cwd})")]
    ResourceNotFound {
        /// The resource name or path that was requested.
        resource: String,
        /// Locations that were probed, comma separated.
        searched: String,
        /// Working directory at the time of the lookup.
        cwd: String,
    },

    /// A component of the Android or Java SDK could not be found.
    #[error("{component} not found: {reason}")]
    SdkComponentMissing {
        /// The missing component, e.g. `aapt` or `android.jar`.
        component: &'static str,
        /// Where it was looked for.
        reason: String,
    },

    /// An external tool ran but exited unsuccessfully.
    #[error("{tool} failed ({}): {output}", describe_exit(.exit_code))]
    ToolExecution {
        /// File name of the executable.
        tool: String,
        /// Exit code, or `None` when the process was terminated by a signal.
        exit_code: Option<i32>,
        /// Combined stdout and stderr of the process.
        output: String,
    },

    /// An external tool could not be started.
    #[error("failed to launch {tool}")]
    ToolLaunch {
        /// File name of the executable.
        tool: String,
        /// The underlying spawn failure.
        #[source]
        source: std::io::Error,
    },

    /// An external tool exceeded the configured deadline and was killed.
    #[error("{tool} did not finish within {} seconds", .timeout.as_secs())]
    ToolTimeout {
        /// File name of the executable.
        tool: String,
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// The package name of the application under test could not be read.
    #[error("cannot determine package name of {path}: {reason}")]
    AutMetadata {
        /// The APK that was inspected.
        path: Utf8PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// A path handed back by the OS is not valid UTF-8.
    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(std::path::PathBuf),

    /// An archive operation failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Settings could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A filesystem operation on a known path failed.
    #[error("I/O error on {path}")]
    FileIo {
        /// The path being accessed.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepackError {
    /// Classify this error for control-flow decisions.
    ///
    /// # Examples
    ///
    /// ```
    /// use harness_repack::error::{ErrorClass, RepackError};
    ///
    /// let err = RepackError::Precondition("application under test required");
    /// assert_eq!(err.class(), ErrorClass::Precondition);
    /// ```
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Precondition(_) => ErrorClass::Precondition,
            Self::ResourceNotFound { .. } | Self::SdkComponentMissing { .. } => {
                ErrorClass::MissingDependency
            }
            Self::ToolExecution { .. } | Self::ToolLaunch { .. } | Self::ToolTimeout { .. } => {
                ErrorClass::ExternalTool
            }
            Self::AutMetadata { .. } | Self::Config(_) => ErrorClass::BadInput,
            Self::Archive(err) => err.class(),
            Self::NonUtf8Path(_) | Self::FileIo { .. } | Self::Io(_) => ErrorClass::Io,
        }
    }

    /// Attach a path to an I/O error.
    pub(crate) fn file_io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::FileIo {
            path: path.into(),
            source,
        }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_owned(),
    }
}

/// Result type alias using [`RepackError`].
pub type Result<T> = std::result::Result<T, RepackError>;
