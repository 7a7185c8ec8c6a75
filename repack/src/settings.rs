//! Optional settings file for the launcher.
//!
//! Settings live in `harness-repack.toml` in the working directory, or in the
//! file named by `--config`. Every field is optional; command-line flags win
//! over file values. Unknown keys are rejected so typos surface early.
//!
//! ```toml
//! [tools]
//! android_home = "/opt/android-sdk"
//! timeout_secs = 120
//!
//! [harness]
//! version = "0.17.0"
//! resource_dirs = ["/opt/harness/resources"]
//!
//! [signing]
//! default_algorithm = "SHA1withRSA"
//!
//! [scratch]
//! cleanup = "eager"
//! ```

use crate::scratch::CleanupPolicy;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// File name probed in the working directory when no `--config` is given.
pub const SETTINGS_FILE_NAME: &str = "harness-repack.toml";

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("failed to read settings file {path}")]
    Read {
        /// The file being read.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The settings file is not valid TOML or has unexpected keys.
    #[error("invalid settings in {path}: {source}")]
    Parse {
        /// The file being parsed.
        path: Utf8PathBuf,
        /// The parser's diagnostic.
        #[source]
        source: toml::de::Error,
    },
}

/// Top-level settings document.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepackSettings {
    /// Locations of the external tools.
    pub tools: ToolSettings,
    /// Which harness template to rebuild and where to find resources.
    pub harness: HarnessSettings,
    /// Signing identity overrides.
    pub signing: SigningSettings,
    /// Scratch and output directory handling.
    pub scratch: ScratchSettings,
}

/// `[tools]` section.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ToolSettings {
    /// Android SDK root; overrides `ANDROID_HOME` and `ANDROID_SDK_ROOT`.
    pub android_home: Option<Utf8PathBuf>,
    /// JDK root; overrides `JAVA_HOME`.
    pub java_home: Option<Utf8PathBuf>,
    /// Explicit path to `aapt`.
    pub aapt: Option<Utf8PathBuf>,
    /// Explicit path to the platform `android.jar`.
    pub platform_jar: Option<Utf8PathBuf>,
    /// Explicit path to `jarsigner`.
    pub jarsigner: Option<Utf8PathBuf>,
    /// Explicit path to `keytool`.
    pub keytool: Option<Utf8PathBuf>,
    /// Kill external tools that run longer than this many seconds.
    pub timeout_secs: Option<u64>,
}

impl ToolSettings {
    /// The configured tool deadline, if any.
    ///
    /// A value of zero disables the deadline.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// `[harness]` section.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HarnessSettings {
    /// Base name of the prebuilt harness package.
    pub name: Option<String>,
    /// Version of the prebuilt harness package.
    pub version: Option<String>,
    /// Explicit harness package path, bypassing name and version.
    pub template: Option<Utf8PathBuf>,
    /// Explicit manifest template path.
    pub manifest_template: Option<Utf8PathBuf>,
    /// Directories searched for resources before the working directory.
    pub resource_dirs: Vec<Utf8PathBuf>,
}

/// `[signing]` section.
#[derive(Clone, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SigningSettings {
    /// Keystore holding the signing key.
    pub keystore: Option<Utf8PathBuf>,
    /// Key alias within the keystore.
    pub alias: Option<String>,
    /// Keystore password.
    pub storepass: Option<String>,
    /// Algorithm used when none can be read from the certificate.
    pub default_algorithm: Option<String>,
}

impl fmt::Debug for SigningSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningSettings")
            .field("keystore", &self.keystore)
            .field("alias", &self.alias)
            .field("storepass", &self.storepass.as_ref().map(|_| "****"))
            .field("default_algorithm", &self.default_algorithm)
            .finish()
    }
}

/// `[scratch]` section.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ScratchSettings {
    /// What happens to intermediate files after a build.
    pub cleanup: CleanupPolicy,
    /// Parent directory for synthesised output packages.
    pub output_dir: Option<Utf8PathBuf>,
}

impl RepackSettings {
    /// Parse settings from TOML text. `origin` labels errors.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys.
    pub fn parse(text: &str, origin: &Utf8Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: origin.to_owned(),
            source,
        })
    }

    /// Load settings from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if it is invalid.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        debug!("loaded settings from {path}");
        Self::parse(&text, path)
    }

    /// Load the explicit settings file, or `harness-repack.toml` from `dir`
    /// when present, or defaults.
    ///
    /// An explicit file that does not exist is an error; a missing default
    /// file is not.
    ///
    /// # Errors
    ///
    /// Propagates read and parse failures.
    pub fn discover(explicit: Option<&Utf8Path>, dir: &Utf8Path) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let candidate = dir.join(SETTINGS_FILE_NAME);
        if candidate.is_file() {
            Self::load(&candidate)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::utf8_temp_dir;
    use rstest::rstest;

    #[rstest]
    fn empty_document_yields_defaults() {
        let settings = RepackSettings::parse("", Utf8Path::new("inline.toml")).expect("parses");
        assert_eq!(settings, RepackSettings::default());
        assert_eq!(settings.scratch.cleanup, CleanupPolicy::Deferred);
        assert!(settings.tools.timeout().is_none());
    }

    #[rstest]
    fn full_document_round_trips_into_sections() {
        let source = concat!(
            "[tools]\n",
            "android_home = \"/opt/sdk\"\n",
            "timeout_secs = 90\n",
            "[harness]\n",
            "version = \"0.17.0\"\n",
            "resource_dirs = [\"/srv/a\", \"/srv/b\"]\n",
            "[signing]\n",
            "alias = \"release\"\n",
            "default_algorithm = \"SHA1withRSA\"\n",
            "[scratch]\n",
            "cleanup = \"retain\"\n",
        );
        let settings = RepackSettings::parse(source, Utf8Path::new("inline.toml")).expect("parses");

        assert_eq!(settings.tools.android_home.as_deref(), Some(Utf8Path::new("/opt/sdk")));
        assert_eq!(settings.tools.timeout(), Some(Duration::from_secs(90)));
        assert_eq!(settings.harness.version.as_deref(), Some("0.17.0"));
        assert_eq!(settings.harness.resource_dirs.len(), 2);
        assert_eq!(settings.signing.alias.as_deref(), Some("release"));
        assert_eq!(settings.scratch.cleanup, CleanupPolicy::Retain);
    }

    #[rstest]
    #[case::unknown_section("[network]\nport = 4444\n")]
    #[case::unknown_key("[tools]\nadb = \"/usr/bin/adb\"\n")]
    #[case::bad_policy("[scratch]\ncleanup = \"sometimes\"\n")]
    fn rejects_invalid_documents(#[case] source: &str) {
        let err = RepackSettings::parse(source, Utf8Path::new("bad.toml")).expect_err("invalid");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn zero_timeout_disables_deadline() {
        let tools = ToolSettings {
            timeout_secs: Some(0),
            ..ToolSettings::default()
        };
        assert!(tools.timeout().is_none());
    }

    #[test]
    fn debug_output_redacts_storepass() {
        let signing = SigningSettings {
            storepass: Some("hunter2".to_owned()),
            ..SigningSettings::default()
        };
        let rendered = format!("{signing:?}");
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn discover_reads_default_file_from_directory() {
        let dir = tempfile::tempdir().expect("dir");
        let root = utf8_temp_dir(&dir);
        std::fs::write(root.join(SETTINGS_FILE_NAME), "[harness]\nversion = \"1.2.3\"\n")
            .expect("write settings");

        let settings = RepackSettings::discover(None, &root).expect("discovered");
        assert_eq!(settings.harness.version.as_deref(), Some("1.2.3"));
    }

    #[test]
    fn discover_without_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("dir");
        let settings = RepackSettings::discover(None, &utf8_temp_dir(&dir)).expect("defaults");
        assert_eq!(settings, RepackSettings::default());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("dir");
        let root = utf8_temp_dir(&dir);
        let err = RepackSettings::discover(Some(&root.join("absent.toml")), &root)
            .expect_err("explicit file is missing");
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
