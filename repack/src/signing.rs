//! Signing identity resolution and package signing.
//!
//! Signing shells out to `jarsigner`. The signature algorithm is read from
//! the certificate in the keystore with `keytool`; when that is impossible
//! the configured default is used and a warning is logged. Failure to
//! determine the algorithm never aborts a build.

use crate::dirs::BaseDirs;
use crate::error::{RepackError, Result};
use crate::sdk::AndroidTools;
use crate::tool::{CommandExecutor, run_tool};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info, warn};
use std::fmt;

/// Alias of the key in the Android debug keystore.
pub const DEFAULT_KEY_ALIAS: &str = "androiddebugkey";

/// Password of the Android debug keystore.
pub const DEFAULT_STOREPASS: &str = "android";

/// Signature algorithm used when none can be determined.
pub const DEFAULT_SIGNATURE_ALGORITHM: &str = "MD5withRSA";

/// Digest algorithm passed to `jarsigner`.
pub const DIGEST_ALGORITHM: &str = "SHA1";

/// Location of the debug keystore relative to the home directory.
pub const DEBUG_KEYSTORE: &str = ".android/debug.keystore";

const ALGORITHM_LINE_PREFIX: &str = "Signature algorithm name:";

/// Keystore, alias, and password used to sign a package.
///
/// Without a keystore the Android debug keystore is used for signing and the
/// default algorithm is chosen without inspecting any certificate.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningIdentity {
    keystore: Option<Utf8PathBuf>,
    alias: String,
    storepass: String,
    default_algorithm: String,
}

impl Default for SigningIdentity {
    fn default() -> Self {
        Self {
            keystore: None,
            alias: DEFAULT_KEY_ALIAS.to_owned(),
            storepass: DEFAULT_STOREPASS.to_owned(),
            default_algorithm: DEFAULT_SIGNATURE_ALGORITHM.to_owned(),
        }
    }
}

impl fmt::Debug for SigningIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningIdentity")
            .field("keystore", &self.keystore)
            .field("alias", &self.alias)
            .field("storepass", &"****")
            .field("default_algorithm", &self.default_algorithm)
            .finish()
    }
}

impl SigningIdentity {
    /// Use the keystore at `path`.
    #[must_use]
    pub fn with_keystore(mut self, path: impl Into<Utf8PathBuf>) -> Self {
        self.keystore = Some(path.into());
        self
    }

    /// Use the key stored under `alias`.
    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// Unlock the keystore with `storepass`.
    #[must_use]
    pub fn with_storepass(mut self, storepass: impl Into<String>) -> Self {
        self.storepass = storepass.into();
        self
    }

    /// Algorithm to use when the certificate cannot be inspected.
    #[must_use]
    pub fn with_default_algorithm(mut self, algorithm: impl Into<String>) -> Self {
        self.default_algorithm = algorithm.into();
        self
    }

    /// The configured keystore, if any.
    #[must_use]
    pub fn keystore(&self) -> Option<&Utf8Path> {
        self.keystore.as_deref()
    }

    /// Key alias.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Keystore password.
    #[must_use]
    pub fn storepass(&self) -> &str {
        &self.storepass
    }

    /// Fallback signature algorithm.
    #[must_use]
    pub fn default_algorithm(&self) -> &str {
        &self.default_algorithm
    }
}

/// How a signature algorithm was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlgorithmSource {
    /// Read from the certificate in the keystore.
    Certificate,
    /// No keystore was configured, so the default was used.
    NoKeystore,
    /// Inspection failed; the default was used instead.
    Fallback {
        /// Why inspection failed.
        reason: String,
    },
}

/// The outcome of [`resolve_signature_algorithm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAlgorithm {
    /// Algorithm name as understood by `jarsigner -sigalg`.
    pub algorithm: String,
    /// Where the value came from.
    pub source: AlgorithmSource,
}

impl ResolvedAlgorithm {
    /// Returns `true` if the default was used because inspection failed.
    #[must_use]
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, AlgorithmSource::Fallback { .. })
    }
}

/// Determine the signature algorithm for `identity`.
///
/// This never fails: any problem running `keytool` or reading its output
/// results in [`AlgorithmSource::Fallback`] and a logged warning.
pub fn resolve_signature_algorithm(
    identity: &SigningIdentity,
    keytool: &Utf8Path,
    executor: &dyn CommandExecutor,
) -> ResolvedAlgorithm {
    let Some(keystore) = identity.keystore() else {
        debug!(
            "no keystore configured; using {} without inspection",
            identity.default_algorithm
        );
        return ResolvedAlgorithm {
            algorithm: identity.default_algorithm.clone(),
            source: AlgorithmSource::NoKeystore,
        };
    };

    match inspect_certificate(identity, keystore, keytool, executor) {
        Ok(algorithm) => {
            debug!("certificate {} in {keystore} uses {algorithm}", identity.alias);
            ResolvedAlgorithm {
                algorithm,
                source: AlgorithmSource::Certificate,
            }
        }
        Err(reason) => {
            warn!(
                "cannot determine signature algorithm of {} in {keystore}: {reason}; falling back to {}",
                identity.alias, identity.default_algorithm
            );
            ResolvedAlgorithm {
                algorithm: identity.default_algorithm.clone(),
                source: AlgorithmSource::Fallback { reason },
            }
        }
    }
}

fn inspect_certificate(
    identity: &SigningIdentity,
    keystore: &Utf8Path,
    keytool: &Utf8Path,
    executor: &dyn CommandExecutor,
) -> std::result::Result<String, String> {
    let args = [
        "-list",
        "-v",
        "-keystore",
        keystore.as_str(),
        "-storepass",
        identity.storepass.as_str(),
        "-alias",
        identity.alias.as_str(),
    ]
    .map(str::to_owned);
    let output = run_tool(executor, keytool.as_str(), &args).map_err(|err| err.to_string())?;
    parse_signature_algorithm(&output)
        .ok_or_else(|| "keytool output has no signature algorithm".to_owned())
}

/// Extract the value of the `Signature algorithm name:` line from
/// `keytool -list -v` output.
///
/// # Examples
///
/// ```
/// use harness_repack::signing::parse_signature_algorithm;
///
/// let output = "Alias name: androiddebugkey\nSignature algorithm name: SHA256withRSA\n";
/// assert_eq!(parse_signature_algorithm(output).as_deref(), Some("SHA256withRSA"));
/// ```
#[must_use]
pub fn parse_signature_algorithm(output: &str) -> Option<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix(ALGORITHM_LINE_PREFIX))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Path of the Android debug keystore under the user's home directory.
///
/// # Errors
///
/// Returns [`RepackError::SdkComponentMissing`] when the home directory is
/// unknown, or [`RepackError::NonUtf8Path`] when it is not UTF-8.
pub fn debug_keystore_path(dirs: &dyn BaseDirs) -> Result<Utf8PathBuf> {
    let home = dirs
        .home_dir()
        .ok_or_else(|| RepackError::SdkComponentMissing {
            component: "debug keystore",
            reason: "could not determine the home directory".to_owned(),
        })?;
    let home = Utf8PathBuf::from_path_buf(home).map_err(RepackError::NonUtf8Path)?;
    Ok(home.join(DEBUG_KEYSTORE))
}

/// A package written by [`Signer::sign`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPackage {
    /// Path of the signed package.
    pub path: Utf8PathBuf,
    /// The algorithm used and how it was chosen.
    pub algorithm: ResolvedAlgorithm,
}

/// Signs packages with `jarsigner`.
pub struct Signer<'a> {
    tools: &'a AndroidTools,
    executor: &'a dyn CommandExecutor,
    dirs: &'a dyn BaseDirs,
}

impl<'a> Signer<'a> {
    /// Create a signer using the given tools, executor, and directories.
    #[must_use]
    pub fn new(
        tools: &'a AndroidTools,
        executor: &'a dyn CommandExecutor,
        dirs: &'a dyn BaseDirs,
    ) -> Self {
        Self {
            tools,
            executor,
            dirs,
        }
    }

    /// Sign `input` with `identity`, writing the signed package to `output`.
    ///
    /// # Errors
    ///
    /// Returns [`RepackError::ToolExecution`] if `jarsigner` fails, or an
    /// error locating the debug keystore when no keystore is configured.
    pub fn sign(
        &self,
        identity: &SigningIdentity,
        input: &Utf8Path,
        output: &Utf8Path,
    ) -> Result<SignedPackage> {
        let algorithm = resolve_signature_algorithm(identity, &self.tools.keytool, self.executor);
        let keystore = match identity.keystore() {
            Some(path) => path.to_owned(),
            None => debug_keystore_path(self.dirs)?,
        };

        let args = [
            "-sigalg",
            algorithm.algorithm.as_str(),
            "-digestalg",
            DIGEST_ALGORITHM,
            "-signedjar",
            output.as_str(),
            "-storepass",
            identity.storepass(),
            "-keystore",
            keystore.as_str(),
            input.as_str(),
            identity.alias(),
        ]
        .map(str::to_owned);
        run_tool(self.executor, self.tools.jarsigner.as_str(), &args)?;
        info!("signed {output} with {}", algorithm.algorithm);

        Ok(SignedPackage {
            path: output.to_owned(),
            algorithm,
        })
    }
}
