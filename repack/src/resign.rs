//! Re-signing of already built packages.
//!
//! Prior signature files are stripped from a copy of the package, then the
//! copy is signed into `resigned-<original file name>`. The manifest is left
//! as it is, and the caller's package is never modified.

use crate::archive::delete_entry_if_present;
use crate::error::{RepackError, Result};
use crate::pipeline::{BuildOutput, RepackContext, system_temp_dir};
use crate::scratch::{CleanupPolicy, ScratchSpace, persistent_output_dir};
use crate::signing::SigningIdentity;
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};

/// Signature artefacts removed before re-signing, in removal order.
pub const SIGNATURE_ARTIFACTS: [&str; 7] = [
    "META-INF/MANIFEST.MF",
    "META-INF/CERT.RSA",
    "META-INF/CERT.SF",
    "META-INF/ANDROIDD.SF",
    "META-INF/ANDROIDD.RSA",
    "META-INF/NDKEYSTO.SF",
    "META-INF/NDKEYSTO.RSA",
];

/// Prefix of the file name of a re-signed package.
pub const RESIGNED_PREFIX: &str = "resigned-";

/// Options for [`resign`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResignOptions {
    signing: SigningIdentity,
    cleanup: CleanupPolicy,
    output_dir: Option<Utf8PathBuf>,
}

impl ResignOptions {
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

    /// Put the output directory under `dir` instead of the system temporary
    /// directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<Utf8PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Signing identity.
    #[must_use]
    pub fn signing(&self) -> &SigningIdentity {
        &self.signing
    }
}

/// Remove every [`SIGNATURE_ARTIFACTS`] entry present in `package`.
///
/// Returns how many entries were removed. Absent entries are skipped, so
/// repeated calls are harmless.
///
/// # Errors
///
/// Propagates archive failures other than a missing entry.
pub fn strip_signature(package: &Utf8Path) -> Result<usize> {
    let mut removed = 0;
    for entry in SIGNATURE_ARTIFACTS {
        if delete_entry_if_present(package, entry)? {
            removed += 1;
        }
    }
    debug!("removed {removed} signature entries from {package}");
    Ok(removed)
}

/// Strip and re-sign `apk`.
///
/// The signed package is written as `resigned-<file name>` inside a new,
/// uniquely named directory that is not removed by scratch cleanup.
///
/// # Errors
///
/// Returns [`RepackError::Precondition`] if `apk` has no file name, an
/// archive error if it is not a readable package, and
/// [`RepackError::ToolExecution`] if signing fails.
pub fn resign(
    apk: &Utf8Path,
    options: &ResignOptions,
    context: &RepackContext<'_>,
) -> Result<BuildOutput> {
    let name = apk
        .file_name()
        .ok_or(RepackError::Precondition("package path must name a file"))?;
    let scratch = ScratchSpace::create("resign", options.cleanup)?;
    info!("re-signing {apk}");

    let working = scratch.file(name);
    std::fs::copy(apk, &working).map_err(|e| RepackError::file_io(apk, e))?;
    strip_signature(&working)?;

    let parent = match &options.output_dir {
        Some(dir) => dir.clone(),
        None => system_temp_dir()?,
    };
    let output =
        persistent_output_dir(&parent, "resigned")?.join(format!("{RESIGNED_PREFIX}{name}"));
    let signed = context.signer().sign(&options.signing, &working, &output)?;

    BuildOutput::finish(signed, scratch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::PackageArchive;
    use crate::test_utils::{utf8_temp_dir, write_package};
    use tempfile::TempDir;

    #[test]
    fn strip_signature_removes_known_artefacts_only() {
        let dir = TempDir::new().expect("dir");
        let path = utf8_temp_dir(&dir).join("signed.apk");
        write_package(
            &path,
            &[
                ("AndroidManifest.xml", b"manifest".as_slice()),
                ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0".as_slice()),
                ("META-INF/ANDROIDD.SF", b"sf".as_slice()),
                ("META-INF/ANDROIDD.RSA", b"rsa".as_slice()),
                ("META-INF/services/x", b"kept".as_slice()),
                ("classes.dex", b"dex".as_slice()),
            ],
        );

        assert_eq!(strip_signature(&path).expect("strip"), 3);
        let names = PackageArchive::open(&path)
            .expect("open")
            .entry_names()
            .expect("names");
        assert_eq!(names, ["AndroidManifest.xml", "META-INF/services/x", "classes.dex"]);
    }

    #[test]
    fn strip_signature_on_unsigned_package_is_a_no_op() {
        let dir = TempDir::new().expect("dir");
        let path = utf8_temp_dir(&dir).join("unsigned.apk");
        write_package(&path, &[("classes.dex", b"dex".as_slice())]);
        let before = std::fs::read(&path).expect("read");

        assert_eq!(strip_signature(&path).expect("strip"), 0);
        assert_eq!(std::fs::read(&path).expect("read"), before);
    }
}
