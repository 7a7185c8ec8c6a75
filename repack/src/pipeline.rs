//! Harness rebuild pipeline orchestration.
//!
//! [`build`] turns the prebuilt harness package into one that instruments the
//! application under test:
//!
//! 1. copy the harness template into a fresh scratch directory;
//! 2. strip the stale manifest and signature entries;
//! 3. render the manifest template for the target package;
//! 4. compile it with `aapt`;
//! 5. splice the compiled manifest, followed by every remaining original
//!    entry, into a new container;
//! 6. sign the result with `jarsigner`.
//!
//! The pipeline holds no state between builds. Concurrent builds are safe
//! because each owns a uniquely named scratch directory.

use crate::archive::{PackageArchive, PackageWriter, delete_entry, delete_entry_if_present};
use crate::config::BuildConfig;
use crate::dirs::BaseDirs;
use crate::error::{RepackError, Result};
use crate::manifest::render_manifest;
use crate::resign::SIGNATURE_ARTIFACTS;
use crate::scratch::{CleanupPolicy, ScratchSpace, persistent_output_dir};
use crate::sdk::AndroidTools;
use crate::signing::{ResolvedAlgorithm, SignedPackage, Signer};
use crate::tool::{CommandExecutor, run_tool};
use camino::{Utf8Path, Utf8PathBuf};
use log::{debug, info};
use std::fmt;

/// Name of the binary manifest entry inside an APK.
pub const MANIFEST_ENTRY: &str = "AndroidManifest.xml";

/// Entries that every prebuilt harness carries and that must be removed.
///
/// Their absence means the template is not what it claims to be, so a
/// missing entry fails the build.
pub const REQUIRED_STALE_ENTRIES: [&str; 3] =
    ["META-INF/CERT.RSA", "META-INF/CERT.SF", MANIFEST_ENTRY];

const WORKING_PACKAGE: &str = "harness.apk";
const COMPILED_MANIFEST: &str = "manifest.apk";
const UNSIGNED_PACKAGE: &str = "unsigned.apk";

/// Collaborators shared by every build.
#[derive(Clone, Copy)]
pub struct RepackContext<'a> {
    /// Locations of `aapt`, `jarsigner`, `keytool`, and `android.jar`.
    pub tools: &'a AndroidTools,
    /// Runs the external tools.
    pub executor: &'a dyn CommandExecutor,
    /// Locates the debug keystore.
    pub dirs: &'a dyn BaseDirs,
}

impl<'a> RepackContext<'a> {
    /// Bundle the pipeline collaborators.
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

    pub(crate) fn signer(&self) -> Signer<'a> {
        Signer::new(self.tools, self.executor, self.dirs)
    }
}

/// Steps of the rebuild, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Copy the harness template into scratch.
    CopyTemplate,
    /// Remove stale manifest and signature entries.
    StripStaleEntries,
    /// Substitute the target package into the manifest template.
    RenderManifest,
    /// Compile the manifest with `aapt`.
    CompileManifest,
    /// Build the unsigned package, manifest first.
    SpliceManifest,
    /// Sign with `jarsigner`.
    Sign,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CopyTemplate => "copy template",
            Self::StripStaleEntries => "strip stale entries",
            Self::RenderManifest => "render manifest",
            Self::CompileManifest => "compile manifest",
            Self::SpliceManifest => "splice manifest",
            Self::Sign => "sign",
        };
        f.write_str(label)
    }
}

/// Result of a successful build.
///
/// Under [`CleanupPolicy::Deferred`] the scratch directory lives as long as
/// this value. The signed package is outside the scratch directory and is
/// never removed.
#[derive(Debug)]
pub struct BuildOutput {
    package: Utf8PathBuf,
    algorithm: ResolvedAlgorithm,
    scratch: Option<ScratchSpace>,
}

impl BuildOutput {
    /// Path of the signed package.
    #[must_use]
    pub fn package(&self) -> &Utf8Path {
        &self.package
    }

    /// Signature algorithm used, and how it was chosen.
    #[must_use]
    pub fn algorithm(&self) -> &ResolvedAlgorithm {
        &self.algorithm
    }

    /// Scratch directory, unless it was already removed.
    #[must_use]
    pub fn scratch_dir(&self) -> Option<&Utf8Path> {
        self.scratch.as_ref().map(ScratchSpace::path)
    }

    /// Apply the scratch policy: close eagerly, or keep the space alive
    /// alongside the result.
    pub(crate) fn finish(signed: SignedPackage, scratch: ScratchSpace) -> Result<Self> {
        let scratch = match scratch.policy() {
            CleanupPolicy::Eager => {
                scratch.close()?;
                None
            }
            CleanupPolicy::Deferred | CleanupPolicy::Retain => Some(scratch),
        };
        Ok(Self {
            package: signed.path,
            algorithm: signed.algorithm,
            scratch,
        })
    }

    /// Release the scratch space and return the package path.
    #[must_use]
    pub fn into_package(self) -> Utf8PathBuf {
        self.package
    }
}

/// Rebuild the harness for `config` and sign it.
///
/// # Errors
///
/// Returns [`RepackError::ResourceNotFound`] if a template is missing,
/// [`RepackError::Archive`] if the harness lacks a required entry or is
/// corrupt, [`RepackError::ToolExecution`] if `aapt` or `jarsigner` fail,
/// and I/O errors from scratch handling. Scratch files are removed on
/// failure unless the policy is [`CleanupPolicy::Retain`].
pub fn build(config: &BuildConfig, context: &RepackContext<'_>) -> Result<BuildOutput> {
    let package = config.aut();
    let resources = config.resources();
    let harness = resources.locate(&config.harness().resource_name())?;
    let manifest_template = resources.locate(config.manifest_template())?;
    let scratch = ScratchSpace::create(&package.file_stem(), config.cleanup())?;
    info!("rebuilding {harness} for {package} in {}", scratch.path());

    enter(Stage::CopyTemplate);
    let working = scratch.file(WORKING_PACKAGE);
    std::fs::copy(&harness, &working).map_err(|e| RepackError::file_io(&harness, e))?;

    enter(Stage::StripStaleEntries);
    strip_stale_entries(&working)?;

    enter(Stage::RenderManifest);
    let manifest = render_manifest(&manifest_template, package, &scratch)?;

    enter(Stage::CompileManifest);
    let compiled = compile_manifest(context, &manifest, &scratch.file(COMPILED_MANIFEST))?;

    enter(Stage::SpliceManifest);
    let unsigned = splice_manifest(&compiled, &working, &scratch.file(UNSIGNED_PACKAGE))?;

    enter(Stage::Sign);
    let output = output_path(config)?;
    let signed = context.signer().sign(config.signing(), &unsigned, &output)?;

    BuildOutput::finish(signed, scratch)
}

fn enter(stage: Stage) {
    info!("stage: {stage}");
}

/// Remove the stale manifest and signature entries from `package`.
///
/// The entries in [`REQUIRED_STALE_ENTRIES`] must be present; any other
/// signature artefacts are removed only if they exist. Running this twice on
/// the same package therefore fails the second time on the required entries
/// and leaves the optional ones untouched.
///
/// # Errors
///
/// Returns [`crate::archive::ArchiveError::EntryNotFound`] if a required
/// entry is absent, and propagates other archive failures.
pub fn strip_stale_entries(package: &Utf8Path) -> Result<()> {
    for entry in REQUIRED_STALE_ENTRIES {
        delete_entry(package, entry)?;
    }
    for entry in SIGNATURE_ARTIFACTS
        .iter()
        .filter(|entry| !REQUIRED_STALE_ENTRIES.contains(*entry))
    {
        delete_entry_if_present(package, entry)?;
    }
    Ok(())
}

/// Compile `manifest` into a resource container at `out` with `aapt`.
///
/// # Errors
///
/// Returns [`RepackError::ToolExecution`] if `aapt` fails.
pub fn compile_manifest(
    context: &RepackContext<'_>,
    manifest: &Utf8Path,
    out: &Utf8Path,
) -> Result<Utf8PathBuf> {
    let args = [
        "package",
        "-M",
        manifest.as_str(),
        "-I",
        context.tools.platform_jar.as_str(),
        "-F",
        out.as_str(),
        "-f",
    ]
    .map(str::to_owned);
    let output = run_tool(context.executor, context.tools.aapt.as_str(), &args)?;
    debug!("aapt output: {}", output.trim_end());
    Ok(out.to_owned())
}

/// Write a new package at `dest`: the manifest entry from `compiled` first,
/// then every entry of `stripped` in its original order.
///
/// All entries are copied raw, so their stored bytes and compression
/// metadata are unchanged.
///
/// # Errors
///
/// Returns an archive error if either input cannot be read, the compiled
/// container has no manifest, or `stripped` still contains one.
pub fn splice_manifest(
    compiled: &Utf8Path,
    stripped: &Utf8Path,
    dest: &Utf8Path,
) -> Result<Utf8PathBuf> {
    let mut writer = PackageWriter::create(dest)?;
    PackageArchive::open(compiled)?.copy_entry(MANIFEST_ENTRY, &mut writer)?;
    let copied = PackageArchive::open(stripped)?.copy_all_into(&mut writer)?;
    let path = writer.finish()?;
    debug!("spliced manifest and {copied} entries into {path}");
    Ok(path)
}

/// Where the signed package goes: the configured path, or
/// `instrumentation-<package>.apk` in a fresh, uniquely named directory.
fn output_path(config: &BuildConfig) -> Result<Utf8PathBuf> {
    if let Some(path) = config.output() {
        if let Some(parent) = path.parent().filter(|p| !p.as_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| RepackError::file_io(parent, e))?;
        }
        return Ok(path.to_owned());
    }

    let stem = config.aut().file_stem();
    let parent = match config.output_dir() {
        Some(dir) => dir.to_owned(),
        None => system_temp_dir()?,
    };
    let dir = persistent_output_dir(&parent, &stem)?;
    Ok(dir.join(format!("instrumentation-{stem}.apk")))
}

pub(crate) fn system_temp_dir() -> Result<Utf8PathBuf> {
    Utf8PathBuf::try_from(std::env::temp_dir())
        .map_err(|e| RepackError::NonUtf8Path(e.into_path_buf()))
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
