//! CLI argument definitions for the harness repackager.
//!
//! This module defines the command-line interface using clap. It is separated
//! from the entrypoint so that parsing can be tested without running a build.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};

/// Rebuild the instrumentation harness for an application under test.
#[derive(Parser, Debug)]
#[command(name = "harness-repack")]
#[command(version, about)]
#[command(long_about = concat!(
    "Rebuild the prebuilt instrumentation harness for an application under test.\n\n",
    "The harness package is copied, its stale manifest and signature are removed, ",
    "a manifest targeting the application is compiled with aapt and spliced in, ",
    "and the result is signed with jarsigner.\n\n",
    "The path of the signed package is printed on stdout; progress goes to stderr.",
))]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Rebuild for a package id:\n",
    "    $ harness-repack build --aut-package io.selendroid.testapp\n\n",
    "  Rebuild for an APK, signing with a release key:\n",
    "    $ harness-repack build --aut-apk app.apk --keystore release.jks --alias release\n\n",
    "  Re-sign an existing package with the debug key:\n",
    "    $ harness-repack resign harness.apk\n\n",
    "Settings are read from harness-repack.toml in the working directory when present.",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Settings file [default: ./harness-repack.toml if present].
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Rebuild and sign the harness for an application.
    Build(BuildArgs),

    /// Strip the signature from a package and sign it again.
    Resign(ResignArgs),
}

/// Signing identity flags shared by both subcommands.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SigningArgs {
    /// Keystore holding the signing key [default: Android debug keystore].
    #[arg(long, value_name = "FILE")]
    pub keystore: Option<Utf8PathBuf>,

    /// Key alias [default: androiddebugkey].
    #[arg(long, value_name = "ALIAS")]
    pub alias: Option<String>,

    /// Keystore password [default: android].
    #[arg(long, value_name = "PASSWORD")]
    pub storepass: Option<String>,
}

/// Arguments for the build command.
#[derive(Args, Debug, Clone, Default)]
#[command(group(
    clap::ArgGroup::new("aut")
        .required(true)
        .args(["aut_package", "aut_apk"]),
))]
pub struct BuildArgs {
    /// Package id of the application under test.
    #[arg(long, value_name = "PACKAGE")]
    pub aut_package: Option<String>,

    /// APK of the application under test; its package id is read with aapt.
    #[arg(long, value_name = "FILE")]
    pub aut_apk: Option<Utf8PathBuf>,

    /// Write the signed package to this path.
    #[arg(short, long, value_name = "FILE", conflicts_with = "output_dir")]
    pub output: Option<Utf8PathBuf>,

    /// Directory for a generated output path [default: system temp dir].
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Manifest template [default: AndroidManifestTemplate.xml].
    #[arg(long, value_name = "FILE")]
    pub manifest_template: Option<Utf8PathBuf>,

    /// Prebuilt harness package, bypassing name and version lookup.
    #[arg(long, value_name = "FILE")]
    pub harness_template: Option<Utf8PathBuf>,

    /// Version of the prebuilt harness to look up.
    #[arg(long, value_name = "VERSION", conflicts_with = "harness_template")]
    pub harness_version: Option<String>,

    /// Additional resource directory (can be repeated).
    #[arg(long = "resource-dir", value_name = "DIR")]
    pub resource_dirs: Vec<Utf8PathBuf>,

    /// Keep intermediate files on disk.
    #[arg(long)]
    pub keep_temp_files: bool,

    /// Signing identity.
    #[command(flatten)]
    pub signing: SigningArgs,
}

/// Arguments for the resign command.
#[derive(Args, Debug, Clone, Default)]
pub struct ResignArgs {
    /// Package to re-sign. It is not modified.
    #[arg(value_name = "APK")]
    pub apk: Utf8PathBuf,

    /// Directory for the re-signed package [default: system temp dir].
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<Utf8PathBuf>,

    /// Keep intermediate files on disk.
    #[arg(long)]
    pub keep_temp_files: bool,

    /// Signing identity.
    #[command(flatten)]
    pub signing: SigningArgs,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
