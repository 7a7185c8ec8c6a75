//! Harness repackaging library.
//!
//! This crate rebuilds a prebuilt, pre-compiled instrumentation harness
//! package so that it targets an arbitrary application under test, then signs
//! the result. It backs the `harness-repack` CLI binary and can be embedded
//! directly by test runners.
//!
//! # Modules
//!
//! - [`archive`] - Zip container access with raw entry copies
//! - [`aut`] - The application under test
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Immutable build configuration and its builder
//! - [`dirs`] - Directory resolution abstraction for platform-specific paths
//! - [`error`] - Error types and their classification
//! - [`launcher`] - Settings/flag merging and top-level orchestration
//! - [`manifest`] - Manifest template rendering
//! - [`output`] - Progress and summary formatting
//! - [`package_id`] - Semantic wrapper for Android package ids
//! - [`pipeline`] - The harness rebuild pipeline
//! - [`resign`] - Re-signing of existing packages
//! - [`resources`] - Template resource lookup
//! - [`scratch`] - Per-build scratch directories
//! - [`sdk`] - Android and Java tool discovery
//! - [`settings`] - The optional settings file
//! - [`signing`] - Signing identity resolution and `jarsigner` invocation
//! - [`tool`] - External command execution
//!
//! # Example
//!
//! ```no_run
//! use harness_repack::aut::AutDescriptor;
//! use harness_repack::config::BuildConfig;
//! use harness_repack::dirs::SystemBaseDirs;
//! use harness_repack::pipeline::{RepackContext, build};
//! use harness_repack::sdk::AndroidTools;
//! use harness_repack::settings::ToolSettings;
//! use harness_repack::tool::SystemCommandExecutor;
//!
//! let tools = AndroidTools::discover(&ToolSettings::default())?;
//! let dirs = SystemBaseDirs::new().expect("home directory");
//! let context = RepackContext::new(&tools, &SystemCommandExecutor, &dirs);
//!
//! let aut = AutDescriptor::new("io.selendroid.testapp");
//! let config = BuildConfig::builder().with_aut(&aut).build()?;
//! let output = build(&config, &context)?;
//! println!("{}", output.package());
//! # Ok::<(), harness_repack::error::RepackError>(())
//! ```

pub mod archive;
pub mod aut;
pub mod cli;
pub mod config;
pub mod dirs;
pub mod error;
pub mod launcher;
pub mod manifest;
pub mod output;
pub mod package_id;
pub mod pipeline;
pub mod resign;
pub mod resources;
pub mod scratch;
pub mod sdk;
pub mod settings;
pub mod signing;
pub mod tool;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
