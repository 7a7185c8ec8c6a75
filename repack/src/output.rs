//! Output formatting for the launcher.
//!
//! Progress and diagnostics go to stderr; only the final package path goes to
//! stdout, so the launcher composes in shell pipelines.

use crate::pipeline::BuildOutput;
use crate::signing::{AlgorithmSource, ResolvedAlgorithm};
use std::fmt::Display;
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort logging; ignore write failures.
    }
}

/// Describe how the signature algorithm was chosen.
///
/// # Examples
///
/// ```
/// use harness_repack::output::algorithm_message;
/// use harness_repack::signing::{AlgorithmSource, ResolvedAlgorithm};
///
/// let resolved = ResolvedAlgorithm {
///     algorithm: "MD5withRSA".to_owned(),
///     source: AlgorithmSource::Fallback { reason: "keytool failed".to_owned() },
/// };
/// assert!(algorithm_message(&resolved).contains("falling back"));
/// ```
#[must_use]
pub fn algorithm_message(resolved: &ResolvedAlgorithm) -> String {
    match &resolved.source {
        AlgorithmSource::Certificate => {
            format!("Signed with {} (from certificate)", resolved.algorithm)
        }
        AlgorithmSource::NoKeystore => {
            format!("Signed with {} using the debug keystore", resolved.algorithm)
        }
        AlgorithmSource::Fallback { reason } => format!(
            "Warning: could not read the certificate ({reason}); falling back to {}",
            resolved.algorithm
        ),
    }
}

/// Summarise a finished build or re-sign for stderr.
#[must_use]
pub fn summary_lines(output: &BuildOutput) -> Vec<String> {
    let mut lines = vec![algorithm_message(output.algorithm())];
    if let Some(dir) = output.scratch_dir() {
        lines.push(format!("Intermediate files: {dir}"));
    }
    lines
}
