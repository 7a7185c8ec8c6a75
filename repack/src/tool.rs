//! External tool invocation.
//!
//! The pipeline shells out to `aapt`, `jarsigner`, and `keytool`. All of them
//! go through the [`CommandExecutor`] seam so tests can substitute fakes, and
//! through [`run_tool`], which turns a non-zero exit into
//! [`RepackError::ToolExecution`].

use crate::error::{RepackError, Result};
use log::debug;
use std::io::Read;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandExecutor {
    /// Runs `program` with `args` and returns the captured output.
    ///
    /// Implementations report a non-zero exit through the returned
    /// [`Output`]; only failures to run the process at all are errors.
    ///
    /// # Errors
    ///
    /// Returns [`RepackError::ToolLaunch`] if the process cannot be spawned,
    /// or [`RepackError::ToolTimeout`] if a deadline was exceeded.
    fn run(&self, program: &str, args: &[String]) -> Result<Output>;
}

/// Executes commands on the host system and waits for them without a
/// deadline.
///
/// # Examples
///
/// ```no_run
/// use harness_repack::tool::{CommandExecutor, SystemCommandExecutor};
///
/// let executor = SystemCommandExecutor;
/// let output = executor.run("aapt", &["version".to_owned()])?;
/// assert!(output.status.success());
/// # Ok::<(), harness_repack::error::RepackError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandExecutor;

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, program: &str, args: &[String]) -> Result<Output> {
        Command::new(program)
            .args(args)
            .output()
            .map_err(|source| RepackError::ToolLaunch {
                tool: tool_name(program),
                source,
            })
    }
}

/// Executes commands on the host system and kills them after a deadline.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutCommandExecutor {
    timeout: Duration,
}

impl TimeoutCommandExecutor {
    /// Create an executor that kills commands running longer than `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// The configured deadline.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl CommandExecutor for TimeoutCommandExecutor {
    fn run(&self, program: &str, args: &[String]) -> Result<Output> {
        let tool = tool_name(program);
        let launch_error = |source| RepackError::ToolLaunch {
            tool: tool.clone(),
            source,
        };

        let mut child = Command::new(program)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(launch_error)?;

        // Drain both pipes concurrently so a chatty tool cannot block on a
        // full pipe while we wait for it.
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let Some(status) = child.wait_timeout(self.timeout).map_err(launch_error)? else {
            // Reap the child; failures here leave nothing further to do.
            if child.kill().is_err() {
                debug!("{tool} exited before it could be killed");
            }
            if child.wait().is_err() {
                debug!("{tool} could not be reaped after timeout");
            }
            return Err(RepackError::ToolTimeout {
                tool,
                timeout: self.timeout,
            });
        };

        Ok(Output {
            status,
            stdout: join_reader(stdout),
            stderr: join_reader(stderr),
        })
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if pipe.read_to_end(&mut buffer).is_err() {
            debug!("failed to drain child output pipe");
        }
        buffer
    })
}

fn join_reader(handle: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle
        .and_then(|reader| reader.join().ok())
        .unwrap_or_default()
}

/// Runs an external tool and returns its combined stdout and stderr.
///
/// # Errors
///
/// Returns [`RepackError::ToolExecution`] carrying the exit code and the
/// combined output verbatim when the tool exits unsuccessfully, and
/// propagates launch and timeout failures from the executor.
pub fn run_tool(executor: &dyn CommandExecutor, program: &str, args: &[String]) -> Result<String> {
    debug!("running {}", display_command(program, args));
    let output = executor.run(program, args)?;
    let combined = combined_output(&output);

    if !output.status.success() {
        return Err(RepackError::ToolExecution {
            tool: tool_name(program),
            exit_code: output.status.code(),
            output: combined,
        });
    }

    Ok(combined)
}

/// Concatenate stdout and stderr as lossy UTF-8.
#[must_use]
pub fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}

/// Render a command line for logging with password arguments masked.
#[must_use]
pub fn display_command(program: &str, args: &[String]) -> String {
    let mut rendered = String::from(program);
    let mut mask_next = false;
    for arg in args {
        rendered.push(' ');
        if mask_next {
            rendered.push_str("****");
        } else {
            rendered.push_str(arg);
        }
        mask_next = matches!(arg.as_str(), "-storepass" | "-keypass");
    }
    rendered
}

/// File name of `program`, used to label errors.
fn tool_name(program: &str) -> String {
    camino::Utf8Path::new(program)
        .file_name()
        .unwrap_or(program)
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{failure_output, output_with_stdout};
    use rstest::rstest;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|&v| v.to_owned()).collect()
    }

    #[test]
    fn run_tool_returns_combined_output_on_success() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .withf(|program, args| program == "aapt" && args == ["version"])
            .times(1)
            .returning(|_, _| Ok(output_with_stdout(0, "Android Asset Packaging Tool")));

        let output = run_tool(&executor, "aapt", &args(&["version"])).expect("tool succeeds");
        assert!(output.contains("Android Asset Packaging Tool"));
    }

    #[test]
    fn run_tool_maps_non_zero_exit_to_tool_execution() {
        let mut executor = MockCommandExecutor::new();
        executor
            .expect_run()
            .returning(|_, _| Ok(failure_output("jarsigner error: keystore was tampered")));

        let err = run_tool(&executor, "/opt/jdk/bin/jarsigner", &[]).expect_err("tool fails");
        match err {
            RepackError::ToolExecution {
                tool,
                exit_code,
                output,
            } => {
                assert_eq!(tool, "jarsigner");
                assert_eq!(exit_code, Some(1));
                assert!(output.contains("keystore was tampered"));
            }
            other => panic!("expected ToolExecution, got {other:?}"),
        }
    }

    #[test]
    fn run_tool_propagates_launch_failure() {
        let mut executor = MockCommandExecutor::new();
        executor.expect_run().returning(|_, _| {
            Err(RepackError::ToolLaunch {
                tool: "aapt".to_owned(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })
        });

        let err = run_tool(&executor, "aapt", &[]).expect_err("launch fails");
        assert!(matches!(err, RepackError::ToolLaunch { .. }));
    }

    #[rstest]
    #[case::storepass(&["-storepass", "secret", "-keystore", "ks"], "jarsigner -storepass **** -keystore ks")]
    #[case::keypass(&["-keypass", "hunter2"], "jarsigner -keypass ****")]
    #[case::plain(&["-verify", "app.apk"], "jarsigner -verify app.apk")]
    fn display_command_masks_passwords(#[case] raw: &[&str], #[case] expected: &str) {
        assert_eq!(display_command("jarsigner", &args(raw)), expected);
    }

    #[cfg(unix)]
    #[test]
    fn system_executor_reports_missing_program() {
        let err = SystemCommandExecutor
            .run("/nonexistent/harness-repack-tool", &[])
            .expect_err("spawn fails");
        assert!(matches!(
            err,
            RepackError::ToolLaunch { tool, .. } if tool == "harness-repack-tool"
        ));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_executor_kills_slow_commands() {
        let executor = TimeoutCommandExecutor::new(Duration::from_millis(100));
        let err = executor
            .run("sleep", &args(&["5"]))
            .expect_err("sleep exceeds deadline");
        assert!(matches!(err, RepackError::ToolTimeout { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn timeout_executor_collects_output_of_fast_commands() {
        let executor = TimeoutCommandExecutor::new(Duration::from_secs(10));
        let output = executor
            .run("sh", &args(&["-c", "echo out; echo err >&2"]))
            .expect("command succeeds");
        assert!(output.status.success());
        assert_eq!(combined_output(&output), "out\nerr\n");
    }
}
