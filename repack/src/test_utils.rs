//! Shared test utilities for the repack crate.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! integration tests in `tests/`.

use crate::archive::{PackageArchive, PackageWriter};
use crate::error::Result;
use crate::resources::{DEFAULT_MANIFEST_TEMPLATE, HarnessTemplate};
use crate::sdk::AndroidTools;
use crate::tool::CommandExecutor;
use camino::{Utf8Path, Utf8PathBuf};
use std::process::{ExitStatus, Output};
use std::sync::Mutex;
use tempfile::TempDir;

/// Creates an `ExitStatus` from an exit code (Unix implementation).
#[cfg(unix)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;

    ExitStatus::from_raw(code << 8)
}

/// Creates an `ExitStatus` from an exit code (Windows implementation).
#[cfg(windows)]
#[must_use]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;

    ExitStatus::from_raw(code.unsigned_abs())
}

/// Creates a command `Output` with the given exit code and stdout.
#[must_use]
pub fn output_with_stdout(code: i32, stdout: &str) -> Output {
    Output {
        status: exit_status(code),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Creates a failed command `Output` with the given stderr message.
#[must_use]
pub fn failure_output(stderr: &str) -> Output {
    Output {
        status: exit_status(1),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

/// The path of a temporary directory as UTF-8.
///
/// # Panics
///
/// Panics if the system temporary directory is not valid UTF-8.
#[must_use]
pub fn utf8_temp_dir(dir: &TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("temp dir should be UTF-8")
}

/// Writes a package containing `entries`, in order, to `path`.
///
/// # Panics
///
/// Panics if the package cannot be written.
pub fn write_package(path: &Utf8Path, entries: &[(&str, &[u8])]) {
    let mut writer = PackageWriter::create(path).expect("create fixture package");
    for (name, content) in entries {
        writer
            .put_entry(name, content)
            .expect("write fixture entry");
    }
    writer.finish().expect("finish fixture package");
}

/// Entries of the fixture harness package, in order.
pub const HARNESS_ENTRIES: [(&str, &[u8]); 6] = [
    ("AndroidManifest.xml", b"stale binary manifest"),
    ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n"),
    ("META-INF/CERT.SF", b"Signature-Version: 1.0\r\n"),
    ("META-INF/CERT.RSA", b"\x30\x82\x02\x00"),
    ("classes.dex", b"dex\n035\0harness bytecode"),
    ("res/raw/config.json", b"{\"port\":8080}"),
];

/// Manifest template written by [`write_harness_resources`].
pub const MANIFEST_TEMPLATE: &str = concat!(
    "<manifest package=\"io.selendroid.${TARGET_PACKAGE}\">\n",
    "  <instrumentation android:targetPackage=\"${TARGET_PACKAGE}\"/>\n",
    "</manifest>\n",
);

/// Writes the default manifest template and a harness package for
/// `template` under `root`, laid out as a resource directory.
///
/// Returns the path of the harness package.
///
/// # Panics
///
/// Panics if the files cannot be written.
pub fn write_harness_resources(root: &Utf8Path, template: &HarnessTemplate) -> Utf8PathBuf {
    std::fs::write(root.join(DEFAULT_MANIFEST_TEMPLATE), MANIFEST_TEMPLATE)
        .expect("write manifest template");
    let harness = root.join(template.resource_name());
    if let Some(parent) = harness.parent() {
        std::fs::create_dir_all(parent).expect("create prebuild directory");
    }
    write_package(&harness, &HARNESS_ENTRIES);
    harness
}

/// Tool locations understood by [`FakeAndroidTools`].
#[must_use]
pub fn fake_tool_paths() -> AndroidTools {
    AndroidTools {
        aapt: Utf8PathBuf::from("/fake-sdk/build-tools/30.0.2/aapt"),
        platform_jar: Utf8PathBuf::from("/fake-sdk/platforms/android-28/android.jar"),
        jarsigner: Utf8PathBuf::from("/fake-jdk/bin/jarsigner"),
        keytool: Utf8PathBuf::from("/fake-jdk/bin/keytool"),
    }
}

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// File name of the program, e.g. `aapt`.
    pub tool: String,
    /// Arguments as passed.
    pub args: Vec<String>,
}

/// A [`CommandExecutor`] that imitates `aapt`, `jarsigner`, and `keytool`.
///
/// - `aapt package -M <manifest> -F <out>` writes a container whose only
///   entry is `AndroidManifest.xml`, holding `compiled:` followed by the
///   manifest text;
/// - `aapt dump badging <apk>` reports the configured package name;
/// - `jarsigner` copies its input to `-signedjar`, appending
///   `META-INF/CERT.SF` and `META-INF/CERT.RSA`;
/// - `keytool` reports the configured signature algorithm, or fails when
///   none is set.
///
/// Every call is recorded and can be inspected with [`Self::calls`].
#[derive(Debug, Default)]
pub struct FakeAndroidTools {
    calls: Mutex<Vec<RecordedCall>>,
    certificate_algorithm: Option<String>,
    badging_package: Option<String>,
    failing_tool: Option<(String, String)>,
}

impl FakeAndroidTools {
    /// A fake with no certificate and no badging package.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `keytool` report `algorithm`.
    #[must_use]
    pub fn with_certificate_algorithm(mut self, algorithm: &str) -> Self {
        self.certificate_algorithm = Some(algorithm.to_owned());
        self
    }

    /// Make `aapt dump badging` report `package`.
    #[must_use]
    pub fn with_badging_package(mut self, package: &str) -> Self {
        self.badging_package = Some(package.to_owned());
        self
    }

    /// Make every invocation of `tool` exit with status 1 and `message` on
    /// stderr.
    #[must_use]
    pub fn with_failing_tool(mut self, tool: &str, message: &str) -> Self {
        self.failing_tool = Some((tool.to_owned(), message.to_owned()));
        self
    }

    /// Invocations so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the call log mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    /// Names of the tools invoked so far, in order.
    #[must_use]
    pub fn tool_sequence(&self) -> Vec<String> {
        self.calls().into_iter().map(|call| call.tool).collect()
    }

    fn record(&self, tool: &str, args: &[String]) {
        self.calls
            .lock()
            .expect("call log poisoned")
            .push(RecordedCall {
                tool: tool.to_owned(),
                args: args.to_vec(),
            });
    }

    fn aapt(&self, args: &[String]) -> Output {
        match args.first().map(String::as_str) {
            Some("package") => {
                let (Some(manifest), Some(out)) = (arg_after(args, "-M"), arg_after(args, "-F"))
                else {
                    return failure_output("aapt: missing -M or -F");
                };
                let Ok(text) = std::fs::read_to_string(manifest) else {
                    return failure_output("ERROR: Unable to open manifest");
                };
                let content = format!("compiled:{text}");
                write_package(
                    Utf8Path::new(out),
                    &[("AndroidManifest.xml", content.as_bytes())],
                );
                output_with_stdout(0, "")
            }
            Some("dump") => match &self.badging_package {
                Some(package) => output_with_stdout(
                    0,
                    &format!("package: name='{package}' versionCode='1' versionName='1.0'\n"),
                ),
                None => failure_output("ERROR: dump failed because no AndroidManifest.xml found"),
            },
            _ => failure_output("aapt: unsupported command"),
        }
    }

    fn jarsigner(args: &[String]) -> Output {
        let (Some(out), Some(input)) = (arg_after(args, "-signedjar"), args.iter().rev().nth(1))
        else {
            return failure_output("jarsigner: missing -signedjar or input");
        };
        let mut source = PackageArchive::open(Utf8Path::new(input)).expect("open unsigned input");
        let mut writer = PackageWriter::create(Utf8Path::new(out)).expect("create signed output");
        source.copy_all_into(&mut writer).expect("copy entries");
        writer
            .put_entry("META-INF/CERT.SF", b"Signature-Version: 1.0\r\n")
            .expect("add signature file");
        writer
            .put_entry("META-INF/CERT.RSA", b"\x30\x82\x03\x00")
            .expect("add signature block");
        writer.finish().expect("finish signed output");
        output_with_stdout(0, "jar signed.\n")
    }

    fn keytool(&self) -> Output {
        match &self.certificate_algorithm {
            Some(algorithm) => output_with_stdout(
                0,
                &format!("Alias name: fake\nSignature algorithm name: {algorithm}\n"),
            ),
            None => {
                failure_output("keytool error: java.lang.Exception: Keystore file does not exist")
            }
        }
    }
}

impl CommandExecutor for FakeAndroidTools {
    fn run(&self, program: &str, args: &[String]) -> Result<Output> {
        let tool = Utf8Path::new(program).file_name().unwrap_or(program);
        self.record(tool, args);

        if let Some((failing, message)) = &self.failing_tool {
            if failing == tool {
                return Ok(failure_output(message));
            }
        }

        Ok(match tool {
            "aapt" => self.aapt(args),
            "jarsigner" => Self::jarsigner(args),
            "keytool" => self.keytool(),
            other => failure_output(&format!("{other}: command not found")),
        })
    }
}

fn arg_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .skip_while(|arg| arg.as_str() != flag)
        .nth(1)
        .map(String::as_str)
}
