//! Discovery of the Android and Java SDK tools.
//!
//! Explicit paths from the `[tools]` settings win. Otherwise `aapt` and
//! `android.jar` come from the Android SDK root, and `jarsigner` and
//! `keytool` from `JAVA_HOME/bin` or, failing that, from `PATH`.

use crate::error::{RepackError, Result};
use crate::settings::ToolSettings;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;

/// Environment variables naming the Android SDK root, in priority order.
pub const ANDROID_HOME_VARS: [&str; 2] = ["ANDROID_HOME", "ANDROID_SDK_ROOT"];

/// Environment variable naming the JDK root.
pub const JAVA_HOME_VAR: &str = "JAVA_HOME";

/// Locations of the external executables and the platform jar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AndroidTools {
    /// The Android Asset Packaging Tool.
    pub aapt: Utf8PathBuf,
    /// The platform `android.jar` passed to `aapt -I`.
    pub platform_jar: Utf8PathBuf,
    /// The JDK jar signer.
    pub jarsigner: Utf8PathBuf,
    /// The JDK key and certificate tool.
    pub keytool: Utf8PathBuf,
}

/// SDK roots read from the process environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdkEnvironment {
    /// Android SDK root.
    pub android_home: Option<Utf8PathBuf>,
    /// JDK root.
    pub java_home: Option<Utf8PathBuf>,
}

impl SdkEnvironment {
    /// Read `ANDROID_HOME` (or `ANDROID_SDK_ROOT`) and `JAVA_HOME`.
    ///
    /// Unset, empty, or non-UTF-8 values are treated as absent.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            android_home: ANDROID_HOME_VARS.iter().find_map(|var| env_path(var)),
            java_home: env_path(JAVA_HOME_VAR),
        }
    }
}

fn env_path(var: &str) -> Option<Utf8PathBuf> {
    std::env::var(var)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(Utf8PathBuf::from)
}

impl AndroidTools {
    /// Discover the tools using `settings` and the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`RepackError::SdkComponentMissing`] if `aapt` or
    /// `android.jar` cannot be located.
    pub fn discover(settings: &ToolSettings) -> Result<Self> {
        Self::discover_with(settings, &SdkEnvironment::from_env())
    }

    /// Discover the tools using `settings` and an explicit environment.
    ///
    /// # Errors
    ///
    /// Returns [`RepackError::SdkComponentMissing`] if `aapt` or
    /// `android.jar` cannot be located.
    pub fn discover_with(settings: &ToolSettings, env: &SdkEnvironment) -> Result<Self> {
        let android_home = settings
            .android_home
            .as_ref()
            .or(env.android_home.as_ref());
        let java_home = settings.java_home.as_ref().or(env.java_home.as_ref());

        let aapt = match &settings.aapt {
            Some(path) => path.clone(),
            None => find_aapt(require_sdk(android_home, "aapt")?)?,
        };
        let platform_jar = match &settings.platform_jar {
            Some(path) => path.clone(),
            None => find_platform_jar(require_sdk(android_home, "android.jar")?)?,
        };
        let jarsigner = settings
            .jarsigner
            .clone()
            .unwrap_or_else(|| java_tool(java_home, "jarsigner"));
        let keytool = settings
            .keytool
            .clone()
            .unwrap_or_else(|| java_tool(java_home, "keytool"));

        let tools = Self {
            aapt,
            platform_jar,
            jarsigner,
            keytool,
        };
        debug!("using Android tools {tools:?}");
        Ok(tools)
    }
}

fn require_sdk<'a>(
    android_home: Option<&'a Utf8PathBuf>,
    component: &'static str,
) -> Result<&'a Utf8Path> {
    android_home
        .map(Utf8PathBuf::as_path)
        .ok_or_else(|| RepackError::SdkComponentMissing {
            component,
            reason: format!(
                "no Android SDK configured; set {} or [tools] android_home",
                ANDROID_HOME_VARS.join(" or ")
            ),
        })
}

fn executable(name: &str) -> String {
    format!("{name}{}", std::env::consts::EXE_SUFFIX)
}

/// `aapt` from the `build-tools/<version>` directory with the highest
/// version that contains one.
fn find_aapt(sdk: &Utf8Path) -> Result<Utf8PathBuf> {
    let build_tools = sdk.join("build-tools");
    let name = executable("aapt");
    sub_directories(&build_tools)
        .into_iter()
        .filter_map(|dir| {
            let version = dir.file_name().and_then(build_tools_version)?;
            let aapt = dir.join(&name);
            aapt.is_file().then_some((version, aapt))
        })
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, aapt)| aapt)
        .ok_or_else(|| RepackError::SdkComponentMissing {
            component: "aapt",
            reason: format!("no {name} under {build_tools}"),
        })
}

/// Dot-separated numeric components of a build-tools directory name.
///
/// Each component contributes its leading digits, so `31.0.0-rc1` reads as
/// `[31, 0, 0]`. Names with a component lacking digits are not versions.
fn build_tools_version(name: &str) -> Option<Vec<u32>> {
    name.split('.')
        .map(|part| {
            part.split(|c: char| !c.is_ascii_digit())
                .next()
                .and_then(|digits| digits.parse::<u32>().ok())
        })
        .collect()
}

/// `android.jar` from the `platforms/android-<N>` directory with the highest
/// numeric API level.
fn find_platform_jar(sdk: &Utf8Path) -> Result<Utf8PathBuf> {
    let platforms = sdk.join("platforms");
    sub_directories(&platforms)
        .into_iter()
        .filter_map(|dir| {
            let level = dir
                .file_name()
                .and_then(|name| name.strip_prefix("android-"))
                .and_then(|level| level.parse::<u32>().ok())?;
            let jar = dir.join("android.jar");
            jar.is_file().then_some((level, jar))
        })
        .max_by_key(|(level, _)| *level)
        .map(|(_, jar)| jar)
        .ok_or_else(|| RepackError::SdkComponentMissing {
            component: "android.jar",
            reason: format!("no platforms/android-<level>/android.jar under {sdk}"),
        })
}

fn sub_directories(dir: &Utf8Path) -> Vec<Utf8PathBuf> {
    let Ok(entries) = dir.read_dir_utf8() else {
        return Vec::new();
    };
    entries
        .filter_map(std::result::Result::ok)
        .map(camino::Utf8DirEntry::into_path)
        .filter(|path| path.is_dir())
        .collect()
}

fn java_tool(java_home: Option<&Utf8PathBuf>, name: &str) -> Utf8PathBuf {
    let name = executable(name);
    java_home
        .map(|home| home.join("bin").join(&name))
        .filter(|candidate| candidate.is_file())
        .unwrap_or_else(|| Utf8PathBuf::from(name))
}
