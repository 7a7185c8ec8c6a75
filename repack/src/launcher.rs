//! Launcher orchestration shared by the binary and its tests.
//!
//! Merges command-line flags over the settings file, wires up the real tool
//! executor, and drives either the rebuild or the re-sign pipeline. Command
//! flags always win over settings values.

use crate::aut::{ApplicationUnderTest, AutDescriptor};
use crate::cli::{BuildArgs, Cli, Command, ResignArgs, SigningArgs};
use crate::config::{BuildConfig, HarnessSource};
use crate::dirs::{BaseDirs, NoBaseDirs, SystemBaseDirs};
use crate::error::{RepackError, Result};
use crate::output::{summary_lines, write_stderr_line};
use crate::pipeline::{BuildOutput, RepackContext, build};
use crate::resign::{ResignOptions, resign};
use crate::resources::{HarnessTemplate, ResourceLocator};
use crate::scratch::CleanupPolicy;
use crate::sdk::AndroidTools;
use crate::settings::{RepackSettings, SigningSettings};
use crate::signing::SigningIdentity;
use crate::tool::{CommandExecutor, SystemCommandExecutor, TimeoutCommandExecutor};
use camino::Utf8PathBuf;
use log::debug;
use std::io::Write;

/// Run the launcher against the real system.
///
/// Loads settings from `--config` or the working directory, discovers the
/// SDK tools, and delegates to [`run_with`].
///
/// # Errors
///
/// Returns any configuration, discovery, or pipeline failure.
pub fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    let cwd = Utf8PathBuf::try_from(std::env::current_dir()?)
        .map_err(|e| RepackError::NonUtf8Path(e.into_path_buf()))?;
    let settings = RepackSettings::discover(cli.config.as_deref(), &cwd)?;
    let tools = AndroidTools::discover(&settings.tools)?;

    let executor: Box<dyn CommandExecutor> = match settings.tools.timeout() {
        Some(timeout) => Box::new(TimeoutCommandExecutor::new(timeout)),
        None => Box::new(SystemCommandExecutor),
    };
    let system_dirs = SystemBaseDirs::new();
    let dirs: &dyn BaseDirs = match &system_dirs {
        Some(dirs) => dirs,
        None => &NoBaseDirs,
    };

    let context = RepackContext::new(&tools, executor.as_ref(), dirs);
    run_with(cli, &settings, &context, stdout, stderr).map(|_| ())
}

/// Run the launcher with explicit settings and collaborators.
///
/// Prints the signed package path on `stdout` and progress on `stderr`
/// (unless `--quiet`). Returns the signed package path.
///
/// # Errors
///
/// Returns any pipeline failure, or an I/O error writing to `stdout`.
pub fn run_with(
    cli: &Cli,
    settings: &RepackSettings,
    context: &RepackContext<'_>,
    stdout: &mut dyn Write,
    stderr: &mut dyn Write,
) -> Result<Utf8PathBuf> {
    let output = match &cli.command {
        Command::Build(args) => run_build(args, settings, context, cli.quiet, stderr)?,
        Command::Resign(args) => run_resign(args, settings, context, cli.quiet, stderr)?,
    };

    if !cli.quiet {
        for line in summary_lines(&output) {
            write_stderr_line(stderr, line);
        }
    }
    let package = output.into_package();
    writeln!(stdout, "{package}")?;
    Ok(package)
}

fn run_build(
    args: &BuildArgs,
    settings: &RepackSettings,
    context: &RepackContext<'_>,
    quiet: bool,
    stderr: &mut dyn Write,
) -> Result<BuildOutput> {
    let aut = resolve_aut(args, context)?;
    let config = build_config(args, settings, &aut)?;
    if !quiet {
        let message = match aut.apk_path() {
            Some(apk) => format!("Rebuilding harness for {} (read from {apk})...", config.aut()),
            None => format!("Rebuilding harness for {}...", config.aut()),
        };
        write_stderr_line(stderr, message);
    }
    build(&config, context)
}

fn run_resign(
    args: &ResignArgs,
    settings: &RepackSettings,
    context: &RepackContext<'_>,
    quiet: bool,
    stderr: &mut dyn Write,
) -> Result<BuildOutput> {
    let mut options = ResignOptions::default()
        .with_signing(signing_identity(&args.signing, &settings.signing))
        .with_cleanup(cleanup_policy(args.keep_temp_files, settings));
    if let Some(dir) = args
        .output_dir
        .as_ref()
        .or(settings.scratch.output_dir.as_ref())
    {
        options = options.with_output_dir(dir.clone());
    }
    if !quiet {
        write_stderr_line(stderr, format!("Re-signing {}...", args.apk));
    }
    resign(&args.apk, &options, context)
}

fn resolve_aut(args: &BuildArgs, context: &RepackContext<'_>) -> Result<AutDescriptor> {
    match (&args.aut_package, &args.aut_apk) {
        (Some(package), _) => Ok(AutDescriptor::new(package.as_str())),
        (None, Some(apk)) => AutDescriptor::from_apk(apk, &context.tools.aapt, context.executor),
        (None, None) => Err(RepackError::Precondition(
            "an application under test is required",
        )),
    }
}

/// Assemble a [`BuildConfig`] from command flags layered over settings.
///
/// # Errors
///
/// Returns [`RepackError::Precondition`] only through the builder; all
/// other inputs have defaults.
pub fn build_config(
    args: &BuildArgs,
    settings: &RepackSettings,
    aut: &dyn ApplicationUnderTest,
) -> Result<BuildConfig> {
    let harness_settings = &settings.harness;
    let harness = match args
        .harness_template
        .as_ref()
        .or(harness_settings.template.as_ref())
    {
        Some(path) => HarnessSource::Path(path.clone()),
        None => {
            let mut template = HarnessTemplate::default();
            if let Some(version) = args
                .harness_version
                .as_ref()
                .or(harness_settings.version.as_ref())
            {
                template = HarnessTemplate::new(version.as_str());
            }
            if let Some(name) = &harness_settings.name {
                template = template.with_name(name.as_str());
            }
            HarnessSource::Template(template)
        }
    };

    let roots = args
        .resource_dirs
        .iter()
        .chain(&harness_settings.resource_dirs)
        .cloned()
        .collect();

    let mut builder = BuildConfig::builder()
        .with_aut(aut)
        .with_harness(harness)
        .with_signing(signing_identity(&args.signing, &settings.signing))
        .with_cleanup(cleanup_policy(args.keep_temp_files, settings))
        .with_resources(ResourceLocator::new(roots));
    if let Some(template) = args
        .manifest_template
        .as_ref()
        .or(harness_settings.manifest_template.as_ref())
    {
        builder = builder.with_manifest_template(template.clone());
    }
    if let Some(output) = &args.output {
        builder = builder.with_output(output.clone());
    } else if let Some(dir) = args
        .output_dir
        .as_ref()
        .or(settings.scratch.output_dir.as_ref())
    {
        builder = builder.with_output_dir(dir.clone());
    }

    let config = builder.build()?;
    debug!("build configuration: {config:?}");
    Ok(config)
}

/// Layer signing flags over the `[signing]` settings.
#[must_use]
pub fn signing_identity(args: &SigningArgs, settings: &SigningSettings) -> SigningIdentity {
    let mut identity = SigningIdentity::default();
    if let Some(keystore) = args.keystore.as_ref().or(settings.keystore.as_ref()) {
        identity = identity.with_keystore(keystore.clone());
    }
    if let Some(alias) = args.alias.as_ref().or(settings.alias.as_ref()) {
        identity = identity.with_alias(alias.as_str());
    }
    if let Some(storepass) = args.storepass.as_ref().or(settings.storepass.as_ref()) {
        identity = identity.with_storepass(storepass.as_str());
    }
    if let Some(algorithm) = &settings.default_algorithm {
        identity = identity.with_default_algorithm(algorithm.as_str());
    }
    identity
}

fn cleanup_policy(keep_temp_files: bool, settings: &RepackSettings) -> CleanupPolicy {
    if keep_temp_files {
        CleanupPolicy::Retain
    } else {
        settings.scratch.cleanup
    }
}

/// Report `result` on `stderr` and map it to a process exit code.
///
/// Failures exit with the code of their [`crate::error::ErrorClass`].
pub fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, format!("error: {err}"));
            let mut source = std::error::Error::source(&err);
            while let Some(cause) = source {
                write_stderr_line(stderr, format!("  caused by: {cause}"));
                source = std::error::Error::source(cause);
            }
            err.class().exit_code()
        }
    }
}
