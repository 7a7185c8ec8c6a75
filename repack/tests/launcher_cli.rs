//! Launcher tests: flags and settings in, package path out.

mod support;

use clap::Parser;
use harness_repack::cli::Cli;
use harness_repack::error::RepackError;
use harness_repack::launcher::{exit_code_for_run_result, run_with};
use harness_repack::pipeline::RepackContext;
use harness_repack::settings::RepackSettings;
use harness_repack::test_utils::{FakeAndroidTools, fake_tool_paths, write_package};
use support::{FakeHome, Workspace, manifest_text};

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("harness-repack").chain(args.iter().copied()))
        .expect("arguments should parse")
}

#[test]
fn build_prints_only_the_package_path_on_stdout() {
    let workspace = Workspace::new();
    let resources = workspace.resources();
    let out = workspace.output_dir();
    let cli = parse(&[
        "build",
        "--aut-package",
        "io.selendroid.testapp",
        "--resource-dir",
        resources.as_str(),
        "--output-dir",
        out.as_str(),
    ]);
    let tools = fake_tool_paths();
    let fake = FakeAndroidTools::new();
    let context = RepackContext::new(&tools, &fake, &FakeHome);
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let package = run_with(
        &cli,
        &RepackSettings::default(),
        &context,
        &mut stdout,
        &mut stderr,
    )
    .expect("build succeeds");

    assert_eq!(String::from_utf8(stdout).expect("utf8"), format!("{package}\n"));
    let stderr = String::from_utf8(stderr).expect("utf8");
    assert!(stderr.contains("Rebuilding harness for io.selendroid.testapp..."));
    assert!(stderr.contains("debug keystore"));
    assert!(package.is_file());
    assert!(manifest_text(&package).contains("targetPackage=\"io.selendroid.testapp\""));
}

#[test]
fn quiet_suppresses_progress() {
    let workspace = Workspace::new();
    let resources = workspace.resources();
    let out = workspace.output_dir();
    let cli = parse(&[
        "build",
        "--quiet",
        "--aut-package",
        "org.example",
        "--resource-dir",
        resources.as_str(),
        "--output-dir",
        out.as_str(),
    ]);
    let tools = fake_tool_paths();
    let fake = FakeAndroidTools::new();
    let context = RepackContext::new(&tools, &fake, &FakeHome);
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    run_with(
        &cli,
        &RepackSettings::default(),
        &context,
        &mut stdout,
        &mut stderr,
    )
    .expect("build succeeds");

    assert!(stderr.is_empty());
    assert!(!stdout.is_empty());
}

#[test]
fn build_from_aut_apk_names_the_source_package() {
    let workspace = Workspace::new();
    let resources = workspace.resources();
    let out = workspace.output_dir();
    let apk = workspace.path("shop.apk");
    let cli = parse(&[
        "build",
        "--aut-apk",
        apk.as_str(),
        "--resource-dir",
        resources.as_str(),
        "--output-dir",
        out.as_str(),
    ]);
    let tools = fake_tool_paths();
    let fake = FakeAndroidTools::new().with_badging_package("com.example.shop");
    let context = RepackContext::new(&tools, &fake, &FakeHome);
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let package = run_with(
        &cli,
        &RepackSettings::default(),
        &context,
        &mut stdout,
        &mut stderr,
    )
    .expect("build succeeds");

    let stderr = String::from_utf8(stderr).expect("utf8");
    assert!(stderr.contains(&format!(
        "Rebuilding harness for com.example.shop (read from {apk})..."
    )));
    assert_eq!(
        package.file_name(),
        Some("instrumentation-com.example.shop.apk")
    );
}

#[test]
fn settings_supply_resource_dirs_and_output_dir() {
    let workspace = Workspace::new();
    let settings_text = format!(
        "[harness]\nresource_dirs = [\"{}\"]\n\n[scratch]\noutput_dir = \"{}\"\ncleanup = \"eager\"\n",
        workspace.resources(),
        workspace.output_dir(),
    );
    let settings = RepackSettings::parse(&settings_text, &workspace.path("harness-repack.toml"))
        .expect("settings parse");
    let cli = parse(&["build", "--aut-package", "org.settings"]);
    let tools = fake_tool_paths();
    let fake = FakeAndroidTools::new();
    let context = RepackContext::new(&tools, &fake, &FakeHome);
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let package = run_with(&cli, &settings, &context, &mut stdout, &mut stderr)
        .expect("build succeeds");

    assert!(package.starts_with(workspace.output_dir()));
    let stderr = String::from_utf8(stderr).expect("utf8");
    assert!(!stderr.contains("Intermediate files"));
}

#[test]
fn resign_command_writes_prefixed_package() {
    let workspace = Workspace::new();
    let input = workspace.path("signed.apk");
    write_package(
        &input,
        &[
            ("AndroidManifest.xml", b"m".as_slice()),
            ("META-INF/MANIFEST.MF", b"mf".as_slice()),
            ("META-INF/CERT.SF", b"sf".as_slice()),
            ("META-INF/CERT.RSA", b"rsa".as_slice()),
        ],
    );
    let out = workspace.output_dir();
    let cli = parse(&["resign", input.as_str(), "--output-dir", out.as_str()]);
    let tools = fake_tool_paths();
    let fake = FakeAndroidTools::new();
    let context = RepackContext::new(&tools, &fake, &FakeHome);
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let package = run_with(
        &cli,
        &RepackSettings::default(),
        &context,
        &mut stdout,
        &mut stderr,
    )
    .expect("resign succeeds");

    assert_eq!(package.file_name(), Some("resigned-signed.apk"));
    assert!(
        String::from_utf8(stderr)
            .expect("utf8")
            .contains("Re-signing")
    );
}

#[test]
fn failures_map_to_exit_codes_and_report_on_stderr() {
    let workspace = Workspace::new();
    let empty = workspace.path("empty-resources");
    std::fs::create_dir_all(&empty).expect("create empty dir");
    let out = workspace.output_dir();
    let cli = parse(&[
        "build",
        "--aut-package",
        "org.example",
        "--resource-dir",
        empty.as_str(),
        "--harness-version",
        "0.0.0-missing",
        "--output-dir",
        out.as_str(),
    ]);
    let tools = fake_tool_paths();
    let fake = FakeAndroidTools::new();
    let context = RepackContext::new(&tools, &fake, &FakeHome);
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    let result = run_with(
        &cli,
        &RepackSettings::default(),
        &context,
        &mut stdout,
        &mut stderr,
    );
    let err = result.expect_err("harness missing");
    assert!(matches!(err, RepackError::ResourceNotFound { .. }));

    let mut report = Vec::new();
    let code = exit_code_for_run_result(Err(err), &mut report);
    assert_eq!(code, 66);
    let report = String::from_utf8(report).expect("utf8");
    assert!(report.starts_with("error: "));
    assert!(report.contains("prebuild/selendroid-server-0.0.0-missing.apk"));
    assert!(stdout.is_empty());
}

#[test]
fn success_maps_to_zero() {
    let mut stderr = Vec::new();
    assert_eq!(exit_code_for_run_result(Ok(()), &mut stderr), 0);
    assert!(stderr.is_empty());
}
