//! Behaviour-driven tests for rebuilding the harness.
//!
//! The scenarios run the real pipeline against `FakeAndroidTools`, so every
//! archive step touches real files while `aapt` and `jarsigner` are imitated.

mod support;

use harness_repack::config::BuildConfig;
use harness_repack::error::RepackError;
use harness_repack::pipeline::{BuildOutput, RepackContext, build};
use harness_repack::scratch::CleanupPolicy;
use harness_repack::test_utils::{FakeAndroidTools, fake_tool_paths};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::collections::HashSet;
use support::{FakeHome, Workspace, entry_names, manifest_text};

// ---------------------------------------------------------------------------
// Build world
// ---------------------------------------------------------------------------

#[derive(Default)]
struct BuildWorld {
    workspace: Option<Workspace>,
    package: Option<String>,
    failing_tool: Option<String>,
    cleanup: CleanupPolicy,
    tool_sequence: Vec<String>,
    result: Option<Result<BuildOutput, RepackError>>,
    concurrent: Vec<BuildOutput>,
}

impl BuildWorld {
    fn config(&self) -> BuildConfig {
        let workspace = self.workspace.as_ref().expect("workspace not set");
        let package = self.package.as_deref().expect("package not set");
        workspace
            .config(package)
            .with_cleanup(self.cleanup)
            .build()
            .expect("config")
    }

    fn fake_tools(&self) -> FakeAndroidTools {
        let fake = FakeAndroidTools::new();
        match &self.failing_tool {
            Some(tool) => fake.with_failing_tool(tool, "simulated failure"),
            None => fake,
        }
    }

    fn output(&self) -> &BuildOutput {
        match self.result.as_ref().expect("build not run") {
            Ok(output) => output,
            Err(err) => panic!("expected a successful build, got {err:?}"),
        }
    }
}

#[fixture]
fn world() -> BuildWorld {
    BuildWorld::default()
}

fn remaining_scratch_dirs(package: &str) -> Vec<std::path::PathBuf> {
    let prefix = format!("harness-repack-{package}-");
    std::fs::read_dir(std::env::temp_dir())
        .expect("read temp dir")
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
        .map(|entry| entry.path())
        .collect()
}

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

#[given("a resource directory holding the prebuilt harness")]
fn given_resources(world: &mut BuildWorld) {
    world.workspace = Some(Workspace::new());
}

#[given("the application package \"{package}\"")]
fn given_package(world: &mut BuildWorld, package: String) {
    world.package = Some(package);
}

#[given("the tool \"{tool}\" fails")]
fn given_failing_tool(world: &mut BuildWorld, tool: String) {
    world.failing_tool = Some(tool);
}

#[given("scratch directories are retained")]
fn given_retained_scratch(world: &mut BuildWorld) {
    world.cleanup = CleanupPolicy::Retain;
}

#[when("the harness is rebuilt")]
fn when_rebuilt(world: &mut BuildWorld) {
    let config = world.config();
    let tools = fake_tool_paths();
    let fake = world.fake_tools();
    let context = RepackContext::new(&tools, &fake, &FakeHome);

    world.result = Some(build(&config, &context));
    world.tool_sequence = fake.tool_sequence();
}

#[when("{count} builds run at the same time")]
fn when_concurrent_builds(world: &mut BuildWorld, count: usize) {
    let config = world.config();
    world.concurrent = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..count)
            .map(|_| {
                scope.spawn(|| {
                    // The executor is not shared across threads.
                    let tools = fake_tool_paths();
                    let fake = FakeAndroidTools::new();
                    let context = RepackContext::new(&tools, &fake, &FakeHome);
                    build(&config, &context).expect("build succeeds")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("build thread panicked"))
            .collect()
    });
}

#[then("the build succeeds")]
fn then_build_succeeds(world: &mut BuildWorld) {
    let output = world.output();
    assert!(output.package().is_file());
    let workspace = world.workspace.as_ref().expect("workspace not set");
    assert!(output.package().starts_with(workspace.output_dir()));
}

#[then("the output package is named \"{name}\"")]
fn then_output_named(world: &mut BuildWorld, name: String) {
    assert_eq!(world.output().package().file_name(), Some(name.as_str()));
}

#[then("the first entry of the output package is \"{entry}\"")]
fn then_first_entry(world: &mut BuildWorld, entry: String) {
    let names = entry_names(world.output().package());
    assert_eq!(names.first(), Some(&entry));
}

#[then("the output package keeps the entry \"{entry}\"")]
fn then_keeps_entry(world: &mut BuildWorld, entry: String) {
    assert!(entry_names(world.output().package()).contains(&entry));
}

#[then("the output package has no entry \"{entry}\"")]
fn then_lacks_entry(world: &mut BuildWorld, entry: String) {
    assert!(!entry_names(world.output().package()).contains(&entry));
}

#[then("the compiled manifest targets \"{package}\"")]
fn then_manifest_targets(world: &mut BuildWorld, package: String) {
    let manifest = manifest_text(world.output().package());
    assert!(manifest.contains(&format!("android:targetPackage=\"{package}\"")));
    assert!(!manifest.contains("${TARGET_PACKAGE}"));
}

#[then("the tools ran in the order \"{sequence}\"")]
fn then_tool_order(world: &mut BuildWorld, sequence: String) {
    let expected: Vec<_> = sequence.split(", ").collect();
    assert_eq!(world.tool_sequence, expected);
}

#[then("the build fails because \"{tool}\" failed")]
fn then_build_fails(world: &mut BuildWorld, tool: String) {
    let result = world.result.as_ref().expect("build not run");
    assert!(
        matches!(result, Err(RepackError::ToolExecution { tool: failed, output, .. })
            if *failed == tool && output.contains("simulated failure")),
        "expected {tool} to fail the build, got {result:?}"
    );
}

#[then("no scratch directory remains for \"{package}\"")]
fn then_no_scratch(world: &mut BuildWorld, package: String) {
    assert!(world.result.is_some(), "build not run");
    assert_eq!(remaining_scratch_dirs(&package), Vec::<std::path::PathBuf>::new());
}

#[then("the builds produced {count} distinct packages")]
fn then_distinct_packages(world: &mut BuildWorld, count: usize) {
    let packages: HashSet<_> = world
        .concurrent
        .iter()
        .map(|output| output.package().to_owned())
        .collect();
    assert_eq!(packages.len(), count);
}

#[then("the builds used {count} distinct scratch directories")]
fn then_distinct_scratch(world: &mut BuildWorld, count: usize) {
    let scratch: HashSet<_> = world
        .concurrent
        .iter()
        .map(|output| output.scratch_dir().expect("retained").to_owned())
        .collect();
    assert_eq!(scratch.len(), count);
    for dir in scratch {
        std::fs::remove_dir_all(dir).expect("remove retained scratch");
    }
}

// ---------------------------------------------------------------------------
// Scenario bindings
// ---------------------------------------------------------------------------

#[scenario(
    path = "tests/features/build.feature",
    name = "Rebuild the harness for an application package"
)]
fn scenario_rebuild_for_package(world: BuildWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/build.feature",
    name = "A failing aapt aborts the build"
)]
fn scenario_aapt_failure_aborts(world: BuildWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/build.feature",
    name = "A failing jarsigner aborts the build"
)]
fn scenario_jarsigner_failure_aborts(world: BuildWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/build.feature",
    name = "Concurrent builds for one package use distinct paths"
)]
fn scenario_concurrent_builds(world: BuildWorld) {
    let _ = world;
}
