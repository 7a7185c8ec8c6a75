//! Logging coverage for the signature-algorithm fallback.
//!
//! `logtest` installs a process-wide logger, so this binary holds a single
//! test.

use harness_repack::pipeline::RepackContext;
use harness_repack::resign::{ResignOptions, resign};
use harness_repack::signing::SigningIdentity;
use harness_repack::test_utils::{
    FakeAndroidTools, fake_tool_paths, utf8_temp_dir, write_package,
};
use log::Level;
use logtest::Logger;
use tempfile::TempDir;

struct NoHome;

impl harness_repack::dirs::BaseDirs for NoHome {
    fn home_dir(&self) -> Option<std::path::PathBuf> {
        None
    }
}

#[test]
fn unreadable_certificate_logs_warning_and_signs_with_default() {
    let mut logger = Logger::start();
    let dir = TempDir::new().expect("temp dir");
    let root = utf8_temp_dir(&dir);
    let input = root.join("app.apk");
    write_package(&input, &[("classes.dex", b"dex".as_slice())]);
    let tools = fake_tool_paths();
    let fake = FakeAndroidTools::new();
    let context = RepackContext::new(&tools, &fake, &NoHome);
    let options = ResignOptions::default()
        .with_output_dir(root.join("out"))
        .with_signing(
            SigningIdentity::default()
                .with_keystore(root.join("missing.jks"))
                .with_alias("release")
                .with_default_algorithm("SHA1withDSA"),
        );

    let output = resign(&input, &options, &context).expect("resign succeeds");

    assert!(output.algorithm().is_fallback());
    assert_eq!(output.algorithm().algorithm, "SHA1withDSA");
    let jarsigner = fake.calls().pop().expect("jarsigner invoked");
    assert_eq!(jarsigner.args.get(1).map(String::as_str), Some("SHA1withDSA"));

    let mut warned = false;
    while let Some(record) = logger.pop() {
        if record.level() == Level::Warn && record.args().contains("falling back to SHA1withDSA")
        {
            warned = true;
        }
    }
    assert!(warned, "expected a fallback warning to be logged");
}
