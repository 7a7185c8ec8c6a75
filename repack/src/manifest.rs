//! Manifest templating.
//!
//! The harness manifest is shipped as a text template whose only variable is
//! [`TARGET_PACKAGE_PLACEHOLDER`]. Substitution is literal: no escaping and no
//! XML validation. A template without the placeholder renders unchanged.

use crate::error::{RepackError, Result};
use crate::package_id::PackageId;
use crate::resources::resource_not_found;
use crate::scratch::ScratchSpace;
use camino::{Utf8Path, Utf8PathBuf};
use log::debug;

/// Token replaced with the package id of the application under test.
pub const TARGET_PACKAGE_PLACEHOLDER: &str = "${TARGET_PACKAGE}";

/// File name of the rendered manifest inside the scratch directory.
pub const RENDERED_MANIFEST_NAME: &str = "AndroidManifest.xml";

/// Replace every occurrence of the placeholder in `template`.
///
/// # Examples
///
/// ```
/// use harness_repack::manifest::substitute;
/// use harness_repack::package_id::PackageId;
///
/// let rendered = substitute(
///     r#"<instrumentation android:targetPackage="${TARGET_PACKAGE}"/>"#,
///     &PackageId::from("io.selendroid.testapp"),
/// );
/// assert_eq!(
///     rendered,
///     r#"<instrumentation android:targetPackage="io.selendroid.testapp"/>"#
/// );
/// ```
#[must_use]
pub fn substitute(template: &str, package: &PackageId) -> String {
    template.replace(TARGET_PACKAGE_PLACEHOLDER, package.as_str())
}

/// Render the manifest template at `template` into the scratch directory.
///
/// Returns the path of the rendered file.
///
/// # Errors
///
/// Returns [`RepackError::ResourceNotFound`] if the template does not exist,
/// or an I/O error if it cannot be read or the output cannot be written.
pub fn render_manifest(
    template: &Utf8Path,
    package: &PackageId,
    scratch: &ScratchSpace,
) -> Result<Utf8PathBuf> {
    let text = std::fs::read_to_string(template).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => resource_not_found(template, &[template.to_owned()]),
        _ => RepackError::file_io(template, err),
    })?;

    if !text.contains(TARGET_PACKAGE_PLACEHOLDER) {
        debug!("manifest template {template} has no {TARGET_PACKAGE_PLACEHOLDER} placeholder");
    }

    let rendered = substitute(&text, package);
    let path = scratch.file(RENDERED_MANIFEST_NAME);
    std::fs::write(&path, rendered).map_err(|err| RepackError::file_io(&path, err))?;
    debug!("rendered manifest for {package} to {path}");
    Ok(path)
}
