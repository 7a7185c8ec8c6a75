//! Markdown TOML block extraction.
//!
//! Pulls fenced TOML blocks out of the user guide so the documented settings
//! examples can be checked against the real settings parser.

use std::sync::LazyLock;

/// Documentation files relative to the workspace root.
const DOC_PATHS: &[&str] = &["docs/users-guide.md"];

/// TOML blocks from the documentation, loaded once per test binary.
pub static DOC_TOML_BLOCKS: LazyLock<Vec<String>> = LazyLock::new(|| {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    let workspace_root = std::path::Path::new(manifest_dir)
        .parent()
        .expect("repack crate should be in workspace");

    let mut all_blocks = Vec::new();
    for path in DOC_PATHS {
        let guide_path = workspace_root.join(path);
        let content = std::fs::read_to_string(&guide_path)
            .unwrap_or_else(|_| panic!("failed to read {path}"));
        all_blocks.extend(extract_toml_blocks(&content));
    }
    all_blocks
});

/// Extract every fenced TOML block from `markdown`, verbatim.
///
/// Comment lines are kept: they are valid TOML and the settings parser must
/// accept them.
pub fn extract_toml_blocks(markdown: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut current: Option<String> = None;

    for line in markdown.lines() {
        match current.as_mut() {
            None if line.starts_with("```toml") => current = Some(String::new()),
            None => {}
            Some(block) if line.starts_with("```") => {
                blocks.push(std::mem::take(block));
                current = None;
            }
            Some(block) => {
                block.push_str(line);
                block.push('\n');
            }
        }
    }

    blocks
}

/// The first documented block containing `marker`.
pub fn find_block_containing(marker: &str) -> String {
    DOC_TOML_BLOCKS
        .iter()
        .find(|block| block.contains(marker))
        .unwrap_or_else(|| panic!("no TOML block containing '{marker}' found in documentation"))
        .clone()
}

#[test]
fn extracts_toml_blocks_from_markdown() {
    let markdown = r#"
# Example

```toml
[tools]
timeout_secs = 30
```

Some text.

```toml
[signing]
alias = "release"
```
"#;

    let blocks = extract_toml_blocks(markdown);
    assert_eq!(blocks.len(), 2);
    assert!(blocks[0].contains("timeout_secs = 30"));
    assert!(blocks[1].contains("alias = \"release\""));
}

#[test]
fn doc_toml_blocks_are_loaded() {
    assert!(
        !DOC_TOML_BLOCKS.is_empty(),
        "expected TOML blocks from documentation"
    );
}
