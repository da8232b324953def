//! Fragment scanning
//!
//! A fragment is any cloud-config-like file contributing `runcmd` entries.
//! Scanning is a lenient line scanner rather than a YAML parser, so fragments
//! may contain other keys, comments, or syntax cloud-init would reject.

use crate::BuildError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Top-level line that opens the boot-command section
pub const SECTION_MARKER: &str = "runcmd:";

/// File extensions considered fragments during discovery
pub const FRAGMENT_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Extract the `runcmd` list items from a fragment
///
/// Collection starts at the first top-level `runcmd:` line. While collecting,
/// each `- item` line contributes `item` verbatim; blank and comment lines
/// are skipped; any other top-level line ends collection for the file.
pub fn scan_fragment(text: &str) -> Vec<String> {
    let mut commands = Vec::new();
    let mut collecting = false;

    for line in text.lines() {
        let top_level = !line.starts_with([' ', '\t']);

        if !collecting {
            if top_level && line.trim_end() == SECTION_MARKER {
                collecting = true;
            }
            continue;
        }

        let trimmed = line.trim_start();
        if trimmed.trim_end().is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if let Some(item) = list_item(trimmed) {
            if !item.is_empty() {
                commands.push(item.to_string());
            }
        } else if top_level {
            break;
        }
    }

    commands
}

fn list_item(trimmed: &str) -> Option<&str> {
    let rest = trimmed.strip_prefix('-')?;
    if rest.is_empty() {
        return Some(rest);
    }
    rest.starts_with([' ', '\t'])
        .then(|| rest.trim_start().trim_end())
}

/// Read and scan a fragment file
pub async fn load_fragment(path: &Path) -> Result<Vec<String>, BuildError> {
    let text = fs::read_to_string(path).await?;
    let commands = scan_fragment(&text);
    debug!(
        "Fragment {} contributes {} commands",
        path.display(),
        commands.len()
    );
    Ok(commands)
}

/// Find per-template fragments for a definition file stem
///
/// Matches files in `dir` named `<stem>` followed by `-`, `_` or `.`, with a
/// fragment extension, in lexical order. `exclude` (the base fragment) is
/// never returned.
pub async fn discover_fragments(
    dir: &Path,
    stem: &str,
    exclude: Option<&Path>,
) -> Result<Vec<PathBuf>, BuildError> {
    if !fs::try_exists(dir).await? {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    let mut read_dir = fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        if !entry.file_type().await?.is_file() {
            continue;
        }

        let is_fragment = path
            .extension()
            .is_some_and(|e| FRAGMENT_EXTENSIONS.iter().any(|ext| e == *ext));
        let name = entry.file_name().to_string_lossy().into_owned();

        if is_fragment && matches_stem(&name, stem) && exclude != Some(path.as_path()) {
            found.push(path);
        }
    }

    found.sort();
    Ok(found)
}

fn matches_stem(file_name: &str, stem: &str) -> bool {
    file_name
        .strip_prefix(stem)
        .is_some_and(|rest| rest.starts_with(['-', '_', '.']))
}
