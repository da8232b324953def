//! Template definition discovery
//!
//! Scans the config directory tree for `*.conf` records and indexes them by
//! identifier. The registry is an immutable value built once per run.

use super::parser;
use crate::BuildError;
use crate::paths::is_file_name;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// File extension of definition records
pub const RECORD_EXTENSION: &str = "conf";

/// Key that overrides the filename-derived identifier
pub const IDENTIFIER_KEY: &str = "DISTRO";

/// Identifier → record path index
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: BTreeMap<String, PathBuf>,
}

impl Registry {
    /// Discover all definition records below `config_dir`
    ///
    /// The shared constants file is excluded by path and by file name.
    pub async fn discover(config_dir: &Path, constants_file: &Path) -> Result<Self, BuildError> {
        if !fs::metadata(config_dir).await.is_ok_and(|m| m.is_dir()) {
            return Err(BuildError::ConfigDiscovery(format!(
                "config directory {} does not exist",
                config_dir.display()
            )));
        }

        let candidates = find_candidates(config_dir, constants_file).await?;
        let mut entries: BTreeMap<String, PathBuf> = BTreeMap::new();

        for path in candidates {
            let text = fs::read_to_string(&path).await?;
            let identifier = identifier_for(&path, &text);

            if identifier.is_empty() {
                return Err(BuildError::ConfigDiscovery(format!(
                    "{} yields an empty identifier",
                    path.display()
                )));
            }

            if !is_file_name(&identifier) {
                return Err(BuildError::ConfigDiscovery(format!(
                    "{} yields identifier '{}', which is not usable as a file name",
                    path.display(),
                    identifier
                )));
            }

            if let Some(existing) = entries.get(&identifier) {
                return Err(BuildError::ConfigDiscovery(format!(
                    "identifier '{}' is defined by both {} and {}",
                    identifier,
                    existing.display(),
                    path.display()
                )));
            }

            debug!("Discovered template '{}' at {}", identifier, path.display());
            entries.insert(identifier, path);
        }

        if entries.is_empty() {
            return Err(BuildError::ConfigDiscovery(format!(
                "no template definitions found in {}",
                config_dir.display()
            )));
        }

        info!("Discovered {} template definitions", entries.len());
        Ok(Self { entries })
    }

    /// Build a registry from explicit entries
    pub fn from_entries(entries: impl IntoIterator<Item = (String, PathBuf)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Sorted identifiers
    pub fn identifiers(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    /// Record path for an identifier
    pub fn path(&self, identifier: &str) -> Option<&Path> {
        self.entries.get(identifier).map(PathBuf::as_path)
    }

    /// Record path for an identifier, failing if it is unknown
    pub fn lookup(&self, identifier: &str) -> Result<&Path, BuildError> {
        self.path(identifier)
            .ok_or_else(|| BuildError::ConfigLookup(identifier.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.entries
            .iter()
            .map(|(id, path)| (id.as_str(), path.as_path()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Derive an identifier from a record file name
///
/// Strips the extension and a leading numeric ordering prefix such as `10-`.
pub fn derive_identifier(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let digits = stem.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        if let Some(rest) = stem[digits..]
            .strip_prefix('-')
            .or_else(|| stem[digits..].strip_prefix('_'))
        {
            return rest.to_string();
        }
    }
    stem
}

fn identifier_for(path: &Path, text: &str) -> String {
    let explicit = parser::assignments(text)
        .filter(|a| a.key == IDENTIFIER_KEY)
        .last()
        .and_then(|a| parser::expand_word(a.raw, &|_| None).ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    explicit.unwrap_or_else(|| derive_identifier(path))
}

/// Collect candidate record files, sorted by path
async fn find_candidates(
    config_dir: &Path,
    constants_file: &Path,
) -> Result<Vec<PathBuf>, BuildError> {
    let constants_name = constants_file.file_name();
    let mut candidates = Vec::new();
    let mut pending = vec![config_dir.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut read_dir = fs::read_dir(&dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            let file_type = entry.file_type().await?;

            if path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with('.'))
            {
                continue;
            }

            if file_type.is_dir() {
                pending.push(path);
                continue;
            }

            if path.extension().is_none_or(|e| e != RECORD_EXTENSION) {
                continue;
            }

            if path == constants_file || path.file_name() == constants_name {
                debug!("Skipping constants file {}", path.display());
                continue;
            }

            candidates.push(path);
        }
    }

    candidates.sort();
    Ok(candidates)
}
