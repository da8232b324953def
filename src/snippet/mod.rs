//! Cloud-init snippet composition
//!
//! The generated snippet is a `#cloud-config` document made of:
//! 1. the header marker
//! 2. the static user-accounts block, verbatim
//! 3. a single `runcmd` list merged from the base fragment and the
//!    per-template fragments
//! 4. an optional reference comment
//!
//! The document is assembled as text. Only the `runcmd` section is merged;
//! everything else in a fragment is ignored.

pub mod fragment;

pub use fragment::{discover_fragments, load_fragment, scan_fragment};

use crate::BuildError;
use crate::config::TemplateDefinition;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Header marker of a cloud-config document
pub const HEADER: &str = "#cloud-config";

/// Written when no user-accounts block is available
pub const NO_USERS: &str = "users: []";

/// A composed snippet, ready to render
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snippet {
    /// User-accounts block, verbatim
    pub users: Option<String>,
    /// Merged `runcmd` entries
    pub commands: Vec<String>,
    /// URL for the trailing reference comment
    pub reference_url: Option<String>,
}

impl Snippet {
    /// Render the snippet document
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(HEADER);
        out.push('\n');

        match self.users.as_deref().map(str::trim_end) {
            Some(users) if !users.is_empty() => out.push_str(users),
            _ => out.push_str(NO_USERS),
        }
        out.push('\n');

        if self.commands.is_empty() {
            out.push_str("runcmd: []\n");
        } else {
            out.push_str("runcmd:\n");
            for command in &self.commands {
                out.push_str("  - ");
                out.push_str(command);
                out.push('\n');
            }
        }

        if let Some(url) = &self.reference_url {
            out.push_str("# Reference: ");
            out.push_str(url);
            out.push('\n');
        }

        out
    }
}

/// Builds snippets from the fragment directory and the user-accounts block
#[derive(Debug, Clone)]
pub struct SnippetComposer {
    fragment_dir: PathBuf,
    users_file: PathBuf,
}

impl SnippetComposer {
    pub fn new(fragment_dir: impl AsRef<Path>, users_file: impl AsRef<Path>) -> Self {
        Self {
            fragment_dir: fragment_dir.as_ref().to_path_buf(),
            users_file: users_file.as_ref().to_path_buf(),
        }
    }

    /// Fragment files for a definition, base fragment first
    ///
    /// An explicit `SNIPPET_FRAGMENTS` list replaces filename-prefix discovery.
    pub async fn fragment_paths(
        &self,
        definition: &TemplateDefinition,
    ) -> Result<Vec<PathBuf>, BuildError> {
        let base = definition
            .base_snippet
            .as_ref()
            .map(|name| self.fragment_dir.join(name));

        let mut paths: Vec<PathBuf> = base.iter().cloned().collect();
        match &definition.fragments {
            Some(explicit) => {
                paths.extend(explicit.iter().map(|name| self.fragment_dir.join(name)));
            }
            None => {
                let found =
                    discover_fragments(&self.fragment_dir, &definition.stem(), base.as_deref())
                        .await?;
                paths.extend(found);
            }
        }

        for path in &paths {
            if !fs::try_exists(path).await? {
                return Err(BuildError::resource(
                    &definition.identifier,
                    format!("snippet fragment {} does not exist", path.display()),
                ));
            }
        }

        Ok(paths)
    }

    /// Compose the snippet for a definition
    pub async fn compose(
        &self,
        definition: &TemplateDefinition,
        reference_url: Option<&str>,
    ) -> Result<Snippet, BuildError> {
        let mut commands = Vec::new();
        for path in self.fragment_paths(definition).await? {
            commands.extend(load_fragment(&path).await?);
        }

        let users = self.load_users().await?;

        let reference_url = if definition.reference_comment {
            if reference_url.is_none() {
                warn!("REFERENCE_URL_COMMENT is set but no REFERENCE_URL constant is configured");
            }
            reference_url.map(str::to_string)
        } else {
            None
        };

        debug!(
            "Composed snippet for '{}' with {} runcmd entries",
            definition.identifier,
            commands.len()
        );

        Ok(Snippet {
            users,
            commands,
            reference_url,
        })
    }

    async fn load_users(&self) -> Result<Option<String>, BuildError> {
        if !fs::try_exists(&self.users_file).await? {
            warn!(
                "No user-accounts block at {}, writing '{}'",
                self.users_file.display(),
                NO_USERS
            );
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(&self.users_file).await?))
    }
}

/// Write a rendered snippet, creating parent directories
pub async fn write_snippet(path: &Path, content: &str) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, content).await?;
    info!("Wrote snippet to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigMapping;
    use tempfile::TempDir;

    fn definition(dir: &Path, extra: &[(&str, &str)]) -> TemplateDefinition {
        let mut mapping: ConfigMapping = [
            ("VMID", "100"),
            ("STORAGE", "pool0"),
            ("LOCAL_IMAGE_FILE_NAME", "alpha.img"),
            ("IMAGE_RESIZE", "8G"),
            ("TEMPLATE_NAME", "alpha-tpl"),
            ("SNIPPET_FILE", "alpha.yaml"),
        ]
        .into_iter()
        .collect();
        for (k, v) in extra {
            mapping.insert(*k, *v);
        }
        TemplateDefinition::from_mapping("alpha", &dir.join("10-alpha.conf"), mapping).unwrap()
    }

    #[test]
    fn test_render_empty_snippet() {
        let snippet = Snippet::default();
        assert_eq!(snippet.render(), "#cloud-config\nusers: []\nruncmd: []\n");
    }

    #[test]
    fn test_render_full_snippet() {
        let snippet = Snippet {
            users: Some("users:\n  - name: admin\n\n".to_string()),
            commands: vec!["a".to_string(), "b".to_string()],
            reference_url: Some("https://example.org/docs".to_string()),
        };
        assert_eq!(
            snippet.render(),
            "#cloud-config\nusers:\n  - name: admin\nruncmd:\n  - a\n  - b\n# Reference: https://example.org/docs\n"
        );
    }

    #[tokio::test]
    async fn test_compose_merges_base_then_template_fragments() {
        let temp = TempDir::new().unwrap();
        let fragments = temp.path().join("snippets");
        fs::create_dir_all(&fragments).await.unwrap();
        fs::write(fragments.join("base.yaml"), "runcmd:\n  - a\n  - b\n")
            .await
            .unwrap();
        fs::write(fragments.join("10-alpha-extra.yaml"), "runcmd:\n  - c\n")
            .await
            .unwrap();
        fs::write(fragments.join("10-alpha-empty.yaml"), "packages:\n  - vim\n")
            .await
            .unwrap();

        let composer = SnippetComposer::new(&fragments, temp.path().join("users.yaml"));
        let def = definition(temp.path(), &[("BASE_SNIPPET_FILE", "base.yaml")]);

        let snippet = composer.compose(&def, None).await.unwrap();
        assert_eq!(snippet.commands, vec!["a", "b", "c"]);
        assert_eq!(snippet.users, None);

        let parsed: serde_yaml::Value = serde_yaml::from_str(&snippet.render()).unwrap();
        let runcmd: Vec<&str> = parsed["runcmd"]
            .as_sequence()
            .unwrap()
            .iter()
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(runcmd, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_compose_with_explicit_fragment_list() {
        let temp = TempDir::new().unwrap();
        let fragments = temp.path().join("snippets");
        fs::create_dir_all(&fragments).await.unwrap();
        fs::write(fragments.join("z.yaml"), "runcmd:\n  - z\n").await.unwrap();
        fs::write(fragments.join("m.yaml"), "runcmd:\n  - m\n").await.unwrap();
        fs::write(fragments.join("10-alpha-ignored.yaml"), "runcmd:\n  - no\n")
            .await
            .unwrap();

        let composer = SnippetComposer::new(&fragments, temp.path().join("users.yaml"));
        let def = definition(temp.path(), &[("SNIPPET_FRAGMENTS", "z.yaml, m.yaml")]);

        let snippet = composer.compose(&def, None).await.unwrap();
        assert_eq!(snippet.commands, vec!["z", "m"]);
    }

    #[tokio::test]
    async fn test_missing_base_fragment_fails() {
        let temp = TempDir::new().unwrap();
        let composer = SnippetComposer::new(temp.path(), temp.path().join("users.yaml"));
        let def = definition(temp.path(), &[("BASE_SNIPPET_FILE", "missing.yaml")]);

        let err = composer.compose(&def, None).await.unwrap_err();
        assert!(matches!(err, BuildError::ResourceLookup { .. }));
    }

    #[tokio::test]
    async fn test_reference_comment_requires_flag_and_url() {
        let temp = TempDir::new().unwrap();
        let users = temp.path().join("users.yaml");
        fs::write(&users, "users:\n  - default\n").await.unwrap();
        let composer = SnippetComposer::new(temp.path(), &users);

        let plain = definition(temp.path(), &[]);
        let snippet = composer.compose(&plain, Some("https://r.example")).await.unwrap();
        assert_eq!(snippet.reference_url, None);
        assert_eq!(snippet.users.as_deref(), Some("users:\n  - default\n"));

        let flagged = definition(temp.path(), &[("REFERENCE_URL_COMMENT", "true")]);
        let snippet = composer.compose(&flagged, Some("https://r.example")).await.unwrap();
        assert_eq!(snippet.reference_url.as_deref(), Some("https://r.example"));

        let snippet = composer.compose(&flagged, None).await.unwrap();
        assert_eq!(snippet.reference_url, None);
    }

    #[tokio::test]
    async fn test_write_snippet_creates_parents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a/b/alpha.yaml");

        write_snippet(&path, "#cloud-config\n").await.unwrap();
        assert_eq!(fs::read_to_string(&path).await.unwrap(), "#cloud-config\n");
    }
}
