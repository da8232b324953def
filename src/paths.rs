//! Filesystem locations used by a build
//!
//! Defaults follow a Proxmox VE host layout. Every location can be
//! overridden from the command line or the environment.

use std::path::{Component, Path, PathBuf};

/// Default config directory (relative to the working directory)
pub const CONFIG_DIR: &str = "conf";

/// Shared constants file name inside the config directory
pub const CONSTANTS_FILE: &str = "constants.conf";

/// User-accounts block file name inside the config directory
pub const USERS_FILE: &str = "users.yaml";

/// Fragment directory name inside the config directory
pub const FRAGMENT_DIR: &str = "snippets";

/// Default image cache directory
pub const IMAGE_DIR: &str = "/var/lib/vz/template/cache";

/// Default live snippet directory
pub const SNIPPET_DIR: &str = "/var/lib/vz/snippets";

/// Default isolated output directory for --test-output
pub const TEST_OUTPUT_DIR: &str = "test-output";

/// Resolved build locations
#[derive(Debug, Clone)]
pub struct BuildPaths {
    /// Directory scanned for definition records
    pub config_dir: PathBuf,
    /// Shared constants record
    pub constants_file: PathBuf,
    /// Static user-accounts block
    pub users_file: PathBuf,
    /// Where cloud images are downloaded and resized
    pub image_dir: PathBuf,
    /// Live snippet output directory
    pub snippet_dir: PathBuf,
    /// Isolated output directory for --test-output
    pub test_output_dir: PathBuf,
}

impl Default for BuildPaths {
    fn default() -> Self {
        Self::new(CONFIG_DIR)
    }
}

impl BuildPaths {
    /// Create with default locations derived from a config directory
    pub fn new(config_dir: impl AsRef<Path>) -> Self {
        let config_dir = config_dir.as_ref().to_path_buf();
        Self {
            constants_file: config_dir.join(CONSTANTS_FILE),
            users_file: config_dir.join(USERS_FILE),
            config_dir,
            image_dir: PathBuf::from(IMAGE_DIR),
            snippet_dir: PathBuf::from(SNIPPET_DIR),
            test_output_dir: PathBuf::from(TEST_OUTPUT_DIR),
        }
    }

    pub fn with_constants_file(mut self, path: impl AsRef<Path>) -> Self {
        self.constants_file = path.as_ref().to_path_buf();
        self
    }

    pub fn with_users_file(mut self, path: impl AsRef<Path>) -> Self {
        self.users_file = path.as_ref().to_path_buf();
        self
    }

    pub fn with_image_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.image_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn with_snippet_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.snippet_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn with_test_output_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.test_output_dir = path.as_ref().to_path_buf();
        self
    }

    /// conf/snippets - Fragment directory
    pub fn fragment_dir(&self) -> PathBuf {
        self.config_dir.join(FRAGMENT_DIR)
    }

    /// <image_dir>/<file> - Local cloud image
    pub fn image_path(&self, image_file: &str) -> PathBuf {
        self.image_dir.join(image_file)
    }

    /// <snippet_dir>/<file> - Live snippet
    pub fn live_snippet_path(&self, snippet_file: &str) -> PathBuf {
        self.snippet_dir.join(snippet_file)
    }

    /// <test_output_dir>/snippets/<file> - Snippet written under --test-output
    pub fn test_snippet_path(&self, snippet_file: &str) -> PathBuf {
        self.test_output_dir.join(FRAGMENT_DIR).join(snippet_file)
    }

    /// <test_output_dir>/<identifier>.commands - Command transcript
    pub fn transcript_path(&self, identifier: &str) -> PathBuf {
        self.test_output_dir.join(format!("{identifier}.commands"))
    }
}

/// Check that a value names a single file inside its base directory
///
/// Absolute paths, separators and `.`/`..` are rejected, so joining the value
/// onto a directory never escapes it.
pub fn is_file_name(value: &str) -> bool {
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(name)), None) if name == value
    )
}
