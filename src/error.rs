//! Error types for vm-template-builder

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for template build operations
///
/// Every variant is fatal for the current run. There is no retry layer: the
/// documented recovery path is re-running the build for the same identifier.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Config discovery failed: {0}")]
    ConfigDiscovery(String),

    #[error("Unknown template '{0}' (use --list to see available templates)")]
    ConfigLookup(String),

    #[error("Invalid config for '{identifier}' ({}): {message}", .path.display())]
    ConfigValidation {
        identifier: String,
        path: PathBuf,
        message: String,
    },

    #[error("Resource lookup failed for '{identifier}': {message}")]
    ResourceLookup { identifier: String, message: String },

    #[error("Command failed with {status}: {command}{}", stderr_suffix(.stderr))]
    ExternalCommand {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl BuildError {
    /// Create a validation error for a definition record
    pub fn validation(
        identifier: impl Into<String>,
        path: impl AsRef<Path>,
        message: impl Into<String>,
    ) -> Self {
        Self::ConfigValidation {
            identifier: identifier.into(),
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Create a resource lookup error
    pub fn resource(identifier: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResourceLookup {
            identifier: identifier.into(),
            message: message.into(),
        }
    }

    /// Create an external command error
    pub fn command(
        command: impl Into<String>,
        status: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::ExternalCommand {
            command: command.into(),
            status: status.into(),
            stderr: stderr.into(),
        }
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let stderr = stderr.trim();
    if stderr.is_empty() {
        String::new()
    } else {
        format!("\n{stderr}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_identifier_and_file() {
        let err = BuildError::validation("alpha", "/conf/10-alpha.conf", "STORAGE is empty");
        let msg = err.to_string();
        assert!(msg.contains("alpha"));
        assert!(msg.contains("/conf/10-alpha.conf"));
        assert!(msg.contains("STORAGE is empty"));
    }

    #[test]
    fn test_command_error_includes_stderr() {
        let err = BuildError::command("qm template 100", "exit status 2", "  boom\n");
        assert_eq!(
            err.to_string(),
            "Command failed with exit status 2: qm template 100\nboom"
        );

        let err = BuildError::command("qm template 100", "exit status 2", "");
        assert_eq!(
            err.to_string(),
            "Command failed with exit status 2: qm template 100"
        );
    }
}
