//! vm-template-builder library
//!
//! Builds reusable Proxmox VE VM templates from per-distribution definition
//! records: it resolves each record into a key/value mapping, composes a
//! cloud-init snippet from layered fragments and drives `qm` through a fixed
//! pipeline under one of three execution policies.
//!
//! # Design Principles
//!
//! - **Safety First**: No unsafe code (`#![forbid(unsafe_code)]`)
//! - **Schema-free records**: keys are whatever a record declares
//! - **Replayable**: every external action is a printable command line
//! - **Idempotent**: a build always starts by clearing its VM id

#![forbid(unsafe_code)]

pub mod config;
pub mod control;
pub mod paths;
pub mod runner;
pub mod snippet;
pub mod stages;

mod error;

pub use error::BuildError;
pub use paths::BuildPaths;
pub use runner::{CommandRunner, ExecutionPolicy};
pub use stages::{BuildReport, Pipeline};

use config::{ConfigMapping, Registry, Resolver, load_constants};
use std::path::PathBuf;
use tracing::{info, warn};

/// Build the template for `identifier`
///
/// Under [`ExecutionPolicy::TestOutput`] the transcript is written to
/// [`BuildPaths::transcript_path`] whether or not the build succeeds.
pub async fn build_template(
    identifier: &str,
    paths: &BuildPaths,
    runner: CommandRunner,
) -> Result<BuildReport, BuildError> {
    let constants = load_constants(&paths.constants_file).await?;
    let registry = Registry::discover(&paths.config_dir, &paths.constants_file).await?;

    let mut pipeline = Pipeline::new(&registry, &constants, paths, runner);
    let result = pipeline.run(identifier).await;

    let runner = pipeline.runner();
    if runner.policy().records() {
        let transcript = paths.transcript_path(identifier);
        if let Err(e) = runner.flush_transcript(&transcript).await {
            if result.is_ok() {
                return Err(e);
            }
            warn!("Failed to write transcript {}: {}", transcript.display(), e);
        }
    }

    result
}

/// Discovered identifiers with their record paths, sorted by identifier
pub async fn list_templates(paths: &BuildPaths) -> Result<Vec<(String, PathBuf)>, BuildError> {
    let registry = Registry::discover(&paths.config_dir, &paths.constants_file).await?;
    info!(
        "Found {} template definitions in {}",
        registry.len(),
        paths.config_dir.display()
    );
    Ok(registry
        .iter()
        .map(|(id, path)| (id.to_string(), path.to_path_buf()))
        .collect())
}

/// Resolve the mapping for `identifier` without running anything
pub async fn show_config(
    identifier: &str,
    paths: &BuildPaths,
) -> Result<ConfigMapping, BuildError> {
    let constants = load_constants(&paths.constants_file).await?;
    let registry = Registry::discover(&paths.config_dir, &paths.constants_file).await?;
    Resolver::new(&registry, &constants).resolve(identifier).await
}
