//! Snippet stage - compose and write the cloud-init user-data
//!
//! Skipped under dry-run so a live snippet directory is never touched.
//! Under test-output the snippet goes to the isolated output directory.

use super::BuildContext;
use crate::BuildError;
use crate::runner::ExecutionPolicy;
use crate::snippet::{SnippetComposer, write_snippet};
use std::path::PathBuf;
use tracing::info;

/// Run the snippet stage, returning the written path
pub async fn run(
    ctx: &BuildContext<'_>,
    policy: ExecutionPolicy,
) -> Result<Option<PathBuf>, BuildError> {
    let definition = ctx.definition;
    let path = match policy {
        ExecutionPolicy::Live => ctx.paths.live_snippet_path(&definition.snippet_file),
        ExecutionPolicy::TestOutput => ctx.paths.test_snippet_path(&definition.snippet_file),
        ExecutionPolicy::DryRun => {
            info!(
                "[{}] skipping snippet generation for {}",
                policy,
                ctx.paths.live_snippet_path(&definition.snippet_file).display()
            );
            return Ok(None);
        }
    };

    let composer = SnippetComposer::new(ctx.paths.fragment_dir(), &ctx.paths.users_file);
    let snippet = composer.compose(definition, ctx.reference_url()).await?;
    write_snippet(&path, &snippet.render()).await?;
    Ok(Some(path))
}
