//! Image stage - fetch and resize the cloud image
//!
//! Responsibilities:
//! - Ensure the image cache directory exists
//! - Remove any stale local copy
//! - Download the image to its deterministic path
//! - Resize it to the declared size

use super::BuildContext;
use crate::BuildError;
use crate::runner::{CommandLine, CommandRunner};
use std::path::PathBuf;
use tracing::info;

/// Run the image stage, returning the local image path
pub async fn run(
    ctx: &BuildContext<'_>,
    runner: &mut CommandRunner,
    url: &str,
) -> Result<PathBuf, BuildError> {
    let definition = ctx.definition;
    let image = ctx.paths.image_path(&definition.image_file);
    let image_arg = image.to_string_lossy().into_owned();

    info!("Image stage: fetching {} from {}", image.display(), url);

    runner
        .run(&CommandLine::host("mkdir").args([
            "-p".to_string(),
            ctx.paths.image_dir.to_string_lossy().into_owned(),
        ]))
        .await?;
    runner
        .run(&CommandLine::host("rm").args(["-f", image_arg.as_str()]))
        .await?;
    runner
        .run(&CommandLine::host("wget").args(["-q", "-O", image_arg.as_str(), url]))
        .await?;
    runner
        .run(&CommandLine::host("qemu-img").args([
            "resize",
            image_arg.as_str(),
            definition.image_resize.as_str(),
        ]))
        .await?;

    Ok(image)
}
