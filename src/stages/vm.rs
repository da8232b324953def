//! VM stage - reserve the VM id, create the VM and attach its disks

use super::BuildContext;
use crate::BuildError;
use crate::runner::CommandRunner;
use std::path::Path;
use tracing::info;

/// Destroy whatever currently occupies the VM id
pub async fn destroy_existing(
    ctx: &BuildContext<'_>,
    runner: &mut CommandRunner,
) -> Result<(), BuildError> {
    info!("VM stage: clearing VM id {}", ctx.vmid());
    runner
        .destroy_if_exists(&ctx.control.status(ctx.vmid()), &ctx.control.destroy(ctx.vmid()))
        .await
}

/// Create the VM with the baseline options plus compiled `options`
pub async fn create(
    ctx: &BuildContext<'_>,
    runner: &mut CommandRunner,
    options: &[String],
) -> Result<(), BuildError> {
    let definition = ctx.definition;
    info!(
        "VM stage: creating VM {} '{}'",
        definition.vmid, definition.template_name
    );
    runner
        .run(&ctx.control.create(
            definition.vmid,
            &definition.template_name,
            &definition.storage,
            options,
        ))
        .await
}

/// Import the image as boot disk and add the cloud-init drive
pub async fn attach_disks(
    ctx: &BuildContext<'_>,
    runner: &mut CommandRunner,
    image: &Path,
) -> Result<(), BuildError> {
    let vmid = ctx.vmid();
    let storage = ctx.definition.storage.as_str();
    let qm = &ctx.control;

    runner
        .run(&qm.import_disk(vmid, &image.to_string_lossy(), storage))
        .await?;
    runner.run(&qm.attach_boot_disk(vmid, storage)).await?;
    runner.run(&qm.boot_order(vmid)).await?;
    runner.run(&qm.attach_cloudinit(vmid, storage)).await
}
