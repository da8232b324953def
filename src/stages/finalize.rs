//! Finalize stage - wire up cloud-init and convert to a template
//!
//! Responsibilities:
//! - Attach the snippet as custom user-data
//! - Apply tags, if any are declared
//! - Configure DHCP on the cloud-init interface
//! - Convert the VM into a template

use super::BuildContext;
use crate::BuildError;
use crate::runner::CommandRunner;
use tracing::{debug, info};

/// Run the finalize stage
pub async fn run(ctx: &BuildContext<'_>, runner: &mut CommandRunner) -> Result<(), BuildError> {
    let definition = ctx.definition;
    let vmid = ctx.vmid();
    let qm = &ctx.control;

    info!("Finalize stage: converting VM {} into a template", vmid);

    runner
        .run(&qm.custom_userdata(vmid, ctx.snippet_storage(), &definition.snippet_file))
        .await?;

    if definition.tags.is_empty() {
        debug!("No tags declared");
    } else {
        runner.run(&qm.tags(vmid, &definition.tags)).await?;
    }

    runner.run(&qm.dhcp(vmid)).await?;
    runner.run(&qm.template(vmid)).await
}
