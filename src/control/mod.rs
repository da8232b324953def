//! Proxmox VE control-plane commands
//!
//! Builds the `qm` invocations used by the template pipeline. Nothing here
//! executes anything; commands are handed to the
//! [`CommandRunner`](crate::runner::CommandRunner).

pub mod args;

pub use args::{cpu_args, network_args};

use crate::runner::CommandLine;

/// Default control-plane binary
pub const QM_BIN: &str = "qm";

/// Constants key overriding the control-plane binary
pub const QM_BIN_KEY: &str = "QM_BIN";

/// Memory for template VMs, in MiB
pub const MEMORY_MB: u32 = 2048;

/// Disk slot used for the imported boot disk
pub const BOOT_DISK: &str = "scsi0";

/// Disk slot used for the cloud-init drive
pub const CLOUDINIT_DISK: &str = "ide2";

/// Builder for `qm` command lines
#[derive(Debug, Clone)]
pub struct ControlPlane {
    program: String,
}

impl Default for ControlPlane {
    fn default() -> Self {
        Self::new(QM_BIN)
    }
}

impl ControlPlane {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn qm(&self, subcommand: &str, vmid: u32) -> CommandLine {
        CommandLine::control_plane(&self.program)
            .arg(subcommand)
            .arg(vmid.to_string())
    }

    fn set(&self, vmid: u32, option: &str, value: impl Into<String>) -> CommandLine {
        self.qm("set", vmid).arg(option).arg(value)
    }

    /// `qm status` - exits 0 if the VM exists
    pub fn status(&self, vmid: u32) -> CommandLine {
        self.qm("status", vmid)
    }

    /// `qm destroy --purge`
    pub fn destroy(&self, vmid: u32) -> CommandLine {
        self.qm("destroy", vmid).arg("--purge")
    }

    /// `qm create` with the fixed baseline options followed by `extra`
    pub fn create(&self, vmid: u32, name: &str, storage: &str, extra: &[String]) -> CommandLine {
        self.qm("create", vmid)
            .args(["--name", name])
            .args(["--ostype", "l26"])
            .args(["--memory".to_string(), MEMORY_MB.to_string()])
            .args(["--balloon", "0"])
            .args(["--agent", "enabled=1"])
            .args(["--bios", "ovmf"])
            .args(["--machine", "q35"])
            .args([
                "--efidisk0".to_string(),
                format!("{storage}:0,efitype=4m,pre-enrolled-keys=0"),
            ])
            .args(["--scsihw", "virtio-scsi-single"])
            .args(["--serial0", "socket"])
            .args(["--vga", "serial0"])
            .args(extra.iter().cloned())
    }

    /// `qm importdisk` - import an image file into storage
    pub fn import_disk(&self, vmid: u32, image: &str, storage: &str) -> CommandLine {
        self.qm("importdisk", vmid).arg(image).arg(storage)
    }

    /// Attach the imported disk as the boot device
    ///
    /// The EFI disk created with the VM is disk-0, so the import is disk-1.
    pub fn attach_boot_disk(&self, vmid: u32, storage: &str) -> CommandLine {
        self.set(
            vmid,
            &format!("--{BOOT_DISK}"),
            format!("{storage}:vm-{vmid}-disk-1,discard=on"),
        )
    }

    pub fn boot_order(&self, vmid: u32) -> CommandLine {
        self.set(vmid, "--boot", format!("order={BOOT_DISK}"))
    }

    pub fn attach_cloudinit(&self, vmid: u32, storage: &str) -> CommandLine {
        self.set(vmid, &format!("--{CLOUDINIT_DISK}"), format!("{storage}:cloudinit"))
    }

    /// Use a snippet as cloud-init user-data
    pub fn custom_userdata(&self, vmid: u32, snippet_storage: &str, snippet: &str) -> CommandLine {
        self.set(
            vmid,
            "--cicustom",
            format!("user={snippet_storage}:snippets/{snippet}"),
        )
    }

    pub fn tags(&self, vmid: u32, tags: &[String]) -> CommandLine {
        self.set(vmid, "--tags", tags.join(";"))
    }

    pub fn dhcp(&self, vmid: u32) -> CommandLine {
        self.set(vmid, "--ipconfig0", "ip=dhcp")
    }

    /// `qm template` - convert the VM into a template
    pub fn template(&self, vmid: u32) -> CommandLine {
        self.qm("template", vmid)
    }
}
