//! vm-template-builder - Build Proxmox VE VM templates from cloud images
//!
//! Selects one template definition by identifier and runs the build
//! pipeline live, as a dry run, or in test-output mode.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use vm_template_builder::{
    BuildPaths, CommandRunner, ExecutionPolicy, build_template, list_templates, paths,
    show_config,
};

#[derive(Parser)]
#[command(name = "vm-template-builder")]
#[command(author, version, about = "Build Proxmox VE VM templates from cloud images", long_about = None)]
struct Cli {
    /// Identifier of the template to build
    #[arg(short, long, required_unless_present = "list")]
    distro: Option<String>,

    /// List available template identifiers and exit
    #[arg(short, long, conflicts_with_all = ["dry_run", "test_output", "show_config"])]
    list: bool,

    /// Log commands without executing them
    #[arg(long)]
    dry_run: bool,

    /// Record control-plane commands and write artifacts to the test-output
    /// directory instead of executing anything
    #[arg(long)]
    test_output: bool,

    /// Print the resolved configuration as YAML and exit
    #[arg(long, conflicts_with_all = ["dry_run", "test_output"])]
    show_config: bool,

    /// Directory scanned for template definitions
    #[arg(long, env = "TEMPLATE_CONFIG_DIR", default_value = paths::CONFIG_DIR)]
    config_dir: PathBuf,

    /// Shared constants record [default: <config-dir>/constants.conf]
    #[arg(long, env = "CONSTANTS_FILE")]
    constants_file: Option<PathBuf>,

    /// Static user-accounts block [default: <config-dir>/users.yaml]
    #[arg(long, env = "USERS_FILE")]
    users_file: Option<PathBuf>,

    /// Where cloud images are downloaded
    #[arg(long, env = "IMAGE_DIR", default_value = paths::IMAGE_DIR)]
    image_dir: PathBuf,

    /// Where live snippets are written
    #[arg(long, env = "SNIPPET_DIR", default_value = paths::SNIPPET_DIR)]
    snippet_dir: PathBuf,

    /// Output directory used by --test-output
    #[arg(long, default_value = paths::TEST_OUTPUT_DIR)]
    test_output_dir: PathBuf,

    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only report warnings and errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn build_paths(&self) -> BuildPaths {
        let mut paths = BuildPaths::new(&self.config_dir)
            .with_image_dir(&self.image_dir)
            .with_snippet_dir(&self.snippet_dir)
            .with_test_output_dir(&self.test_output_dir);
        if let Some(file) = &self.constants_file {
            paths = paths.with_constants_file(file);
        }
        if let Some(file) = &self.users_file {
            paths = paths.with_users_file(file);
        }
        paths
    }
}

fn init_logging(verbosity: u8, quiet: bool) -> anyhow::Result<()> {
    let level = match (quiet, verbosity) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet)?;
    let paths = cli.build_paths();

    if cli.list {
        for (identifier, path) in list_templates(&paths).await? {
            if cli.verbose > 0 {
                println!("{}\t{}", identifier, path.display());
            } else {
                println!("{identifier}");
            }
        }
        return Ok(());
    }

    let Some(identifier) = cli.distro.as_deref() else {
        anyhow::bail!("--distro is required");
    };

    if cli.show_config {
        let mapping = show_config(identifier, &paths).await?;
        print!("{}", serde_yaml::to_string(&mapping)?);
        return Ok(());
    }

    let policy = ExecutionPolicy::from_flags(cli.dry_run, cli.test_output);
    let report = build_template(identifier, &paths, CommandRunner::new(policy))
        .await
        .with_context(|| format!("Failed to build template '{identifier}'"))?;

    match policy {
        ExecutionPolicy::TestOutput => println!(
            "Recorded build of '{}' in {}",
            report.template_name,
            paths.transcript_path(identifier).display()
        ),
        ExecutionPolicy::DryRun => {
            println!("Dry run of '{}' (VM {}) complete", report.template_name, report.vmid)
        }
        ExecutionPolicy::Live => {
            println!("Template '{}' (VM {}) is ready", report.template_name, report.vmid)
        }
    }

    Ok(())
}
