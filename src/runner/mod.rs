//! Command runner
//!
//! Every external action of a build goes through [`CommandRunner`], which
//! applies the run's [`ExecutionPolicy`]:
//!
//! | Policy      | Executes | Logs | Transcript | Writes snippet |
//! |-------------|----------|------|------------|----------------|
//! | Live        | yes      | yes  | no         | live directory |
//! | DryRun      | no       | yes  | no         | no             |
//! | TestOutput  | no       | yes  | yes        | test directory |

pub mod command;
pub mod executor;
pub mod mock;

pub use command::{CommandKind, CommandLine, quote};
pub use executor::{ExitOutput, Executor, ProcessExecutor};

use crate::BuildError;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

/// How external commands are handled for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionPolicy {
    /// Execute every command
    #[default]
    Live,
    /// Log commands without executing them
    DryRun,
    /// Log and record commands without executing them; write artifacts to an
    /// isolated directory
    TestOutput,
}

impl ExecutionPolicy {
    /// Select the policy from CLI flags; `test_output` implies dry-run
    pub fn from_flags(dry_run: bool, test_output: bool) -> Self {
        match (dry_run, test_output) {
            (_, true) => Self::TestOutput,
            (true, false) => Self::DryRun,
            (false, false) => Self::Live,
        }
    }

    /// Whether external commands really run
    pub fn executes(self) -> bool {
        self == Self::Live
    }

    /// Whether control-plane commands are recorded in the transcript
    pub fn records(self) -> bool {
        self == Self::TestOutput
    }

    /// Whether the snippet file is generated
    pub fn writes_snippet(self) -> bool {
        self != Self::DryRun
    }
}

impl std::fmt::Display for ExecutionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionPolicy::Live => write!(f, "live"),
            ExecutionPolicy::DryRun => write!(f, "dry-run"),
            ExecutionPolicy::TestOutput => write!(f, "test-output"),
        }
    }
}

/// Executes or records external commands under one policy
pub struct CommandRunner {
    policy: ExecutionPolicy,
    executor: Box<dyn Executor>,
    transcript: Vec<String>,
}

impl CommandRunner {
    /// Create a runner that spawns real processes when live
    pub fn new(policy: ExecutionPolicy) -> Self {
        Self::with_executor(policy, Box::new(ProcessExecutor))
    }

    /// Create a runner with a custom executor
    pub fn with_executor(policy: ExecutionPolicy, executor: Box<dyn Executor>) -> Self {
        Self {
            policy,
            executor,
            transcript: Vec::new(),
        }
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    /// Control-plane commands recorded so far
    pub fn transcript(&self) -> &[String] {
        &self.transcript
    }

    /// Run a command, failing on a non-zero exit
    pub async fn run(&mut self, command: &CommandLine) -> Result<(), BuildError> {
        let printed = self.announce(command);
        if !self.policy.executes() {
            return Ok(());
        }

        let output = self.executor.execute(command).await?;
        if !output.is_success() {
            return Err(BuildError::command(printed, output.status(), output.stderr));
        }
        Ok(())
    }

    /// Run an existence probe; a non-zero exit means "absent"
    ///
    /// Under the non-executing policies the probe is only announced and the
    /// result is `false`.
    pub async fn probe(&mut self, command: &CommandLine) -> Result<bool, BuildError> {
        self.announce(command);
        if !self.policy.executes() {
            return Ok(false);
        }

        let output = self.executor.execute(command).await?;
        debug!("Probe {} returned {}", command, output.status());
        Ok(output.is_success())
    }

    /// Destroy a resource if the probe reports it exists
    ///
    /// When nothing executes the real state is unknown, so the destroy is
    /// announced unconditionally after the probe.
    pub async fn destroy_if_exists(
        &mut self,
        probe: &CommandLine,
        destroy: &CommandLine,
    ) -> Result<(), BuildError> {
        let exists = self.probe(probe).await?;
        if self.policy.executes() && !exists {
            info!("Nothing to destroy");
            return Ok(());
        }
        self.run(destroy).await
    }

    /// Write the transcript as one command per line
    pub async fn flush_transcript(&self, path: &Path) -> Result<(), BuildError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut content = self.transcript.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(path, content).await?;
        info!(
            "Wrote {} recorded commands to {}",
            self.transcript.len(),
            path.display()
        );
        Ok(())
    }

    /// Log a command and record it if required; returns the printed form
    fn announce(&mut self, command: &CommandLine) -> String {
        let printed = command.to_string();
        if self.policy.executes() {
            info!("$ {}", printed);
        } else {
            info!("[{}] {}", self.policy, printed);
        }

        if self.policy.records() && command.is_control_plane() {
            self.transcript.push(printed.clone());
        }
        printed
    }
}
