//! Mock executor for testing
//!
//! Records every command it is asked to run and answers with scripted exit
//! statuses.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};

use super::{CommandLine, ExitOutput, Executor};
use crate::BuildError;

/// Scripted executor
///
/// Clones share the same call log, so a test can keep one handle while the
/// runner owns another.
///
/// # Example
/// ```
/// use vm_template_builder::runner::mock::MockExecutor;
///
/// let mock = MockExecutor::new()
///     .with_failure("qm status", 2)
///     .with_failure("qemu-img", 1);
/// assert!(mock.calls().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    calls: Arc<Mutex<Vec<String>>>,
    failures: Vec<(String, i32)>,
}

impl MockExecutor {
    /// Create a mock where every command succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail commands whose printed form starts with `prefix`
    pub fn with_failure(mut self, prefix: impl Into<String>, code: i32) -> Self {
        self.failures.push((prefix.into(), code));
        self
    }

    /// Printed form of every executed command, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, command: &CommandLine) -> Result<ExitOutput, BuildError> {
        let printed = command.to_string();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(printed.clone());
        }

        let failure = self
            .failures
            .iter()
            .find(|(prefix, _)| printed.starts_with(prefix.as_str()));

        Ok(match failure {
            Some((_, code)) => ExitOutput::failure(*code, format!("mock failure: {printed}")),
            None => ExitOutput::success(),
        })
    }
}
