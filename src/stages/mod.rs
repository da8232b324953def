//! Template build pipeline
//!
//! One build runs these stages in order and stops at the first error:
//!
//! 1. resolve and validate the definition
//! 2. resolve the image source
//! 3. destroy any VM occupying the id ([`vm::destroy_existing`])
//! 4. fetch and resize the cloud image ([`image`])
//! 5. compile CPU and network options
//! 6. create the VM ([`vm::create`])
//! 7. import and attach disks ([`vm::attach_disks`])
//! 8. compose and write the snippet ([`snippet`])
//! 9. attach user-data, tag, configure DHCP and convert ([`finalize`])
//!
//! There are no retries. Stage 3 makes a full re-run the recovery path.

pub mod finalize;
pub mod image;
pub mod snippet;
pub mod vm;

use crate::BuildError;
use crate::config::{ConfigMapping, Registry, Resolver, TemplateDefinition};
use crate::control::{self, ControlPlane};
use crate::paths::BuildPaths;
use crate::runner::CommandRunner;
use std::path::PathBuf;
use tracing::info;

/// Constants key naming the storage that holds snippets
pub const SNIPPET_STORAGE_KEY: &str = "SNIPPET_STORAGE";

/// Default snippet storage
pub const SNIPPET_STORAGE: &str = "local";

/// Constants key for the reference comment URL
pub const REFERENCE_URL_KEY: &str = "REFERENCE_URL";

/// Everything a stage needs to know about the current build
#[derive(Debug)]
pub struct BuildContext<'a> {
    pub definition: &'a TemplateDefinition,
    pub constants: &'a ConfigMapping,
    pub paths: &'a BuildPaths,
    pub control: ControlPlane,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        definition: &'a TemplateDefinition,
        constants: &'a ConfigMapping,
        paths: &'a BuildPaths,
    ) -> Self {
        let control = constants
            .get(control::QM_BIN_KEY)
            .map(ControlPlane::new)
            .unwrap_or_default();
        Self {
            definition,
            constants,
            paths,
            control,
        }
    }

    pub fn vmid(&self) -> u32 {
        self.definition.vmid
    }

    pub fn snippet_storage(&self) -> &str {
        self.constants
            .get(SNIPPET_STORAGE_KEY)
            .unwrap_or(SNIPPET_STORAGE)
    }

    pub fn reference_url(&self) -> Option<&str> {
        self.constants.get(REFERENCE_URL_KEY)
    }
}

/// Outcome of a successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub identifier: String,
    pub vmid: u32,
    pub template_name: String,
    /// Where the snippet was written, if it was generated
    pub snippet: Option<PathBuf>,
}

/// Runs the build stages for one identifier
pub struct Pipeline<'a> {
    registry: &'a Registry,
    constants: &'a ConfigMapping,
    paths: &'a BuildPaths,
    runner: CommandRunner,
    use_environment: bool,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        registry: &'a Registry,
        constants: &'a ConfigMapping,
        paths: &'a BuildPaths,
        runner: CommandRunner,
    ) -> Self {
        Self {
            registry,
            constants,
            paths,
            runner,
            use_environment: true,
        }
    }

    /// Do not expand record values from the process environment
    pub fn without_environment(mut self) -> Self {
        self.use_environment = false;
        self
    }

    pub fn runner(&self) -> &CommandRunner {
        &self.runner
    }

    /// Resolve and validate a definition without running anything
    pub async fn definition(&self, identifier: &str) -> Result<TemplateDefinition, BuildError> {
        let mut resolver = Resolver::new(self.registry, self.constants);
        if !self.use_environment {
            resolver = resolver.without_environment();
        }

        let mapping = resolver.resolve(identifier).await?;
        let path = self.registry.lookup(identifier)?;
        TemplateDefinition::from_mapping(identifier, path, mapping)
    }

    /// Build the template for `identifier`
    pub async fn run(&mut self, identifier: &str) -> Result<BuildReport, BuildError> {
        info!(
            "Building template '{}' ({} mode)",
            identifier,
            self.runner.policy()
        );

        let definition = self.definition(identifier).await?;
        let url = definition.image_url(self.constants)?;
        let ctx = BuildContext::new(&definition, self.constants, self.paths);

        vm::destroy_existing(&ctx, &mut self.runner).await?;
        let image = image::run(&ctx, &mut self.runner, &url).await?;

        let mut options = control::cpu_args(&definition.mapping);
        options.extend(control::network_args(&definition.mapping));

        vm::create(&ctx, &mut self.runner, &options).await?;
        vm::attach_disks(&ctx, &mut self.runner, &image).await?;
        let snippet = snippet::run(&ctx, self.runner.policy()).await?;
        finalize::run(&ctx, &mut self.runner).await?;

        info!(
            "Template '{}' (VM {}) is ready",
            definition.template_name, definition.vmid
        );

        Ok(BuildReport {
            identifier: definition.identifier.clone(),
            vmid: definition.vmid,
            template_name: definition.template_name.clone(),
            snippet,
        })
    }
}
