//! Step descriptors handed to the pipeline framework

use super::compile::CompileStage;
use super::forward::{AgentForwarder, RuntimeSocketMounter, SocketMounter, SshForwarder};
use super::package::{base_image, PackageStage};
use super::recipe::RecipeStore;
use super::tag::compiler_image;
use super::version::{matches, resolve_version};
use crate::config::StepConfig;
use crate::engine::ContainerEngine;
use crate::error::Result;
use crate::request::BuildRequest;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

pub const COMPILE_STEP: &str = "maven";
pub const PACKAGE_STEP: &str = "maven-prod";

/// A registrable pipeline step
#[async_trait]
pub trait BuildStep: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this step applies to `request`. Pure, no side effects.
    fn matches(&self, request: &BuildRequest) -> bool;

    /// Images the step uses or produces
    fn images(&self, request: &BuildRequest) -> Result<Vec<String>>;

    /// Runs the step and returns the resulting container id, empty when the
    /// step had nothing to produce
    async fn run(&self, request: &BuildRequest) -> Result<String>;

    /// Async steps may be scheduled concurrently with their neighbours
    fn is_async(&self) -> bool {
        false
    }
}

/// Collaborators shared by both steps
pub struct StepContext {
    pub engine: Arc<dyn ContainerEngine>,
    pub config: StepConfig,
    pub recipes: RecipeStore,
    pub ssh: Arc<dyn SshForwarder>,
    pub socket: Arc<dyn SocketMounter>,
}

impl StepContext {
    /// Context with the embedded recipes and the default ssh and socket
    /// helpers configured from `config`
    pub fn new(engine: Arc<dyn ContainerEngine>, config: StepConfig) -> Self {
        Self {
            ssh: Arc::new(AgentForwarder::new(config.ssh_auth_sock.clone())),
            socket: Arc::new(RuntimeSocketMounter::new(config.runtime_socket.clone())),
            recipes: RecipeStore::embedded(),
            engine,
            config,
        }
    }

    pub fn with_recipes(mut self, recipes: RecipeStore) -> Self {
        self.recipes = recipes;
        self
    }

    pub fn with_ssh(mut self, ssh: Arc<dyn SshForwarder>) -> Self {
        self.ssh = ssh;
        self
    }

    pub fn with_socket(mut self, socket: Arc<dyn SocketMounter>) -> Self {
        self.socket = socket;
        self
    }
}

pub struct CompileStep {
    context: Arc<StepContext>,
}

impl CompileStep {
    pub fn new(context: Arc<StepContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl BuildStep for CompileStep {
    fn name(&self) -> &str {
        COMPILE_STEP
    }

    fn matches(&self, request: &BuildRequest) -> bool {
        matches(request)
    }

    fn images(&self, request: &BuildRequest) -> Result<Vec<String>> {
        compile_images(&self.context.recipes, &self.context.config, request)
    }

    async fn run(&self, request: &BuildRequest) -> Result<String> {
        let ctx = &self.context;
        let mut stage = CompileStage::new(
            ctx.engine.as_ref(),
            &ctx.config,
            &ctx.recipes,
            ctx.ssh.as_ref(),
            ctx.socket.as_ref(),
        );
        stage.run(request).await
    }
}

pub struct PackageStep {
    context: Arc<StepContext>,
}

impl PackageStep {
    pub fn new(context: Arc<StepContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl BuildStep for PackageStep {
    fn name(&self) -> &str {
        PACKAGE_STEP
    }

    fn matches(&self, request: &BuildRequest) -> bool {
        matches(request)
    }

    fn images(&self, request: &BuildRequest) -> Result<Vec<String>> {
        Ok(package_images(request))
    }

    async fn run(&self, request: &BuildRequest) -> Result<String> {
        let mut stage = PackageStage::new(self.context.engine.as_ref(), &self.context.config);
        stage.run(request).await
    }
}

/// Compiler image reference followed by the runtime base image
fn compile_images(
    recipes: &RecipeStore,
    config: &StepConfig,
    request: &BuildRequest,
) -> Result<Vec<String>> {
    let tag = compiler_image(recipes, request, &config.image_registry)?;
    Ok(vec![tag.reference(), base_image(request).to_string()])
}

/// Lists the runtime base image only; the compiler image is an internal
/// dependency of the compile step. Independent of the push policy.
fn package_images(request: &BuildRequest) -> Vec<String> {
    vec![base_image(request).to_string()]
}

/// Images both steps would use for `request`, without a container engine.
///
/// Same validation and order as running [`StepPipeline::images`] over
/// [`maven_steps`]; empty when the request is not a maven build.
pub fn maven_images(
    recipes: &RecipeStore,
    config: &StepConfig,
    request: &BuildRequest,
) -> Result<Vec<String>> {
    recipes.validate()?;
    resolve_version(request)?;
    if !matches(request) {
        return Ok(Vec::new());
    }
    let mut images = compile_images(recipes, config, request)?;
    images.extend(package_images(request));
    Ok(images)
}

/// Compile and package steps for `request`, in execution order.
///
/// Fails with a configuration error when the requested version is not
/// supported or a recipe is missing from the store.
pub fn maven_steps(
    context: Arc<StepContext>,
    request: &BuildRequest,
) -> Result<Vec<Box<dyn BuildStep>>> {
    context.recipes.validate()?;
    let version = resolve_version(request)?;
    info!(from = %version, "Using maven build");
    Ok(vec![
        Box::new(CompileStep::new(context.clone())),
        Box::new(PackageStep::new(context)),
    ])
}

/// Outcome of one executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub name: String,
    pub id: String,
    pub skipped: bool,
}

/// Runs steps one after another, stopping at the first failure
pub struct StepPipeline {
    steps: Vec<Box<dyn BuildStep>>,
}

impl StepPipeline {
    pub fn new(steps: Vec<Box<dyn BuildStep>>) -> Self {
        Self { steps }
    }

    /// Images of every applicable step, in step order
    pub fn images(&self, request: &BuildRequest) -> Result<Vec<String>> {
        let mut images = Vec::new();
        for step in self.steps.iter().filter(|s| s.matches(request)) {
            images.extend(step.images(request)?);
        }
        Ok(images)
    }

    pub async fn execute(&self, request: &BuildRequest) -> Result<Vec<StepReport>> {
        let start = Instant::now();
        let mut reports = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            if !step.matches(request) {
                debug!(step = step.name(), "Step does not apply, skipping");
                reports.push(StepReport {
                    name: step.name().to_string(),
                    id: String::new(),
                    skipped: true,
                });
                continue;
            }

            info!(step = step.name(), "Running step");
            let step_start = Instant::now();
            let id = step.run(request).await?;
            debug!(
                step = step.name(),
                elapsed_ms = step_start.elapsed().as_millis() as u64,
                "Step complete"
            );
            reports.push(StepReport {
                name: step.name().to_string(),
                id,
                skipped: false,
            });
        }

        info!(
            steps = reports.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pipeline complete"
        );
        Ok(reports)
    }
}
