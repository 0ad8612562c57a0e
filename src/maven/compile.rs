//! Compile stage: pull the base image, build or reuse the compiler image and
//! run the Maven build in a fresh container.

use super::forward::{SocketMounter, SshForwarder};
use super::launch::LaunchAssembler;
use super::package::base_image;
use super::recipe::RecipeStore;
use super::script::SCRIPT_PATH;
use super::tag::{compiler_image, ImageTag};
use super::version::resolve_version;
use crate::config::StepConfig;
use crate::engine::{ContainerEngine, EngineError};
use crate::error::{Result, Stage, StepError};
use crate::request::BuildRequest;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileState {
    Idle,
    Pulled,
    ImageBuilt,
    Running,
    Done,
    Failed,
}

pub struct CompileStage<'a> {
    engine: &'a dyn ContainerEngine,
    config: &'a StepConfig,
    recipes: &'a RecipeStore,
    ssh: &'a dyn SshForwarder,
    socket: &'a dyn SocketMounter,
    state: CompileState,
}

impl<'a> CompileStage<'a> {
    pub fn new(
        engine: &'a dyn ContainerEngine,
        config: &'a StepConfig,
        recipes: &'a RecipeStore,
        ssh: &'a dyn SshForwarder,
        socket: &'a dyn SocketMounter,
    ) -> Self {
        Self {
            engine,
            config,
            recipes,
            ssh,
            socket,
            state: CompileState::Idle,
        }
    }

    pub fn state(&self) -> CompileState {
        self.state
    }

    /// Runs the stage to completion and returns the build container id
    pub async fn run(&mut self, request: &BuildRequest) -> Result<String> {
        match self.execute(request).await {
            Ok(id) => Ok(id),
            Err(e) => {
                error!(app = %request.app, state = ?self.state, "Compile stage failed: {}", e);
                self.state = CompileState::Failed;
                Err(e)
            }
        }
    }

    async fn execute(&mut self, request: &BuildRequest) -> Result<String> {
        let base = base_image(request);
        info!(image = %base, "Pulling base image");
        self.engine
            .pull(base)
            .await
            .map_err(StepError::engine(Stage::Compile, "pull base image"))?;
        self.transition(CompileState::Pulled);

        let tag = compiler_image(self.recipes, request, &self.config.image_registry)?;
        self.ensure_compiler_image(request, &tag).await?;
        self.transition(CompileState::ImageBuilt);

        let spec = LaunchAssembler::new(self.config, self.ssh, self.socket).assemble(request, &tag)?;
        debug!(image = %spec.image, env = ?spec.env, "Assembled compile container");

        let id = self
            .engine
            .create(&spec)
            .await
            .map_err(StepError::engine(Stage::Compile, "create build container"))?;
        let outcome = self.run_container(&id, spec.script.as_deref()).await;
        self.remove_container(&id).await;
        let code = outcome?;
        if code != 0 {
            return Err(StepError::engine(Stage::Compile, "run build container")(
                EngineError::ExitStatus {
                    id: id.clone(),
                    code,
                },
            ));
        }

        self.transition(CompileState::Done);
        info!(container_id = %id, "Maven build finished");
        Ok(id)
    }

    /// Copies the script in, starts the container and waits for its exit code
    async fn run_container(&mut self, id: &str, script: Option<&str>) -> Result<i64> {
        if let Some(script) = script {
            self.engine
                .copy_content_in(id, script.as_bytes(), SCRIPT_PATH, 0o755)
                .await
                .map_err(StepError::engine(Stage::Compile, "copy build script"))?;
        }
        self.engine
            .start(id)
            .await
            .map_err(StepError::engine(Stage::Compile, "start build container"))?;
        self.transition(CompileState::Running);

        self.engine
            .wait(id)
            .await
            .map_err(StepError::engine(Stage::Compile, "run build container"))
    }

    /// Best-effort removal; a leftover container never fails the build
    async fn remove_container(&self, id: &str) {
        if let Err(e) = self.engine.remove(id).await {
            warn!(container_id = %id, "Failed to remove build container: {}", e);
        }
    }

    /// Builds the compiler image unless the engine already has it
    async fn ensure_compiler_image(&self, request: &BuildRequest, tag: &ImageTag) -> Result<()> {
        let reference = tag.reference();
        let exists = self
            .engine
            .image_exists(&reference)
            .await
            .map_err(StepError::engine(Stage::Compile, "inspect compiler image"))?;
        if exists {
            debug!(image = %reference, "Reusing compiler image");
            return Ok(());
        }

        let version = resolve_version(request)?;
        let recipe = self.recipes.for_version(version)?;
        let platforms = request.platform.build_platforms();
        info!(image = %reference, platforms = ?platforms, "Building intermediate image");
        self.engine
            .build_multi_platform(&reference, recipe, &platforms)
            .await
            .map_err(StepError::engine(Stage::Compile, "build compiler image"))
    }

    fn transition(&mut self, next: CompileState) {
        debug!(from = ?self.state, to = ?next, "Compile stage transition");
        self.state = next;
    }
}
