//! Package stage: inject the built artifact into the runtime base image,
//! commit it as the application image and optionally push it.

use super::launch::ContainerLaunchSpec;
use crate::config::StepConfig;
use crate::engine::{image_uri, CommitRequest, ContainerEngine};
use crate::error::{Result, Stage, StepError};
use crate::request::BuildRequest;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Option key overriding the runtime base image
pub const IMAGE_OPTION: &str = "image";
pub const DEFAULT_BASE_IMAGE: &str = "tomcat:latest";
/// Option key toggling the push of the committed image
pub const PUSH_OPTION: &str = "push";

pub const DEPLOY_DIR: &str = "/usr/local/tomcat/webapps";
pub const COMMIT_COMMENT: &str = "Created from container";
pub const START_COMMAND: &str = r#"CMD ["catalina.sh", "run"]"#;

/// Runtime base image for `request`
pub fn base_image(request: &BuildRequest) -> &str {
    request
        .options
        .string_or(IMAGE_OPTION, DEFAULT_BASE_IMAGE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    Idle,
    Created,
    Started,
    ArtifactCopied,
    Committed,
    Stopped,
    Pushed,
    SkippedPush,
    Done,
    Failed,
}

pub struct PackageStage<'a> {
    engine: &'a dyn ContainerEngine,
    config: &'a StepConfig,
    state: PackageState,
    container: Option<String>,
}

impl<'a> PackageStage<'a> {
    pub fn new(engine: &'a dyn ContainerEngine, config: &'a StepConfig) -> Self {
        Self {
            engine,
            config,
            state: PackageState::Idle,
            container: None,
        }
    }

    pub fn state(&self) -> PackageState {
        self.state
    }

    /// Runs the stage. Returns the runtime container id once pushed, or an
    /// empty id when there is nothing to package or pushing is disabled.
    pub async fn run(&mut self, request: &BuildRequest) -> Result<String> {
        if request.image.is_empty() {
            info!("No image name skip prod image creation");
            self.state = PackageState::Done;
            return Ok(String::new());
        }

        match self.execute(request).await {
            Ok(id) => {
                self.transition(PackageState::Done);
                Ok(id)
            }
            Err(e) => {
                error!(image = %request.image, state = ?self.state, "Package stage failed: {}", e);
                self.cleanup().await;
                self.state = PackageState::Failed;
                Err(e)
            }
        }
    }

    async fn execute(&mut self, request: &BuildRequest) -> Result<String> {
        let mut spec = ContainerLaunchSpec::new(base_image(request));
        spec.cmd = vec!["sleep".to_string(), "300".to_string()];

        let id = self
            .engine
            .create(&spec)
            .await
            .map_err(StepError::engine(Stage::Package, "create runtime container"))?;
        self.container = Some(id.clone());
        self.transition(PackageState::Created);

        self.engine
            .start(&id)
            .await
            .map_err(StepError::engine(Stage::Package, "start runtime container"))?;
        self.transition(PackageState::Started);

        self.copy_artifact(&id, request).await?;
        self.transition(PackageState::ArtifactCopied);

        let reference = format!("{}:{}", request.image, request.image_tag);
        let commit = CommitRequest {
            reference: reference.clone(),
            comment: COMMIT_COMMENT.to_string(),
            changes: vec![START_COMMAND.to_string()],
        };
        let image_id = self
            .engine
            .commit(&id, &commit)
            .await
            .map_err(StepError::engine(Stage::Package, "commit runtime container"))?;
        info!(image = %reference, image_id = %image_id, "Committed image");
        self.transition(PackageState::Committed);

        self.engine
            .stop(&id)
            .await
            .map_err(StepError::engine(Stage::Package, "stop runtime container"))?;
        self.container = None;
        self.transition(PackageState::Stopped);
        self.remove_container(&id).await;

        if !request.options.bool(PUSH_OPTION, true) {
            info!(image = %request.image, tag = %request.image_tag, "Skipping image push");
            self.transition(PackageState::SkippedPush);
            return Ok(String::new());
        }

        let uri = image_uri(&self.config.registry, &request.image, &request.image_tag);
        info!(uri = %uri, "Pushing image");
        self.engine
            .push(&image_id, &uri)
            .await
            .map_err(StepError::engine(Stage::Package, "push image"))?;
        self.transition(PackageState::Pushed);

        Ok(id)
    }

    async fn copy_artifact(&self, id: &str, request: &BuildRequest) -> Result<()> {
        let artifact = artifact_path(request)?;
        let file_name = artifact
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                StepError::InvalidRequest(format!(
                    "Artifact path has no file name: {}",
                    artifact.display()
                ))
            })?;
        let target = format!("{}/{}", DEPLOY_DIR, file_name);

        self.engine
            .exec(id, &["mkdir".to_string(), "-p".to_string(), DEPLOY_DIR.to_string()])
            .await
            .map_err(StepError::engine(Stage::Package, "prepare deploy directory"))?;

        debug!(artifact = %artifact.display(), target = %target, "Copying artifact");
        let copied = if artifact.is_dir() {
            self.engine.copy_dir_in(id, &artifact, &target).await
        } else {
            self.engine.copy_file_in(id, &artifact, &target).await
        };
        copied.map_err(StepError::engine(Stage::Package, "copy artifact"))
    }

    /// Best-effort stop and removal of a container left running by a failure
    async fn cleanup(&mut self) {
        if let Some(id) = self.container.take() {
            if let Err(e) = self.engine.stop(&id).await {
                warn!(container_id = %id, "Failed to stop runtime container: {}", e);
            }
            self.remove_container(&id).await;
        }
    }

    async fn remove_container(&self, id: &str) {
        if let Err(e) = self.engine.remove(id).await {
            warn!(container_id = %id, "Failed to remove runtime container: {}", e);
        }
    }

    fn transition(&mut self, next: PackageState) {
        debug!(from = ?self.state, to = ?next, "Package stage transition");
        self.state = next;
    }
}

/// Host path of the artifact; relative paths are taken from the source root
fn artifact_path(request: &BuildRequest) -> Result<PathBuf> {
    let file: &Path = request.artifact();
    if file.as_os_str().is_empty() {
        return Err(StepError::InvalidRequest(
            "No artifact file configured for the package stage".to_string(),
        ));
    }
    if file.is_absolute() {
        Ok(file.to_path_buf())
    } else {
        Ok(request.source_root.join(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{ContainerState, Operation};
    use crate::engine::{EngineCall, MockEngine};
    use crate::request::BuildOptions;

    fn config() -> StepConfig {
        StepConfig::from_lookup(|key| match key {
            "CONTAINIFYCI_REGISTRY" => Some("registry.local".to_string()),
            _ => None,
        })
    }

    fn request() -> BuildRequest {
        let mut request = BuildRequest::maven("test");
        request.image = "test-image".to_string();
        request.image_tag = "1.0".to_string();
        request.source_root = PathBuf::from("/work");
        request.file = PathBuf::from("target/app.war");
        request
    }

    #[tokio::test]
    async fn test_commit_and_push() {
        let config = config();
        let engine = MockEngine::new();
        let mut stage = PackageStage::new(&engine, &config);

        let id = stage.run(&request()).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(stage.state(), PackageState::Done);

        let container = engine.container(&id).unwrap();
        assert_eq!(container.state, ContainerState::Removed);
        assert_eq!(container.spec.image, "tomcat:latest");
        assert_eq!(container.spec.cmd, vec!["sleep", "300"]);
        assert!(container.spec.platform.is_none());

        let calls = engine.calls();
        assert!(calls.contains(&EngineCall::CopyFileIn {
            id: id.clone(),
            host_path: PathBuf::from("/work/target/app.war"),
            container_path: "/usr/local/tomcat/webapps/app.war".to_string(),
        }));
        assert!(calls.contains(&EngineCall::Commit {
            id: id.clone(),
            request: CommitRequest {
                reference: "test-image:1.0".to_string(),
                comment: "Created from container".to_string(),
                changes: vec![r#"CMD ["catalina.sh", "run"]"#.to_string()],
            },
        }));
        let pushes: Vec<_> = calls
            .iter()
            .filter_map(|c| match c {
                EngineCall::Push { uri, .. } => Some(uri.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(pushes, vec!["registry.local/test-image:1.0"]);
    }

    #[tokio::test]
    async fn test_push_enabled_explicitly() {
        let config = config();
        let engine = MockEngine::new();
        let mut stage = PackageStage::new(&engine, &config);
        let mut request = request();
        request.options = BuildOptions::new().with(PUSH_OPTION, "true");

        let id = stage.run(&request).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(stage.state(), PackageState::Done);
        let pushes: Vec<_> = engine
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                EngineCall::Push { uri, .. } => Some(uri),
                _ => None,
            })
            .collect();
        assert_eq!(pushes, vec!["registry.local/test-image:1.0"]);
    }

    #[tokio::test]
    async fn test_runtime_container_removed_after_stop() {
        let config = config();
        let engine = MockEngine::new();
        let mut stage = PackageStage::new(&engine, &config);

        let id = stage.run(&request()).await.unwrap();
        let calls = engine.calls();
        let position = |call: EngineCall| calls.iter().position(|c| *c == call).unwrap();
        let stop = position(EngineCall::Stop(id.clone()));
        let remove = position(EngineCall::Remove(id.clone()));
        let commit = calls
            .iter()
            .position(|c| matches!(c, EngineCall::Commit { .. }))
            .unwrap();
        assert!(commit < stop);
        assert!(stop < remove);
        assert_eq!(engine.count(|c| matches!(c, EngineCall::Remove(_))), 1);
    }

    #[tokio::test]
    async fn test_remove_failure_keeps_result() {
        let config = config();
        let engine = MockEngine::new();
        engine.fail(Operation::Remove, "in use");
        let mut stage = PackageStage::new(&engine, &config);

        let id = stage.run(&request()).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(stage.state(), PackageState::Done);
        assert_eq!(engine.container(&id).unwrap().state, ContainerState::Stopped);
    }

    #[tokio::test]
    async fn test_push_disabled() {
        let config = config();
        let engine = MockEngine::new();
        let mut stage = PackageStage::new(&engine, &config);
        let mut request = request();
        request.options = BuildOptions::new().with(PUSH_OPTION, "false");

        let id = stage.run(&request).await.unwrap();
        assert_eq!(id, "");
        assert_eq!(stage.state(), PackageState::Done);
        assert_eq!(engine.count(|c| matches!(c, EngineCall::Push { .. })), 0);
        assert!(engine.has_image("test-image:1.0"));
    }

    #[tokio::test]
    async fn test_no_image_name_is_noop() {
        let config = config();
        let engine = MockEngine::new();
        let mut stage = PackageStage::new(&engine, &config);
        let mut request = request();
        request.image = String::new();

        assert_eq!(stage.run(&request).await.unwrap(), "");
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_base_image_override() {
        let config = config();
        let engine = MockEngine::new();
        let mut stage = PackageStage::new(&engine, &config);
        let mut request = request();
        request.options = BuildOptions::new().with(IMAGE_OPTION, "tomcat:10-jdk21");

        let id = stage.run(&request).await.unwrap();
        assert_eq!(engine.container(&id).unwrap().spec.image, "tomcat:10-jdk21");
    }

    #[tokio::test]
    async fn test_commit_failure_stops_container() {
        let config = config();
        let engine = MockEngine::new();
        engine.fail(Operation::Commit, "disk full");
        let mut stage = PackageStage::new(&engine, &config);

        let err = stage.run(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            StepError::Engine { stage: Stage::Package, operation: "commit runtime container", .. }
        ));
        assert_eq!(stage.state(), PackageState::Failed);
        assert_eq!(engine.count(|c| matches!(c, EngineCall::Stop(_))), 1);
        assert_eq!(engine.count(|c| matches!(c, EngineCall::Remove(_))), 1);
        assert_eq!(engine.count(|c| matches!(c, EngineCall::Push { .. })), 0);
    }

    #[tokio::test]
    async fn test_push_failure_is_error() {
        let config = config();
        let engine = MockEngine::new();
        engine.fail(Operation::Push, "unauthorized");
        let mut stage = PackageStage::new(&engine, &config);

        let err = stage.run(&request()).await.unwrap_err();
        assert!(!err.is_configuration());
        // Already stopped and removed before the push
        assert_eq!(engine.count(|c| matches!(c, EngineCall::Stop(_))), 1);
        assert_eq!(engine.count(|c| matches!(c, EngineCall::Remove(_))), 1);
    }

    #[tokio::test]
    async fn test_missing_artifact_is_invalid_request() {
        let config = config();
        let engine = MockEngine::new();
        let mut stage = PackageStage::new(&engine, &config);
        let mut request = request();
        request.file = PathBuf::new();

        let err = stage.run(&request).await.unwrap_err();
        assert!(matches!(err, StepError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_directory_artifact_uses_copy_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let exploded = dir.path().join("app");
        std::fs::create_dir(&exploded).unwrap();

        let config = config();
        let engine = MockEngine::new();
        let mut stage = PackageStage::new(&engine, &config);
        let mut request = request();
        request.file = exploded.clone();

        let id = stage.run(&request).await.unwrap();
        assert!(engine.calls().contains(&EngineCall::CopyDirIn {
            id,
            host_dir: exploded,
            container_dir: "/usr/local/tomcat/webapps/app".to_string(),
        }));
    }
}
