use super::{CommitRequest, ContainerEngine, EngineError, EngineResult};
use crate::maven::launch::ContainerLaunchSpec;
use crate::request::Platform;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Engine operations that can be primed to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Pull,
    Build,
    Create,
    Start,
    Wait,
    Exec,
    CopyIn,
    Commit,
    Stop,
    Remove,
    Push,
}

/// One recorded engine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    ImageExists(String),
    Pull(String),
    Build {
        image: String,
        platforms: Vec<Platform>,
    },
    Create(Box<ContainerLaunchSpec>),
    Start(String),
    Wait(String),
    Exec {
        id: String,
        cmd: Vec<String>,
    },
    CopyFileIn {
        id: String,
        host_path: PathBuf,
        container_path: String,
    },
    CopyDirIn {
        id: String,
        host_dir: PathBuf,
        container_dir: String,
    },
    CopyContentIn {
        id: String,
        container_path: String,
        content: Vec<u8>,
    },
    Commit {
        id: String,
        request: CommitRequest,
    },
    Stop(String),
    Remove(String),
    Push {
        image_id: String,
        uri: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Started,
    Exited,
    Stopped,
    Removed,
}

#[derive(Debug, Clone)]
pub struct MockContainer {
    pub spec: ContainerLaunchSpec,
    pub state: ContainerState,
}

#[derive(Default)]
struct MockState {
    calls: Vec<EngineCall>,
    images: HashSet<String>,
    containers: HashMap<String, MockContainer>,
    failures: HashMap<Operation, String>,
    exit_code: i64,
    next_id: usize,
}

/// In-memory engine that records every call
///
/// Images become resolvable once pulled, built or committed. Any operation
/// can be primed to fail with [`MockEngine::fail`].
#[derive(Default)]
pub struct MockEngine {
    state: Mutex<MockState>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `image` as already present locally
    pub fn with_image(self, image: impl Into<String>) -> Self {
        self.state.lock().unwrap().images.insert(image.into());
        self
    }

    pub fn fail(&self, operation: Operation, message: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(operation, message.into());
    }

    /// Exit code reported by `wait`
    pub fn set_exit_code(&self, code: i64) {
        self.state.lock().unwrap().exit_code = code;
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, matcher: impl Fn(&EngineCall) -> bool) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| matcher(c))
            .count()
    }

    pub fn has_image(&self, image: &str) -> bool {
        self.state.lock().unwrap().images.contains(image)
    }

    pub fn container(&self, id: &str) -> Option<MockContainer> {
        self.state.lock().unwrap().containers.get(id).cloned()
    }

    fn record(&self, call: EngineCall, operation: Option<Operation>) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call.clone());
        let Some(operation) = operation else {
            return Ok(());
        };
        let Some(message) = state.failures.get(&operation).cloned() else {
            return Ok(());
        };
        Err(match call {
            EngineCall::Build { image, .. } => EngineError::Build { image, message },
            EngineCall::Push { uri, .. } => EngineError::Push { uri, message },
            _ => EngineError::Other(message),
        })
    }

    fn set_state(&self, id: &str, state: ContainerState) -> EngineResult<()> {
        let mut guard = self.state.lock().unwrap();
        let container = guard
            .containers
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(format!("container {}", id)))?;
        container.state = state;
        Ok(())
    }

    fn ensure_container(&self, id: &str) -> EngineResult<()> {
        if self.state.lock().unwrap().containers.contains_key(id) {
            Ok(())
        } else {
            Err(EngineError::NotFound(format!("container {}", id)))
        }
    }
}

#[async_trait]
impl ContainerEngine for MockEngine {
    async fn image_exists(&self, image: &str) -> EngineResult<bool> {
        self.record(EngineCall::ImageExists(image.to_string()), None)?;
        Ok(self.has_image(image))
    }

    async fn pull(&self, image: &str) -> EngineResult<()> {
        self.record(EngineCall::Pull(image.to_string()), Some(Operation::Pull))?;
        self.state.lock().unwrap().images.insert(image.to_string());
        Ok(())
    }

    async fn build_multi_platform(
        &self,
        image: &str,
        _recipe: &[u8],
        platforms: &[Platform],
    ) -> EngineResult<()> {
        self.record(
            EngineCall::Build {
                image: image.to_string(),
                platforms: platforms.to_vec(),
            },
            Some(Operation::Build),
        )?;
        self.state.lock().unwrap().images.insert(image.to_string());
        Ok(())
    }

    async fn create(&self, spec: &ContainerLaunchSpec) -> EngineResult<String> {
        self.record(
            EngineCall::Create(Box::new(spec.clone())),
            Some(Operation::Create),
        )?;
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("container-{}", state.next_id);
        state.containers.insert(
            id.clone(),
            MockContainer {
                spec: spec.clone(),
                state: ContainerState::Created,
            },
        );
        Ok(id)
    }

    async fn start(&self, id: &str) -> EngineResult<()> {
        self.record(EngineCall::Start(id.to_string()), Some(Operation::Start))?;
        self.set_state(id, ContainerState::Started)
    }

    async fn wait(&self, id: &str) -> EngineResult<i64> {
        self.record(EngineCall::Wait(id.to_string()), Some(Operation::Wait))?;
        self.set_state(id, ContainerState::Exited)?;
        Ok(self.state.lock().unwrap().exit_code)
    }

    async fn exec(&self, id: &str, cmd: &[String]) -> EngineResult<()> {
        self.record(
            EngineCall::Exec {
                id: id.to_string(),
                cmd: cmd.to_vec(),
            },
            Some(Operation::Exec),
        )?;
        self.ensure_container(id)
    }

    async fn copy_file_in(
        &self,
        id: &str,
        host_path: &Path,
        container_path: &str,
    ) -> EngineResult<()> {
        self.record(
            EngineCall::CopyFileIn {
                id: id.to_string(),
                host_path: host_path.to_path_buf(),
                container_path: container_path.to_string(),
            },
            Some(Operation::CopyIn),
        )?;
        self.ensure_container(id)
    }

    async fn copy_dir_in(
        &self,
        id: &str,
        host_dir: &Path,
        container_dir: &str,
    ) -> EngineResult<()> {
        self.record(
            EngineCall::CopyDirIn {
                id: id.to_string(),
                host_dir: host_dir.to_path_buf(),
                container_dir: container_dir.to_string(),
            },
            Some(Operation::CopyIn),
        )?;
        self.ensure_container(id)
    }

    async fn copy_content_in(
        &self,
        id: &str,
        content: &[u8],
        container_path: &str,
        _mode: u32,
    ) -> EngineResult<()> {
        self.record(
            EngineCall::CopyContentIn {
                id: id.to_string(),
                container_path: container_path.to_string(),
                content: content.to_vec(),
            },
            Some(Operation::CopyIn),
        )?;
        self.ensure_container(id)
    }

    async fn commit(&self, id: &str, request: &CommitRequest) -> EngineResult<String> {
        self.record(
            EngineCall::Commit {
                id: id.to_string(),
                request: request.clone(),
            },
            Some(Operation::Commit),
        )?;
        self.ensure_container(id)?;
        let mut state = self.state.lock().unwrap();
        state.images.insert(request.reference.clone());
        state.next_id += 1;
        Ok(format!("sha256:image-{}", state.next_id))
    }

    async fn stop(&self, id: &str) -> EngineResult<()> {
        self.record(EngineCall::Stop(id.to_string()), Some(Operation::Stop))?;
        self.set_state(id, ContainerState::Stopped)
    }

    /// Removed containers stay inspectable in the [`ContainerState::Removed`] state
    async fn remove(&self, id: &str) -> EngineResult<()> {
        self.record(EngineCall::Remove(id.to_string()), Some(Operation::Remove))?;
        self.set_state(id, ContainerState::Removed)
    }

    async fn push(&self, image_id: &str, uri: &str) -> EngineResult<()> {
        self.record(
            EngineCall::Push {
                image_id: image_id.to_string(),
                uri: uri.to_string(),
            },
            Some(Operation::Push),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pulled_images_become_resolvable() {
        let engine = MockEngine::new();
        assert!(!engine.image_exists("tomcat:latest").await.unwrap());
        engine.pull("tomcat:latest").await.unwrap();
        assert!(engine.image_exists("tomcat:latest").await.unwrap());
    }

    #[tokio::test]
    async fn test_primed_failure() {
        let engine = MockEngine::new();
        engine.fail(Operation::Push, "denied");
        let err = engine.push("sha256:x", "docker.io/app:1").await.unwrap_err();
        assert!(matches!(err, EngineError::Push { ref uri, .. } if uri == "docker.io/app:1"));
        assert_eq!(engine.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_container_lifecycle() {
        let engine = MockEngine::new();
        let id = engine.create(&ContainerLaunchSpec::new("img")).await.unwrap();
        assert_eq!(engine.container(&id).unwrap().state, ContainerState::Created);
        engine.start(&id).await.unwrap();
        engine.stop(&id).await.unwrap();
        assert_eq!(engine.container(&id).unwrap().state, ContainerState::Stopped);
        engine.remove(&id).await.unwrap();
        assert_eq!(engine.container(&id).unwrap().state, ContainerState::Removed);
        assert!(engine.start("unknown").await.is_err());
        assert!(engine.remove("unknown").await.is_err());
    }
}
