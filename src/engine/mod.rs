//! Container engine boundary
//!
//! The steps never talk to a container runtime directly. Everything goes
//! through [`ContainerEngine`], which has a bollard-backed implementation for
//! Docker and Podman ([`DockerEngine`]) and a recording in-memory one for tests
//! ([`MockEngine`]).

pub mod docker;
pub mod mock;

pub use docker::DockerEngine;
pub use mock::{EngineCall, MockEngine};

use crate::maven::launch::ContainerLaunchSpec;
use crate::request::Platform;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors reported by a container engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Docker/Podman API error
    #[error("Container API error: {0}")]
    Api(#[from] bollard::errors::Error),

    /// Image or container does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A container or exec finished with a non-zero exit code
    #[error("Container {id} exited with status {code}")]
    ExitStatus { id: String, code: i64 },

    #[error("Failed to build image {image}: {message}")]
    Build { image: String, message: String },

    #[error("Failed to push {uri}: {message}")]
    Push { uri: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine error: {0}")]
    Other(String),
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Parameters of an image commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRequest {
    /// Repository and tag, `name:tag`
    pub reference: String,
    pub comment: String,
    /// Dockerfile instructions applied to the committed image
    pub changes: Vec<String>,
}

/// Primitives the build steps need from a container runtime
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Whether `image` is resolvable locally
    async fn image_exists(&self, image: &str) -> EngineResult<bool>;

    async fn pull(&self, image: &str) -> EngineResult<()>;

    /// Builds `image` from a Dockerfile once per platform
    async fn build_multi_platform(
        &self,
        image: &str,
        recipe: &[u8],
        platforms: &[Platform],
    ) -> EngineResult<()>;

    /// Creates a container and returns its id. The container is not started.
    async fn create(&self, spec: &ContainerLaunchSpec) -> EngineResult<String>;

    async fn start(&self, id: &str) -> EngineResult<()>;

    /// Blocks until the container exits and returns its exit code
    async fn wait(&self, id: &str) -> EngineResult<i64>;

    async fn exec(&self, id: &str, cmd: &[String]) -> EngineResult<()>;

    async fn copy_file_in(&self, id: &str, host_path: &Path, container_path: &str)
        -> EngineResult<()>;

    async fn copy_dir_in(&self, id: &str, host_dir: &Path, container_dir: &str)
        -> EngineResult<()>;

    /// Writes `content` to `container_path` with the given file mode
    async fn copy_content_in(
        &self,
        id: &str,
        content: &[u8],
        container_path: &str,
        mode: u32,
    ) -> EngineResult<()>;

    /// Commits the container and returns the new image id
    async fn commit(&self, id: &str, request: &CommitRequest) -> EngineResult<String>;

    async fn stop(&self, id: &str) -> EngineResult<()>;

    /// Removes the container, killing it first if it is still running
    async fn remove(&self, id: &str) -> EngineResult<()>;

    async fn push(&self, image_id: &str, uri: &str) -> EngineResult<()>;
}

/// Joins a registry, an image name and a tag into a pushable reference
pub fn image_uri(registry: &str, image: &str, tag: &str) -> String {
    let registry = registry.trim_end_matches('/');
    if registry.is_empty() {
        format!("{}:{}", image, tag)
    } else {
        format!("{}/{}:{}", registry, image, tag)
    }
}

/// Splits `name:tag` into its parts. A colon inside a registry host port is
/// not treated as a tag separator.
pub fn split_reference(reference: &str) -> (&str, &str) {
    match reference.rsplit_once(':') {
        Some((name, tag)) if !tag.contains('/') => (name, tag),
        _ => (reference, "latest"),
    }
}
