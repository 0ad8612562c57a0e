//! Shared fixtures for the integration tests

#![allow(dead_code)]

use maven_steps::maven::version::VERSION_OPTION;
use maven_steps::{BuildRequest, MockEngine, Platform, RuntimeFlavor, StepConfig, StepContext};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const PUSH_REGISTRY: &str = "registry.example.com";

/// Config with a throwaway cache directory and a known push registry
pub fn config(cache: &Path) -> StepConfig {
    let cache = cache.display().to_string();
    StepConfig::from_lookup(move |key| match key {
        "MAVEN_HOME" => Some(cache.clone()),
        "CONTAINIFYCI_REGISTRY" => Some(PUSH_REGISTRY.to_string()),
        _ => None,
    })
}

pub fn context(engine: Arc<MockEngine>, config: StepConfig) -> Arc<StepContext> {
    Arc::new(StepContext::new(engine, config))
}

/// Temporary source tree holding a built war file
pub struct Workspace {
    pub dir: TempDir,
    pub cache: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create workspace");
        std::fs::create_dir_all(dir.path().join("target")).expect("Failed to create target dir");
        std::fs::write(dir.path().join("target/app.war"), b"war").expect("Failed to write war");
        Self {
            dir,
            cache: TempDir::new().expect("Failed to create cache dir"),
        }
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn config(&self) -> StepConfig {
        config(self.cache.path())
    }

    /// Linux docker request for `app`, packaged as `app:1.0`
    pub fn request(&self, version: Option<&str>) -> BuildRequest {
        let mut request = BuildRequest::maven("app");
        request.source_root = self.root();
        request.file = PathBuf::from("target/app.war");
        request.image = "app".to_string();
        request.image_tag = "1.0".to_string();
        request.platform.host = Platform::new("linux", "amd64");
        request.runtime = RuntimeFlavor::Docker;
        if let Some(version) = version {
            request.options.insert(VERSION_OPTION, version);
        }
        request
    }
}
