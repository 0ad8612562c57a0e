//! Container launch specification and its assembly for the compile stage

use super::forward::{SocketMounter, SshForwarder};
use super::script::BuildScript;
use super::tag::ImageTag;
use crate::config::StepConfig;
use crate::error::Result;
use crate::request::{BuildRequest, Platform, RuntimeFlavor};
use std::path::PathBuf;
use tracing::debug;

/// Mount point of the source folder, also the working directory
pub const SOURCE_MOUNT: &str = "/src";
/// Mount point of the persistent Maven cache
pub const CACHE_MOUNT: &str = "/root/.m2/";

pub const MAVEN_OPTS: &str = "MAVEN_OPTS=-Xms512m -Xmx512m -XX:MaxDirectMemorySize=512m";
pub const MEMORY_LIMIT: i64 = 4_073_741_824;
pub const CPU_SHARES: u64 = 2048;

/// Option key carrying the address builds use to reach the invoking host
pub const HOST_OPTION: &str = "CONTAINIFYCI_HOST";

const PODMAN_DOCKER_HOST: &str = "DOCKER_HOST=unix://var/run/podman.sock";
const RYUK_DISABLED: &str = "TESTCONTAINERS_RYUK_DISABLED=true";
const RYUK_UNPRIVILEGED: &str = "TESTCONTAINERS_RYUK_PRIVILEGED=false";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub source: PathBuf,
    pub target: String,
    pub read_only: bool,
}

impl Volume {
    /// Read/write bind mount
    pub fn bind(source: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            read_only: false,
        }
    }

    /// `source:target[:ro]` notation understood by the engine API
    pub fn to_bind_string(&self) -> String {
        let mode = if self.read_only { "ro" } else { "rw" };
        format!("{}:{}:{}", self.source.display(), self.target, mode)
    }
}

/// Everything needed to create one ephemeral container
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerLaunchSpec {
    pub image: String,
    /// `KEY=value` entries
    pub env: Vec<String>,
    pub volumes: Vec<Volume>,
    pub working_dir: Option<String>,
    /// Memory ceiling in bytes
    pub memory: Option<i64>,
    pub cpu_shares: Option<u64>,
    pub cmd: Vec<String>,
    /// Script written to the container before it starts
    pub script: Option<String>,
    pub user: Option<String>,
    /// `None` lets the engine pick the platform
    pub platform: Option<Platform>,
}

impl ContainerLaunchSpec {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }

    /// Appends `entry` unless the exact entry is already present
    pub fn push_env(&mut self, entry: impl Into<String>) {
        let entry = entry.into();
        if !self.env.contains(&entry) {
            self.env.push(entry);
        }
    }

    /// Value of the first `key=` entry
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env.iter().find_map(|entry| {
            entry
                .split_once('=')
                .filter(|(k, _)| *k == key)
                .map(|(_, v)| v)
        })
    }
}

/// Address a container uses to reach the host on hosts without native
/// container-to-host loopback
pub fn container_host_address(runtime: RuntimeFlavor) -> &'static str {
    match runtime {
        RuntimeFlavor::Docker => "host.docker.internal",
        RuntimeFlavor::Podman => "host.containers.internal",
    }
}

/// Builds the launch spec of the compile container
pub struct LaunchAssembler<'a> {
    config: &'a StepConfig,
    ssh: &'a dyn SshForwarder,
    socket: &'a dyn SocketMounter,
}

impl<'a> LaunchAssembler<'a> {
    pub fn new(
        config: &'a StepConfig,
        ssh: &'a dyn SshForwarder,
        socket: &'a dyn SocketMounter,
    ) -> Self {
        Self {
            config,
            ssh,
            socket,
        }
    }

    pub fn assemble(&self, request: &BuildRequest, tag: &ImageTag) -> Result<ContainerLaunchSpec> {
        let mut spec = ContainerLaunchSpec::new(tag.reference());

        spec.push_env(MAVEN_OPTS);
        if let Some(host) = request.options.string(HOST_OPTION) {
            spec.push_env(format!("{}={}", HOST_OPTION, host));
        }

        if request.platform.host.is_darwin() {
            let address = container_host_address(request.runtime);
            debug!(address, "Advertising host address to testcontainers");
            spec.push_env(format!("TC_HOST={}", address));
            spec.push_env(format!("TESTCONTAINERS_HOST_OVERRIDE={}", address));
        }

        spec.working_dir = Some(SOURCE_MOUNT.to_string());
        spec.volumes = vec![
            Volume::bind(request.source_root.clone(), SOURCE_MOUNT),
            Volume::bind(self.config.resolve_cache_dir()?, CACHE_MOUNT),
        ];
        spec.memory = Some(MEMORY_LIMIT);
        spec.cpu_shares = Some(CPU_SHARES);

        // Helpers append to env and volumes, so the base fields go first.
        let mut spec = self.ssh.apply(spec);
        spec = self.socket.apply_socket(request.runtime, spec);

        if request.runtime == RuntimeFlavor::Podman {
            spec.push_env(PODMAN_DOCKER_HOST);
            spec.push_env(RYUK_DISABLED);
        }

        if !self.config.container_privileged {
            spec.push_env(RYUK_DISABLED);
            spec.push_env(RYUK_UNPRIVILEGED);
        }

        spec.script = Some(BuildScript::new(request.verbose, request.folder.clone()).render());
        spec.cmd = BuildScript::command();

        Ok(spec)
    }
}
