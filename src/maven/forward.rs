//! Launch spec augmentation for ssh agent and runtime socket access
//!
//! Both helpers take the spec by value and hand back an augmented one. They
//! only ever append to the environment and volume lists.

use super::launch::{ContainerLaunchSpec, Volume};
use crate::request::RuntimeFlavor;
use std::path::PathBuf;
use tracing::debug;

pub trait SshForwarder: Send + Sync {
    fn apply(&self, spec: ContainerLaunchSpec) -> ContainerLaunchSpec;
}

pub trait SocketMounter: Send + Sync {
    fn apply_socket(&self, runtime: RuntimeFlavor, spec: ContainerLaunchSpec)
        -> ContainerLaunchSpec;
}

/// Forwards the host ssh agent socket, if there is one
#[derive(Debug, Clone, Default)]
pub struct AgentForwarder {
    socket: Option<PathBuf>,
}

impl AgentForwarder {
    pub fn new(socket: Option<PathBuf>) -> Self {
        Self { socket }
    }
}

impl SshForwarder for AgentForwarder {
    fn apply(&self, mut spec: ContainerLaunchSpec) -> ContainerLaunchSpec {
        let Some(socket) = &self.socket else {
            debug!("No ssh agent socket, skipping agent forwarding");
            return spec;
        };
        let target = socket.display().to_string();
        spec.volumes.push(Volume::bind(socket.clone(), target.clone()));
        spec.push_env(format!("SSH_AUTH_SOCK={}", target));
        spec
    }
}

const DOCKER_HOST_SOCKET: &str = "/var/run/docker.sock";
const PODMAN_HOST_SOCKET: &str = "/run/podman/podman.sock";

/// Mounts the container runtime socket so builds can start sibling containers
#[derive(Debug, Clone, Default)]
pub struct RuntimeSocketMounter {
    host_socket: Option<PathBuf>,
}

impl RuntimeSocketMounter {
    pub fn new(host_socket: Option<PathBuf>) -> Self {
        Self { host_socket }
    }

    pub fn host_socket(&self, runtime: RuntimeFlavor) -> PathBuf {
        self.host_socket.clone().unwrap_or_else(|| match runtime {
            RuntimeFlavor::Docker => PathBuf::from(DOCKER_HOST_SOCKET),
            RuntimeFlavor::Podman => PathBuf::from(PODMAN_HOST_SOCKET),
        })
    }

    /// Socket path inside the container
    pub fn container_socket(runtime: RuntimeFlavor) -> &'static str {
        match runtime {
            RuntimeFlavor::Docker => "/var/run/docker.sock",
            RuntimeFlavor::Podman => "/var/run/podman.sock",
        }
    }
}

impl SocketMounter for RuntimeSocketMounter {
    fn apply_socket(
        &self,
        runtime: RuntimeFlavor,
        mut spec: ContainerLaunchSpec,
    ) -> ContainerLaunchSpec {
        spec.volumes.push(Volume::bind(
            self.host_socket(runtime),
            Self::container_socket(runtime),
        ));
        spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_forwarding_appends() {
        let mut spec = ContainerLaunchSpec::new("img");
        spec.push_env("A=1");
        let spec = AgentForwarder::new(Some(PathBuf::from("/tmp/ssh-auth.sock"))).apply(spec);
        assert_eq!(spec.env, vec!["A=1", "SSH_AUTH_SOCK=/tmp/ssh-auth.sock"]);
        assert_eq!(spec.volumes[0].target, "/tmp/ssh-auth.sock");
    }

    #[test]
    fn test_agent_forwarding_without_socket_is_noop() {
        let spec = AgentForwarder::new(None).apply(ContainerLaunchSpec::new("img"));
        assert!(spec.env.is_empty());
        assert!(spec.volumes.is_empty());
    }

    #[test]
    fn test_socket_mount_per_runtime() {
        let mounter = RuntimeSocketMounter::default();
        let spec = mounter.apply_socket(RuntimeFlavor::Podman, ContainerLaunchSpec::new("img"));
        assert_eq!(spec.volumes[0].source, PathBuf::from(PODMAN_HOST_SOCKET));
        assert_eq!(spec.volumes[0].target, "/var/run/podman.sock");

        let mounter = RuntimeSocketMounter::new(Some(PathBuf::from("/custom.sock")));
        let spec = mounter.apply_socket(RuntimeFlavor::Docker, ContainerLaunchSpec::new("img"));
        assert_eq!(spec.volumes[0].source, PathBuf::from("/custom.sock"));
        assert_eq!(spec.volumes[0].target, "/var/run/docker.sock");
    }
}
