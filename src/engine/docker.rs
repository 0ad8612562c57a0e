//! bollard-backed engine for Docker and Podman
//!
//! Podman is driven through its Docker-compatible API, so both runtimes share
//! this implementation and only differ in the socket they connect to.

use super::{split_reference, CommitRequest, ContainerEngine, EngineError, EngineResult};
use crate::maven::launch::ContainerLaunchSpec;
use crate::request::{Platform, RuntimeFlavor};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, LogOutput, LogsOptions, RemoveContainerOptions,
    StartContainerOptions, StopContainerOptions, UploadToContainerOptions, WaitContainerOptions,
};
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::image::{
    BuildImageOptions, CommitContainerOptions, CreateImageOptions, PushImageOptions,
    TagImageOptions,
};
use bollard::models::HostConfig;
use bollard::{Docker, API_DEFAULT_VERSION};
use bytes::Bytes;
use flate2::write::GzEncoder;
use flate2::Compression;
use futures_util::StreamExt;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info, warn};

const CONNECT_TIMEOUT_SECS: u64 = 120;
const STOP_TIMEOUT_SECS: i64 = 10;
const RECIPE_NAME: &str = "Dockerfile";
const PODMAN_SOCKET: &str = "/run/podman/podman.sock";

pub struct DockerEngine {
    docker: Docker,
}

impl DockerEngine {
    /// Connects to the runtime. `socket` overrides the default socket path.
    pub fn connect(runtime: RuntimeFlavor, socket: Option<&Path>) -> EngineResult<Self> {
        let docker = match (runtime, socket) {
            (_, Some(path)) => {
                let path = path.display().to_string();
                Docker::connect_with_socket(&path, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)?
            }
            (RuntimeFlavor::Docker, None) => Docker::connect_with_local_defaults()?,
            (RuntimeFlavor::Podman, None) => {
                Docker::connect_with_socket(PODMAN_SOCKET, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)?
            }
        };
        debug!(runtime = %runtime, "Connected to container runtime");
        Ok(Self { docker })
    }

    /// Checks that the daemon answers
    pub async fn ping(&self) -> EngineResult<()> {
        let version = self.docker.version().await?;
        debug!(
            api_version = version.api_version.as_deref().unwrap_or("unknown"),
            "Container runtime reachable"
        );
        Ok(())
    }

    async fn upload(&self, id: &str, directory: &str, archive: Vec<u8>) -> EngineResult<()> {
        let options = UploadToContainerOptions {
            path: directory.to_string(),
            ..Default::default()
        };
        self.docker
            .upload_to_container(id, Some(options), Bytes::from(archive))
            .await?;
        Ok(())
    }

    /// Follows the container output until it exits
    async fn follow_logs(&self, id: &str) {
        let options = LogsOptions::<String> {
            follow: true,
            stdout: true,
            stderr: true,
            ..Default::default()
        };
        let mut stream = self.docker.logs(id, Some(options));
        while let Some(item) = stream.next().await {
            match item {
                Ok(output) => log_output(id, &output),
                Err(e) => {
                    warn!(container_id = %id, "Log stream interrupted: {}", e);
                    break;
                }
            }
        }
    }
}

fn log_output(id: &str, output: &LogOutput) {
    let text = output.to_string();
    for line in text.lines().filter(|l| !l.is_empty()) {
        info!(target: "maven_steps::container", container_id = %id, "{}", line);
    }
}

fn is_not_found(error: &bollard::errors::Error) -> bool {
    matches!(
        error,
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            ..
        }
    )
}

/// Splits an absolute container path into its parent directory and file name
fn split_container_path(path: &str) -> EngineResult<(&str, &str)> {
    match path.trim_end_matches('/').rsplit_once('/') {
        Some((parent, name)) if !name.is_empty() => {
            Ok((if parent.is_empty() { "/" } else { parent }, name))
        }
        _ => Err(EngineError::Other(format!(
            "Container path must be absolute: {}",
            path
        ))),
    }
}

/// Single-entry tar archive holding `content` as `name`
pub(crate) fn content_archive(name: &str, content: &[u8], mode: u32) -> EngineResult<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(mode);
    header.set_cksum();
    builder.append_data(&mut header, name, content)?;
    Ok(builder.into_inner()?)
}

fn file_archive(name: &str, host_path: &Path) -> EngineResult<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.append_path_with_name(host_path, name)?;
    Ok(builder.into_inner()?)
}

fn dir_archive(name: &str, host_dir: &Path) -> EngineResult<Vec<u8>> {
    let mut builder = tar::Builder::new(Vec::new());
    builder.append_dir_all(name, host_dir)?;
    Ok(builder.into_inner()?)
}

/// Gzipped build context containing only the recipe
pub(crate) fn build_context(recipe: &[u8]) -> EngineResult<Vec<u8>> {
    let archive = content_archive(RECIPE_NAME, recipe, 0o644)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&archive)?;
    Ok(encoder.finish()?)
}

fn container_config(spec: &ContainerLaunchSpec) -> Config<String> {
    let binds: Vec<String> = spec.volumes.iter().map(|v| v.to_bind_string()).collect();
    let host_config = HostConfig {
        binds: (!binds.is_empty()).then_some(binds),
        memory: spec.memory,
        cpu_shares: spec.cpu_shares.map(|shares| shares as i64),
        ..Default::default()
    };

    Config {
        image: Some(spec.image.clone()),
        env: (!spec.env.is_empty()).then(|| spec.env.clone()),
        working_dir: spec.working_dir.clone(),
        cmd: (!spec.cmd.is_empty()).then(|| spec.cmd.clone()),
        user: spec.user.clone(),
        host_config: Some(host_config),
        ..Default::default()
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn image_exists(&self, image: &str) -> EngineResult<bool> {
        match self.docker.inspect_image(image).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn pull(&self, image: &str) -> EngineResult<()> {
        let options = CreateImageOptions {
            from_image: image.to_string(),
            ..Default::default()
        };
        let mut stream = self.docker.create_image(Some(options), None, None);
        while let Some(progress) = stream.next().await {
            let progress = progress?;
            if let Some(error) = progress.error {
                return Err(EngineError::Other(format!("Failed to pull {}: {}", image, error)));
            }
            if let Some(status) = progress.status {
                debug!(image, "{}", status);
            }
        }
        Ok(())
    }

    async fn build_multi_platform(
        &self,
        image: &str,
        recipe: &[u8],
        platforms: &[Platform],
    ) -> EngineResult<()> {
        let context = Bytes::from(build_context(recipe)?);

        for platform in platforms {
            info!(image, platform = %platform, "Building image");
            let options = BuildImageOptions {
                dockerfile: RECIPE_NAME.to_string(),
                t: image.to_string(),
                platform: platform.to_string(),
                rm: true,
                ..Default::default()
            };
            let mut stream = self.docker.build_image(options, None, Some(context.clone()));
            while let Some(step) = stream.next().await {
                let step = step.map_err(|e| EngineError::Build {
                    image: image.to_string(),
                    message: e.to_string(),
                })?;
                if let Some(error) = step.error {
                    return Err(EngineError::Build {
                        image: image.to_string(),
                        message: error,
                    });
                }
                if let Some(output) = step.stream {
                    let output = output.trim_end();
                    if !output.is_empty() {
                        debug!(image, "{}", output);
                    }
                }
            }
        }
        Ok(())
    }

    async fn create(&self, spec: &ContainerLaunchSpec) -> EngineResult<String> {
        let options = spec.platform.as_ref().map(|platform| CreateContainerOptions {
            name: String::new(),
            platform: Some(platform.to_string()),
        });
        let response = self
            .docker
            .create_container(options, container_config(spec))
            .await?;
        for warning in &response.warnings {
            warn!(container_id = %response.id, "{}", warning);
        }
        debug!(container_id = %response.id, image = %spec.image, "Created container");
        Ok(response.id)
    }

    async fn start(&self, id: &str) -> EngineResult<()> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn wait(&self, id: &str) -> EngineResult<i64> {
        self.follow_logs(id).await;

        let mut stream = self
            .docker
            .wait_container(id, None::<WaitContainerOptions<String>>);
        let mut code = 0;
        while let Some(result) = stream.next().await {
            match result {
                Ok(response) => code = response.status_code,
                Err(bollard::errors::Error::DockerContainerWaitError { code: status, .. }) => {
                    code = status;
                }
                Err(e) => return Err(e.into()),
            }
        }
        debug!(container_id = %id, code, "Container exited");
        Ok(code)
    }

    async fn exec(&self, id: &str, cmd: &[String]) -> EngineResult<()> {
        let options = CreateExecOptions {
            cmd: Some(cmd.to_vec()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };
        let exec = self.docker.create_exec(id, options).await?;

        if let StartExecResults::Attached { mut output, .. } =
            self.docker.start_exec(&exec.id, None).await?
        {
            while let Some(item) = output.next().await {
                log_output(id, &item?);
            }
        }

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        match inspect.exit_code {
            Some(0) | None => Ok(()),
            Some(code) => Err(EngineError::ExitStatus {
                id: id.to_string(),
                code,
            }),
        }
    }

    async fn copy_file_in(
        &self,
        id: &str,
        host_path: &Path,
        container_path: &str,
    ) -> EngineResult<()> {
        let (directory, name) = split_container_path(container_path)?;
        let archive = file_archive(name, host_path)?;
        self.upload(id, directory, archive).await
    }

    async fn copy_dir_in(
        &self,
        id: &str,
        host_dir: &Path,
        container_dir: &str,
    ) -> EngineResult<()> {
        let (directory, name) = split_container_path(container_dir)?;
        let archive = dir_archive(name, host_dir)?;
        self.upload(id, directory, archive).await
    }

    async fn copy_content_in(
        &self,
        id: &str,
        content: &[u8],
        container_path: &str,
        mode: u32,
    ) -> EngineResult<()> {
        let (directory, name) = split_container_path(container_path)?;
        let archive = content_archive(name, content, mode)?;
        self.upload(id, directory, archive).await
    }

    async fn commit(&self, id: &str, request: &CommitRequest) -> EngineResult<String> {
        let (repo, tag) = split_reference(&request.reference);
        let options = CommitContainerOptions {
            container: id.to_string(),
            repo: repo.to_string(),
            tag: tag.to_string(),
            comment: request.comment.clone(),
            changes: (!request.changes.is_empty()).then(|| request.changes.join("\n")),
            pause: true,
            ..Default::default()
        };
        self.docker
            .commit_container(options, Config::<String>::default())
            .await?;

        let image = self.docker.inspect_image(&request.reference).await?;
        image
            .id
            .ok_or_else(|| EngineError::NotFound(format!("image id of {}", request.reference)))
    }

    async fn stop(&self, id: &str) -> EngineResult<()> {
        self.docker
            .stop_container(
                id,
                Some(StopContainerOptions {
                    t: STOP_TIMEOUT_SECS,
                }),
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> EngineResult<()> {
        self.docker
            .remove_container(
                id,
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await?;
        debug!(container = %id, "Removed container");
        Ok(())
    }

    async fn push(&self, image_id: &str, uri: &str) -> EngineResult<()> {
        let (repo, tag) = split_reference(uri);
        self.docker
            .tag_image(
                image_id,
                Some(TagImageOptions {
                    repo: repo.to_string(),
                    tag: tag.to_string(),
                }),
            )
            .await?;

        let mut stream = self.docker.push_image(
            repo,
            Some(PushImageOptions {
                tag: tag.to_string(),
            }),
            None,
        );
        while let Some(progress) = stream.next().await {
            let progress = progress.map_err(|e| EngineError::Push {
                uri: uri.to_string(),
                message: e.to_string(),
            })?;
            if let Some(error) = progress.error {
                return Err(EngineError::Push {
                    uri: uri.to_string(),
                    message: error,
                });
            }
            if let Some(status) = progress.status {
                debug!(uri, "{}", status);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maven::launch::Volume;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn entries(archive: &[u8]) -> Vec<(String, Vec<u8>, u32)> {
        let mut archive = tar::Archive::new(archive);
        archive
            .entries()
            .unwrap()
            .map(|entry| {
                let mut entry = entry.unwrap();
                let path = entry.path().unwrap().display().to_string();
                let mode = entry.header().mode().unwrap();
                let mut content = Vec::new();
                entry.read_to_end(&mut content).unwrap();
                (path, content, mode)
            })
            .collect()
    }

    #[test]
    fn test_split_container_path() {
        assert_eq!(
            split_container_path("/tmp/script.sh").unwrap(),
            ("/tmp", "script.sh")
        );
        assert_eq!(
            split_container_path("/usr/local/tomcat/webapps/app/").unwrap(),
            ("/usr/local/tomcat/webapps", "app")
        );
        assert_eq!(split_container_path("/app.war").unwrap(), ("/", "app.war"));
        assert!(split_container_path("app.war").is_err());
    }

    #[test]
    fn test_content_archive_keeps_mode() {
        let archive = content_archive("script.sh", b"#!/bin/sh\n", 0o755).unwrap();
        let entries = entries(&archive);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "script.sh");
        assert_eq!(entries[0].1, b"#!/bin/sh\n");
        assert_eq!(entries[0].2 & 0o777, 0o755);
    }

    #[test]
    fn test_build_context_is_gzipped_dockerfile() {
        let context = build_context(b"FROM scratch\n").unwrap();
        let mut tar = Vec::new();
        GzDecoder::new(context.as_slice()).read_to_end(&mut tar).unwrap();

        let entries = entries(&tar);
        assert_eq!(entries[0].0, "Dockerfile");
        assert_eq!(entries[0].1, b"FROM scratch\n");
    }

    #[test]
    fn test_dir_archive_nests_under_name() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.jsp"), "hello").unwrap();

        let archive = dir_archive("app", dir.path()).unwrap();
        let names: Vec<String> = entries(&archive).into_iter().map(|e| e.0).collect();
        assert!(names.iter().any(|n| n == "app/index.jsp"));
    }

    #[test]
    fn test_container_config() {
        let mut spec = ContainerLaunchSpec::new("maven:test");
        spec.env = vec!["A=1".to_string()];
        spec.volumes = vec![Volume::bind("/work", "/src")];
        spec.memory = Some(1024);
        spec.cpu_shares = Some(2048);
        spec.cmd = vec!["sh".to_string(), "/tmp/script.sh".to_string()];

        let config = container_config(&spec);
        assert_eq!(config.image.as_deref(), Some("maven:test"));
        assert_eq!(config.env, Some(vec!["A=1".to_string()]));
        let host = config.host_config.unwrap();
        assert_eq!(host.binds, Some(vec!["/work:/src:rw".to_string()]));
        assert_eq!(host.memory, Some(1024));
        assert_eq!(host.cpu_shares, Some(2048));
    }

    #[test]
    fn test_empty_spec_leaves_optional_fields_unset() {
        let config = container_config(&ContainerLaunchSpec::new("tomcat:latest"));
        assert!(config.env.is_none());
        assert!(config.cmd.is_none());
        assert!(config.host_config.unwrap().binds.is_none());
    }
}
