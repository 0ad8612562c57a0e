//! CLI integration tests
//!
//! Only commands that never reach a container runtime are exercised here.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

fn maven_steps_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_maven-steps"))
}

fn command() -> Command {
    let mut command = Command::new(maven_steps_bin());
    command.env_remove("MAVEN_STEPS_LOG_LEVEL");
    command.env_remove("CONTAINIFYCI_IMAGE_REGISTRY");
    command
}

#[test]
fn test_cli_help() {
    let output = command().arg("--help").output().expect("Failed to run binary");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("run"));
    assert!(stdout.contains("images"));
}

#[test]
fn test_script_command() {
    let output = command()
        .args(["script", "--folder", "service", "--build-verbose"])
        .output()
        .expect("Failed to run binary");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "#!/bin/sh\nset -xe\ncd service\nmvn --batch-mode package -X\n"
    );
}

#[test]
fn test_tag_command_is_stable() {
    let run = || {
        command()
            .args(["tag", "--from", "v21"])
            .output()
            .expect("Failed to run binary")
    };
    let first = run();
    let second = run();
    assert!(first.status.success());
    let tag = String::from_utf8_lossy(&first.stdout).trim().to_string();
    assert!(tag.starts_with("containifyci/maven-3-eclipse-temurin-21-alpine:"));
    assert_eq!(tag.rsplit(':').next().unwrap().len(), 64);
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn test_tag_rejects_unknown_version() {
    let output = command()
        .args(["tag", "--from", "v99"])
        .output()
        .expect("Failed to run binary");
    assert!(!output.status.success());
}

#[test]
fn test_images_command_json() {
    let dir = TempDir::new().unwrap();
    let output = command()
        .args(["images", "--format", "json", "--opt", "image=tomcat:10"])
        .arg("--source-root")
        .arg(dir.path())
        .output()
        .expect("Failed to run binary");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let images: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(images.len(), 3);
    assert!(images[0].starts_with("containifyci/maven-3-eclipse-temurin-17-alpine:"));
    assert_eq!(images[1], "tomcat:10");
    assert_eq!(images[2], "tomcat:10");
}

#[test]
fn test_images_without_reachable_runtime() {
    let dir = TempDir::new().unwrap();
    let output = command()
        .args(["images", "--format", "json", "--runtime", "podman"])
        .arg("--source-root")
        .arg(dir.path())
        .env("DOCKER_HOST", "unix:///nonexistent/docker.sock")
        .env("CONTAINER_RUNTIME_SOCKET", "/nonexistent/podman.sock")
        .output()
        .expect("Failed to run binary");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let images: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(images.len(), 3);
    assert_eq!(images[1], "tomcat:latest");
}

#[test]
fn test_images_unsupported_version_exit_code() {
    let dir = TempDir::new().unwrap();
    let output = command()
        .args(["images", "--opt", "from=v99"])
        .arg("--source-root")
        .arg(dir.path())
        .output()
        .expect("Failed to run binary");
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_images_from_request_file() {
    let dir = TempDir::new().unwrap();
    let request = dir.path().join("build.yaml");
    fs::write(
        &request,
        "app: shop\nkind: gradle\nimage: shop\noptions:\n  from: [v21]\n",
    )
    .unwrap();

    let output = command()
        .args(["images", "--format", "json", "--request"])
        .arg(&request)
        .arg("--source-root")
        .arg(dir.path())
        .output()
        .expect("Failed to run binary");
    assert!(output.status.success());

    // Gradle requests match no maven step
    let images: Vec<String> = serde_json::from_slice(&output.stdout).unwrap();
    assert!(images.is_empty());
}

#[test]
fn test_run_with_missing_request_file() {
    let output = command()
        .args(["run", "--request", "/nonexistent/build.yaml"])
        .output()
        .expect("Failed to run binary");
    assert_eq!(output.status.code(), Some(2));
}
