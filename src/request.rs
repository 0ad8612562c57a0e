//! Build request model
//!
//! A [`BuildRequest`] is the immutable description of one build invocation.
//! It is owned by the caller and only ever borrowed by the steps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Kind of project being built. Parsed case-insensitively from request
/// files, written back in lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum BuildKind {
    Maven,
    Gradle,
    GoLang,
    Python,
    Other(String),
}

impl BuildKind {
    pub fn name(&self) -> &str {
        match self {
            BuildKind::Maven => "Maven",
            BuildKind::Gradle => "Gradle",
            BuildKind::GoLang => "GoLang",
            BuildKind::Python => "Python",
            BuildKind::Other(name) => name,
        }
    }
}

impl FromStr for BuildKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "maven" => BuildKind::Maven,
            "gradle" => BuildKind::Gradle,
            "golang" | "go" => BuildKind::GoLang,
            "python" => BuildKind::Python,
            _ => BuildKind::Other(s.to_string()),
        })
    }
}

impl From<String> for BuildKind {
    fn from(value: String) -> Self {
        match value.parse() {
            Ok(kind) => kind,
            Err(never) => match never {},
        }
    }
}

impl From<BuildKind> for String {
    fn from(kind: BuildKind) -> Self {
        match kind {
            BuildKind::Other(name) => name,
            known => known.name().to_lowercase(),
        }
    }
}

impl fmt::Display for BuildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Container engine implementation in use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeFlavor {
    #[default]
    Docker,
    /// Rootless, daemonless engine
    Podman,
}

impl RuntimeFlavor {
    pub fn name(&self) -> &'static str {
        match self {
            RuntimeFlavor::Docker => "docker",
            RuntimeFlavor::Podman => "podman",
        }
    }
}

impl FromStr for RuntimeFlavor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(RuntimeFlavor::Docker),
            "podman" => Ok(RuntimeFlavor::Podman),
            other => Err(format!(
                "Unknown container runtime '{}'. Valid options: docker, podman",
                other
            )),
        }
    }
}

impl fmt::Display for RuntimeFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An `os/arch` pair such as `linux/amd64`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new(os: impl Into<String>, arch: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    pub fn linux_amd64() -> Self {
        Self::new("linux", "amd64")
    }

    pub fn linux_arm64() -> Self {
        Self::new("linux", "arm64")
    }

    /// Platform of the machine running this process, in container notation
    pub fn current() -> Self {
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            other => other,
        };
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        Self::new(os, arch)
    }

    pub fn is_darwin(&self) -> bool {
        self.os == "darwin"
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((os, arch)) if !os.is_empty() && !arch.is_empty() => Ok(Self::new(os, arch)),
            _ => Err(format!("Invalid platform '{}' (expected 'os/arch')", s)),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

/// Host the build runs on plus the platforms the compiler image targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPlatform {
    pub host: Platform,
    #[serde(default)]
    pub targets: Vec<Platform>,
}

impl TargetPlatform {
    /// Platforms the compiler image is built for. Defaults to both linux
    /// architectures when no explicit targets were requested.
    ///
    /// Every platform is built under the same reference, so the one matching
    /// the host architecture comes last and owns the local tag.
    pub fn build_platforms(&self) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = Vec::with_capacity(self.targets.len().max(2));
        if self.targets.is_empty() {
            platforms.push(Platform::linux_amd64());
            platforms.push(Platform::linux_arm64());
        } else {
            for platform in &self.targets {
                if !platforms.contains(platform) {
                    platforms.push(platform.clone());
                }
            }
        }
        // Stable sort keeps the requested order among non-host platforms
        platforms.sort_by_key(|platform| platform.arch == self.host.arch);
        platforms
    }
}

impl Default for TargetPlatform {
    fn default() -> Self {
        Self {
            host: Platform::current(),
            targets: Vec::new(),
        }
    }
}

/// Free-form multi-value option map with typed accessors
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildOptions(BTreeMap<String, Vec<String>>);

impl BuildOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.entry(key.into()).or_default().push(value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// First value for `key`, ignoring empty strings
    pub fn string(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(|values| values.first())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn string_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.string(key).unwrap_or(default)
    }

    /// Boolean value for `key`. Unparseable values fall back to `default`.
    pub fn bool(&self, key: &str, default: bool) -> bool {
        match self.string(key).map(|v| v.trim().to_lowercase()) {
            Some(v) if matches!(v.as_str(), "true" | "1" | "yes" | "on") => true,
            Some(v) if matches!(v.as_str(), "false" | "0" | "no" | "off") => false,
            _ => default,
        }
    }

    pub fn list(&self, key: &str) -> &[String] {
        self.0.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Parses a `key=value` pair as given on the command line
    pub fn parse_pair(pair: &str) -> Result<(String, String), String> {
        match pair.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(format!("Invalid option '{}' (expected 'key=value')", pair)),
        }
    }
}

/// One build invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    pub app: String,
    pub kind: BuildKind,
    /// Folder the build runs in, relative to the source root
    #[serde(default)]
    pub folder: String,
    /// Absolute path of the source root mounted into the compile container
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,
    /// Artifact produced by the compile stage, on the host
    #[serde(default)]
    pub file: PathBuf,
    /// Name of the image the package stage produces; empty skips packaging
    #[serde(default)]
    pub image: String,
    #[serde(default = "default_image_tag")]
    pub image_tag: String,
    #[serde(default)]
    pub platform: TargetPlatform,
    #[serde(default)]
    pub runtime: RuntimeFlavor,
    #[serde(default)]
    pub options: BuildOptions,
    #[serde(default)]
    pub verbose: bool,
}

fn default_source_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_image_tag() -> String {
    "latest".to_string()
}

impl BuildRequest {
    pub fn new(app: impl Into<String>, kind: BuildKind) -> Self {
        Self {
            app: app.into(),
            kind,
            folder: String::new(),
            source_root: default_source_root(),
            file: PathBuf::new(),
            image: String::new(),
            image_tag: default_image_tag(),
            platform: TargetPlatform::default(),
            runtime: RuntimeFlavor::default(),
            options: BuildOptions::new(),
            verbose: false,
        }
    }

    pub fn maven(app: impl Into<String>) -> Self {
        Self::new(app, BuildKind::Maven)
    }

    pub fn host_os(&self) -> &str {
        &self.platform.host.os
    }

    pub fn artifact(&self) -> &Path {
        &self.file
    }
}
