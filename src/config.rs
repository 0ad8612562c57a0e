//! Configuration management for maven-steps
//!
//! Settings are read from environment variables once, at startup, and then
//! passed explicitly to the steps. Nothing below the CLI reads the process
//! environment on its own.
//!
//! # Environment Variables
//!
//! - `CONTAINIFYCI_REGISTRY`: registry final images are pushed to - default: "docker.io"
//! - `CONTAINIFYCI_IMAGE_REGISTRY`: registry prefix of compiler images - default: "containifyci"
//! - `MAVEN_HOME`, then `CONTAINIFYCI_CACHE`: host directory holding the Maven
//!   cache - default: `~/.m2`
//! - `CONTAINER_PRIVILEGED`: set to "false" to disable the Testcontainers reaper
//! - `SSH_AUTH_SOCK`: ssh agent socket forwarded into the compile container
//! - `CONTAINER_RUNTIME_SOCKET`: host path of the container runtime socket
//! - `MAVEN_STEPS_LOG_LEVEL`: logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use maven_steps::StepConfig;
//!
//! let config = StepConfig::default();
//! config.validate().expect("Invalid configuration");
//! let cache = config.resolve_cache_dir().expect("No cache directory");
//! println!("Maven cache: {}", cache.display());
//! ```

use crate::error::StepError;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

const DEFAULT_REGISTRY: &str = "docker.io";
const DEFAULT_IMAGE_REGISTRY: &str = "containifyci";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Checked in order; the first non-empty value wins
const CACHE_ENV_VARS: [&str; 2] = ["MAVEN_HOME", "CONTAINIFYCI_CACHE"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Environment-backed settings shared by both steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepConfig {
    /// Registry final images are pushed to
    pub registry: String,

    /// Registry prefix of the content-addressed compiler images
    pub image_registry: String,

    /// Explicit Maven cache directory; `None` falls back to `~/.m2`
    pub cache_dir: Option<PathBuf>,

    /// `false` only when `CONTAINER_PRIVILEGED=false`, or when the legacy
    /// `CONTAINER_PRIVILGED=false` is set and the correct name is absent
    pub container_privileged: bool,

    pub ssh_auth_sock: Option<PathBuf>,

    pub runtime_socket: Option<PathBuf>,

    pub log_level: String,
}

impl Default for StepConfig {
    /// Loads the configuration from the process environment
    fn default() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }
}

impl StepConfig {
    /// Loads the configuration through `lookup`, which maps a variable name to
    /// its value
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let registry = non_empty("CONTAINIFYCI_REGISTRY").unwrap_or_else(|| DEFAULT_REGISTRY.to_string());
        let image_registry = non_empty("CONTAINIFYCI_IMAGE_REGISTRY")
            .unwrap_or_else(|| DEFAULT_IMAGE_REGISTRY.to_string());

        let cache_dir = CACHE_ENV_VARS
            .iter()
            .find_map(|key| non_empty(key))
            .map(PathBuf::from);

        // The misspelled name is still set by older CI setups
        let container_privileged = lookup("CONTAINER_PRIVILEGED")
            .or_else(|| lookup("CONTAINER_PRIVILGED"))
            .as_deref()
            != Some("false");

        let ssh_auth_sock = non_empty("SSH_AUTH_SOCK").map(PathBuf::from);
        let runtime_socket = non_empty("CONTAINER_RUNTIME_SOCKET").map(PathBuf::from);

        let log_level = non_empty("MAVEN_STEPS_LOG_LEVEL")
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            registry,
            image_registry,
            cache_dir,
            container_privileged,
            ssh_auth_sock,
            runtime_socket,
            log_level,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        if self.image_registry.contains(char::is_whitespace) {
            return Err(ConfigError::ValidationFailed(format!(
                "Image registry must not contain whitespace: '{}'",
                self.image_registry
            )));
        }

        Ok(())
    }

    /// Host directory mounted as the Maven cache.
    ///
    /// Uses the configured directory when set, otherwise `~/.m2`, which is
    /// created if it does not exist yet.
    pub fn resolve_cache_dir(&self) -> Result<PathBuf, StepError> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }

        let home = dirs::home_dir().ok_or_else(|| StepError::CacheDirectory {
            path: "~/.m2".to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "home directory of the current user is unknown",
            ),
        })?;
        let dir = home.join(".m2");
        info!(maven_home = %dir.display(), "MAVEN_HOME not set, using default");

        fs::create_dir_all(&dir).map_err(|source| StepError::CacheDirectory {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(dir)
    }

    pub fn to_display_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();

        map.insert("registry".to_string(), self.registry.clone());
        map.insert("image_registry".to_string(), self.image_registry.clone());
        if let Some(ref dir) = self.cache_dir {
            map.insert("cache_dir".to_string(), dir.display().to_string());
        }
        map.insert(
            "container_privileged".to_string(),
            self.container_privileged.to_string(),
        );
        if let Some(ref sock) = self.ssh_auth_sock {
            map.insert("ssh_auth_sock".to_string(), sock.display().to_string());
        }
        if let Some(ref sock) = self.runtime_socket {
            map.insert("runtime_socket".to_string(), sock.display().to_string());
        }
        map.insert("log_level".to_string(), self.log_level.clone());

        map
    }
}

impl fmt::Display for StepConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Maven Steps Configuration:")?;
        writeln!(f, "  Registry: {}", self.registry)?;
        writeln!(f, "  Image Registry: {}", self.image_registry)?;
        match self.cache_dir {
            Some(ref dir) => writeln!(f, "  Cache Dir: {}", dir.display())?,
            None => writeln!(f, "  Cache Dir: ~/.m2 (default)")?,
        }
        writeln!(f, "  Container Privileged: {}", self.container_privileged)?;
        if let Some(ref sock) = self.ssh_auth_sock {
            writeln!(f, "  SSH Agent: {}", sock.display())?;
        }
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}
