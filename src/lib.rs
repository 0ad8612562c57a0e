//! maven-steps - Maven build steps for ephemeral containers
//!
//! Compiles a Maven project inside a throwaway container and packages the
//! resulting artifact into a deployable application image.
//!
//! # Core Concepts
//!
//! - **Compiler image**: an intermediate image built from an embedded recipe
//!   and tagged with the recipe's SHA-256, so recipe changes produce new tags
//!   and unchanged recipes are reused
//! - **Steps**: the compile step (`maven`) and the package step (`maven-prod`),
//!   each exposing a matcher, an image list and a run operation
//! - **Engine**: the container runtime boundary, backed by bollard for Docker
//!   and Podman
//!
//! # Example Usage
//!
//! ```no_run
//! use maven_steps::{maven_steps, BuildRequest, DockerEngine, RuntimeFlavor, StepConfig};
//! use maven_steps::{StepContext, StepPipeline};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut request = BuildRequest::maven("shop");
//! request.image = "shop".to_string();
//! request.file = "target/shop.war".into();
//!
//! let engine = DockerEngine::connect(RuntimeFlavor::Docker, None)?;
//! let context = Arc::new(StepContext::new(Arc::new(engine), StepConfig::default()));
//! let reports = StepPipeline::new(maven_steps(context, &request)?)
//!     .execute(&request)
//!     .await?;
//! for report in reports {
//!     println!("{}: {}", report.name, report.id);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`maven`]: version selection, recipes, tags, launch specs and both stages
//! - [`engine`]: the container engine trait and its implementations
//! - [`request`]: the build request model
//! - [`config`]: environment-backed settings

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod maven;
pub mod request;
pub mod util;

pub use config::{ConfigError, StepConfig};
pub use engine::{ContainerEngine, DockerEngine, EngineError, MockEngine};
pub use error::{Stage, StepError};
pub use maven::{
    maven_images, maven_steps, BuildStep, CompileStep, ImageTag, MavenVersion, PackageStep,
    StepContext, StepPipeline, StepReport,
};
pub use request::{BuildKind, BuildOptions, BuildRequest, Platform, RuntimeFlavor};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
