//! Maven build steps
//!
//! Two steps make up a Maven build:
//!
//! - `maven`: compiles the project inside a container started from a
//!   content-addressed compiler image, built on demand from an embedded recipe
//! - `maven-prod`: copies the produced artifact into a runtime base image,
//!   commits it as the application image and pushes it
//!
//! [`maven_steps`] hands both to the pipeline in execution order.

pub mod compile;
pub mod forward;
pub mod launch;
pub mod package;
pub mod recipe;
pub mod script;
pub mod steps;
pub mod tag;
pub mod version;

pub use compile::{CompileStage, CompileState};
pub use forward::{AgentForwarder, RuntimeSocketMounter, SocketMounter, SshForwarder};
pub use launch::{ContainerLaunchSpec, LaunchAssembler, Volume};
pub use package::{PackageStage, PackageState};
pub use recipe::RecipeStore;
pub use script::BuildScript;
pub use steps::{
    maven_images, maven_steps, BuildStep, CompileStep, PackageStep, StepContext, StepPipeline,
    StepReport,
};
pub use tag::{compiler_image, ImageTag};
pub use version::MavenVersion;
