//! Command handlers. Each returns the process exit code.

use super::commands::{ImagesArgs, RequestArgs, RunArgs, ScriptArgs, TagArgs};
use super::output::OutputFormatter;
use crate::config::StepConfig;
use crate::engine::DockerEngine;
use crate::error::StepError;
use crate::maven::recipe::RecipeStore;
use crate::maven::script::BuildScript;
use crate::maven::steps::{maven_images, maven_steps, StepContext, StepPipeline};
use crate::maven::tag::derive_tag;
use crate::request::{BuildKind, BuildRequest};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIGURATION: i32 = 2;

/// Reads a build request from a YAML or JSON file, chosen by extension
pub fn load_request(path: &Path) -> Result<BuildRequest> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file {}", path.display()))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse JSON request {}", path.display()))
    } else {
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML request {}", path.display()))
    }
}

/// Request from `--request`, if given, with the flags layered on top
pub fn build_request(args: &RequestArgs) -> Result<BuildRequest> {
    let mut request = match &args.request {
        Some(path) => load_request(path)?,
        None => BuildRequest::new(String::new(), BuildKind::Maven),
    };

    if let Some(app) = &args.app {
        request.app = app.clone();
    }
    if let Some(root) = &args.source_root {
        request.source_root = root.clone();
    }
    if let Some(folder) = &args.folder {
        request.folder = folder.clone();
    }
    if let Some(file) = &args.file {
        request.file = file.clone();
    }
    if let Some(image) = &args.image {
        request.image = image.clone();
    }
    if let Some(tag) = &args.tag {
        request.image_tag = tag.clone();
    }
    if let Some(runtime) = args.runtime {
        request.runtime = runtime.into();
    }
    for (key, value) in &args.options {
        request.options.insert(key.clone(), value.clone());
    }
    if !args.platforms.is_empty() {
        request.platform.targets = args.platforms.clone();
    }
    if args.build_verbose {
        request.verbose = true;
    }

    request.source_root = fs::canonicalize(&request.source_root).with_context(|| {
        format!("Source root does not exist: {}", request.source_root.display())
    })?;
    if request.app.is_empty() {
        request.app = request
            .source_root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "app".to_string());
    }

    Ok(request)
}

fn load_config() -> Option<StepConfig> {
    let config = StepConfig::default();
    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        eprintln!("\nPlease check your environment variables.");
        return None;
    }
    debug!("{}", config);
    Some(config)
}

fn connect(config: &StepConfig, request: &BuildRequest, socket: Option<&Path>) -> Option<DockerEngine> {
    let socket = socket.or(config.runtime_socket.as_deref());
    match DockerEngine::connect(request.runtime, socket) {
        Ok(engine) => Some(engine),
        Err(e) => {
            error!(runtime = %request.runtime, "Failed to connect to container runtime: {}", e);
            None
        }
    }
}

fn report_step_error(e: &StepError) -> i32 {
    error!("{}", e);
    if e.is_configuration() {
        eprintln!("\nThe build definition is invalid; retrying will not help.");
    }
    e.exit_code()
}

pub async fn handle_run(args: &RunArgs) -> i32 {
    let request = match build_request(&args.request) {
        Ok(request) => request,
        Err(e) => {
            error!("Invalid request: {:#}", e);
            return EXIT_CONFIGURATION;
        }
    };
    let Some(config) = load_config() else {
        return EXIT_CONFIGURATION;
    };
    let Some(engine) = connect(&config, &request, args.socket.as_deref()) else {
        return EXIT_FAILURE;
    };
    if let Err(e) = engine.ping().await {
        error!(runtime = %request.runtime, "Container runtime is not reachable: {}", e);
        return EXIT_FAILURE;
    }

    let context = Arc::new(StepContext::new(Arc::new(engine), config));
    let steps = match maven_steps(context, &request) {
        Ok(steps) => steps,
        Err(e) => return report_step_error(&e),
    };

    info!(app = %request.app, image = %request.image, "Starting maven build");
    let reports = match StepPipeline::new(steps).execute(&request).await {
        Ok(reports) => reports,
        Err(e) => return report_step_error(&e),
    };

    match OutputFormatter::new(args.format.into()).format_reports(&reports) {
        Ok(output) => {
            println!("{}", output);
            EXIT_SUCCESS
        }
        Err(e) => {
            error!("Failed to format output: {:#}", e);
            EXIT_FAILURE
        }
    }
}

/// Lists images from the embedded recipes alone; no runtime is contacted
pub fn handle_images(args: &ImagesArgs) -> i32 {
    let request = match build_request(&args.request) {
        Ok(request) => request,
        Err(e) => {
            error!("Invalid request: {:#}", e);
            return EXIT_CONFIGURATION;
        }
    };
    let Some(config) = load_config() else {
        return EXIT_CONFIGURATION;
    };

    let images = match maven_images(&RecipeStore::embedded(), &config, &request) {
        Ok(images) => images,
        Err(e) => return report_step_error(&e),
    };

    match OutputFormatter::new(args.format.into()).format_images(&images) {
        Ok(output) => {
            println!("{}", output);
            EXIT_SUCCESS
        }
        Err(e) => {
            error!("Failed to format output: {:#}", e);
            EXIT_FAILURE
        }
    }
}

pub fn handle_tag(args: &TagArgs) -> i32 {
    let Some(config) = load_config() else {
        return EXIT_CONFIGURATION;
    };
    let recipes = RecipeStore::embedded();
    match recipes.for_version(args.from) {
        Ok(recipe) => {
            println!("{}", derive_tag(recipe, args.from, &config.image_registry));
            EXIT_SUCCESS
        }
        Err(e) => report_step_error(&e),
    }
}

pub fn handle_script(args: &ScriptArgs) -> i32 {
    print!("{}", BuildScript::new(args.build_verbose, args.folder.clone()).render());
    EXIT_SUCCESS
}
