use crate::engine::EngineError;
use thiserror::Error;

/// Stage an engine failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Compile,
    Package,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Compile => f.write_str("compile"),
            Stage::Package => f.write_str("package"),
        }
    }
}

/// Errors produced by the Maven build steps
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Unsupported maven version '{version}'. Supported versions: {supported}")]
    UnsupportedVersion { version: String, supported: String },

    #[error("Build recipe {file_name} is missing from the recipe store")]
    MissingRecipe { file_name: String },

    #[error("Failed to prepare cache directory {path}: {source}")]
    CacheDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid build request: {0}")]
    InvalidRequest(String),

    #[error("{stage} stage failed to {operation}: {source}")]
    Engine {
        stage: Stage,
        operation: &'static str,
        #[source]
        source: EngineError,
    },
}

impl StepError {
    pub(crate) fn engine(stage: Stage, operation: &'static str) -> impl FnOnce(EngineError) -> Self {
        move |source| StepError::Engine {
            stage,
            operation,
            source,
        }
    }

    /// Configuration errors mean the build definition itself is broken and
    /// retrying cannot help.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            StepError::UnsupportedVersion { .. }
                | StepError::MissingRecipe { .. }
                | StepError::InvalidRequest(_)
        )
    }

    /// Process exit code the CLI reports for this error
    pub fn exit_code(&self) -> i32 {
        if self.is_configuration() {
            2
        } else {
            1
        }
    }
}

pub type Result<T> = std::result::Result<T, StepError>;
