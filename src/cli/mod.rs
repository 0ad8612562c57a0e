pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{CliArgs, Commands, ImagesArgs, RequestArgs, RunArgs, ScriptArgs, TagArgs};
pub use output::{OutputFormat, OutputFormatter};
