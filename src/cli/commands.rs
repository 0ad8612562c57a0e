use crate::maven::version::MavenVersion;
use crate::request::{BuildOptions, Platform, RuntimeFlavor};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Maven build steps for ephemeral containers
#[derive(Parser, Debug)]
#[command(
    name = "maven-steps",
    about = "Compile and package Maven projects in ephemeral containers",
    version,
    author,
    long_about = "maven-steps compiles a Maven project inside a container started from a \
                  content-addressed compiler image, then packages the produced artifact into \
                  a runtime image, commits it and pushes it to a registry. Docker and Podman \
                  are supported."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Run the compile and package steps",
        long_about = "Resolves the Maven steps for the request and runs them in order against \
                      the container runtime.\n\n\
                      Examples:\n  \
                      maven-steps run --image my-app --file target/app.war\n  \
                      maven-steps run --request build.yaml --runtime podman\n  \
                      maven-steps run --image my-app --file target/app.war --opt from=v21 --opt push=false"
    )]
    Run(RunArgs),

    #[command(
        about = "List the images the steps use or produce",
        long_about = "Prints the images of every step that applies to the request, in step order.\n\n\
                      Examples:\n  \
                      maven-steps images --opt from=v21\n  \
                      maven-steps images --request build.yaml --format json"
    )]
    Images(ImagesArgs),

    #[command(about = "Print the compiler image tag for a Maven version")]
    Tag(TagArgs),

    #[command(about = "Print the build script run inside the compile container")]
    Script(ScriptArgs),
}

/// Flags describing the build request. Flags override values loaded from
/// `--request`.
#[derive(Args, Debug, Clone, Default)]
pub struct RequestArgs {
    #[arg(
        short = 'r',
        long,
        value_name = "FILE",
        help = "Load the build request from a YAML or JSON file"
    )]
    pub request: Option<PathBuf>,

    #[arg(long, value_name = "NAME", help = "Application name")]
    pub app: Option<String>,

    #[arg(
        long,
        value_name = "DIR",
        help = "Source root mounted into the compile container (defaults to the current directory)"
    )]
    pub source_root: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Folder to build, relative to the source root")]
    pub folder: Option<String>,

    #[arg(short = 'f', long, value_name = "PATH", help = "Artifact produced by the build")]
    pub file: Option<PathBuf>,

    #[arg(short = 'i', long, value_name = "NAME", help = "Name of the image to produce")]
    pub image: Option<String>,

    #[arg(short = 't', long, value_name = "TAG", help = "Tag of the image to produce")]
    pub tag: Option<String>,

    #[arg(long, value_enum, help = "Container runtime")]
    pub runtime: Option<RuntimeArg>,

    #[arg(
        short = 'o',
        long = "opt",
        value_name = "KEY=VALUE",
        value_parser = BuildOptions::parse_pair,
        help = "Build option, can be repeated (e.g. from=v21, push=false, image=tomcat:10)"
    )]
    pub options: Vec<(String, String)>,

    #[arg(
        long = "platform",
        value_name = "OS/ARCH",
        value_parser = parse_platform,
        help = "Target platform of the compiler image, can be repeated"
    )]
    pub platforms: Vec<Platform>,

    #[arg(long, help = "Run Maven with debug output")]
    pub build_verbose: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    #[arg(
        long,
        value_name = "PATH",
        help = "Container runtime socket (defaults to CONTAINER_RUNTIME_SOCKET or the runtime default)"
    )]
    pub socket: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct ImagesArgs {
    #[command(flatten)]
    pub request: RequestArgs,

    #[arg(long, value_enum, default_value = "human", help = "Output format")]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct TagArgs {
    #[arg(
        long,
        value_name = "VERSION",
        default_value = "v17",
        value_parser = parse_version,
        help = "Maven version token"
    )]
    pub from: MavenVersion,
}

#[derive(Args, Debug, Clone)]
pub struct ScriptArgs {
    #[arg(long, value_name = "DIR", default_value = "", help = "Folder to build")]
    pub folder: String,

    #[arg(long, help = "Run Maven with debug output")]
    pub build_verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeArg {
    Docker,
    Podman,
}

impl From<RuntimeArg> for RuntimeFlavor {
    fn from(arg: RuntimeArg) -> Self {
        match arg {
            RuntimeArg::Docker => RuntimeFlavor::Docker,
            RuntimeArg::Podman => RuntimeFlavor::Podman,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

fn parse_platform(s: &str) -> Result<Platform, String> {
    s.parse::<Platform>().map_err(|e| e.to_string())
}

fn parse_version(s: &str) -> Result<MavenVersion, String> {
    MavenVersion::from_token(s).ok_or_else(|| {
        format!(
            "Unsupported version: {}. Valid options: {}",
            s,
            MavenVersion::supported_tokens()
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_run_with_options() {
        let args = CliArgs::parse_from([
            "maven-steps",
            "run",
            "--image",
            "my-app",
            "--file",
            "target/app.war",
            "--opt",
            "from=v21",
            "--opt",
            "push=false",
            "--runtime",
            "podman",
            "--platform",
            "linux/arm64",
        ]);
        match args.command {
            Commands::Run(run) => {
                assert_eq!(run.request.image.as_deref(), Some("my-app"));
                assert_eq!(run.request.file, Some(PathBuf::from("target/app.war")));
                assert_eq!(
                    run.request.options,
                    vec![
                        ("from".to_string(), "v21".to_string()),
                        ("push".to_string(), "false".to_string())
                    ]
                );
                assert_eq!(run.request.runtime, Some(RuntimeArg::Podman));
                assert_eq!(run.request.platforms, vec![Platform::linux_arm64()]);
                assert_eq!(run.format, OutputFormatArg::Human);
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_invalid_option_pair() {
        let result = CliArgs::try_parse_from(["maven-steps", "run", "--opt", "novalue"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_tag_defaults_to_v17() {
        let args = CliArgs::parse_from(["maven-steps", "tag"]);
        match args.command {
            Commands::Tag(tag) => assert_eq!(tag.from, MavenVersion::V17),
            _ => panic!("Expected Tag command"),
        }
        assert!(CliArgs::try_parse_from(["maven-steps", "tag", "--from", "v24"]).is_err());
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(CliArgs::try_parse_from(["maven-steps", "-v", "-q", "script"]).is_err());
    }
}
