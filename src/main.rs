use maven_steps::cli::commands::{CliArgs, Commands};
use maven_steps::cli::handlers::{handle_images, handle_run, handle_script, handle_tag};
use maven_steps::util::init_for_cli;
use maven_steps::VERSION;

use clap::Parser;
use tracing::debug;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    init_for_cli(args.log_level.as_deref(), args.verbose, args.quiet);

    debug!("maven-steps v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Run(run_args) => handle_run(run_args).await,
        Commands::Images(images_args) => handle_images(images_args),
        Commands::Tag(tag_args) => handle_tag(tag_args),
        Commands::Script(script_args) => handle_script(script_args),
    };

    std::process::exit(exit_code);
}
