//! CLI entry point - the composition root.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use narrate_cli::{Cli, CliConfig, CliError, Commands, bootstrap, handlers};

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::from_cli(&cli);
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    // Hashing needs no adapters.
    if let Commands::Hash { file, settings } = &command {
        return handlers::hash::execute(file, settings.as_deref()).await;
    }

    let ctx = bootstrap(config)?;
    match command {
        Commands::Render {
            file,
            settings,
            no_wait,
        } => handlers::render::execute(&ctx, &file, settings.as_deref(), no_wait).await,
        Commands::Run { id } => handlers::run::execute(&ctx, &id).await,
        Commands::Status { id } => handlers::status::execute(&ctx, &id).await,
        Commands::Diagnostics { id } => handlers::diagnostics::execute(&ctx, &id).await,
        Commands::Hash { .. } => Ok(()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables before parsing so `env =` args see them
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match dispatch(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            let code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
