//! CLI entry point.

use std::sync::Arc;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cubed_cli::handlers::run::StatusReporter;
use cubed_cli::{Cli, Commands, bootstrap, handlers};

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };
    // The interactive console leaves a blocked stdin read on the
    // runtime's blocking pool; a plain return from main would wait for
    // one more Enter before the process could exit.
    std::process::exit(code);
}

async fn run() -> Result<()> {
    // Load environment variables before clap reads them
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    match command {
        Commands::Run(args) => {
            let reporter = Arc::new(StatusReporter::default());
            let ctx = bootstrap(args.to_config(), reporter.clone())?;
            handlers::run::execute(&ctx, &reporter).await
        }
        Commands::Check(args) => handlers::check::execute(&args.to_config()),
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    // Diagnostics go to stderr; stdout belongs to the server console.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
