use clap::Parser;
use colored::*;
use std::process;
use taxatree::cli::{Cli, Commands};
use taxatree::TaxaTreeError;
use tracing_subscriber::EnvFilter;

fn main() {
    // .env may carry TAXATREE_* settings
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose > 0 {
        "debug".to_string()
    } else {
        std::env::var("TAXATREE_LOG").unwrap_or_else(|_| "info".to_string())
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);

        let exit_code = match e.downcast_ref::<TaxaTreeError>() {
            Some(TaxaTreeError::Config(_)) => 2,
            Some(TaxaTreeError::Io(_)) | Some(TaxaTreeError::NotFound(_)) => 3,
            Some(TaxaTreeError::Malformed { .. }) | Some(TaxaTreeError::Serialization(_)) => 4,
            Some(TaxaTreeError::Network(_)) | Some(TaxaTreeError::Http { .. }) => 5,
            Some(TaxaTreeError::Invariant(_)) => 6,
            _ => 1,
        };
        process::exit(exit_code);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config.as_deref();

    match cli.command {
        Commands::Collect(args) => taxatree::cli::commands::collect::run(args, config),
        Commands::Render(args) => taxatree::cli::commands::render::run(args, config),
        Commands::Run(args) => taxatree::cli::commands::run::run(args, config),
        Commands::Inspect(args) => taxatree::cli::commands::inspect::run(args, config),
        Commands::ClearCache(args) => taxatree::cli::commands::cache::run(args, config),
        Commands::Config(args) => taxatree::cli::commands::config::run(args, config),
        Commands::Interactive(args) => taxatree::cli::commands::interactive::run(args, config),
    }
}
