use crate::cli::output;
use crate::core::config::{default_config, load_or_default, save_config};
use crate::core::paths;
use clap::{Args, Subcommand};
use std::path::Path;

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Print the effective configuration as TOML
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the directories taxatree uses
    Paths,
}

pub fn run(args: ConfigArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = load_or_default(config_path)?;
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigCommand::Init { force } => {
            let path = config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(paths::config_path);
            if path.exists() && !force {
                output::warning(&format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                ));
                return Ok(());
            }
            save_config(&path, &default_config())?;
            output::success(&format!("Wrote default configuration to {}", path.display()));
        }
        ConfigCommand::Paths => println!("{}", paths::describe_paths()),
    }
    Ok(())
}
