pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "taxatree",
    version,
    about = "Build a taxonomic tree from iNaturalist observations",
    long_about = "taxatree collects the taxa a user has observed on iNaturalist, resolves each one's \
                  ancestors up to a common root, and draws the resulting tree as a Graphviz or \
                  draw.io diagram."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (can be repeated)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (default: ~/.taxatree/config.toml)
    #[arg(short, long, value_name = "FILE", global = true, env = "TAXATREE_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect observations and resolve them into a node file
    Collect(commands::collect::CollectArgs),

    /// Draw the node file as DOT and draw.io diagrams
    Render(commands::render::RenderArgs),

    /// Collect, then render
    Run(commands::run::RunArgs),

    /// Summarize a node file
    Inspect(commands::inspect::InspectArgs),

    /// Delete cached species photos
    ClearCache(commands::cache::ClearCacheArgs),

    /// Show or create the configuration file
    Config(commands::config::ConfigArgs),

    /// Menu-driven mode
    Interactive(commands::interactive::InteractiveArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_collect() {
        let cli = Cli::parse_from([
            "taxatree", "-vv", "--config", "alt.toml", "collect", "--user", "merrcurys", "--taxon", "3",
            "--jobs", "4",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("alt.toml")));
        match cli.command {
            Commands::Collect(args) => {
                assert_eq!(args.user.as_deref(), Some("merrcurys"));
                assert_eq!(args.taxon, Some(3));
                assert_eq!(args.jobs, Some(4));
            }
            _ => panic!("Expected collect"),
        }
    }

    #[test]
    fn test_parse_render_root() {
        let cli = Cli::parse_from(["taxatree", "render", "--root", "7", "--format", "dot"]);
        match cli.command {
            Commands::Render(args) => {
                assert_eq!(args.root, Some(7));
                assert_eq!(args.format, commands::render::FormatArg::Dot);
            }
            _ => panic!("Expected render"),
        }
    }

    #[test]
    fn test_parse_inspect_common_ancestor() {
        let cli = Cli::parse_from([
            "taxatree", "inspect", "--common-ancestor", "12716", "144815", "--report", "summary.txt",
        ]);
        match cli.command {
            Commands::Inspect(args) => {
                assert_eq!(args.common_ancestor, Some(vec![12716, 144815]));
                assert_eq!(args.report, Some(PathBuf::from("summary.txt")));
            }
            _ => panic!("Expected inspect"),
        }
    }
}
