use super::collect::{self, CollectArgs};
use super::render::{self, RenderArgs};
use crate::cli::output;
use clap::Args;
use std::path::Path;

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub collect: CollectArgs,

    /// Draw only the subtree under this taxon
    #[arg(long)]
    pub render_root: Option<u32>,

    /// Also lay out the DOT file to SVG with Graphviz `neato`
    #[arg(long)]
    pub svg: bool,
}

pub fn run(args: RunArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    args.collect.apply(&mut config);

    output::action("Collecting observations");
    let summary = collect::collect(&config)?;
    output::success(&format!(
        "Collected {} taxa into {} ({} nodes)",
        summary.leaves,
        summary.nodes_file.display(),
        summary.nodes
    ));

    output::action("Rendering diagrams");
    let render_args = RenderArgs {
        root: args.render_root,
        svg: args.svg,
        ..RenderArgs::default()
    };
    for path in render::render(&config, &render_args)? {
        output::success(&format!("Wrote {}", path.display()));
    }
    Ok(())
}
