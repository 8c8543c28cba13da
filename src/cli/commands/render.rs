use crate::cli::output;
use crate::core::config::Config;
use crate::download::PhotoCache;
use crate::report::{dot, DiagramFormat, ReportGenerator, ReportOptions};
use crate::storage::nodes::load_nodes;
use anyhow::Context;
use clap::{Args, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum FormatArg {
    Dot,
    Drawio,
    #[default]
    Both,
}

impl FormatArg {
    fn formats(self) -> Vec<DiagramFormat> {
        match self {
            FormatArg::Dot => vec![DiagramFormat::Dot],
            FormatArg::Drawio => vec![DiagramFormat::Drawio],
            FormatArg::Both => vec![DiagramFormat::Dot, DiagramFormat::Drawio],
        }
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct RenderArgs {
    /// Node file written by `collect`
    #[arg(short, long, value_name = "FILE", env = "TAXATREE_NODES_FILE")]
    pub input: Option<PathBuf>,

    /// Diagram format(s) to write
    #[arg(short, long, value_enum, default_value_t = FormatArg::Both)]
    pub format: FormatArg,

    /// Draw only the subtree under this taxon
    #[arg(long)]
    pub root: Option<u32>,

    /// DOT output path
    #[arg(long, value_name = "FILE")]
    pub dot_output: Option<PathBuf>,

    /// draw.io output path
    #[arg(long, value_name = "FILE")]
    pub drawio_output: Option<PathBuf>,

    /// Also lay out the DOT file to SVG with Graphviz `neato`
    #[arg(long)]
    pub svg: bool,
}

impl RenderArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(input) = &self.input {
            config.output.nodes_file = Some(input.clone());
        }
        if let Some(path) = &self.dot_output {
            config.output.dot_file = path.clone();
        }
        if let Some(path) = &self.drawio_output {
            config.output.drawio_file = path.clone();
        }
    }
}

pub fn run(args: RenderArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    args.apply(&mut config);

    for path in render(&config, &args)? {
        output::success(&format!("Wrote {}", path.display()));
    }
    Ok(())
}

/// Render every requested format; returns the files written
pub fn render(config: &Config, args: &RenderArgs) -> anyhow::Result<Vec<PathBuf>> {
    let nodes_file = config.nodes_file();
    let registry = load_nodes(&nodes_file)?;
    info!("Loaded {} nodes from {}", registry.len(), nodes_file.display());

    let generator = ReportGenerator::new(ReportOptions {
        root: args.root,
        photos: Some(PhotoCache::new(config.photos_dir())),
    });

    let mut written = Vec::new();
    for format in args.format.formats() {
        let path = match format {
            DiagramFormat::Dot => &config.output.dot_file,
            DiagramFormat::Drawio => &config.output.drawio_file,
        };
        let contents = generator.generate(&registry, format)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)
            .with_context(|| format!("Writing {} diagram to {}", format.name(), path.display()))?;
        written.push(path.clone());

        if format == DiagramFormat::Dot && args.svg {
            written.push(dot::render_svg(path)?);
        }
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bio::taxonomy::TaxonNode;
    use crate::core::registry::NodeRegistry;
    use crate::storage::nodes::save_nodes;
    use crate::TaxaTreeError;
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::default();
        config.output.nodes_file = Some(dir.join("nodes.json"));
        config.output.photos_dir = Some(dir.join("photos"));
        config.output.dot_file = dir.join("out").join("tree.gv");
        config.output.drawio_file = dir.join("out").join("tree.drawio");
        config
    }

    #[test]
    fn test_render_writes_both_diagrams() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let registry = NodeRegistry::from_nodes(vec![
            TaxonNode::new(3, "Aves", None, false),
            TaxonNode::new(12716, "Parus major", Some(3), true),
        ])
        .unwrap();
        save_nodes(config.nodes_file(), &registry).unwrap();

        let written = render(&config, &RenderArgs::default()).unwrap();
        assert_eq!(written, vec![config.output.dot_file.clone(), config.output.drawio_file.clone()]);

        let dot = std::fs::read_to_string(&config.output.dot_file).unwrap();
        assert!(dot.contains("\"3\" -> \"12716\""));
        let drawio = std::fs::read_to_string(&config.output.drawio_file).unwrap();
        assert!(drawio.contains("source=\"node_3\" target=\"node_12716\""));
    }

    #[test]
    fn test_render_without_node_file() {
        let dir = TempDir::new().unwrap();
        let err = render(&config_in(dir.path()), &RenderArgs::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TaxaTreeError>(),
            Some(TaxaTreeError::NotFound(_))
        ));
    }
}
