use crate::cli::output::{self, create_standard_table, header_cell};
use crate::core::registry::NodeRegistry;
use crate::report::text::{ascii_tree, generate_text_report, TreeSummary};
use crate::storage::nodes::load_node_set;
use anyhow::Context;
use clap::Args;
use comfy_table::Cell;
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// Node file to inspect
    #[arg(short, long, value_name = "FILE", env = "TAXATREE_NODES_FILE")]
    pub input: Option<PathBuf>,

    /// Print the whole tree
    #[arg(long)]
    pub tree: bool,

    /// Show the lineage of this taxon
    #[arg(long, value_name = "TAXON_ID")]
    pub lineage: Option<u32>,

    /// Show the closest taxon shared by two taxa
    #[arg(long, num_args = 2, value_names = ["TAXON_A", "TAXON_B"])]
    pub common_ancestor: Option<Vec<u32>>,

    /// Also write a plain text summary (with the tree when --tree is set)
    #[arg(long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Check the tree invariants and fail if any is violated
    #[arg(long)]
    pub validate: bool,
}

pub fn run(args: InspectArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let path = args.input.clone().unwrap_or_else(|| config.nodes_file());
    let node_set = load_node_set(&path)?;
    let registry = &node_set.registry;
    let summary = TreeSummary::of(registry);

    output::section_header(&format!("Node file {}", path.display()));
    let mut table = create_standard_table();
    table.set_header(vec![header_cell("Property"), header_cell("Value")]);
    table.add_row(vec![
        Cell::new("Created"),
        Cell::new(node_set.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
    ]);
    table.add_row(vec![Cell::new("Nodes"), Cell::new(summary.nodes)]);
    table.add_row(vec![Cell::new("Species"), Cell::new(summary.species)]);
    table.add_row(vec![Cell::new("Depth"), Cell::new(summary.depth)]);
    let roots = summary
        .roots
        .iter()
        .map(|id| match registry.get(*id) {
            Some(node) => format!("{} ({})", node.name, id),
            None => id.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ");
    table.add_row(vec![Cell::new("Root"), Cell::new(roots)]);
    println!("{}", table);

    if let Some(taxon) = args.lineage {
        let lineage = registry.lineage(taxon);
        if lineage.is_empty() {
            output::warning(&format!("Taxon {} is not in the tree", taxon));
        } else {
            output::section_header(&format!("Lineage of {}", taxon));
            for (i, id) in lineage.iter().enumerate() {
                let name = registry.get(*id).map(|node| node.name.as_str()).unwrap_or("?");
                output::tree_item(i + 1 == lineage.len(), &id.to_string(), Some(name));
            }
        }
    }

    if let Some([a, b]) = args.common_ancestor.as_deref() {
        let line = common_ancestor_line(registry, *a, *b);
        output::section_header(&format!("Common ancestor of {} and {}", a, b));
        output::info(&line);
    }

    if args.tree {
        output::section_header("Tree");
        print!("{}", ascii_tree(registry));
    }

    if let Some(report) = &args.report {
        write_report(registry, report, args.tree)?;
        output::success(&format!("Summary written to {}", report.display()));
    }

    if args.validate {
        let root = registry.validate(node_set.root_id)?;
        output::success(&format!("Tree is consistent, rooted at {}", root));
    }

    Ok(())
}

fn common_ancestor_line(registry: &NodeRegistry, a: u32, b: u32) -> String {
    match registry.common_ancestor(a, b) {
        Some(id) => {
            let name = registry.get(id).map(|node| node.name.as_str()).unwrap_or("?");
            format!("{} ({})", name, id)
        }
        None if !registry.contains(a) || !registry.contains(b) => {
            "At least one of the taxa is not in the tree".to_string()
        }
        None => "The taxa are in separate trees".to_string(),
    }
}

fn write_report(registry: &NodeRegistry, path: &Path, include_tree: bool) -> anyhow::Result<()> {
    let report = generate_text_report(registry, include_tree)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Creating {}", parent.display()))?;
    }
    std::fs::write(path, report).with_context(|| format!("Writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bio::taxonomy::TaxonNode;
    use tempfile::TempDir;

    fn registry() -> NodeRegistry {
        NodeRegistry::from_nodes(vec![
            TaxonNode::new(3, "Aves", None, false),
            TaxonNode::new(13685, "Paridae", Some(3), false),
            TaxonNode::new(12716, "Parus major", Some(13685), true),
            TaxonNode::new(144815, "Cyanistes caeruleus", Some(13685), true),
            TaxonNode::new(8021, "Corvus corax", Some(3), true),
        ])
        .unwrap()
    }

    #[test]
    fn test_common_ancestor_line() {
        let registry = registry();
        assert_eq!(common_ancestor_line(&registry, 12716, 144815), "Paridae (13685)");
        assert_eq!(common_ancestor_line(&registry, 12716, 8021), "Aves (3)");
        assert_eq!(
            common_ancestor_line(&registry, 12716, 999),
            "At least one of the taxa is not in the tree"
        );
    }

    #[test]
    fn test_write_report_with_tree() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reports").join("summary.txt");

        write_report(&registry(), &path, true).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("- Species:      3"));
        assert!(text.contains("└─ Corvus corax"));
    }
}
