use crate::core::registry::NodeRegistry;
use anyhow::Result;
use std::fmt::Write;

/// Node counts and root of a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeSummary {
    pub nodes: usize,
    pub species: usize,
    pub roots: Vec<u32>,
    pub depth: usize,
}

impl TreeSummary {
    pub fn of(registry: &NodeRegistry) -> Self {
        Self {
            nodes: registry.len(),
            species: registry.species_count(),
            roots: registry.roots(),
            depth: registry.depth(),
        }
    }
}

pub fn generate_text_report(registry: &NodeRegistry, include_tree: bool) -> Result<String> {
    let summary = TreeSummary::of(registry);
    let mut output = String::new();

    writeln!(&mut output, "Taxonomic Tree")?;
    writeln!(&mut output, "==============")?;
    writeln!(&mut output, "- Nodes:   {:6}", summary.nodes)?;
    writeln!(&mut output, "- Species: {:6}", summary.species)?;
    writeln!(&mut output, "- Depth:   {:6}", summary.depth)?;
    match summary.roots.as_slice() {
        [root] => writeln!(&mut output, "- Root:    {}", describe(registry, *root))?,
        [] => writeln!(&mut output, "- Root:    none")?,
        roots => writeln!(&mut output, "- Roots:   {:?} (not a single tree)", roots)?,
    }

    if include_tree {
        writeln!(&mut output)?;
        output.push_str(&ascii_tree(registry));
    }

    Ok(output)
}

/// Indented tree under every root, children in insertion order.
pub fn ascii_tree(registry: &NodeRegistry) -> String {
    let mut output = String::new();

    for root in registry.roots() {
        output.push_str(&describe(registry, root));
        output.push('\n');

        // (id, prefix for its children, is_last)
        let children = registry.children(root);
        let mut stack: Vec<(u32, String, bool)> = children
            .iter()
            .enumerate()
            .rev()
            .map(|(i, id)| (*id, String::new(), i + 1 == children.len()))
            .collect();

        while let Some((id, prefix, is_last)) = stack.pop() {
            let branch = if is_last { "└─ " } else { "├─ " };
            output.push_str(&prefix);
            output.push_str(branch);
            output.push_str(&describe(registry, id));
            output.push('\n');

            let child_prefix = format!("{}{}", prefix, if is_last { "   " } else { "│  " });
            let children = registry.children(id);
            let count = children.len();
            for (i, child) in children.into_iter().enumerate().rev() {
                stack.push((child, child_prefix.clone(), i + 1 == count));
            }
        }
    }

    output
}

fn describe(registry: &NodeRegistry, id: u32) -> String {
    match registry.get(id) {
        Some(node) if node.is_species => format!("{} [{}] *", node.name, node.id),
        Some(node) => format!("{} [{}]", node.name, node.id),
        None => format!("[{}]", id),
    }
}
