/// Graphviz DOT output laid out by `neato`
use crate::core::registry::NodeRegistry;
use crate::download::photos::PhotoCache;
use anyhow::{Context, Result};
use std::fmt::Write;
use std::path::Path;
use std::process::Command;

const SPECIES_NODE_SIZE: &str = "1.3";

pub fn generate_dot(registry: &NodeRegistry, photos: Option<&PhotoCache>) -> String {
    let mut output = String::new();

    // Writing into a String cannot fail
    let _ = write_dot(&mut output, registry, photos);
    output
}

fn write_dot(
    output: &mut String,
    registry: &NodeRegistry,
    photos: Option<&PhotoCache>,
) -> std::fmt::Result {
    writeln!(output, "// Taxonomic Tree")?;
    writeln!(output, "digraph {{")?;
    writeln!(output, "    layout=neato")?;
    writeln!(output, "    overlap=false splines=true sep=\"+20\" damping=3")?;
    writeln!(output, "    node [shape=rect]")?;

    for node in registry.entries() {
        let label = escape(&node_label(&node.name));
        let photo = if node.is_species {
            photos.and_then(|cache| cache.get(node.id))
        } else {
            None
        };

        match photo {
            Some(path) => writeln!(
                output,
                "    \"{}\" [label=\"{}\" image=\"{}\" imagepos=mc width={} height={} fixedsize=true fontcolor=white]",
                node.id,
                label,
                escape(&path.display().to_string()),
                SPECIES_NODE_SIZE,
                SPECIES_NODE_SIZE
            )?,
            None => writeln!(output, "    \"{}\" [label=\"{}\"]", node.id, label)?,
        }
    }

    for node in registry.entries() {
        if let Some(parent) = node.parent_id.filter(|parent| registry.contains(*parent)) {
            writeln!(output, "    \"{}\" -> \"{}\"", parent, node.id)?;
        }
    }

    writeln!(output, "}}")
}

/// One word per line
fn node_label(name: &str) -> String {
    name.replace(['-', ' '], "\n")
}

fn escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

/// Lay out `dot_path` with Graphviz `neato` into an SVG next to it
pub fn render_svg(dot_path: &Path) -> Result<std::path::PathBuf> {
    let svg_path = dot_path.with_extension("svg");
    let output = Command::new("neato")
        .arg("-Tsvg")
        .arg(dot_path)
        .arg("-o")
        .arg(&svg_path)
        .output()
        .context("Failed to run neato (is Graphviz installed?)")?;

    if !output.status.success() {
        anyhow::bail!(
            "neato exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(svg_path)
}
