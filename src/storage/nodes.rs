/// Persistence of the resolved node set between the collect and render stages
use crate::bio::taxonomy::TaxonNode;
use crate::core::registry::NodeRegistry;
use crate::TaxaTreeError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeFileFormat {
    Json,
    Bincode,
}

impl NodeFileFormat {
    /// `.bin`/`.bincode` select bincode, anything else is JSON
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("bin") | Some("bincode") => NodeFileFormat::Bincode,
            _ => NodeFileFormat::Json,
        }
    }
}

/// A loaded node file
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSet {
    pub created_at: DateTime<Utc>,
    pub root_id: Option<u32>,
    pub registry: NodeRegistry,
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeSetFile {
    format_version: u32,
    created_at: DateTime<Utc>,
    root_id: Option<u32>,
    nodes: Vec<TaxonNode>,
}

/// Write `registry` to `path`, replacing any previous file only once the new
/// one is completely written.
pub fn save_nodes<P: AsRef<Path>>(path: P, registry: &NodeRegistry) -> Result<(), TaxaTreeError> {
    let path = path.as_ref();
    let roots = registry.roots();
    let file = NodeSetFile {
        format_version: FORMAT_VERSION,
        created_at: Utc::now(),
        root_id: if roots.len() == 1 { roots.first().copied() } else { None },
        nodes: registry.entries().cloned().collect(),
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let partial = path.with_extension("partial");
    {
        let mut writer = BufWriter::new(File::create(&partial)?);
        match NodeFileFormat::from_path(path) {
            NodeFileFormat::Json => serde_json::to_writer_pretty(&mut writer, &file)?,
            NodeFileFormat::Bincode => bincode::serialize_into(&mut writer, &file)?,
        }
        writer.flush()?;
    }
    std::fs::rename(&partial, path)?;
    Ok(())
}

pub fn load_node_set<P: AsRef<Path>>(path: P) -> Result<NodeSet, TaxaTreeError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(TaxaTreeError::NotFound(format!(
            "node file {} (run `taxatree collect` first)",
            path.display()
        )));
    }

    let reader = BufReader::new(File::open(path)?);
    let file: NodeSetFile = match NodeFileFormat::from_path(path) {
        NodeFileFormat::Json => serde_json::from_reader(reader)?,
        NodeFileFormat::Bincode => bincode::deserialize_from(reader)?,
    };

    if file.format_version != FORMAT_VERSION {
        return Err(TaxaTreeError::Serialization(format!(
            "unsupported node file version {} in {}",
            file.format_version,
            path.display()
        )));
    }

    Ok(NodeSet {
        created_at: file.created_at,
        root_id: file.root_id,
        registry: NodeRegistry::from_nodes(file.nodes)?,
    })
}

pub fn load_nodes<P: AsRef<Path>>(path: P) -> Result<NodeRegistry, TaxaTreeError> {
    Ok(load_node_set(path)?.registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn registry() -> NodeRegistry {
        NodeRegistry::from_nodes(vec![
            TaxonNode::new(12716, "Большая синица", Some(12715), true),
            TaxonNode::new(12715, "Синицы", Some(3), false),
            TaxonNode::new(3, "Птицы", None, false),
        ])
        .unwrap()
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(NodeFileFormat::from_path(Path::new("nodes.json")), NodeFileFormat::Json);
        assert_eq!(NodeFileFormat::from_path(Path::new("nodes.BIN")), NodeFileFormat::Bincode);
        assert_eq!(NodeFileFormat::from_path(Path::new("nodes.bincode")), NodeFileFormat::Bincode);
        assert_eq!(NodeFileFormat::from_path(Path::new("nodes")), NodeFileFormat::Json);
    }

    #[test]
    fn test_json_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("nodes.json");

        save_nodes(&path, &registry()).unwrap();
        let loaded = load_node_set(&path).unwrap();

        assert_eq!(loaded.registry, registry());
        assert_eq!(loaded.registry.ids(), vec![12716, 12715, 3]);
        assert_eq!(loaded.root_id, Some(3));
        assert!(!path.with_extension("partial").exists());
    }

    #[test]
    fn test_bincode_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nodes.bin");

        save_nodes(&path, &registry()).unwrap();
        assert_eq!(load_nodes(&path).unwrap(), registry());
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = load_nodes(dir.path().join("nodes.json"));
        assert!(matches!(result, Err(TaxaTreeError::NotFound(_))));
    }

    #[test]
    fn test_rejects_duplicate_nodes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nodes.json");
        std::fs::write(
            &path,
            r#"{"format_version":1,"created_at":"2024-05-01T10:00:00Z","root_id":3,
               "nodes":[{"id":3,"name":"Aves","parent_id":null,"is_species":false},
                        {"id":3,"name":"Aves","parent_id":null,"is_species":false}]}"#,
        )
        .unwrap();

        assert!(matches!(load_nodes(&path), Err(TaxaTreeError::Invariant(_))));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nodes.json");
        std::fs::write(
            &path,
            r#"{"format_version":9,"created_at":"2024-05-01T10:00:00Z","root_id":null,"nodes":[]}"#,
        )
        .unwrap();

        assert!(matches!(load_nodes(&path), Err(TaxaTreeError::Serialization(_))));
    }
}
