use crate::core::registry::NodeRegistry;
use crate::download::photos::PhotoCache;
use anyhow::Result;
use chrono::Utc;

pub mod dot;
pub mod drawio;
pub mod text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagramFormat {
    Dot,
    Drawio,
}

impl DiagramFormat {
    pub fn name(&self) -> &'static str {
        match self {
            DiagramFormat::Dot => "Graphviz DOT",
            DiagramFormat::Drawio => "draw.io",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    /// Re-root the tree at this taxon before drawing
    pub root: Option<u32>,
    /// Where species photos are looked up
    pub photos: Option<PhotoCache>,
}

pub struct ReportGenerator {
    options: ReportOptions,
}

impl ReportGenerator {
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    /// The registry as it will be drawn
    pub fn prepare(&self, registry: &NodeRegistry) -> NodeRegistry {
        match self.options.root {
            Some(root) => registry.reroot(root),
            None => registry.clone(),
        }
    }

    pub fn generate(&self, registry: &NodeRegistry, format: DiagramFormat) -> Result<String> {
        let registry = self.prepare(registry);
        let photos = self.options.photos.as_ref();
        match format {
            DiagramFormat::Dot => Ok(dot::generate_dot(&registry, photos)),
            DiagramFormat::Drawio => drawio::generate_drawio(&registry, photos, Utc::now()),
        }
    }
}
