/// Taxon records as served by the catalog and the tree nodes built from them
use serde::{Deserialize, Serialize};

/// Rank level at or below which a taxon counts as a species (iNaturalist scale)
pub const SPECIES_RANK_LEVEL: f64 = 10.0;

/// A taxon as returned by the catalog lookup.
///
/// Only the fields needed to build a [`TaxonNode`] (and fetch its photo) are
/// kept. `rank_level` is fractional in the catalog (e.g. 33.5 for epifamily).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonRecord {
    pub id: u32,
    pub name: String,
    pub preferred_common_name: Option<String>,
    pub parent_id: Option<u32>,
    pub rank_level: f64,
    pub default_photo_url: Option<String>,
}

impl TaxonRecord {
    /// Localized common name when present, scientific name otherwise
    pub fn display_name(&self) -> &str {
        match self.preferred_common_name.as_deref() {
            Some(common) if !common.trim().is_empty() => common,
            _ => &self.name,
        }
    }

    pub fn is_species(&self, threshold: f64) -> bool {
        self.rank_level <= threshold
    }
}

/// One node of the resolved tree, keyed by `id` in the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonNode {
    pub id: u32,
    pub name: String,
    pub parent_id: Option<u32>,
    pub is_species: bool,
}

impl TaxonNode {
    pub fn new(id: u32, name: impl Into<String>, parent_id: Option<u32>, is_species: bool) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id,
            is_species,
        }
    }

    /// Build a node from a catalog record.
    ///
    /// The parent link is cut when the record has none or when the record is
    /// the configured root taxon, so both ways of reaching the top of the tree
    /// end in `parent_id == None`.
    pub fn from_record(record: &TaxonRecord, species_threshold: f64, root_id: Option<u32>) -> Self {
        let parent_id = if root_id == Some(record.id) {
            None
        } else {
            record.parent_id
        };

        Self {
            id: record.id,
            name: record.display_name().to_string(),
            parent_id,
            is_species: record.is_species(species_threshold),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}
