pub mod taxonomy;

pub use taxonomy::{TaxonNode, TaxonRecord, SPECIES_RANK_LEVEL};
