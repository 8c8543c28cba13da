pub mod bio;
pub mod cli;
pub mod core;
pub mod download;
pub mod report;
pub mod storage;

pub use crate::bio::taxonomy::{TaxonNode, TaxonRecord};
pub use crate::core::registry::NodeRegistry;
pub use crate::core::resolver::AncestorResolver;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaxaTreeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed response for {subject}: {reason}")]
    Malformed { subject: String, reason: String },

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("Tree invariant violated: {0}")]
    Invariant(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TaxaTreeError>;

impl From<serde_json::Error> for TaxaTreeError {
    fn from(err: serde_json::Error) -> Self {
        TaxaTreeError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for TaxaTreeError {
    fn from(err: bincode::Error) -> Self {
        TaxaTreeError::Serialization(err.to_string())
    }
}
