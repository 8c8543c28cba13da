/// Collaborator seams between the tree builder and the remote catalog
use crate::bio::taxonomy::TaxonRecord;
use thiserror::Error;

/// Classified failure of a single remote fetch.
///
/// The classification drives the retry policy: rate limits are waited out,
/// transient failures are retried a bounded number of times, everything else
/// fails the request immediately.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("rate limited by remote service")]
    RateLimited,

    #[error("transient network failure: {0}")]
    Transient(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
}

/// Observation listing filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservationQuery {
    pub user_login: String,
    pub taxon_id: Option<u32>,
}

/// One page of the observation listing, reduced to what the collector needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObservationPage {
    pub total_results: u64,
    pub per_page: u64,
    /// Taxon id per observation; `None` for observations nobody identified yet
    pub taxon_ids: Vec<Option<u32>>,
}

/// Fetch a taxon record by id
pub trait TaxonSource: Send + Sync {
    fn fetch_taxon(&self, taxon_id: u32) -> Result<TaxonRecord, FetchError>;
}

/// Fetch one page (1-based) of a user's observations
pub trait ObservationSource {
    fn fetch_observations(
        &self,
        query: &ObservationQuery,
        page: u32,
    ) -> Result<ObservationPage, FetchError>;
}

/// Fetch raw photo bytes
pub trait PhotoSource: Send + Sync {
    fn fetch_photo(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Side channel the resolver notifies for species nodes that carry a photo.
///
/// Returns `Ok(true)` when a photo was downloaded and `Ok(false)` on a cache hit.
pub trait PhotoSink: Send + Sync {
    fn ensure_photo(&self, taxon_id: u32, url: &str) -> crate::Result<bool>;
}

impl From<FetchError> for crate::TaxaTreeError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::RateLimited => {
                crate::TaxaTreeError::Network("rate limited by remote service".to_string())
            }
            FetchError::Transient(reason) => crate::TaxaTreeError::Network(reason),
            FetchError::Malformed(reason) => crate::TaxaTreeError::Malformed {
                subject: "response".to_string(),
                reason,
            },
            FetchError::Status { status, url } => crate::TaxaTreeError::Http { status, url },
        }
    }
}
