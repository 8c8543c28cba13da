/// iNaturalist v1 API client
use crate::bio::taxonomy::TaxonRecord;
use crate::core::config::ApiConfig;
use crate::core::source::{
    FetchError, ObservationPage, ObservationQuery, ObservationSource, PhotoSource, TaxonSource,
};
use crate::TaxaTreeError;
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Blocking client shared by every stage; configured once and passed around
pub struct INatClient {
    client: Client,
    base_url: Url,
    locale: String,
}

#[derive(Debug, Deserialize)]
struct TaxaResponse {
    #[serde(default)]
    results: Vec<RawTaxon>,
}

#[derive(Debug, Deserialize)]
struct RawTaxon {
    id: Option<u32>,
    name: Option<String>,
    preferred_common_name: Option<String>,
    parent_id: Option<u32>,
    rank_level: Option<f64>,
    default_photo: Option<RawPhoto>,
}

#[derive(Debug, Deserialize)]
struct RawPhoto {
    square_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ObservationsResponse {
    total_results: Option<u64>,
    per_page: Option<u64>,
    #[serde(default)]
    results: Vec<RawObservation>,
}

#[derive(Debug, Deserialize)]
struct RawObservation {
    taxon: Option<RawTaxonRef>,
}

#[derive(Debug, Deserialize)]
struct RawTaxonRef {
    id: u32,
}

impl RawTaxon {
    fn into_record(self, requested: u32) -> Result<TaxonRecord, FetchError> {
        let missing = |field: &str| FetchError::Malformed(format!("taxon {} has no {}", requested, field));

        Ok(TaxonRecord {
            id: self.id.ok_or_else(|| missing("id"))?,
            name: self.name.ok_or_else(|| missing("name"))?,
            preferred_common_name: self.preferred_common_name,
            parent_id: self.parent_id,
            rank_level: self.rank_level.ok_or_else(|| missing("rank_level"))?,
            default_photo_url: self.default_photo.and_then(|photo| photo.square_url),
        })
    }
}

impl INatClient {
    /// Create a client for `api.base_url`
    pub fn new(api: &ApiConfig) -> crate::Result<Self> {
        let mut base = api.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)
            .map_err(|e| TaxaTreeError::Config(format!("api.base_url '{}': {}", api.base_url, e)))?;

        let client = Client::builder()
            .user_agent(api.user_agent.clone())
            .timeout(Duration::from_secs(api.timeout_secs))
            .connect_timeout(Duration::from_secs(api.connect_timeout_secs))
            .build()
            .map_err(|e| TaxaTreeError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            locale: api.locale.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(path)
            .map_err(|e| FetchError::Malformed(format!("bad endpoint '{}': {}", path, e)))
    }

    fn send(&self, url: Url) -> Result<Response, FetchError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .map_err(|e| classify_transport(&e))?;
        check_status(response, url.as_str())
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, FetchError> {
        let response = self.send(url)?;
        let body = response.text().map_err(|e| classify_transport(&e))?;
        serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))
    }
}

impl TaxonSource for INatClient {
    fn fetch_taxon(&self, taxon_id: u32) -> Result<TaxonRecord, FetchError> {
        let mut url = self.endpoint(&format!("taxa/{}", taxon_id))?;
        url.query_pairs_mut().append_pair("locale", &self.locale);

        let response: TaxaResponse = self.get_json(url)?;
        response
            .results
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::Malformed(format!("no results for taxon {}", taxon_id)))?
            .into_record(taxon_id)
    }
}

impl ObservationSource for INatClient {
    fn fetch_observations(
        &self,
        query: &ObservationQuery,
        page: u32,
    ) -> Result<ObservationPage, FetchError> {
        let mut url = self.endpoint("observations")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("user_login", &query.user_login);
            if let Some(taxon_id) = query.taxon_id {
                pairs.append_pair("taxon_id", &taxon_id.to_string());
            }
            pairs.append_pair("page", &page.to_string());
            pairs.append_pair("locale", &self.locale);
        }

        let response: ObservationsResponse = self.get_json(url)?;
        Ok(ObservationPage {
            total_results: response.total_results.ok_or_else(|| {
                FetchError::Malformed("observations response has no total_results".to_string())
            })?,
            per_page: response.per_page.ok_or_else(|| {
                FetchError::Malformed("observations response has no per_page".to_string())
            })?,
            taxon_ids: response
                .results
                .into_iter()
                .map(|obs| obs.taxon.map(|taxon| taxon.id))
                .collect(),
        })
    }
}

impl PhotoSource for INatClient {
    fn fetch_photo(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let parsed = Url::parse(url)
            .map_err(|e| FetchError::Malformed(format!("photo url '{}': {}", url, e)))?;
        let response = self.send(parsed)?;
        let bytes = response.bytes().map_err(|e| classify_transport(&e))?;
        Ok(bytes.to_vec())
    }
}

fn classify_transport(err: &reqwest::Error) -> FetchError {
    if err.is_decode() {
        FetchError::Malformed(err.to_string())
    } else {
        FetchError::Transient(err.to_string())
    }
}

fn check_status(response: Response, url: &str) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Err(FetchError::RateLimited)
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        Err(FetchError::Transient(format!("HTTP {} from {}", status.as_u16(), url)))
    } else {
        Err(FetchError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}
