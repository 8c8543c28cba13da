//! Shared fakes for the integration tests
#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashMap;
use taxatree::core::source::{
    FetchError, ObservationPage, ObservationQuery, ObservationSource, TaxonSource,
};
use taxatree::TaxonRecord;

/// In-memory catalog that counts every lookup and can fail on demand
pub struct FakeCatalog {
    records: HashMap<u32, TaxonRecord>,
    scripted: Mutex<HashMap<u32, Vec<FetchError>>>,
    fetches: Mutex<Vec<u32>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            scripted: Mutex::new(HashMap::new()),
            fetches: Mutex::new(Vec::new()),
        }
    }

    pub fn taxon(mut self, id: u32, name: &str, parent: Option<u32>, rank_level: f64) -> Self {
        self.records.insert(
            id,
            TaxonRecord {
                id,
                name: name.to_string(),
                preferred_common_name: None,
                parent_id: parent,
                rank_level,
                default_photo_url: (rank_level <= 10.0)
                    .then(|| format!("https://static.inaturalist.test/photos/{}/square.jpg", id)),
            },
        );
        self
    }

    /// Fail the next lookups of `id` with `errors`, in order
    pub fn failing(self, id: u32, errors: Vec<FetchError>) -> Self {
        self.scripted.lock().insert(id, errors);
        self
    }

    pub fn fetch_count(&self, id: u32) -> usize {
        self.fetches.lock().iter().filter(|fetched| **fetched == id).count()
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().len()
    }
}

impl TaxonSource for FakeCatalog {
    fn fetch_taxon(&self, taxon_id: u32) -> Result<TaxonRecord, FetchError> {
        self.fetches.lock().push(taxon_id);

        if let Some(errors) = self.scripted.lock().get_mut(&taxon_id) {
            if !errors.is_empty() {
                return Err(errors.remove(0));
            }
        }

        self.records.get(&taxon_id).cloned().ok_or(FetchError::Status {
            status: 404,
            url: format!("https://api.inaturalist.test/v1/taxa/{}", taxon_id),
        })
    }
}

/// Life (48460) > Animalia (1) > Chordata (2) > Aves (3) > two families > species
pub fn bird_catalog() -> FakeCatalog {
    FakeCatalog::new()
        .taxon(48460, "Life", None, 100.0)
        .taxon(1, "Animalia", Some(48460), 70.0)
        .taxon(2, "Chordata", Some(1), 60.0)
        .taxon(3, "Aves", Some(2), 50.0)
        .taxon(7251, "Passeriformes", Some(3), 40.0)
        .taxon(13685, "Paridae", Some(7251), 30.0)
        .taxon(12716, "Parus major", Some(13685), 10.0)
        .taxon(144815, "Cyanistes caeruleus", Some(13685), 10.0)
        .taxon(7823, "Corvidae", Some(7251), 30.0)
        .taxon(8021, "Corvus corax", Some(7823), 10.0)
        .taxon(204496, "Corvus corax varius", Some(8021), 5.0)
}

/// Observation listing served from a fixed list of taxon ids
pub struct FakeObservations {
    pub per_page: u64,
    pub taxa: Vec<Option<u32>>,
    pub requested_pages: Mutex<Vec<u32>>,
}

impl FakeObservations {
    pub fn new(per_page: u64, taxa: Vec<Option<u32>>) -> Self {
        Self {
            per_page,
            taxa,
            requested_pages: Mutex::new(Vec::new()),
        }
    }
}

impl ObservationSource for FakeObservations {
    fn fetch_observations(
        &self,
        _query: &ObservationQuery,
        page: u32,
    ) -> Result<ObservationPage, FetchError> {
        self.requested_pages.lock().push(page);
        let start = (page as usize - 1) * self.per_page as usize;
        Ok(ObservationPage {
            total_results: self.taxa.len() as u64,
            per_page: self.per_page,
            taxon_ids: self
                .taxa
                .iter()
                .skip(start)
                .take(self.per_page as usize)
                .copied()
                .collect(),
        })
    }
}
