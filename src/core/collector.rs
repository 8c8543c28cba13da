/// Collects the distinct taxon ids a user has observed
use crate::core::retry::RetryPolicy;
use crate::core::source::{ObservationQuery, ObservationSource};
use crate::TaxaTreeError;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Distinct observed taxon ids, the seeds of tree resolution
pub type LeafIdSet = BTreeSet<u32>;

pub struct LeafCollector<'a> {
    source: &'a dyn ObservationSource,
    retry: RetryPolicy,
}

impl<'a> LeafCollector<'a> {
    pub fn new(source: &'a dyn ObservationSource, retry: RetryPolicy) -> Self {
        Self { source, retry }
    }

    /// Page through every observation matching `query`.
    ///
    /// Page size and total come from the first response. Any page that cannot
    /// be fetched fails the whole collection: a partial leaf set would quietly
    /// produce a partial tree.
    pub fn collect<F>(&self, query: &ObservationQuery, mut on_page: F) -> crate::Result<LeafIdSet>
    where
        F: FnMut(u32, u32),
    {
        let first = self.fetch_page(query, 1)?;
        let total_pages = page_count(first.total_results, first.per_page)?;
        info!(
            "User {} has {} observations over {} pages",
            query.user_login, first.total_results, total_pages
        );

        let mut leaves = LeafIdSet::new();
        let mut unidentified = 0usize;
        let mut absorb = |ids: Vec<Option<u32>>| {
            for id in ids {
                match id {
                    Some(id) => {
                        leaves.insert(id);
                    }
                    None => unidentified += 1,
                }
            }
        };

        absorb(first.taxon_ids);
        on_page(1, total_pages.max(1));

        for page in 2..=total_pages {
            let response = self.fetch_page(query, page)?;
            debug!("Page {} carried {} observations", page, response.taxon_ids.len());
            absorb(response.taxon_ids);
            on_page(page, total_pages);
        }

        if unidentified > 0 {
            warn!("Skipped {} observations without an identified taxon", unidentified);
        }
        info!("Collected {} distinct taxa", leaves.len());
        Ok(leaves)
    }

    fn fetch_page(
        &self,
        query: &ObservationQuery,
        page: u32,
    ) -> crate::Result<crate::core::source::ObservationPage> {
        let subject = format!("observations page {}", page);
        self.retry
            .run(&subject, || self.source.fetch_observations(query, page))
    }
}

fn page_count(total_results: u64, per_page: u64) -> crate::Result<u32> {
    if total_results == 0 {
        return Ok(0);
    }
    if per_page == 0 {
        return Err(TaxaTreeError::Malformed {
            subject: "observations".to_string(),
            reason: format!("{} results reported with a page size of 0", total_results),
        });
    }
    u32::try_from(total_results.div_ceil(per_page)).map_err(|_| TaxaTreeError::Malformed {
        subject: "observations".to_string(),
        reason: format!("page count overflow for {} results", total_results),
    })
}
