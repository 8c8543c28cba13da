/// Ancestor chain resolution against the remote catalog
use crate::bio::taxonomy::{TaxonNode, SPECIES_RANK_LEVEL};
use crate::core::registry::{NodeRegistry, SharedRegistry};
use crate::core::retry::RetryPolicy;
use crate::core::source::{PhotoSink, TaxonSource};
use crate::TaxaTreeError;
use rayon::prelude::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ResolverOptions {
    /// Rank level at or below which a node is a species
    pub species_threshold: f64,
    /// Taxon treated as the top of the tree even if the catalog lists a parent
    pub root_id: Option<u32>,
    pub retry: RetryPolicy,
    /// Pause after each leaf that required network work
    pub leaf_delay: Duration,
    /// Worker threads for `resolve_all`; 1 keeps resolution sequential
    pub jobs: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            species_threshold: SPECIES_RANK_LEVEL,
            root_id: None,
            retry: RetryPolicy::default(),
            leaf_delay: Duration::ZERO,
            jobs: 1,
        }
    }
}

/// Progress report handed to `resolve_all` callbacks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveProgress {
    pub done: usize,
    pub total: usize,
    pub leaf_id: u32,
    pub registered: usize,
}

/// Walks parent links from a leaf up to the root, registering every taxon it
/// has not seen before. Chains from different leaves merge at the first
/// ancestor already in the registry, so shared branches are fetched once.
pub struct AncestorResolver<'a> {
    source: &'a dyn TaxonSource,
    photos: Option<&'a dyn PhotoSink>,
    options: ResolverOptions,
}

impl<'a> AncestorResolver<'a> {
    pub fn new(source: &'a dyn TaxonSource, options: ResolverOptions) -> Self {
        Self {
            source,
            photos: None,
            options,
        }
    }

    pub fn with_photos(mut self, photos: &'a dyn PhotoSink) -> Self {
        self.photos = Some(photos);
        self
    }

    /// Resolve `leaf_id` and all of its missing ancestors into `registry`.
    ///
    /// Returns the number of nodes added. On error nothing is registered for
    /// the id that failed; ancestors registered before the failure stay.
    pub fn resolve(&self, leaf_id: u32, registry: &mut NodeRegistry) -> crate::Result<usize> {
        if registry.contains(leaf_id) {
            return Ok(0);
        }

        let mut pending = vec![leaf_id];
        let mut walked = HashSet::new();
        let mut added = 0;

        while let Some(id) = pending.pop() {
            if registry.contains(id) {
                continue;
            }
            walked.insert(id);

            let node = self.fetch_node(id)?;
            let parent = node.parent_id;
            registry.insert(node);
            added += 1;

            if let Some(parent) = parent {
                if walked.contains(&parent) {
                    return Err(cycle_error(leaf_id, parent));
                }
                if !registry.contains(parent) {
                    pending.push(parent);
                }
            }
        }

        debug!("Leaf {} added {} nodes", leaf_id, added);
        Ok(added)
    }

    /// Resolve every leaf into `registry`, sequentially or on a worker pool.
    ///
    /// Both modes produce the same nodes in the same order: the parallel
    /// result is reordered to the order a sequential pass would insert them.
    pub fn resolve_all<F>(
        &self,
        leaves: &[u32],
        registry: &mut NodeRegistry,
        on_progress: F,
    ) -> crate::Result<usize>
    where
        F: Fn(ResolveProgress) + Sync,
    {
        let before = registry.len();
        info!(
            "Resolving {} leaves ({} nodes already known, {} workers)",
            leaves.len(),
            before,
            self.options.jobs
        );

        if self.options.jobs > 1 && leaves.len() > 1 {
            self.resolve_parallel(leaves, registry, &on_progress)?;
        } else {
            for (i, &leaf) in leaves.iter().enumerate() {
                let added = self.resolve(leaf, registry)?;
                on_progress(ResolveProgress {
                    done: i + 1,
                    total: leaves.len(),
                    leaf_id: leaf,
                    registered: registry.len(),
                });
                if added > 0 && i + 1 < leaves.len() {
                    self.pause();
                }
            }
        }

        Ok(registry.len() - before)
    }

    fn resolve_parallel<F>(
        &self,
        leaves: &[u32],
        registry: &mut NodeRegistry,
        on_progress: &F,
    ) -> crate::Result<()>
    where
        F: Fn(ResolveProgress) + Sync,
    {
        let seeded = registry.ids();
        let shared = SharedRegistry::new(std::mem::take(registry));
        let done = AtomicUsize::new(0);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs)
            .build()
            .map_err(|e| TaxaTreeError::Other(format!("Failed to build worker pool: {}", e)))?;

        let outcome = pool.install(|| {
            leaves.par_iter().try_for_each(|&leaf| {
                let added = self.resolve_claimed(leaf, &shared)?;
                let finished = done.fetch_add(1, Ordering::SeqCst) + 1;
                on_progress(ResolveProgress {
                    done: finished,
                    total: leaves.len(),
                    leaf_id: leaf,
                    registered: shared.len(),
                });
                if added > 0 {
                    self.pause();
                }
                Ok::<(), TaxaTreeError>(())
            })
        });

        let merged = shared.into_inner();
        let order = sequential_order(&merged, &seeded, leaves);
        *registry = merged.reordered(order);
        outcome
    }

    /// Walk one chain, fetching only ids this worker managed to claim. An id
    /// claimed by another worker is left to that worker, which carries the
    /// chain the rest of the way up.
    fn resolve_claimed(&self, leaf_id: u32, shared: &SharedRegistry) -> crate::Result<usize> {
        let mut current = leaf_id;
        let mut walked = HashSet::new();
        let mut added = 0;

        while shared.claim(current) {
            walked.insert(current);
            let node = self.fetch_node(current)?;
            let parent = node.parent_id;
            shared.insert(node);
            added += 1;

            match parent {
                Some(parent) if walked.contains(&parent) => {
                    return Err(cycle_error(leaf_id, parent));
                }
                Some(parent) => current = parent,
                None => break,
            }
        }

        Ok(added)
    }

    /// Fetch one record and turn it into a node, never from a partial record
    fn fetch_node(&self, id: u32) -> crate::Result<TaxonNode> {
        let subject = format!("taxon {}", id);
        let record = self
            .options
            .retry
            .run(&subject, || self.source.fetch_taxon(id))?;

        if record.id != id {
            return Err(TaxaTreeError::Malformed {
                subject,
                reason: format!("catalog answered with taxon {}", record.id),
            });
        }

        let node = TaxonNode::from_record(&record, self.options.species_threshold, self.options.root_id);
        debug!(
            "Fetched {} '{}' (parent {:?}, species {})",
            id, node.name, node.parent_id, node.is_species
        );

        if node.is_species {
            if let (Some(photos), Some(url)) = (self.photos, record.default_photo_url.as_deref()) {
                if let Err(e) = photos.ensure_photo(id, url) {
                    warn!("Skipping photo for taxon {}: {}", id, e);
                }
            }
        }

        Ok(node)
    }

    fn pause(&self) {
        if !self.options.leaf_delay.is_zero() {
            std::thread::sleep(self.options.leaf_delay);
        }
    }
}

fn cycle_error(leaf_id: u32, parent: u32) -> TaxaTreeError {
    TaxaTreeError::Invariant(format!(
        "ancestor chain of {} loops back to {}",
        leaf_id, parent
    ))
}

/// Order in which a sequential pass over `leaves` would have inserted the
/// nodes of `registry`, after the `seeded` nodes that were there before.
fn sequential_order(registry: &NodeRegistry, seeded: &[u32], leaves: &[u32]) -> Vec<u32> {
    let mut seen: HashSet<u32> = seeded.iter().copied().collect();
    let mut order = seeded.to_vec();

    for &leaf in leaves {
        for id in registry.lineage(leaf) {
            if !seen.insert(id) {
                break;
            }
            order.push(id);
        }
    }

    order
}
