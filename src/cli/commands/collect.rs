use crate::cli::output;
use crate::core::collector::{LeafCollector, LeafIdSet};
use crate::core::config::Config;
use crate::core::registry::NodeRegistry;
use crate::core::resolver::AncestorResolver;
use crate::core::source::{ObservationQuery, ObservationSource, PhotoSink, TaxonSource};
use crate::download::{create_spinner, CachedPhotos, INatClient, PhotoCache, StageProgress};
use crate::storage::nodes::save_nodes;
use crate::TaxaTreeError;
use clap::Args;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Args, Debug, Clone, Default)]
pub struct CollectArgs {
    /// iNaturalist login whose observations are collected
    #[arg(short, long, env = "TAXATREE_USER")]
    pub user: Option<String>,

    /// Only collect observations under this taxon id
    #[arg(short, long, env = "TAXATREE_TAXON")]
    pub taxon: Option<u32>,

    /// Collect observations of every taxon (no filter, tree rooted at Life)
    #[arg(long, conflicts_with = "taxon")]
    pub all_taxa: bool,

    /// Taxon forced to be the root of the tree
    #[arg(long)]
    pub root: Option<u32>,

    /// Node file to write (.json, or .bin for bincode)
    #[arg(short, long, value_name = "FILE", env = "TAXATREE_NODES_FILE")]
    pub output: Option<PathBuf>,

    /// Worker threads for ancestor resolution
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Pause between leaves in milliseconds
    #[arg(long, value_name = "MS")]
    pub delay_ms: Option<u64>,

    /// Do not download species photos
    #[arg(long)]
    pub no_photos: bool,
}

impl CollectArgs {
    /// Command-line values take precedence over the configuration file
    pub fn apply(&self, config: &mut Config) {
        if let Some(user) = &self.user {
            config.collection.user_login = user.clone();
        }
        if self.all_taxa {
            config.collection.taxon_id = None;
            config.collection.root_taxon_id = None;
        }
        if let Some(taxon) = self.taxon {
            config.collection.taxon_id = Some(taxon);
            config.collection.root_taxon_id = Some(taxon);
        }
        if let Some(root) = self.root {
            config.collection.root_taxon_id = Some(root);
        }
        if let Some(output) = &self.output {
            config.output.nodes_file = Some(output.clone());
        }
        if let Some(jobs) = self.jobs {
            config.collection.jobs = jobs;
        }
        if let Some(delay) = self.delay_ms {
            config.collection.leaf_delay_ms = delay;
        }
        if self.no_photos {
            config.output.download_photos = false;
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectSummary {
    pub leaves: usize,
    pub nodes: usize,
    pub species: usize,
    pub root: u32,
    pub nodes_file: PathBuf,
    pub elapsed: Duration,
}

pub fn run(args: CollectArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let mut config = super::load_config(config_path)?;
    args.apply(&mut config);

    let summary = collect(&config)?;
    output::success(&format!(
        "Collected {} taxa ({} nodes, {} species) into {} in {:.1}s",
        summary.leaves,
        summary.nodes,
        summary.species,
        summary.nodes_file.display(),
        summary.elapsed.as_secs_f64()
    ));
    Ok(())
}

/// Collect, resolve, validate and persist the tree described by `config`
pub fn collect(config: &Config) -> anyhow::Result<CollectSummary> {
    config.validate_for_collection()?;
    let start = Instant::now();

    let client = INatClient::new(&config.api)?;
    let cache = PhotoCache::new(config.photos_dir());
    let photos = CachedPhotos::new(&cache, &client);
    let photo_sink: Option<&dyn PhotoSink> = if config.output.download_photos {
        Some(&photos)
    } else {
        None
    };

    let (leaves, registry) = build_tree(&client, &client, photo_sink, config)?;
    let root = registry.validate(config.collection.root_taxon_id)?;

    let nodes_file = config.nodes_file();
    save_nodes(&nodes_file, &registry)?;
    info!("Saved {} nodes to {}", registry.len(), nodes_file.display());

    Ok(CollectSummary {
        leaves: leaves.len(),
        nodes: registry.len(),
        species: registry.species_count(),
        root,
        nodes_file,
        elapsed: start.elapsed(),
    })
}

/// Gather the user's leaf ids and resolve them into a fresh registry
pub fn build_tree(
    observations: &dyn ObservationSource,
    taxa: &dyn TaxonSource,
    photos: Option<&dyn PhotoSink>,
    config: &Config,
) -> crate::Result<(LeafIdSet, NodeRegistry)> {
    let query = ObservationQuery {
        user_login: config.collection.user_login.clone(),
        taxon_id: config.collection.taxon_id,
    };

    let spinner = create_spinner(&format!("Fetching observations of {}...", query.user_login));
    let collector = LeafCollector::new(observations, config.retry_policy());
    let leaves = collector.collect(&query, |page, total| {
        spinner.set_message(format!("Fetched observation page {}/{}", page, total));
    })?;
    spinner.finish_with_message(format!("Found {} distinct taxa", leaves.len()));

    if leaves.is_empty() {
        return Err(TaxaTreeError::NotFound(format!(
            "no identified observations for user {}",
            query.user_login
        )));
    }

    let mut resolver = AncestorResolver::new(taxa, config.resolver_options());
    if let Some(photos) = photos {
        resolver = resolver.with_photos(photos);
    }

    let progress = StageProgress::new(leaves.len() as u64, "Resolving");
    let leaf_ids: Vec<u32> = leaves.iter().copied().collect();
    let mut registry = NodeRegistry::new();
    resolver.resolve_all(&leaf_ids, &mut registry, |step| {
        progress.set_position(step.done as u64);
        progress.set_message(&format!("{} nodes", step.registered));
    })?;
    progress.finish_with_message(&format!("{} nodes", registry.len()));

    Ok((leaves, registry))
}
