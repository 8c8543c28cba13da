use crate::cli::output;
use crate::download::PhotoCache;
use clap::Args;
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Clone)]
pub struct ClearCacheArgs {
    /// Photo cache directory (default from configuration)
    #[arg(long, value_name = "DIR")]
    pub photos_dir: Option<PathBuf>,

    /// Only report what would be removed
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(args: ClearCacheArgs, config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = super::load_config(config_path)?;
    let cache = PhotoCache::new(args.photos_dir.unwrap_or_else(|| config.photos_dir()));

    if args.dry_run {
        let usage = cache.usage()?;
        output::info(&format!(
            "{} photos ({}) in {}",
            usage.files,
            output::format_size(usage.bytes),
            cache.dir().display()
        ));
        return Ok(());
    }

    let removed = cache.clear()?;
    if removed.files == 0 {
        output::info(&format!("Photo cache {} is already empty", cache.dir().display()));
    } else {
        output::success(&format!(
            "Removed {} photos ({}) from {}",
            removed.files,
            output::format_size(removed.bytes),
            cache.dir().display()
        ));
    }
    Ok(())
}
