/// Species photo cache keyed by taxon id
use crate::core::source::{PhotoSink, PhotoSource};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PHOTO_EXTENSION: &str = "jpg";

/// Directory of `<taxon_id>.jpg` files. The presence of a file is the cache hit.
#[derive(Debug, Clone)]
pub struct PhotoCache {
    dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheUsage {
    pub files: usize,
    pub bytes: u64,
}

impl PhotoCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, taxon_id: u32) -> PathBuf {
        self.dir.join(format!("{}.{}", taxon_id, PHOTO_EXTENSION))
    }

    pub fn contains(&self, taxon_id: u32) -> bool {
        self.path_for(taxon_id).is_file()
    }

    /// Cached photo path for `taxon_id`, if any
    pub fn get(&self, taxon_id: u32) -> Option<PathBuf> {
        let path = self.path_for(taxon_id);
        path.is_file().then_some(path)
    }

    /// Download the photo unless it is cached. Returns true on download.
    pub fn ensure(&self, taxon_id: u32, url: &str, source: &dyn PhotoSource) -> crate::Result<bool> {
        if self.contains(taxon_id) {
            debug!("Photo for {} already cached", taxon_id);
            return Ok(false);
        }

        let bytes = source.fetch_photo(url)?;
        self.store(taxon_id, &bytes)?;
        debug!("Cached photo for {} ({} bytes)", taxon_id, bytes.len());
        Ok(true)
    }

    /// Write through a temporary file so an interrupted write is never a hit
    pub fn store(&self, taxon_id: u32, bytes: &[u8]) -> crate::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(taxon_id);
        let partial = self.dir.join(format!(".{}.{}.part", taxon_id, PHOTO_EXTENSION));
        fs::write(&partial, bytes)?;
        fs::rename(&partial, &path)?;
        Ok(path)
    }

    /// Files and bytes currently held by the cache
    pub fn usage(&self) -> crate::Result<CacheUsage> {
        let mut usage = CacheUsage::default();
        for path in self.cached_files()? {
            usage.files += 1;
            usage.bytes += fs::metadata(&path)?.len();
        }
        Ok(usage)
    }

    /// Delete every cached photo (and leftover partial writes)
    pub fn clear(&self) -> crate::Result<CacheUsage> {
        let mut removed = CacheUsage::default();
        for path in self.cached_files()? {
            let size = fs::metadata(&path)?.len();
            fs::remove_file(&path)?;
            removed.files += 1;
            removed.bytes += size;
        }
        info!(
            "Removed {} photos ({} bytes) from {}",
            removed.files,
            removed.bytes,
            self.dir.display()
        );
        Ok(removed)
    }

    fn cached_files(&self) -> crate::Result<Vec<PathBuf>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.is_file() && is_cache_file(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// `<digits>.jpg` or a `.<digits>.jpg.part` leftover
fn is_cache_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let name = name
        .strip_prefix('.')
        .and_then(|n| n.strip_suffix(".part"))
        .unwrap_or(name);
    match name.strip_suffix(&format!(".{}", PHOTO_EXTENSION)) {
        Some(stem) => !stem.is_empty() && stem.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Resolver hook that fills the cache through a photo source
pub struct CachedPhotos<'a> {
    cache: &'a PhotoCache,
    source: &'a dyn PhotoSource,
}

impl<'a> CachedPhotos<'a> {
    pub fn new(cache: &'a PhotoCache, source: &'a dyn PhotoSource) -> Self {
        Self { cache, source }
    }
}

impl PhotoSink for CachedPhotos<'_> {
    fn ensure_photo(&self, taxon_id: u32, url: &str) -> crate::Result<bool> {
        self.cache.ensure(taxon_id, url, self.source)
    }
}
