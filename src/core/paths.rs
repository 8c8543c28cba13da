use std::path::PathBuf;
use std::sync::OnceLock;

// Cache the paths to avoid repeated environment lookups
static TAXATREE_HOME: OnceLock<PathBuf> = OnceLock::new();
static TAXATREE_CACHE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Get the taxatree home directory
/// Checks TAXATREE_HOME environment variable, falls back to ${HOME}/.taxatree
pub fn taxatree_home() -> PathBuf {
    TAXATREE_HOME
        .get_or_init(|| {
            if let Ok(path) = std::env::var("TAXATREE_HOME") {
                PathBuf::from(path)
            } else {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".taxatree")
            }
        })
        .clone()
}

/// Get the cache directory
/// Checks TAXATREE_CACHE_DIR environment variable, falls back to TAXATREE_HOME/cache
pub fn taxatree_cache_dir() -> PathBuf {
    TAXATREE_CACHE_DIR
        .get_or_init(|| {
            if let Ok(path) = std::env::var("TAXATREE_CACHE_DIR") {
                PathBuf::from(path)
            } else {
                taxatree_home().join("cache")
            }
        })
        .clone()
}

/// Default location of the configuration file
pub fn config_path() -> PathBuf {
    taxatree_home().join("config.toml")
}

/// Default photo cache directory
pub fn photos_dir() -> PathBuf {
    taxatree_cache_dir().join("photos")
}

/// Default persisted node set
pub fn nodes_path() -> PathBuf {
    taxatree_home().join("nodes.json")
}

/// Check if running with a custom home directory
pub fn is_custom_home() -> bool {
    std::env::var("TAXATREE_HOME").is_ok()
}

/// Get a human-readable description of the current path configuration
pub fn describe_paths() -> String {
    format!(
        "taxatree paths:\n  \
        Home: {}\n  \
        Config: {}\n  \
        Cache: {}\n  \
        Photos: {}\n  \
        Custom: {}",
        taxatree_home().display(),
        config_path().display(),
        taxatree_cache_dir().display(),
        photos_dir().display(),
        if is_custom_home() { "Yes" } else { "No (using defaults)" }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_paths() {
        assert!(config_path().ends_with("config.toml"));
        assert!(photos_dir().ends_with("cache/photos") || photos_dir().ends_with("photos"));
        assert!(nodes_path().starts_with(taxatree_home()));
    }

    #[test]
    fn test_describe_paths_lists_every_location() {
        let description = describe_paths();
        assert!(description.contains("Home:"));
        assert!(description.contains("Photos:"));
    }
}
