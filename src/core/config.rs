use crate::bio::taxonomy::SPECIES_RANK_LEVEL;
use crate::core::paths;
use crate::core::resolver::ResolverOptions;
use crate::core::retry::RetryPolicy;
use crate::TaxaTreeError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub collection: CollectionConfig,
    pub retry: RetryConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Locale for common names (e.g. "ru", "en")
    pub locale: String,
    pub user_agent: String,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// iNaturalist login whose observations seed the tree
    pub user_login: String,
    /// Only observations under this taxon are collected
    pub taxon_id: Option<u32>,
    /// Taxon forced to be the root of the tree
    pub root_taxon_id: Option<u32>,
    pub species_rank_threshold: f64,
    /// Pause between leaves that needed network lookups
    pub leaf_delay_ms: u64,
    /// Worker threads for ancestor resolution
    pub jobs: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub rate_limit_cooldown_secs: u64,
    pub max_transient_attempts: u32,
    pub transient_backoff_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Persisted node set; defaults to ~/.taxatree/nodes.json
    pub nodes_file: Option<PathBuf>,
    /// Photo cache; defaults to ~/.taxatree/cache/photos
    pub photos_dir: Option<PathBuf>,
    pub dot_file: PathBuf,
    pub drawio_file: PathBuf,
    pub download_photos: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.inaturalist.org/v1/".to_string(),
            locale: "ru".to_string(),
            user_agent: format!("taxatree/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            user_login: String::new(),
            taxon_id: Some(3),      // Aves
            root_taxon_id: Some(3), // Tree starts at the filter taxon
            species_rank_threshold: SPECIES_RANK_LEVEL,
            leaf_delay_ms: 1000,
            jobs: 1,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            rate_limit_cooldown_secs: 60,
            max_transient_attempts: 3,
            transient_backoff_ms: 2000,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            nodes_file: None,
            photos_dir: None,
            dot_file: PathBuf::from("taxonomic_tree.gv"),
            drawio_file: PathBuf::from("taxon_tree.drawio"),
            download_photos: true,
        }
    }
}

impl Config {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            rate_limit_cooldown: Duration::from_secs(self.retry.rate_limit_cooldown_secs),
            max_transient_attempts: self.retry.max_transient_attempts,
            transient_backoff: Duration::from_millis(self.retry.transient_backoff_ms),
        }
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            species_threshold: self.collection.species_rank_threshold,
            root_id: self.collection.root_taxon_id,
            retry: self.retry_policy(),
            leaf_delay: Duration::from_millis(self.collection.leaf_delay_ms),
            jobs: self.collection.jobs,
        }
    }

    pub fn nodes_file(&self) -> PathBuf {
        self.output
            .nodes_file
            .clone()
            .unwrap_or_else(paths::nodes_path)
    }

    pub fn photos_dir(&self) -> PathBuf {
        self.output
            .photos_dir
            .clone()
            .unwrap_or_else(paths::photos_dir)
    }

    /// Reject values no stage can work with
    pub fn validate(&self) -> Result<(), TaxaTreeError> {
        url::Url::parse(&self.api.base_url).map_err(|e| {
            TaxaTreeError::Config(format!("api.base_url '{}': {}", self.api.base_url, e))
        })?;
        if self.collection.jobs == 0 {
            return Err(TaxaTreeError::Config(
                "collection.jobs must be at least 1".to_string(),
            ));
        }
        let threshold = self.collection.species_rank_threshold;
        if threshold.is_nan() || threshold <= 0.0 {
            return Err(TaxaTreeError::Config(
                "collection.species_rank_threshold must be positive".to_string(),
            ));
        }
        if self.retry.max_transient_attempts == 0 {
            return Err(TaxaTreeError::Config(
                "retry.max_transient_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Collection additionally needs to know whose observations to read
    pub fn validate_for_collection(&self) -> Result<(), TaxaTreeError> {
        self.validate()?;
        if self.collection.user_login.trim().is_empty() {
            return Err(TaxaTreeError::Config(
                "collection.user_login is not set (use --user or TAXATREE_USER)".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn default_config() -> Config {
    Config::default()
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, TaxaTreeError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| TaxaTreeError::Config(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

/// Load an explicitly requested file, or the default file if it exists
pub fn load_or_default(explicit: Option<&Path>) -> Result<Config, TaxaTreeError> {
    match explicit {
        Some(path) if !path.exists() => Err(TaxaTreeError::Config(format!(
            "config file {} does not exist",
            path.display()
        ))),
        Some(path) => load_config(path),
        None => {
            let path = paths::config_path();
            if path.exists() {
                load_config(path)
            } else {
                Ok(default_config())
            }
        }
    }
}

pub fn save_config<P: AsRef<Path>>(path: P, config: &Config) -> Result<(), TaxaTreeError> {
    let contents = toml::to_string_pretty(config)
        .map_err(|e| TaxaTreeError::Config(format!("Failed to serialize config: {}", e)))?;
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = default_config();
        config.collection.user_login = "merrcurys".to_string();
        config.output.nodes_file = Some(dir.path().join("nodes.bin"));
        save_config(&path, &config).unwrap();

        assert_eq!(load_config(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[collection]\nuser_login = \"peterchristiaen\"\njobs = 2\n\n[api]\nlocale = \"en\"\n",
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.collection.user_login, "peterchristiaen");
        assert_eq!(config.collection.jobs, 2);
        assert_eq!(config.collection.taxon_id, Some(3));
        assert_eq!(config.api.locale, "en");
        assert_eq!(config.api.base_url, ApiConfig::default().base_url);
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[collection\nuser_login = ").unwrap();

        assert!(matches!(load_config(&path), Err(TaxaTreeError::Config(_))));
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = TempDir::new().unwrap();
        let result = load_or_default(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(TaxaTreeError::Config(_))));
    }

    #[test]
    fn test_validation() {
        let mut config = default_config();
        assert!(config.validate().is_ok());
        assert!(config.validate_for_collection().is_err());

        config.collection.user_login = "merrcurys".to_string();
        assert!(config.validate_for_collection().is_ok());

        config.collection.jobs = 0;
        assert!(config.validate().is_err());

        config.collection.jobs = 1;
        config.api.base_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolver_options_follow_config() {
        let mut config = default_config();
        config.collection.root_taxon_id = Some(48460);
        config.retry.rate_limit_cooldown_secs = 5;

        let options = config.resolver_options();
        assert_eq!(options.root_id, Some(48460));
        assert_eq!(options.retry.rate_limit_cooldown, Duration::from_secs(5));
        assert_eq!(options.leaf_delay, Duration::from_millis(1000));
        assert_eq!(options.species_threshold, SPECIES_RANK_LEVEL);
    }
}
