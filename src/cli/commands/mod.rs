pub mod cache;
pub mod collect;
pub mod config;
pub mod inspect;
pub mod interactive;
pub mod render;
pub mod run;

use crate::core::config::{load_or_default, Config};
use anyhow::Context;
use std::path::Path;

/// Configuration for a command: `--config` if given, else the default file,
/// else built-in defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = load_or_default(path).with_context(|| match path {
        Some(path) => format!("Loading {}", path.display()),
        None => "Loading default configuration".to_string(),
    })?;
    config.validate()?;
    Ok(config)
}
