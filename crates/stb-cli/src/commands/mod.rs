//! Command handler modules for stb-cli.
//!
//! Shared utilities used by multiple command paths live here.
//! Command-specific logic lives in the submodules.

pub mod ledger;
pub mod report;
pub mod roster;

use anyhow::{Context, Result};
use stb_config::{BotConfig, LoadedConfig};

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

/// Load layered YAML and extract the typed bot config from it.
pub fn load_bot_config(paths: &[String]) -> Result<(LoadedConfig, BotConfig)> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = stb_config::load_layered_yaml(&path_refs)
        .with_context(|| format!("load config {:?}", paths))?;
    let config = BotConfig::from_config_json(&loaded.config_json)?;
    Ok((loaded, config))
}
