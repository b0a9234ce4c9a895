//! stb-config
//!
//! Layered YAML configuration for the starbot workspace.
//!
//! - YAML documents are merged in order (later documents override earlier).
//! - The merged tree is converted to JSON, checked for literal credentials,
//!   canonicalised and hashed (`config_hash`).
//! - Secrets are referenced by env-var NAME only; see [`secrets`].
//! - [`BotConfig`] is the typed view the daemon and CLI consume.

mod bot;
pub mod secrets;
mod tree;

pub use bot::{
    BotConfig, ChannelConfig, RosterLayout, RosterRanges, StorageConfig, DEFAULT_DISCORD_API_BASE,
    DEFAULT_SHEETS_API_BASE, DEFAULT_TEAM_ROLE_COLOR,
};
pub use secrets::{resolve_secrets, CredentialKind, ResolvedSecrets, SecretsMode};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs;

/// JSON-pointer prefixes of every config key the workspace actually reads.
///
/// Keep in sync with `bot.rs` and `secrets.rs`. A leaf not covered by any
/// prefix is reported as unused.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/discord/server_id",
    "/discord/api_base",
    "/discord/token_env",
    "/channels/match_reports",
    "/channels/clips",
    "/access/admins",
    "/access/privileged",
    "/roles",
    "/teams/role_color",
    "/directory/member_page_size",
    "/roster/spreadsheet_id",
    "/roster/api_base",
    "/roster/ranges",
    "/roster/credentials_env",
    "/roster/credentials_kind",
    "/storage/data_dir",
    "/storage/match_log",
];

/// Leading text of credentials this bot deals in: Google API keys, Google
/// OAuth access tokens and service-account PEM blocks.
const CREDENTIAL_PREFIXES: &[&str] = &["AIza", "ya29.", "-----BEGIN"];

/// Below this length nothing is treated as a credential.
const MIN_CREDENTIAL_LEN: usize = 8;

/// How many unused pointers the CONFIG_UNUSED_KEYS error lists.
const UNUSED_PREVIEW: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    /// Prefixes the analysis ran against, sorted.
    pub consumed_prefixes: Vec<String>,
    /// Leaves no prefix covers, sorted.
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Compare the leaves of `config_json` against [`CONSUMED_POINTERS`].
/// Under [`UnusedKeyPolicy::Fail`] any unused leaf is an error.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let mut consumed_prefixes: Vec<String> =
        CONSUMED_POINTERS.iter().map(|p| p.to_string()).collect();
    consumed_prefixes.sort();

    let mut unused_leaf_pointers: Vec<String> = tree::leaves(config_json)
        .into_iter()
        .map(|(pointer, _)| pointer)
        .filter(|leaf| !consumed_prefixes.iter().any(|p| tree::covers(p, leaf)))
        .collect();
    unused_leaf_pointers.sort();

    let report = UnusedKeyReport {
        consumed_prefixes,
        unused_leaf_pointers,
    };

    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        let shown: Vec<&String> = report.unused_leaf_pointers.iter().take(UNUSED_PREVIEW).collect();
        bail!(
            "CONFIG_UNUSED_KEYS: {} config key(s) are not read by anything. \
            Remove them or extend CONSUMED_POINTERS. First few: {:?}",
            report.unused_leaf_pointers.len(),
            shown
        );
    }

    Ok(report)
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

/// Read each path and hand the contents to [`load_layered_yaml_from_strings`].
pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let docs = paths
        .iter()
        .map(|p| fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}")))
        .collect::<Result<Vec<String>>>()?;
    let doc_refs: Vec<&str> = docs.iter().map(String::as_str).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = Value::Object(serde_json::Map::new());
    for (layer, raw) in yaml_docs.iter().enumerate() {
        let parsed: serde_yaml::Value =
            serde_yaml::from_str(raw).with_context(|| format!("invalid yaml in layer {layer}"))?;
        let as_json = serde_json::to_value(parsed)
            .with_context(|| format!("layer {layer} is not representable as json"))?;
        tree::overlay(&mut merged, as_json);
    }

    reject_credential_literals(&merged)?;

    let canonical_json = serde_json::to_string(&tree::sorted(&merged))
        .context("canonical json serialize failed")?;
    let config_hash = hex::encode(Sha256::digest(canonical_json.as_bytes()));

    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

fn reject_credential_literals(root: &Value) -> Result<()> {
    let hit = tree::leaves(root)
        .into_iter()
        .find(|(_, v)| v.as_str().is_some_and(looks_like_credential));
    if let Some((pointer, _)) = hit {
        bail!("CONFIG_SECRET_DETECTED leaf={pointer} value=REDACTED");
    }
    Ok(())
}

fn looks_like_credential(s: &str) -> bool {
    let t = s.trim();
    if t.len() < MIN_CREDENTIAL_LEN {
        return false;
    }
    CREDENTIAL_PREFIXES.iter().any(|p| t.starts_with(p)) || looks_like_bot_token(t)
}

/// Discord bot tokens are three base64url segments joined by dots: the
/// encoded bot id, a short timestamp and a long HMAC.
fn looks_like_bot_token(t: &str) -> bool {
    let parts: Vec<&str> = t.split('.').collect();
    let [id, stamp, mac] = parts.as_slice() else {
        return false;
    };
    let b64url = |s: &str| s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
    id.len() >= 20
        && (5..=7).contains(&stamp.len())
        && mac.len() >= 27
        && [*id, *stamp, *mac].into_iter().all(b64url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_strings_are_never_credentials() {
        assert!(!looks_like_credential("ya29.x"));
        assert!(looks_like_credential("AIzaSyD-realLookingKey"));
    }

    #[test]
    fn bot_token_shape_is_detected() {
        assert!(looks_like_credential(
            "MTE0NjY3OTk0NzE2NjE4OTYwMA.GxYz12.abcdefghijklmnopqrstuvwxyz0123"
        ));
        assert!(!looks_like_credential("config/starbot.local.yaml"));
        assert!(!looks_like_credential("STARBOT_DISCORD_TOKEN"));
    }
}
