//! Typed view over the merged config JSON.
//!
//! Every pointer read here must also appear in `CONSUMED_POINTERS`.

use std::collections::BTreeSet;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use stb_schemas::{RoleId, RoleMapping};

use crate::secrets::read_str_at;

pub const DEFAULT_DISCORD_API_BASE: &str = "https://discord.com/api/v10";
pub const DEFAULT_SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";
/// "Neon green".
pub const DEFAULT_TEAM_ROLE_COLOR: u32 = 2358021;
pub const DEFAULT_MEMBER_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub match_reports: String,
    pub clips: Option<String>,
}

/// A1-notation ranges of the roster spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRanges {
    pub screen_names: String,
    pub handles: String,
    pub races: String,
    pub groups: String,
    pub teams: String,
}

impl Default for RosterRanges {
    fn default() -> Self {
        Self {
            screen_names: "Player List!A2:A".to_string(),
            handles: "Player List!B2:B".to_string(),
            races: "Player List!E2:E".to_string(),
            groups: "Player List!C2:C".to_string(),
            teams: "Teams!A1:Z".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterLayout {
    pub spreadsheet_id: String,
    pub api_base: String,
    pub ranges: RosterRanges,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub match_log: PathBuf,
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub server_id: String,
    pub discord_api_base: String,
    pub channels: ChannelConfig,
    pub admins: BTreeSet<String>,
    pub privileged: BTreeSet<String>,
    pub roles: RoleMapping,
    pub team_role_color: u32,
    pub member_page_size: usize,
    pub roster: RosterLayout,
    pub storage: StorageConfig,
}

impl BotConfig {
    pub fn from_config_json(v: &Value) -> Result<Self> {
        let server_id = require_str(v, "/discord/server_id")?;
        let discord_api_base = read_str_at(v, "/discord/api_base")
            .unwrap_or_else(|| DEFAULT_DISCORD_API_BASE.to_string());

        let channels = ChannelConfig {
            match_reports: require_str(v, "/channels/match_reports")?,
            clips: read_str_at(v, "/channels/clips"),
        };

        let roles = RoleMapping {
            coach: require_role(v, "coach")?,
            assistant_coach: require_role(v, "assistant_coach")?,
            zerg: require_role(v, "zerg")?,
            terran: require_role(v, "terran")?,
            protoss: require_role(v, "protoss")?,
            tiers: [
                require_role(v, "tier0")?,
                require_role(v, "tier1")?,
                require_role(v, "tier2")?,
                require_role(v, "tier3")?,
            ],
        };

        let team_role_color = match v.pointer("/teams/role_color") {
            None | Some(Value::Null) => DEFAULT_TEAM_ROLE_COLOR,
            Some(c) => c
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| anyhow!("CONFIG_INVALID: teams.role_color must be a u32"))?,
        };

        let member_page_size = match v.pointer("/directory/member_page_size") {
            None | Some(Value::Null) => DEFAULT_MEMBER_PAGE_SIZE,
            Some(n) => {
                let n = n.as_u64().ok_or_else(|| {
                    anyhow!("CONFIG_INVALID: directory.member_page_size must be an integer")
                })?;
                if n == 0 || n > 1000 {
                    bail!("CONFIG_INVALID: directory.member_page_size must be in 1..=1000");
                }
                n as usize
            }
        };

        let defaults = RosterRanges::default();
        let range = |key: &str, fallback: String| {
            read_str_at(v, &format!("/roster/ranges/{key}")).unwrap_or(fallback)
        };
        let roster = RosterLayout {
            spreadsheet_id: require_str(v, "/roster/spreadsheet_id")?,
            api_base: read_str_at(v, "/roster/api_base")
                .unwrap_or_else(|| DEFAULT_SHEETS_API_BASE.to_string()),
            ranges: RosterRanges {
                screen_names: range("screen_names", defaults.screen_names),
                handles: range("handles", defaults.handles),
                races: range("races", defaults.races),
                groups: range("groups", defaults.groups),
                teams: range("teams", defaults.teams),
            },
        };

        let data_dir = PathBuf::from(
            read_str_at(v, "/storage/data_dir").unwrap_or_else(|| "./data".to_string()),
        );
        let match_log = read_str_at(v, "/storage/match_log")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("match_log.jsonl"));

        Ok(Self {
            server_id,
            discord_api_base,
            channels,
            admins: read_id_list(v, "/access/admins")?,
            privileged: read_id_list(v, "/access/privileged")?,
            roles,
            team_role_color,
            member_page_size,
            roster,
            storage: StorageConfig {
                data_dir,
                match_log,
            },
        })
    }

    /// May run dangerous operations.
    pub fn is_admin(&self, identity: &str) -> bool {
        self.admins.contains(identity)
    }

    /// May run read-only lookups. Admins are implicitly privileged.
    pub fn is_privileged(&self, identity: &str) -> bool {
        self.is_admin(identity) || self.privileged.contains(identity)
    }
}

fn require_str(v: &Value, pointer: &str) -> Result<String> {
    read_id(v, pointer)?.ok_or_else(|| {
        anyhow!(
            "CONFIG_MISSING: required key '{}' is absent or empty",
            pointer.trim_start_matches('/').replace('/', ".")
        )
    })
}

fn require_role(v: &Value, name: &str) -> Result<RoleId> {
    require_str(v, &format!("/roles/{name}")).map(RoleId::new)
}

/// Snowflake ids are often written unquoted in YAML; accept numbers too.
fn read_id(v: &Value, pointer: &str) -> Result<Option<String>> {
    match v.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::String(_)) => Ok(read_str_at(v, pointer)),
        Some(_) => bail!("CONFIG_INVALID: '{}' must be a string or integer", pointer),
    }
}

fn read_id_list(v: &Value, pointer: &str) -> Result<BTreeSet<String>> {
    let Some(raw) = v.pointer(pointer) else {
        return Ok(BTreeSet::new());
    };
    let arr = raw
        .as_array()
        .with_context(|| format!("CONFIG_INVALID: '{pointer}' must be a list"))?;
    let mut out = BTreeSet::new();
    for item in arr {
        match item {
            Value::String(s) if !s.trim().is_empty() => {
                out.insert(s.trim().to_string());
            }
            Value::Number(n) => {
                out.insert(n.to_string());
            }
            _ => bail!("CONFIG_INVALID: '{}' entries must be ids", pointer),
        }
    }
    Ok(out)
}
