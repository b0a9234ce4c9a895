//! Runtime secret resolution.
//!
//! # Contract
//! - Config YAML stores only **env var NAMES** (`discord.token_env`,
//!   `roster.credentials_env`).
//! - Callers invoke [`resolve_secrets`] once at startup and pass the result
//!   into constructors; `std::env::var` is not read anywhere else.
//! - `Debug` output **redacts** values.
//! - Error messages reference the env var **NAME**, never the value.
//!
//! | Mode     | Required                       |
//! |----------|--------------------------------|
//! | `Daemon` | Discord bot token              |
//! | `Tool`   | nothing (all optional)         |
//!
//! Roster credentials are optional in every mode; a public spreadsheet can
//! be read without them.

use anyhow::{bail, Result};
use serde_json::Value;

/// Default env var holding the Discord bot token.
pub const DEFAULT_DISCORD_TOKEN_ENV: &str = "STARBOT_DISCORD_TOKEN";
/// Default env var holding the spreadsheet credential.
pub const DEFAULT_ROSTER_CREDENTIALS_ENV: &str = "STARBOT_SHEETS_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretsMode {
    /// The bot daemon: must be able to talk to the directory.
    Daemon,
    /// CLI tooling: every secret is optional.
    Tool,
}

/// How the spreadsheet credential is presented to the Sheets API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    /// `?key=<value>` query parameter.
    ApiKey,
    /// `Authorization: Bearer <value>` header.
    Bearer,
}

impl CredentialKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api_key" | "apikey" | "key" => Some(CredentialKind::ApiKey),
            "bearer" | "token" => Some(CredentialKind::Bearer),
            _ => None,
        }
    }
}

/// All runtime-resolved secrets for one process.
/// **Values are redacted in `Debug` output.**
#[derive(Clone)]
pub struct ResolvedSecrets {
    /// Discord bot token. `None` if the named env var was absent or empty.
    pub discord_token: Option<String>,
    /// Spreadsheet credential. `None` if not configured or empty.
    pub roster_credentials: Option<String>,
    pub roster_credentials_kind: CredentialKind,
}

impl std::fmt::Debug for ResolvedSecrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSecrets")
            .field(
                "discord_token",
                &self.discord_token.as_ref().map(|_| "<REDACTED>"),
            )
            .field(
                "roster_credentials",
                &self.roster_credentials.as_ref().map(|_| "<REDACTED>"),
            )
            .field("roster_credentials_kind", &self.roster_credentials_kind)
            .finish()
    }
}

/// Read a non-empty string value at `pointer` from a JSON config.
pub(crate) fn read_str_at(config: &Value, pointer: &str) -> Option<String> {
    let s = config.pointer(pointer)?.as_str()?;
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Unset and blank both count as missing.
fn resolve_env(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Resolve all secrets from the environment.
///
/// # Errors
/// Returns `Err` naming the env var of the first missing required secret, or
/// when `roster.credentials_kind` holds an unknown value.
pub fn resolve_secrets(config_json: &Value, mode: SecretsMode) -> Result<ResolvedSecrets> {
    let token_var = read_str_at(config_json, "/discord/token_env")
        .unwrap_or_else(|| DEFAULT_DISCORD_TOKEN_ENV.to_string());
    let creds_var = read_str_at(config_json, "/roster/credentials_env")
        .unwrap_or_else(|| DEFAULT_ROSTER_CREDENTIALS_ENV.to_string());

    let roster_credentials_kind = match read_str_at(config_json, "/roster/credentials_kind") {
        None => CredentialKind::ApiKey,
        Some(raw) => match CredentialKind::parse(&raw) {
            Some(k) => k,
            None => bail!(
                "SECRETS_BAD_KIND: roster.credentials_kind '{}' is not one of: api_key | bearer",
                raw
            ),
        },
    };

    let discord_token = resolve_env(&token_var);
    if mode == SecretsMode::Daemon && discord_token.is_none() {
        bail!(
            "SECRETS_MISSING mode=DAEMON: required env var '{}' \
             (discord bot token) is not set or empty",
            token_var,
        );
    }

    Ok(ResolvedSecrets {
        discord_token,
        roster_credentials: resolve_env(&creds_var),
        roster_credentials_kind,
    })
}
