use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use stb_config::{CredentialKind, ResolvedSecrets};
use stb_schemas::ServiceError;

use crate::RosterSource;

/// How requests authenticate. Values are never logged.
#[derive(Clone)]
pub enum SheetsCredential {
    /// Public sheet, no credential.
    None,
    /// `?key=` query parameter.
    ApiKey(String),
    /// `Authorization: Bearer` access token.
    Bearer(String),
}

impl SheetsCredential {
    /// Pick the credential form named by `roster.credentials_kind`.
    pub fn from_secrets(secrets: &ResolvedSecrets) -> Self {
        match (&secrets.roster_credentials, secrets.roster_credentials_kind) {
            (None, _) => SheetsCredential::None,
            (Some(k), CredentialKind::ApiKey) => SheetsCredential::ApiKey(k.clone()),
            (Some(t), CredentialKind::Bearer) => SheetsCredential::Bearer(t.clone()),
        }
    }
}

impl std::fmt::Debug for SheetsCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetsCredential::None => f.write_str("None"),
            SheetsCredential::ApiKey(_) => f.write_str("ApiKey(<REDACTED>)"),
            SheetsCredential::Bearer(_) => f.write_str("Bearer(<REDACTED>)"),
        }
    }
}

/// Google Sheets v4 `spreadsheets.values.get` client.
#[derive(Debug, Clone)]
pub struct SheetsRosterSource {
    credential: SheetsCredential,
    http: reqwest::Client,
    base_url: String,
}

impl SheetsRosterSource {
    pub fn new(credential: SheetsCredential) -> Self {
        Self::new_with_base_url(credential, stb_config::DEFAULT_SHEETS_API_BASE.to_string())
    }

    pub fn new_with_base_url(credential: SheetsCredential, base_url: String) -> Self {
        Self {
            credential,
            http: reqwest::Client::new(),
            base_url,
        }
    }

    fn values_url(&self, spreadsheet_id: &str, range: &str) -> Result<reqwest::Url, ServiceError> {
        let mut url = reqwest::Url::parse(self.base_url.trim_end_matches('/'))
            .map_err(|e| ServiceError::Transport(format!("bad sheets base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ServiceError::Transport("sheets base url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["spreadsheets", spreadsheet_id, "values", range]);
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

/// Formatted values are strings; anything else is rendered as JSON text.
fn cell_text(v: Value) -> String {
    match v {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl RosterSource for SheetsRosterSource {
    async fn get_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, ServiceError> {
        let url = self.values_url(spreadsheet_id, range)?;
        let mut req = self.http.get(url).query(&[("majorDimension", "ROWS")]);
        match &self.credential {
            SheetsCredential::None => {}
            SheetsCredential::ApiKey(k) => req = req.query(&[("key", k.as_str())]),
            SheetsCredential::Bearer(t) => req = req.bearer_auth(t),
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ServiceError::Transport(format!("sheets request failed: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ServiceError::Transport(format!("sheets body read failed: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ServiceError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ValueRange = serde_json::from_str(&body)
            .map_err(|e| ServiceError::Decode(format!("sheets values decode failed: {e}")))?;
        Ok(parsed
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }
}
