//! Discord v10 REST adapter.
//!
//! Implements [`DirectoryService`] and [`ChannelMessaging`] with one HTTP
//! request per call. No retries and no rate-limit handling: a 429 surfaces
//! as `ServiceError::Api { status: 429, .. }` like any other error.

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use stb_schemas::{
    ChannelMessaging, DirectoryService, IdentityId, Member, Role, RoleEdit, RoleId, ServiceError,
};
use tracing::debug;

/// Discord REST client. The token is never logged.
#[derive(Clone)]
pub struct DiscordRest {
    token: String,
    http: reqwest::Client,
    base_url: String,
}

impl std::fmt::Debug for DiscordRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscordRest")
            .field("token", &"<REDACTED>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WireRole {
    id: String,
    name: String,
    #[serde(default)]
    color: u32,
}

impl From<WireRole> for Role {
    fn from(r: WireRole) -> Self {
        Role {
            id: RoleId::new(r.id),
            name: r.name,
            color: r.color,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireUser {
    id: String,
    username: String,
    #[serde(default)]
    discriminator: String,
}

#[derive(Debug, Deserialize)]
struct WireMember {
    user: WireUser,
}

/// Permissions travel as a decimal string.
#[derive(Debug, Serialize)]
struct WireRoleEdit<'a> {
    name: &'a str,
    color: u32,
    hoist: bool,
    permissions: String,
    mentionable: bool,
}

#[derive(Debug, Deserialize)]
struct WireError {
    #[serde(default)]
    message: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

impl DiscordRest {
    pub fn new(token: String) -> Self {
        Self::new_with_base_url(token, stb_config::DEFAULT_DISCORD_API_BASE.to_string())
    }

    pub fn new_with_base_url(token: String, base_url: String) -> Self {
        Self {
            token,
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Send one request; returns the body of a 2xx response.
    async fn call(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<String, ServiceError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, path, "discord request");
        let mut req = self
            .http
            .request(method, url)
            .header("Authorization", format!("Bot {}", self.token));
        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(b) = body {
            req = req.json(&b);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ServiceError::Transport(format!("discord request failed: {e}")))?;
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ServiceError::Transport(format!("discord body read failed: {e}")))?;

        if status.is_success() {
            return Ok(text);
        }
        let message = serde_json::from_str::<WireError>(&text)
            .map(|e| e.message)
            .unwrap_or(text);
        if status.as_u16() == 404 {
            return Err(ServiceError::NotFound(format!("{path}: {message}")));
        }
        Err(ServiceError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn call_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<T, ServiceError> {
        let text = self.call(method, path, query, body).await?;
        serde_json::from_str(&text)
            .map_err(|e| ServiceError::Decode(format!("{path}: {e}")))
    }
}

#[async_trait]
impl DirectoryService for DiscordRest {
    async fn list_roles(&self, server: &str) -> Result<Vec<Role>, ServiceError> {
        let roles: Vec<WireRole> = self
            .call_json(Method::GET, &format!("/guilds/{server}/roles"), &[], None)
            .await?;
        Ok(roles.into_iter().map(Role::from).collect())
    }

    async fn list_members(
        &self,
        server: &str,
        after: Option<&IdentityId>,
        limit: usize,
    ) -> Result<Vec<Member>, ServiceError> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(a) = after {
            query.push(("after", a.as_str().to_string()));
        }
        let members: Vec<WireMember> = self
            .call_json(Method::GET, &format!("/guilds/{server}/members"), &query, None)
            .await?;
        Ok(members
            .into_iter()
            .map(|m| Member::new(m.user.id, m.user.username, m.user.discriminator))
            .collect())
    }

    async fn add_role(
        &self,
        server: &str,
        identity: &IdentityId,
        role: &RoleId,
    ) -> Result<(), ServiceError> {
        let path = format!("/guilds/{server}/members/{identity}/roles/{role}");
        self.call(Method::PUT, &path, &[], None).await.map(|_| ())
    }

    async fn remove_role(
        &self,
        server: &str,
        identity: &IdentityId,
        role: &RoleId,
    ) -> Result<(), ServiceError> {
        let path = format!("/guilds/{server}/members/{identity}/roles/{role}");
        self.call(Method::DELETE, &path, &[], None).await.map(|_| ())
    }

    async fn create_role(&self, server: &str) -> Result<Role, ServiceError> {
        let role: WireRole = self
            .call_json(
                Method::POST,
                &format!("/guilds/{server}/roles"),
                &[],
                Some(json!({})),
            )
            .await?;
        Ok(role.into())
    }

    async fn edit_role(
        &self,
        server: &str,
        role: &RoleId,
        edit: &RoleEdit,
    ) -> Result<Role, ServiceError> {
        let body = serde_json::to_value(WireRoleEdit {
            name: &edit.name,
            color: edit.color,
            hoist: edit.hoist,
            permissions: edit.permissions.to_string(),
            mentionable: edit.mentionable,
        })
        .map_err(|e| ServiceError::Decode(format!("role edit encode failed: {e}")))?;
        let role: WireRole = self
            .call_json(
                Method::PATCH,
                &format!("/guilds/{server}/roles/{role}"),
                &[],
                Some(body),
            )
            .await?;
        Ok(role.into())
    }

    async fn delete_role(&self, server: &str, role: &RoleId) -> Result<(), ServiceError> {
        let path = format!("/guilds/{server}/roles/{role}");
        self.call(Method::DELETE, &path, &[], None).await.map(|_| ())
    }
}

#[async_trait]
impl ChannelMessaging for DiscordRest {
    async fn send(&self, channel: &str, text: &str) -> Result<(), ServiceError> {
        let path = format!("/channels/{channel}/messages");
        self.call(Method::POST, &path, &[], Some(json!({ "content": text })))
            .await
            .map(|_| ())
    }

    async fn delete_message(&self, channel: &str, message_id: &str) -> Result<(), ServiceError> {
        let path = format!("/channels/{channel}/messages/{message_id}");
        self.call(Method::DELETE, &path, &[], None).await.map(|_| ())
    }
}
