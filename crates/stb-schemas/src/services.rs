//! Consumed capability boundary: the directory (identities + roles) and
//! channel messaging.
//!
//! Both traits are object-safe and `Send + Sync` so callers can hold an
//! `Arc<dyn DirectoryService>` across async task boundaries.

use std::fmt;

use async_trait::async_trait;

use crate::{IdentityId, Member, Role, RoleEdit, RoleId};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a capability implementation may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Network or transport failure.
    Transport(String),
    /// The remote API answered with a non-success status.
    Api { status: u16, message: String },
    /// A response payload could not be decoded.
    Decode(String),
    /// The referenced identity, role, channel or message does not exist.
    NotFound(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::Transport(msg) => write!(f, "transport error: {msg}"),
            ServiceError::Api { status, message } => {
                write!(f, "api error status={status}: {message}")
            }
            ServiceError::Decode(msg) => write!(f, "decode error: {msg}"),
            ServiceError::NotFound(what) => write!(f, "not found: {what}"),
        }
    }
}

impl std::error::Error for ServiceError {}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Identity and role directory of one chat server.
///
/// Every call is a single request/response; implementations do not retry.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn list_roles(&self, server: &str) -> Result<Vec<Role>, ServiceError>;

    /// One page of members ordered by identity id, starting strictly after
    /// `after` when given. A page shorter than `limit` is the last one.
    async fn list_members(
        &self,
        server: &str,
        after: Option<&IdentityId>,
        limit: usize,
    ) -> Result<Vec<Member>, ServiceError>;

    async fn add_role(
        &self,
        server: &str,
        identity: &IdentityId,
        role: &RoleId,
    ) -> Result<(), ServiceError>;

    async fn remove_role(
        &self,
        server: &str,
        identity: &IdentityId,
        role: &RoleId,
    ) -> Result<(), ServiceError>;

    /// Create a role with platform defaults; follow with [`edit_role`].
    ///
    /// [`edit_role`]: DirectoryService::edit_role
    async fn create_role(&self, server: &str) -> Result<Role, ServiceError>;

    async fn edit_role(
        &self,
        server: &str,
        role: &RoleId,
        edit: &RoleEdit,
    ) -> Result<Role, ServiceError>;

    async fn delete_role(&self, server: &str, role: &RoleId) -> Result<(), ServiceError>;
}

// ---------------------------------------------------------------------------
// Messaging
// ---------------------------------------------------------------------------

/// Text messaging in chat channels.
#[async_trait]
pub trait ChannelMessaging: Send + Sync {
    async fn send(&self, channel: &str, text: &str) -> Result<(), ServiceError>;

    async fn delete_message(&self, channel: &str, message_id: &str) -> Result<(), ServiceError>;
}
