//! Request and response types for the stb-bot HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// POST /v1/events/message
// ---------------------------------------------------------------------------

/// One chat message as relayed from the gateway connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub message_id: String,
    pub channel_id: String,
    pub server_id: String,
    pub author_id: String,
    pub author_name: String,
    pub content: String,
    /// Messages from bots (including this one) are ignored.
    #[serde(default)]
    pub author_is_bot: bool,
}

/// What dispatch did with a message. Replies went out through the channel
/// messaging service; this is the machine-readable summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchOutcome {
    /// Not a command, not a watched channel.
    Ignored,
    ClipLogged {
        seq: u64,
    },
    ReportAccepted {
        seq: Option<u64>,
    },
    ReportRejected {
        reason: String,
        seq: Option<u64>,
    },
    /// Command ran to completion (possibly with partial failures).
    Completed {
        command: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// Command started and now waits for the owner's next message.
    AwaitingInput {
        command: String,
    },
    /// The owner's follow-up message did not name a batch.
    InvalidSelection {
        command: String,
    },
    Unauthorized {
        command: String,
    },
    Busy {
        command: String,
        held_by: String,
    },
    /// Command aborted; the error was reported to the channel.
    Failed {
        command: String,
        error: String,
    },
}

impl DispatchOutcome {
    pub fn completed(command: &str) -> Self {
        DispatchOutcome::Completed {
            command: command.to_string(),
            detail: None,
        }
    }
}

