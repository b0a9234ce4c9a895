//! stb-testkit
//!
//! In-memory fakes for the consumed capabilities, used by scenario tests
//! across the workspace:
//!
//! - [`FakeDirectory`]: roles, members and role holdings; records every
//!   call and fails on demand.
//! - [`RecordingChannel`]: captures sent and deleted messages.
//! - [`StaticRosterSource`]: serves fixed ranges.

mod directory;

pub use directory::{Call, FakeDirectory, FakeOp};

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use stb_roster::RosterSource;
use stb_schemas::{ChannelMessaging, RoleId, RoleMapping, ServiceError};

/// Role ids used by [`role_mapping`].
pub mod ids {
    pub const COACH: &str = "100";
    pub const ASSISTANT_COACH: &str = "101";
    pub const ZERG: &str = "110";
    pub const TERRAN: &str = "111";
    pub const PROTOSS: &str = "112";
    pub const TIERS: [&str; 4] = ["120", "121", "122", "123"];
}

/// Standard mapping backed by [`ids`].
pub fn role_mapping() -> RoleMapping {
    RoleMapping {
        coach: RoleId::new(ids::COACH),
        assistant_coach: RoleId::new(ids::ASSISTANT_COACH),
        zerg: RoleId::new(ids::ZERG),
        terran: RoleId::new(ids::TERRAN),
        protoss: RoleId::new(ids::PROTOSS),
        tiers: ids::TIERS.map(RoleId::new),
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<(String, String)>>,
    deleted: Mutex<Vec<(String, String)>>,
    fail_sends: Mutex<bool>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_sends(&self, fail: bool) {
        *self.fail_sends.lock().unwrap_or_else(PoisonError::into_inner) = fail;
    }

    /// (channel, text) in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Texts sent to one channel.
    pub fn texts(&self, channel: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, t)| t)
            .collect()
    }

    /// Everything sent, joined with newlines.
    pub fn transcript(&self) -> String {
        self.sent()
            .into_iter()
            .map(|(_, t)| t)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// (channel, message id) in delete order.
    pub fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl ChannelMessaging for RecordingChannel {
    async fn send(&self, channel: &str, text: &str) -> Result<(), ServiceError> {
        if *self.fail_sends.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(ServiceError::Transport("send disabled".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((channel.to_string(), text.to_string()));
        Ok(())
    }

    async fn delete_message(&self, channel: &str, message_id: &str) -> Result<(), ServiceError> {
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((channel.to_string(), message_id.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Roster source
// ---------------------------------------------------------------------------

/// Serves fixed ranges. An unknown range answers 404.
#[derive(Debug, Default)]
pub struct StaticRosterSource {
    ranges: Mutex<BTreeMap<String, Vec<Vec<String>>>>,
    reads: Mutex<Vec<String>>,
}

impl StaticRosterSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range(self, range: &str, rows: &[&[&str]]) -> Self {
        let rows = rows
            .iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect();
        self.ranges.lock().unwrap_or_else(PoisonError::into_inner).insert(range.to_string(), rows);
        self
    }

    /// Single-column range from one value per row.
    pub fn with_column(self, range: &str, cells: &[&str]) -> Self {
        let rows: Vec<&[&str]> = cells.iter().map(std::slice::from_ref).collect();
        self.with_range(range, &rows)
    }

    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl RosterSource for StaticRosterSource {
    async fn get_range(
        &self,
        _spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, ServiceError> {
        self.reads.lock().unwrap_or_else(PoisonError::into_inner).push(range.to_string());
        self.ranges
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(range)
            .cloned()
            .ok_or_else(|| ServiceError::Api {
                status: 404,
                message: format!("range not found: {range}"),
            })
    }
}
