//! Shared runtime state for stb-bot.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The services are
//! trait objects so tests can swap in the in-memory fakes.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use stb_audit::MatchLog;
use stb_config::BotConfig;
use stb_reconcile::BatchLedger;
use stb_roster::RosterSource;
use stb_schemas::{ChannelMessaging, DirectoryService};
use stb_store::BlobStore;
use tokio::sync::{broadcast, Mutex};
use tracing::info;

use crate::lock::{LockState, OperationLock};

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat { ts_millis: i64 },
    Status(StatusSnapshot),
    LogLine { level: String, msg: String },
}

impl BusMsg {
    /// SSE `event:` field for this payload.
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::Status(_) => "status",
            BusMsg::LogLine { .. } => "log",
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: String,
    pub version: String,
}

// ---------------------------------------------------------------------------
// StatusSnapshot
// ---------------------------------------------------------------------------

/// Returned by GET /v1/status and carried inside SSE `status` events.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub bot_uptime_secs: u64,
    pub server_id: String,
    /// "idle" | "in_use" | "awaiting_input"
    pub lock: String,
    /// Command holding the lock, if any.
    pub lock_command: Option<String>,
    pub batch_count: usize,
    /// Events written to the match log so far.
    pub match_log_seq: u64,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

/// External capabilities the bot drives.
#[derive(Clone)]
pub struct Services {
    pub directory: Arc<dyn DirectoryService>,
    pub channel: Arc<dyn ChannelMessaging>,
    pub roster_source: Arc<dyn RosterSource>,
    pub store: Arc<dyn BlobStore>,
}

/// Shared by every handler through an `Arc`.
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub config: BotConfig,
    pub directory: Arc<dyn DirectoryService>,
    pub channel: Arc<dyn ChannelMessaging>,
    pub roster_source: Arc<dyn RosterSource>,
    pub store: Arc<dyn BlobStore>,
    /// Mutated only while the operation lock is held.
    pub ledger: Mutex<BatchLedger>,
    pub match_log: Mutex<MatchLog>,
    pub lock: OperationLock,
}

impl AppState {
    /// Loads the batch ledger from the store and opens the match log.
    pub fn new(config: BotConfig, services: Services) -> Result<Self> {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);

        let ledger = BatchLedger::load(services.store.as_ref()).context("load batch ledger")?;
        let match_log = MatchLog::open(&config.storage.match_log).context("open match log")?;
        info!(
            batches = ledger.len(),
            match_log_seq = match_log.seq(),
            "persisted state loaded"
        );

        Ok(Self {
            bus,
            build: BuildInfo {
                service: "stb-bot".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            config,
            directory: services.directory,
            channel: services.channel,
            roster_source: services.roster_source,
            store: services.store,
            ledger: Mutex::new(ledger),
            match_log: Mutex::new(match_log),
            lock: OperationLock::new(),
        })
    }

    pub async fn status_snapshot(&self) -> StatusSnapshot {
        let lock: LockState = self.lock.snapshot();
        let batch_count = self.ledger.lock().await.len();
        let match_log_seq = self.match_log.lock().await.seq();
        StatusSnapshot {
            bot_uptime_secs: uptime_secs(),
            server_id: self.config.server_id.clone(),
            lock: lock.label().to_string(),
            lock_command: lock.command().map(str::to_string),
            batch_count,
            match_log_seq,
        }
    }

    /// Mirror an operator-facing line onto the SSE bus.
    pub fn log_line(&self, level: &str, msg: impl Into<String>) {
        let _ = self.bus.send(BusMsg::LogLine {
            level: level.to_string(),
            msg: msg.into(),
        });
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Seconds since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
