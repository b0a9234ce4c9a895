//! Scenario: Watched channels and the open commands
//!
//! # Invariants under test
//!
//! 1. A valid report in the match channel gets the verdict reply and an
//!    `accepted` match-log event; the message stays.
//! 2. A rejected report gets the reason, a `rejected` event, and the
//!    message is deleted from the channel.
//! 3. Clip links in the clips channel are logged; other clips-channel text
//!    is not.
//! 4. Bot authors are ignored everywhere.
//! 5. `/show` is limited to privileged users and reads the scan results.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use stb_audit::{read_events, LogKind};
use stb_bot::api_types::{DispatchOutcome, InboundMessage};
use stb_bot::commands::dispatch;
use stb_bot::scan::{PlayerRecord, Players};
use stb_bot::state::{AppState, Services};
use stb_config::BotConfig;
use stb_schemas::IdentityId;
use stb_store::{store_json, MemBlobStore, BLOB_PLAYERS};
use stb_testkit::{FakeDirectory, RecordingChannel, StaticRosterSource};

struct Harness {
    st: Arc<AppState>,
    chan: Arc<RecordingChannel>,
    store: Arc<MemBlobStore>,
    tmp: tempfile::TempDir,
}

fn config(tmp: &Path) -> BotConfig {
    BotConfig::from_config_json(&json!({
        "discord": { "server_id": "g1" },
        "channels": { "match_reports": "reports", "clips": "clips" },
        "access": { "admins": ["42"], "privileged": ["7"] },
        "roles": {
            "coach": "1", "assistant_coach": "2", "zerg": "3", "terran": "4",
            "protoss": "5", "tier0": "6", "tier1": "7", "tier2": "8", "tier3": "9"
        },
        "roster": { "spreadsheet_id": "sheet-1" },
        "storage": { "match_log": tmp.join("log").join("match_log.jsonl").to_string_lossy() }
    }))
    .expect("test config")
}

fn harness() -> Harness {
    let tmp = tempfile::tempdir().expect("tempdir");
    let chan = Arc::new(RecordingChannel::new());
    let store = Arc::new(MemBlobStore::new());
    let services = Services {
        directory: Arc::new(FakeDirectory::new()),
        channel: chan.clone(),
        roster_source: Arc::new(StaticRosterSource::new()),
        store: store.clone(),
    };
    let st = Arc::new(AppState::new(config(tmp.path()), services).expect("state"));
    Harness {
        st,
        chan,
        store,
        tmp,
    }
}

fn msg(channel: &str, author: &str, content: &str) -> InboundMessage {
    InboundMessage {
        message_id: "m1".to_string(),
        channel_id: channel.to_string(),
        server_id: "g1".to_string(),
        author_id: author.to_string(),
        author_name: format!("user{author}"),
        content: content.to_string(),
        author_is_bot: false,
    }
}

fn log_path(h: &Harness) -> std::path::PathBuf {
    h.tmp.path().join("log").join("match_log.jsonl")
}

#[tokio::test]
async fn accepted_report_is_announced_and_logged() -> anyhow::Result<()> {
    let h = harness();
    let out = dispatch(&h.st, &msg("reports", "5", "G2: Alice 1-0 Bob")).await;

    assert_eq!(out, DispatchOutcome::ReportAccepted { seq: Some(0) });
    let reply = h.chan.texts("reports").join("\n");
    assert!(reply.contains("GROUP **2**"), "{reply}");
    assert!(reply.contains("ACCEPTED"), "{reply}");
    assert!(h.chan.deleted().is_empty());

    let events = read_events(log_path(&h))?;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, LogKind::Accepted);
    assert_eq!(events[0].text, "G2: Alice 1-0 Bob");
    assert_eq!(events[0].detail["group"], 2);
    Ok(())
}

#[tokio::test]
async fn rejected_report_is_deleted() -> anyhow::Result<()> {
    let h = harness();
    dispatch(&h.st, &msg("reports", "5", "G2: Alice 1-1 Bob")).await;
    let out = dispatch(&h.st, &msg("reports", "5", "G2: Alice-Smith 1-0 Bob")).await;

    assert_eq!(
        out,
        DispatchOutcome::ReportRejected {
            reason: "too many dashes".to_string(),
            seq: Some(1),
        }
    );
    assert!(h
        .chan
        .transcript()
        .contains("- REJECTED: too many dashes"));
    assert_eq!(
        h.chan.deleted(),
        vec![("reports".to_string(), "m1".to_string())]
    );

    let events = read_events(log_path(&h))?;
    assert_eq!(events[1].kind, LogKind::Rejected);
    assert_eq!(events[1].detail["reason"], "too many dashes");
    Ok(())
}

#[tokio::test]
async fn commands_still_work_in_the_match_channel() {
    let h = harness();
    let out = dispatch(&h.st, &msg("reports", "5", "/get_discord_server_id")).await;
    assert_eq!(out, DispatchOutcome::completed("/get_discord_server_id"));
    assert_eq!(h.chan.texts("reports"), vec!["g1".to_string()]);
    assert!(h.chan.deleted().is_empty());
}

#[tokio::test]
async fn only_clip_links_are_logged() -> anyhow::Result<()> {
    let h = harness();
    let out = dispatch(&h.st, &msg("clips", "5", "look https://clips.twitch.tv/abc")).await;
    assert_eq!(out, DispatchOutcome::ClipLogged { seq: 0 });

    let out = dispatch(&h.st, &msg("clips", "5", "nice play")).await;
    assert_eq!(out, DispatchOutcome::Ignored);

    let events = read_events(log_path(&h))?;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, LogKind::Clip);
    assert!(h.chan.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn bot_messages_are_ignored() {
    let h = harness();
    let mut m = msg("reports", "5", "G2: Alice-Smith 1-0 Bob");
    m.author_is_bot = true;

    assert_eq!(dispatch(&h.st, &m).await, DispatchOutcome::Ignored);
    assert!(h.chan.sent().is_empty());
    assert!(h.chan.deleted().is_empty());
}

#[tokio::test]
async fn help_lists_the_commands() {
    let h = harness();
    let out = dispatch(&h.st, &msg("ops", "5", "/help")).await;

    assert_eq!(out, DispatchOutcome::completed("/help"));
    let text = h.chan.transcript();
    assert!(text.starts_with("```ini\n"));
    assert!(text.contains("/webassignroles"));
}

#[tokio::test]
async fn show_is_privileged() -> anyhow::Result<()> {
    let h = harness();
    let mut players = Players::new();
    players.insert(
        "Alice".to_string(),
        PlayerRecord {
            handle: "alice#0001".to_string(),
            identity_id: IdentityId::new("1001"),
        },
    );
    store_json(h.store.as_ref(), BLOB_PLAYERS, &players)?;

    let out = dispatch(&h.st, &msg("ops", "5", "/show Alice")).await;
    assert_eq!(
        out,
        DispatchOutcome::Unauthorized {
            command: "/show".to_string()
        }
    );

    dispatch(&h.st, &msg("ops", "7", "/show Alice")).await;
    dispatch(&h.st, &msg("ops", "42", "/show Zed")).await;
    let texts = h.chan.texts("ops");
    assert_eq!(
        texts[1],
        "**Web Name**: Alice\n**Discord: ** <@1001>\n**SnowflakeID: ** 1001\n"
    );
    assert_eq!(texts[2], "Zed not found");
    Ok(())
}
