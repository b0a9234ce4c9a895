//! Scenario: `/deleteroles` is a two-message exchange under the lock
//!
//! # Invariants under test
//!
//! 1. With an empty ledger the command answers "no batches" and releases.
//! 2. Otherwise it lists the batches and moves the lock to AwaitingInput;
//!    messages from anyone but the owner are not consumed, and other guarded
//!    commands are refused.
//! 3. The owner's batch id deletes every role of that batch, drops and
//!    persists the ledger entry, and returns the lock to Idle.
//! 4. Input that does not name a batch yields INVALID SELECTION; the lock
//!    still returns to Idle and the ledger is untouched.
//! 5. The owner's reply is the awaited input even in the match-report
//!    channel: it is not parsed, logged or deleted as a report.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use stb_bot::api_types::{DispatchOutcome, InboundMessage};
use stb_bot::commands::dispatch;
use stb_bot::state::{AppState, Services};
use stb_config::{BotConfig, RosterRanges};
use stb_reconcile::BatchLedger;
use stb_store::MemBlobStore;
use stb_testkit::{ids, FakeDirectory, RecordingChannel, StaticRosterSource};

const OWNER: &str = "42";
const OTHER_ADMIN: &str = "43";

struct Harness {
    st: Arc<AppState>,
    dir: Arc<FakeDirectory>,
    chan: Arc<RecordingChannel>,
    store: Arc<MemBlobStore>,
    _tmp: tempfile::TempDir,
}

fn config(tmp: &Path) -> BotConfig {
    BotConfig::from_config_json(&json!({
        "discord": { "server_id": "g1" },
        "channels": { "match_reports": "reports" },
        "access": { "admins": [OWNER, OTHER_ADMIN] },
        "roles": {
            "coach": ids::COACH, "assistant_coach": ids::ASSISTANT_COACH,
            "zerg": ids::ZERG, "terran": ids::TERRAN, "protoss": ids::PROTOSS,
            "tier0": ids::TIERS[0], "tier1": ids::TIERS[1],
            "tier2": ids::TIERS[2], "tier3": ids::TIERS[3]
        },
        "roster": { "spreadsheet_id": "sheet-1" },
        "storage": { "match_log": tmp.join("match_log.jsonl").to_string_lossy() }
    }))
    .expect("test config")
}

fn harness() -> Harness {
    let r = RosterRanges::default();
    let sheet = StaticRosterSource::new()
        .with_column(&r.screen_names, &["Alice", "Bob"])
        .with_column(&r.handles, &["alice", "bob"])
        .with_column(&r.races, &[])
        .with_column(&r.groups, &[])
        .with_range(
            &r.teams,
            &[&["Phoenix", "", "Kraken"], &["Staff"], &["Alice", "", "Bob"]],
        );

    let tmp = tempfile::tempdir().expect("tempdir");
    let dir = Arc::new(
        FakeDirectory::new()
            .with_member("1", "alice", "0")
            .with_member("2", "bob", "0"),
    );
    let chan = Arc::new(RecordingChannel::new());
    let store = Arc::new(MemBlobStore::new());
    let services = Services {
        directory: dir.clone(),
        channel: chan.clone(),
        roster_source: Arc::new(sheet),
        store: store.clone(),
    };
    let st = Arc::new(AppState::new(config(tmp.path()), services).expect("state"));
    Harness {
        st,
        dir,
        chan,
        store,
        _tmp: tmp,
    }
}

fn msg(author: &str, content: &str) -> InboundMessage {
    InboundMessage {
        message_id: "m1".to_string(),
        channel_id: "ops".to_string(),
        server_id: "g1".to_string(),
        author_id: author.to_string(),
        author_name: format!("user{author}"),
        content: content.to_string(),
        author_is_bot: false,
    }
}

async fn create_batch(h: &Harness) {
    let out = dispatch(&h.st, &msg(OWNER, "/webassignroles")).await;
    assert!(matches!(out, DispatchOutcome::Completed { .. }), "{out:?}");
    assert_eq!(h.st.ledger.lock().await.len(), 1);
}

#[tokio::test]
async fn empty_ledger_has_nothing_to_delete() {
    let h = harness();
    let out = dispatch(&h.st, &msg(OWNER, "/deleteroles")).await;

    assert!(
        matches!(&out, DispatchOutcome::Completed { detail: Some(d), .. } if d == "no batches"),
        "{out:?}"
    );
    assert!(h.chan.transcript().contains("- /deleteroles ERROR: no batches"));
    assert!(h.st.lock.snapshot().is_idle());
}

#[tokio::test]
async fn owner_selection_deletes_the_batch() -> anyhow::Result<()> {
    let h = harness();
    create_batch(&h).await;
    let kraken = h.dir.role_named("Kraken").expect("kraken created");
    let phoenix = h.dir.role_named("Phoenix").expect("phoenix created");

    let out = dispatch(&h.st, &msg(OWNER, "/deleteroles")).await;
    assert_eq!(
        out,
        DispatchOutcome::AwaitingInput {
            command: "/deleteroles".to_string()
        }
    );
    assert_eq!(h.st.lock.snapshot().label(), "awaiting_input");
    let listing = h.chan.transcript();
    assert!(listing.contains("Please enter batchnumber of roles to be deleted from below:"));
    assert!(listing.contains(&format!("0: \t{} Kraken", kraken.id.mention())));

    // Another admin's message is not the awaited input.
    let out = dispatch(&h.st, &msg(OTHER_ADMIN, "0")).await;
    assert_eq!(out, DispatchOutcome::Ignored);
    let out = dispatch(&h.st, &msg(OTHER_ADMIN, "/webassignroles")).await;
    assert!(matches!(out, DispatchOutcome::Busy { .. }), "{out:?}");
    assert!(h.dir.role(kraken.id.as_str()).is_some());

    let out = dispatch(&h.st, &msg(OWNER, " 0 ")).await;
    assert!(
        matches!(&out, DispatchOutcome::Completed { detail: Some(d), .. }
            if d == "batch=0 deleted=2 failed=0"),
        "{out:?}"
    );

    assert!(h.dir.role(kraken.id.as_str()).is_none());
    assert!(h.dir.role(phoenix.id.as_str()).is_none());
    assert!(!h.dir.holds("1", phoenix.id.as_str()));
    assert!(h.st.ledger.lock().await.is_empty());
    assert!(BatchLedger::load(h.store.as_ref())?.is_empty());
    assert!(h.st.lock.snapshot().is_idle());

    let transcript = h.chan.transcript();
    assert!(transcript.contains(&format!("> Deleting Phoenix {}", phoenix.id.mention())));
    assert!(transcript.ends_with("```diff\n+ /deleteroles DONE\n```"));
    Ok(())
}

#[tokio::test]
async fn invalid_selection_releases_the_lock() -> anyhow::Result<()> {
    let h = harness();
    create_batch(&h).await;
    h.dir.clear_calls();

    dispatch(&h.st, &msg(OWNER, "/deleteroles")).await;
    let out = dispatch(&h.st, &msg(OWNER, "seven")).await;

    assert_eq!(
        out,
        DispatchOutcome::InvalidSelection {
            command: "/deleteroles".to_string()
        }
    );
    assert!(h
        .chan
        .transcript()
        .ends_with("```diff\n- /deleteroles ERROR: INVALID SELECTION\n```"));
    assert!(h.st.lock.snapshot().is_idle());
    assert_eq!(h.st.ledger.lock().await.len(), 1);
    assert!(h.dir.mutations().is_empty());

    // Unknown but numeric is just as invalid.
    dispatch(&h.st, &msg(OWNER, "/deleteroles")).await;
    let out = dispatch(&h.st, &msg(OWNER, "7")).await;
    assert!(matches!(out, DispatchOutcome::InvalidSelection { .. }));
    assert!(h.st.lock.snapshot().is_idle());
    Ok(())
}

#[tokio::test]
async fn reply_in_report_channel_is_the_selection() -> anyhow::Result<()> {
    let h = harness();
    create_batch(&h).await;
    let kraken = h.dir.role_named("Kraken").expect("kraken created");

    let in_reports = |author: &str, content: &str| InboundMessage {
        channel_id: "reports".to_string(),
        ..msg(author, content)
    };

    let out = dispatch(&h.st, &in_reports(OWNER, "/deleteroles")).await;
    assert!(matches!(out, DispatchOutcome::AwaitingInput { .. }), "{out:?}");

    let out = dispatch(&h.st, &in_reports(OWNER, "0")).await;
    assert!(
        matches!(&out, DispatchOutcome::Completed { detail: Some(d), .. }
            if d == "batch=0 deleted=2 failed=0"),
        "{out:?}"
    );

    assert!(h.st.lock.snapshot().is_idle());
    assert!(h.st.ledger.lock().await.is_empty());
    assert!(BatchLedger::load(h.store.as_ref())?.is_empty());
    assert!(h.dir.role(kraken.id.as_str()).is_none());
    assert!(h.chan.deleted().is_empty(), "reply must not be deleted as a report");
    assert!(!h.chan.transcript().contains("REJECTED"));
    Ok(())
}
