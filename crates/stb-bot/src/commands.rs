//! Message dispatch.
//!
//! Every inbound message goes through [`dispatch`], in this order:
//!
//! 1. Messages from bots are ignored.
//! 2. A message from an admin the operation lock is waiting on is consumed
//!    as that input, whatever channel it arrives in.
//! 3. Clip links in the clips channel are written to the match log.
//! 4. Plain text in the match-report channel is parsed as a report; the
//!    verdict is posted, logged, and rejected reports are deleted.
//! 5. Anything else is matched against the command surface.
//!
//! The role commands (`/scan_users`, `/assignroles`, `/webassignroles`,
//! `/deleteroles`) are admin-only and run under the operation lock.

use anyhow::Context;
use serde_json::{json, Value};
use stb_audit::{is_clip_link, LogKind};
use stb_reconcile::{reconcile, DirectorySnapshot, ReconcileContext, RunReport};
use stb_roster::read_roster;
use stb_schemas::Roster;
use stb_store::{load_json, load_json_opt, store_json, BLOB_PLAYERS, BLOB_ROSTER};
use tracing::{error, info, warn};

use crate::api_types::{DispatchOutcome, InboundMessage};
use crate::format::{
    chunk_lines, diff_block, fix_block, help_card, in_progress, not_authorized, MESSAGE_LIMIT,
};
use crate::lock::{ExpectedInput, LockTicket, PendingInput};
use crate::scan::{render_player, scan_roster, Players};
use crate::state::AppState;

pub const CMD_HELP: &str = "/help";
pub const CMD_TEST: &str = "/test";
pub const CMD_SCAN_USERS: &str = "/scan_users";
pub const CMD_ASSIGN_ROLES: &str = "/assignroles";
pub const CMD_WEB_ASSIGN_ROLES: &str = "/webassignroles";
pub const CMD_DELETE_ROLES: &str = "/deleteroles";
pub const CMD_SERVER_ID: &str = "/get_discord_server_id";
pub const CMD_SHOW: &str = "/show";

pub async fn dispatch(st: &AppState, msg: &InboundMessage) -> DispatchOutcome {
    if msg.author_is_bot {
        return DispatchOutcome::Ignored;
    }

    if st.config.is_admin(&msg.author_id) {
        if let Some(pending) = st.lock.take_input(&msg.author_id) {
            return match pending.expected {
                ExpectedInput::BatchId => delete_roles_select(st, msg, pending).await,
            };
        }
    }

    if st.config.channels.clips.as_deref() == Some(msg.channel_id.as_str())
        && is_clip_link(&msg.content)
    {
        return log_clip(st, msg).await;
    }

    let content = msg.content.trim();
    if msg.channel_id == st.config.channels.match_reports && !content.starts_with('/') {
        return match_report(st, msg).await;
    }

    let (command, args) = match content.split_once(char::is_whitespace) {
        Some((c, rest)) => (c, rest.trim()),
        None => (content, ""),
    };
    if !command.starts_with('/') {
        return DispatchOutcome::Ignored;
    }

    info!(command, author = %msg.author_id, channel = %msg.channel_id, "command");
    match command {
        CMD_HELP => {
            say(st, &msg.channel_id, &help_card()).await;
            DispatchOutcome::completed(command)
        }
        CMD_TEST => status_echo(st, msg).await,
        CMD_SERVER_ID => {
            say(st, &msg.channel_id, &msg.server_id).await;
            DispatchOutcome::completed(command)
        }
        CMD_SHOW => show(st, msg, args).await,
        CMD_SCAN_USERS => scan_users(st, msg).await,
        CMD_ASSIGN_ROLES => assign_roles(st, msg).await,
        CMD_WEB_ASSIGN_ROLES => web_assign_roles(st, msg).await,
        CMD_DELETE_ROLES => delete_roles_start(st, msg).await,
        _ => DispatchOutcome::Ignored,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Send failures are logged and otherwise ignored.
async fn say(st: &AppState, channel: &str, text: &str) {
    if let Err(e) = st.channel.send(channel, text).await {
        warn!(channel, error = %e, "message send failed");
    }
}

async fn say_lines(st: &AppState, channel: &str, lines: &[String]) {
    for chunk in chunk_lines(lines, MESSAGE_LIMIT) {
        say(st, channel, &chunk).await;
    }
}

async fn fail(st: &AppState, msg: &InboundMessage, command: &str, err: String) -> DispatchOutcome {
    error!(command, error = %err, "command failed");
    st.log_line("ERROR", format!("{command} failed: {err}"));
    say(
        st,
        &msg.channel_id,
        &diff_block(&format!("- {command} ERROR: {err}")),
    )
    .await;
    DispatchOutcome::Failed {
        command: command.to_string(),
        error: err,
    }
}

/// Admin check, then Idle -> InUse. Refusals are reported to the channel.
async fn enter<'a>(
    st: &'a AppState,
    msg: &InboundMessage,
    command: &str,
) -> Result<LockTicket<'a>, DispatchOutcome> {
    if !st.config.is_admin(&msg.author_id) {
        warn!(command, author = %msg.author_id, "not authorized");
        say(st, &msg.channel_id, &not_authorized(command, &msg.author_name)).await;
        return Err(DispatchOutcome::Unauthorized {
            command: command.to_string(),
        });
    }
    match st.lock.try_enter(command, &msg.author_id, &msg.channel_id) {
        Ok(ticket) => {
            st.log_line("INFO", format!("{command} started by {}", msg.author_name));
            Ok(ticket)
        }
        Err(busy) => {
            say(st, &msg.channel_id, &in_progress(command)).await;
            Err(DispatchOutcome::Busy {
                command: command.to_string(),
                held_by: busy.held_by,
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Watched channels
// ---------------------------------------------------------------------------

async fn log_clip(st: &AppState, msg: &InboundMessage) -> DispatchOutcome {
    let appended = st.match_log.lock().await.append(
        LogKind::Clip,
        &msg.author_id,
        &msg.channel_id,
        &msg.content,
        Value::Null,
    );
    match appended {
        Ok(ev) => DispatchOutcome::ClipLogged { seq: ev.seq },
        Err(e) => {
            error!(error = ?e, "clip log append failed");
            DispatchOutcome::Ignored
        }
    }
}

async fn match_report(st: &AppState, msg: &InboundMessage) -> DispatchOutcome {
    let verdict = stb_report::parse(&msg.content);
    say(
        st,
        &msg.channel_id,
        &stb_report::render_verdict(&verdict, &msg.content),
    )
    .await;

    let (kind, detail) = match &verdict {
        Ok(report) => (
            LogKind::Accepted,
            serde_json::to_value(report).unwrap_or(Value::Null),
        ),
        Err(reason) => (LogKind::Rejected, json!({ "reason": reason.to_string() })),
    };
    let seq = match st.match_log.lock().await.append(
        kind,
        &msg.author_id,
        &msg.channel_id,
        &msg.content,
        detail,
    ) {
        Ok(ev) => Some(ev.seq),
        Err(e) => {
            error!(error = ?e, "match log append failed");
            None
        }
    };

    match verdict {
        Ok(_) => DispatchOutcome::ReportAccepted { seq },
        Err(reason) => {
            if let Err(e) = st
                .channel
                .delete_message(&msg.channel_id, &msg.message_id)
                .await
            {
                warn!(message_id = %msg.message_id, error = %e, "rejected report delete failed");
            }
            DispatchOutcome::ReportRejected {
                reason: reason.to_string(),
                seq,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Open commands
// ---------------------------------------------------------------------------

async fn status_echo(st: &AppState, msg: &InboundMessage) -> DispatchOutcome {
    let snap = st.status_snapshot().await;
    let body = format!(
        "+ {CMD_TEST} {} {}\nlock: {}\nbatches: {}\nuptime: {}s",
        st.build.service, st.build.version, snap.lock, snap.batch_count, snap.bot_uptime_secs
    );
    say(st, &msg.channel_id, &diff_block(&body)).await;
    DispatchOutcome::completed(CMD_TEST)
}

async fn show(st: &AppState, msg: &InboundMessage, name: &str) -> DispatchOutcome {
    if !st.config.is_privileged(&msg.author_id) {
        say(st, &msg.channel_id, &not_authorized(CMD_SHOW, &msg.author_name)).await;
        return DispatchOutcome::Unauthorized {
            command: CMD_SHOW.to_string(),
        };
    }
    if name.is_empty() {
        say(st, &msg.channel_id, "usage: /show <name>").await;
        return DispatchOutcome::completed(CMD_SHOW);
    }
    let players: Players = match load_json(st.store.as_ref(), BLOB_PLAYERS) {
        Ok(p) => p,
        Err(e) => return fail(st, msg, CMD_SHOW, format!("{e:#}")).await,
    };
    say(st, &msg.channel_id, &render_player(&players, name)).await;
    DispatchOutcome::completed(CMD_SHOW)
}

// ---------------------------------------------------------------------------
// /scan_users
// ---------------------------------------------------------------------------

async fn scan_users(st: &AppState, msg: &InboundMessage) -> DispatchOutcome {
    let _ticket = match enter(st, msg, CMD_SCAN_USERS).await {
        Ok(t) => t,
        Err(refused) => return refused,
    };
    say(
        st,
        &msg.channel_id,
        &diff_block(&format!("+ {CMD_SCAN_USERS} SCAN STARTING")),
    )
    .await;

    let read = match read_roster(st.roster_source.as_ref(), &st.config.roster).await {
        Ok(r) => r,
        Err(e) => return fail(st, msg, CMD_SCAN_USERS, format!("{e:#}")).await,
    };
    let snapshot = match capture(st).await {
        Ok(s) => s,
        Err(e) => return fail(st, msg, CMD_SCAN_USERS, format!("{e:#}")).await,
    };

    let report = scan_roster(&read.roster, &snapshot);
    say_lines(st, &msg.channel_id, &report.detail_lines()).await;

    let persisted = store_json(st.store.as_ref(), BLOB_ROSTER, &report.roster)
        .and_then(|()| store_json(st.store.as_ref(), BLOB_PLAYERS, &report.players));
    if let Err(e) = persisted {
        return fail(st, msg, CMD_SCAN_USERS, format!("{e:#}")).await;
    }

    say(st, &msg.channel_id, &report.summary()).await;
    info!(
        found = report.found,
        typos = report.typos.len(),
        missing = report.missing.len(),
        "user scan complete"
    );
    DispatchOutcome::Completed {
        command: CMD_SCAN_USERS.to_string(),
        detail: Some(format!(
            "found={} typos={} missing={}",
            report.found,
            report.typos.len(),
            report.missing.len()
        )),
    }
}

// ---------------------------------------------------------------------------
// /assignroles, /webassignroles
// ---------------------------------------------------------------------------

async fn capture(st: &AppState) -> anyhow::Result<DirectorySnapshot> {
    DirectorySnapshot::capture(
        st.directory.as_ref(),
        &st.config.server_id,
        st.config.member_page_size,
    )
    .await
    .context("directory snapshot failed")
}

/// Snapshot, reconcile and post the audit lines. A failed snapshot is
/// run-fatal; mutation failures are not.
async fn run_reconcile(st: &AppState, roster: &Roster) -> anyhow::Result<RunReport> {
    let snapshot = capture(st).await?;
    let mut ledger = st.ledger.lock().await;
    let mut ctx = ReconcileContext {
        directory: st.directory.as_ref(),
        roles: &st.config.roles,
        team_role_color: st.config.team_role_color,
        snapshot,
        ledger: &mut *ledger,
        store: st.store.as_ref(),
    };
    Ok(reconcile(&mut ctx, roster).await)
}

fn report_summary(report: &RunReport) -> String {
    let mut out = format!(
        "added: {}\nremoved: {}\ncreated: {}\nskipped: {}\nfailures: {}",
        report.roles_added,
        report.roles_removed,
        report.created_roles.len(),
        report.skipped.len(),
        report.failures.len()
    );
    if let Some(batch) = &report.batch_id {
        out.push_str(&format!("\nbatch: {batch}"));
    }
    if let Some(reason) = &report.aborted {
        out.push_str(&format!("\n- ABORTED: {reason}"));
    }
    out
}

async fn post_report(st: &AppState, channel: &str, report: &RunReport) {
    say_lines(st, channel, &report.lines).await;
    let failures: Vec<String> = report
        .failures
        .iter()
        .map(|f| format!("- {} {} failed: {}", f.kind, f.subject, f.error))
        .collect();
    if !failures.is_empty() {
        for chunk in chunk_lines(&failures, MESSAGE_LIMIT - 16) {
            say(st, channel, &diff_block(&chunk)).await;
        }
    }
}

fn run_outcome(command: &str, report: &RunReport) -> DispatchOutcome {
    DispatchOutcome::Completed {
        command: command.to_string(),
        detail: Some(format!(
            "run_id={} added={} removed={} created={} failures={}",
            report.run_id,
            report.roles_added,
            report.roles_removed,
            report.created_roles.len(),
            report.failures.len()
        )),
    }
}

async fn assign_roles(st: &AppState, msg: &InboundMessage) -> DispatchOutcome {
    let _ticket = match enter(st, msg, CMD_ASSIGN_ROLES).await {
        Ok(t) => t,
        Err(refused) => return refused,
    };

    let roster: Roster = match load_json_opt(st.store.as_ref(), BLOB_ROSTER) {
        Ok(Some(r)) => r,
        Ok(None) => {
            return fail(
                st,
                msg,
                CMD_ASSIGN_ROLES,
                format!("no cached roster, run {CMD_SCAN_USERS} first"),
            )
            .await
        }
        Err(e) => return fail(st, msg, CMD_ASSIGN_ROLES, format!("{e:#}")).await,
    };

    say(
        st,
        &msg.channel_id,
        &fix_block(&format!("+ {CMD_ASSIGN_ROLES} ROLE ASSIGNMENT STARTED")),
    )
    .await;
    let report = match run_reconcile(st, &roster).await {
        Ok(r) => r,
        Err(e) => return fail(st, msg, CMD_ASSIGN_ROLES, format!("{e:#}")).await,
    };
    post_report(st, &msg.channel_id, &report).await;
    say(
        st,
        &msg.channel_id,
        &diff_block(&format!(
            "+ {CMD_ASSIGN_ROLES} ROLE ASSIGNMENT COMPLETE\n{}",
            report_summary(&report)
        )),
    )
    .await;
    run_outcome(CMD_ASSIGN_ROLES, &report)
}

async fn web_assign_roles(st: &AppState, msg: &InboundMessage) -> DispatchOutcome {
    let _ticket = match enter(st, msg, CMD_WEB_ASSIGN_ROLES).await {
        Ok(t) => t,
        Err(refused) => return refused,
    };
    say(
        st,
        &msg.channel_id,
        &fix_block(&format!("+ {CMD_WEB_ASSIGN_ROLES} ROLE UPDATE STARTED")),
    )
    .await;

    let read = match read_roster(st.roster_source.as_ref(), &st.config.roster).await {
        Ok(r) => r,
        Err(e) => return fail(st, msg, CMD_WEB_ASSIGN_ROLES, format!("{e:#}")).await,
    };
    if !read.teams.dropped.is_empty() {
        info!(dropped = ?read.teams.dropped, "team block names not on the roster");
    }

    let report = match run_reconcile(st, &read.roster).await {
        Ok(r) => r,
        Err(e) => return fail(st, msg, CMD_WEB_ASSIGN_ROLES, format!("{e:#}")).await,
    };
    post_report(st, &msg.channel_id, &report).await;
    say(
        st,
        &msg.channel_id,
        &diff_block(&format!(
            "+ {CMD_WEB_ASSIGN_ROLES} ROLE UPDATE COMPLETE\n{}",
            report_summary(&report)
        )),
    )
    .await;
    run_outcome(CMD_WEB_ASSIGN_ROLES, &report)
}

// ---------------------------------------------------------------------------
// /deleteroles (interactive)
// ---------------------------------------------------------------------------

async fn delete_roles_start(st: &AppState, msg: &InboundMessage) -> DispatchOutcome {
    let ticket = match enter(st, msg, CMD_DELETE_ROLES).await {
        Ok(t) => t,
        Err(refused) => return refused,
    };

    let listing = {
        let ledger = st.ledger.lock().await;
        if ledger.is_empty() {
            None
        } else {
            Some(ledger.render_list())
        }
    };
    let Some(listing) = listing else {
        say(
            st,
            &msg.channel_id,
            &diff_block(&format!("- {CMD_DELETE_ROLES} ERROR: no batches")),
        )
        .await;
        return DispatchOutcome::Completed {
            command: CMD_DELETE_ROLES.to_string(),
            detail: Some("no batches".to_string()),
        };
    };

    say(
        st,
        &msg.channel_id,
        &fix_block(&format!(
            "+ {CMD_DELETE_ROLES} STARTING\n\nPlease enter batchnumber of roles to be deleted from below:\n"
        )),
    )
    .await;
    let lines: Vec<String> = listing.lines().map(str::to_string).collect();
    say_lines(st, &msg.channel_id, &lines).await;

    ticket.await_input(ExpectedInput::BatchId);
    DispatchOutcome::AwaitingInput {
        command: CMD_DELETE_ROLES.to_string(),
    }
}

/// The owner's follow-up message. The lock is already back to Idle; the
/// deletion itself re-enters it so the ledger is only mutated under the lock.
async fn delete_roles_select(
    st: &AppState,
    msg: &InboundMessage,
    pending: PendingInput,
) -> DispatchOutcome {
    let command = pending.command.as_str();
    let mut ledger = st.ledger.lock().await;

    let batch_id = match ledger.parse_selection(&msg.content) {
        Ok(id) => id,
        Err(e) => {
            info!(command, input = %msg.content.trim(), error = %e, "invalid batch selection");
            say(
                st,
                &msg.channel_id,
                &diff_block(&format!("- {command} ERROR: INVALID SELECTION")),
            )
            .await;
            return DispatchOutcome::InvalidSelection {
                command: command.to_string(),
            };
        }
    };

    let _ticket = match st
        .lock
        .try_enter(command, &msg.author_id, &msg.channel_id)
    {
        Ok(t) => t,
        Err(busy) => {
            say(st, &msg.channel_id, &in_progress(command)).await;
            return DispatchOutcome::Busy {
                command: command.to_string(),
                held_by: busy.held_by,
            };
        }
    };

    say(
        st,
        &msg.channel_id,
        &fix_block(&format!("+ {command} DELETING ROLES")),
    )
    .await;
    let notices: Vec<String> = ledger
        .get(&batch_id)
        .map(|b| {
            b.teams
                .iter()
                .filter_map(|t| {
                    t.role_id
                        .as_ref()
                        .map(|r| format!("> Deleting {} {}", t.name, r.mention()))
                })
                .collect()
        })
        .unwrap_or_default();
    say_lines(st, &msg.channel_id, &notices).await;

    let report = match ledger
        .delete(&batch_id, st.directory.as_ref(), &st.config.server_id)
        .await
    {
        Ok(r) => r,
        Err(e) => return fail(st, msg, command, e.to_string()).await,
    };
    if !report.failed.is_empty() {
        let lines: Vec<String> = report
            .failed
            .iter()
            .map(|(name, role, e)| format!("- failed to delete {name} {}: {e}", role.mention()))
            .collect();
        for chunk in chunk_lines(&lines, MESSAGE_LIMIT - 16) {
            say(st, &msg.channel_id, &diff_block(&chunk)).await;
        }
    }
    if let Err(e) = ledger.save(st.store.as_ref()) {
        return fail(st, msg, command, format!("{e:#}")).await;
    }

    say(st, &msg.channel_id, &diff_block(&format!("+ {command} DONE"))).await;
    info!(
        batch_id = %batch_id,
        deleted = report.deleted.len(),
        failed = report.failed.len(),
        "batch deleted"
    );
    DispatchOutcome::Completed {
        command: command.to_string(),
        detail: Some(format!(
            "batch={batch_id} deleted={} failed={}",
            report.deleted.len(),
            report.failed.len()
        )),
    }
}
