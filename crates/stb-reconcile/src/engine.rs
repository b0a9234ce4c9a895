//! Reconciliation Engine.
//!
//! Two passes over a normalized roster:
//!
//! 1. Users: resolve each entry's handle in the snapshot (absent = skip),
//!    then set every planned dimension (add target, remove siblings).
//! 2. Teams: create a role for every referenced team name the directory
//!    does not have yet, recording created roles in one new ledger batch,
//!    persist the ledger, then add each team's role to its members.
//!
//! Every mutation is checked on its own. A failure is logged, recorded in
//! the [`RunReport`], and processing continues. Partial application is an
//! accepted outcome.

use std::collections::BTreeSet;
use std::fmt;

use chrono::Utc;
use serde::Serialize;
use stb_schemas::{
    DirectoryService, IdentityId, Role, RoleEdit, RoleId, RoleMapping, Roster, RosterEntry,
};
use stb_store::BlobStore;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::ledger::{BatchLedger, TeamRecord};
use crate::plan::plan_entry;
use crate::snapshot::DirectorySnapshot;

/// Everything one run needs. Owned by the caller; rebuilt for every run.
pub struct ReconcileContext<'a> {
    pub directory: &'a dyn DirectoryService,
    pub roles: &'a RoleMapping,
    pub team_role_color: u32,
    pub snapshot: DirectorySnapshot,
    pub ledger: &'a mut BatchLedger,
    pub store: &'a dyn BlobStore,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    AddRole,
    RemoveRole,
    CreateRole,
    EditRole,
    PersistLedger,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MutationKind::AddRole => "add_role",
            MutationKind::RemoveRole => "remove_role",
            MutationKind::CreateRole => "create_role",
            MutationKind::EditRole => "edit_role",
            MutationKind::PersistLedger => "persist_ledger",
        };
        f.write_str(s)
    }
}

/// One failed mutation. The run kept going.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RunFailure {
    pub kind: MutationKind,
    /// Screen name or team name the mutation was for.
    pub subject: String,
    pub identity: Option<IdentityId>,
    pub role: Option<RoleId>,
    pub error: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The entry's handle is not a member of the directory.
    IdentityNotFound,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Skip {
    pub screen_name: String,
    pub external_handle: String,
    pub reason: SkipReason,
}

#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Operator-facing audit lines, in the order the work happened.
    pub lines: Vec<String>,
    pub failures: Vec<RunFailure>,
    pub skipped: Vec<Skip>,
    /// Team roles created this run.
    pub created_roles: Vec<TeamRecord>,
    /// (identity, team role) pairs added this run, for rollback.
    pub team_assignments: Vec<(IdentityId, RoleId)>,
    /// Batch opened this run, if any role was created.
    pub batch_id: Option<String>,
    pub roles_added: usize,
    pub roles_removed: usize,
    /// Set when the run stopped early; the work before it stands.
    pub aborted: Option<String>,
}

impl RunReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            lines: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
            created_roles: Vec::new(),
            team_assignments: Vec::new(),
            batch_id: None,
            roles_added: 0,
            roles_removed: 0,
            aborted: None,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.aborted.is_none()
    }

    fn fail(
        &mut self,
        kind: MutationKind,
        subject: &str,
        identity: Option<&IdentityId>,
        role: Option<&RoleId>,
        error: impl fmt::Display,
    ) {
        error!(
            run_id = %self.run_id,
            %kind,
            subject,
            identity = identity.map(IdentityId::as_str).unwrap_or(""),
            role = role.map(RoleId::as_str).unwrap_or(""),
            error = %error,
            "mutation failed; continuing"
        );
        self.failures.push(RunFailure {
            kind,
            subject: subject.to_string(),
            identity: identity.cloned(),
            role: role.cloned(),
            error: error.to_string(),
        });
    }
}

/// Run one reconciliation of `roster` against the context's snapshot.
pub async fn reconcile(ctx: &mut ReconcileContext<'_>, roster: &Roster) -> RunReport {
    let mut report = RunReport::new(Uuid::new_v4());
    info!(
        run_id = %report.run_id,
        entries = roster.len(),
        members = ctx.snapshot.member_count(),
        roles = ctx.snapshot.role_count(),
        "reconcile start"
    );

    for entry in roster.values() {
        reconcile_user(ctx, entry, &mut report).await;
    }

    if let Err(e) = create_missing_team_roles(ctx, roster, &mut report).await {
        error!(run_id = %report.run_id, error = %e, "reconcile aborted");
        report.aborted = Some(e.to_string());
        return report;
    }

    assign_team_roles(ctx, roster, &mut report).await;

    info!(
        run_id = %report.run_id,
        added = report.roles_added,
        removed = report.roles_removed,
        created = report.created_roles.len(),
        skipped = report.skipped.len(),
        failures = report.failures.len(),
        "reconcile done"
    );
    report
}

async fn reconcile_user(ctx: &ReconcileContext<'_>, entry: &RosterEntry, report: &mut RunReport) {
    let server = ctx.snapshot.server.as_str();
    let Some(identity) = ctx.snapshot.member(&entry.external_handle).cloned() else {
        info!(
            run_id = %report.run_id,
            screen_name = %entry.screen_name,
            handle = %entry.external_handle,
            "identity not found; skipped"
        );
        report.skipped.push(Skip {
            screen_name: entry.screen_name.clone(),
            external_handle: entry.external_handle.clone(),
            reason: SkipReason::IdentityNotFound,
        });
        return;
    };

    for change in plan_entry(entry, ctx.roles) {
        let mut ok = true;

        if let Some(role) = &change.add {
            match ctx.directory.add_role(server, &identity, role).await {
                Ok(()) => report.roles_added += 1,
                Err(e) => {
                    ok = false;
                    report.fail(MutationKind::AddRole, &entry.screen_name, Some(&identity), Some(role), e);
                }
            }
        }

        let mut removals_ok = true;
        for role in &change.remove {
            match ctx.directory.remove_role(server, &identity, role).await {
                Ok(()) => report.roles_removed += 1,
                Err(e) => {
                    removals_ok = false;
                    report.fail(MutationKind::RemoveRole, &entry.screen_name, Some(&identity), Some(role), e);
                }
            }
        }

        // A value without a role of its own counts as applied once its
        // siblings are gone.
        if change.add.is_none() {
            ok = removals_ok;
        }
        if ok {
            report.lines.push(format!(
                "> Assigned {} {} to {}",
                identity.mention(),
                entry.screen_name,
                change.label
            ));
        }
    }
}

async fn create_missing_team_roles(
    ctx: &mut ReconcileContext<'_>,
    roster: &Roster,
    report: &mut RunReport,
) -> Result<(), crate::ledger::LedgerError> {
    let team_names: BTreeSet<&str> = roster
        .values()
        .filter(|e| e.has_team())
        .map(|e| e.team.as_str())
        .collect();

    let server = ctx.snapshot.server.clone();
    for name in team_names {
        if ctx.snapshot.role_named(name).is_some() {
            continue;
        }

        let batch_id = match &report.batch_id {
            Some(id) => id.clone(),
            None => {
                let id = ctx.ledger.open_batch(Utc::now())?;
                info!(run_id = %report.run_id, batch_id = %id, "batch opened");
                report.batch_id = Some(id.clone());
                id
            }
        };

        let created = match ctx.directory.create_role(&server).await {
            Ok(r) => r,
            Err(e) => {
                report.fail(MutationKind::CreateRole, name, None, None, e);
                continue;
            }
        };

        let edit = RoleEdit {
            name: name.to_string(),
            color: ctx.team_role_color,
            hoist: false,
            permissions: 0,
            mentionable: true,
        };
        let named: Option<Role> = match ctx.directory.edit_role(&server, &created.id, &edit).await {
            Ok(r) => Some(r),
            Err(e) => {
                report.fail(MutationKind::EditRole, name, None, Some(&created.id), e);
                None
            }
        };

        let record = TeamRecord {
            name: name.to_string(),
            role_id: Some(created.id.clone()),
            members: roster.values().filter(|e| e.team == name).cloned().collect(),
            created_in_batch: Some(batch_id.clone()),
        };
        ctx.ledger.push_team(&batch_id, record.clone())?;
        report.created_roles.push(record);

        // An unnamed role stays in the ledger for rollback but is not bound
        // to the team.
        if let Some(mut role) = named {
            role.name = name.to_string();
            info!(run_id = %report.run_id, team = name, role = %role.id, batch_id = %batch_id, "team role created");
            report.lines.push(format!("> Created {}", role.id.mention()));
            ctx.snapshot.insert_role(role);
        }
    }

    if let Some(batch_id) = report.batch_id.clone() {
        // Every create failed: nothing to roll back later.
        if ctx.ledger.discard_if_empty(&batch_id) {
            info!(run_id = %report.run_id, batch_id = %batch_id, "empty batch discarded");
            report.batch_id = None;
            return Ok(());
        }
        if let Err(e) = ctx.ledger.save(ctx.store) {
            report.fail(MutationKind::PersistLedger, &batch_id, None, None, format!("{e:#}"));
        }
    }
    Ok(())
}

async fn assign_team_roles(ctx: &ReconcileContext<'_>, roster: &Roster, report: &mut RunReport) {
    let server = ctx.snapshot.server.as_str();
    let team_names: BTreeSet<&str> = roster
        .values()
        .filter(|e| e.has_team())
        .map(|e| e.team.as_str())
        .collect();

    for team in team_names {
        let role_id = ctx.snapshot.role_named(team).map(|r| r.id.clone());
        for entry in roster.values().filter(|e| e.team == team) {
            let Some(identity) = ctx.snapshot.member(&entry.external_handle).cloned() else {
                warn!(run_id = %report.run_id, handle = %entry.external_handle, team, "team member not found");
                report
                    .lines
                    .push(format!("> {} not found on the server", entry.external_handle));
                continue;
            };
            let Some(role) = &role_id else {
                report.fail(
                    MutationKind::AddRole,
                    &entry.screen_name,
                    Some(&identity),
                    None,
                    format!("no role available for team '{team}'"),
                );
                continue;
            };
            match ctx.directory.add_role(server, &identity, role).await {
                Ok(()) => {
                    report.roles_added += 1;
                    report.team_assignments.push((identity.clone(), role.clone()));
                    report.lines.push(format!(
                        "> Assigned {} to {}",
                        identity.mention(),
                        role.mention()
                    ));
                }
                Err(e) => {
                    report.fail(MutationKind::AddRole, &entry.screen_name, Some(&identity), Some(role), e)
                }
            }
        }
    }
}
