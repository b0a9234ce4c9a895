//! Batch Ledger: every team role the engine created, grouped by the run
//! that created it, so an operator can roll a whole run back.
//!
//! Batch ids are the smallest unused non-negative integer rendered as a
//! string. The ledger is persisted in full as the `batches` blob.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stb_schemas::{DirectoryService, RoleId, RosterEntry, ServiceError};
use stb_store::{load_json, store_json, BlobStore, BLOB_BATCHES};
use tracing::{info, warn};

/// Returned by [`BatchLedger::newest_free_id`] when no id is free. Only a
/// corrupt ledger can produce it.
pub const NO_FREE_ID: &str = "-1";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub name: String,
    /// `None` until the role exists in the directory.
    pub role_id: Option<RoleId>,
    pub members: Vec<RosterEntry>,
    pub created_in_batch: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub teams: Vec<TeamRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerError {
    /// Selection does not name an existing batch.
    UnknownBatch(String),
    /// `newest_free_id` hit the sentinel; the ledger is corrupt.
    NoFreeId,
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::UnknownBatch(id) => write!(f, "unknown batch '{id}'"),
            LedgerError::NoFreeId => write!(f, "batch ledger has no free id (corrupt ledger)"),
        }
    }
}

impl std::error::Error for LedgerError {}

/// Outcome of [`BatchLedger::delete`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteReport {
    pub batch_id: String,
    /// (team name, role) pairs removed from the directory.
    pub deleted: Vec<(String, RoleId)>,
    /// (team name, role, error) for role deletions that failed.
    pub failed: Vec<(String, RoleId, ServiceError)>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchLedger {
    batches: BTreeMap<String, Batch>,
}

impl BatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Missing blob loads as an empty ledger.
    pub fn load(store: &dyn BlobStore) -> Result<Self> {
        load_json(store, BLOB_BATCHES)
    }

    pub fn save(&self, store: &dyn BlobStore) -> Result<()> {
        store_json(store, BLOB_BATCHES, self)
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.batches.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Batch> {
        self.batches.get(id)
    }

    /// Batches in numeric id order.
    pub fn batches(&self) -> Vec<&Batch> {
        let mut out: Vec<&Batch> = self.batches.values().collect();
        out.sort_by_key(|b| (b.id.parse::<u64>().unwrap_or(u64::MAX), b.id.clone()));
        out
    }

    /// Smallest non-negative integer not already used as a batch id.
    ///
    /// Scans `0..=len`; by pigeonhole one of those is always free, so the
    /// [`NO_FREE_ID`] sentinel only comes back for a corrupt ledger.
    pub fn newest_free_id(&self) -> String {
        for i in 0..=self.batches.len() {
            let id = i.to_string();
            if !self.batches.contains_key(&id) {
                return id;
            }
        }
        NO_FREE_ID.to_string()
    }

    /// Open an empty batch under a fresh id.
    pub fn open_batch(&mut self, created_at: DateTime<Utc>) -> Result<String, LedgerError> {
        let id = self.newest_free_id();
        if id == NO_FREE_ID {
            return Err(LedgerError::NoFreeId);
        }
        self.batches.insert(
            id.clone(),
            Batch {
                id: id.clone(),
                created_at,
                teams: Vec::new(),
            },
        );
        Ok(id)
    }

    pub fn push_team(&mut self, batch_id: &str, mut record: TeamRecord) -> Result<(), LedgerError> {
        let batch = self
            .batches
            .get_mut(batch_id)
            .ok_or_else(|| LedgerError::UnknownBatch(batch_id.to_string()))?;
        record.created_in_batch = Some(batch_id.to_string());
        batch.teams.push(record);
        Ok(())
    }

    /// Drop `batch_id` if no team was ever pushed to it. Returns whether it
    /// was dropped.
    pub fn discard_if_empty(&mut self, batch_id: &str) -> bool {
        match self.batches.get(batch_id) {
            Some(b) if b.teams.is_empty() => {
                self.batches.remove(batch_id);
                true
            }
            _ => false,
        }
    }

    /// Interpret operator input as a batch selection. After trimming, the
    /// input must spell an existing batch id exactly, so `007` or `+3` do
    /// not select batch 7 or 3.
    pub fn parse_selection(&self, input: &str) -> Result<String, LedgerError> {
        let trimmed = input.trim();
        if self.batches.contains_key(trimmed) {
            Ok(trimmed.to_string())
        } else {
            Err(LedgerError::UnknownBatch(trimmed.to_string()))
        }
    }

    /// One line per created role, grouped by batch:
    /// `<id>: \t<@&role> name`.
    pub fn render_list(&self) -> String {
        let mut out = String::new();
        for batch in self.batches() {
            for team in &batch.teams {
                let role = team
                    .role_id
                    .as_ref()
                    .map(RoleId::mention)
                    .unwrap_or_else(|| "(no role)".to_string());
                out.push_str(&format!("{}: \t{} {}\n", batch.id, role, team.name));
            }
            if batch.teams.is_empty() {
                out.push_str(&format!("{}: \t(empty)\n", batch.id));
            }
        }
        out
    }

    /// Delete every role of the batch from the directory, then drop the
    /// batch. Role deletion is best-effort: failures are reported and the
    /// ledger entry is removed regardless. The caller persists the ledger.
    pub async fn delete(
        &mut self,
        batch_id: &str,
        directory: &dyn DirectoryService,
        server: &str,
    ) -> Result<DeleteReport, LedgerError> {
        let batch = self
            .batches
            .get(batch_id)
            .ok_or_else(|| LedgerError::UnknownBatch(batch_id.to_string()))?;

        let mut report = DeleteReport {
            batch_id: batch_id.to_string(),
            ..DeleteReport::default()
        };
        for team in &batch.teams {
            let Some(role) = &team.role_id else { continue };
            match directory.delete_role(server, role).await {
                Ok(()) => {
                    info!(batch_id, team = %team.name, role = %role, "team role deleted");
                    report.deleted.push((team.name.clone(), role.clone()));
                }
                Err(e) => {
                    warn!(batch_id, team = %team.name, role = %role, error = %e, "team role delete failed");
                    report.failed.push((team.name.clone(), role.clone(), e));
                }
            }
        }

        self.batches.remove(batch_id);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str, role: &str) -> TeamRecord {
        TeamRecord {
            name: name.to_string(),
            role_id: Some(RoleId::new(role)),
            members: Vec::new(),
            created_in_batch: None,
        }
    }

    #[test]
    fn free_id_fills_gaps_first() {
        let mut l = BatchLedger::new();
        assert_eq!(l.newest_free_id(), "0");
        let a = l.open_batch(Utc::now()).unwrap();
        let b = l.open_batch(Utc::now()).unwrap();
        let c = l.open_batch(Utc::now()).unwrap();
        assert_eq!((a.as_str(), b.as_str(), c.as_str()), ("0", "1", "2"));

        l.batches.remove("1");
        assert_eq!(l.newest_free_id(), "1");
        assert_eq!(l.open_batch(Utc::now()).unwrap(), "1");
        assert_eq!(l.newest_free_id(), "3");
    }

    #[test]
    fn non_numeric_keys_do_not_block_allocation() {
        let mut l = BatchLedger::new();
        for key in ["x", "y"] {
            l.batches.insert(
                key.to_string(),
                Batch {
                    id: key.to_string(),
                    created_at: Utc::now(),
                    teams: Vec::new(),
                },
            );
        }
        assert_eq!(l.newest_free_id(), "0");
    }

    #[test]
    fn push_team_stamps_batch_id() {
        let mut l = BatchLedger::new();
        let id = l.open_batch(Utc::now()).unwrap();
        l.push_team(&id, record("Phoenix", "900")).unwrap();
        let batch = l.get(&id).unwrap();
        assert_eq!(batch.teams[0].created_in_batch.as_deref(), Some("0"));
        assert_eq!(
            l.push_team("7", record("Kraken", "901")),
            Err(LedgerError::UnknownBatch("7".to_string()))
        );
    }

    #[test]
    fn selection_must_be_numeric_and_known() {
        let mut l = BatchLedger::new();
        l.open_batch(Utc::now()).unwrap();
        assert_eq!(l.parse_selection(" 0 "), Ok("0".to_string()));
        assert!(matches!(l.parse_selection("abc"), Err(LedgerError::UnknownBatch(_))));
        assert!(matches!(l.parse_selection("4"), Err(LedgerError::UnknownBatch(_))));
        assert!(matches!(l.parse_selection("-1"), Err(LedgerError::UnknownBatch(_))));
        assert_eq!(
            l.parse_selection("00"),
            Err(LedgerError::UnknownBatch("00".to_string()))
        );

        for _ in 0..7 {
            l.open_batch(Utc::now()).unwrap();
        }
        assert_eq!(l.parse_selection("7"), Ok("7".to_string()));
        assert!(matches!(l.parse_selection("007"), Err(LedgerError::UnknownBatch(_))));
        assert!(matches!(l.parse_selection("+7"), Err(LedgerError::UnknownBatch(_))));
    }

    #[test]
    fn only_empty_batches_are_discarded() {
        let mut l = BatchLedger::new();
        let empty = l.open_batch(Utc::now()).unwrap();
        let full = l.open_batch(Utc::now()).unwrap();
        l.push_team(&full, record("Phoenix", "900")).unwrap();
        assert!(l.discard_if_empty(&empty));
        assert!(!l.discard_if_empty(&full));
        assert!(!l.discard_if_empty("7"));
        assert_eq!(l.len(), 1);
    }

    #[test]
    fn render_list_orders_numerically() {
        let mut l = BatchLedger::new();
        for _ in 0..11 {
            let id = l.open_batch(Utc::now()).unwrap();
            l.push_team(&id, record(&format!("T{id}"), &format!("9{id}"))).unwrap();
        }
        let text = l.render_list();
        let first_two: Vec<&str> = text.lines().take(2).collect();
        assert_eq!(first_two, vec!["0: \t<@&90> T0", "1: \t<@&91> T1"]);
        assert!(text.lines().last().unwrap().starts_with("10: "));
    }

    #[test]
    fn ledger_json_is_keyed_by_batch_id() {
        let mut l = BatchLedger::new();
        let id = l.open_batch(Utc::now()).unwrap();
        l.push_team(&id, record("Phoenix", "900")).unwrap();
        let v = serde_json::to_value(&l).unwrap();
        assert_eq!(v["0"]["teams"][0]["name"], "Phoenix");
        let back: BatchLedger = serde_json::from_value(v).unwrap();
        assert_eq!(back, l);
    }
}
