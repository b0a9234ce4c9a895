//! User scan: match every roster handle against the directory.
//!
//! A handle that is not a member as written gets one second chance with the
//! case of its first character flipped (`alice#1` <-> `Alice#1`), the most
//! common typo in the sheet. Typo matches count as found, are reported
//! separately, and the cached roster carries the corrected handle so later
//! reconciliation resolves it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use stb_reconcile::DirectorySnapshot;
use stb_schemas::{IdentityId, Roster};

use crate::format::diff_block;

/// What `/show` prints for a screen name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    /// Handle as it resolved in the directory.
    pub handle: String,
    pub identity_id: IdentityId,
}

/// Screen name -> scan result. Persisted as the `players` blob.
pub type Players = BTreeMap<String, PlayerRecord>;

#[derive(Clone, Debug, Default)]
pub struct ScanReport {
    /// Includes typo matches.
    pub found: usize,
    /// (roster handle, identity) for first-letter typo matches.
    pub typos: Vec<(String, IdentityId)>,
    /// Roster handles with no directory member.
    pub missing: Vec<String>,
    pub players: Players,
    /// Input roster with typo'd handles corrected.
    pub roster: Roster,
}

/// `handle` with the case of its first character flipped. `None` when the
/// first character has no case.
pub fn flip_first_case(handle: &str) -> Option<String> {
    let mut chars = handle.chars();
    let first = chars.next()?;
    let flipped: String = if first.is_lowercase() {
        first.to_uppercase().collect()
    } else if first.is_uppercase() {
        first.to_lowercase().collect()
    } else {
        return None;
    };
    Some(flipped + chars.as_str())
}

pub fn scan_roster(roster: &Roster, snapshot: &DirectorySnapshot) -> ScanReport {
    let mut report = ScanReport {
        roster: roster.clone(),
        ..ScanReport::default()
    };

    for (screen_name, entry) in roster {
        let handle = entry.external_handle.as_str();
        if let Some(id) = snapshot.resolve(handle) {
            report.found += 1;
            report.players.insert(
                screen_name.clone(),
                PlayerRecord {
                    handle: handle.to_string(),
                    identity_id: id.clone(),
                },
            );
            continue;
        }

        let alternate = flip_first_case(handle);
        match alternate
            .as_deref()
            .and_then(|alt| snapshot.resolve(alt).map(|id| (alt, id)))
        {
            Some((alt, id)) => {
                report.found += 1;
                report.typos.push((handle.to_string(), id.clone()));
                report.players.insert(
                    screen_name.clone(),
                    PlayerRecord {
                        handle: alt.to_string(),
                        identity_id: id.clone(),
                    },
                );
                if let Some(e) = report.roster.get_mut(screen_name) {
                    e.external_handle = alt.to_string();
                }
            }
            None => report.missing.push(handle.to_string()),
        }
    }
    report
}

impl ScanReport {
    /// One line per typo and per missing user, in roster order.
    pub fn detail_lines(&self) -> Vec<String> {
        let typos = self
            .typos
            .iter()
            .map(|(h, id)| format!("> Found misspelled user: {h} with snowflake id:{id}"));
        let missing = self
            .missing
            .iter()
            .map(|h| format!("[ERROR] cant find user: {h}"));
        typos.chain(missing).collect()
    }

    pub fn summary(&self) -> String {
        diff_block(&format!(
            "+ /scan_users USER SCAN COMPLETE\n**Found:** {}\n**Found Typo'd user:** {}\n**Missing:** {}",
            self.found,
            self.typos.len(),
            self.missing.len()
        ))
    }
}

/// `/show` reply for `name`.
pub fn render_player(players: &Players, name: &str) -> String {
    match players.get(name) {
        Some(p) => format!(
            "**Web Name**: {name}\n**Discord: ** {}\n**SnowflakeID: ** {}\n",
            p.identity_id.mention(),
            p.identity_id
        ),
        None => format!("{name} not found"),
    }
}
