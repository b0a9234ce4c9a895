//! stb-roster
//!
//! Roster Source Reader. Pulls the flat player columns and the team block
//! from the roster spreadsheet and normalizes them into a [`Roster`]
//! (screen name -> [`RosterEntry`]).
//!
//! - [`RosterSource`] is the consumed capability (`get_range`).
//! - [`SheetsRosterSource`] implements it over the Sheets v4 values API.
//! - [`parse_player_list`] and [`apply_team_block`] are pure.
//! - [`read_roster`] wires them together; any failed range read aborts.

mod parse;
mod sheets;

pub use parse::{apply_team_block, parse_player_list, PlayerColumns, TeamBlockSummary};
pub use sheets::{SheetsCredential, SheetsRosterSource};

use anyhow::{Context, Result};
use async_trait::async_trait;
use stb_config::RosterLayout;
use stb_schemas::{Roster, ServiceError};
use tracing::info;

/// Rectangular range reads from a spreadsheet. Rows are returned in sheet
/// order; trailing empty cells of a row may be omitted.
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn get_range(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<Vec<Vec<String>>, ServiceError>;
}

/// Everything [`read_roster`] learned besides the roster itself.
#[derive(Debug, Clone, Default)]
pub struct RosterRead {
    pub roster: Roster,
    pub teams: TeamBlockSummary,
}

/// Fetch all five ranges and build the normalized roster.
///
/// The first failing range read aborts the whole read; nothing partial is
/// returned.
pub async fn read_roster(source: &dyn RosterSource, layout: &RosterLayout) -> Result<RosterRead> {
    let id = layout.spreadsheet_id.as_str();
    let columns = PlayerColumns {
        screen_names: fetch(source, id, &layout.ranges.screen_names).await?,
        handles: fetch(source, id, &layout.ranges.handles).await?,
        races: fetch(source, id, &layout.ranges.races).await?,
        groups: fetch(source, id, &layout.ranges.groups).await?,
    };
    let team_rows = fetch(source, id, &layout.ranges.teams).await?;

    let mut roster = parse_player_list(&columns);
    let teams = apply_team_block(&team_rows, &mut roster);

    info!(
        entries = roster.len(),
        teams = teams.team_names.len(),
        assigned = teams.assigned,
        dropped = teams.dropped.len(),
        "roster read"
    );

    Ok(RosterRead { roster, teams })
}

async fn fetch(source: &dyn RosterSource, id: &str, range: &str) -> Result<Vec<Vec<String>>> {
    source
        .get_range(id, range)
        .await
        .with_context(|| format!("roster range read failed: {range}"))
}
