//! Pure roster parsing: flat player columns, then the team block.

use stb_schemas::{Group, Race, Roster, RosterEntry, Tier};
use tracing::debug;

/// The four parallel single-column ranges of the player list. Row `i` of
/// each column belongs to the same player.
#[derive(Debug, Clone, Default)]
pub struct PlayerColumns {
    pub screen_names: Vec<Vec<String>>,
    pub handles: Vec<Vec<String>>,
    pub races: Vec<Vec<String>>,
    pub groups: Vec<Vec<String>>,
}

/// First cell of row `i`, or "" when the row or cell is missing.
fn cell(col: &[Vec<String>], i: usize) -> &str {
    col.get(i)
        .and_then(|row| row.first())
        .map(String::as_str)
        .unwrap_or("")
}

/// Build the roster from the flat columns.
///
/// The screen-name column drives the row count. Rows with a blank screen
/// name are skipped. A later duplicate screen name replaces the earlier row.
pub fn parse_player_list(cols: &PlayerColumns) -> Roster {
    let mut roster = Roster::new();
    for i in 0..cols.screen_names.len() {
        let screen_name = cell(&cols.screen_names, i).trim();
        if screen_name.is_empty() {
            continue;
        }
        let mut entry = RosterEntry::new(screen_name, cell(&cols.handles, i).trim());
        entry.race = Race::parse(cell(&cols.races, i));
        entry.group = Some(Group::parse(cell(&cols.groups, i).trim()));
        roster.insert(screen_name.to_string(), entry);
    }
    roster
}

/// Section header inside the team block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Staff,
    Coaches,
    Tier(Tier),
}

impl Section {
    fn parse(cell: &str) -> Option<Self> {
        match cell {
            "Staff" => Some(Section::Staff),
            "Coaches" => Some(Section::Coaches),
            "Tier 0" => Some(Section::Tier(Tier::T0)),
            "Tier 1" => Some(Section::Tier(Tier::T1)),
            "Tier 2" => Some(Section::Tier(Tier::T2)),
            "Tier 3" => Some(Section::Tier(Tier::T3)),
            _ => None,
        }
    }
}

/// What the team-block pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeamBlockSummary {
    /// Non-empty header cells, in column order.
    pub team_names: Vec<String>,
    /// Number of cells that updated a roster entry.
    pub assigned: usize,
    /// Screen names seen in the block but absent from the roster.
    pub dropped: Vec<String>,
}

/// Apply the team block to an existing roster.
///
/// Row 0 lists team names; empty header cells are compacted away, so team
/// `k` is the k-th non-empty header. Every later row is swept left to
/// right. A header cell ("Staff", "Coaches", "Tier 0".."Tier 3") switches
/// the active section, which stays active until the next header, across row
/// boundaries. Any other non-blank cell is a screen name belonging to team
/// `column / 2`. Cells before the first header, unknown screen names and
/// out-of-range team columns are ignored.
pub fn apply_team_block(rows: &[Vec<String>], roster: &mut Roster) -> TeamBlockSummary {
    let mut summary = TeamBlockSummary::default();
    let Some((header, body)) = rows.split_first() else {
        return summary;
    };

    summary.team_names = header
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();

    let mut section: Option<Section> = None;
    for row in body {
        for (col, raw) in row.iter().enumerate() {
            let value = raw.trim();
            if let Some(s) = Section::parse(value) {
                section = Some(s);
                continue;
            }
            if value.is_empty() {
                continue;
            }
            let Some(active) = section else {
                continue;
            };
            let Some(team) = summary.team_names.get(col / 2) else {
                debug!(col, screen_name = value, "team column out of range");
                continue;
            };
            let Some(entry) = roster.get_mut(value) else {
                summary.dropped.push(value.to_string());
                continue;
            };

            entry.team = team.clone();
            match active {
                Section::Staff => entry.group = Some(Group::Staff),
                Section::Coaches => entry.group = Some(Group::Coach),
                Section::Tier(t) => entry.tier = Some(t),
            }
            summary.assigned += 1;
        }
    }
    summary
}
