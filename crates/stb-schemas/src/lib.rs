//! stb-schemas
//!
//! Shared domain types for the starbot workspace: roster rows, directory
//! identities and roles, the role mapping used by reconciliation, and the
//! two consumed capability traits (`DirectoryService`, `ChannelMessaging`).
//!
//! No IO lives here. Concrete adapters live in `stb-bot` (Discord REST) and
//! `stb-testkit` (in-memory fakes).

mod services;

pub use services::{ChannelMessaging, DirectoryService, ServiceError};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque, stable identity id assigned by the directory (a Discord snowflake).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IdentityId(pub String);

impl IdentityId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Chat mention markup for this identity.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.0)
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque role id assigned by the directory.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoleId(pub String);

impl RoleId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Chat mention markup for this role.
    pub fn mention(&self) -> String {
        format!("<@&{}>", self.0)
    }
}

impl fmt::Display for RoleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Roster values
// ---------------------------------------------------------------------------

/// In-game race.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Race {
    Zerg,
    Terran,
    Protoss,
}

impl Race {
    pub const ALL: [Race; 3] = [Race::Zerg, Race::Terran, Race::Protoss];

    /// Parse a spreadsheet race cell. Anything else is "no race".
    pub fn parse(cell: &str) -> Option<Self> {
        match cell.trim() {
            "Zerg" => Some(Race::Zerg),
            "Terran" => Some(Race::Terran),
            "Protoss" => Some(Race::Protoss),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Race::Zerg => "Zerg",
            Race::Terran => "Terran",
            Race::Protoss => "Protoss",
        }
    }
}

/// League group of a roster entry.
///
/// `Ambiguous` is what an unrecognised group cell parses to; it is eligible
/// for both Player and Assistant Coach and therefore never drives a group
/// role change on its own. `Staff` likewise has no group role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Group {
    Staff,
    Coach,
    AssistantCoach,
    Player,
    Ambiguous,
}

impl Group {
    /// Parse a flat-column group cell. Only exact labels are recognised.
    pub fn parse(cell: &str) -> Self {
        match cell {
            "Player" => Group::Player,
            "Coach" => Group::Coach,
            "Assistant Coach" => Group::AssistantCoach,
            _ => Group::Ambiguous,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Staff => "Staff",
            Group::Coach => "Coach",
            Group::AssistantCoach => "Assistant Coach",
            Group::Player => "Player",
            Group::Ambiguous => "Player/Assistant Coach",
        }
    }
}

/// Competitive tier, 0 (highest) through 3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    T0,
    T1,
    T2,
    T3,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::T0, Tier::T1, Tier::T2, Tier::T3];

    pub fn index(&self) -> usize {
        match self {
            Tier::T0 => 0,
            Tier::T1 => 1,
            Tier::T2 => 2,
            Tier::T3 => 3,
        }
    }

    pub fn from_index(i: usize) -> Option<Self> {
        Tier::ALL.get(i).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::T0 => "Tier 0",
            Tier::T1 => "Tier 1",
            Tier::T2 => "Tier 2",
            Tier::T3 => "Tier 3",
        }
    }
}

/// One row of the desired roster, keyed by `screen_name`.
///
/// `None` in `race`/`group`/`tier` means "unset": the dimension is left
/// untouched by reconciliation. `team` is empty until the team-block pass
/// assigns it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub screen_name: String,
    pub external_handle: String,
    pub race: Option<Race>,
    pub group: Option<Group>,
    pub tier: Option<Tier>,
    pub team: String,
}

impl RosterEntry {
    pub fn new(screen_name: impl Into<String>, external_handle: impl Into<String>) -> Self {
        Self {
            screen_name: screen_name.into(),
            external_handle: external_handle.into(),
            race: None,
            group: None,
            tier: None,
            team: String::new(),
        }
    }

    pub fn has_team(&self) -> bool {
        !self.team.is_empty()
    }
}

/// Normalized roster: screen name -> entry. Ordered for deterministic runs.
pub type Roster = BTreeMap<String, RosterEntry>;

// ---------------------------------------------------------------------------
// Directory values
// ---------------------------------------------------------------------------

/// A role as the directory reports it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    #[serde(default)]
    pub color: u32,
}

/// A directory member as returned by a member listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub identity_id: IdentityId,
    pub username: String,
    /// Legacy 4-digit discriminator; `"0"` or empty for migrated accounts.
    #[serde(default)]
    pub discriminator: String,
}

impl Member {
    pub fn new(
        identity_id: impl Into<String>,
        username: impl Into<String>,
        discriminator: impl Into<String>,
    ) -> Self {
        Self {
            identity_id: IdentityId::new(identity_id),
            username: username.into(),
            discriminator: discriminator.into(),
        }
    }

    /// External handle as written in the roster: `name#1234`, or the bare
    /// username when the account has no legacy discriminator.
    pub fn handle(&self) -> String {
        match self.discriminator.as_str() {
            "" | "0" => self.username.clone(),
            d => format!("{}#{}", self.username, d),
        }
    }
}

/// Role attributes applied right after creating a team role.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleEdit {
    pub name: String,
    pub color: u32,
    pub hoist: bool,
    pub permissions: u64,
    pub mentionable: bool,
}

// ---------------------------------------------------------------------------
// Role mapping
// ---------------------------------------------------------------------------

/// The four mutually exclusive role dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dimension {
    Group,
    Race,
    Tier,
    Team,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Group => "group",
            Dimension::Race => "race",
            Dimension::Tier => "tier",
            Dimension::Team => "team",
        }
    }
}

/// Fixed directory role ids for the group, race and tier dimensions.
///
/// Team roles are not listed here: they are resolved by name from the
/// directory snapshot and created on demand.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleMapping {
    pub coach: RoleId,
    pub assistant_coach: RoleId,
    pub zerg: RoleId,
    pub terran: RoleId,
    pub protoss: RoleId,
    pub tiers: [RoleId; 4],
}

impl RoleMapping {
    pub fn race_role(&self, race: Race) -> &RoleId {
        match race {
            Race::Zerg => &self.zerg,
            Race::Terran => &self.terran,
            Race::Protoss => &self.protoss,
        }
    }

    pub fn tier_role(&self, tier: Tier) -> &RoleId {
        &self.tiers[tier.index()]
    }

    /// Every role id belonging to a dimension, in a stable order.
    pub fn dimension_roles(&self, dim: Dimension) -> Vec<&RoleId> {
        match dim {
            Dimension::Group => vec![&self.coach, &self.assistant_coach],
            Dimension::Race => vec![&self.zerg, &self.terran, &self.protoss],
            Dimension::Tier => self.tiers.iter().collect(),
            Dimension::Team => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_handle_uses_discriminator_when_present() {
        assert_eq!(Member::new("1", "valar", "1337").handle(), "valar#1337");
        assert_eq!(Member::new("1", "valar", "0").handle(), "valar");
        assert_eq!(Member::new("1", "valar", "").handle(), "valar");
    }

    #[test]
    fn group_parse_is_exact() {
        assert_eq!(Group::parse("Player"), Group::Player);
        assert_eq!(Group::parse("Coach"), Group::Coach);
        assert_eq!(Group::parse("Assistant Coach"), Group::AssistantCoach);
        assert_eq!(Group::parse("player"), Group::Ambiguous);
        assert_eq!(Group::parse(""), Group::Ambiguous);
    }

    #[test]
    fn race_parse_trims_and_rejects_unknown() {
        assert_eq!(Race::parse(" Zerg "), Some(Race::Zerg));
        assert_eq!(Race::parse("Random"), None);
        assert_eq!(Race::parse(""), None);
    }

    #[test]
    fn tier_index_round_trips() {
        for t in Tier::ALL {
            assert_eq!(Tier::from_index(t.index()), Some(t));
        }
        assert_eq!(Tier::from_index(4), None);
    }

    #[test]
    fn mentions_render() {
        assert_eq!(IdentityId::new("42").mention(), "<@42>");
        assert_eq!(RoleId::new("7").mention(), "<@&7>");
    }

    #[test]
    fn role_deserializes_without_color() {
        let r: Role = serde_json::from_str(r#"{"id":"9","name":"Phoenix"}"#).unwrap();
        assert_eq!(r.color, 0);
        assert_eq!(r.id, RoleId::new("9"));
    }
}
