//! Desired-state planning for the group, race and tier dimensions.
//!
//! Pure. Setting a dimension is one idempotent operation: add the target
//! role, remove every other role of that dimension. An unset dimension is
//! never touched.

use stb_schemas::{Dimension, Group, RoleId, RoleMapping, RosterEntry};

/// One dimension to set for one user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DimensionChange {
    pub dimension: Dimension,
    /// Human label of the desired value ("Coach", "Zerg", "Tier 2").
    pub label: &'static str,
    /// `None` when the value has no role of its own (group = Player).
    pub add: Option<RoleId>,
    pub remove: Vec<RoleId>,
}

fn set_dimension(
    roles: &RoleMapping,
    dimension: Dimension,
    label: &'static str,
    target: Option<&RoleId>,
) -> DimensionChange {
    let remove = roles
        .dimension_roles(dimension)
        .into_iter()
        .filter(|r| Some(*r) != target)
        .cloned()
        .collect();
    DimensionChange {
        dimension,
        label,
        add: target.cloned(),
        remove,
    }
}

/// Changes for one roster entry, in group, race, tier order.
///
/// Staff and the ambiguous Player/Assistant Coach group have no group role
/// and leave the group dimension alone. Player has no positive role but
/// still clears Coach and Assistant Coach.
pub fn plan_entry(entry: &RosterEntry, roles: &RoleMapping) -> Vec<DimensionChange> {
    let mut out = Vec::with_capacity(3);

    match entry.group {
        Some(Group::Coach) => out.push(set_dimension(
            roles,
            Dimension::Group,
            Group::Coach.as_str(),
            Some(&roles.coach),
        )),
        Some(Group::AssistantCoach) => out.push(set_dimension(
            roles,
            Dimension::Group,
            Group::AssistantCoach.as_str(),
            Some(&roles.assistant_coach),
        )),
        Some(Group::Player) => out.push(set_dimension(
            roles,
            Dimension::Group,
            Group::Player.as_str(),
            None,
        )),
        Some(Group::Staff) | Some(Group::Ambiguous) | None => {}
    }

    if let Some(race) = entry.race {
        out.push(set_dimension(
            roles,
            Dimension::Race,
            race.as_str(),
            Some(roles.race_role(race)),
        ));
    }

    if let Some(tier) = entry.tier {
        out.push(set_dimension(
            roles,
            Dimension::Tier,
            tier.as_str(),
            Some(roles.tier_role(tier)),
        ));
    }

    out
}
