//! Directory Snapshot: a point-in-time read of members and roles.
//!
//! Built fresh for each run and owned by that run's context.

use std::collections::{BTreeMap, BTreeSet};

use stb_schemas::{DirectoryService, IdentityId, Member, Role, ServiceError};
use tracing::debug;

#[derive(Clone, Debug, Default)]
pub struct DirectorySnapshot {
    pub server: String,
    /// external handle -> identity
    handles: BTreeMap<String, IdentityId>,
    identities: BTreeSet<IdentityId>,
    /// role name -> role; the last role listed wins on duplicate names
    roles_by_name: BTreeMap<String, Role>,
}

impl DirectorySnapshot {
    pub fn from_parts(server: impl Into<String>, roles: Vec<Role>, members: Vec<Member>) -> Self {
        let mut snap = Self {
            server: server.into(),
            ..Self::default()
        };
        for role in roles {
            snap.roles_by_name.insert(role.name.clone(), role);
        }
        for m in members {
            snap.handles.insert(m.handle(), m.identity_id.clone());
            snap.identities.insert(m.identity_id);
        }
        snap
    }

    /// List every role and page through every member.
    pub async fn capture(
        directory: &dyn DirectoryService,
        server: &str,
        page_size: usize,
    ) -> Result<Self, ServiceError> {
        let page_size = page_size.max(1);
        let roles = directory.list_roles(server).await?;

        let mut members: Vec<Member> = Vec::new();
        let mut after: Option<IdentityId> = None;
        loop {
            let page = directory
                .list_members(server, after.as_ref(), page_size)
                .await?;
            let n = page.len();
            debug!(server, page_len = n, "member page");
            after = page.last().map(|m| m.identity_id.clone());
            members.extend(page);
            if n < page_size {
                break;
            }
        }

        Ok(Self::from_parts(server, roles, members))
    }

    /// Identity for an external handle, if it is a member.
    pub fn resolve(&self, handle: &str) -> Option<&IdentityId> {
        self.handles.get(handle)
    }

    pub fn exists(&self, identity: &IdentityId) -> bool {
        self.identities.contains(identity)
    }

    /// Resolve the handle and confirm the identity is still a member.
    pub fn member(&self, handle: &str) -> Option<&IdentityId> {
        self.resolve(handle).filter(|id| self.exists(id))
    }

    pub fn role_named(&self, name: &str) -> Option<&Role> {
        self.roles_by_name.get(name)
    }

    /// Record a role created during the run.
    pub fn insert_role(&mut self, role: Role) {
        self.roles_by_name.insert(role.name.clone(), role);
    }

    pub fn member_count(&self) -> usize {
        self.identities.len()
    }

    pub fn role_count(&self) -> usize {
        self.roles_by_name.len()
    }

    /// All known handles, sorted.
    pub fn handles(&self) -> impl Iterator<Item = (&str, &IdentityId)> {
        self.handles.iter().map(|(h, id)| (h.as_str(), id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stb_schemas::RoleId;

    #[test]
    fn from_parts_indexes_handles_and_roles() {
        let snap = DirectorySnapshot::from_parts(
            "g",
            vec![Role {
                id: RoleId::new("1"),
                name: "Zerg".to_string(),
                color: 0,
            }],
            vec![Member::new("10", "alice", "0001"), Member::new("11", "bob", "0")],
        );
        assert_eq!(snap.resolve("alice#0001"), Some(&IdentityId::new("10")));
        assert_eq!(snap.member("bob"), Some(&IdentityId::new("11")));
        assert!(snap.member("alice").is_none());
        assert_eq!(snap.role_named("Zerg").map(|r| r.id.as_str()), Some("1"));
        assert_eq!(snap.member_count(), 2);
    }

    #[test]
    fn inserted_role_is_found_by_name() {
        let mut snap = DirectorySnapshot::default();
        assert!(snap.role_named("Phoenix").is_none());
        snap.insert_role(Role {
            id: RoleId::new("900"),
            name: "Phoenix".to_string(),
            color: 2358021,
        });
        assert_eq!(snap.role_count(), 1);
        assert!(snap.role_named("Phoenix").is_some());
    }
}
