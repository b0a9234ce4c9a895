//! Deterministic in-memory directory.
//!
//! Holds roles, members and role holdings for any number of servers (the
//! server argument is recorded but not used to partition state). Created
//! roles get ids counting up from 9000. No network I/O.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use stb_schemas::{DirectoryService, IdentityId, Member, Role, RoleEdit, RoleId, ServiceError};

/// One recorded directory call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    ListRoles,
    ListMembers {
        after: Option<IdentityId>,
        limit: usize,
    },
    AddRole(IdentityId, RoleId),
    RemoveRole(IdentityId, RoleId),
    CreateRole,
    EditRole(RoleId, String),
    DeleteRole(RoleId),
}

impl Call {
    /// True for calls that change directory state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Call::ListRoles | Call::ListMembers { .. })
    }
}

/// Operations that can be made to fail with [`FakeDirectory::inject_failure`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FakeOp {
    ListRoles,
    ListMembers,
    AddRole,
    RemoveRole,
    CreateRole,
    EditRole,
    DeleteRole,
}

const FIRST_CREATED_ROLE_ID: u64 = 9000;

#[derive(Debug)]
struct FakeState {
    roles: BTreeMap<RoleId, Role>,
    members: BTreeMap<IdentityId, Member>,
    holdings: BTreeMap<IdentityId, BTreeSet<RoleId>>,
    calls: Vec<Call>,
    /// op -> role filter; `None` fails every call of that op.
    failures: Vec<(FakeOp, Option<RoleId>)>,
    next_role_id: u64,
}

#[derive(Debug)]
pub struct FakeDirectory {
    state: Mutex<FakeState>,
}

impl Default for FakeDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                roles: BTreeMap::new(),
                members: BTreeMap::new(),
                holdings: BTreeMap::new(),
                calls: Vec::new(),
                failures: Vec::new(),
                next_role_id: FIRST_CREATED_ROLE_ID,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn with_role(self, id: &str, name: &str) -> Self {
        let id = RoleId::new(id);
        self.state().roles.insert(
            id.clone(),
            Role {
                id,
                name: name.to_string(),
                color: 0,
            },
        );
        self
    }

    pub fn with_member(self, id: &str, username: &str, discriminator: &str) -> Self {
        let member = Member::new(id, username, discriminator);
        self.state()
            .members
            .insert(member.identity_id.clone(), member);
        self
    }

    /// Give `identity` a role without recording a call.
    pub fn grant(self, identity: &str, role: &str) -> Self {
        self.state()
            .holdings
            .entry(IdentityId::new(identity))
            .or_default()
            .insert(RoleId::new(role));
        self
    }

    /// Fail every later call of `op`, or only those touching `role`.
    pub fn inject_failure(&self, op: FakeOp, role: Option<RoleId>) {
        self.state().failures.push((op, role));
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    pub fn roles_of(&self, identity: &str) -> BTreeSet<RoleId> {
        self.state()
            .holdings
            .get(&IdentityId::new(identity))
            .cloned()
            .unwrap_or_default()
    }

    pub fn holds(&self, identity: &str, role: &str) -> bool {
        self.roles_of(identity).contains(&RoleId::new(role))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    pub fn role_named(&self, name: &str) -> Option<Role> {
        self.state().roles.values().find(|r| r.name == name).cloned()
    }

    pub fn role(&self, id: &str) -> Option<Role> {
        self.state().roles.get(&RoleId::new(id)).cloned()
    }

    pub fn role_count(&self) -> usize {
        self.state().roles.len()
    }
}

impl FakeState {
    fn check(&self, op: FakeOp, role: Option<&RoleId>) -> Result<(), ServiceError> {
        let hit = self.failures.iter().any(|(o, filter)| {
            *o == op
                && match filter {
                    None => true,
                    Some(f) => Some(f) == role,
                }
        });
        if hit {
            return Err(ServiceError::Api {
                status: 500,
                message: format!("injected failure: {op:?}"),
            });
        }
        Ok(())
    }

    fn require_member(&self, identity: &IdentityId) -> Result<(), ServiceError> {
        if self.members.contains_key(identity) {
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!("member {identity:?}")))
        }
    }

    fn require_role(&self, role: &RoleId) -> Result<(), ServiceError> {
        if self.roles.contains_key(role) {
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!("role {}", role.as_str())))
        }
    }
}

#[async_trait]
impl DirectoryService for FakeDirectory {
    async fn list_roles(&self, _server: &str) -> Result<Vec<Role>, ServiceError> {
        let mut st = self.state();
        st.calls.push(Call::ListRoles);
        st.check(FakeOp::ListRoles, None)?;
        Ok(st.roles.values().cloned().collect())
    }

    async fn list_members(
        &self,
        _server: &str,
        after: Option<&IdentityId>,
        limit: usize,
    ) -> Result<Vec<Member>, ServiceError> {
        let mut st = self.state();
        st.calls.push(Call::ListMembers {
            after: after.cloned(),
            limit,
        });
        st.check(FakeOp::ListMembers, None)?;
        Ok(st
            .members
            .values()
            .filter(|m| after.map_or(true, |a| &m.identity_id > a))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn add_role(
        &self,
        _server: &str,
        identity: &IdentityId,
        role: &RoleId,
    ) -> Result<(), ServiceError> {
        let mut st = self.state();
        st.calls.push(Call::AddRole(identity.clone(), role.clone()));
        st.check(FakeOp::AddRole, Some(role))?;
        st.require_member(identity)?;
        st.require_role(role)?;
        st.holdings
            .entry(identity.clone())
            .or_default()
            .insert(role.clone());
        Ok(())
    }

    async fn remove_role(
        &self,
        _server: &str,
        identity: &IdentityId,
        role: &RoleId,
    ) -> Result<(), ServiceError> {
        let mut st = self.state();
        st.calls.push(Call::RemoveRole(identity.clone(), role.clone()));
        st.check(FakeOp::RemoveRole, Some(role))?;
        st.require_member(identity)?;
        // Removing a role the member does not hold is a no-op.
        if let Some(held) = st.holdings.get_mut(identity) {
            held.remove(role);
        }
        Ok(())
    }

    async fn create_role(&self, _server: &str) -> Result<Role, ServiceError> {
        let mut st = self.state();
        st.calls.push(Call::CreateRole);
        st.check(FakeOp::CreateRole, None)?;
        let id = RoleId::new(st.next_role_id.to_string());
        st.next_role_id += 1;
        let role = Role {
            id: id.clone(),
            name: "new role".to_string(),
            color: 0,
        };
        st.roles.insert(id, role.clone());
        Ok(role)
    }

    async fn edit_role(
        &self,
        _server: &str,
        role: &RoleId,
        edit: &RoleEdit,
    ) -> Result<Role, ServiceError> {
        let mut st = self.state();
        st.calls.push(Call::EditRole(role.clone(), edit.name.clone()));
        st.check(FakeOp::EditRole, Some(role))?;
        let r = st
            .roles
            .get_mut(role)
            .ok_or_else(|| ServiceError::NotFound(format!("role {}", role.as_str())))?;
        r.name = edit.name.clone();
        r.color = edit.color;
        Ok(r.clone())
    }

    async fn delete_role(&self, _server: &str, role: &RoleId) -> Result<(), ServiceError> {
        let mut st = self.state();
        st.calls.push(Call::DeleteRole(role.clone()));
        st.check(FakeOp::DeleteRole, Some(role))?;
        st.require_role(role)?;
        st.roles.remove(role);
        for held in st.holdings.values_mut() {
            held.remove(role);
        }
        Ok(())
    }
}
