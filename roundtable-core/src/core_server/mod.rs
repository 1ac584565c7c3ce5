/*
    core_server - Server lifecycle and membership administration

    Sequences lookups, validation and RBAC around the store: creating a
    server with its owner membership, presenting the detail view to
    members, and the administration paths (rename, restrict, role
    changes, kicks). A caller who is not a member learns nothing about
    a server through this layer, including whether it exists.
*/

use crate::core_invite::generate_invite_code;
use crate::core_rbac::{
    can_change_role, can_delete_server, can_edit_server, can_generate_invite, can_kick,
    is_server_owner, DenyReason,
};
use crate::core_store::model::{Member, MemberId, Role, Server, ServerId, User};
use crate::core_store::{ChatStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Server name bounds, checked against the raw (untrimmed) input
pub const SERVER_NAME_MIN: usize = 3;
pub const SERVER_NAME_MAX: usize = 100;

/// Server administration errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Validation(String),

    #[error("Permission denied: {0}")]
    Denied(DenyReason),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Member does not belong to this server")]
    WrongServer,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DenyReason> for ServerError {
    fn from(reason: DenyReason) -> Self {
        ServerError::Denied(reason)
    }
}

/// Detail view of a server as seen by one member
#[derive(Debug, Clone)]
pub struct ServerView {
    pub server: Server,
    pub owner: User,
    pub members: Vec<(Member, User)>,
    pub caller: Member,
    /// Whether the caller's role entitles them to hand out the invite
    /// code (owner and moderators only)
    pub can_share_invite: bool,
}

/// Partial update to a server's settings
#[derive(Debug, Clone, Default)]
pub struct ServerPatch {
    pub name: Option<String>,
    pub is_restricted: Option<bool>,
}

/// Server lifecycle and membership operations
pub struct ServerManager {
    store: Arc<ChatStore>,
}

impl ServerManager {
    pub fn new(store: Arc<ChatStore>) -> Self {
        ServerManager { store }
    }

    /// Create a server owned by `owner`. The owner membership and the
    /// permanent invite code are minted in the same step.
    pub fn create(
        &self,
        owner: &User,
        name: &str,
        is_restricted: bool,
    ) -> Result<(Server, Member), ServerError> {
        if name.trim().is_empty() {
            return Err(ServerError::Validation(
                "Server name is required".to_string(),
            ));
        }
        if name.chars().count() > SERVER_NAME_MAX {
            return Err(ServerError::Validation(
                "Server name must be 100 characters or less".to_string(),
            ));
        }

        let server = Server::new(
            name.trim().to_string(),
            generate_invite_code(),
            is_restricted,
            owner.id.clone(),
        );
        let member = Member::new(owner.id.clone(), server.id.clone(), Role::Owner);
        self.store.create_server(&server, &member)?;

        info!(server_id = %server.id, owner_id = %owner.id, "server created");
        Ok((server, member))
    }

    /// Fetch the detail view of a server. Membership is checked before
    /// anything else, so an outsider cannot distinguish a server they
    /// were never invited to from one that does not exist.
    pub fn get(&self, caller: &User, server_id: &ServerId) -> Result<ServerView, ServerError> {
        let caller_member = self
            .store
            .get_member(&caller.id, server_id)?
            .ok_or(DenyReason::NotAMember)?;

        let server = self
            .store
            .get_server(server_id)?
            .ok_or(ServerError::NotFound("server"))?;
        let owner = self
            .store
            .get_user(&server.owner_id)?
            .ok_or(ServerError::NotFound("user"))?;
        let members = self.store.list_members(server_id)?;
        let can_share_invite = can_generate_invite(&caller_member).is_allowed();

        Ok(ServerView {
            server,
            owner,
            members,
            caller: caller_member,
            can_share_invite,
        })
    }

    /// Servers the caller belongs to, most recently joined first
    pub fn list_for_user(&self, caller: &User) -> Result<Vec<Server>, ServerError> {
        Ok(self.store.list_servers_for_user(&caller.id)?)
    }

    /// Resolve the caller's membership in a server, with the server
    /// record itself. The standard gate for message operations.
    pub fn membership(
        &self,
        caller: &User,
        server_id: &ServerId,
    ) -> Result<(Server, Member), ServerError> {
        let member = self
            .store
            .get_member(&caller.id, server_id)?
            .ok_or(DenyReason::NotAMember)?;
        let server = self
            .store
            .get_server(server_id)?
            .ok_or(ServerError::NotFound("server"))?;
        Ok((server, member))
    }

    /// Apply a partial settings update. Owner only; at least one field
    /// must be present in the patch.
    pub fn update(
        &self,
        caller: &User,
        server_id: &ServerId,
        patch: ServerPatch,
    ) -> Result<Server, ServerError> {
        let mut server = self
            .store
            .get_server(server_id)?
            .ok_or(DenyReason::TargetNotFound)?;
        can_edit_server(caller, &server).require()?;

        if patch.name.is_none() && patch.is_restricted.is_none() {
            return Err(ServerError::Validation(
                "At least one field must be provided".to_string(),
            ));
        }

        if let Some(name) = patch.name {
            let len = name.chars().count();
            if len < SERVER_NAME_MIN {
                return Err(ServerError::Validation(
                    "Server name must be at least 3 characters".to_string(),
                ));
            }
            if len > SERVER_NAME_MAX {
                return Err(ServerError::Validation(
                    "Server name must be 100 characters or less".to_string(),
                ));
            }
            server.name = name.trim().to_string();
        }
        if let Some(restricted) = patch.is_restricted {
            server.is_restricted = restricted;
        }

        self.store.update_server(&server)?;
        info!(server_id = %server.id, "server settings updated");
        Ok(server)
    }

    /// Delete a server and everything in it. Owner only.
    pub fn delete(&self, caller: &User, server_id: &ServerId) -> Result<(), ServerError> {
        let server = self
            .store
            .get_server(server_id)?
            .ok_or(DenyReason::TargetNotFound)?;
        can_delete_server(caller, &server).require()?;

        self.store.delete_server(server_id)?;
        info!(server_id = %server_id, "server deleted");
        Ok(())
    }

    /// List members with their users, owner first then moderators then
    /// guests, each group in join order. Members only.
    pub fn list_members(
        &self,
        caller: &User,
        server_id: &ServerId,
    ) -> Result<Vec<(Member, User)>, ServerError> {
        self.store
            .get_member(&caller.id, server_id)?
            .ok_or(DenyReason::NotAMember)?;

        Ok(self.store.list_members(server_id)?)
    }

    /// Change a member's role. Owner only; the owner membership itself
    /// can never be the target and OWNER can never be assigned.
    pub fn change_role(
        &self,
        caller: &User,
        server_id: &ServerId,
        member_id: &MemberId,
        new_role: Role,
    ) -> Result<(Member, User), ServerError> {
        let server = self
            .store
            .get_server(server_id)?
            .ok_or(DenyReason::InsufficientRole)?;
        if !is_server_owner(caller, &server) {
            return Err(DenyReason::InsufficientRole.into());
        }

        let (target, target_user) = self
            .store
            .get_member_with_user(member_id)?
            .ok_or(ServerError::NotFound("member"))?;
        if target.server_id != *server_id {
            return Err(ServerError::WrongServer);
        }
        can_change_role(caller, &server, &target, new_role).require()?;

        self.store.update_member_role(member_id, new_role)?;
        info!(
            server_id = %server_id,
            member_id = %member_id,
            role = %new_role,
            "member role changed"
        );

        let mut updated = target;
        updated.role = new_role;
        Ok((updated, target_user))
    }

    /// Remove a member from a server. The full kick matrix lives in
    /// the RBAC layer; an unresolvable target is a plain denial.
    pub fn kick(
        &self,
        caller: &User,
        server_id: &ServerId,
        member_id: &MemberId,
    ) -> Result<(), ServerError> {
        let actor = self
            .store
            .get_member(&caller.id, server_id)?
            .ok_or(DenyReason::NotAMember)?;
        let target = self
            .store
            .get_member_by_id(member_id)?
            .ok_or(DenyReason::TargetNotFound)?;
        can_kick(&actor, &target).require()?;

        self.store.delete_member(member_id)?;
        info!(server_id = %server_id, member_id = %member_id, "member kicked");
        Ok(())
    }
}
