/*
    core_identity - External principals and just-in-time provisioning

    Requests arrive carrying an opaque principal minted by an external
    auth layer; no session or token cryptography happens here. Resolving
    a principal upserts the backing user record keyed by email, so one
    logical account survives a switch of identity provider. Account
    export and deletion also live here since both operate on the whole
    identity rather than on any one server.
*/

use crate::core_store::model::{Role, Server, ServerId, Timestamp, User, UserId};
use crate::core_store::{ChatStore, StoreError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Role marker a principal must carry to count as signed in
pub const AUTHENTICATED_ROLE: &str = "authenticated";

/// Identity operation errors
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Principal lacks the authenticated role")]
    Anonymous,

    #[error("Malformed principal header: {0}")]
    MalformedPrincipal(String),

    #[error("User not found")]
    UnknownUser,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Per-request principal minted by the external auth layer. Wire field
/// names follow the proxy's header format; unknown fields such as the
/// provider name are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    #[serde(rename = "userId")]
    pub external_id: String,

    #[serde(rename = "userDetails")]
    pub display_identity: String,

    #[serde(rename = "userRoles", default)]
    pub roles: Vec<String>,
}

impl Principal {
    /// Decode the base64-JSON principal header value
    pub fn from_header(raw: &str) -> Result<Principal, IdentityError> {
        let bytes = BASE64
            .decode(raw.trim())
            .map_err(|e| IdentityError::MalformedPrincipal(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| IdentityError::MalformedPrincipal(e.to_string()))
    }

    pub fn is_authenticated(&self) -> bool {
        self.roles.iter().any(|r| r == AUTHENTICATED_ROLE)
    }

    /// Display name derived from the identity: the local part when the
    /// identity is an email, otherwise the identity as-is
    pub fn derived_display_name(&self) -> &str {
        self.display_identity
            .split('@')
            .next()
            .unwrap_or(&self.display_identity)
    }
}

/// Everything the service holds about one account, assembled for export
#[derive(Debug, Clone)]
pub struct AccountExport {
    pub exported_at: Timestamp,
    pub user: User,
    pub memberships: Vec<MembershipSummary>,
    pub owned_servers: Vec<OwnedServerSummary>,
    pub messages: Vec<ExportedMessage>,
}

/// One server the user belongs to
#[derive(Debug, Clone)]
pub struct MembershipSummary {
    pub server_id: ServerId,
    pub server_name: String,
    pub role: Role,
    pub joined_at: Timestamp,
    pub message_count: u32,
}

/// One server the user owns
#[derive(Debug, Clone)]
pub struct OwnedServerSummary {
    pub server: Server,
    pub member_count: u32,
    pub message_count: u32,
}

/// One message the user authored, with enough context to stand alone
#[derive(Debug, Clone)]
pub struct ExportedMessage {
    pub server_id: ServerId,
    pub server_name: String,
    pub content: String,
    pub sent_at: Timestamp,
}

/// Maps external principals to internal user records
pub struct IdentityResolver {
    store: Arc<ChatStore>,
}

impl IdentityResolver {
    pub fn new(store: Arc<ChatStore>) -> Self {
        IdentityResolver { store }
    }

    /// Resolve a principal to its user record, provisioning on first
    /// sight. The upsert keys on email and refreshes the provider id
    /// and display name on every call, so re-authenticating through a
    /// different provider lands on the same account.
    pub fn resolve(&self, principal: &Principal) -> Result<User, IdentityError> {
        if !principal.is_authenticated() {
            return Err(IdentityError::Anonymous);
        }

        let user = self.store.upsert_user_by_email(
            &principal.external_id,
            &principal.display_identity,
            principal.derived_display_name(),
        )?;

        debug!(user_id = %user.id, "principal resolved");
        Ok(user)
    }

    /// Assemble the full data export for an account
    pub fn export_account(&self, user_id: &UserId) -> Result<AccountExport, IdentityError> {
        let user = self
            .store
            .get_user(user_id)?
            .ok_or(IdentityError::UnknownUser)?;

        let mut memberships = Vec::new();
        for (member, server) in self.store.list_memberships_with_servers(user_id)? {
            memberships.push(MembershipSummary {
                server_id: server.id,
                server_name: server.name,
                role: member.role,
                joined_at: member.created_at,
                message_count: self.store.count_messages_by_member(&member.id)?,
            });
        }

        let mut owned_servers = Vec::new();
        for server in self.store.list_servers_owned(user_id)? {
            let member_count = self.store.count_members(&server.id)?;
            let message_count = self.store.count_messages_in_server(&server.id)?;
            owned_servers.push(OwnedServerSummary {
                server,
                member_count,
                message_count,
            });
        }

        let messages = self
            .store
            .list_messages_for_user(user_id)?
            .into_iter()
            .map(|(message, server)| ExportedMessage {
                server_id: server.id,
                server_name: server.name,
                content: message.content,
                sent_at: message.sent_at,
            })
            .collect();

        Ok(AccountExport {
            exported_at: Timestamp::now(),
            user,
            memberships,
            owned_servers,
            messages,
        })
    }

    /// Delete the account. The store cascades the removal through
    /// memberships, owned servers and messages.
    pub fn delete_account(&self, user_id: &UserId) -> Result<(), IdentityError> {
        self.store.delete_user(user_id)?;
        info!(user_id = %user_id, "account deleted");
        Ok(())
    }
}
