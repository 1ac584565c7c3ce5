/*
    core_invite - Invite codes and self-service joins

    Every server carries one permanent, multi-use invite code mapping
    1:1 to the server. Resolving a code for an authenticated user is
    idempotent: an existing membership short-circuits as a no-op join,
    otherwise a GUEST membership is created. Codes never expire and are
    never single-use.
*/

use crate::core_store::model::{Member, Role, Server, User};
use crate::core_store::{ChatStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Length of a generated invite code
pub const INVITE_CODE_LEN: usize = 10;

/// Invite operation errors
#[derive(Debug, Error)]
pub enum InviteError {
    #[error("Invalid invite code")]
    UnknownCode,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Result of resolving an invite code for a user
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub server: Server,
    pub member: Member,
    pub already_member: bool,
}

/// Generate a random URL-safe invite code (62-character alphabet,
/// 10 characters, just under 60 bits of entropy)
pub fn generate_invite_code() -> String {
    use rand::Rng;
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

    let mut rng = rand::rng();
    (0..INVITE_CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Turns invite codes into memberships
pub struct InviteResolver {
    store: Arc<ChatStore>,
}

impl InviteResolver {
    pub fn new(store: Arc<ChatStore>) -> Self {
        InviteResolver { store }
    }

    /// Resolve `code` for `user`: join as GUEST, or report the
    /// existing membership. A concurrent double-join resolves to the
    /// surviving membership rather than an error.
    pub fn join(&self, user: &User, code: &str) -> Result<JoinOutcome, InviteError> {
        let server = self
            .store
            .get_server_by_invite_code(code)?
            .ok_or(InviteError::UnknownCode)?;

        if let Some(member) = self.store.get_member(&user.id, &server.id)? {
            return Ok(JoinOutcome {
                server,
                member,
                already_member: true,
            });
        }

        let member = Member::new(user.id.clone(), server.id.clone(), Role::Guest);
        match self.store.insert_member(&member) {
            Ok(()) => {
                info!(server_id = %server.id, user_id = %user.id, "user joined server via invite");
                Ok(JoinOutcome {
                    server,
                    member,
                    already_member: false,
                })
            }
            Err(StoreError::Conflict(_)) => {
                // Raced another join of the same user; theirs won
                let member = self
                    .store
                    .get_member(&user.id, &server.id)?
                    .ok_or(StoreError::Conflict("membership"))?;
                Ok(JoinOutcome {
                    server,
                    member,
                    already_member: true,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
