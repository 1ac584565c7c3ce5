/*
    server.rs - Server (chat group) model

    A server is the top-level container: it has exactly one owner, a
    permanent shareable invite code, and an optional restricted flag
    that blocks GUEST members from posting.
*/

use super::types::{ServerId, Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// A chat server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    /// Unique server ID
    pub id: ServerId,

    /// Human-readable name (stored trimmed)
    pub name: String,

    /// Shareable join code, unique across all servers
    pub invite_code: String,

    /// When true, GUEST members cannot post
    pub is_restricted: bool,

    /// User who owns this server
    pub owner_id: UserId,

    /// When the server was created
    pub created_at: Timestamp,
}

impl Server {
    /// Create a new server record owned by `owner_id`
    pub fn new(name: String, invite_code: String, is_restricted: bool, owner_id: UserId) -> Self {
        Server {
            id: ServerId::generate(),
            name,
            invite_code,
            is_restricted,
            owner_id,
            created_at: Timestamp::now(),
        }
    }
}
