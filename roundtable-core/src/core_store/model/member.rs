/*
    member.rs - Membership model and role ranks

    A member ties one user to one server with a role. A user can be a
    member of many servers but at most once per server; each server has
    exactly one OWNER member, created together with the server itself.

    Role is a closed three-rank hierarchy. Rank comparisons go through
    authority()/at_least() rather than a derived Ord so the ranking is
    explicit and the enum stays purely nominal on the wire.
*/

use super::types::{MemberId, ServerId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Authority rank of a member within a server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Server creator; exactly one per server, cannot be kicked or demoted
    Owner,
    /// Elevated member; may moderate guests
    Moderator,
    /// Default rank for members who join via invite
    Guest,
}

impl Role {
    /// Numeric authority rank: higher outranks lower
    pub fn authority(&self) -> u8 {
        match self {
            Role::Owner => 3,
            Role::Moderator => 2,
            Role::Guest => 1,
        }
    }

    /// True when self outranks or equals `other`
    pub fn at_least(&self, other: Role) -> bool {
        self.authority() >= other.authority()
    }

    /// Convert Role to its canonical string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "OWNER",
            Role::Moderator => "MODERATOR",
            Role::Guest => "GUEST",
        }
    }

    /// Parse a canonical role string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "OWNER" => Some(Role::Owner),
            "MODERATOR" => Some(Role::Moderator),
            "GUEST" => Some(Role::Guest),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::Guest
    }
}

/// A user's membership in a server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// Unique membership ID
    pub id: MemberId,

    /// User this membership belongs to
    pub user_id: UserId,

    /// Server this membership belongs to
    pub server_id: ServerId,

    /// Authority rank within the server
    pub role: Role,

    /// When the user joined
    pub created_at: Timestamp,
}

impl Member {
    /// Create a new membership record
    pub fn new(user_id: UserId, server_id: ServerId, role: Role) -> Self {
        Member {
            id: MemberId::generate(),
            user_id,
            server_id,
            role,
            created_at: Timestamp::now(),
        }
    }
}
