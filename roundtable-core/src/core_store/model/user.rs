/*
    user.rs - User account model

    A user exists once per identity-provider email and is provisioned
    just-in-time on first authenticated request. The external identity
    id is refreshed on every resolution and may change over time; email
    is the stable key.
*/

use super::types::{Timestamp, UserId};
use serde::{Deserialize, Serialize};

/// A provisioned user account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique user ID
    pub id: UserId,

    /// Identity-provider subject id (refreshed on each login)
    pub external_id: String,

    /// Email address, unique across all users
    pub email: String,

    /// Display name derived from the email local part
    pub display_name: String,

    /// When the account was provisioned
    pub created_at: Timestamp,
}

impl User {
    /// Create a new user record
    pub fn new(external_id: String, email: String, display_name: String) -> Self {
        User {
            id: UserId::generate(),
            external_id,
            email,
            display_name,
            created_at: Timestamp::now(),
        }
    }
}
