/*
    message.rs - Message model and total ordering

    Represents a single message posted into a server.

    Ordering model:
    - sent_at: client wall-clock send time (validated against server
      clock on ingest)
    - sequence: per-device monotonic counter, breaks sent_at ties
    - id: server-assigned id, breaks remaining ties

    The (sent_at, sequence, id) triple gives every server timeline one
    total order, so every reader sees the same sequence of messages.
*/

use super::types::{ClientId, MemberId, MessageId, ServerId, Timestamp};
use serde::{Deserialize, Serialize};

/// A message in a server's timeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID (server-assigned)
    pub id: MessageId,

    /// Client-assigned id, globally unique; the idempotency key
    pub client_id: ClientId,

    /// Message body (stored trimmed, 1..=2000 chars)
    pub content: String,

    /// Client send time
    pub sent_at: Timestamp,

    /// Per-device send counter
    pub sequence: i64,

    /// Membership that authored this message
    pub member_id: MemberId,

    /// Server this message belongs to
    pub server_id: ServerId,

    /// When the server accepted the message
    pub created_at: Timestamp,
}

impl Message {
    /// Create a new message record
    pub fn new(
        client_id: ClientId,
        content: String,
        sent_at: Timestamp,
        sequence: i64,
        member_id: MemberId,
        server_id: ServerId,
    ) -> Self {
        Message {
            id: MessageId::generate(),
            client_id,
            content,
            sent_at,
            sequence,
            member_id,
            server_id,
            created_at: Timestamp::now(),
        }
    }

    /// Total-order key: (sent_at, sequence, id) ascending
    pub fn sort_key(&self) -> (Timestamp, i64, &MessageId) {
        (self.sent_at, self.sequence, &self.id)
    }
}
