/*
    core_timeline - Message ordering and idempotency protocol

    Clients assert their own (sent_at, sequence) so optimistic sends
    interleave correctly with confirmed history; the server bounds
    sent_at with a clock-skew window and owns the final (sent_at,
    sequence, id) total order per server.

    Writes are idempotent by client_id: a retry with the identical
    payload returns the stored message, a reuse with a divergent
    payload is a conflict. Uniqueness races on client_id resolve the
    same way, never fatally.

    The sync submodule carries the client-side half of the protocol:
    the PENDING/SENT/FAILED outbox merged against polled pages.
*/

pub mod sync;

use crate::core_rbac::{self, DenyReason};
use crate::core_store::model::{ClientId, Member, Message, MessageId, Server, Timestamp, User};
use crate::core_store::{ChatStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors surfaced by timeline operations
#[derive(Debug, Error)]
pub enum TimelineError {
    #[error("Message timestamp too far from server time: {skew_ms}ms exceeds {limit_ms}ms")]
    ClockSkew { skew_ms: u64, limit_ms: u64 },

    #[error("client_id already used with a different payload")]
    IdempotencyConflict,

    #[error("Pagination cursor not found in this server")]
    CursorNotFound,

    #[error("Permission denied: {0}")]
    Denied(DenyReason),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<DenyReason> for TimelineError {
    fn from(reason: DenyReason) -> Self {
        TimelineError::Denied(reason)
    }
}

/// A client's message submission
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Client-generated idempotency key
    pub client_id: ClientId,
    /// Message body, already trimmed and length-checked at the boundary
    pub content: String,
    /// Client-asserted send time
    pub sent_at: Timestamp,
    /// Client-asserted per-device counter, >= 1
    pub sequence: i64,
}

/// Outcome of a post: the stored message, and whether this call was a
/// replay of an earlier identical submission
#[derive(Debug, Clone)]
pub struct PostedMessage {
    pub message: Message,
    pub replayed: bool,
}

/// Ordering and idempotency engine over a server's message timeline
pub struct Timeline {
    store: Arc<ChatStore>,
    max_skew: Duration,
    page_limit: u32,
}

impl Timeline {
    pub fn new(store: Arc<ChatStore>, max_skew: Duration, page_limit: u32) -> Self {
        Timeline {
            store,
            max_skew,
            page_limit,
        }
    }

    /// Accept a message into a server's timeline.
    ///
    /// Order of checks is part of the contract: RBAC, then clock skew,
    /// then the idempotency lookup. A stale clock is reported as skew
    /// even when the client_id already exists.
    pub fn post(
        &self,
        server: &Server,
        author: &Member,
        new: NewMessage,
    ) -> Result<PostedMessage, TimelineError> {
        core_rbac::can_post(author, server).require()?;

        let now = Timestamp::now();
        let limit_ms = self.max_skew.as_millis() as u64;
        let skew_ms = now.abs_diff(new.sent_at);
        if skew_ms > limit_ms {
            return Err(TimelineError::ClockSkew { skew_ms, limit_ms });
        }

        if let Some(existing) = self.store.get_message_by_client_id(&new.client_id)? {
            return self.resolve_replay(existing, author, &new);
        }

        let message = Message::new(
            new.client_id.clone(),
            new.content.clone(),
            new.sent_at,
            new.sequence,
            author.id.clone(),
            server.id.clone(),
        );

        match self.store.insert_message(&message) {
            Ok(()) => Ok(PostedMessage {
                message,
                replayed: false,
            }),
            Err(StoreError::Conflict(_)) => {
                // Lost a race against a concurrent send with this client_id
                match self.store.get_message_by_client_id(&new.client_id)? {
                    Some(existing) => self.resolve_replay(existing, author, &new),
                    None => Err(TimelineError::Store(StoreError::Conflict("client_id"))),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn resolve_replay(
        &self,
        existing: Message,
        author: &Member,
        new: &NewMessage,
    ) -> Result<PostedMessage, TimelineError> {
        let identical = existing.member_id == author.id
            && existing.content == new.content
            && existing.sequence == new.sequence;

        if identical {
            debug!(client_id = %new.client_id, "message replay, returning stored copy");
            Ok(PostedMessage {
                message: existing,
                replayed: true,
            })
        } else {
            warn!(client_id = %new.client_id, "client_id reused with a divergent payload");
            Err(TimelineError::IdempotencyConflict)
        }
    }

    /// A page of the server's timeline ending just before `before`,
    /// oldest first. Without a cursor: the latest page. The cursor
    /// must exist and belong to this server.
    pub fn page(
        &self,
        server: &Server,
        before: Option<&MessageId>,
        limit: Option<u32>,
    ) -> Result<Vec<(Message, Member, User)>, TimelineError> {
        let limit = limit.unwrap_or(self.page_limit).min(self.page_limit);

        let cursor = match before {
            Some(id) => {
                let cursor = self
                    .store
                    .get_message(id)?
                    .ok_or(TimelineError::CursorNotFound)?;
                if cursor.server_id != server.id {
                    return Err(TimelineError::CursorNotFound);
                }
                Some(cursor)
            }
            None => None,
        };

        Ok(self
            .store
            .list_messages_page(&server.id, cursor.as_ref(), limit)?)
    }

    /// Edit a message's content. Author only; an unresolvable message
    /// is a denial, indistinguishable from lacking permission.
    pub fn edit(
        &self,
        actor: &Member,
        message_id: &MessageId,
        content: &str,
    ) -> Result<Message, TimelineError> {
        let (mut message, author, _) = match self.store.get_message_with_author(message_id)? {
            Some(found) => found,
            None => return Err(TimelineError::Denied(DenyReason::TargetNotFound)),
        };

        core_rbac::can_edit_message(actor, &message, &author).require()?;

        self.store.update_message_content(message_id, content)?;
        message.content = content.to_string();

        Ok(message)
    }

    /// Delete a message under the moderation matrix. An unresolvable
    /// message is a denial.
    pub fn delete(&self, actor: &Member, message_id: &MessageId) -> Result<(), TimelineError> {
        let (message, author, _) = match self.store.get_message_with_author(message_id)? {
            Some(found) => found,
            None => return Err(TimelineError::Denied(DenyReason::TargetNotFound)),
        };

        core_rbac::can_delete_message(actor, &message, &author).require()?;

        self.store.delete_message(message_id)?;

        Ok(())
    }
}
