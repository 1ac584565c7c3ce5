/*
    sync.rs - Client-side reconciliation of optimistic sends

    The client half of the idempotency protocol. Outgoing messages are
    tracked by client_id through three states:

      PENDING - submitted, no response yet
      SENT    - confirmed; the server copy is authoritative
      FAILED  - rejected or lost; eligible for an identical-payload retry

    Polled pages merge with the outbox: a page entry matching a tracked
    client_id confirms it (the server copy wins the dedupe), anything
    still PENDING/FAILED is kept and interleaved into the view at its
    own (sent_at, sequence) position.
*/

use super::NewMessage;
use crate::core_store::model::{ClientId, Message, Timestamp};
use std::cmp::Ordering;

/// Delivery state of a locally-tracked message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Pending,
    Sent,
    Failed,
}

/// A message as tracked on the sending client
#[derive(Debug, Clone)]
pub struct LocalMessage {
    pub client_id: ClientId,
    pub content: String,
    pub sent_at: Timestamp,
    pub sequence: i64,
    pub state: DeliveryState,
}

/// One entry of the merged view: either a server-confirmed message or
/// a local message still awaiting confirmation
#[derive(Debug, Clone)]
pub enum TimelineEntry {
    Confirmed(Message),
    Local(LocalMessage),
}

impl TimelineEntry {
    pub fn sent_at(&self) -> Timestamp {
        match self {
            TimelineEntry::Confirmed(m) => m.sent_at,
            TimelineEntry::Local(l) => l.sent_at,
        }
    }

    pub fn sequence(&self) -> i64 {
        match self {
            TimelineEntry::Confirmed(m) => m.sequence,
            TimelineEntry::Local(l) => l.sequence,
        }
    }

    pub fn client_id(&self) -> &ClientId {
        match self {
            TimelineEntry::Confirmed(m) => &m.client_id,
            TimelineEntry::Local(l) => &l.client_id,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, TimelineEntry::Confirmed(_))
    }
}

/// Client-side outbox reconciling optimistic sends with polled pages
#[derive(Debug, Default)]
pub struct Reconciler {
    entries: Vec<LocalMessage>,
}

impl Reconciler {
    pub fn new() -> Self {
        Reconciler {
            entries: Vec::new(),
        }
    }

    /// Track a new optimistic send as PENDING and hand back its
    /// client_id for the submission
    pub fn begin_send(&mut self, content: String, sent_at: Timestamp, sequence: i64) -> ClientId {
        let client_id = ClientId::generate();
        self.entries.push(LocalMessage {
            client_id: client_id.clone(),
            content,
            sent_at,
            sequence,
            state: DeliveryState::Pending,
        });
        client_id
    }

    /// Mark a send confirmed (the POST response arrived)
    pub fn record_confirmed(&mut self, client_id: &ClientId) {
        if let Some(entry) = self.entry_mut(client_id) {
            entry.state = DeliveryState::Sent;
        }
    }

    /// Mark a send failed (rejected or network error)
    pub fn record_failed(&mut self, client_id: &ClientId) {
        if let Some(entry) = self.entry_mut(client_id) {
            entry.state = DeliveryState::Failed;
        }
    }

    /// The identical payload for retrying a FAILED send. Identical
    /// client_id/content/sequence is what makes the retry safe: the
    /// server recognizes it as the same logical message.
    pub fn retry_payload(&self, client_id: &ClientId) -> Option<NewMessage> {
        self.entries
            .iter()
            .find(|e| &e.client_id == client_id && e.state == DeliveryState::Failed)
            .map(|e| NewMessage {
                client_id: e.client_id.clone(),
                content: e.content.clone(),
                sent_at: e.sent_at,
                sequence: e.sequence,
            })
    }

    /// Number of sends not yet confirmed
    pub fn unconfirmed(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.state != DeliveryState::Sent)
            .count()
    }

    /// Merge a polled page into the outbox and produce the display
    /// view: server messages plus surviving PENDING/FAILED locals,
    /// interleaved by (sent_at, sequence). A tracked client_id found
    /// in the page flips to SENT and only the server copy is shown.
    pub fn merge_page(&mut self, page: &[Message]) -> Vec<TimelineEntry> {
        for entry in &mut self.entries {
            if page.iter().any(|m| m.client_id == entry.client_id) {
                entry.state = DeliveryState::Sent;
            }
        }

        let mut view: Vec<TimelineEntry> = page
            .iter()
            .cloned()
            .map(TimelineEntry::Confirmed)
            .collect();
        for entry in &self.entries {
            if entry.state != DeliveryState::Sent {
                view.push(TimelineEntry::Local(entry.clone()));
            }
        }

        view.sort_by(entry_order);
        view
    }

    fn entry_mut(&mut self, client_id: &ClientId) -> Option<&mut LocalMessage> {
        self.entries.iter_mut().find(|e| &e.client_id == client_id)
    }
}

/// (sent_at, sequence) first; on a full tie the confirmed copy sorts
/// before the local one, mirroring the server-wins dedupe rule
fn entry_order(a: &TimelineEntry, b: &TimelineEntry) -> Ordering {
    (a.sent_at(), a.sequence())
        .cmp(&(b.sent_at(), b.sequence()))
        .then_with(|| match (a, b) {
            (TimelineEntry::Confirmed(x), TimelineEntry::Confirmed(y)) => x.id.cmp(&y.id),
            (TimelineEntry::Confirmed(_), TimelineEntry::Local(_)) => Ordering::Less,
            (TimelineEntry::Local(_), TimelineEntry::Confirmed(_)) => Ordering::Greater,
            (TimelineEntry::Local(x), TimelineEntry::Local(y)) => x.client_id.0.cmp(&y.client_id.0),
        })
}
