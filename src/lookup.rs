//! Pending lookup tracker (§4.G).
use crate::clock::LocalTime;
use crate::collections::HashMap;
use crate::message::MessageId;

/// A lookup request awaiting a `Response`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Pending {
    data_id: u64,
    deadline: LocalTime,
}

/// Tracks in-flight `Request`s by the `request_id` that correlates them to
/// their eventual `Response` or timeout.
///
/// Invariant (§3.4): every entry has exactly one scheduled timeout; at
/// most one of `resolve`/`expire` ever returns `Some` for a given
/// `request_id`, since both remove the entry before returning it.
#[derive(Debug, Default)]
pub struct PendingLookups {
    pending: HashMap<MessageId, Pending>,
}

impl PendingLookups {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new pending lookup.
    pub fn insert(&mut self, request_id: MessageId, data_id: u64, deadline: LocalTime) {
        self.pending.insert(request_id, Pending { data_id, deadline });
    }

    /// A `Response` arrived for `request_id`. Returns the matched
    /// `data_id`, or `None` if the request is unknown (already resolved,
    /// expired, or never existed — §4.G: "late Responses ... are silently
    /// dropped").
    pub fn resolve(&mut self, request_id: MessageId) -> Option<u64> {
        self.pending.remove(&request_id).map(|pending| pending.data_id)
    }

    /// The scheduled timeout for `request_id` fired. Returns the
    /// associated `data_id` if the request is still pending (it may
    /// already have been resolved, in which case this is a no-op).
    pub fn expire(&mut self, request_id: MessageId) -> Option<u64> {
        self.pending.remove(&request_id).map(|pending| pending.data_id)
    }

    pub fn contains(&self, request_id: MessageId) -> bool {
        self.pending.contains_key(&request_id)
    }

    pub fn deadline(&self, request_id: MessageId) -> Option<LocalTime> {
        self.pending.get(&request_id).map(|pending| pending.deadline)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
