// ABOUTME: Outstanding submissions keyed by the sequence number of their submit PDU
// ABOUTME: Resolved by response sequence, by SMSC message id on receipts, or evicted after a TTL

use crate::client::error::{SmppError, SmppResult};
use crate::client::types::SmppOptions;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RequestState {
    /// Written to the SMSC, no response yet.
    Sent,
    /// submit_sm_resp arrived with the SMSC message id.
    Submitted,
    /// At least one delivery report seen, more outstanding.
    Delivered,
}

#[derive(Clone, Debug)]
pub struct PendingRequest {
    pub state: RequestState,
    /// SMSC-assigned id, empty until submitted.
    pub message_id: String,
    pub text: String,
    pub destination: String,
    pub options: Arc<SmppOptions>,
    /// Caller's handle for the message (store row id).
    pub reference: Option<u64>,
    pub created: Instant,
}

/// One submit_multi PDU. `destinations` shrinks as receipts arrive.
#[derive(Clone, Debug)]
pub struct PendingBulkRequest {
    pub state: RequestState,
    pub message_id: String,
    pub text: String,
    pub destinations: VecDeque<String>,
    pub options: Arc<SmppOptions>,
    pub reference: Option<u64>,
    pub created: Instant,
}

#[derive(Clone, Debug)]
pub enum PendingEntry {
    Single(PendingRequest),
    Bulk(PendingBulkRequest),
}

impl PendingEntry {
    pub fn state(&self) -> RequestState {
        match self {
            PendingEntry::Single(req) => req.state,
            PendingEntry::Bulk(req) => req.state,
        }
    }

    pub fn message_id(&self) -> &str {
        match self {
            PendingEntry::Single(req) => &req.message_id,
            PendingEntry::Bulk(req) => &req.message_id,
        }
    }

    pub fn reference(&self) -> Option<u64> {
        match self {
            PendingEntry::Single(req) => req.reference,
            PendingEntry::Bulk(req) => req.reference,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            PendingEntry::Single(req) => &req.text,
            PendingEntry::Bulk(req) => &req.text,
        }
    }

    fn created(&self) -> Instant {
        match self {
            PendingEntry::Single(req) => req.created,
            PendingEntry::Bulk(req) => req.created,
        }
    }

    fn submitted(&mut self, message_id: &str) {
        let (state, id) = match self {
            PendingEntry::Single(req) => (&mut req.state, &mut req.message_id),
            PendingEntry::Bulk(req) => (&mut req.state, &mut req.message_id),
        };
        *state = RequestState::Submitted;
        *id = message_id.to_string();
    }
}

/// A delivery report matched to its submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settled {
    pub sequence: u32,
    pub reference: Option<u64>,
    /// Destinations still awaiting a report; zero once the entry is gone.
    pub remaining: usize,
}

#[derive(Debug, Default)]
pub struct PendingRequestTable {
    entries: HashMap<u32, PendingEntry>,
    ttl: Option<Duration>,
}

impl PendingRequestTable {
    /// `ttl` of `None` keeps entries until resolved.
    pub fn new(ttl: Option<Duration>) -> Self {
        PendingRequestTable {
            entries: HashMap::new(),
            ttl,
        }
    }

    pub fn register(&mut self, sequence: u32, entry: PendingEntry) {
        if self.entries.insert(sequence, entry).is_some() {
            tracing::warn!(sequence, "pending entry replaced after sequence wrap");
        }
    }

    pub fn resolve(&mut self, sequence: u32) -> SmppResult<PendingEntry> {
        self.entries
            .remove(&sequence)
            .ok_or(SmppError::NotFound { sequence })
    }

    pub fn get(&self, sequence: u32) -> Option<&PendingEntry> {
        self.entries.get(&sequence)
    }

    /// Record the SMSC message id from a successful submit response.
    pub fn mark_submitted(&mut self, sequence: u32, message_id: &str) -> Option<&PendingEntry> {
        let entry = self.entries.get_mut(&sequence)?;
        entry.submitted(message_id);
        Some(entry)
    }

    /// Remove destinations the SMSC refused outright; no receipt will come.
    pub fn drop_destinations(&mut self, sequence: u32, refused: &[String]) {
        if let Some(PendingEntry::Bulk(bulk)) = self.entries.get_mut(&sequence) {
            bulk.destinations.retain(|dest| !refused.contains(dest));
            if bulk.destinations.is_empty() {
                self.entries.remove(&sequence);
            }
        }
    }

    pub fn find_by_message_id(&self, message_id: &str) -> Option<u32> {
        if message_id.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(_, entry)| entry.message_id() == message_id)
            .map(|(sequence, _)| *sequence)
    }

    pub fn remove_by_message_id(&mut self, message_id: &str) -> Option<(u32, PendingEntry)> {
        let sequence = self.find_by_message_id(message_id)?;
        self.entries.remove(&sequence).map(|entry| (sequence, entry))
    }

    /// Apply a final delivery report for `recipient`.
    ///
    /// A single entry is removed. A bulk entry loses that destination (or its
    /// oldest one when the recipient is not listed) and is removed once empty.
    pub fn settle(&mut self, message_id: &str, recipient: &str) -> Option<Settled> {
        let sequence = self.find_by_message_id(message_id)?;
        let entry = self.entries.get_mut(&sequence)?;
        let reference = entry.reference();

        let remaining = match entry {
            PendingEntry::Single(_) => 0,
            PendingEntry::Bulk(bulk) => {
                match bulk.destinations.iter().position(|d| d == recipient) {
                    Some(at) => {
                        bulk.destinations.remove(at);
                    }
                    None => {
                        bulk.destinations.pop_front();
                    }
                }
                bulk.state = RequestState::Delivered;
                bulk.destinations.len()
            }
        };

        if remaining == 0 {
            self.entries.remove(&sequence);
        }
        Some(Settled {
            sequence,
            reference,
            remaining,
        })
    }

    /// Remove and return every entry older than the TTL.
    pub fn evict_expired(&mut self, now: Instant) -> Vec<(u32, PendingEntry)> {
        let Some(ttl) = self.ttl else {
            return Vec::new();
        };

        let expired: Vec<u32> = self
            .entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.created()) >= ttl)
            .map(|(sequence, _)| *sequence)
            .collect();

        let mut evicted: Vec<(u32, PendingEntry)> = expired
            .into_iter()
            .filter_map(|sequence| self.entries.remove(&sequence).map(|e| (sequence, e)))
            .collect();
        evicted.sort_by_key(|(sequence, _)| *sequence);
        evicted
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
