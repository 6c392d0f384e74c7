// ABOUTME: Persistence collaborator seen by the gateway: queued outbound messages and status updates
// ABOUTME: MemoryStore backs the binary and the tests; a relational store plugs in behind the same trait

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;
use tracing::debug;

pub type MessageId = u64;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown message {0}")]
    UnknownMessage(MessageId),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Lifecycle of an outbound message row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageStatus {
    Queued,
    /// Written to an SMSC under this sequence number.
    Sent { sequence: u32 },
    /// Accepted by the SMSC, which assigned this id.
    Submitted { message_id: String },
    Delivered,
    /// Final state other than delivered, named as the SMSC reported it.
    Failed { reason: String },
    /// Gave up waiting for the SMSC.
    Expired,
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageStatus::Queued => f.write_str("queued"),
            MessageStatus::Sent { sequence } => write!(f, "sent (seq {sequence})"),
            MessageStatus::Submitted { message_id } => write!(f, "submitted ({message_id})"),
            MessageStatus::Delivered => f.write_str("delivered"),
            MessageStatus::Failed { reason } => write!(f, "failed ({reason})"),
            MessageStatus::Expired => f.write_str("expired"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub id: MessageId,
    pub phone: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub source: String,
    pub text: String,
}

/// What the gateway needs from its database.
///
/// Implementations must be thread-safe (Send + Sync).
pub trait MessageStore: Send + Sync {
    /// Messages queued for sending, oldest first.
    fn load_pending_outbound(&self) -> Result<Vec<OutboundMessage>, StoreError>;

    fn record_message_status(&self, id: MessageId, status: MessageStatus) -> Result<(), StoreError>;

    fn record_inbound(&self, source: &str, text: &str) -> Result<(), StoreError>;

    /// Named configuration value kept in the database.
    fn load_named_parameter(&self, name: &str) -> Result<Option<String>, StoreError>;
}

#[derive(Debug, Default)]
struct MemoryTables {
    outbound: Vec<(OutboundMessage, MessageStatus)>,
    inbound: Vec<InboundMessage>,
    parameters: HashMap<String, String>,
}

/// In-memory store. All data is lost on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<MemoryTables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a message and return its id.
    pub fn enqueue(&self, phone: impl Into<String>, text: impl Into<String>) -> MessageId {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let id = tables.outbound.len() as MessageId + 1;
        tables.outbound.push((
            OutboundMessage {
                id,
                phone: phone.into(),
                text: text.into(),
            },
            MessageStatus::Queued,
        ));
        id
    }

    pub fn set_parameter(&self, name: impl Into<String>, value: impl Into<String>) {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .parameters
            .insert(name.into(), value.into());
    }

    pub fn status(&self, id: MessageId) -> Option<MessageStatus> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .outbound
            .iter()
            .find(|(message, _)| message.id == id)
            .map(|(_, status)| status.clone())
    }

    pub fn inbound(&self) -> Vec<InboundMessage> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .inbound
            .clone()
    }
}

impl MessageStore for MemoryStore {
    fn load_pending_outbound(&self) -> Result<Vec<OutboundMessage>, StoreError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        Ok(tables
            .outbound
            .iter()
            .filter(|(_, status)| *status == MessageStatus::Queued)
            .map(|(message, _)| message.clone())
            .collect())
    }

    fn record_message_status(&self, id: MessageId, status: MessageStatus) -> Result<(), StoreError> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let row = tables
            .outbound
            .iter_mut()
            .find(|(message, _)| message.id == id)
            .ok_or(StoreError::UnknownMessage(id))?;
        debug!(id, %status, "message status");
        row.1 = status;
        Ok(())
    }

    fn record_inbound(&self, source: &str, text: &str) -> Result<(), StoreError> {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .inbound
            .push(InboundMessage {
                source: source.to_string(),
                text: text.to_string(),
            });
        Ok(())
    }

    fn load_named_parameter(&self, name: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .parameters
            .get(name)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_queued_messages_are_pending() {
        let store = MemoryStore::new();
        let first = store.enqueue("111", "one");
        let second = store.enqueue("222", "two");

        store
            .record_message_status(first, MessageStatus::Sent { sequence: 4 })
            .unwrap();
        let pending = store.load_pending_outbound().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second);
        assert_eq!(store.status(first), Some(MessageStatus::Sent { sequence: 4 }));
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.record_message_status(9, MessageStatus::Delivered),
            Err(StoreError::UnknownMessage(9))
        ));
    }

    #[test]
    fn inbound_and_parameters() {
        let store = MemoryStore::new();
        store.record_inbound("251911000000", "hi").unwrap();
        store.set_parameter("sender", "GATEWAY");
        assert_eq!(store.inbound()[0].text, "hi");
        assert_eq!(
            store.load_named_parameter("sender").unwrap().as_deref(),
            Some("GATEWAY")
        );
        assert_eq!(store.load_named_parameter("other").unwrap(), None);
    }
}
