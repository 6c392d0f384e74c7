// ABOUTME: Domain events surfaced by the engine's incoming-PDU dispatcher
// ABOUTME: Consumed by the application layer for persistence and logging

use crate::datatypes::{BindMode, CommandId, MessageState, UnsuccessfulDelivery};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    /// bind_*_resp with ESME_ROK.
    Bound { mode: BindMode, system_id: String },

    /// The bind failed for good (after the transmitter fallback, if taken).
    BindRejected { status: u32 },

    /// submit_sm_resp with ESME_ROK.
    Accepted {
        sequence: u32,
        message_id: String,
        reference: Option<u64>,
    },

    /// submit_multi_resp with ESME_ROK; `refused` lists destinations the SMSC
    /// would not take.
    BulkAccepted {
        sequence: u32,
        message_id: String,
        reference: Option<u64>,
        refused: Vec<UnsuccessfulDelivery>,
    },

    /// A submission answered with an error status. The pending entry stays.
    SubmitRejected {
        sequence: u32,
        status: u32,
        reference: Option<u64>,
    },

    /// Delivery receipt. `sequence`/`reference` are set when it matched a
    /// pending submission.
    DeliveryReport {
        message_id: String,
        recipient: String,
        state: Option<MessageState>,
        sequence: Option<u32>,
        reference: Option<u64>,
    },

    /// Mobile-originated message.
    InboundMessage {
        source: String,
        destination: String,
        text: String,
    },

    /// query_sm_resp. `resolved` is set when a terminal state retired a
    /// pending submission.
    QueryResult {
        message_id: String,
        state: Option<MessageState>,
        error_code: u8,
        resolved: Option<u32>,
        reference: Option<u64>,
    },

    /// cancel_sm / replace_sm / query_sm answered with ESME_ROK.
    CommandCompleted { command: CommandId, sequence: u32 },

    /// cancel_sm / replace_sm / query_sm answered with an error status.
    CommandFailed {
        command: CommandId,
        sequence: u32,
        status: u32,
    },

    /// generic_nack from the peer.
    Nacked { sequence: u32, status: u32 },

    /// The session was unbound and the transport closed.
    Unbound { by_peer: bool },

    /// A pending submission outlived the configured TTL.
    Expired {
        sequence: u32,
        message_id: String,
        reference: Option<u64>,
    },
}
