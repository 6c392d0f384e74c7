// ABOUTME: SmppEngine: per-SMSC session facade over transport, codec, state machine and pending table
// ABOUTME: All mutable session state sits behind one lock shared with the heartbeat task

use crate::client::error::{SmppError, SmppResult};
use crate::client::events::EngineEvent;
use crate::client::keepalive::{self, HeartbeatConfig, HeartbeatHandle, HeartbeatStatus, LinkFailure};
use crate::client::pending::{
    PendingBulkRequest, PendingEntry, PendingRequest, PendingRequestTable, RequestState,
};
use crate::client::state::{BindStateMachine, Operation, SessionState};
use crate::client::types::{BindCredentials, SmppOptions};
use crate::codec::{CodecError, Encodable, Frame, PduHeader, check_cstring, split_frame};
use crate::connection::{Received, Transport, TransportSession};
use crate::datatypes::tlv::tags;
use crate::datatypes::{
    BindMode, BindRequest, CancelSm, CommandId, CommandStatus, DeliverSm, DeliverSmResponse,
    Destination, EnquireLink, EnquireLinkResponse, GenericNack, MAX_ADDR_LEN, MAX_DESTINATIONS,
    MessageState, QuerySm, ReplaceSm, SubmitMulti, SubmitSm, Tlv, Unbind, UnbindResponse,
    describe_status, is_response_id,
};
use bytes::{Bytes, BytesMut};
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::time::Instant;
use tracing::{debug, error, info, trace, warn};

/// Sequence numbers run 1..=0x7FFFFFFF and then start over at 1.
const LAST_SEQUENCE: u32 = 0x7FFF_FFFF;

const STATUS_OK: u32 = CommandStatus::Ok as u32;

fn following(sequence: u32) -> u32 {
    if sequence >= LAST_SEQUENCE { 1 } else { sequence + 1 }
}

/// Lazily formatted hex dump for TRACE logs.
struct HexDump<'a>(&'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct LinkStats {
    pings: u32,
    pongs: u32,
    /// enquire_link PDUs sent since the last enquire_link_resp.
    unanswered: u32,
}

#[derive(Debug, Clone, Copy)]
struct BindAttempt {
    mode: BindMode,
    sequence: u32,
    fallback_allowed: bool,
}

/// Everything the main loop and the heartbeat share.
struct Session<T> {
    engine: usize,
    transport: T,
    buffer: BytesMut,
    state: BindStateMachine,
    pending: PendingRequestTable,
    /// Non-submit requests awaiting a response, for correlation and logging.
    outstanding: HashMap<u32, (CommandId, Instant)>,
    next_sequence: u32,
    credentials: BindCredentials,
    bind_attempt: Option<BindAttempt>,
    smsc_system_id: Option<String>,
    link: LinkStats,
    /// Failure hit after earlier PDUs of the same read produced events;
    /// reported by the next `process_incoming`.
    deferred: Option<SmppError>,
}

impl<T: Transport> Session<T> {
    fn teardown(&mut self) {
        self.transport.disconnect();
        self.state.disconnected();
        self.buffer.clear();
        self.outstanding.clear();
        self.bind_attempt = None;
        self.link = LinkStats::default();
    }

    async fn write(&mut self, bytes: &[u8]) -> SmppResult<()> {
        trace!(engine = self.engine, pdu = %HexDump(bytes), "tx");
        if let Err(e) = self.transport.send(bytes).await {
            error!(engine = self.engine, error = %e, "send failed, closing session");
            self.teardown();
            return Err(SmppError::Connection(e));
        }
        Ok(())
    }

    /// Send a request built with `self.next_sequence`.
    ///
    /// The PDU is encoded before the counter moves, so one that fails local
    /// validation never consumes a sequence number.
    async fn send_request(&mut self, pdu: &(impl Encodable + Sync)) -> SmppResult<u32> {
        let sequence = self.next_sequence;
        let bytes = pdu.to_bytes()?;
        self.next_sequence = following(sequence);
        self.write(&bytes).await?;
        Ok(sequence)
    }

    async fn respond(&mut self, pdu: &(impl Encodable + Sync)) -> SmppResult<()> {
        self.state.require(Operation::Respond)?;
        let bytes = pdu.to_bytes()?;
        self.write(&bytes).await
    }

    async fn bind(&mut self, mode: BindMode, fallback_allowed: bool) -> SmppResult<u32> {
        self.state.require(Operation::Bind)?;
        self.credentials.validate()?;

        let credentials = &self.credentials;
        let request = BindRequest {
            mode,
            sequence_number: self.next_sequence,
            system_id: credentials.system_id.clone(),
            password: credentials.password.clone(),
            system_type: credentials.system_type.clone(),
            interface_version: credentials.interface_version,
            addr_ton: credentials.addr_ton,
            addr_npi: credentials.addr_npi,
            address_range: credentials.address_range.clone(),
        };
        let sequence = self.send_request(&request).await?;

        info!(engine = self.engine, sequence, ?mode, system_id = %request.system_id, "bind requested");
        self.bind_attempt = Some(BindAttempt {
            mode,
            sequence,
            fallback_allowed,
        });
        Ok(sequence)
    }

    async fn unbind(&mut self) -> SmppResult<u32> {
        self.state.require(Operation::Unbind)?;
        let request = Unbind::new(self.next_sequence);
        let sequence = self.send_request(&request).await?;
        self.outstanding.insert(sequence, (CommandId::Unbind, Instant::now()));
        info!(engine = self.engine, sequence, "unbind requested");
        Ok(sequence)
    }

    async fn submit(
        &mut self,
        text: &str,
        destination: &str,
        options: &Arc<SmppOptions>,
        reference: Option<u64>,
    ) -> SmppResult<u32> {
        self.state.require(Operation::Submit)?;

        let sequence = self.next_sequence;
        let mut pdu = SubmitSm::new(sequence, options.source(None), options.destination(destination));
        pdu.service_type = options.service_type().to_string();
        pdu.esm_class = options.esm_class();
        pdu.protocol_id = options.protocol_id();
        pdu.priority_flag = options.priority();
        pdu.schedule_delivery_time = options.schedule_delivery_time().clone();
        pdu.validity_period = options.validity_period().clone();
        pdu.registered_delivery = options.registered_delivery();
        pdu.replace_if_present_flag = options.replace_if_present() as u8;
        pdu.data_coding = options.data_coding();
        pdu.sm_default_msg_id = options.canned_message_id();
        pdu.set_message(text.as_bytes())?;
        // user_message_reference is a u16; it carries the low half of the sequence
        pdu.tlvs
            .push(Tlv::from_u16(tags::USER_MESSAGE_REFERENCE, sequence as u16));

        let sequence = self.send_request(&pdu).await?;
        self.pending.register(
            sequence,
            PendingEntry::Single(PendingRequest {
                state: RequestState::Sent,
                message_id: String::new(),
                text: text.to_string(),
                destination: destination.to_string(),
                options: Arc::clone(options),
                reference,
                created: Instant::now(),
            }),
        );
        debug!(engine = self.engine, sequence, destination, len = text.len(), "submit_sm sent");
        Ok(sequence)
    }

    async fn submit_multi(
        &mut self,
        text: &str,
        destinations: &[String],
        options: &Arc<SmppOptions>,
        reference: Option<u64>,
    ) -> SmppResult<Vec<u32>> {
        self.state.require(Operation::SubmitMulti)?;
        if destinations.is_empty() {
            return Err(SmppError::InvalidOptions(
                "submit_multi needs at least one destination".to_string(),
            ));
        }
        for destination in destinations {
            check_cstring(destination, MAX_ADDR_LEN, "destination_addr")?;
        }

        let mut sequences = Vec::with_capacity(destinations.len().div_ceil(MAX_DESTINATIONS));
        for chunk in destinations.chunks(MAX_DESTINATIONS) {
            let sequence = self.next_sequence;
            let targets = chunk
                .iter()
                .map(|addr| Destination::Sme(options.destination(addr)))
                .collect();
            let mut pdu = SubmitMulti::new(sequence, options.source(None), targets);
            pdu.service_type = options.service_type().to_string();
            pdu.esm_class = options.esm_class();
            pdu.protocol_id = options.protocol_id();
            pdu.priority_flag = options.priority();
            pdu.schedule_delivery_time = options.schedule_delivery_time().clone();
            pdu.validity_period = options.validity_period().clone();
            pdu.registered_delivery = options.registered_delivery();
            pdu.replace_if_present_flag = options.replace_if_present() as u8;
            pdu.data_coding = options.data_coding();
            pdu.sm_default_msg_id = options.canned_message_id();
            pdu.set_message(text.as_bytes())?;
            pdu.tlvs
                .push(Tlv::from_u16(tags::USER_MESSAGE_REFERENCE, sequence as u16));

            let sequence = self.send_request(&pdu).await?;
            self.pending.register(
                sequence,
                PendingEntry::Bulk(PendingBulkRequest {
                    state: RequestState::Sent,
                    message_id: String::new(),
                    text: text.to_string(),
                    destinations: chunk.iter().cloned().collect(),
                    options: Arc::clone(options),
                    reference,
                    created: Instant::now(),
                }),
            );
            debug!(engine = self.engine, sequence, destinations = chunk.len(), "submit_multi sent");
            sequences.push(sequence);
        }
        Ok(sequences)
    }

    async fn query(
        &mut self,
        message_id: &str,
        options: &SmppOptions,
        source_addr: Option<&str>,
    ) -> SmppResult<u32> {
        self.state.require(Operation::Query)?;
        let request = QuerySm {
            sequence_number: self.next_sequence,
            message_id: message_id.to_string(),
            source: options.source(source_addr),
        };
        let sequence = self.send_request(&request).await?;
        self.outstanding.insert(sequence, (CommandId::QuerySm, Instant::now()));
        debug!(engine = self.engine, sequence, message_id, "query_sm sent");
        Ok(sequence)
    }

    async fn cancel(
        &mut self,
        message_id: &str,
        options: &SmppOptions,
        source_addr: Option<&str>,
    ) -> SmppResult<u32> {
        self.state.require(Operation::Cancel)?;
        let request = CancelSm {
            sequence_number: self.next_sequence,
            service_type: options.service_type().to_string(),
            message_id: message_id.to_string(),
            source: options.source(source_addr),
            destination: options.destination(""),
        };
        let sequence = self.send_request(&request).await?;
        self.outstanding.insert(sequence, (CommandId::CancelSm, Instant::now()));
        debug!(engine = self.engine, sequence, message_id, "cancel_sm sent");
        Ok(sequence)
    }

    async fn replace(
        &mut self,
        message_id: &str,
        options: &SmppOptions,
        text: &str,
        source_addr: Option<&str>,
    ) -> SmppResult<u32> {
        self.state.require(Operation::Replace)?;
        let request = ReplaceSm {
            sequence_number: self.next_sequence,
            message_id: message_id.to_string(),
            source: options.source(source_addr),
            schedule_delivery_time: options.schedule_delivery_time().clone(),
            validity_period: options.validity_period().clone(),
            registered_delivery: options.registered_delivery(),
            sm_default_msg_id: options.canned_message_id(),
            short_message: Bytes::copy_from_slice(text.as_bytes()),
        };
        let sequence = self.send_request(&request).await?;
        self.outstanding.insert(sequence, (CommandId::ReplaceSm, Instant::now()));
        debug!(engine = self.engine, sequence, message_id, "replace_sm sent");
        Ok(sequence)
    }

    async fn enquire(&mut self) -> SmppResult<u32> {
        self.state.require(Operation::Enquire)?;
        let request = EnquireLink::new(self.next_sequence);
        let sequence = self.send_request(&request).await?;
        self.link.pings += 1;
        self.link.unanswered += 1;
        trace!(engine = self.engine, sequence, "enquire_link sent");
        Ok(sequence)
    }

    async fn process_incoming(&mut self) -> SmppResult<Vec<EngineEvent>> {
        if let Some(e) = self.deferred.take() {
            return Err(e);
        }
        match self.transport.receive(&mut self.buffer) {
            Ok(Received::Data(_)) => {}
            Ok(Received::WouldBlock) => return Ok(Vec::new()),
            Ok(Received::Closed) => {
                if self.state.state().is_connected() {
                    warn!(engine = self.engine, state = %self.state.state(), "connection closed by peer");
                }
                self.teardown();
                return Err(SmppError::ConnectionClosed);
            }
            Err(e) => {
                error!(engine = self.engine, error = %e, "receive failed, closing session");
                self.teardown();
                return Err(SmppError::Connection(e));
            }
        }

        let mut events = Vec::new();
        while self.state.state().is_connected() {
            let frame: SmppResult<BytesMut> = match split_frame(&mut self.buffer) {
                Ok(Some(frame)) => Ok(frame),
                Ok(None) => break,
                Err(e) => {
                    error!(engine = self.engine, error = %e, "unrecoverable framing error, closing session");
                    self.teardown();
                    Err(e.into())
                }
            };
            let handled = match frame {
                Ok(frame) => {
                    trace!(engine = self.engine, pdu = %HexDump(&frame), "rx");
                    match Frame::decode(&frame) {
                        Ok(pdu) => self.dispatch(pdu, &mut events).await,
                        Err(e) => self.reject_malformed(&frame, e).await,
                    }
                }
                Err(e) => Err(e),
            };
            if let Err(e) = handled {
                if events.is_empty() {
                    return Err(e);
                }
                // events already applied to the pending table must still reach the caller
                self.deferred = Some(e);
                break;
            }
        }
        Ok(events)
    }

    /// A well-framed PDU whose body did not decode. The session survives;
    /// requests get an error answer, responses are only logged.
    async fn reject_malformed(&mut self, frame: &[u8], err: CodecError) -> SmppResult<()> {
        let header = PduHeader::decode(&mut Cursor::new(frame))?;
        let status = err.to_command_status() as u32;
        warn!(
            engine = self.engine,
            sequence = header.sequence_number,
            command_id = header.command_id,
            status = %describe_status(status),
            error = %err,
            "undecodable PDU"
        );

        if is_response_id(header.command_id) {
            return Ok(());
        }
        if header.command_id == CommandId::DeliverSm as u32 {
            self.respond(&DeliverSmResponse::new(header.sequence_number, status))
                .await
        } else {
            self.respond(&GenericNack::with_status(header.sequence_number, status))
                .await
        }
    }

    async fn nack_unsupported(&mut self, command_id: u32, sequence: u32) -> SmppResult<()> {
        let status = CommandStatus::InvalidCommandId as u32;
        warn!(engine = self.engine, sequence, command_id, status = %describe_status(status), "unsupported request");
        self.respond(&GenericNack::with_status(sequence, status)).await
    }

    async fn dispatch(&mut self, frame: Frame, events: &mut Vec<EngineEvent>) -> SmppResult<()> {
        let engine = self.engine;
        match frame {
            Frame::BindResp(resp) => {
                self.on_bind_response(
                    resp.sequence_number,
                    resp.command_status,
                    Some(resp.system_id),
                    events,
                )
                .await?;
            }
            Frame::GenericNack(nack) => {
                let sequence = nack.sequence_number;
                let status = nack.command_status;
                warn!(engine, sequence, command_id = nack_target(&self.outstanding, sequence), status = %describe_status(status), "generic_nack received");
                if self.bind_attempt.is_some_and(|a| a.sequence == sequence) {
                    self.on_bind_response(sequence, status, None, events).await?;
                } else {
                    self.outstanding.remove(&sequence);
                    events.push(EngineEvent::Nacked { sequence, status });
                }
            }
            Frame::Outbind(outbind) => {
                if self.state.state() == SessionState::Connected {
                    info!(engine, system_id = %outbind.system_id, "outbind received, binding as receiver");
                    self.bind(BindMode::Receiver, false).await?;
                } else {
                    warn!(engine, state = %self.state.state(), "outbind ignored");
                }
            }
            Frame::Unbind(request) => {
                info!(engine, sequence = request.sequence_number, "unbind from peer");
                self.respond(&UnbindResponse::new(request.sequence_number))
                    .await?;
                self.state.unbound();
                self.teardown();
                events.push(EngineEvent::Unbound { by_peer: true });
            }
            Frame::UnbindResp(resp) => {
                self.outstanding.remove(&resp.sequence_number);
                if resp.command_status != STATUS_OK {
                    warn!(engine, sequence = resp.sequence_number, command_id = CommandId::UnbindResp as u32, status = %describe_status(resp.command_status), "unbind answered with error, closing anyway");
                }
                self.state.unbound();
                self.teardown();
                info!(engine, "unbound");
                events.push(EngineEvent::Unbound { by_peer: false });
            }
            Frame::SubmitSmResp(resp) => {
                let sequence = resp.sequence_number;
                if resp.command_status == STATUS_OK {
                    match self.pending.mark_submitted(sequence, &resp.message_id) {
                        Some(entry) => {
                            let reference = entry.reference();
                            debug!(engine, sequence, message_id = %resp.message_id, "submission accepted");
                            events.push(EngineEvent::Accepted {
                                sequence,
                                message_id: resp.message_id,
                                reference,
                            });
                        }
                        None => warn!(engine, sequence, "submit_sm_resp matches no pending request"),
                    }
                } else {
                    self.on_submit_rejected(CommandId::SubmitSmResp, sequence, resp.command_status, events);
                }
            }
            Frame::SubmitMultiResp(resp) => {
                let sequence = resp.sequence_number;
                if resp.command_status == STATUS_OK {
                    let refused: Vec<String> = resp
                        .unsuccessful
                        .iter()
                        .map(|failed| failed.address.addr.clone())
                        .collect();
                    match self.pending.mark_submitted(sequence, &resp.message_id) {
                        Some(entry) => {
                            let reference = entry.reference();
                            debug!(engine, sequence, message_id = %resp.message_id, refused = refused.len(), "bulk submission accepted");
                            self.pending.drop_destinations(sequence, &refused);
                            events.push(EngineEvent::BulkAccepted {
                                sequence,
                                message_id: resp.message_id,
                                reference,
                                refused: resp.unsuccessful,
                            });
                        }
                        None => warn!(engine, sequence, "submit_multi_resp matches no pending request"),
                    }
                } else {
                    self.on_submit_rejected(CommandId::SubmitMultiResp, sequence, resp.command_status, events);
                }
            }
            Frame::DeliverSm(pdu) => {
                // always acknowledged, whatever it carries
                self.respond(&DeliverSmResponse::new(pdu.sequence_number, STATUS_OK))
                    .await?;
                self.on_deliver(*pdu, events);
            }
            Frame::QuerySmResp(resp) => {
                let sequence = resp.sequence_number;
                self.outstanding.remove(&sequence);
                if resp.command_status != STATUS_OK {
                    self.on_command_failed(CommandId::QuerySm, sequence, resp.command_status, events);
                    return Ok(());
                }

                let state = resp.state();
                let (resolved, reference) = match state {
                    Some(s) if s.is_terminal() => {
                        match self.pending.remove_by_message_id(&resp.message_id) {
                            Some((seq, entry)) => (Some(seq), entry.reference()),
                            None => (None, None),
                        }
                    }
                    _ => (None, None),
                };
                info!(engine, sequence, message_id = %resp.message_id, ?state, resolved = resolved.is_some(), "query result");
                events.push(EngineEvent::QueryResult {
                    message_id: resp.message_id,
                    state,
                    error_code: resp.error_code,
                    resolved,
                    reference,
                });
            }
            Frame::CancelSmResp(resp) => {
                self.on_command_response(CommandId::CancelSm, resp.sequence_number, resp.command_status, events);
            }
            Frame::ReplaceSmResp(resp) => {
                self.on_command_response(CommandId::ReplaceSm, resp.sequence_number, resp.command_status, events);
            }
            Frame::EnquireLink(request) => {
                trace!(engine, sequence = request.sequence_number, "enquire_link from peer");
                self.respond(&EnquireLinkResponse::new(request.sequence_number))
                    .await?;
            }
            Frame::EnquireLinkResp(resp) => {
                self.link.pongs += 1;
                self.link.unanswered = 0;
                trace!(engine, sequence = resp.sequence_number, "link confirmed");
            }
            Frame::DeliverSmResp(resp) => {
                debug!(engine, sequence = resp.sequence_number, "stray deliver_sm_resp ignored");
            }
            Frame::Unknown { header, .. } if is_response_id(header.command_id) => {
                warn!(engine, sequence = header.sequence_number, command_id = header.command_id, status = %describe_status(header.command_status), "unknown response ignored");
            }
            // requests only an SMSC serves, and ids we do not know
            request @ (Frame::Bind(_)
            | Frame::SubmitSm(_)
            | Frame::SubmitMulti(_)
            | Frame::QuerySm(_)
            | Frame::CancelSm(_)
            | Frame::ReplaceSm(_)
            | Frame::Unknown { .. }) => {
                self.nack_unsupported(request.command_id(), request.sequence_number())
                    .await?;
            }
        }
        Ok(())
    }

    async fn on_bind_response(
        &mut self,
        sequence: u32,
        status: u32,
        system_id: Option<String>,
        events: &mut Vec<EngineEvent>,
    ) -> SmppResult<()> {
        let engine = self.engine;
        let Some(attempt) = self.bind_attempt.filter(|a| a.sequence == sequence) else {
            warn!(engine, sequence, status = %describe_status(status), "bind response matches no bind in flight");
            return Ok(());
        };
        self.bind_attempt = None;

        if status == STATUS_OK {
            let system_id = system_id.unwrap_or_default();
            self.state.bound(attempt.mode);
            info!(engine, sequence, mode = ?attempt.mode, smsc = %system_id, "bound");
            self.smsc_system_id = Some(system_id.clone());
            events.push(EngineEvent::Bound {
                mode: attempt.mode,
                system_id,
            });
        } else if status == CommandStatus::InvalidCommandId as u32 && attempt.fallback_allowed {
            warn!(engine, sequence, mode = ?attempt.mode, status = %describe_status(status), "bind mode refused, falling back to transmitter");
            self.bind(BindMode::Transmitter, false).await?;
        } else {
            error!(engine, sequence, command_id = attempt.mode.command_id().response() as u32, status = %describe_status(status), "bind rejected");
            events.push(EngineEvent::BindRejected { status });
        }
        Ok(())
    }

    fn on_submit_rejected(
        &mut self,
        command: CommandId,
        sequence: u32,
        status: u32,
        events: &mut Vec<EngineEvent>,
    ) {
        let reference = self.pending.get(sequence).and_then(PendingEntry::reference);
        warn!(engine = self.engine, sequence, command_id = command as u32, status = %describe_status(status), "submission rejected");
        events.push(EngineEvent::SubmitRejected {
            sequence,
            status,
            reference,
        });
    }

    fn on_command_response(
        &mut self,
        command: CommandId,
        sequence: u32,
        status: u32,
        events: &mut Vec<EngineEvent>,
    ) {
        self.outstanding.remove(&sequence);
        if status == STATUS_OK {
            debug!(engine = self.engine, sequence, ?command, "command completed");
            events.push(EngineEvent::CommandCompleted { command, sequence });
        } else {
            self.on_command_failed(command, sequence, status, events);
        }
    }

    fn on_command_failed(
        &mut self,
        command: CommandId,
        sequence: u32,
        status: u32,
        events: &mut Vec<EngineEvent>,
    ) {
        warn!(engine = self.engine, sequence, command_id = command as u32, status = %describe_status(status), "command failed");
        events.push(EngineEvent::CommandFailed {
            command,
            sequence,
            status,
        });
    }

    fn on_deliver(&mut self, pdu: DeliverSm, events: &mut Vec<EngineEvent>) {
        let engine = self.engine;
        let sequence = pdu.sequence_number;

        if let Some(receipt) = pdu.receipt() {
            let recipient = pdu.source.addr;
            let is_final = receipt.state.is_none_or(MessageState::is_terminal);
            let matched = if is_final {
                self.pending
                    .settle(&receipt.message_id, &recipient)
                    .map(|settled| (settled.sequence, settled.reference))
            } else {
                self.pending
                    .find_by_message_id(&receipt.message_id)
                    .map(|seq| (seq, self.pending.get(seq).and_then(PendingEntry::reference)))
            };

            info!(engine, sequence, message_id = %receipt.message_id, state = ?receipt.state, matched = matched.is_some(), "delivery report");
            events.push(EngineEvent::DeliveryReport {
                message_id: receipt.message_id,
                recipient,
                state: receipt.state,
                sequence: matched.map(|(seq, _)| seq),
                reference: matched.and_then(|(_, reference)| reference),
            });
        } else if pdu.is_receipt() {
            warn!(engine, sequence, "delivery receipt without a message id");
        } else {
            let text = String::from_utf8_lossy(&pdu.message()).into_owned();
            debug!(engine, sequence, source = %pdu.source.addr, len = text.len(), "inbound message");
            events.push(EngineEvent::InboundMessage {
                source: pdu.source.addr,
                destination: pdu.destination.addr,
                text,
            });
        }
    }
}

/// Command id of the request a generic_nack refers to, when we know it.
fn nack_target(outstanding: &HashMap<u32, (CommandId, Instant)>, sequence: u32) -> u32 {
    outstanding
        .get(&sequence)
        .map(|(command, _)| *command as u32)
        .unwrap_or(CommandId::GenericNack as u32)
}

/// The SMPP protocol engine for one SMSC connection.
///
/// Cheap to clone: clones share the session, so the heartbeat task and the
/// event loop drive the same state through the same entry points. Every
/// operation takes the session lock for its whole duration, making sequence
/// allocation and the socket write a single critical section.
pub struct SmppEngine<T: Transport> {
    id: usize,
    session: Arc<Mutex<Session<T>>>,
    heartbeat: Arc<StdMutex<Option<HeartbeatHandle>>>,
}

impl<T: Transport> Clone for SmppEngine<T> {
    fn clone(&self) -> Self {
        SmppEngine {
            id: self.id,
            session: Arc::clone(&self.session),
            heartbeat: Arc::clone(&self.heartbeat),
        }
    }
}

impl<T: Transport> SmppEngine<T> {
    /// Wrap an established transport. `pending_ttl` of `None` never expires
    /// pending submissions.
    pub fn new(
        id: usize,
        transport: T,
        credentials: BindCredentials,
        pending_ttl: Option<Duration>,
    ) -> Self {
        let mut state = BindStateMachine::new();
        if transport.is_connected() {
            state.connected();
        }

        let session = Session {
            engine: id,
            transport,
            buffer: BytesMut::with_capacity(4 * 1024),
            state,
            pending: PendingRequestTable::new(pending_ttl),
            outstanding: HashMap::new(),
            next_sequence: 1,
            credentials,
            bind_attempt: None,
            smsc_system_id: None,
            link: LinkStats::default(),
            deferred: None,
        };

        SmppEngine {
            id,
            session: Arc::new(Mutex::new(session)),
            heartbeat: Arc::new(StdMutex::new(None)),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub async fn state(&self) -> SessionState {
        self.session.lock().await.state.state()
    }

    /// System id the SMSC reported in its bind response.
    pub async fn smsc_system_id(&self) -> Option<String> {
        self.session.lock().await.smsc_system_id.clone()
    }

    /// Send a bind request. The outcome arrives through
    /// [`process_incoming`](Self::process_incoming) as `Bound` or `BindRejected`;
    /// an `ESME_RINVCMDID` answer triggers one retry as transmitter.
    pub async fn bind(&self, mode: BindMode) -> SmppResult<u32> {
        let mut session = self.session.lock().await;
        let result = session.bind(mode, mode != BindMode::Transmitter).await;
        self.checked(&session, result)
    }

    pub async fn unbind(&self) -> SmppResult<u32> {
        let mut session = self.session.lock().await;
        let result = session.unbind().await;
        self.checked(&session, result)
    }

    /// Submit `text` to `destination`, returning the sequence number that keys
    /// the pending entry.
    pub async fn submit(
        &self,
        text: &str,
        destination: &str,
        options: &Arc<SmppOptions>,
    ) -> SmppResult<u32> {
        let mut session = self.session.lock().await;
        let result = session.submit(text, destination, options, None).await;
        self.checked(&session, result)
    }

    /// As [`submit`](Self::submit), carrying a caller reference (store row id)
    /// through to the events for this message.
    pub async fn submit_tracked(
        &self,
        text: &str,
        destination: &str,
        options: &Arc<SmppOptions>,
        reference: u64,
    ) -> SmppResult<u32> {
        let mut session = self.session.lock().await;
        let result = session
            .submit(text, destination, options, Some(reference))
            .await;
        self.checked(&session, result)
    }

    /// Submit to many destinations, 254 per PDU. Returns one sequence number
    /// per PDU sent.
    pub async fn submit_multi(
        &self,
        text: &str,
        destinations: &[String],
        options: &Arc<SmppOptions>,
        reference: Option<u64>,
    ) -> SmppResult<Vec<u32>> {
        let mut session = self.session.lock().await;
        let result = session
            .submit_multi(text, destinations, options, reference)
            .await;
        self.checked(&session, result)
    }

    pub async fn query(
        &self,
        message_id: &str,
        options: &SmppOptions,
        source_addr: Option<&str>,
    ) -> SmppResult<u32> {
        let mut session = self.session.lock().await;
        let result = session.query(message_id, options, source_addr).await;
        self.checked(&session, result)
    }

    pub async fn cancel(
        &self,
        message_id: &str,
        options: &SmppOptions,
        source_addr: Option<&str>,
    ) -> SmppResult<u32> {
        let mut session = self.session.lock().await;
        let result = session.cancel(message_id, options, source_addr).await;
        self.checked(&session, result)
    }

    pub async fn replace(
        &self,
        message_id: &str,
        options: &SmppOptions,
        text: &str,
        source_addr: Option<&str>,
    ) -> SmppResult<u32> {
        let mut session = self.session.lock().await;
        let result = session.replace(message_id, options, text, source_addr).await;
        self.checked(&session, result)
    }

    pub async fn enquire(&self) -> SmppResult<u32> {
        let mut session = self.session.lock().await;
        let result = session.enquire().await;
        self.checked(&session, result)
    }

    /// Answer a peer's enquire_link, echoing its sequence number.
    pub async fn enquire_rsp(&self, sequence: u32) -> SmppResult<()> {
        let mut session = self.session.lock().await;
        let result = session.respond(&EnquireLinkResponse::new(sequence)).await;
        self.checked(&session, result)
    }

    /// One non-blocking receive, then dispatch of every complete PDU buffered.
    ///
    /// Returns an empty list when nothing was readable. Decode failures are
    /// answered and logged without ending the session; a closed connection or
    /// broken framing tears it down and is returned as an error.
    pub async fn process_incoming(&self) -> SmppResult<Vec<EngineEvent>> {
        let mut session = self.session.lock().await;
        let result = session.process_incoming().await;
        self.checked(&session, result)
    }

    /// Tear the session down after the heartbeat reported a dead link.
    pub async fn handle_link_failure(&self, reason: &str) {
        {
            let mut session = self.session.lock().await;
            error!(engine = self.id, state = %session.state.state(), reason, "link failure, closing session");
            session.teardown();
        }
        self.stop_heartbeat().await;
    }

    /// Drop pending submissions older than the configured TTL. Unanswered
    /// query, cancel and replace requests age out under the same TTL.
    pub async fn evict_expired(&self) -> Vec<EngineEvent> {
        let mut session = self.session.lock().await;
        let engine = self.id;
        let now = Instant::now();

        if let Some(ttl) = session.pending.ttl() {
            session.outstanding.retain(|&sequence, (command, sent)| {
                let live = now.saturating_duration_since(*sent) < ttl;
                if !live {
                    warn!(engine, sequence, command_id = *command as u32, "request never answered, dropped");
                }
                live
            });
        }

        session
            .pending
            .evict_expired(now)
            .into_iter()
            .map(|(sequence, entry)| {
                warn!(engine, sequence, message_id = entry.message_id(), "pending request expired");
                EngineEvent::Expired {
                    sequence,
                    message_id: entry.message_id().to_string(),
                    reference: entry.reference(),
                }
            })
            .collect()
    }

    pub async fn pending_len(&self) -> usize {
        self.session.lock().await.pending.len()
    }

    /// Query, cancel, replace and unbind requests still awaiting a response.
    pub async fn outstanding_len(&self) -> usize {
        self.session.lock().await.outstanding.len()
    }

    pub async fn pending_entry(&self, sequence: u32) -> Option<PendingEntry> {
        self.session.lock().await.pending.get(sequence).cloned()
    }

    pub async fn heartbeat_status(&self) -> HeartbeatStatus {
        let running = self
            .heartbeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(HeartbeatHandle::is_running);
        let link = self.session.lock().await.link;
        HeartbeatStatus {
            running,
            consecutive_failures: link.unanswered,
            total_pings: link.pings,
            total_pongs: link.pongs,
        }
    }

    /// Start the enquire_link task. Failures are reported on `failures`; the
    /// receiver is expected to call [`handle_link_failure`](Self::handle_link_failure).
    pub fn start_heartbeat(
        &self,
        config: HeartbeatConfig,
        failures: mpsc::UnboundedSender<LinkFailure>,
    ) {
        if !config.enabled {
            debug!(engine = self.id, "heartbeat disabled");
            return;
        }
        let handle = keepalive::spawn(self.clone(), config, failures);
        let previous = self
            .heartbeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.signal();
        }
    }

    /// Stop the heartbeat task and wait for it to finish.
    pub async fn stop_heartbeat(&self) {
        let handle = self
            .heartbeat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.join().await;
        }
    }

    /// Stop the heartbeat, unbind if bound, and close the transport.
    pub async fn shutdown(&self) {
        self.stop_heartbeat().await;
        let mut session = self.session.lock().await;
        if session.state.state().is_bound() {
            if let Err(e) = session.unbind().await {
                debug!(engine = self.id, error = %e, "unbind during shutdown failed");
            }
        }
        session.teardown();
        info!(engine = self.id, "session shut down");
    }

    /// Signal the heartbeat to stop once the session is gone.
    fn checked<R>(&self, session: &Session<T>, result: SmppResult<R>) -> SmppResult<R> {
        if !session.state.state().is_connected() {
            if let Some(handle) = self
                .heartbeat
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .as_ref()
            {
                handle.signal();
            }
        }
        result
    }
}

impl SmppEngine<TransportSession> {
    /// Connect to `host:port`. Every resolved address is tried in turn.
    pub async fn connect(
        id: usize,
        host: &str,
        port: u16,
        credentials: BindCredentials,
        pending_ttl: Option<Duration>,
    ) -> SmppResult<Self> {
        let transport = TransportSession::connect(host, port)
            .await
            .map_err(|source| SmppError::ConnectFailed {
                host: host.to_string(),
                port,
                source,
            })?;
        info!(engine = id, host, port, "connected to SMSC");
        Ok(Self::new(id, transport, credentials, pending_ttl))
    }

    /// Socket handle to await readability on without holding the session.
    pub async fn readiness(&self) -> Option<Arc<TcpStream>> {
        self.session.lock().await.transport.readiness()
    }

    /// Pump incoming PDUs until the bind in flight resolves.
    ///
    /// Returns every event seen, `Bound` included. A rejected bind becomes
    /// `BindRejected`, a silent SMSC `Timeout`.
    pub async fn await_bound(&self, timeout: Duration) -> SmppResult<Vec<EngineEvent>> {
        self.pump_until(timeout, |event| match event {
            EngineEvent::Bound { .. } => Some(Ok(())),
            EngineEvent::BindRejected { status } => {
                Some(Err(SmppError::BindRejected { status: *status }))
            }
            _ => None,
        })
        .await
    }

    /// Unbind and wait (up to `grace`) for the SMSC to confirm before closing.
    pub async fn shutdown_gracefully(&self, grace: Duration) -> Vec<EngineEvent> {
        self.stop_heartbeat().await;
        let mut events = Vec::new();
        if self.unbind().await.is_ok() {
            match self
                .pump_until(grace, |event| {
                    matches!(event, EngineEvent::Unbound { .. }).then_some(Ok(()))
                })
                .await
            {
                Ok(seen) => events = seen,
                Err(e) => debug!(engine = self.id, error = %e, "no unbind_resp before close"),
            }
        }
        self.shutdown().await;
        events
    }

    async fn pump_until<F>(&self, timeout: Duration, done: F) -> SmppResult<Vec<EngineEvent>>
    where
        F: Fn(&EngineEvent) -> Option<SmppResult<()>>,
    {
        let pump = async {
            let mut seen = Vec::new();
            loop {
                let stream = self.readiness().await.ok_or(SmppError::ConnectionClosed)?;
                stream.readable().await?;

                let events = self.process_incoming().await?;
                let outcome = events.iter().find_map(&done);
                seen.extend(events);
                if let Some(outcome) = outcome {
                    return outcome.map(|()| seen);
                }
            }
        };

        tokio::time::timeout(timeout, pump)
            .await
            .map_err(|_| SmppError::Timeout)?
    }
}
