// SMPP v3.4 Codec - wire format for the PDUs the gateway speaks
//
// Header layout, C-octet string and integer field helpers, frame splitting
// over a receive buffer and the Frame enum that typed PDUs decode into.
// Each PDU implements Encodable/Decodable in its own datatypes module.

use crate::datatypes::{
    BindRequest, BindResponse, CancelSm, CancelSmResponse, CommandId, CommandStatus, DeliverSm,
    DeliverSmResponse, EnquireLink, EnquireLinkResponse, GenericNack, Outbind, QuerySm,
    QuerySmResponse, ReplaceSm, ReplaceSmResponse, SubmitMulti, SubmitMultiResponse, SubmitSm,
    SubmitSmResponse, Unbind, UnbindResponse,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use thiserror::Error;

/// Maximum accepted inbound PDU size; larger declared lengths are treated as
/// a corrupt stream.
pub const MAX_PDU_SIZE: u32 = 65536;

/// SMPP PDU header (16 bytes, common to all PDUs).
///
/// Ids and status are kept raw so that unknown commands and vendor status
/// codes survive decoding and can be answered or logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduHeader {
    pub command_length: u32,
    pub command_id: u32,
    pub command_status: u32,
    pub sequence_number: u32,
}

impl PduHeader {
    pub const SIZE: usize = 16;

    pub fn new(command_id: CommandId, command_status: u32, sequence_number: u32) -> Self {
        PduHeader {
            command_length: Self::SIZE as u32,
            command_id: command_id as u32,
            command_status,
            sequence_number,
        }
    }

    /// Decode the four header words. The length is not validated here; see
    /// [`split_frame`] for stream-level length checks.
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < Self::SIZE {
            return Err(CodecError::InvalidHeader {
                available: buf.remaining(),
            });
        }

        Ok(PduHeader {
            command_length: buf.get_u32(),
            command_id: buf.get_u32(),
            command_status: buf.get_u32(),
            sequence_number: buf.get_u32(),
        })
    }

    /// Encode the header. `command_length` is written as stored; [`Encodable::to_bytes`]
    /// backpatches it once the body is known.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.command_length);
        buf.put_u32(self.command_id);
        buf.put_u32(self.command_status);
        buf.put_u32(self.sequence_number);
    }

    pub fn command(&self) -> Option<CommandId> {
        CommandId::try_from(self.command_id).ok()
    }

    pub fn status(&self) -> Option<CommandStatus> {
        CommandStatus::try_from(self.command_status).ok()
    }

    pub fn is_ok(&self) -> bool {
        self.command_status == CommandStatus::Ok as u32
    }

    pub fn body_len(&self) -> usize {
        (self.command_length as usize).saturating_sub(Self::SIZE)
    }
}

/// Header-only encoding: a 16-byte header whose length covers `body_length`
/// more bytes.
pub fn encode_header(
    command_id: CommandId,
    command_status: u32,
    sequence_number: u32,
    body_length: usize,
) -> [u8; PduHeader::SIZE] {
    let mut out = [0u8; PduHeader::SIZE];
    let length = (PduHeader::SIZE + body_length) as u32;
    out[0..4].copy_from_slice(&length.to_be_bytes());
    out[4..8].copy_from_slice(&(command_id as u32).to_be_bytes());
    out[8..12].copy_from_slice(&command_status.to_be_bytes());
    out[12..16].copy_from_slice(&sequence_number.to_be_bytes());
    out
}

/// Types that can be written to the wire as a complete PDU.
pub trait Encodable {
    /// Write header and body to `buf`.
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError>;

    /// Encode into a fresh buffer and fix up command_length.
    fn to_bytes(&self) -> Result<Bytes, CodecError> {
        let mut buf = BytesMut::with_capacity(64);
        self.encode(&mut buf)?;

        if buf.len() >= 4 {
            let length = buf.len() as u32;
            buf[0..4].copy_from_slice(&length.to_be_bytes());
        }

        Ok(buf.freeze())
    }
}

/// Types that decode from a PDU body. The cursor is positioned just past the
/// header and ends at the last byte actually received for this frame.
pub trait Decodable: Sized {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError>;
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Invalid header: {available} bytes available, 16 required")]
    InvalidHeader { available: usize },

    #[error("Incomplete PDU body: field extends past received bytes")]
    Incomplete,

    #[error("Invalid PDU length: {length}, must be {min}-{max}")]
    InvalidPduLength { length: u32, min: u32, max: u32 },

    #[error("PDU declares {declared} bytes but {received} were received")]
    LengthMismatch { declared: usize, received: usize },

    #[error("Unexpected command_id: expected {expected:?}, got {actual:#010x}")]
    UnexpectedCommandId { expected: CommandId, actual: u32 },

    #[error("Malformed {command_id:#010x} body: {source}")]
    MalformedBody {
        command_id: u32,
        #[source]
        source: Box<CodecError>,
    },

    #[error("Field '{field}' is missing its NUL terminator")]
    MissingTerminator { field: &'static str },

    #[error("Field '{field}' is {actual} bytes, limit is {max}")]
    FieldTooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("Field '{field}' validation failed: {reason}")]
    FieldValidation { field: &'static str, reason: String },

    #[error("TLV parsing error: {0}")]
    TlvError(String),

    #[error("UTF-8 decoding error in field '{field}': {source}")]
    Utf8Error {
        field: &'static str,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

impl CodecError {
    /// Status to put in a generic_nack or error response for a PDU that
    /// failed to decode.
    pub fn to_command_status(&self) -> CommandStatus {
        match self {
            CodecError::MalformedBody { source, .. } => source.to_command_status(),
            CodecError::InvalidHeader { .. }
            | CodecError::Incomplete
            | CodecError::InvalidPduLength { .. }
            | CodecError::LengthMismatch { .. }
            | CodecError::MissingTerminator { .. } => CommandStatus::InvalidCommandLength,
            CodecError::UnexpectedCommandId { .. } => CommandStatus::InvalidCommandId,
            CodecError::FieldTooLong { field, .. } | CodecError::FieldValidation { field, .. } => {
                match *field {
                    "source_addr" => CommandStatus::InvalidSourceAddress,
                    "destination_addr" => CommandStatus::InvalidDestinationAddress,
                    "short_message" | "message_payload" => CommandStatus::InvalidMsgLength,
                    "message_id" => CommandStatus::InvalidMessageId,
                    _ => CommandStatus::SystemError,
                }
            }
            CodecError::TlvError(_) => CommandStatus::ErrorInOptionalPart,
            CodecError::Utf8Error { .. } => CommandStatus::SystemError,
        }
    }
}

/// Decode a C-octet string of at most `max_len` characters (NUL excluded).
///
/// The scan stops at the end of the received bytes, so a missing terminator
/// is reported rather than read past.
pub fn decode_cstring(
    buf: &mut Cursor<&[u8]>,
    max_len: usize,
    field: &'static str,
) -> Result<String, CodecError> {
    let bytes = decode_cstring_bytes(buf, max_len, field)?;
    String::from_utf8(bytes.to_vec()).map_err(|source| CodecError::Utf8Error { field, source })
}

fn decode_cstring_bytes(
    buf: &mut Cursor<&[u8]>,
    max_len: usize,
    field: &'static str,
) -> Result<Bytes, CodecError> {
    let chunk = buf.chunk();
    let window = chunk.len().min(max_len + 1);

    match chunk[..window].iter().position(|&b| b == 0) {
        Some(end) => {
            let value = Bytes::copy_from_slice(&chunk[..end]);
            buf.advance(end + 1);
            Ok(value)
        }
        None if chunk.len() > max_len => Err(CodecError::FieldTooLong {
            field,
            max: max_len,
            actual: chunk.iter().position(|&b| b == 0).unwrap_or(chunk.len()),
        }),
        None => Err(CodecError::MissingTerminator { field }),
    }
}

/// Encode a variable-length C-octet string: the characters followed by NUL.
pub fn encode_cstring(
    buf: &mut BytesMut,
    value: &str,
    max_len: usize,
    field: &'static str,
) -> Result<(), CodecError> {
    check_cstring(value, max_len, field)?;
    buf.put_slice(value.as_bytes());
    buf.put_u8(0);
    Ok(())
}

/// Length and content check for a value destined for a C-octet string field.
pub fn check_cstring(value: &str, max_len: usize, field: &'static str) -> Result<(), CodecError> {
    if value.len() > max_len {
        return Err(CodecError::FieldTooLong {
            field,
            max: max_len,
            actual: value.len(),
        });
    }
    if value.as_bytes().contains(&0) {
        return Err(CodecError::FieldValidation {
            field,
            reason: "embedded NUL".to_string(),
        });
    }
    Ok(())
}

/// Decode `len` raw octets.
pub fn decode_octets(buf: &mut Cursor<&[u8]>, len: usize) -> Result<Bytes, CodecError> {
    if buf.remaining() < len {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.copy_to_bytes(len))
}

pub fn decode_u8(buf: &mut Cursor<&[u8]>) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.get_u8())
}

pub fn decode_u16(buf: &mut Cursor<&[u8]>) -> Result<u16, CodecError> {
    if buf.remaining() < 2 {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.get_u16())
}

pub fn decode_u32(buf: &mut Cursor<&[u8]>) -> Result<u32, CodecError> {
    if buf.remaining() < 4 {
        return Err(CodecError::Incomplete);
    }
    Ok(buf.get_u32())
}

/// Split one complete PDU off the front of a receive buffer.
///
/// Returns `Ok(None)` until a full frame has arrived. A declared length
/// outside `16..=MAX_PDU_SIZE` means the stream can no longer be framed.
pub fn split_frame(buf: &mut BytesMut) -> Result<Option<BytesMut>, CodecError> {
    if buf.len() < PduHeader::SIZE {
        return Ok(None);
    }

    let command_length = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if command_length < PduHeader::SIZE as u32 || command_length > MAX_PDU_SIZE {
        return Err(CodecError::InvalidPduLength {
            length: command_length,
            min: PduHeader::SIZE as u32,
            max: MAX_PDU_SIZE,
        });
    }

    let length = command_length as usize;
    if buf.len() < length {
        buf.reserve(length - buf.len());
        return Ok(None);
    }

    Ok(Some(buf.split_to(length)))
}

/// Any PDU the gateway can receive or send.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Bind(BindRequest),
    BindResp(BindResponse),
    Outbind(Outbind),
    Unbind(Unbind),
    UnbindResp(UnbindResponse),
    SubmitSm(Box<SubmitSm>),
    SubmitSmResp(SubmitSmResponse),
    SubmitMulti(Box<SubmitMulti>),
    SubmitMultiResp(SubmitMultiResponse),
    DeliverSm(Box<DeliverSm>),
    DeliverSmResp(DeliverSmResponse),
    QuerySm(QuerySm),
    QuerySmResp(QuerySmResponse),
    CancelSm(CancelSm),
    CancelSmResp(CancelSmResponse),
    ReplaceSm(Box<ReplaceSm>),
    ReplaceSmResp(ReplaceSmResponse),
    EnquireLink(EnquireLink),
    EnquireLinkResp(EnquireLinkResponse),
    GenericNack(GenericNack),
    /// A well-framed PDU whose command id is not one the gateway knows.
    Unknown { header: PduHeader, body: Bytes },
}

impl Frame {
    /// Decode exactly one frame as produced by [`split_frame`].
    pub fn decode(frame: &[u8]) -> Result<Frame, CodecError> {
        let mut cursor = Cursor::new(frame);
        let header = PduHeader::decode(&mut cursor)?;

        let declared = header.command_length as usize;
        if declared != frame.len() {
            return Err(CodecError::LengthMismatch {
                declared,
                received: frame.len(),
            });
        }

        let Some(command) = header.command() else {
            return Ok(Frame::Unknown {
                header,
                body: Bytes::copy_from_slice(&frame[PduHeader::SIZE..]),
            });
        };

        Self::decode_body(command, header, &mut cursor).map_err(|source| {
            CodecError::MalformedBody {
                command_id: header.command_id,
                source: Box::new(source),
            }
        })
    }

    fn decode_body(
        command: CommandId,
        header: PduHeader,
        buf: &mut Cursor<&[u8]>,
    ) -> Result<Frame, CodecError> {
        let frame = match command {
            CommandId::BindTransmitter | CommandId::BindReceiver | CommandId::BindTransceiver => {
                Frame::Bind(BindRequest::decode(header, buf)?)
            }
            CommandId::BindTransmitterResp
            | CommandId::BindReceiverResp
            | CommandId::BindTransceiverResp => Frame::BindResp(BindResponse::decode(header, buf)?),
            CommandId::Outbind => Frame::Outbind(Outbind::decode(header, buf)?),
            CommandId::Unbind => Frame::Unbind(Unbind::decode(header, buf)?),
            CommandId::UnbindResp => Frame::UnbindResp(UnbindResponse::decode(header, buf)?),
            CommandId::SubmitSm => Frame::SubmitSm(Box::new(SubmitSm::decode(header, buf)?)),
            CommandId::SubmitSmResp => Frame::SubmitSmResp(SubmitSmResponse::decode(header, buf)?),
            CommandId::SubmitMulti => {
                Frame::SubmitMulti(Box::new(SubmitMulti::decode(header, buf)?))
            }
            CommandId::SubmitMultiResp => {
                Frame::SubmitMultiResp(SubmitMultiResponse::decode(header, buf)?)
            }
            CommandId::DeliverSm => Frame::DeliverSm(Box::new(DeliverSm::decode(header, buf)?)),
            CommandId::DeliverSmResp => {
                Frame::DeliverSmResp(DeliverSmResponse::decode(header, buf)?)
            }
            CommandId::QuerySm => Frame::QuerySm(QuerySm::decode(header, buf)?),
            CommandId::QuerySmResp => Frame::QuerySmResp(QuerySmResponse::decode(header, buf)?),
            CommandId::CancelSm => Frame::CancelSm(CancelSm::decode(header, buf)?),
            CommandId::CancelSmResp => Frame::CancelSmResp(CancelSmResponse::decode(header, buf)?),
            CommandId::ReplaceSm => Frame::ReplaceSm(Box::new(ReplaceSm::decode(header, buf)?)),
            CommandId::ReplaceSmResp => {
                Frame::ReplaceSmResp(ReplaceSmResponse::decode(header, buf)?)
            }
            CommandId::EnquireLink => Frame::EnquireLink(EnquireLink::decode(header, buf)?),
            CommandId::EnquireLinkResp => {
                Frame::EnquireLinkResp(EnquireLinkResponse::decode(header, buf)?)
            }
            CommandId::GenericNack => Frame::GenericNack(GenericNack::decode(header, buf)?),
        };

        Ok(frame)
    }

    pub fn command_id(&self) -> u32 {
        let id = match self {
            Frame::Bind(pdu) => pdu.mode.command_id(),
            Frame::BindResp(pdu) => pdu.mode.command_id().response(),
            Frame::Outbind(_) => CommandId::Outbind,
            Frame::Unbind(_) => CommandId::Unbind,
            Frame::UnbindResp(_) => CommandId::UnbindResp,
            Frame::SubmitSm(_) => CommandId::SubmitSm,
            Frame::SubmitSmResp(_) => CommandId::SubmitSmResp,
            Frame::SubmitMulti(_) => CommandId::SubmitMulti,
            Frame::SubmitMultiResp(_) => CommandId::SubmitMultiResp,
            Frame::DeliverSm(_) => CommandId::DeliverSm,
            Frame::DeliverSmResp(_) => CommandId::DeliverSmResp,
            Frame::QuerySm(_) => CommandId::QuerySm,
            Frame::QuerySmResp(_) => CommandId::QuerySmResp,
            Frame::CancelSm(_) => CommandId::CancelSm,
            Frame::CancelSmResp(_) => CommandId::CancelSmResp,
            Frame::ReplaceSm(_) => CommandId::ReplaceSm,
            Frame::ReplaceSmResp(_) => CommandId::ReplaceSmResp,
            Frame::EnquireLink(_) => CommandId::EnquireLink,
            Frame::EnquireLinkResp(_) => CommandId::EnquireLinkResp,
            Frame::GenericNack(_) => CommandId::GenericNack,
            Frame::Unknown { header, .. } => return header.command_id,
        };
        id as u32
    }

    pub fn sequence_number(&self) -> u32 {
        match self {
            Frame::Bind(pdu) => pdu.sequence_number,
            Frame::BindResp(pdu) => pdu.sequence_number,
            Frame::Outbind(pdu) => pdu.sequence_number,
            Frame::Unbind(pdu) => pdu.sequence_number,
            Frame::UnbindResp(pdu) => pdu.sequence_number,
            Frame::SubmitSm(pdu) => pdu.sequence_number,
            Frame::SubmitSmResp(pdu) => pdu.sequence_number,
            Frame::SubmitMulti(pdu) => pdu.sequence_number,
            Frame::SubmitMultiResp(pdu) => pdu.sequence_number,
            Frame::DeliverSm(pdu) => pdu.sequence_number,
            Frame::DeliverSmResp(pdu) => pdu.sequence_number,
            Frame::QuerySm(pdu) => pdu.sequence_number,
            Frame::QuerySmResp(pdu) => pdu.sequence_number,
            Frame::CancelSm(pdu) => pdu.sequence_number,
            Frame::CancelSmResp(pdu) => pdu.sequence_number,
            Frame::ReplaceSm(pdu) => pdu.sequence_number,
            Frame::ReplaceSmResp(pdu) => pdu.sequence_number,
            Frame::EnquireLink(pdu) => pdu.sequence_number,
            Frame::EnquireLinkResp(pdu) => pdu.sequence_number,
            Frame::GenericNack(pdu) => pdu.sequence_number,
            Frame::Unknown { header, .. } => header.sequence_number,
        }
    }

    pub fn is_response(&self) -> bool {
        crate::datatypes::is_response_id(self.command_id())
    }
}
