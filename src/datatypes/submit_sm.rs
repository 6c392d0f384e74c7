// ABOUTME: submit_sm / submit_sm_resp: single-destination message submission
// ABOUTME: Texts over 254 octets travel in the message_payload TLV with sm_length 0

use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, decode_cstring, decode_octets, decode_u8,
    encode_cstring,
};
use crate::datatypes::address::{Address, MAX_ADDR_LEN};
use crate::datatypes::tlv::{Tlv, decode_tlvs, encode_tlvs, find_tlv, tags};
use crate::datatypes::{CommandId, EsmClass, PriorityFlag, RegisteredDelivery, SmppDateTime};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

pub const MAX_SERVICE_TYPE_LEN: usize = 5;
pub const MAX_TIME_LEN: usize = 16;
pub const MAX_MESSAGE_ID_LEN: usize = 64;
/// Largest text carried in the short_message field.
pub const MAX_SHORT_MESSAGE_LEN: usize = 254;
/// Largest text carried in the message_payload TLV.
pub const MAX_MESSAGE_PAYLOAD_LEN: usize = 65534;

/// Where a message text lands on the wire.
pub(crate) fn route_message(
    text: &[u8],
    tlvs: &mut Vec<Tlv>,
) -> Result<Bytes, CodecError> {
    if text.len() <= MAX_SHORT_MESSAGE_LEN {
        return Ok(Bytes::copy_from_slice(text));
    }
    if text.len() > MAX_MESSAGE_PAYLOAD_LEN {
        return Err(CodecError::FieldTooLong {
            field: "message_payload",
            max: MAX_MESSAGE_PAYLOAD_LEN,
            actual: text.len(),
        });
    }
    tlvs.retain(|tlv| tlv.tag != tags::MESSAGE_PAYLOAD);
    tlvs.push(Tlv::new(tags::MESSAGE_PAYLOAD, Bytes::copy_from_slice(text)));
    Ok(Bytes::new())
}

/// The text of a message: the short_message field, or the message_payload
/// TLV when the field is empty.
pub(crate) fn message_text(short_message: &Bytes, tlvs: &[Tlv]) -> Bytes {
    if !short_message.is_empty() {
        return short_message.clone();
    }
    find_tlv(tlvs, tags::MESSAGE_PAYLOAD)
        .map(|tlv| tlv.value.clone())
        .unwrap_or_default()
}

pub(crate) fn encode_time(
    buf: &mut BytesMut,
    time: &SmppDateTime,
    field: &'static str,
) -> Result<(), CodecError> {
    SmppDateTime::new(time.as_str()).map_err(|e| CodecError::FieldValidation {
        field,
        reason: e.to_string(),
    })?;
    encode_cstring(buf, time.as_str(), MAX_TIME_LEN, field)
}

pub(crate) fn decode_time(
    buf: &mut Cursor<&[u8]>,
    field: &'static str,
) -> Result<SmppDateTime, CodecError> {
    let raw = decode_cstring(buf, MAX_TIME_LEN, field)?;
    SmppDateTime::new(&raw).map_err(|e| CodecError::FieldValidation {
        field,
        reason: e.to_string(),
    })
}

/// Time fields in PDUs only the SMSC sends: tolerated when malformed.
pub(crate) fn decode_peer_time(
    buf: &mut Cursor<&[u8]>,
    field: &'static str,
) -> Result<SmppDateTime, CodecError> {
    let raw = decode_cstring(buf, MAX_TIME_LEN, field)?;
    Ok(SmppDateTime::from_peer(&raw))
}

pub(crate) fn encode_short_message(buf: &mut BytesMut, short_message: &[u8]) -> Result<(), CodecError> {
    if short_message.len() > MAX_SHORT_MESSAGE_LEN {
        return Err(CodecError::FieldTooLong {
            field: "short_message",
            max: MAX_SHORT_MESSAGE_LEN,
            actual: short_message.len(),
        });
    }
    buf.put_u8(short_message.len() as u8);
    buf.put_slice(short_message);
    Ok(())
}

pub(crate) fn decode_short_message(buf: &mut Cursor<&[u8]>) -> Result<Bytes, CodecError> {
    let sm_length = decode_u8(buf)? as usize;
    decode_octets(buf, sm_length)
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubmitSm {
    pub sequence_number: u32,
    pub service_type: String,
    pub source: Address,
    pub destination: Address,
    pub esm_class: EsmClass,
    pub protocol_id: u8,
    pub priority_flag: PriorityFlag,
    pub schedule_delivery_time: SmppDateTime,
    pub validity_period: SmppDateTime,
    pub registered_delivery: RegisteredDelivery,
    pub replace_if_present_flag: u8,
    pub data_coding: u8,
    pub sm_default_msg_id: u8,
    pub short_message: Bytes,
    pub tlvs: Vec<Tlv>,
}

impl SubmitSm {
    pub fn new(sequence_number: u32, source: Address, destination: Address) -> Self {
        SubmitSm {
            sequence_number,
            service_type: String::new(),
            source,
            destination,
            esm_class: EsmClass::default(),
            protocol_id: 0,
            priority_flag: PriorityFlag::Level0,
            schedule_delivery_time: SmppDateTime::immediate(),
            validity_period: SmppDateTime::immediate(),
            registered_delivery: RegisteredDelivery::default(),
            replace_if_present_flag: 0,
            data_coding: 0,
            sm_default_msg_id: 0,
            short_message: Bytes::new(),
            tlvs: Vec::new(),
        }
    }

    /// Place `text` in short_message or, past 254 octets, in message_payload.
    pub fn set_message(&mut self, text: &[u8]) -> Result<(), CodecError> {
        self.short_message = route_message(text, &mut self.tlvs)?;
        Ok(())
    }

    pub fn message(&self) -> Bytes {
        message_text(&self.short_message, &self.tlvs)
    }

    /// user_message_reference TLV, if present.
    pub fn user_message_reference(&self) -> Option<u16> {
        find_tlv(&self.tlvs, tags::USER_MESSAGE_REFERENCE).and_then(Tlv::as_u16)
    }
}

impl Encodable for SubmitSm {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::new(CommandId::SubmitSm, 0, self.sequence_number).encode(buf);
        encode_cstring(buf, &self.service_type, MAX_SERVICE_TYPE_LEN, "service_type")?;
        self.source.encode(buf, MAX_ADDR_LEN, "source_addr")?;
        self.destination.encode(buf, MAX_ADDR_LEN, "destination_addr")?;
        buf.put_u8(self.esm_class.to_byte());
        buf.put_u8(self.protocol_id);
        buf.put_u8(self.priority_flag as u8);
        encode_time(buf, &self.schedule_delivery_time, "schedule_delivery_time")?;
        encode_time(buf, &self.validity_period, "validity_period")?;
        buf.put_u8(self.registered_delivery.to_byte());
        buf.put_u8(self.replace_if_present_flag);
        buf.put_u8(self.data_coding);
        buf.put_u8(self.sm_default_msg_id);
        encode_short_message(buf, &self.short_message)?;
        encode_tlvs(buf, &self.tlvs)
    }
}

impl Decodable for SubmitSm {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let service_type = decode_cstring(buf, MAX_SERVICE_TYPE_LEN, "service_type")?;
        let source = Address::decode(buf, MAX_ADDR_LEN, "source_addr")?;
        let destination = Address::decode(buf, MAX_ADDR_LEN, "destination_addr")?;
        let esm_class = EsmClass::new(decode_u8(buf)?);
        let protocol_id = decode_u8(buf)?;
        let priority = decode_u8(buf)?;
        let priority_flag =
            PriorityFlag::try_from(priority).map_err(|_| CodecError::FieldValidation {
                field: "priority_flag",
                reason: format!("reserved priority {priority}"),
            })?;
        let schedule_delivery_time = decode_time(buf, "schedule_delivery_time")?;
        let validity_period = decode_time(buf, "validity_period")?;
        let registered_delivery = RegisteredDelivery::new(decode_u8(buf)?);
        let replace_if_present_flag = decode_u8(buf)?;
        let data_coding = decode_u8(buf)?;
        let sm_default_msg_id = decode_u8(buf)?;
        let short_message = decode_short_message(buf)?;
        let tlvs = decode_tlvs(buf)?;

        Ok(SubmitSm {
            sequence_number: header.sequence_number,
            service_type,
            source,
            destination,
            esm_class,
            protocol_id,
            priority_flag,
            schedule_delivery_time,
            validity_period,
            registered_delivery,
            replace_if_present_flag,
            data_coding,
            sm_default_msg_id,
            short_message,
            tlvs,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitSmResponse {
    pub command_status: u32,
    pub sequence_number: u32,
    /// SMSC-assigned id; empty when the submission was rejected.
    pub message_id: String,
}

impl Encodable for SubmitSmResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::new(CommandId::SubmitSmResp, self.command_status, self.sequence_number)
            .encode(buf);
        encode_cstring(buf, &self.message_id, MAX_MESSAGE_ID_LEN, "message_id")
    }
}

impl Decodable for SubmitSmResponse {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let message_id = if buf.has_remaining() {
            decode_cstring(buf, MAX_MESSAGE_ID_LEN, "message_id")?
        } else {
            String::new()
        };
        Ok(SubmitSmResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            message_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frame;
    use crate::datatypes::{NumericPlanIndicator, TypeOfNumber};

    fn sample(seq: u32) -> SubmitSm {
        SubmitSm::new(
            seq,
            Address::new(TypeOfNumber::Alphanumeric, NumericPlanIndicator::Unknown, "GATEWAY"),
            Address::new(TypeOfNumber::International, NumericPlanIndicator::Isdn, "447700900123"),
        )
    }

    #[test]
    fn short_text_uses_short_message_field() {
        let mut pdu = sample(1);
        pdu.set_message(b"hello").unwrap();
        assert_eq!(&pdu.short_message[..], b"hello");
        assert!(pdu.tlvs.is_empty());

        let bytes = pdu.to_bytes().unwrap();
        // sm_length followed by the text at the end of the body
        assert_eq!(&bytes[bytes.len() - 6..], b"\x05hello");
    }

    #[test]
    fn boundary_text_stays_in_short_message() {
        let mut pdu = sample(1);
        pdu.set_message(&[b'a'; 254]).unwrap();
        assert_eq!(pdu.short_message.len(), 254);
        assert!(pdu.tlvs.is_empty());
    }

    #[test]
    fn long_text_moves_to_message_payload() {
        let text = vec![b'x'; 300];
        let mut pdu = sample(2);
        pdu.set_message(&text).unwrap();
        assert!(pdu.short_message.is_empty());

        let bytes = pdu.to_bytes().unwrap();
        let tail = &bytes[bytes.len() - (300 + 4 + 1)..];
        // sm_length 0, then tag 0x0424 length 300
        assert_eq!(&tail[..5], &[0x00, 0x04, 0x24, 0x01, 0x2C]);

        match Frame::decode(&bytes).unwrap() {
            Frame::SubmitSm(decoded) => assert_eq!(&decoded.message()[..], &text[..]),
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn oversize_text_is_rejected() {
        let mut pdu = sample(3);
        let err = pdu.set_message(&vec![0u8; MAX_MESSAGE_PAYLOAD_LEN + 1]).unwrap_err();
        assert!(matches!(err, CodecError::FieldTooLong { field: "message_payload", .. }));
    }

    #[test]
    fn full_roundtrip_with_reference() {
        let mut pdu = sample(9);
        pdu.esm_class = EsmClass::forward();
        pdu.registered_delivery = RegisteredDelivery::receipt();
        pdu.validity_period = SmppDateTime::new("000001000000000R").unwrap();
        pdu.tlvs.push(Tlv::from_u16(tags::USER_MESSAGE_REFERENCE, 9));
        pdu.set_message(b"ping").unwrap();

        let bytes = pdu.to_bytes().unwrap();
        match Frame::decode(&bytes).unwrap() {
            Frame::SubmitSm(decoded) => {
                assert_eq!(decoded.user_message_reference(), Some(9));
                assert_eq!(*decoded, pdu);
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn overlong_destination_fails() {
        let mut pdu = sample(1);
        pdu.destination.addr = "1".repeat(21);
        assert!(matches!(
            pdu.to_bytes(),
            Err(CodecError::FieldTooLong { field: "destination_addr", .. })
        ));
    }

    #[test]
    fn response_roundtrip() {
        let resp = SubmitSmResponse {
            command_status: 0,
            sequence_number: 7,
            message_id: "abc123".into(),
        };
        let bytes = resp.to_bytes().unwrap();
        assert_eq!(Frame::decode(&bytes).unwrap(), Frame::SubmitSmResp(resp));
    }
}
