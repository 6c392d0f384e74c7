// ABOUTME: deliver_sm / deliver_sm_resp: SMSC-originated messages and delivery receipts
// ABOUTME: Receipt detection reads esm_class, the receipt TLVs and the "id:... stat:..." text

use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, decode_cstring, decode_u8, encode_cstring,
};
use crate::datatypes::address::{Address, MAX_ADDR_LEN};
use crate::datatypes::submit_sm::{
    MAX_MESSAGE_ID_LEN, MAX_SERVICE_TYPE_LEN, decode_peer_time, decode_short_message,
    encode_short_message, encode_time, message_text, route_message,
};
use crate::datatypes::tlv::{Tlv, decode_tlvs, encode_tlvs, find_tlv, tags};
use crate::datatypes::{
    CommandId, EsmClass, MessageState, PriorityFlag, RegisteredDelivery, SmppDateTime,
};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

#[derive(Clone, Debug, PartialEq)]
pub struct DeliverSm {
    pub sequence_number: u32,
    pub service_type: String,
    pub source: Address,
    pub destination: Address,
    pub esm_class: EsmClass,
    pub protocol_id: u8,
    pub priority_flag: u8,
    pub schedule_delivery_time: SmppDateTime,
    pub validity_period: SmppDateTime,
    pub registered_delivery: RegisteredDelivery,
    pub replace_if_present_flag: u8,
    pub data_coding: u8,
    pub sm_default_msg_id: u8,
    pub short_message: Bytes,
    pub tlvs: Vec<Tlv>,
}

/// What a delivery receipt says about an earlier submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiptInfo {
    pub message_id: String,
    pub state: Option<MessageState>,
}

impl DeliverSm {
    pub fn new(sequence_number: u32, source: Address, destination: Address) -> Self {
        DeliverSm {
            sequence_number,
            service_type: String::new(),
            source,
            destination,
            esm_class: EsmClass::default(),
            protocol_id: 0,
            priority_flag: 0,
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

    pub fn set_message(&mut self, text: &[u8]) -> Result<(), CodecError> {
        self.short_message = route_message(text, &mut self.tlvs)?;
        Ok(())
    }

    pub fn message(&self) -> Bytes {
        message_text(&self.short_message, &self.tlvs)
    }

    pub fn priority(&self) -> Option<PriorityFlag> {
        PriorityFlag::try_from(self.priority_flag).ok()
    }

    pub fn is_receipt(&self) -> bool {
        self.esm_class.is_delivery_receipt()
            || find_tlv(&self.tlvs, tags::RECEIPTED_MESSAGE_ID).is_some()
    }

    /// Extract the receipted message id and final state.
    ///
    /// TLVs win over the text body; the text form is the de-facto
    /// `id:IIII sub:SSS dlvrd:DDD ... stat:DDDDDDD err:E text:...` layout.
    pub fn receipt(&self) -> Option<ReceiptInfo> {
        if !self.is_receipt() {
            return None;
        }

        let text = String::from_utf8_lossy(&self.message()).into_owned();
        let message_id = find_tlv(&self.tlvs, tags::RECEIPTED_MESSAGE_ID)
            .map(Tlv::as_text)
            .filter(|id| !id.is_empty())
            .or_else(|| receipt_field(&text, "id"))?;

        let state = find_tlv(&self.tlvs, tags::MESSAGE_STATE)
            .and_then(Tlv::as_u8)
            .and_then(|raw| MessageState::try_from(raw).ok())
            .or_else(|| receipt_field(&text, "stat").and_then(|s| MessageState::from_receipt_stat(&s)));

        Some(ReceiptInfo { message_id, state })
    }
}

/// Value of a `key:value` token in a receipt text. Keys are matched
/// case-insensitively; values end at the next space.
fn receipt_field(text: &str, key: &str) -> Option<String> {
    text.split_whitespace().find_map(|token| {
        let (k, v) = token.split_once(':')?;
        (k.eq_ignore_ascii_case(key) && !v.is_empty()).then(|| v.to_string())
    })
}

impl Encodable for DeliverSm {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::new(CommandId::DeliverSm, 0, self.sequence_number).encode(buf);
        encode_cstring(buf, &self.service_type, MAX_SERVICE_TYPE_LEN, "service_type")?;
        self.source.encode(buf, MAX_ADDR_LEN, "source_addr")?;
        self.destination.encode(buf, MAX_ADDR_LEN, "destination_addr")?;
        buf.put_u8(self.esm_class.to_byte());
        buf.put_u8(self.protocol_id);
        buf.put_u8(self.priority_flag);
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

impl Decodable for DeliverSm {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(DeliverSm {
            sequence_number: header.sequence_number,
            service_type: decode_cstring(buf, MAX_SERVICE_TYPE_LEN, "service_type")?,
            source: Address::decode(buf, MAX_ADDR_LEN, "source_addr")?,
            destination: Address::decode(buf, MAX_ADDR_LEN, "destination_addr")?,
            esm_class: EsmClass::new(decode_u8(buf)?),
            protocol_id: decode_u8(buf)?,
            priority_flag: decode_u8(buf)?,
            schedule_delivery_time: decode_peer_time(buf, "schedule_delivery_time")?,
            validity_period: decode_peer_time(buf, "validity_period")?,
            registered_delivery: RegisteredDelivery::new(decode_u8(buf)?),
            replace_if_present_flag: decode_u8(buf)?,
            data_coding: decode_u8(buf)?,
            sm_default_msg_id: decode_u8(buf)?,
            short_message: decode_short_message(buf)?,
            tlvs: decode_tlvs(buf)?,
        })
    }
}

/// Acknowledges a deliver_sm; message_id is unused and always empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliverSmResponse {
    pub command_status: u32,
    pub sequence_number: u32,
}

impl DeliverSmResponse {
    pub fn new(sequence_number: u32, command_status: u32) -> Self {
        DeliverSmResponse {
            command_status,
            sequence_number,
        }
    }
}

impl Encodable for DeliverSmResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::new(CommandId::DeliverSmResp, self.command_status, self.sequence_number)
            .encode(buf);
        buf.put_u8(0);
        Ok(())
    }
}

impl Decodable for DeliverSmResponse {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.has_remaining() {
            decode_cstring(buf, MAX_MESSAGE_ID_LEN, "message_id")?;
        }
        Ok(DeliverSmResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frame;
    use crate::datatypes::{NumericPlanIndicator, TypeOfNumber};

    fn deliver(seq: u32) -> DeliverSm {
        DeliverSm::new(
            seq,
            Address::new(TypeOfNumber::International, NumericPlanIndicator::Isdn, "447700900123"),
            Address::new(TypeOfNumber::Unknown, NumericPlanIndicator::Unknown, "GATEWAY"),
        )
    }

    #[test]
    fn plain_message_is_not_a_receipt() {
        let mut pdu = deliver(1);
        pdu.set_message(b"hi there").unwrap();
        assert!(!pdu.is_receipt());
        assert_eq!(pdu.receipt(), None);
    }

    #[test]
    fn receipt_from_tlvs() {
        let mut pdu = deliver(2);
        pdu.esm_class = EsmClass::new(EsmClass::SMSC_DELIVERY_RECEIPT);
        pdu.tlvs.push(Tlv::from_cstring(tags::RECEIPTED_MESSAGE_ID, "MSG42"));
        pdu.tlvs.push(Tlv::from_u8(tags::MESSAGE_STATE, MessageState::Delivered as u8));

        assert_eq!(
            pdu.receipt(),
            Some(ReceiptInfo {
                message_id: "MSG42".into(),
                state: Some(MessageState::Delivered)
            })
        );
    }

    #[test]
    fn receipt_from_text_body() {
        let mut pdu = deliver(3);
        pdu.esm_class = EsmClass::new(EsmClass::SMSC_DELIVERY_RECEIPT);
        pdu.set_message(
            b"id:0123456789 sub:001 dlvrd:001 submit date:2510191200 done date:2510191201 stat:UNDELIV err:001 text:hello",
        )
        .unwrap();

        let receipt = pdu.receipt().unwrap();
        assert_eq!(receipt.message_id, "0123456789");
        assert_eq!(receipt.state, Some(MessageState::Undeliverable));
    }

    #[test]
    fn receipted_id_tlv_alone_marks_receipt() {
        let mut pdu = deliver(4);
        pdu.tlvs.push(Tlv::from_cstring(tags::RECEIPTED_MESSAGE_ID, "A1"));
        let receipt = pdu.receipt().unwrap();
        assert_eq!(receipt.message_id, "A1");
        assert_eq!(receipt.state, None);
    }

    #[test]
    fn deliver_roundtrip() {
        let mut pdu = deliver(5);
        pdu.set_message(b"inbound").unwrap();
        let bytes = pdu.to_bytes().unwrap();
        assert_eq!(Frame::decode(&bytes).unwrap(), Frame::DeliverSm(Box::new(pdu)));
    }

    #[test]
    fn response_has_empty_message_id() {
        let bytes = DeliverSmResponse::new(77, 0).to_bytes().unwrap();
        assert_eq!(bytes.len(), 17);
        assert_eq!(&bytes[4..8], &0x8000_0005u32.to_be_bytes());
        assert_eq!(&bytes[12..16], &77u32.to_be_bytes());
        assert_eq!(bytes[16], 0);
    }
}
