use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, decode_cstring, decode_u8, encode_cstring,
};
use crate::datatypes::address::{Address, MAX_ADDR_LEN};
use crate::datatypes::submit_sm::{
    MAX_MESSAGE_ID_LEN, decode_short_message, decode_time, encode_short_message, encode_time,
};
use crate::datatypes::{CommandId, RegisteredDelivery, SmppDateTime};
use bytes::{BufMut, Bytes, BytesMut};
use std::io::Cursor;

/// Replaces the text (and optionally timing) of a message still held by the
/// SMSC. v3.4 allows no message_payload here, so the text is capped at 254.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplaceSm {
    pub sequence_number: u32,
    pub message_id: String,
    pub source: Address,
    pub schedule_delivery_time: SmppDateTime,
    pub validity_period: SmppDateTime,
    pub registered_delivery: RegisteredDelivery,
    pub sm_default_msg_id: u8,
    pub short_message: Bytes,
}

impl Encodable for ReplaceSm {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::new(CommandId::ReplaceSm, 0, self.sequence_number).encode(buf);
        encode_cstring(buf, &self.message_id, MAX_MESSAGE_ID_LEN, "message_id")?;
        self.source.encode(buf, MAX_ADDR_LEN, "source_addr")?;
        encode_time(buf, &self.schedule_delivery_time, "schedule_delivery_time")?;
        encode_time(buf, &self.validity_period, "validity_period")?;
        buf.put_u8(self.registered_delivery.to_byte());
        buf.put_u8(self.sm_default_msg_id);
        encode_short_message(buf, &self.short_message)
    }
}

impl Decodable for ReplaceSm {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(ReplaceSm {
            sequence_number: header.sequence_number,
            message_id: decode_cstring(buf, MAX_MESSAGE_ID_LEN, "message_id")?,
            source: Address::decode(buf, MAX_ADDR_LEN, "source_addr")?,
            schedule_delivery_time: decode_time(buf, "schedule_delivery_time")?,
            validity_period: decode_time(buf, "validity_period")?,
            registered_delivery: RegisteredDelivery::new(decode_u8(buf)?),
            sm_default_msg_id: decode_u8(buf)?,
            short_message: decode_short_message(buf)?,
        })
    }
}

header_only_pdu!(ReplaceSmResponse, CommandId::ReplaceSmResp);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frame;

    fn replace(text: &[u8]) -> ReplaceSm {
        ReplaceSm {
            sequence_number: 8,
            message_id: "M-8".into(),
            source: Address::default(),
            schedule_delivery_time: SmppDateTime::immediate(),
            validity_period: SmppDateTime::immediate(),
            registered_delivery: RegisteredDelivery::receipt(),
            sm_default_msg_id: 0,
            short_message: Bytes::copy_from_slice(text),
        }
    }

    #[test]
    fn replace_roundtrip() {
        let pdu = replace(b"corrected text");
        let bytes = pdu.to_bytes().unwrap();
        assert_eq!(Frame::decode(&bytes).unwrap(), Frame::ReplaceSm(Box::new(pdu)));
    }

    #[test]
    fn replace_text_is_capped() {
        let pdu = replace(&[b'z'; 255]);
        assert!(matches!(
            pdu.to_bytes(),
            Err(CodecError::FieldTooLong { field: "short_message", .. })
        ));
    }
}
