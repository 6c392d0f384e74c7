use crate::codec::{CodecError, Decodable, Encodable, PduHeader, decode_cstring, encode_cstring};
use crate::datatypes::CommandId;
use crate::datatypes::address::{Address, MAX_ADDR_LEN};
use crate::datatypes::submit_sm::{MAX_MESSAGE_ID_LEN, MAX_SERVICE_TYPE_LEN};
use bytes::BytesMut;
use std::io::Cursor;

/// Cancels a pending message. With an empty message_id the SMSC cancels
/// every message from `source` to `destination` instead.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CancelSm {
    pub sequence_number: u32,
    pub service_type: String,
    pub message_id: String,
    pub source: Address,
    pub destination: Address,
}

impl Encodable for CancelSm {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::new(CommandId::CancelSm, 0, self.sequence_number).encode(buf);
        encode_cstring(buf, &self.service_type, MAX_SERVICE_TYPE_LEN, "service_type")?;
        encode_cstring(buf, &self.message_id, MAX_MESSAGE_ID_LEN, "message_id")?;
        self.source.encode(buf, MAX_ADDR_LEN, "source_addr")?;
        self.destination.encode(buf, MAX_ADDR_LEN, "destination_addr")
    }
}

impl Decodable for CancelSm {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(CancelSm {
            sequence_number: header.sequence_number,
            service_type: decode_cstring(buf, MAX_SERVICE_TYPE_LEN, "service_type")?,
            message_id: decode_cstring(buf, MAX_MESSAGE_ID_LEN, "message_id")?,
            source: Address::decode(buf, MAX_ADDR_LEN, "source_addr")?,
            destination: Address::decode(buf, MAX_ADDR_LEN, "destination_addr")?,
        })
    }
}

header_only_pdu!(CancelSmResponse, CommandId::CancelSmResp);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frame;

    #[test]
    fn cancel_roundtrip() {
        let cancel = CancelSm {
            sequence_number: 3,
            service_type: String::new(),
            message_id: "ABC".into(),
            source: Address::default(),
            destination: Address::default(),
        };
        let bytes = cancel.to_bytes().unwrap();
        assert_eq!(bytes.len(), 16 + 1 + 4 + 3 + 3);
        assert_eq!(Frame::decode(&bytes).unwrap(), Frame::CancelSm(cancel));
    }
}
