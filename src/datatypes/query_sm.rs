use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, decode_cstring, decode_u8, encode_cstring,
};
use crate::datatypes::address::{Address, MAX_ADDR_LEN};
use crate::datatypes::submit_sm::{MAX_MESSAGE_ID_LEN, decode_peer_time, encode_time};
use crate::datatypes::{CommandId, MessageState, SmppDateTime};
use bytes::{Buf, BufMut, BytesMut};
use std::io::Cursor;

/// Asks the SMSC for the current state of a previously submitted message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuerySm {
    pub sequence_number: u32,
    pub message_id: String,
    /// Must match the source address used on submission.
    pub source: Address,
}

impl Encodable for QuerySm {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::new(CommandId::QuerySm, 0, self.sequence_number).encode(buf);
        encode_cstring(buf, &self.message_id, MAX_MESSAGE_ID_LEN, "message_id")?;
        self.source.encode(buf, MAX_ADDR_LEN, "source_addr")
    }
}

impl Decodable for QuerySm {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(QuerySm {
            sequence_number: header.sequence_number,
            message_id: decode_cstring(buf, MAX_MESSAGE_ID_LEN, "message_id")?,
            source: Address::decode(buf, MAX_ADDR_LEN, "source_addr")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuerySmResponse {
    pub command_status: u32,
    pub sequence_number: u32,
    pub message_id: String,
    /// Empty while the message has not reached a final state.
    pub final_date: SmppDateTime,
    pub message_state: u8,
    /// Network specific error code.
    pub error_code: u8,
}

impl QuerySmResponse {
    pub fn state(&self) -> Option<MessageState> {
        MessageState::try_from(self.message_state).ok()
    }
}

impl Encodable for QuerySmResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::new(CommandId::QuerySmResp, self.command_status, self.sequence_number)
            .encode(buf);
        encode_cstring(buf, &self.message_id, MAX_MESSAGE_ID_LEN, "message_id")?;
        encode_time(buf, &self.final_date, "final_date")?;
        buf.put_u8(self.message_state);
        buf.put_u8(self.error_code);
        Ok(())
    }
}

impl Decodable for QuerySmResponse {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if !buf.has_remaining() {
            return Ok(QuerySmResponse {
                command_status: header.command_status,
                sequence_number: header.sequence_number,
                message_id: String::new(),
                final_date: SmppDateTime::immediate(),
                message_state: 0,
                error_code: 0,
            });
        }
        Ok(QuerySmResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            message_id: decode_cstring(buf, MAX_MESSAGE_ID_LEN, "message_id")?,
            final_date: decode_peer_time(buf, "final_date")?,
            message_state: decode_u8(buf)?,
            error_code: decode_u8(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Frame, encode_header};

    #[test]
    fn query_roundtrip() {
        let query = QuerySm {
            sequence_number: 11,
            message_id: "MSG-1".into(),
            source: Address::default(),
        };
        let bytes = query.to_bytes().unwrap();
        assert_eq!(&bytes[16..], b"MSG-1\0\x00\x00\0");
        assert_eq!(Frame::decode(&bytes).unwrap(), Frame::QuerySm(query));
    }

    #[test]
    fn response_exposes_state() {
        let resp = QuerySmResponse {
            command_status: 0,
            sequence_number: 11,
            message_id: "MSG-1".into(),
            final_date: SmppDateTime::new("251019120000000+").unwrap(),
            message_state: MessageState::Delivered as u8,
            error_code: 0,
        };
        let bytes = resp.to_bytes().unwrap();
        match Frame::decode(&bytes).unwrap() {
            Frame::QuerySmResp(decoded) => {
                assert_eq!(decoded.state(), Some(MessageState::Delivered));
                assert_eq!(decoded, resp);
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn odd_final_date_still_yields_the_state() {
        let body = b"MSG-1\0yesterday\0\x02\x00";
        let mut raw = encode_header(CommandId::QuerySmResp, 0, 12, body.len()).to_vec();
        raw.extend_from_slice(body);

        match Frame::decode(&raw).unwrap() {
            Frame::QuerySmResp(decoded) => {
                assert_eq!(decoded.final_date.as_str(), "yesterday");
                assert_eq!(decoded.state(), Some(MessageState::Delivered));
                assert!(matches!(
                    decoded.to_bytes(),
                    Err(CodecError::FieldValidation { field: "final_date", .. })
                ));
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }
}
