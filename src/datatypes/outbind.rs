use crate::codec::{CodecError, Decodable, Encodable, PduHeader, decode_cstring, encode_cstring};
use crate::datatypes::CommandId;
use crate::datatypes::bind::{MAX_PASSWORD_LEN, MAX_SYSTEM_ID_LEN};
use bytes::BytesMut;
use std::io::Cursor;

/// SMSC request asking the ESME to bind as a receiver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outbind {
    pub sequence_number: u32,
    pub system_id: String,
    pub password: String,
}

impl Encodable for Outbind {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::new(CommandId::Outbind, 0, self.sequence_number).encode(buf);
        encode_cstring(buf, &self.system_id, MAX_SYSTEM_ID_LEN, "system_id")?;
        encode_cstring(buf, &self.password, MAX_PASSWORD_LEN, "password")
    }
}

impl Decodable for Outbind {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(Outbind {
            sequence_number: header.sequence_number,
            system_id: decode_cstring(buf, MAX_SYSTEM_ID_LEN, "system_id")?,
            password: decode_cstring(buf, MAX_PASSWORD_LEN, "password")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frame;

    #[test]
    fn outbind_roundtrip() {
        let outbind = Outbind {
            sequence_number: 1,
            system_id: "SMSC".into(),
            password: "secret".into(),
        };
        let bytes = outbind.to_bytes().unwrap();
        assert_eq!(Frame::decode(&bytes).unwrap(), Frame::Outbind(outbind));
    }
}
