// ABOUTME: Optional parameters (tag, length, value) trailing the mandatory PDU fields
// ABOUTME: Walks are bounded by the bytes actually received for the frame

use crate::codec::{CodecError, decode_u16};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

/// Well-known optional parameter tags used by the gateway.
pub mod tags {
    pub const RECEIPTED_MESSAGE_ID: u16 = 0x001E;
    pub const USER_MESSAGE_REFERENCE: u16 = 0x0204;
    pub const SC_INTERFACE_VERSION: u16 = 0x0210;
    pub const NETWORK_ERROR_CODE: u16 = 0x0423;
    pub const MESSAGE_PAYLOAD: u16 = 0x0424;
    pub const MESSAGE_STATE: u16 = 0x0427;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tlv {
    /// The Tag field is used to uniquely identify the particular optional parameter in question.
    pub tag: u16,

    /// The Value field; its length is written as the TLV length.
    pub value: Bytes,
}

impl Tlv {
    pub fn new(tag: u16, value: impl Into<Bytes>) -> Self {
        Tlv {
            tag,
            value: value.into(),
        }
    }

    pub fn from_u8(tag: u16, value: u8) -> Self {
        Tlv::new(tag, vec![value])
    }

    pub fn from_u16(tag: u16, value: u16) -> Self {
        Tlv::new(tag, value.to_be_bytes().to_vec())
    }

    /// A C-octet string value, NUL included.
    pub fn from_cstring(tag: u16, value: &str) -> Self {
        let mut bytes = Vec::with_capacity(value.len() + 1);
        bytes.extend_from_slice(value.as_bytes());
        bytes.push(0);
        Tlv::new(tag, bytes)
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self.value.as_ref() {
            [v] => Some(*v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self.value.as_ref() {
            [hi, lo] => Some(u16::from_be_bytes([*hi, *lo])),
            _ => None,
        }
    }

    /// Value read as text up to the first NUL; SMSCs disagree on whether
    /// string TLVs carry the terminator.
    pub fn as_text(&self) -> String {
        let end = self
            .value
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(self.value.len());
        String::from_utf8_lossy(&self.value[..end]).into_owned()
    }

    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        let length = u16::try_from(self.value.len()).map_err(|_| {
            CodecError::TlvError(format!(
                "tag {:#06x} value of {} bytes exceeds 65535",
                self.tag,
                self.value.len()
            ))
        })?;
        buf.put_u16(self.tag);
        buf.put_u16(length);
        buf.put_slice(&self.value);
        Ok(())
    }

    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let tag = decode_u16(buf)?;
        let length = decode_u16(buf)? as usize;
        if buf.remaining() < length {
            return Err(CodecError::TlvError(format!(
                "tag {tag:#06x} declares {length} bytes, {} remain",
                buf.remaining()
            )));
        }
        let value = buf.copy_to_bytes(length);
        Ok(Tlv { tag, value })
    }
}

/// Decode every TLV up to the end of the received frame.
pub fn decode_tlvs(buf: &mut Cursor<&[u8]>) -> Result<Vec<Tlv>, CodecError> {
    let mut tlvs = Vec::new();
    while buf.has_remaining() {
        if buf.remaining() < 4 {
            return Err(CodecError::TlvError(format!(
                "{} trailing bytes cannot hold a TLV header",
                buf.remaining()
            )));
        }
        tlvs.push(Tlv::decode(buf)?);
    }
    Ok(tlvs)
}

pub fn encode_tlvs(buf: &mut BytesMut, tlvs: &[Tlv]) -> Result<(), CodecError> {
    for tlv in tlvs {
        tlv.encode(buf)?;
    }
    Ok(())
}

pub fn find_tlv(tlvs: &[Tlv], tag: u16) -> Option<&Tlv> {
    tlvs.iter().find(|tlv| tlv.tag == tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tlv_wire_layout() {
        let mut buf = BytesMut::new();
        Tlv::from_u16(tags::USER_MESSAGE_REFERENCE, 0x0102)
            .encode(&mut buf)
            .unwrap();
        assert_eq!(&buf[..], &[0x02, 0x04, 0x00, 0x02, 0x01, 0x02]);
    }

    #[test]
    fn walk_stops_at_received_bytes() {
        let mut buf = BytesMut::new();
        Tlv::from_u8(tags::MESSAGE_STATE, 2).encode(&mut buf).unwrap();
        // second TLV claims 200 bytes but only 3 arrived
        buf.put_u16(tags::MESSAGE_PAYLOAD);
        buf.put_u16(200);
        buf.put_slice(b"abc");

        let mut cursor = Cursor::new(&buf[..]);
        assert!(matches!(decode_tlvs(&mut cursor), Err(CodecError::TlvError(_))));
    }

    #[test]
    fn trailing_garbage_is_an_error() {
        let data = [0x04, 0x27, 0x00];
        let mut cursor = Cursor::new(&data[..]);
        assert!(decode_tlvs(&mut cursor).is_err());
    }

    #[test]
    fn string_values_with_or_without_nul() {
        assert_eq!(Tlv::from_cstring(tags::RECEIPTED_MESSAGE_ID, "ab12").as_text(), "ab12");
        assert_eq!(Tlv::new(tags::RECEIPTED_MESSAGE_ID, &b"ab12"[..]).as_text(), "ab12");
    }

    #[test]
    fn find_by_tag() {
        let tlvs = vec![
            Tlv::from_u8(tags::MESSAGE_STATE, 5),
            Tlv::from_cstring(tags::RECEIPTED_MESSAGE_ID, "x"),
        ];
        assert_eq!(find_tlv(&tlvs, tags::MESSAGE_STATE).and_then(Tlv::as_u8), Some(5));
        assert!(find_tlv(&tlvs, tags::MESSAGE_PAYLOAD).is_none());
    }
}
