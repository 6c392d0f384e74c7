use crate::datatypes::CommandId;

header_only_pdu!(
    /// Link check request, sent by either side of a bound session.
    EnquireLink,
    CommandId::EnquireLink
);

header_only_pdu!(
    /// Answer to an enquire_link; echoes the request's sequence number.
    EnquireLinkResponse,
    CommandId::EnquireLinkResp
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Encodable, Frame};

    #[test]
    fn enquire_link_is_bare_header() {
        let bytes = EnquireLink::new(12).to_bytes().unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[0..4], &16u32.to_be_bytes());
        assert_eq!(&bytes[4..8], &0x0000_0015u32.to_be_bytes());
        assert_eq!(&bytes[12..16], &12u32.to_be_bytes());
    }

    #[test]
    fn response_decodes_with_echoed_sequence() {
        let bytes = EnquireLinkResponse::new(0xFFFF_FFFF).to_bytes().unwrap();
        match Frame::decode(&bytes).unwrap() {
            Frame::EnquireLinkResp(resp) => assert_eq!(resp.sequence_number, 0xFFFF_FFFF),
            other => panic!("unexpected frame {other:?}"),
        }
    }
}
