use crate::datatypes::CommandId;

header_only_pdu!(
    /// Ends the bound session; either party may send it.
    Unbind,
    CommandId::Unbind
);

header_only_pdu!(UnbindResponse, CommandId::UnbindResp);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Encodable, Frame};

    #[test]
    fn unbind_roundtrip() {
        let bytes = Unbind::new(4).to_bytes().unwrap();
        assert_eq!(Frame::decode(&bytes).unwrap(), Frame::Unbind(Unbind::new(4)));
    }

    #[test]
    fn padded_unbind_resp_is_accepted() {
        let mut bytes = UnbindResponse::new(4).to_bytes().unwrap().to_vec();
        bytes.extend_from_slice(&[0, 0]);
        bytes[0..4].copy_from_slice(&18u32.to_be_bytes());
        assert_eq!(
            Frame::decode(&bytes).unwrap(),
            Frame::UnbindResp(UnbindResponse::new(4))
        );
    }
}
