use crate::datatypes::CommandId;

header_only_pdu!(
    /// Negative acknowledgement for a PDU that could not be processed at all,
    /// typically an unknown command id or a corrupt body.
    GenericNack,
    CommandId::GenericNack
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Encodable, Frame};
    use crate::datatypes::CommandStatus;

    #[test]
    fn nack_carries_status_and_sequence() {
        let nack = GenericNack::with_status(31, CommandStatus::InvalidCommandId as u32);
        let bytes = nack.to_bytes().unwrap();
        assert_eq!(&bytes[4..8], &0x8000_0000u32.to_be_bytes());
        assert_eq!(&bytes[8..12], &3u32.to_be_bytes());
        assert_eq!(Frame::decode(&bytes).unwrap(), Frame::GenericNack(nack));
    }
}
