use num_enum::TryFromPrimitive;

/// Mask set on every response command id.
pub const RESPONSE_BIT: u32 = 0x8000_0000;

/// SMPP v3.4 command identifiers handled by the gateway.
#[derive(TryFromPrimitive)]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CommandId {
    GenericNack = 0x8000_0000,
    BindReceiver = 0x0000_0001,
    BindReceiverResp = 0x8000_0001,
    BindTransmitter = 0x0000_0002,
    BindTransmitterResp = 0x8000_0002,
    QuerySm = 0x0000_0003,
    QuerySmResp = 0x8000_0003,
    SubmitSm = 0x0000_0004,
    SubmitSmResp = 0x8000_0004,
    DeliverSm = 0x0000_0005,
    DeliverSmResp = 0x8000_0005,
    Unbind = 0x0000_0006,
    UnbindResp = 0x8000_0006,
    ReplaceSm = 0x0000_0007,
    ReplaceSmResp = 0x8000_0007,
    CancelSm = 0x0000_0008,
    CancelSmResp = 0x8000_0008,
    BindTransceiver = 0x0000_0009,
    BindTransceiverResp = 0x8000_0009,
    Outbind = 0x0000_000B,
    EnquireLink = 0x0000_0015,
    EnquireLinkResp = 0x8000_0015,
    SubmitMulti = 0x0000_0021,
    SubmitMultiResp = 0x8000_0021,
}

impl CommandId {
    pub fn is_response(self) -> bool {
        (self as u32) & RESPONSE_BIT != 0
    }

    /// The response id paired with a request id. Responses map to themselves.
    pub fn response(self) -> CommandId {
        CommandId::try_from((self as u32) | RESPONSE_BIT).unwrap_or(CommandId::GenericNack)
    }
}

/// True when a raw command id has the response bit set.
pub fn is_response_id(raw: u32) -> bool {
    raw & RESPONSE_BIT != 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_ids_carry_high_bit() {
        assert!(CommandId::SubmitSmResp.is_response());
        assert!(CommandId::GenericNack.is_response());
        assert!(!CommandId::EnquireLink.is_response());
        assert!(is_response_id(0x8000_0004));
        assert!(!is_response_id(0x0000_0004));
    }

    #[test]
    fn request_maps_to_its_response() {
        assert_eq!(CommandId::SubmitSm.response(), CommandId::SubmitSmResp);
        assert_eq!(CommandId::BindTransceiver.response(), CommandId::BindTransceiverResp);
        assert_eq!(CommandId::EnquireLinkResp.response(), CommandId::EnquireLinkResp);
        // outbind has no response; generic_nack is the only answer
        assert_eq!(CommandId::Outbind.response(), CommandId::GenericNack);
    }

    #[test]
    fn unknown_id_is_rejected() {
        assert!(CommandId::try_from(0x0000_0103u32).is_err());
        assert_eq!(CommandId::try_from(0x0000_0021u32).ok(), Some(CommandId::SubmitMulti));
    }
}
