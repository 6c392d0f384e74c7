// ABOUTME: esm_class bit field: messaging mode, message type and GSM feature bits
// ABOUTME: Used on submit to pick the mode and on deliver_sm to spot delivery receipts

use std::fmt;

/// The esm_class octet of submit_sm, submit_multi and deliver_sm.
///
/// Bits 1-0 select the messaging mode, bits 5-2 the message type and bits 7-6
/// the GSM network features (UDHI, reply path).
#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub struct EsmClass(u8);

impl EsmClass {
    pub const DEFAULT_MODE: u8 = 0x00;
    pub const DATAGRAM_MODE: u8 = 0x01;
    pub const FORWARD_MODE: u8 = 0x02;
    pub const STORE_AND_FORWARD_MODE: u8 = 0x03;

    /// deliver_sm carries an SMSC delivery receipt.
    pub const SMSC_DELIVERY_RECEIPT: u8 = 0x04;
    /// deliver_sm carries an SME delivery acknowledgement.
    pub const SME_DELIVERY_ACK: u8 = 0x08;
    pub const SME_MANUAL_ACK: u8 = 0x10;
    pub const INTERMEDIATE_NOTIFICATION: u8 = 0x20;

    pub const UDHI: u8 = 0x40;
    pub const REPLY_PATH: u8 = 0x80;

    const MODE_MASK: u8 = 0x03;
    const TYPE_MASK: u8 = 0x3C;

    pub const fn new(raw: u8) -> Self {
        EsmClass(raw)
    }

    pub fn datagram() -> Self {
        EsmClass(Self::DATAGRAM_MODE)
    }

    pub fn forward() -> Self {
        EsmClass(Self::FORWARD_MODE)
    }

    pub fn store_and_forward() -> Self {
        EsmClass(Self::STORE_AND_FORWARD_MODE)
    }

    pub fn with_udhi(self) -> Self {
        EsmClass(self.0 | Self::UDHI)
    }

    pub fn with_reply_path(self) -> Self {
        EsmClass(self.0 | Self::REPLY_PATH)
    }

    pub fn mode(self) -> u8 {
        self.0 & Self::MODE_MASK
    }

    pub fn message_type(self) -> u8 {
        self.0 & Self::TYPE_MASK
    }

    /// True when a deliver_sm with this class carries an SMSC delivery
    /// receipt. The message type is a field, not a set of flags: 0x18
    /// (conversation abort) shares a bit with 0x08 and is not a receipt.
    pub fn is_delivery_receipt(self) -> bool {
        self.message_type() == Self::SMSC_DELIVERY_RECEIPT
    }

    pub fn has_udhi(self) -> bool {
        self.0 & Self::UDHI != 0
    }

    pub fn has_reply_path(self) -> bool {
        self.0 & Self::REPLY_PATH != 0
    }

    pub fn to_byte(self) -> u8 {
        self.0
    }
}

impl From<u8> for EsmClass {
    fn from(value: u8) -> Self {
        EsmClass(value)
    }
}

impl From<EsmClass> for u8 {
    fn from(value: EsmClass) -> Self {
        value.0
    }
}

impl fmt::Debug for EsmClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EsmClass(0x{:02X})", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_bits_are_detected() {
        assert!(EsmClass::new(0x04).is_delivery_receipt());
        assert!(EsmClass::new(0x44).is_delivery_receipt());
        assert!(EsmClass::new(0x07).is_delivery_receipt());
        assert!(!EsmClass::new(0x00).is_delivery_receipt());
        assert!(!EsmClass::new(0x40).is_delivery_receipt());
        assert!(!EsmClass::new(0x08).is_delivery_receipt());
        assert!(!EsmClass::new(0x18).is_delivery_receipt());
        assert!(!EsmClass::new(EsmClass::INTERMEDIATE_NOTIFICATION).is_delivery_receipt());
    }

    #[test]
    fn feature_bits_compose() {
        let esm = EsmClass::forward().with_udhi().with_reply_path();
        assert_eq!(esm.to_byte(), 0xC2);
        assert_eq!(esm.mode(), EsmClass::FORWARD_MODE);
        assert!(esm.has_udhi());
        assert!(esm.has_reply_path());
    }
}
