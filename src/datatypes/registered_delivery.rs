// ABOUTME: registered_delivery flags requesting SMSC receipts and SME acknowledgements

/// The registered_delivery octet of submit_sm, submit_multi and replace_sm.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct RegisteredDelivery(u8);

impl RegisteredDelivery {
    pub const NONE: u8 = 0x00;
    /// Receipt on final outcome, success or failure.
    pub const SMSC_RECEIPT: u8 = 0x01;
    /// Receipt only when delivery fails.
    pub const SMSC_RECEIPT_ON_FAILURE: u8 = 0x02;
    pub const SME_DELIVERY_ACK: u8 = 0x04;
    pub const SME_MANUAL_ACK: u8 = 0x08;
    pub const INTERMEDIATE_NOTIFICATION: u8 = 0x10;

    pub const fn new(raw: u8) -> Self {
        RegisteredDelivery(raw)
    }

    pub fn receipt() -> Self {
        RegisteredDelivery(Self::SMSC_RECEIPT)
    }

    pub fn wants_receipt(self) -> bool {
        self.0 & 0x03 != 0
    }

    pub fn to_byte(self) -> u8 {
        self.0
    }
}

impl From<u8> for RegisteredDelivery {
    fn from(value: u8) -> Self {
        RegisteredDelivery(value)
    }
}
