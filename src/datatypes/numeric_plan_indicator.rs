use num_enum::TryFromPrimitive;

/// Numbering Plan Indicator for source and destination addresses.
#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NumericPlanIndicator {
    Unknown = 0x00,
    Isdn = 0x01,
    Data = 0x03,
    Telex = 0x04,
    LandMobile = 0x06,
    National = 0x08,
    Private = 0x09,
    Ermes = 0x0A,
    Internet = 0x0E,
    WapClientId = 0x12,
}

impl NumericPlanIndicator {
    pub fn from_wire(raw: u8) -> Self {
        Self::try_from(raw).unwrap_or(Self::Unknown)
    }
}

impl Default for NumericPlanIndicator {
    fn default() -> Self {
        NumericPlanIndicator::Unknown
    }
}
