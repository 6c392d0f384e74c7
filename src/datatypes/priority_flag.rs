// ABOUTME: SMPP v3.4 priority_flag values for submit_sm and submit_multi
// ABOUTME: Levels 4-255 are reserved and rejected when options are built

use num_enum::TryFromPrimitive;

/// Message priority assigned by the originating ESME.
///
/// Networks map the level onto their own scheme: GSM treats anything above
/// zero as a priority message, ANSI-136 distinguishes bulk/normal/urgent/very
/// urgent, IS-95 normal/interactive/urgent/emergency.
#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PriorityFlag {
    /// Lowest priority, the SMSC default.
    Level0 = 0,
    Level1 = 1,
    Level2 = 2,
    /// Highest priority.
    Level3 = 3,
}

impl Default for PriorityFlag {
    fn default() -> Self {
        PriorityFlag::Level0
    }
}
