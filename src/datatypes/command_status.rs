// ABOUTME: SMPP v3.4 command_status error codes carried in response headers
// ABOUTME: Raw values outside the table (vendor codes) stay as plain u32 on the wire

use num_enum::TryFromPrimitive;

/// Error codes returned by the SMSC in the command_status header field and in
/// the error_status_code of each unsuccessful submit_multi destination.
#[derive(TryFromPrimitive)]
#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandStatus {
    Ok = 0x0000_0000,
    InvalidMsgLength = 0x0000_0001,
    InvalidCommandLength = 0x0000_0002,
    InvalidCommandId = 0x0000_0003,
    IncorrectBindStatus = 0x0000_0004,
    AlreadyBound = 0x0000_0005,
    InvalidPriorityFlag = 0x0000_0006,
    InvalidRegisteredDeliveryFlag = 0x0000_0007,
    SystemError = 0x0000_0008,
    InvalidSourceAddress = 0x0000_000A,
    InvalidDestinationAddress = 0x0000_000B,
    InvalidMessageId = 0x0000_000C,
    BindFailed = 0x0000_000D,
    InvalidPassword = 0x0000_000E,
    InvalidSystemId = 0x0000_000F,
    CancelSmFailed = 0x0000_0011,
    ReplaceSmFailed = 0x0000_0013,
    MessageQueueFull = 0x0000_0014,
    InvalidServiceType = 0x0000_0015,
    InvalidNumberOfDestinations = 0x0000_0033,
    InvalidDistributionListName = 0x0000_0034,
    InvalidDestinationFlag = 0x0000_0040,
    InvalidSubmitWithReplace = 0x0000_0042,
    InvalidEsmClass = 0x0000_0043,
    CannotSubmitToDistributionList = 0x0000_0044,
    SubmitFailed = 0x0000_0045,
    InvalidSourceTon = 0x0000_0048,
    InvalidSourceNpi = 0x0000_0049,
    InvalidDestinationTon = 0x0000_0050,
    InvalidDestinationNpi = 0x0000_0051,
    InvalidSystemType = 0x0000_0053,
    InvalidReplaceIfPresentFlag = 0x0000_0054,
    InvalidNumberOfMessages = 0x0000_0055,
    Throttled = 0x0000_0058,
    InvalidScheduledDeliveryTime = 0x0000_0061,
    InvalidExpiryTime = 0x0000_0062,
    InvalidPredefinedMessageId = 0x0000_0063,
    ReceiverTemporaryAppError = 0x0000_0064,
    ReceiverPermanentAppError = 0x0000_0065,
    ReceiverRejectMessage = 0x0000_0066,
    QuerySmFailed = 0x0000_0067,
    ErrorInOptionalPart = 0x0000_00C0,
    OptionalParameterNotAllowed = 0x0000_00C1,
    InvalidParameterLength = 0x0000_00C2,
    MissingOptionalParameter = 0x0000_00C3,
    InvalidOptionalParameterValue = 0x0000_00C4,
    DeliveryFailed = 0x0000_00FE,
    UnknownError = 0x0000_00FF,
}

impl CommandStatus {
    pub fn is_ok(self) -> bool {
        self == CommandStatus::Ok
    }

    /// Short ESME_* mnemonic used in log lines.
    pub fn mnemonic(self) -> &'static str {
        match self {
            CommandStatus::Ok => "ESME_ROK",
            CommandStatus::InvalidMsgLength => "ESME_RINVMSGLEN",
            CommandStatus::InvalidCommandLength => "ESME_RINVCMDLEN",
            CommandStatus::InvalidCommandId => "ESME_RINVCMDID",
            CommandStatus::IncorrectBindStatus => "ESME_RINVBNDSTS",
            CommandStatus::AlreadyBound => "ESME_RALYBND",
            CommandStatus::InvalidPriorityFlag => "ESME_RINVPRTFLG",
            CommandStatus::InvalidRegisteredDeliveryFlag => "ESME_RINVREGDLVFLG",
            CommandStatus::SystemError => "ESME_RSYSERR",
            CommandStatus::InvalidSourceAddress => "ESME_RINVSRCADR",
            CommandStatus::InvalidDestinationAddress => "ESME_RINVDSTADR",
            CommandStatus::InvalidMessageId => "ESME_RINVMSGID",
            CommandStatus::BindFailed => "ESME_RBINDFAIL",
            CommandStatus::InvalidPassword => "ESME_RINVPASWD",
            CommandStatus::InvalidSystemId => "ESME_RINVSYSID",
            CommandStatus::CancelSmFailed => "ESME_RCANCELFAIL",
            CommandStatus::ReplaceSmFailed => "ESME_RREPLACEFAIL",
            CommandStatus::MessageQueueFull => "ESME_RMSGQFUL",
            CommandStatus::InvalidServiceType => "ESME_RINVSERTYP",
            CommandStatus::InvalidNumberOfDestinations => "ESME_RINVNUMDESTS",
            CommandStatus::InvalidDistributionListName => "ESME_RINVDLNAME",
            CommandStatus::InvalidDestinationFlag => "ESME_RINVDESTFLAG",
            CommandStatus::InvalidSubmitWithReplace => "ESME_RINVSUBREP",
            CommandStatus::InvalidEsmClass => "ESME_RINVESMCLASS",
            CommandStatus::CannotSubmitToDistributionList => "ESME_RCNTSUBDL",
            CommandStatus::SubmitFailed => "ESME_RSUBMITFAIL",
            CommandStatus::InvalidSourceTon => "ESME_RINVSRCTON",
            CommandStatus::InvalidSourceNpi => "ESME_RINVSRCNPI",
            CommandStatus::InvalidDestinationTon => "ESME_RINVDSTTON",
            CommandStatus::InvalidDestinationNpi => "ESME_RINVDSTNPI",
            CommandStatus::InvalidSystemType => "ESME_RINVSYSTYP",
            CommandStatus::InvalidReplaceIfPresentFlag => "ESME_RINVREPFLAG",
            CommandStatus::InvalidNumberOfMessages => "ESME_RINVNUMMSGS",
            CommandStatus::Throttled => "ESME_RTHROTTLED",
            CommandStatus::InvalidScheduledDeliveryTime => "ESME_RINVSCHED",
            CommandStatus::InvalidExpiryTime => "ESME_RINVEXPIRY",
            CommandStatus::InvalidPredefinedMessageId => "ESME_RINVDFTMSGID",
            CommandStatus::ReceiverTemporaryAppError => "ESME_RX_T_APPN",
            CommandStatus::ReceiverPermanentAppError => "ESME_RX_P_APPN",
            CommandStatus::ReceiverRejectMessage => "ESME_RX_R_APPN",
            CommandStatus::QuerySmFailed => "ESME_RQUERYFAIL",
            CommandStatus::ErrorInOptionalPart => "ESME_RINVOPTPARSTREAM",
            CommandStatus::OptionalParameterNotAllowed => "ESME_ROPTPARNOTALLWD",
            CommandStatus::InvalidParameterLength => "ESME_RINVPARLEN",
            CommandStatus::MissingOptionalParameter => "ESME_RMISSINGOPTPARAM",
            CommandStatus::InvalidOptionalParameterValue => "ESME_RINVOPTPARAMVAL",
            CommandStatus::DeliveryFailed => "ESME_RDELIVERYFAILURE",
            CommandStatus::UnknownError => "ESME_RUNKNOWNERR",
        }
    }
}

/// Renders a raw status for logs, falling back to hex for vendor codes.
pub fn describe_status(raw: u32) -> String {
    match CommandStatus::try_from(raw) {
        Ok(status) => format!("{} (0x{raw:08X})", status.mnemonic()),
        Err(_) => format!("0x{raw:08X}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_status_has_mnemonic() {
        assert_eq!(describe_status(3), "ESME_RINVCMDID (0x00000003)");
        assert!(CommandStatus::Ok.is_ok());
        assert!(!CommandStatus::Throttled.is_ok());
    }

    #[test]
    fn vendor_status_renders_as_hex() {
        assert_eq!(describe_status(0x0000_0401), "0x00000401");
    }
}
