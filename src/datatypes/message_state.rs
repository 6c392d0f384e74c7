// ABOUTME: Message delivery states reported by query_sm_resp and delivery receipts
// ABOUTME: Also parses the textual "stat:" abbreviations SMSCs put in receipt bodies

use num_enum::TryFromPrimitive;

#[derive(TryFromPrimitive)]
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageState {
    Enroute = 1,
    Delivered = 2,
    Expired = 3,
    Deleted = 4,
    Undeliverable = 5,
    Accepted = 6,
    Unknown = 7,
    Rejected = 8,
}

impl MessageState {
    /// A final state ends tracking of the submitted message.
    pub fn is_terminal(self) -> bool {
        !matches!(self, MessageState::Enroute | MessageState::Accepted)
    }

    /// Maps the receipt text abbreviation (`stat:DELIVRD`) to a state.
    pub fn from_receipt_stat(stat: &str) -> Option<Self> {
        let state = match stat.trim().to_ascii_uppercase().as_str() {
            "ENROUTE" => MessageState::Enroute,
            "DELIVRD" | "DELIVERED" => MessageState::Delivered,
            "EXPIRED" => MessageState::Expired,
            "DELETED" => MessageState::Deleted,
            "UNDELIV" | "UNDELIVERABLE" => MessageState::Undeliverable,
            "ACCEPTD" | "ACCEPTED" => MessageState::Accepted,
            "UNKNOWN" => MessageState::Unknown,
            "REJECTD" | "REJECTED" => MessageState::Rejected,
            _ => return None,
        };
        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(MessageState::Delivered.is_terminal());
        assert!(MessageState::Rejected.is_terminal());
        assert!(MessageState::Unknown.is_terminal());
        assert!(!MessageState::Enroute.is_terminal());
        assert!(!MessageState::Accepted.is_terminal());
    }

    #[test]
    fn receipt_abbreviations() {
        assert_eq!(MessageState::from_receipt_stat("DELIVRD"), Some(MessageState::Delivered));
        assert_eq!(MessageState::from_receipt_stat("undeliv"), Some(MessageState::Undeliverable));
        assert_eq!(MessageState::from_receipt_stat("BOGUS"), None);
    }
}
