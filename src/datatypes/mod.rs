mod address;
mod bind;
mod cancel_sm;
mod command_id;
mod command_status;
mod datetime;
mod deliver_sm;
mod enquire_link;
mod esm_class;
mod generic_nack;
mod interface_version;
mod message_state;
mod numeric_plan_indicator;
mod outbind;
mod priority_flag;
mod query_sm;
mod registered_delivery;
mod replace_sm;
mod submit_multi;
mod submit_sm;
pub mod tlv;
mod type_of_number;
mod unbind;

pub use address::{Address, MAX_ADDR_LEN};
pub use bind::{
    BindMode, BindRequest, BindResponse, MAX_ADDRESS_RANGE_LEN, MAX_PASSWORD_LEN,
    MAX_SYSTEM_ID_LEN, MAX_SYSTEM_TYPE_LEN,
};
pub use cancel_sm::{CancelSm, CancelSmResponse};
pub use command_id::{CommandId, RESPONSE_BIT, is_response_id};
pub use command_status::{CommandStatus, describe_status};
pub use datetime::{DateTimeError, SmppDateTime};
pub use deliver_sm::{DeliverSm, DeliverSmResponse, ReceiptInfo};
pub use enquire_link::{EnquireLink, EnquireLinkResponse};
pub use esm_class::EsmClass;
pub use generic_nack::GenericNack;
pub use interface_version::InterfaceVersion;
pub use message_state::MessageState;
pub use numeric_plan_indicator::NumericPlanIndicator;
pub use outbind::Outbind;
pub use priority_flag::PriorityFlag;
pub use query_sm::{QuerySm, QuerySmResponse};
pub use registered_delivery::RegisteredDelivery;
pub use replace_sm::{ReplaceSm, ReplaceSmResponse};
pub use submit_multi::{
    Destination, MAX_DESTINATIONS, SubmitMulti, SubmitMultiResponse, UnsuccessfulDelivery,
};
pub use submit_sm::{
    MAX_MESSAGE_ID_LEN, MAX_MESSAGE_PAYLOAD_LEN, MAX_SERVICE_TYPE_LEN, MAX_SHORT_MESSAGE_LEN,
    SubmitSm, SubmitSmResponse,
};
pub use tlv::Tlv;
pub use type_of_number::TypeOfNumber;
pub use unbind::{Unbind, UnbindResponse};
