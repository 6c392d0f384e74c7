// ABOUTME: Bind credentials and the immutable per-message option profile (SmppOptions)
// ABOUTME: SmppOptions is built once, validated, and shared by reference across submissions

use crate::client::error::{SmppError, SmppResult};
use crate::codec::check_cstring;
use crate::datatypes::{
    Address, EsmClass, InterfaceVersion, MAX_ADDR_LEN, MAX_ADDRESS_RANGE_LEN, MAX_PASSWORD_LEN,
    MAX_SERVICE_TYPE_LEN, MAX_SYSTEM_ID_LEN, MAX_SYSTEM_TYPE_LEN, NumericPlanIndicator,
    PriorityFlag, RegisteredDelivery, SmppDateTime, TypeOfNumber,
};

/// SMPP bind operation credentials
///
/// Contains the authentication fields carried by every bind PDU. The bind
/// mode itself is chosen per call, so one set of credentials serves the
/// transceiver bind and the transmitter fallback alike.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindCredentials {
    /// System identifier for authentication (max 15 characters)
    pub system_id: String,
    /// Password for authentication (max 8 characters)
    pub password: String,
    /// System type, usually empty
    pub system_type: String,
    /// SMPP interface version to announce
    pub interface_version: InterfaceVersion,
    pub addr_ton: TypeOfNumber,
    pub addr_npi: NumericPlanIndicator,
    /// Address range served when bound as receiver
    pub address_range: String,
}

impl BindCredentials {
    pub fn new(system_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
            password: password.into(),
            system_type: String::new(),
            interface_version: InterfaceVersion::SmppV34,
            addr_ton: TypeOfNumber::Unknown,
            addr_npi: NumericPlanIndicator::Unknown,
            address_range: String::new(),
        }
    }

    /// Set system type
    pub fn with_system_type(mut self, system_type: impl Into<String>) -> Self {
        self.system_type = system_type.into();
        self
    }

    /// Set SMPP interface version
    pub fn with_version(mut self, interface_version: InterfaceVersion) -> Self {
        self.interface_version = interface_version;
        self
    }

    pub fn with_address_range(
        mut self,
        ton: TypeOfNumber,
        npi: NumericPlanIndicator,
        range: impl Into<String>,
    ) -> Self {
        self.addr_ton = ton;
        self.addr_npi = npi;
        self.address_range = range.into();
        self
    }

    /// Check the protocol field limits before anything is sent.
    pub fn validate(&self) -> SmppResult<()> {
        check_cstring(&self.system_id, MAX_SYSTEM_ID_LEN, "system_id")?;
        check_cstring(&self.password, MAX_PASSWORD_LEN, "password")?;
        check_cstring(&self.system_type, MAX_SYSTEM_TYPE_LEN, "system_type")?;
        check_cstring(&self.address_range, MAX_ADDRESS_RANGE_LEN, "address_range")?;
        Ok(())
    }
}

/// Mandatory-parameter profile applied to submit_sm, submit_multi, query_sm,
/// cancel_sm and replace_sm.
///
/// Values are fixed once built. Share one instance behind an `Arc` instead of
/// copying it into every request.
#[derive(Debug, Clone, PartialEq)]
pub struct SmppOptions {
    interface_version: InterfaceVersion,
    service_type: String,
    source_ton: TypeOfNumber,
    source_npi: NumericPlanIndicator,
    dest_ton: TypeOfNumber,
    dest_npi: NumericPlanIndicator,
    esm_class: EsmClass,
    protocol_id: u8,
    priority: PriorityFlag,
    schedule_delivery_time: SmppDateTime,
    validity_period: SmppDateTime,
    registered_delivery: RegisteredDelivery,
    replace_if_present: bool,
    data_coding: u8,
    canned_message_id: u8,
    source_addr: String,
}

impl Default for SmppOptions {
    fn default() -> Self {
        Self {
            interface_version: InterfaceVersion::SmppV34,
            service_type: String::new(),
            source_ton: TypeOfNumber::Unknown,
            source_npi: NumericPlanIndicator::Unknown,
            dest_ton: TypeOfNumber::International,
            dest_npi: NumericPlanIndicator::Isdn,
            esm_class: EsmClass::default(),
            protocol_id: 0,
            priority: PriorityFlag::Level0,
            schedule_delivery_time: SmppDateTime::immediate(),
            validity_period: SmppDateTime::immediate(),
            registered_delivery: RegisteredDelivery::receipt(),
            replace_if_present: false,
            data_coding: 0,
            canned_message_id: 0,
            source_addr: String::new(),
        }
    }
}

impl SmppOptions {
    pub fn builder() -> SmppOptionsBuilder {
        SmppOptionsBuilder::default()
    }

    /// Start a builder from these values, for deriving a variant profile.
    pub fn to_builder(&self) -> SmppOptionsBuilder {
        SmppOptionsBuilder {
            options: self.clone(),
            priority: self.priority as u8,
            schedule_delivery_time: self.schedule_delivery_time.as_str().to_string(),
            validity_period: self.validity_period.as_str().to_string(),
        }
    }

    pub fn interface_version(&self) -> InterfaceVersion {
        self.interface_version
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn esm_class(&self) -> EsmClass {
        self.esm_class
    }

    pub fn protocol_id(&self) -> u8 {
        self.protocol_id
    }

    pub fn priority(&self) -> PriorityFlag {
        self.priority
    }

    pub fn schedule_delivery_time(&self) -> &SmppDateTime {
        &self.schedule_delivery_time
    }

    pub fn validity_period(&self) -> &SmppDateTime {
        &self.validity_period
    }

    pub fn registered_delivery(&self) -> RegisteredDelivery {
        self.registered_delivery
    }

    pub fn replace_if_present(&self) -> bool {
        self.replace_if_present
    }

    pub fn data_coding(&self) -> u8 {
        self.data_coding
    }

    /// sm_default_msg_id: index of a pre-defined message held by the SMSC.
    pub fn canned_message_id(&self) -> u8 {
        self.canned_message_id
    }

    /// Originating address, falling back to `override_addr` when given.
    pub fn source(&self, override_addr: Option<&str>) -> Address {
        Address::new(
            self.source_ton,
            self.source_npi,
            override_addr.unwrap_or(&self.source_addr),
        )
    }

    pub fn destination(&self, addr: &str) -> Address {
        Address::new(self.dest_ton, self.dest_npi, addr)
    }
}

/// Builder for [`SmppOptions`]; `build` enforces the protocol ranges.
#[derive(Debug, Clone)]
pub struct SmppOptionsBuilder {
    options: SmppOptions,
    priority: u8,
    schedule_delivery_time: String,
    validity_period: String,
}

impl Default for SmppOptionsBuilder {
    fn default() -> Self {
        SmppOptions::default().to_builder()
    }
}

impl SmppOptionsBuilder {
    pub fn interface_version(mut self, version: InterfaceVersion) -> Self {
        self.options.interface_version = version;
        self
    }

    pub fn service_type(mut self, service_type: impl Into<String>) -> Self {
        self.options.service_type = service_type.into();
        self
    }

    /// Set source address numbering
    pub fn source_numbering(mut self, ton: TypeOfNumber, npi: NumericPlanIndicator) -> Self {
        self.options.source_ton = ton;
        self.options.source_npi = npi;
        self
    }

    /// Set destination address numbering
    pub fn dest_numbering(mut self, ton: TypeOfNumber, npi: NumericPlanIndicator) -> Self {
        self.options.dest_ton = ton;
        self.options.dest_npi = npi;
        self
    }

    pub fn source_addr(mut self, addr: impl Into<String>) -> Self {
        self.options.source_addr = addr.into();
        self
    }

    pub fn esm_class(mut self, esm_class: EsmClass) -> Self {
        self.options.esm_class = esm_class;
        self
    }

    pub fn protocol_id(mut self, protocol_id: u8) -> Self {
        self.options.protocol_id = protocol_id;
        self
    }

    /// Raw priority level; 4 and above are reserved and fail `build`.
    pub fn priority(mut self, level: u8) -> Self {
        self.priority = level;
        self
    }

    /// Absolute or relative SMPP time; empty means immediate.
    pub fn schedule_delivery_time(mut self, time: impl Into<String>) -> Self {
        self.schedule_delivery_time = time.into();
        self
    }

    /// Absolute or relative SMPP time; empty means the SMSC default.
    pub fn validity_period(mut self, time: impl Into<String>) -> Self {
        self.validity_period = time.into();
        self
    }

    pub fn registered_delivery(mut self, registered_delivery: RegisteredDelivery) -> Self {
        self.options.registered_delivery = registered_delivery;
        self
    }

    pub fn replace_if_present(mut self, replace: bool) -> Self {
        self.options.replace_if_present = replace;
        self
    }

    pub fn data_coding(mut self, data_coding: u8) -> Self {
        self.options.data_coding = data_coding;
        self
    }

    pub fn canned_message_id(mut self, id: u8) -> Self {
        self.options.canned_message_id = id;
        self
    }

    pub fn build(self) -> SmppResult<SmppOptions> {
        let mut options = self.options;

        options.priority = PriorityFlag::try_from(self.priority).map_err(|_| {
            SmppError::InvalidOptions(format!("priority {} is reserved (0-3)", self.priority))
        })?;
        options.schedule_delivery_time = SmppDateTime::new(&self.schedule_delivery_time)
            .map_err(|e| SmppError::InvalidOptions(format!("schedule_delivery_time: {e}")))?;
        options.validity_period = SmppDateTime::new(&self.validity_period)
            .map_err(|e| SmppError::InvalidOptions(format!("validity_period: {e}")))?;

        check_cstring(&options.service_type, MAX_SERVICE_TYPE_LEN, "service_type")?;
        check_cstring(&options.source_addr, MAX_ADDR_LEN, "source_addr")?;

        Ok(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_request_receipts_and_send_immediately() {
        let options = SmppOptions::builder().build().unwrap();
        assert_eq!(options, SmppOptions::default());
        assert!(options.registered_delivery().wants_receipt());
        assert!(options.schedule_delivery_time().is_immediate());
        assert_eq!(options.priority(), PriorityFlag::Level0);
    }

    #[test]
    fn reserved_priority_is_rejected() {
        let err = SmppOptions::builder().priority(4).build().unwrap_err();
        assert!(matches!(err, SmppError::InvalidOptions(_)));
        let options = SmppOptions::builder().priority(3).build().unwrap();
        assert_eq!(options.priority(), PriorityFlag::Level3);
    }

    #[test]
    fn malformed_times_are_rejected() {
        assert!(
            SmppOptions::builder()
                .validity_period("not-a-time")
                .build()
                .is_err()
        );
        let options = SmppOptions::builder()
            .validity_period("000001000000000R")
            .build()
            .unwrap();
        assert!(options.validity_period().is_relative());
    }

    #[test]
    fn overlong_fields_fail_with_field_too_long() {
        let err = SmppOptions::builder()
            .service_type("TOOLONG")
            .build()
            .unwrap_err();
        assert!(matches!(err, SmppError::FieldTooLong { field: "service_type", .. }));

        let err = SmppOptions::builder()
            .source_addr("123456789012345678901")
            .build()
            .unwrap_err();
        assert!(matches!(err, SmppError::FieldTooLong { field: "source_addr", .. }));
    }

    #[test]
    fn to_builder_derives_variants() {
        let base = SmppOptions::builder().source_addr("GATEWAY").build().unwrap();
        let urgent = base.to_builder().priority(2).build().unwrap();
        assert_eq!(urgent.source(None).addr, "GATEWAY");
        assert_eq!(urgent.priority(), PriorityFlag::Level2);
        assert_eq!(base.priority(), PriorityFlag::Level0);
        assert_eq!(base.source(Some("OTHER")).addr, "OTHER");
    }

    #[test]
    fn credentials_enforce_protocol_limits() {
        assert!(BindCredentials::new("system", "secret").validate().is_ok());
        let err = BindCredentials::new("a_system_id_too_long", "pw")
            .validate()
            .unwrap_err();
        assert!(matches!(err, SmppError::FieldTooLong { field: "system_id", max: 15, .. }));
        let err = BindCredentials::new("sys", "password9").validate().unwrap_err();
        assert!(matches!(err, SmppError::FieldTooLong { field: "password", max: 8, .. }));
    }
}
