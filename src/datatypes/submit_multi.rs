// ABOUTME: submit_multi / submit_multi_resp: one message to up to 254 destinations
// ABOUTME: The response lists the destinations the SMSC refused, each with its own status

use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, decode_cstring, decode_u8, decode_u32,
    encode_cstring,
};
use crate::datatypes::address::{Address, MAX_ADDR_LEN};
use crate::datatypes::submit_sm::{
    MAX_MESSAGE_ID_LEN, MAX_SERVICE_TYPE_LEN, decode_short_message, decode_time,
    encode_short_message, encode_time, message_text, route_message,
};
use crate::datatypes::tlv::{Tlv, decode_tlvs, encode_tlvs};
use crate::datatypes::{CommandId, EsmClass, PriorityFlag, RegisteredDelivery, SmppDateTime};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

/// number_of_dests is a single octet.
pub const MAX_DESTINATIONS: usize = 254;
pub const MAX_DISTRIBUTION_LIST_LEN: usize = 20;

const DEST_FLAG_SME: u8 = 0x01;
const DEST_FLAG_LIST: u8 = 0x02;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    Sme(Address),
    DistributionList(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SubmitMulti {
    pub sequence_number: u32,
    pub service_type: String,
    pub source: Address,
    pub destinations: Vec<Destination>,
    pub esm_class: EsmClass,
    pub protocol_id: u8,
    pub priority_flag: PriorityFlag,
    pub schedule_delivery_time: SmppDateTime,
    pub validity_period: SmppDateTime,
    pub registered_delivery: RegisteredDelivery,
    pub replace_if_present_flag: u8,
    pub data_coding: u8,
    pub sm_default_msg_id: u8,
    pub short_message: Bytes,
    pub tlvs: Vec<Tlv>,
}

impl SubmitMulti {
    pub fn new(sequence_number: u32, source: Address, destinations: Vec<Destination>) -> Self {
        SubmitMulti {
            sequence_number,
            service_type: String::new(),
            source,
            destinations,
            esm_class: EsmClass::default(),
            protocol_id: 0,
            priority_flag: PriorityFlag::Level0,
            schedule_delivery_time: SmppDateTime::immediate(),
            validity_period: SmppDateTime::immediate(),
            registered_delivery: RegisteredDelivery::default(),
            replace_if_present_flag: 0,
            data_coding: 0,
            sm_default_msg_id: 0,
            short_message: Bytes::new(),
            tlvs: Vec::new(),
        }
    }

    pub fn set_message(&mut self, text: &[u8]) -> Result<(), CodecError> {
        self.short_message = route_message(text, &mut self.tlvs)?;
        Ok(())
    }

    pub fn message(&self) -> Bytes {
        message_text(&self.short_message, &self.tlvs)
    }
}

impl Encodable for SubmitMulti {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        if self.destinations.is_empty() || self.destinations.len() > MAX_DESTINATIONS {
            return Err(CodecError::FieldValidation {
                field: "number_of_dests",
                reason: format!(
                    "{} destinations, must be 1-{MAX_DESTINATIONS}",
                    self.destinations.len()
                ),
            });
        }

        PduHeader::new(CommandId::SubmitMulti, 0, self.sequence_number).encode(buf);
        encode_cstring(buf, &self.service_type, MAX_SERVICE_TYPE_LEN, "service_type")?;
        self.source.encode(buf, MAX_ADDR_LEN, "source_addr")?;
        buf.put_u8(self.destinations.len() as u8);
        for destination in &self.destinations {
            match destination {
                Destination::Sme(address) => {
                    buf.put_u8(DEST_FLAG_SME);
                    address.encode(buf, MAX_ADDR_LEN, "destination_addr")?;
                }
                Destination::DistributionList(name) => {
                    buf.put_u8(DEST_FLAG_LIST);
                    encode_cstring(buf, name, MAX_DISTRIBUTION_LIST_LEN, "dl_name")?;
                }
            }
        }
        buf.put_u8(self.esm_class.to_byte());
        buf.put_u8(self.protocol_id);
        buf.put_u8(self.priority_flag as u8);
        encode_time(buf, &self.schedule_delivery_time, "schedule_delivery_time")?;
        encode_time(buf, &self.validity_period, "validity_period")?;
        buf.put_u8(self.registered_delivery.to_byte());
        buf.put_u8(self.replace_if_present_flag);
        buf.put_u8(self.data_coding);
        buf.put_u8(self.sm_default_msg_id);
        encode_short_message(buf, &self.short_message)?;
        encode_tlvs(buf, &self.tlvs)
    }
}

impl Decodable for SubmitMulti {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let service_type = decode_cstring(buf, MAX_SERVICE_TYPE_LEN, "service_type")?;
        let source = Address::decode(buf, MAX_ADDR_LEN, "source_addr")?;

        let count = decode_u8(buf)?;
        let mut destinations = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let destination = match decode_u8(buf)? {
                DEST_FLAG_SME => {
                    Destination::Sme(Address::decode(buf, MAX_ADDR_LEN, "destination_addr")?)
                }
                DEST_FLAG_LIST => Destination::DistributionList(decode_cstring(
                    buf,
                    MAX_DISTRIBUTION_LIST_LEN,
                    "dl_name",
                )?),
                flag => {
                    return Err(CodecError::FieldValidation {
                        field: "dest_flag",
                        reason: format!("unknown destination flag {flag}"),
                    });
                }
            };
            destinations.push(destination);
        }

        let esm_class = EsmClass::new(decode_u8(buf)?);
        let protocol_id = decode_u8(buf)?;
        let priority = decode_u8(buf)?;
        let priority_flag =
            PriorityFlag::try_from(priority).map_err(|_| CodecError::FieldValidation {
                field: "priority_flag",
                reason: format!("reserved priority {priority}"),
            })?;

        Ok(SubmitMulti {
            sequence_number: header.sequence_number,
            service_type,
            source,
            destinations,
            esm_class,
            protocol_id,
            priority_flag,
            schedule_delivery_time: decode_time(buf, "schedule_delivery_time")?,
            validity_period: decode_time(buf, "validity_period")?,
            registered_delivery: RegisteredDelivery::new(decode_u8(buf)?),
            replace_if_present_flag: decode_u8(buf)?,
            data_coding: decode_u8(buf)?,
            sm_default_msg_id: decode_u8(buf)?,
            short_message: decode_short_message(buf)?,
            tlvs: decode_tlvs(buf)?,
        })
    }
}

/// A destination the SMSC did not accept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsuccessfulDelivery {
    pub address: Address,
    pub error_status: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitMultiResponse {
    pub command_status: u32,
    pub sequence_number: u32,
    pub message_id: String,
    pub unsuccessful: Vec<UnsuccessfulDelivery>,
}

impl Encodable for SubmitMultiResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::new(CommandId::SubmitMultiResp, self.command_status, self.sequence_number)
            .encode(buf);
        encode_cstring(buf, &self.message_id, MAX_MESSAGE_ID_LEN, "message_id")?;
        if self.unsuccessful.len() > MAX_DESTINATIONS {
            return Err(CodecError::FieldValidation {
                field: "no_unsuccess",
                reason: format!("{} entries", self.unsuccessful.len()),
            });
        }
        buf.put_u8(self.unsuccessful.len() as u8);
        for failed in &self.unsuccessful {
            failed.address.encode(buf, MAX_ADDR_LEN, "destination_addr")?;
            buf.put_u32(failed.error_status);
        }
        Ok(())
    }
}

impl Decodable for SubmitMultiResponse {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if !buf.has_remaining() {
            return Ok(SubmitMultiResponse {
                command_status: header.command_status,
                sequence_number: header.sequence_number,
                message_id: String::new(),
                unsuccessful: Vec::new(),
            });
        }

        let message_id = decode_cstring(buf, MAX_MESSAGE_ID_LEN, "message_id")?;
        let count = if buf.has_remaining() { decode_u8(buf)? } else { 0 };
        let mut unsuccessful = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let address = Address::decode(buf, MAX_ADDR_LEN, "destination_addr")?;
            let error_status = decode_u32(buf)?;
            unsuccessful.push(UnsuccessfulDelivery {
                address,
                error_status,
            });
        }

        Ok(SubmitMultiResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            message_id,
            unsuccessful,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frame;
    use crate::datatypes::{NumericPlanIndicator, TypeOfNumber};

    fn sme(addr: &str) -> Destination {
        Destination::Sme(Address::new(
            TypeOfNumber::International,
            NumericPlanIndicator::Isdn,
            addr,
        ))
    }

    #[test]
    fn destinations_are_flagged() {
        let mut pdu = SubmitMulti::new(
            1,
            Address::default(),
            vec![sme("111"), Destination::DistributionList("staff".into())],
        );
        pdu.set_message(b"all hands").unwrap();
        let bytes = pdu.to_bytes().unwrap();

        // service_type NUL, source ton/npi/NUL, then count and entries
        assert_eq!(&bytes[16..20], &[0, 0, 0, 0]);
        assert_eq!(bytes[20], 2);
        assert_eq!(&bytes[21..27], &[1, 1, 1, b'1', b'1', b'1']);
        assert_eq!(&bytes[28..35], b"\x02staff\0");

        assert_eq!(Frame::decode(&bytes).unwrap(), Frame::SubmitMulti(Box::new(pdu)));
    }

    #[test]
    fn destination_count_is_bounded() {
        let too_many = (0..255).map(|i| sme(&i.to_string())).collect();
        let pdu = SubmitMulti::new(1, Address::default(), too_many);
        assert!(matches!(
            pdu.to_bytes(),
            Err(CodecError::FieldValidation { field: "number_of_dests", .. })
        ));

        let none = SubmitMulti::new(1, Address::default(), Vec::new());
        assert!(none.to_bytes().is_err());
    }

    #[test]
    fn response_lists_unsuccessful_destinations() {
        let resp = SubmitMultiResponse {
            command_status: 0,
            sequence_number: 4,
            message_id: "M1".into(),
            unsuccessful: vec![UnsuccessfulDelivery {
                address: Address::new(TypeOfNumber::International, NumericPlanIndicator::Isdn, "222"),
                error_status: 0x0B,
            }],
        };
        let bytes = resp.to_bytes().unwrap();
        assert_eq!(Frame::decode(&bytes).unwrap(), Frame::SubmitMultiResp(resp));
    }
}
