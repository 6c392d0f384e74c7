// ABOUTME: bind_transmitter / bind_receiver / bind_transceiver requests and their responses
// ABOUTME: The three bind flavours share one body layout and differ only in command id

use crate::codec::{
    CodecError, Decodable, Encodable, PduHeader, decode_cstring, decode_u8, encode_cstring,
};
use crate::datatypes::tlv::{Tlv, decode_tlvs, encode_tlvs};
use crate::datatypes::{CommandId, InterfaceVersion, NumericPlanIndicator, TypeOfNumber};
use bytes::{Buf, BufMut, BytesMut};
use std::io::Cursor;

pub const MAX_SYSTEM_ID_LEN: usize = 15;
pub const MAX_PASSWORD_LEN: usize = 8;
pub const MAX_SYSTEM_TYPE_LEN: usize = 12;
pub const MAX_ADDRESS_RANGE_LEN: usize = 40;

/// Session role requested from the SMSC.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BindMode {
    Transmitter,
    Receiver,
    Transceiver,
}

impl BindMode {
    pub fn command_id(self) -> CommandId {
        match self {
            BindMode::Transmitter => CommandId::BindTransmitter,
            BindMode::Receiver => CommandId::BindReceiver,
            BindMode::Transceiver => CommandId::BindTransceiver,
        }
    }

    pub fn from_command_id(id: CommandId) -> Option<Self> {
        match id {
            CommandId::BindTransmitter | CommandId::BindTransmitterResp => {
                Some(BindMode::Transmitter)
            }
            CommandId::BindReceiver | CommandId::BindReceiverResp => Some(BindMode::Receiver),
            CommandId::BindTransceiver | CommandId::BindTransceiverResp => {
                Some(BindMode::Transceiver)
            }
            _ => None,
        }
    }

    pub fn can_transmit(self) -> bool {
        matches!(self, BindMode::Transmitter | BindMode::Transceiver)
    }

    pub fn can_receive(self) -> bool {
        matches!(self, BindMode::Receiver | BindMode::Transceiver)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BindRequest {
    pub mode: BindMode,
    pub sequence_number: u32,
    pub system_id: String,
    pub password: String,
    pub system_type: String,
    pub interface_version: InterfaceVersion,
    pub addr_ton: TypeOfNumber,
    pub addr_npi: NumericPlanIndicator,
    pub address_range: String,
}

impl BindRequest {
    pub fn new(mode: BindMode, sequence_number: u32, system_id: &str, password: &str) -> Self {
        BindRequest {
            mode,
            sequence_number,
            system_id: system_id.to_string(),
            password: password.to_string(),
            system_type: String::new(),
            interface_version: InterfaceVersion::SmppV34,
            addr_ton: TypeOfNumber::Unknown,
            addr_npi: NumericPlanIndicator::Unknown,
            address_range: String::new(),
        }
    }
}

impl Encodable for BindRequest {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::new(self.mode.command_id(), 0, self.sequence_number).encode(buf);
        encode_cstring(buf, &self.system_id, MAX_SYSTEM_ID_LEN, "system_id")?;
        encode_cstring(buf, &self.password, MAX_PASSWORD_LEN, "password")?;
        encode_cstring(buf, &self.system_type, MAX_SYSTEM_TYPE_LEN, "system_type")?;
        buf.put_u8(self.interface_version as u8);
        buf.put_u8(self.addr_ton as u8);
        buf.put_u8(self.addr_npi as u8);
        encode_cstring(buf, &self.address_range, MAX_ADDRESS_RANGE_LEN, "address_range")?;
        Ok(())
    }
}

impl Decodable for BindRequest {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let mode = header
            .command()
            .and_then(BindMode::from_command_id)
            .ok_or(CodecError::UnexpectedCommandId {
                expected: CommandId::BindTransceiver,
                actual: header.command_id,
            })?;

        let system_id = decode_cstring(buf, MAX_SYSTEM_ID_LEN, "system_id")?;
        let password = decode_cstring(buf, MAX_PASSWORD_LEN, "password")?;
        let system_type = decode_cstring(buf, MAX_SYSTEM_TYPE_LEN, "system_type")?;
        let version = decode_u8(buf)?;
        let interface_version =
            InterfaceVersion::try_from(version).map_err(|_| CodecError::FieldValidation {
                field: "interface_version",
                reason: format!("unsupported version {version:#04x}"),
            })?;
        let addr_ton = TypeOfNumber::from_wire(decode_u8(buf)?);
        let addr_npi = NumericPlanIndicator::from_wire(decode_u8(buf)?);
        let address_range = decode_cstring(buf, MAX_ADDRESS_RANGE_LEN, "address_range")?;

        Ok(BindRequest {
            mode,
            sequence_number: header.sequence_number,
            system_id,
            password,
            system_type,
            interface_version,
            addr_ton,
            addr_npi,
            address_range,
        })
    }
}

/// Response to any of the three binds.
#[derive(Clone, Debug, PartialEq)]
pub struct BindResponse {
    pub mode: BindMode,
    pub command_status: u32,
    pub sequence_number: u32,
    /// SMSC identifier. May be empty when the bind was refused.
    pub system_id: String,
    pub tlvs: Vec<Tlv>,
}

impl BindResponse {
    pub fn new(mode: BindMode, sequence_number: u32, command_status: u32, system_id: &str) -> Self {
        BindResponse {
            mode,
            command_status,
            sequence_number,
            system_id: system_id.to_string(),
            tlvs: Vec::new(),
        }
    }
}

impl Encodable for BindResponse {
    fn encode(&self, buf: &mut BytesMut) -> Result<(), CodecError> {
        PduHeader::new(
            self.mode.command_id().response(),
            self.command_status,
            self.sequence_number,
        )
        .encode(buf);
        encode_cstring(buf, &self.system_id, MAX_SYSTEM_ID_LEN, "system_id")?;
        encode_tlvs(buf, &self.tlvs)
    }
}

impl Decodable for BindResponse {
    fn decode(header: PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let mode = header
            .command()
            .and_then(BindMode::from_command_id)
            .ok_or(CodecError::UnexpectedCommandId {
                expected: CommandId::BindTransceiverResp,
                actual: header.command_id,
            })?;

        // error responses frequently arrive without a body
        let system_id = if buf.has_remaining() {
            decode_cstring(buf, MAX_SYSTEM_ID_LEN, "system_id")?
        } else {
            String::new()
        };
        let tlvs = decode_tlvs(buf)?;

        Ok(BindResponse {
            mode,
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            system_id,
            tlvs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Frame;
    use crate::datatypes::tlv::tags;

    #[test]
    fn bind_transceiver_wire_layout() {
        let bytes = BindRequest::new(BindMode::Transceiver, 1, "esme", "pw")
            .to_bytes()
            .unwrap();
        assert_eq!(&bytes[0..4], &(bytes.len() as u32).to_be_bytes());
        assert_eq!(&bytes[4..8], &9u32.to_be_bytes());
        assert_eq!(&bytes[12..16], &1u32.to_be_bytes());
        // system_id, password, empty system_type, version, ton, npi, empty range
        assert_eq!(&bytes[16..], b"esme\0pw\0\0\x34\x00\x00\0");
    }

    #[test]
    fn each_mode_uses_its_command_id() {
        for (mode, id) in [
            (BindMode::Transmitter, 2u32),
            (BindMode::Receiver, 1),
            (BindMode::Transceiver, 9),
        ] {
            let bytes = BindRequest::new(mode, 5, "a", "b").to_bytes().unwrap();
            assert_eq!(&bytes[4..8], &id.to_be_bytes());
            match Frame::decode(&bytes).unwrap() {
                Frame::Bind(req) => assert_eq!(req.mode, mode),
                other => panic!("unexpected frame {other:?}"),
            }
        }
    }

    #[test]
    fn overlong_password_fails_encode() {
        let err = BindRequest::new(BindMode::Transmitter, 1, "esme", "123456789")
            .to_bytes()
            .unwrap_err();
        assert!(matches!(err, CodecError::FieldTooLong { field: "password", .. }));
    }

    #[test]
    fn bind_resp_with_tlv() {
        let mut resp = BindResponse::new(BindMode::Transmitter, 3, 0, "SMSC");
        resp.tlvs.push(Tlv::from_u8(tags::SC_INTERFACE_VERSION, 0x34));
        let bytes = resp.to_bytes().unwrap();
        assert_eq!(Frame::decode(&bytes).unwrap(), Frame::BindResp(resp));
    }

    #[test]
    fn bodyless_error_resp_decodes() {
        let bytes = crate::codec::encode_header(CommandId::BindTransceiverResp, 0x0D, 8, 0);
        match Frame::decode(&bytes).unwrap() {
            Frame::BindResp(resp) => {
                assert_eq!(resp.command_status, 0x0D);
                assert_eq!(resp.mode, BindMode::Transceiver);
                assert!(resp.system_id.is_empty());
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }
}
