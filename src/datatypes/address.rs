// ABOUTME: TON/NPI/address triple shared by submit, deliver, query, cancel and replace PDUs

use crate::codec::{CodecError, decode_cstring, decode_u8, encode_cstring};
use crate::datatypes::{NumericPlanIndicator, TypeOfNumber};
use bytes::{BufMut, BytesMut};
use std::io::Cursor;

/// Limit for source_addr and destination_addr in v3.4 submit/deliver PDUs.
pub const MAX_ADDR_LEN: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Address {
    pub ton: TypeOfNumber,
    pub npi: NumericPlanIndicator,
    pub addr: String,
}

impl Address {
    pub fn new(ton: TypeOfNumber, npi: NumericPlanIndicator, addr: impl Into<String>) -> Self {
        Address {
            ton,
            npi,
            addr: addr.into(),
        }
    }

    pub(crate) fn encode(
        &self,
        buf: &mut BytesMut,
        max_len: usize,
        field: &'static str,
    ) -> Result<(), CodecError> {
        buf.put_u8(self.ton as u8);
        buf.put_u8(self.npi as u8);
        encode_cstring(buf, &self.addr, max_len, field)
    }

    pub(crate) fn decode(
        buf: &mut Cursor<&[u8]>,
        max_len: usize,
        field: &'static str,
    ) -> Result<Self, CodecError> {
        let ton = TypeOfNumber::from_wire(decode_u8(buf)?);
        let npi = NumericPlanIndicator::from_wire(decode_u8(buf)?);
        let addr = decode_cstring(buf, max_len, field)?;
        Ok(Address { ton, npi, addr })
    }
}
