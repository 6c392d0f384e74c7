// ABOUTME: Macros shared by PDU definitions
// ABOUTME: Header-only PDUs (enquire_link, unbind, generic_nack...) are generated here

/// Declares a PDU that consists of the 16-byte header alone, together with its
/// Encodable/Decodable implementations.
///
/// Decoding ignores any stray body bytes: a peer padding an unbind_resp should
/// not cost us the session.
macro_rules! header_only_pdu {
    ($(#[$meta:meta])* $pdu_type:ident, $command_id:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq)]
        pub struct $pdu_type {
            pub command_status: u32,
            pub sequence_number: u32,
        }

        impl $pdu_type {
            pub fn new(sequence_number: u32) -> Self {
                $pdu_type {
                    command_status: 0,
                    sequence_number,
                }
            }

            pub fn with_status(sequence_number: u32, command_status: u32) -> Self {
                $pdu_type {
                    command_status,
                    sequence_number,
                }
            }
        }

        impl $crate::codec::Decodable for $pdu_type {
            fn decode(
                header: $crate::codec::PduHeader,
                buf: &mut std::io::Cursor<&[u8]>,
            ) -> Result<Self, $crate::codec::CodecError> {
                use bytes::Buf;

                if header.command_id != $command_id as u32 {
                    return Err($crate::codec::CodecError::UnexpectedCommandId {
                        expected: $command_id,
                        actual: header.command_id,
                    });
                }
                let stray = buf.remaining();
                buf.advance(stray);

                Ok($pdu_type {
                    command_status: header.command_status,
                    sequence_number: header.sequence_number,
                })
            }
        }

        impl $crate::codec::Encodable for $pdu_type {
            fn encode(&self, buf: &mut bytes::BytesMut) -> Result<(), $crate::codec::CodecError> {
                $crate::codec::PduHeader::new($command_id, self.command_status, self.sequence_number)
                    .encode(buf);
                Ok(())
            }
        }
    };
}
