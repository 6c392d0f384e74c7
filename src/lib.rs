//! SMPP v3.4 ESME engine and the SMS gateway built on it.
//!
//! * [`codec`] and [`datatypes`] translate PDUs to and from the wire.
//! * [`connection`] is the non-blocking TCP transport under a session.
//! * [`client`] holds [`SmppEngine`](client::SmppEngine): bind state,
//!   sequence numbers, pending submissions and the heartbeat.
//! * [`app`] is the gateway: configuration, message store, HTTP control plane
//!   and the event loop multiplexing every SMSC session.

#[macro_use]
mod macros;

pub mod app;
pub mod client;
pub mod codec;
pub mod connection;
pub mod datatypes;


pub use codec::{CodecError, Decodable, Encodable, Frame, PduHeader};

pub use client::{
    BindCredentials, EngineBuilder, EngineEvent, SmppEngine, SmppError, SmppOptions, SmppResult,
};
