// ABOUTME: ESME side of an SMPP v3.4 session: engine, state machine, pending table, heartbeat
// ABOUTME: Re-exports what the gateway application and integration tests need

//! SMPP Client Module
//!
//! [`SmppEngine`] owns one SMSC session. It gates every operation on the
//! session state, allocates sequence numbers, tracks outstanding submissions
//! until their delivery reports arrive, and turns incoming PDUs into
//! [`EngineEvent`]s for the application.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use smpp_gateway::client::{BindCredentials, EngineBuilder, SmppOptions};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (engine, _events) = EngineBuilder::new(BindCredentials::new("gateway", "secret"))
//!     .connect_and_bind("localhost", 2775)
//!     .await?;
//!
//! let options = Arc::new(SmppOptions::builder().source_addr("12345").build()?);
//! let sequence = engine.submit("Hello!", "447700900123", &options).await?;
//!
//! // Responses and delivery reports come back as events
//! let events = engine.process_incoming().await?;
//! # let _ = (sequence, events);
//! engine.shutdown().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Keep-Alive
//!
//! [`SmppEngine::start_heartbeat`] spawns a task that sends enquire_link on an
//! interval and reports a [`LinkFailure`] when the SMSC stops answering. The
//! task stops on its own once the session is torn down.

pub mod builder;
pub mod engine;
pub mod error;
pub mod events;
pub mod keepalive;
pub mod pending;
pub mod state;
pub mod types;

pub use builder::EngineBuilder;
pub use engine::SmppEngine;
pub use error::{SmppError, SmppResult};
pub use events::EngineEvent;
pub use keepalive::{HeartbeatConfig, HeartbeatStatus, LinkFailure};
pub use pending::{PendingEntry, PendingRequestTable, RequestState};
pub use state::{BindStateMachine, Operation, SessionState};
pub use types::{BindCredentials, SmppOptions, SmppOptionsBuilder};
