// ABOUTME: Engine factory: connect to an SMSC and bind in one call
// ABOUTME: Collects the per-session settings that are fixed for the engine's lifetime

use crate::client::engine::SmppEngine;
use crate::client::error::SmppResult;
use crate::client::events::EngineEvent;
use crate::client::types::BindCredentials;
use crate::connection::{Transport, TransportSession};
use crate::datatypes::BindMode;
use std::time::Duration;

/// Builder for [`SmppEngine`].
///
/// Use this when an engine needs more than the defaults: a bind mode other
/// than transceiver, a pending-request TTL, or a longer bind timeout.
///
/// ```rust,no_run
/// use smpp_gateway::client::{BindCredentials, EngineBuilder};
/// use smpp_gateway::datatypes::BindMode;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (engine, _events) = EngineBuilder::new(BindCredentials::new("gateway", "secret"))
///     .bind_mode(BindMode::Transmitter)
///     .pending_ttl(Duration::from_secs(3600))
///     .connect_and_bind("localhost", 2775)
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    id: usize,
    credentials: BindCredentials,
    bind_mode: BindMode,
    pending_ttl: Option<Duration>,
    bind_timeout: Duration,
}

impl EngineBuilder {
    pub fn new(credentials: BindCredentials) -> Self {
        EngineBuilder {
            id: 0,
            credentials,
            bind_mode: BindMode::Transceiver,
            pending_ttl: None,
            bind_timeout: Duration::from_secs(30),
        }
    }

    /// Identifier carried in every log line of the engine.
    pub fn id(mut self, id: usize) -> Self {
        self.id = id;
        self
    }

    pub fn bind_mode(mut self, mode: BindMode) -> Self {
        self.bind_mode = mode;
        self
    }

    /// Evict pending submissions older than `ttl`. Unset, they stay until
    /// resolved.
    pub fn pending_ttl(mut self, ttl: Duration) -> Self {
        self.pending_ttl = Some(ttl);
        self
    }

    pub fn bind_timeout(mut self, timeout: Duration) -> Self {
        self.bind_timeout = timeout;
        self
    }

    /// Build an engine over an already connected transport. No bind is sent.
    pub fn with_transport<T: Transport>(self, transport: T) -> SmppEngine<T> {
        SmppEngine::new(self.id, transport, self.credentials, self.pending_ttl)
    }

    /// Connect without binding.
    pub async fn connect(self, host: &str, port: u16) -> SmppResult<SmppEngine<TransportSession>> {
        SmppEngine::connect(self.id, host, port, self.credentials, self.pending_ttl).await
    }

    /// Connect, bind, and wait for the SMSC to accept the bind.
    ///
    /// Returns the engine with every event seen while binding, `Bound`
    /// included. A refused bind closes the connection and returns
    /// [`SmppError::BindRejected`](crate::client::SmppError::BindRejected).
    pub async fn connect_and_bind(
        self,
        host: &str,
        port: u16,
    ) -> SmppResult<(SmppEngine<TransportSession>, Vec<EngineEvent>)> {
        let mode = self.bind_mode;
        let timeout = self.bind_timeout;
        let engine = self.connect(host, port).await?;

        engine.bind(mode).await?;
        match engine.await_bound(timeout).await {
            Ok(events) => Ok((engine, events)),
            Err(e) => {
                engine.shutdown().await;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::state::SessionState;
    use crate::connection::mock::MockTransport;

    #[tokio::test]
    async fn with_transport_starts_connected() {
        let engine = EngineBuilder::new(BindCredentials::new("gw", "pw"))
            .id(4)
            .with_transport(MockTransport::connected());
        assert_eq!(engine.id(), 4);
        assert_eq!(engine.state().await, SessionState::Connected);
    }

    #[tokio::test]
    async fn closed_transport_starts_disconnected() {
        let engine = EngineBuilder::new(BindCredentials::new("gw", "pw"))
            .with_transport(MockTransport::default());
        assert_eq!(engine.state().await, SessionState::Disconnected);
    }
}
