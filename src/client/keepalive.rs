// ABOUTME: Supervised enquire_link heartbeat for long-running SMPP sessions
// ABOUTME: One task per engine, stopped through a watch channel when the session is torn down

use crate::client::engine::SmppEngine;
use crate::client::state::SessionState;
use crate::connection::Transport;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Configuration for the enquire_link heartbeat.
///
/// The heartbeat sends an enquire_link every `interval` while the session is
/// bound. Each unanswered enquire_link counts as a failure; a matching
/// enquire_link_resp resets the count. Once `max_failures` are outstanding the
/// link is declared dead and reported to the owner of the engine.
///
/// # Example
///
/// ```rust
/// use smpp_gateway::client::HeartbeatConfig;
/// use std::time::Duration;
///
/// // Ten-minute interval, three unanswered pings tolerated
/// let config = HeartbeatConfig::default();
///
/// let config = HeartbeatConfig::new(Duration::from_secs(60)).with_max_failures(5);
///
/// let config = HeartbeatConfig::disabled();
/// assert!(!config.enabled);
/// ```
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Time between enquire_link PDUs (default: 600 seconds)
    pub interval: Duration,

    /// Unanswered enquire_link PDUs tolerated before the link is declared
    /// dead (default: 3)
    pub max_failures: u32,

    /// When false no heartbeat task is started. Manual
    /// [`SmppEngine::enquire`] calls still work.
    pub enabled: bool,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(600),
            max_failures: 3,
            enabled: true,
        }
    }
}

impl HeartbeatConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    pub fn with_max_failures(mut self, max_failures: u32) -> Self {
        self.max_failures = max_failures.max(1);
        self
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Snapshot of an engine's heartbeat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatStatus {
    pub running: bool,
    /// enquire_link PDUs sent since the last response.
    pub consecutive_failures: u32,
    pub total_pings: u32,
    pub total_pongs: u32,
}

/// A heartbeat gave up on its link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFailure {
    pub engine: usize,
    pub reason: String,
}

/// Owner's side of a running heartbeat task.
#[derive(Debug)]
pub(crate) struct HeartbeatHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    /// Ask the task to stop without waiting for it.
    pub(crate) fn signal(&self) {
        let _ = self.stop.send(true);
    }

    pub(crate) async fn join(self) {
        self.signal();
        if let Err(e) = self.task.await {
            warn!(error = %e, "heartbeat task ended abnormally");
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        !self.task.is_finished() && !*self.stop.borrow()
    }
}

pub(crate) fn spawn<T: Transport>(
    engine: SmppEngine<T>,
    config: HeartbeatConfig,
    failures: mpsc::UnboundedSender<LinkFailure>,
) -> HeartbeatHandle {
    let (stop, mut stopped) = watch::channel(false);
    let id = engine.id();

    let task = tokio::spawn(async move {
        info!(engine = id, interval = ?config.interval, max_failures = config.max_failures, "heartbeat started");
        loop {
            tokio::select! {
                changed = stopped.changed() => {
                    if changed.is_err() || *stopped.borrow() {
                        break;
                    }
                    continue;
                }
                _ = tokio::time::sleep(config.interval) => {}
            }

            match engine.state().await {
                SessionState::Disconnected => break,
                SessionState::Connected => continue,
                SessionState::Bound(_) => {}
            }

            let status = engine.heartbeat_status().await;
            if status.consecutive_failures >= config.max_failures {
                let reason = format!(
                    "{} enquire_link PDUs unanswered",
                    status.consecutive_failures
                );
                warn!(engine = id, %reason, "link presumed dead");
                let _ = failures.send(LinkFailure { engine: id, reason });
                break;
            }

            if let Err(e) = engine.enquire().await {
                warn!(engine = id, error = %e, "enquire_link failed");
                let _ = failures.send(LinkFailure {
                    engine: id,
                    reason: e.to_string(),
                });
                break;
            }
        }
        debug!(engine = id, "heartbeat stopped");
    });

    HeartbeatHandle { stop, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::types::BindCredentials;
    use crate::codec::{Encodable, Frame};
    use crate::connection::mock::MockTransport;
    use crate::datatypes::{BindMode, BindResponse, CommandId};

    async fn bound_engine() -> (SmppEngine<MockTransport>, MockTransport) {
        let transport = MockTransport::connected();
        let engine = SmppEngine::new(
            1,
            transport.clone(),
            BindCredentials::new("gateway", "secret"),
            None,
        );
        engine.bind(BindMode::Transceiver).await.unwrap();
        let resp = BindResponse::new(BindMode::Transceiver, 1, 0, "SMSC");
        transport.push_inbound(resp.to_bytes().unwrap());
        engine.process_incoming().await.unwrap();
        transport.take_sent();
        (engine, transport)
    }

    fn sent_enquire_links(transport: &MockTransport) -> usize {
        transport
            .sent()
            .iter()
            .filter(|pdu| {
                matches!(Frame::decode(pdu), Ok(f) if f.command_id() == CommandId::EnquireLink as u32)
            })
            .count()
    }

    #[test]
    fn config_defaults_and_builders() {
        let config = HeartbeatConfig::default();
        assert_eq!(config.interval, Duration::from_secs(600));
        assert_eq!(config.max_failures, 3);
        assert!(config.enabled);

        let config = HeartbeatConfig::new(Duration::from_secs(5)).with_max_failures(0);
        assert_eq!(config.max_failures, 1);
        assert!(!HeartbeatConfig::disabled().enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_pings_report_a_link_failure() {
        let (engine, transport) = bound_engine().await;
        let (tx, mut rx) = mpsc::unbounded_channel();
        engine.start_heartbeat(
            HeartbeatConfig::new(Duration::from_secs(10)).with_max_failures(2),
            tx,
        );

        let failure = rx.recv().await.unwrap();
        assert_eq!(failure.engine, 1);
        assert_eq!(sent_enquire_links(&transport), 2);

        engine.handle_link_failure(&failure.reason).await;
        assert_eq!(engine.state().await, SessionState::Disconnected);
        assert!(!engine.heartbeat_status().await.running);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_ends_the_task_promptly() {
        let (engine, transport) = bound_engine().await;
        let (tx, _rx) = mpsc::unbounded_channel();
        engine.start_heartbeat(HeartbeatConfig::new(Duration::from_secs(600)), tx);
        assert!(engine.heartbeat_status().await.running);

        engine.stop_heartbeat().await;
        assert!(!engine.heartbeat_status().await.running);
        assert_eq!(sent_enquire_links(&transport), 0);
    }

    #[tokio::test]
    async fn disabled_config_starts_nothing() {
        let (engine, _transport) = bound_engine().await;
        let (tx, _rx) = mpsc::unbounded_channel();
        engine.start_heartbeat(HeartbeatConfig::disabled(), tx);
        assert!(!engine.heartbeat_status().await.running);
    }
}
