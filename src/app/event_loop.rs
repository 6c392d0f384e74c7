// ABOUTME: Single-task event loop multiplexing SMSC sessions, the control listener and control clients
// ABOUTME: Also paces the outbound queue, sweeps expired submissions and reacts to heartbeat failures

use crate::app::container::AppContainer;
use crate::app::control::{self, ControlError, ControlSession};
use crate::app::store::{MessageStatus, MessageStore, OutboundMessage};
use crate::client::{HeartbeatConfig, LinkFailure, SessionState, SmppError};
use crate::connection::Received;
use futures::future::{self, BoxFuture, FutureExt};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(30);
const UNBIND_GRACE: Duration = Duration::from_secs(2);

/// Settings the loop itself needs.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    pub heartbeat: HeartbeatConfig,
    /// Pause between two queued outbound messages.
    pub send_interval: Duration,
    /// Pending-submission TTL; sweeping is off when `None`.
    pub pending_ttl: Option<Duration>,
}

impl Default for LoopSettings {
    fn default() -> Self {
        LoopSettings {
            heartbeat: HeartbeatConfig::default(),
            send_interval: Duration::from_millis(50),
            pending_ttl: None,
        }
    }
}

enum Ready {
    Smsc(usize),
    Control(usize),
}

pub struct Gateway<S> {
    containers: Vec<AppContainer>,
    store: Arc<S>,
    settings: LoopSettings,
    control: HashMap<usize, ControlSession>,
    next_control: usize,
    outbound: VecDeque<OutboundMessage>,
    next_container: usize,
}

impl<S: MessageStore + 'static> Gateway<S> {
    pub fn new(containers: Vec<AppContainer>, store: Arc<S>, settings: LoopSettings) -> Self {
        Gateway {
            containers,
            store,
            settings,
            control: HashMap::new(),
            next_control: 0,
            outbound: VecDeque::new(),
            next_container: 0,
        }
    }

    /// Run until `shutdown` resolves, then unbind every SMSC.
    pub async fn run(
        mut self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()>,
    ) -> io::Result<()> {
        let (failures_tx, mut failures) = mpsc::unbounded_channel::<LinkFailure>();
        for container in &self.containers {
            container
                .engine
                .start_heartbeat(self.settings.heartbeat.clone(), failures_tx.clone());
        }
        drop(failures_tx);

        match self.store.load_pending_outbound() {
            Ok(queued) => {
                info!(count = queued.len(), "outbound messages queued");
                self.outbound.extend(queued);
            }
            Err(e) => error!(error = %e, "cannot load queued messages"),
        }

        let mut send_tick = time::interval(self.settings.send_interval);
        send_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let sweeping = self.settings.pending_ttl.is_some();
        let mut sweep_tick = time::interval(
            self.settings
                .pending_ttl
                .map_or(MAX_SWEEP_INTERVAL, |ttl| ttl.min(MAX_SWEEP_INTERVAL))
                .max(Duration::from_millis(100)),
        );
        sweep_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut link_failures_open = true;
        tokio::pin!(shutdown);
        info!(addr = ?listener.local_addr().ok(), smsc = self.containers.len(), "gateway running");

        loop {
            let ready = self.readiness().await;

            tokio::select! {
                _ = &mut shutdown => break,

                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let id = self.next_control;
                        self.next_control += 1;
                        debug!(control = id, %peer, "control connection");
                        self.control.insert(id, ControlSession::new(stream, peer));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },

                which = ready => match which {
                    Ready::Smsc(index) => self.on_smsc_readable(index).await,
                    Ready::Control(id) => self.on_control_readable(id).await,
                },

                failure = failures.recv(), if link_failures_open => match failure {
                    Some(failure) => self.on_link_failure(failure).await,
                    None => link_failures_open = false,
                },

                _ = sweep_tick.tick(), if sweeping => self.sweep().await,

                _ = send_tick.tick(), if !self.outbound.is_empty() => self.send_next().await,
            }
        }

        info!("shutting down");
        for container in &self.containers {
            let events = container.engine.shutdown_gracefully(UNBIND_GRACE).await;
            container.apply(events, self.store.as_ref());
        }
        Ok(())
    }

    /// One future that resolves with whichever watched socket turns readable
    /// first. Sessions that are gone are not watched.
    async fn readiness(&self) -> BoxFuture<'static, Ready> {
        let mut watched: Vec<BoxFuture<'static, Ready>> = Vec::new();

        for (index, container) in self.containers.iter().enumerate() {
            if let Some(stream) = container.engine.readiness().await {
                watched.push(
                    async move {
                        let _ = stream.readable().await;
                        Ready::Smsc(index)
                    }
                    .boxed(),
                );
            }
        }
        for (&id, session) in &self.control {
            let stream = session.readiness();
            watched.push(
                async move {
                    let _ = stream.readable().await;
                    Ready::Control(id)
                }
                .boxed(),
            );
        }

        if watched.is_empty() {
            return future::pending().boxed();
        }
        future::select_all(watched)
            .map(|(ready, _, _)| ready)
            .boxed()
    }

    async fn on_smsc_readable(&mut self, index: usize) {
        let Some(container) = self.containers.get(index) else {
            return;
        };
        match container.engine.process_incoming().await {
            Ok(events) => container.apply(events, self.store.as_ref()),
            Err(SmppError::ConnectionClosed) => {
                warn!(engine = container.id, host = %container.endpoint.host, "SMSC closed the connection");
            }
            Err(e) => {
                error!(engine = container.id, host = %container.endpoint.host, error = %e, "SMSC session failed");
            }
        }
    }

    async fn on_control_readable(&mut self, id: usize) {
        let Some(session) = self.control.get_mut(&id) else {
            return;
        };

        match session.read() {
            Ok(Received::Data(_)) => {}
            Ok(Received::WouldBlock) => return,
            Ok(Received::Closed) => {
                debug!(control = id, "control client went away");
                self.control.remove(&id);
                return;
            }
            Err(e) => {
                warn!(control = id, error = %e, "control read failed");
                self.control.remove(&id);
                return;
            }
        }

        let outcome = match session.request() {
            Ok(None) => return,
            Ok(Some(request)) => {
                info!(control = id, method = %request.method, path = %request.path, "control request");
                match control::route(&request) {
                    Ok(send) => self.dispatch_send(&send.message, send.destinations()).await,
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        };

        // the session is done either way
        let Some(session) = self.control.remove(&id) else {
            return;
        };
        let (status, message) = match outcome {
            Ok(summary) => (200, summary),
            Err(e) => {
                warn!(control = id, peer = %session.peer(), error = %e, "control request refused");
                (e.status_code(), e.to_string())
            }
        };
        if let Err(e) = session.respond(status, &message).await {
            debug!(control = id, error = %e, "control response not delivered");
        }
    }

    async fn dispatch_send(
        &mut self,
        text: &str,
        destinations: Vec<String>,
    ) -> Result<String, ControlError> {
        let container = self.next_transmitter().await.ok_or(ControlError::Unavailable)?;
        let engine = &self.containers[container].engine;
        let options = &self.containers[container].options;

        if let [destination] = destinations.as_slice() {
            let sequence = engine.submit(text, destination, options).await?;
            Ok(format!("message sent (seq {sequence})"))
        } else {
            let sequences = engine
                .submit_multi(text, &destinations, options, None)
                .await?;
            Ok(format!(
                "message sent to {} destinations in {} submissions",
                destinations.len(),
                sequences.len()
            ))
        }
    }

    /// Round-robin over SMSCs bound in a mode that can transmit.
    async fn next_transmitter(&mut self) -> Option<usize> {
        let count = self.containers.len();
        for offset in 0..count {
            let index = (self.next_container + offset) % count;
            let state = self.containers[index].engine.state().await;
            if let SessionState::Bound(mode) = state {
                if mode.can_transmit() {
                    self.next_container = (index + 1) % count;
                    return Some(index);
                }
            }
        }
        None
    }

    async fn send_next(&mut self) {
        let Some(message) = self.outbound.pop_front() else {
            return;
        };
        let Some(index) = self.next_transmitter().await else {
            debug!(row = message.id, "no SMSC bound, holding outbound queue");
            self.outbound.push_front(message);
            return;
        };

        let container = &self.containers[index];
        let result = container
            .engine
            .submit_tracked(&message.text, &message.phone, &container.options, message.id)
            .await;
        let status = match result {
            Ok(sequence) => MessageStatus::Sent { sequence },
            Err(e) if e.is_retryable() => {
                warn!(row = message.id, engine = container.id, error = %e, "send failed, message requeued");
                self.outbound.push_front(message);
                return;
            }
            Err(e) => {
                warn!(row = message.id, error = %e, "outbound message rejected locally");
                MessageStatus::Failed {
                    reason: e.to_string(),
                }
            }
        };
        if let Err(e) = self.store.record_message_status(message.id, status) {
            warn!(row = message.id, error = %e, "message status not recorded");
        }
    }

    async fn sweep(&mut self) {
        for container in &self.containers {
            let expired = container.engine.evict_expired().await;
            if !expired.is_empty() {
                container.apply(expired, self.store.as_ref());
            }
        }
    }

    async fn on_link_failure(&mut self, failure: LinkFailure) {
        match self.containers.iter().find(|c| c.id == failure.engine) {
            Some(container) => {
                error!(engine = container.id, host = %container.endpoint.host, reason = %failure.reason, "SMSC link lost");
                container.engine.handle_link_failure(&failure.reason).await;
            }
            None => warn!(engine = failure.engine, "link failure for unknown engine"),
        }
    }
}
