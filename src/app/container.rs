// ABOUTME: AppContainer: one configured SMSC with its engine and submission profile
// ABOUTME: Translates engine events into message store updates

use crate::app::config::{Config, SmscEndpoint};
use crate::app::store::{MessageStatus, MessageStore};
use crate::client::{EngineBuilder, EngineEvent, SmppEngine, SmppOptions, SmppResult};
use crate::connection::TransportSession;
use crate::datatypes::{MessageState, describe_status};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct AppContainer {
    pub id: usize,
    pub endpoint: SmscEndpoint,
    pub engine: SmppEngine<TransportSession>,
    pub options: Arc<SmppOptions>,
}

impl AppContainer {
    /// Connect and bind to `endpoint`, feeding the bind-time events to `store`.
    pub async fn start(
        id: usize,
        endpoint: SmscEndpoint,
        config: &Config,
        store: &dyn MessageStore,
    ) -> SmppResult<AppContainer> {
        let mut options = SmppOptions::builder();
        if let Some(source) = &config.source_addr {
            options = options.source_addr(source.as_str());
        }
        let options = Arc::new(options.build()?);

        let mut builder = EngineBuilder::new(endpoint.credentials())
            .id(id)
            .bind_mode(config.bind_mode);
        if let Some(ttl) = config.pending_ttl {
            builder = builder.pending_ttl(ttl);
        }

        let (engine, events) = builder
            .connect_and_bind(&endpoint.host, endpoint.port)
            .await?;
        let container = AppContainer {
            id,
            endpoint,
            engine,
            options,
        };
        container.apply(events, store);
        Ok(container)
    }

    /// Record the outcome of each event in the store.
    pub fn apply(&self, events: Vec<EngineEvent>, store: &dyn MessageStore) {
        for event in events {
            if let Some((row, status)) = status_update(&event) {
                if let Err(e) = store.record_message_status(row, status) {
                    warn!(engine = self.id, row, error = %e, "message status not recorded");
                }
                continue;
            }

            match event {
                EngineEvent::Bound { mode, system_id } => {
                    info!(engine = self.id, host = %self.endpoint.host, ?mode, smsc = %system_id, "SMSC ready");
                }
                EngineEvent::InboundMessage {
                    source,
                    destination,
                    text,
                } => {
                    debug!(engine = self.id, %source, %destination, "storing inbound message");
                    if let Err(e) = store.record_inbound(&source, &text) {
                        warn!(engine = self.id, error = %e, "inbound message not recorded");
                    }
                }
                EngineEvent::Unbound { by_peer } => {
                    info!(engine = self.id, by_peer, "SMSC session closed");
                }
                other => debug!(engine = self.id, event = ?other, "event"),
            }
        }
    }
}

/// The store row an event settles, with its new status.
fn status_update(event: &EngineEvent) -> Option<(u64, MessageStatus)> {
    match event {
        EngineEvent::Accepted {
            message_id,
            reference: Some(row),
            ..
        }
        | EngineEvent::BulkAccepted {
            message_id,
            reference: Some(row),
            ..
        } => Some((
            *row,
            MessageStatus::Submitted {
                message_id: message_id.clone(),
            },
        )),
        EngineEvent::SubmitRejected {
            status,
            reference: Some(row),
            ..
        } => Some((
            *row,
            MessageStatus::Failed {
                reason: describe_status(*status),
            },
        )),
        EngineEvent::DeliveryReport {
            state,
            reference: Some(row),
            ..
        } => final_status(*state).map(|status| (*row, status)),
        EngineEvent::QueryResult {
            state,
            resolved: Some(_),
            reference: Some(row),
            ..
        } => final_status(*state).map(|status| (*row, status)),
        EngineEvent::Expired {
            reference: Some(row),
            ..
        } => Some((*row, MessageStatus::Expired)),
        _ => None,
    }
}

/// A receipt without a state is taken as delivered.
fn final_status(state: Option<MessageState>) -> Option<MessageStatus> {
    match state {
        None | Some(MessageState::Delivered) => Some(MessageStatus::Delivered),
        Some(state) if state.is_terminal() => Some(MessageStatus::Failed {
            reason: format!("{state:?}"),
        }),
        Some(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipts_map_to_final_statuses() {
        assert_eq!(final_status(None), Some(MessageStatus::Delivered));
        assert_eq!(
            final_status(Some(MessageState::Delivered)),
            Some(MessageStatus::Delivered)
        );
        assert_eq!(
            final_status(Some(MessageState::Undeliverable)),
            Some(MessageStatus::Failed {
                reason: "Undeliverable".into()
            })
        );
        assert_eq!(final_status(Some(MessageState::Enroute)), None);
    }

    #[test]
    fn only_referenced_events_touch_the_store() {
        let accepted = EngineEvent::Accepted {
            sequence: 2,
            message_id: "MSGID42".into(),
            reference: Some(7),
        };
        assert_eq!(
            status_update(&accepted),
            Some((
                7,
                MessageStatus::Submitted {
                    message_id: "MSGID42".into()
                }
            ))
        );

        let untracked = EngineEvent::Accepted {
            sequence: 3,
            message_id: "X".into(),
            reference: None,
        };
        assert_eq!(status_update(&untracked), None);

        let expired = EngineEvent::Expired {
            sequence: 4,
            message_id: String::new(),
            reference: Some(8),
        };
        assert_eq!(status_update(&expired), Some((8, MessageStatus::Expired)));
    }
}
