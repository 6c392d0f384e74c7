// ABOUTME: The SMS gateway application around the protocol engine
// ABOUTME: Configuration, store collaborator, HTTP control plane, per-SMSC containers and the event loop

pub mod config;
pub mod container;
pub mod control;
pub mod event_loop;
pub mod store;

pub use config::{Config, ConfigError, SmscEndpoint};
pub use container::AppContainer;
pub use control::ControlError;
pub use event_loop::{Gateway, LoopSettings};
pub use store::{MemoryStore, MessageStatus, MessageStore, OutboundMessage, StoreError};
