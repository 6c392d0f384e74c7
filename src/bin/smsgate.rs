// ABOUTME: smsgate binary: load configuration, bind every configured SMSC and run the gateway loop
// ABOUTME: Ctrl-C unbinds all sessions and stops their heartbeats before exiting

use argh::FromArgs;
use smpp_gateway::app::{AppContainer, Config, Gateway, LoopSettings, MemoryStore, MessageStore};
use smpp_gateway::app::config::DEFAULT_CONFIG_FILE;
use smpp_gateway::client::HeartbeatConfig;
use std::error::Error;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// SMS gateway: relays queued and HTTP-submitted messages to SMPP SMSCs
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debugging
    #[argh(switch, short = 'd')]
    debug: bool,

    /// configuration file (default: config.dat)
    #[argh(option, short = 'c')]
    config: Option<String>,

    /// control-plane port, overriding listen_port from the configuration
    #[argh(option, short = 'p')]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli_args.debug {
            Level::DEBUG
        } else {
            Level::INFO
        })
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let path = cli_args.config.as_deref().unwrap_or(DEFAULT_CONFIG_FILE);
    info!(path, "reading configuration");
    let config = Config::load(path)?;

    let store = Arc::new(MemoryStore::new());
    info!(db = %config.db_connection, "message store ready");
    if let Ok(Some(sender)) = store.load_named_parameter("sender_id") {
        info!(%sender, "sender id from store");
    }

    let mut containers = Vec::with_capacity(config.smsc.len());
    for (index, endpoint) in config.smsc.iter().enumerate() {
        let id = index + 1;
        match AppContainer::start(id, endpoint.clone(), &config, store.as_ref()).await {
            Ok(container) => containers.push(container),
            Err(e) => {
                error!(engine = id, host = %endpoint.host, port = endpoint.port, error = %e, "failed to bind SMSC")
            }
        }
    }
    if containers.is_empty() {
        return Err("cannot connect with any SMSC".into());
    }
    if containers.len() < config.smsc.len() {
        warn!(
            bound = containers.len(),
            configured = config.smsc.len(),
            "running with a subset of SMSCs"
        );
    }

    let port = cli_args.port.unwrap_or(config.listen_port);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "now listening");

    let settings = LoopSettings {
        heartbeat: HeartbeatConfig::new(config.heartbeat_interval)
            .with_max_failures(config.heartbeat_max_failures),
        send_interval: config.send_interval,
        pending_ttl: config.pending_ttl,
    };

    Gateway::new(containers, store, settings)
        .run(listener, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "cannot listen for ctrl-c");
            }
        })
        .await?;

    info!("bye");
    Ok(())
}
