//! corvid - a long-running IRC bot.
//!
//! The driver wires the pieces together: config, the bot core, the
//! channels-on-connect and reconnect-with-backoff collaborators, and the
//! command router.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use corvid::bot::{Backoff, Bot};
use corvid::commander::{self, Command, Response};
use corvid::config::{Config, ConnectionConfig, ReconnectConfig};
use corvid::events::EventKind;
use corvid_proto::Message;
use dashmap::DashMap;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "corvid.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    info!(
        nick = %config.identity.nick,
        connections = config.connections.len(),
        "Starting corvid"
    );

    let bot = Bot::builder(&config.identity.nick, &config.identity.user)
        .realname(&config.identity.realname)
        .keepalive(config.keepalive.ping(), config.keepalive.timeout())
        .finish();

    let servers: Arc<HashMap<String, ConnectionConfig>> = Arc::new(
        config
            .connections
            .iter()
            .map(|c| (c.addr.clone(), c.clone()))
            .collect(),
    );

    register_on_connect(&bot, &servers);
    register_reconnect(&bot, &servers, &config.reconnect);

    if config.commander.enabled {
        commander::start(&bot, config.commander.leader, vec![echo_command()]);
        info!(leader = %config.commander.leader, "Command router started");
    }

    for cfg in &config.connections {
        info!(server = %cfg.addr, "Connecting");
        bot.connect_with_pass(&cfg.addr, cfg.password.as_deref())
            .await?;
    }

    info!("Bot is running");
    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    for conn in bot.connections() {
        let _ = conn.write_message(Message::quit("shutting down")).await;
    }
    // Let the quit lines flush before the process exits.
    tokio::time::sleep(Duration::from_millis(500)).await;

    Ok(())
}

/// After registration: identify to NickServ when configured, then join
/// the configured channels.
fn register_on_connect(bot: &Bot, servers: &Arc<HashMap<String, ConnectionConfig>>) {
    let servers = Arc::clone(servers);
    bot.on_fn(EventKind::Connected, move |_event, conn, _msg| {
        let servers = Arc::clone(&servers);
        async move {
            let Some(cfg) = servers.get(conn.name()) else {
                return;
            };
            if let Some(pass) = &cfg.nickserv {
                let identify = Message::privmsg("NickServ", format!("IDENTIFY {pass}"));
                if conn.write_message(identify).await.is_err() {
                    return;
                }
            }
            if !cfg.channels.is_empty() {
                let _ = conn
                    .write_message(Message::join(cfg.channels.join(",")))
                    .await;
            }
        }
    });
}

/// After every disconnect: retry the host on an exponential backoff,
/// reset once a connection registers again.
fn register_reconnect(
    bot: &Bot,
    servers: &Arc<HashMap<String, ConnectionConfig>>,
    reconnect: &ReconnectConfig,
) {
    let backoffs: Arc<DashMap<String, Backoff>> = Arc::new(DashMap::new());

    {
        let backoffs = Arc::clone(&backoffs);
        bot.on_fn(EventKind::Connected, move |_event, conn, _msg| {
            let backoffs = Arc::clone(&backoffs);
            async move {
                backoffs.remove(conn.name());
            }
        });
    }

    let servers = Arc::clone(servers);
    let bot_handle = bot.clone();
    let reconnect = reconnect.clone();
    bot.on_fn(EventKind::Disconnected, move |_event, conn, _msg| {
        let servers = Arc::clone(&servers);
        let bot = bot_handle.clone();
        let reconnect = reconnect.clone();
        let backoffs = Arc::clone(&backoffs);
        async move {
            let name = conn.name().to_string();
            let Some(cfg) = servers.get(&name).cloned() else {
                return;
            };
            loop {
                let delay = backoffs
                    .entry(name.clone())
                    .or_insert_with(|| Backoff::new(reconnect.initial(), reconnect.max()))
                    .next();
                warn!(server = %name, delay_secs = delay.as_secs(), "reconnecting after disconnect");
                tokio::time::sleep(delay).await;

                match bot.connect_with_pass(&cfg.addr, cfg.password.as_deref()).await {
                    Ok(_) => break,
                    Err(e) => warn!(server = %name, error = %e, "reconnect failed"),
                }
            }
        }
    });
}

/// Demo command: repeat the arguments back where they came from.
fn echo_command() -> Command {
    Command::new(
        "echo",
        |_source, mut resp: Response, _name, args: Vec<String>| async move {
            resp.set_public();
            resp.write(args.join(" ")).await;
        },
    )
    .help("Echo the arguments back where they came from")
    .args(1, None)
}
