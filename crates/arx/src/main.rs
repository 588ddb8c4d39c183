//! arx: authoritative DNS with dynamic updates and a durable change log.

mod config;
mod source;

use anyhow::Context;
use arx_server::{Authority, Notifier, Server, ServerConfig, StaticKeyStore, UpdateEngine};
use arx_zone::{NullSink, Registry, RegistryConfig};
use clap::{Parser, Subcommand};
use config::Config;
use source::FileSource;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Authoritative DNS server with RFC 2136 dynamic updates.
#[derive(Parser, Debug)]
#[command(name = "arx", version, about)]
struct Cli {
    /// Configuration file.
    #[arg(short, long, global = true, value_name = "FILE", default_value = "arx.yaml")]
    config: PathBuf,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(short = 'l', long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the server (default).
    Run,
    /// Check the configuration and zone files, then exit.
    Validate,
}

fn init_logging(config: &Config, override_level: Option<&str>) {
    let level = override_level
        .unwrap_or(&config.logging.level)
        .parse::<Level>()
        .unwrap_or(Level::INFO);
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    match config.logging.format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true))
            .init(),
        _ => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::from_file(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    init_logging(&config, cli.log_level.as_deref());

    match cli.command.unwrap_or(Command::Run) {
        Command::Validate => validate(&config),
        Command::Run => tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("building runtime")?
            .block_on(run(config)),
    }
}

fn validate(config: &Config) -> anyhow::Result<()> {
    config.validate()?;
    for zone in &config.zones {
        let path = zone.resolved_path(&config.zone_dir);
        let origin = zone.origin.parse().map_err(anyhow::Error::msg)?;
        arx_zone::Parser::new(origin)
            .parse_file(&path)
            .with_context(|| format!("zone {} in {}", zone.origin, path.display()))?;
        println!("zone {} ok ({})", zone.origin, path.display());
    }
    println!("configuration ok");
    Ok(())
}

async fn run(config: Config) -> anyhow::Result<()> {
    let registry = Arc::new(Registry::new(RegistryConfig {
        change_log_dir: config.change_log_dir.clone(),
        segment_max_store_bytes: config.segment_max_store_bytes,
    }));

    let mut keys = StaticKeyStore::new();
    for key in &config.tsig_keys {
        keys.insert(key.to_key()?);
    }
    info!(keys = keys.len(), zones = config.zones.len(), "starting");

    let notifier = Arc::new(Notifier::new(config.notify_peers.clone()));
    let source = FileSource::new(&config, registry.clone(), notifier.clone())?;
    source.load_initial().context("loading zones")?;

    // Announce freshly loaded zones to the secondaries.
    for origin in registry.origins() {
        if let Some(snapshot) = registry.snapshot(&origin) {
            notifier.notify(&origin, &snapshot).await;
        }
    }

    let engine = UpdateEngine::new(registry.clone(), Arc::new(NullSink));
    let handler = Arc::new(Authority::new(
        registry.clone(),
        Arc::new(keys),
        engine,
        notifier.clone(),
        config.tsig_required,
    ));

    let server = Server::bind(
        ServerConfig {
            bind_addr: config.bind_addr,
            ..ServerConfig::default()
        },
        handler,
    )
    .await
    .with_context(|| format!("binding {}", config.bind_addr))?;
    let shutdown = server.shutdown_handle();

    // The registry event loop, fed by the reload ticker when enabled.
    let (events_tx, events_rx) = mpsc::channel(64);
    let registry_shutdown = shutdown.subscribe();
    let registry_task = tokio::spawn(registry.clone().run(events_rx, registry_shutdown));
    if let Some(interval) = config.reload_interval() {
        source.spawn_reload(interval, events_tx);
    }

    tokio::spawn(wait_for_signal(shutdown.clone()));

    let result = server.run().await;
    if let Err(e) = &result {
        error!(error = %e, "server exited with error");
    }
    let _ = shutdown.send(());
    let _ = registry_task.await;

    // Flush change logs before exit.
    for origin in registry.origins() {
        if let Some(pair) = registry.get(&origin) {
            if let Some(log) = &pair.log {
                if let Err(e) = log.close() {
                    warn!(zone = %origin, error = %e, "closing change log");
                }
            }
        }
    }
    info!("bye");
    Ok(result?)
}

async fn wait_for_signal(shutdown: broadcast::Sender<()>) {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!(error = %e, "installing SIGTERM handler");
                let _ = ctrl_c.await;
                let _ = shutdown.send(());
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => info!("interrupt received"),
            _ = sigterm.recv() => info!("SIGTERM received"),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        info!("interrupt received");
    }
    let _ = shutdown.send(());
}
