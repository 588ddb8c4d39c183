//! # arx DNS front-end
//!
//! UDP and TCP listeners, opcode dispatch, TSIG enforcement, the
//! RFC 2136 update engine, AXFR streaming, and NOTIFY fan-out. The
//! server owns no zone state; it serves snapshots produced by the
//! [`arx_zone::Registry`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod axfr;
pub mod handler;
pub mod keystore;
pub mod notify;
pub mod tcp;
pub mod udp;
pub mod update;

pub use handler::{Authority, Handler, QueryContext, Response};
pub use keystore::{KeyStore, StaticKeyStore};
pub use notify::Notifier;
pub use update::UpdateEngine;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Counter of requests currently being handled, used to drain
/// in-flight work at shutdown.
#[derive(Debug, Clone, Default)]
pub(crate) struct Inflight(Arc<AtomicUsize>);

impl Inflight {
    pub(crate) fn enter(&self) -> InflightGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        InflightGuard(self.0.clone())
    }

    pub(crate) fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub(crate) struct InflightGuard(Arc<AtomicUsize>);

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket setup or I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The peer stalled past the request deadline.
    #[error("request timed out")]
    Timeout,

    /// Shutdown was signalled.
    #[error("shutting down")]
    Shutdown,
}

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Transport a request arrived over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Plain UDP.
    Udp,
    /// Plain TCP.
    Tcp,
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Udp => "udp",
            Self::Tcp => "tcp",
        })
    }
}

/// Front-end configuration. Constructed by the caller and injected;
/// there is no global configuration state.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address both listeners bind.
    pub bind_addr: SocketAddr,
    /// Per-request read/write deadline.
    pub request_timeout: Duration,
    /// TCP idle-connection timeout.
    pub idle_timeout: Duration,
    /// Grace period for in-flight handlers at shutdown.
    pub shutdown_timeout: Duration,
    /// Number of UDP receiver tasks sharing the socket.
    pub udp_receivers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:53".parse().expect("static addr"),
            request_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(10),
            shutdown_timeout: Duration::from_secs(5),
            udp_receivers: 4,
        }
    }
}

/// The DNS server: one UDP and one TCP listener sharing a handler.
///
/// Binding and serving are separate so callers can learn the bound
/// address (ephemeral ports in tests) before traffic starts.
pub struct Server {
    udp: udp::UdpListener,
    tcp: tcp::TcpListener,
    local_addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_timeout: Duration,
    inflight: Inflight,
}

impl Server {
    /// Binds both listeners.
    pub async fn bind(config: ServerConfig, handler: Arc<dyn Handler>) -> Result<Self> {
        let inflight = Inflight::default();
        let udp = udp::UdpListener::bind(
            config.bind_addr,
            handler.clone(),
            config.udp_receivers,
            inflight.clone(),
        )
        .await?;
        // TCP follows the UDP socket so an ephemeral port lands on the
        // same number for both transports.
        let local_addr = udp.local_addr();
        let tcp = tcp::TcpListener::bind(
            local_addr,
            handler,
            config.idle_timeout,
            config.request_timeout,
            inflight.clone(),
        )
        .await?;

        let (shutdown_tx, _) = broadcast::channel(1);
        Ok(Self {
            udp,
            tcp,
            local_addr,
            shutdown_tx,
            shutdown_timeout: config.shutdown_timeout,
            inflight,
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns a sender that triggers graceful shutdown.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Serves until shutdown is signalled. In-flight handlers get the
    /// configured grace period to drain after the sockets close.
    pub async fn run(self) -> Result<()> {
        info!(addr = %self.local_addr, "arx serving");

        let mut udp_shutdown = self.shutdown_tx.subscribe();
        let mut tcp_shutdown = self.shutdown_tx.subscribe();
        let udp = self.udp;
        let tcp = self.tcp;
        let udp_task = tokio::spawn(async move {
            tokio::select! {
                result = udp.run() => result,
                _ = udp_shutdown.recv() => Ok(()),
            }
        });
        let tcp_task = tokio::spawn(async move {
            tokio::select! {
                result = tcp.run() => result,
                _ = tcp_shutdown.recv() => Ok(()),
            }
        });

        for task in [udp_task, tcp_task] {
            match task.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!(error = %e, "listener failed"),
                Err(e) => error!(error = %e, "listener task panicked"),
            }
        }

        // Sockets are closed; drain in-flight handlers under the
        // shutdown deadline.
        let deadline = Instant::now() + self.shutdown_timeout;
        while self.inflight.count() > 0 {
            if Instant::now() >= deadline {
                warn!(inflight = self.inflight.count(), "shutdown deadline reached");
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Ok(())
    }
}
