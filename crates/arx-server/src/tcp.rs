//! The TCP listener.

use crate::handler::{Handler, QueryContext, Response};
use crate::{Inflight, Protocol, Result, ServerError};
use arx_proto::Message;
use bytes::Bytes;
use socket2::{Domain, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, error, info, trace};

/// TCP front: accepts connections and handles each on its own task.
pub struct TcpListener {
    listener: tokio::net::TcpListener,
    handler: Arc<dyn Handler>,
    idle_timeout: Duration,
    request_timeout: Duration,
    local_addr: SocketAddr,
    inflight: Inflight,
}

impl TcpListener {
    /// Binds the TCP socket.
    pub async fn bind(
        addr: SocketAddr,
        handler: Arc<dyn Handler>,
        idle_timeout: Duration,
        request_timeout: Duration,
        inflight: Inflight,
    ) -> Result<Self> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::STREAM, None)?;
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(1024)?;

        let std_listener: std::net::TcpListener = socket.into();
        let listener = tokio::net::TcpListener::from_std(std_listener)?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "TCP listener bound");

        Ok(Self {
            listener,
            handler,
            idle_timeout,
            request_timeout,
            local_addr,
            inflight,
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until the task is cancelled.
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let handler = self.handler.clone();
                    let idle = self.idle_timeout;
                    let per_request = self.request_timeout;
                    let inflight = self.inflight.clone();
                    tokio::spawn(async move {
                        let _guard = inflight.enter();
                        if let Err(e) =
                            serve_connection(stream, peer, handler, idle, per_request).await
                        {
                            debug!(peer = %peer, error = %e, "TCP connection ended");
                        }
                    });
                }
                Err(e) => {
                    error!(error = %e, "TCP accept failed");
                }
            }
        }
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    handler: Arc<dyn Handler>,
    idle_timeout: Duration,
    request_timeout: Duration,
) -> Result<()> {
    trace!(peer = %peer, "TCP connection opened");
    loop {
        let data = match timeout(idle_timeout, read_frame(&mut stream)).await {
            Ok(Ok(data)) => data,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                trace!(peer = %peer, "TCP connection closed by peer");
                return Ok(());
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                trace!(peer = %peer, "TCP idle timeout");
                return Ok(());
            }
        };

        let query = match Message::parse(&data) {
            Ok(query) => query,
            Err(e) => {
                debug!(peer = %peer, error = %e, "unparseable TCP message; closing");
                return Ok(());
            }
        };

        let ctx = QueryContext::new(peer, Protocol::Tcp);
        let response = handler.handle(query, &data, ctx).await;
        let messages: Vec<Message> = match response {
            Response::Single(message) => vec![message],
            Response::Stream(messages) => messages,
            Response::None => return Ok(()),
        };

        for message in messages {
            let wire = message.to_wire();
            timeout(request_timeout, write_frame(&mut stream, &wire))
                .await
                .map_err(|_| ServerError::Timeout)??;
        }
    }
}

/// Reads one 2-byte-length-prefixed DNS message.
async fn read_frame(stream: &mut TcpStream) -> std::io::Result<Bytes> {
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await?;
    let len = u16::from_be_bytes(len_buf) as usize;
    if len == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "zero-length TCP message",
        ));
    }
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    Ok(Bytes::from(buf))
}

/// Writes one 2-byte-length-prefixed DNS message.
async fn write_frame(stream: &mut TcpStream, data: &[u8]) -> std::io::Result<()> {
    stream.write_all(&(data.len() as u16).to_be_bytes()).await?;
    stream.write_all(data).await?;
    stream.flush().await
}
