//! The UDP listener.

use crate::handler::{Handler, QueryContext, Response};
use crate::{Inflight, Protocol, Result};
use arx_proto::Message;
use bytes::Bytes;
use socket2::{Domain, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tracing::{debug, error, info, trace};

/// UDP front: one socket shared by a pool of receiver tasks, each
/// dispatching packets inline.
pub struct UdpListener {
    socket: Arc<UdpSocket>,
    handler: Arc<dyn Handler>,
    receivers: usize,
    local_addr: SocketAddr,
    inflight: Inflight,
}

impl UdpListener {
    /// Binds the UDP socket.
    pub async fn bind(
        addr: SocketAddr,
        handler: Arc<dyn Handler>,
        receivers: usize,
        inflight: Inflight,
    ) -> Result<Self> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };
        let socket = Socket::new(domain, Type::DGRAM, None)?;
        socket.set_reuse_address(true)?;
        #[cfg(unix)]
        socket.set_reuse_port(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;

        let std_socket: std::net::UdpSocket = socket.into();
        let socket = UdpSocket::from_std(std_socket)?;
        let local_addr = socket.local_addr()?;
        info!(addr = %local_addr, "UDP listener bound");

        Ok(Self {
            socket: Arc::new(socket),
            handler,
            receivers: receivers.max(1),
            local_addr,
            inflight,
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until the future is dropped; the receiver pool aborts
    /// with it, while already-dispatched packets finish on their own
    /// tasks and are drained by the server's shutdown grace period.
    pub async fn run(&self) -> Result<()> {
        let mut receivers = tokio::task::JoinSet::new();
        for _ in 0..self.receivers {
            let socket = self.socket.clone();
            let handler = self.handler.clone();
            let inflight = self.inflight.clone();
            receivers.spawn(receive_loop(socket, handler, inflight));
        }
        while let Some(result) = receivers.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "UDP receiver task failed");
            }
        }
        Ok(())
    }
}

async fn receive_loop(socket: Arc<UdpSocket>, handler: Arc<dyn Handler>, inflight: Inflight) {
    let mut buf = vec![0u8; 65535];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, peer)) => {
                let guard = inflight.enter();
                let data = Bytes::copy_from_slice(&buf[..len]);
                let socket = socket.clone();
                let handler = handler.clone();
                tokio::spawn(async move {
                    let _guard = guard;
                    if let Err(e) = serve_packet(&socket, &handler, data, peer).await {
                        debug!(peer = %peer, error = %e, "UDP request failed");
                    }
                });
            }
            Err(e) => {
                error!(error = %e, "UDP receive failed");
            }
        }
    }
}

async fn serve_packet(
    socket: &UdpSocket,
    handler: &Arc<dyn Handler>,
    data: Bytes,
    peer: SocketAddr,
) -> Result<()> {
    let query = match Message::parse(&data) {
        Ok(query) => query,
        Err(e) => {
            // Malformed datagrams are dropped, not answered.
            trace!(peer = %peer, error = %e, "unparseable UDP packet");
            return Ok(());
        }
    };
    // 4096 with EDNS0, 512 without; never more than our own cap.
    let max_size = query
        .max_udp_payload()
        .min(arx_proto::EDNS_UDP_SIZE as usize);

    let ctx = QueryContext::new(peer, Protocol::Udp);
    match handler.handle(query, &data, ctx).await {
        Response::Single(mut response) => {
            if response.wire_len() > max_size {
                response.truncate_to(max_size);
            }
            socket.send_to(&response.to_wire(), peer).await?;
        }
        Response::Stream(_) => {
            // Streams are TCP-only; handlers never produce one here.
            debug!(peer = %peer, "dropping stream response on UDP");
        }
        Response::None => {}
    }
    Ok(())
}
