//! Outbound NOTIFY (RFC 1996).

use arx_proto::{Header, Message, Name, OpCode, Question, RecordClass, RecordType};
use arx_zone::Zone;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Sends NOTIFY messages to configured peers after a zone changes.
/// Dispatch is fire-and-forget; failures are logged and never affect
/// the triggering request.
#[derive(Debug)]
pub struct Notifier {
    peers: Vec<SocketAddr>,
}

impl Notifier {
    /// Creates a notifier for a fixed peer set.
    pub fn new(peers: Vec<SocketAddr>) -> Self {
        Self { peers }
    }

    /// Sends a NOTIFY for `origin` to every peer, carrying the current
    /// SOA so receivers can short-circuit refreshes.
    pub async fn notify(&self, origin: &Name, zone: &Zone) {
        if self.peers.is_empty() {
            return;
        }
        let Ok(soa) = zone.apex_soa() else {
            warn!(zone = %origin, "no SOA to notify with");
            return;
        };

        let socket = match UdpSocket::bind("0.0.0.0:0").await {
            Ok(socket) => socket,
            Err(e) => {
                warn!(error = %e, "binding notify socket");
                return;
            }
        };

        let mut header = Header::new(message_id());
        header.opcode = OpCode::Notify;
        header.set_authoritative(true);
        let mut message = Message::new(header);
        message.add_question(Question::new(
            origin.clone(),
            RecordType::SOA,
            RecordClass::IN,
        ));
        message.add_answer(soa);
        let wire = message.to_wire();

        for peer in &self.peers {
            match socket.send_to(&wire, peer).await {
                Ok(_) => debug!(zone = %origin, peer = %peer, "sent NOTIFY"),
                Err(e) => warn!(zone = %origin, peer = %peer, error = %e, "sending NOTIFY"),
            }
        }
    }
}

fn message_id() -> u16 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u16)
        .unwrap_or(0)
}
