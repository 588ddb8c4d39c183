//! Request dispatch.

use crate::axfr;
use crate::keystore::KeyStore;
use crate::notify::Notifier;
use crate::update::UpdateEngine;
use crate::Protocol;
use arx_proto::tsig::{self, TsigKey, VerifiedTsig};
use arx_proto::{Message, Name, OpCode, RecordType, ResponseCode};
use arx_zone::{LookupResult, Registry};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Per-request context.
#[derive(Debug, Clone)]
pub struct QueryContext {
    /// The peer address.
    pub peer: SocketAddr,
    /// The transport the request arrived over.
    pub protocol: Protocol,
}

impl QueryContext {
    /// Creates a context.
    pub fn new(peer: SocketAddr, protocol: Protocol) -> Self {
        Self { peer, protocol }
    }
}

/// What the handler wants sent back.
#[derive(Debug)]
pub enum Response {
    /// Say nothing (malformed input).
    None,
    /// One message.
    Single(Message),
    /// A sequence of messages (AXFR envelopes, TCP only).
    Stream(Vec<Message>),
}

/// A DNS request handler.
///
/// Composed by value: the server holds exactly one handler, and
/// handlers that wrap others do so by owning them.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Handles one request. `raw` is the untouched wire message, which
    /// TSIG verification operates on.
    async fn handle(&self, query: Message, raw: &[u8], ctx: QueryContext) -> Response;
}

/// The authoritative handler: dispatches QUERY / UPDATE / AXFR /
/// NOTIFY against registry snapshots.
pub struct Authority {
    registry: Arc<Registry>,
    keys: Arc<dyn KeyStore>,
    engine: UpdateEngine,
    notifier: Arc<Notifier>,
    tsig_required: bool,
}

impl Authority {
    /// Creates the handler.
    pub fn new(
        registry: Arc<Registry>,
        keys: Arc<dyn KeyStore>,
        engine: UpdateEngine,
        notifier: Arc<Notifier>,
        tsig_required: bool,
    ) -> Self {
        Self {
            registry,
            keys,
            engine,
            notifier,
            tsig_required,
        }
    }

    fn refused(query: &Message) -> Response {
        Response::Single(Message::error_response(query, ResponseCode::Refused))
    }

    /// Verifies the request's TSIG, if it carries one.
    ///
    /// Returns the verification state and the key for signing the
    /// reply, or the rcode to refuse with.
    async fn check_tsig(
        &self,
        query: &Message,
        raw: &[u8],
    ) -> std::result::Result<Option<(VerifiedTsig, TsigKey)>, ResponseCode> {
        let Some(key_name) = query.tsig_key_name() else {
            return Ok(None);
        };
        let Some(key) = self.keys.get(key_name).await else {
            warn!(key = %key_name, "unknown TSIG key");
            return Err(ResponseCode::Refused);
        };
        match tsig::verify_message(raw, &key, None, unix_now()) {
            Ok(verified) => Ok(Some((verified, key))),
            Err(e) => {
                warn!(key = %key_name, error = %e, "TSIG verification failed");
                Err(ResponseCode::Refused)
            }
        }
    }

    /// Signs a single reply with the request's key, chaining the
    /// request MAC.
    fn sign_reply(response: &mut Message, verified: &(VerifiedTsig, TsigKey)) {
        let (state, key) = verified;
        if let Err(e) = tsig::sign_message(response, key, Some(&state.mac), unix_now()) {
            warn!(error = %e, "signing reply failed");
        }
    }

    async fn handle_query(&self, query: &Message, qname: &Name, qtype: RecordType) -> Response {
        let Some(origin) = self.registry.match_origin(qname) else {
            debug!(qname = %qname, "not authoritative");
            return Self::refused(query);
        };
        let Some(snapshot) = self.registry.snapshot(&origin) else {
            return Response::Single(Message::error_response(query, ResponseCode::ServFail));
        };

        let out = snapshot.lookup(qname, qtype);
        let mut response = Message::response_from(query);
        match out.result {
            LookupResult::Success | LookupResult::NoData => {
                response.set_authoritative(true);
            }
            LookupResult::NameError => {
                response.set_authoritative(true);
                response.set_rcode(ResponseCode::NXDomain);
            }
            LookupResult::Delegation => {
                response.set_authoritative(false);
            }
            LookupResult::ServerFailure => {
                return Response::Single(Message::error_response(query, ResponseCode::ServFail));
            }
        }
        response.add_answers(out.answer);
        response.add_authority_records(out.ns);
        for rr in out.extra {
            response.add_additional(rr);
        }
        Response::Single(response)
    }

    async fn handle_axfr(
        &self,
        query: &Message,
        qname: &Name,
        tsig_state: Option<(VerifiedTsig, TsigKey)>,
    ) -> Response {
        let Some(origin) = self.registry.match_origin(qname) else {
            return Self::refused(query);
        };
        if &origin != qname {
            // Transfers are only answered for the apex itself.
            return Self::refused(query);
        }
        let Some(snapshot) = self.registry.snapshot(&origin) else {
            return Response::Single(Message::error_response(query, ResponseCode::ServFail));
        };

        match axfr::build_envelopes(query, &snapshot) {
            Ok(mut envelopes) => {
                info!(zone = %origin, envelopes = envelopes.len(), "serving AXFR");
                if let Some((state, key)) = tsig_state {
                    axfr::sign_envelopes(&mut envelopes, &key, &state.mac, unix_now());
                }
                Response::Stream(envelopes)
            }
            Err(e) => {
                warn!(zone = %origin, error = %e, "AXFR failed");
                Response::Single(Message::error_response(query, ResponseCode::ServFail))
            }
        }
    }

    async fn handle_update(
        &self,
        query: &Message,
        ctx: &QueryContext,
        signed: bool,
    ) -> Response {
        if self.tsig_required && !signed {
            warn!(peer = %ctx.peer, "unsigned UPDATE refused");
            return Self::refused(query);
        }

        let Some(zone) = query.zone() else {
            return Response::Single(Message::error_response(query, ResponseCode::FormErr));
        };
        if query.questions().len() != 1 || zone.record_type() != Some(RecordType::SOA) {
            return Response::Single(Message::error_response(query, ResponseCode::FormErr));
        }
        let origin = zone.qname.clone();
        if self.registry.get(&origin).is_none() {
            debug!(zone = %origin, "update for unknown zone");
            return Self::refused(query);
        }

        let outcome = self.engine.process(&origin, query).await;
        info!(
            zone = %origin,
            peer = %ctx.peer,
            rcode = %outcome.rcode,
            "dynamic update"
        );

        if outcome.rcode == ResponseCode::NoError {
            // NOTIFY is best-effort and must not delay the reply.
            let notifier = self.notifier.clone();
            let registry = self.registry.clone();
            let zone = origin.clone();
            tokio::spawn(async move {
                if let Some(snapshot) = registry.snapshot(&zone) {
                    notifier.notify(&zone, &snapshot).await;
                }
            });
        }

        let mut response = Message::response_from(query);
        response.set_authoritative(true);
        response.set_rcode(outcome.rcode);
        Response::Single(response)
    }
}

#[async_trait]
impl Handler for Authority {
    async fn handle(&self, query: Message, raw: &[u8], ctx: QueryContext) -> Response {
        // NOTIFY from a peer: nothing to learn as a primary; ack it.
        if query.opcode() == OpCode::Notify {
            let qname = query.question().map(|q| q.qname.to_string()).unwrap_or_default();
            info!(peer = %ctx.peer, zone = %qname, "dropping NOTIFY");
            let mut response = Message::response_from(&query);
            response.set_rcode(ResponseCode::NoError);
            return Response::Single(response);
        }

        let Some(question) = query.question().cloned() else {
            return Response::Single(Message::error_response(&query, ResponseCode::FormErr));
        };

        let tsig_state = match self.check_tsig(&query, raw).await {
            Ok(state) => state,
            Err(rcode) => {
                return Response::Single(Message::error_response(&query, rcode));
            }
        };
        let signed = tsig_state.is_some();

        let mut response = match query.opcode() {
            OpCode::Query => match question.record_type() {
                Some(qtype) if qtype.is_transfer() => {
                    if ctx.protocol != Protocol::Tcp {
                        debug!(peer = %ctx.peer, "transfer over UDP refused");
                        Self::refused(&query)
                    } else {
                        // IXFR collapses to a full transfer.
                        return self.handle_axfr(&query, &question.qname, tsig_state).await;
                    }
                }
                Some(qtype) => self.handle_query(&query, &question.qname, qtype).await,
                None => Response::Single(Message::error_response(
                    &query,
                    ResponseCode::NotImp,
                )),
            },
            OpCode::Update => self.handle_update(&query, &ctx, signed).await,
            OpCode::Status | OpCode::Notify => {
                Response::Single(Message::error_response(&query, ResponseCode::NotImp))
            }
        };

        if let (Response::Single(message), Some(state)) = (&mut response, &tsig_state) {
            Self::sign_reply(message, state);
        }
        response
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
