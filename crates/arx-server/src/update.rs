//! The RFC 2136 update engine.
//!
//! Processing walks AUTHORIZE → VALIDATE → APPLY → BUMP_SOA → PERSIST
//! → NOTIFY. Authorization (TSIG, zone match) happens in the handler;
//! this module owns everything from validation on. Validation inspects
//! every update RR before anything mutates, so refused and
//! not-implemented updates leave no partial effect. A failure inside
//! APPLY aborts with SERVFAIL and is not rolled back; the caller
//! reconciles against the published dynamic set.

use arx_changelog::{ChangeKind, ChangeRecord};
use arx_proto::{Message, Name, RecordClass, RecordType, ResourceRecord, ResponseCode};
use arx_zone::{Registry, ZoneSink};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

/// Record types accepted in update sections. Everything else is
/// refused outright, NS and SOA included: the control plane owns the
/// zone skeleton.
const ALLOWED_TYPES: [RecordType; 5] = [
    RecordType::A,
    RecordType::AAAA,
    RecordType::CNAME,
    RecordType::TXT,
    RecordType::SRV,
];

/// Classification of one update RR by its class field (RFC 2136
/// section 2.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UpdateOp {
    /// class IN: add the record.
    Insert,
    /// class NONE: delete the exact record.
    Remove,
    /// class ANY, type ANY: delete every record at the name (reserved).
    RemoveName,
    /// class ANY, other type: delete the rrset (reserved).
    RemoveRrset,
}

fn classify(rr: &ResourceRecord) -> Option<UpdateOp> {
    match rr.rclass().as_known()? {
        RecordClass::IN => Some(UpdateOp::Insert),
        RecordClass::NONE => Some(UpdateOp::Remove),
        RecordClass::ANY => {
            if rr.record_type() == Some(RecordType::ANY) {
                Some(UpdateOp::RemoveName)
            } else {
                Some(UpdateOp::RemoveRrset)
            }
        }
        _ => None,
    }
}

/// The outcome of one update message.
#[derive(Debug, Clone, Copy)]
pub struct UpdateOutcome {
    /// The rcode for the reply.
    pub rcode: ResponseCode,
    /// The zone's new serial, when anything was applied.
    pub serial: Option<u32>,
}

impl UpdateOutcome {
    fn failed(rcode: ResponseCode) -> Self {
        Self {
            rcode,
            serial: None,
        }
    }
}

/// Applies verified update messages to dynamic zones.
pub struct UpdateEngine {
    registry: Arc<Registry>,
    sink: Arc<dyn ZoneSink>,
}

impl UpdateEngine {
    /// Creates the engine.
    pub fn new(registry: Arc<Registry>, sink: Arc<dyn ZoneSink>) -> Self {
        Self { registry, sink }
    }

    /// Processes one update message against a matched origin. The
    /// caller has already authorized the message and confirmed the
    /// origin exists.
    pub async fn process(&self, origin: &Name, message: &Message) -> UpdateOutcome {
        let Some(pair) = self.registry.get(origin) else {
            return UpdateOutcome::failed(ResponseCode::Refused);
        };

        // VALIDATE: the whole update section is checked before any
        // mutation, so rejections leave the zone untouched.
        let mut ops: Vec<(UpdateOp, &ResourceRecord)> = Vec::new();
        for rr in message.updates() {
            match rr.record_type() {
                Some(rtype) if ALLOWED_TYPES.contains(&rtype) => {}
                Some(RecordType::ANY) if rr.rclass().as_known() == Some(RecordClass::ANY) => {
                    // delete-name carries type ANY; classified below.
                }
                other => {
                    debug!(zone = %origin, rtype = ?other, "type not allowed in updates");
                    return UpdateOutcome::failed(ResponseCode::Refused);
                }
            }
            match classify(rr) {
                Some(UpdateOp::Insert) => ops.push((UpdateOp::Insert, rr)),
                Some(UpdateOp::Remove) => ops.push((UpdateOp::Remove, rr)),
                Some(UpdateOp::RemoveName) | Some(UpdateOp::RemoveRrset) => {
                    debug!(zone = %origin, name = %rr.name(), "reserved update class");
                    return UpdateOutcome::failed(ResponseCode::NotImp);
                }
                None => {
                    debug!(zone = %origin, class = %rr.rclass(), "unclassifiable update RR");
                    return UpdateOutcome::failed(ResponseCode::NotImp);
                }
            }
        }

        // The static SOA is the serial/timer template when the dynamic
        // zone has not bumped yet; read it before taking the writer
        // lock so no two zone locks are ever held together here.
        let static_soa = pair.static_zone.read().apex_soa().ok();

        // APPLY + BUMP_SOA under the dynamic writer lock. All work in
        // this block is CPU-bound tree mutation.
        let mut applied: Vec<(ChangeKind, ResourceRecord)> = Vec::with_capacity(ops.len());
        let new_serial = {
            let mut dynamic = pair.dynamic_zone.write();
            for (op, rr) in ops {
                match op {
                    UpdateOp::Insert => {
                        if let Err(e) = dynamic.insert((*rr).clone()) {
                            warn!(zone = %origin, rr = %rr, error = %e, "insert failed");
                            return UpdateOutcome::failed(ResponseCode::ServFail);
                        }
                        applied.push((ChangeKind::Insert, (*rr).clone()));
                    }
                    UpdateOp::Remove => {
                        dynamic.delete(rr);
                        applied.push((ChangeKind::Remove, (*rr).clone()));
                    }
                    UpdateOp::RemoveName | UpdateOp::RemoveRrset => unreachable!("rejected above"),
                }
            }

            let template = dynamic.apex_soa().ok().or(static_soa);
            let Some(template) = template else {
                warn!(zone = %origin, "no SOA anywhere; cannot bump serial");
                return UpdateOutcome::failed(ResponseCode::ServFail);
            };
            let Some(current) = template.rdata().as_soa() else {
                return UpdateOutcome::failed(ResponseCode::ServFail);
            };

            let new_serial = next_serial(current.serial, unix_millis());
            let mut bumped = current.clone();
            bumped.serial = new_serial;
            let soa_rr = ResourceRecord::soa(origin.clone(), template.ttl(), bumped);
            if let Err(e) = dynamic.insert(soa_rr) {
                warn!(zone = %origin, error = %e, "SOA bump failed");
                return UpdateOutcome::failed(ResponseCode::ServFail);
            }
            new_serial
        };

        // PERSIST: change-log appends happen outside the zone lock and
        // must be durable before the reply.
        for (kind, rr) in &applied {
            let record = ChangeRecord::new(origin, rr, *kind);
            if let Err(e) = self.registry.append_change(origin, &record) {
                warn!(zone = %origin, error = %e, "change log append failed");
                return UpdateOutcome::failed(ResponseCode::ServFail);
            }
        }

        // Publish the full dynamic record set upstream.
        let records: Vec<ResourceRecord> = {
            let dynamic = pair.dynamic_zone.read();
            dynamic.records().cloned().collect()
        };
        if let Err(e) = self.sink.publish(origin, new_serial, records).await {
            warn!(zone = %origin, error = %e, "publishing dynamic set failed");
            return UpdateOutcome::failed(ResponseCode::ServFail);
        }

        UpdateOutcome {
            rcode: ResponseCode::NoError,
            serial: Some(new_serial),
        }
    }
}

/// The serial bump rule: strictly above the current serial, and at
/// least the wall clock in milliseconds truncated to 32 bits, so
/// serials keep moving even when the clock regresses.
fn next_serial(current: u32, unix_ms: u64) -> u32 {
    current.wrapping_add(1).max(unix_ms as u32)
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arx_proto::{Class, Message, RData, Type};
    use arx_zone::{NullSink, RegistryConfig, ZoneEvent};
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    const ZONE_TEXT: &str = r#"
@ 3600 IN SOA ns.dns.example.org. hostmaster.example.org. 100 7200 1800 86400 30
@ IN NS ns1.example.org.
vpn IN A 216.146.45.240
"#;

    fn origin() -> Name {
        Name::from_str("example.org.").unwrap()
    }

    fn engine() -> (Arc<Registry>, UpdateEngine) {
        let registry = Arc::new(Registry::new(RegistryConfig::default()));
        registry
            .apply(ZoneEvent::Upsert {
                origin: origin(),
                zone_text: ZONE_TEXT.to_string(),
                dynamic: Vec::new(),
            })
            .unwrap();
        let engine = UpdateEngine::new(registry.clone(), Arc::new(NullSink));
        (registry, engine)
    }

    fn insert_update(rr: ResourceRecord) -> Message {
        let mut msg = Message::update(1, origin());
        msg.add_update(rr);
        msg
    }

    #[tokio::test]
    async fn insert_and_query_via_snapshot() {
        let (registry, engine) = engine();
        let rr = ResourceRecord::a(
            Name::from_str("new.example.org.").unwrap(),
            3600,
            Ipv4Addr::new(127, 0, 0, 1),
        );

        let outcome = engine.process(&origin(), &insert_update(rr)).await;
        assert_eq!(outcome.rcode, ResponseCode::NoError);
        let serial = outcome.serial.unwrap();
        assert!(serial > 100);

        let snapshot = registry.snapshot(&origin()).unwrap();
        assert_eq!(snapshot.serial(), Some(serial));
        let out = snapshot.lookup(&Name::from_str("new.example.org.").unwrap(), RecordType::A);
        assert_eq!(out.answer.len(), 1);
    }

    #[tokio::test]
    async fn allowed_type_sweep_then_ns_refused() {
        let (registry, engine) = engine();
        let name = |label: &str| Name::from_str(&format!("{label}.example.org.")).unwrap();

        let updates = vec![
            ResourceRecord::a(name("a"), 60, Ipv4Addr::new(10, 0, 0, 1)),
            ResourceRecord::aaaa(name("b"), 60, "2001:db8::1".parse().unwrap()),
            ResourceRecord::cname(name("c"), 60, name("a")),
            ResourceRecord::txt(name("d"), 60, "hello"),
            ResourceRecord::srv(
                name("e"),
                60,
                arx_proto::rdata::Srv::new(1, 2, 3, name("a")),
            ),
        ];
        for rr in updates {
            let outcome = engine.process(&origin(), &insert_update(rr)).await;
            assert_eq!(outcome.rcode, ResponseCode::NoError);
        }

        let ns = ResourceRecord::ns(name("foo"), 60, Name::from_str("ns1.example.org.").unwrap());
        let outcome = engine.process(&origin(), &insert_update(ns)).await;
        assert_eq!(outcome.rcode, ResponseCode::Refused);

        // The five prior inserts are still visible.
        let snapshot = registry.snapshot(&origin()).unwrap();
        for label in ["a", "b", "c", "d", "e"] {
            assert!(snapshot.node(&name(label)).is_some(), "{label} missing");
        }
    }

    #[tokio::test]
    async fn refused_update_mutates_nothing() {
        let (registry, engine) = engine();
        let before = registry.snapshot(&origin()).unwrap().serial();

        let mut msg = Message::update(3, origin());
        msg.add_update(ResourceRecord::a(
            Name::from_str("ok.example.org.").unwrap(),
            60,
            Ipv4Addr::new(10, 0, 0, 7),
        ));
        msg.add_update(ResourceRecord::ns(
            Name::from_str("bad.example.org.").unwrap(),
            60,
            Name::from_str("ns1.example.org.").unwrap(),
        ));

        let outcome = engine.process(&origin(), &msg).await;
        assert_eq!(outcome.rcode, ResponseCode::Refused);

        let snapshot = registry.snapshot(&origin()).unwrap();
        assert_eq!(snapshot.serial(), before);
        assert!(snapshot
            .node(&Name::from_str("ok.example.org.").unwrap())
            .is_none());
    }

    #[tokio::test]
    async fn remove_bumps_serial() {
        let (registry, engine) = engine();
        // Shadow the static record dynamically, then remove it again.
        let vpn = ResourceRecord::a(
            Name::from_str("vpn.example.org.").unwrap(),
            3600,
            Ipv4Addr::new(216, 146, 45, 240),
        );
        engine.process(&origin(), &insert_update(vpn.clone())).await;
        let s1 = registry.snapshot(&origin()).unwrap().serial().unwrap();

        let remove = ResourceRecord::new(
            vpn.name().clone(),
            Type::Known(RecordType::A),
            Class::Known(RecordClass::NONE),
            0,
            vpn.rdata().clone(),
        );
        let outcome = engine.process(&origin(), &insert_update(remove)).await;
        assert_eq!(outcome.rcode, ResponseCode::NoError);
        let s2 = outcome.serial.unwrap();
        assert!(s2 > s1, "serial must keep increasing ({s1} -> {s2})");
    }

    #[tokio::test]
    async fn remove_name_is_reserved() {
        let (_, engine) = engine();
        let mut msg = Message::update(4, origin());
        msg.add_update(arx_proto::message::empty_rr(
            Name::from_str("vpn.example.org.").unwrap(),
            RecordType::ANY,
            RecordClass::ANY,
        ));
        let outcome = engine.process(&origin(), &msg).await;
        assert_eq!(outcome.rcode, ResponseCode::NotImp);
    }

    #[test]
    fn serial_rule() {
        // Clock ahead: adopt it.
        assert_eq!(next_serial(100, 5_000), 5_000);
        // Clock behind: strictly increment.
        let now = 1_000u64;
        assert_eq!(next_serial(50_000, now), 50_001);
    }

    #[test]
    fn classify_table() {
        let name = Name::from_str("x.example.org.").unwrap();
        let insert = ResourceRecord::a(name.clone(), 60, Ipv4Addr::LOCALHOST);
        assert_eq!(classify(&insert), Some(UpdateOp::Insert));

        let remove = ResourceRecord::new(
            name.clone(),
            Type::Known(RecordType::A),
            Class::Known(RecordClass::NONE),
            0,
            RData::Empty(1),
        );
        assert_eq!(classify(&remove), Some(UpdateOp::Remove));

        let remove_name =
            arx_proto::message::empty_rr(name.clone(), RecordType::ANY, RecordClass::ANY);
        assert_eq!(classify(&remove_name), Some(UpdateOp::RemoveName));

        let remove_rrset = arx_proto::message::empty_rr(name.clone(), RecordType::A, RecordClass::ANY);
        assert_eq!(classify(&remove_rrset), Some(UpdateOp::RemoveRrset));

        let weird = ResourceRecord::new(
            name,
            Type::Known(RecordType::A),
            Class::Unknown(42),
            0,
            RData::Empty(1),
        );
        assert_eq!(classify(&weird), None);
    }
}
