//! The zone registry: origin → (static zone, dynamic zone, change log).

use crate::store::Zone;
use crate::zonefile::parse_zone;
use crate::{Result, ZoneError};
use arc_swap::ArcSwap;
use arx_changelog::{ChangeRecord, Config as LogConfig, Log, SegmentConfig};
use arx_proto::{Name, ResourceRecord};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// An event from the zone source.
#[derive(Debug, Clone)]
pub enum ZoneEvent {
    /// A zone appeared or was re-published.
    Upsert {
        /// The zone origin.
        origin: Name,
        /// Master-file text of the static zone.
        zone_text: String,
        /// Dynamic records to seed a newly created dynamic zone with
        /// (the source restores dynamic state across restarts).
        dynamic: Vec<ResourceRecord>,
    },
    /// A zone was retracted.
    Delete {
        /// The zone origin.
        origin: Name,
    },
}

/// A stream of zone events driving the registry.
#[async_trait]
pub trait ZoneSource: Send {
    /// Waits for the next event; `None` ends the stream.
    async fn next_event(&mut self) -> Option<ZoneEvent>;
}

#[async_trait]
impl ZoneSource for mpsc::Receiver<ZoneEvent> {
    async fn next_event(&mut self) -> Option<ZoneEvent> {
        self.recv().await
    }
}

/// Error type for [`ZoneSink`] implementations.
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Upstream consumer of dynamic zone state. After every accepted
/// update, the engine pushes the zone's full dynamic record set here.
#[async_trait]
pub trait ZoneSink: Send + Sync {
    /// Publishes the current dynamic record set of `origin`.
    async fn publish(
        &self,
        origin: &Name,
        serial: u32,
        records: Vec<ResourceRecord>,
    ) -> std::result::Result<(), SinkError>;
}

/// A sink that drops everything, for deployments with no control plane.
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait]
impl ZoneSink for NullSink {
    async fn publish(
        &self,
        _origin: &Name,
        _serial: u32,
        _records: Vec<ResourceRecord>,
    ) -> std::result::Result<(), SinkError> {
        Ok(())
    }
}

/// One origin's zones. The static zone mirrors the source; the dynamic
/// zone accumulates RFC 2136 updates and carries the bumped SOA.
///
/// Locking discipline: writers hold a zone's lock only for CPU-bound
/// tree mutation; no lock is held across I/O or `.await`, and no zone
/// lock may be held while calling back into the [`Registry`].
#[derive(Debug)]
pub struct ZonePair {
    /// The zone parsed from the source's master-file text.
    pub static_zone: RwLock<Zone>,
    /// The zone accumulated from dynamic updates.
    pub dynamic_zone: RwLock<Zone>,
    /// The durable mutation log, when change logging is configured.
    pub log: Option<Log>,
}

/// Registry construction options.
#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// Root directory for per-zone change logs; `None` disables
    /// change logging.
    pub change_log_dir: Option<PathBuf>,
    /// Soft cap on change-log store segments, bytes (0 = default).
    pub segment_max_store_bytes: u64,
}

#[derive(Default)]
struct RegistryMap {
    zones: HashMap<Name, Arc<ZonePair>>,
    names: Vec<Name>,
}

/// The named collection of zone pairs.
///
/// The map is read-copy-update: readers load a consistent snapshot
/// with no locking, while [`Registry::apply`] clones, mutates, and
/// publishes a new map. `apply` is additionally serialized against
/// itself, normally by being called only from [`Registry::run`].
pub struct Registry {
    map: ArcSwap<RegistryMap>,
    apply_lock: Mutex<()>,
    config: RegistryConfig,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            map: ArcSwap::from_pointee(RegistryMap::default()),
            apply_lock: Mutex::new(()),
            config,
        }
    }

    /// Applies one source event.
    pub fn apply(&self, event: ZoneEvent) -> Result<()> {
        let _serialized = self.apply_lock.lock();
        match event {
            ZoneEvent::Upsert {
                origin,
                zone_text,
                dynamic,
            } => self.upsert(origin, &zone_text, dynamic),
            ZoneEvent::Delete { origin } => self.delete(&origin),
        }
    }

    fn upsert(&self, origin: Name, zone_text: &str, dynamic: Vec<ResourceRecord>) -> Result<()> {
        let current = self.map.load();

        if let Some(pair) = current.zones.get(&origin) {
            // Known origin: re-parse with the sentinel so an unchanged
            // publication leaves live state alone, then swap in the
            // fresh static zone. The dynamic side is untouched.
            let expected = pair.static_zone.read().serial();
            let parsed = parse_zone(zone_text, &origin, expected)?;
            *pair.static_zone.write() = parsed;
            debug!(zone = %origin, "static zone reinstalled");
            return Ok(());
        }

        let parsed = parse_zone(zone_text, &origin, None)?;

        let mut dynamic_zone = Zone::new(origin.clone());
        for rr in dynamic {
            if let Err(e) = dynamic_zone.insert(rr) {
                warn!(zone = %origin, error = %e, "skipping seed record");
            }
        }

        let log = match &self.config.change_log_dir {
            Some(root) => {
                let dir = root.join(origin.to_string());
                let config = LogConfig {
                    segment: SegmentConfig {
                        max_store_bytes: self.config.segment_max_store_bytes,
                        max_index_bytes: 0,
                    },
                };
                Some(Log::open(dir, config)?)
            }
            None => None,
        };

        let pair = Arc::new(ZonePair {
            static_zone: RwLock::new(parsed),
            dynamic_zone: RwLock::new(dynamic_zone),
            log,
        });

        let mut next = RegistryMap {
            zones: current.zones.clone(),
            names: current.names.clone(),
        };
        next.zones.insert(origin.clone(), pair);
        next.names.push(origin.clone());
        self.map.store(Arc::new(next));
        info!(zone = %origin, "zone installed");
        Ok(())
    }

    fn delete(&self, origin: &Name) -> Result<()> {
        let current = self.map.load();
        let Some(pair) = current.zones.get(origin) else {
            return Ok(());
        };

        if let Some(log) = &pair.log {
            if let Err(e) = log.close() {
                warn!(zone = %origin, error = %e, "closing change log");
            }
            if let Err(e) = std::fs::remove_dir_all(log.dir()) {
                warn!(zone = %origin, error = %e, "removing change log directory");
            }
        }

        let mut next = RegistryMap {
            zones: current.zones.clone(),
            names: current.names.clone(),
        };
        next.zones.remove(origin);
        next.names.retain(|n| n != origin);
        self.map.store(Arc::new(next));
        info!(zone = %origin, "zone removed");
        Ok(())
    }

    /// Returns the longest configured origin that `qname` falls under.
    pub fn match_origin(&self, qname: &Name) -> Option<Name> {
        let map = self.map.load();
        map.names
            .iter()
            .filter(|origin| qname.is_subdomain_of(origin))
            .max_by_key(|origin| origin.label_count())
            .cloned()
    }

    /// Returns the zone pair for an exact origin.
    pub fn get(&self, origin: &Name) -> Option<Arc<ZonePair>> {
        self.map.load().zones.get(origin).cloned()
    }

    /// Returns every configured origin.
    pub fn origins(&self) -> Vec<Name> {
        self.map.load().names.clone()
    }

    /// Produces the merged view served to one request: a deep copy of
    /// the static zone with every dynamic rrset layered on top, dynamic
    /// winning on (name, type) collision. The pair's reader locks are
    /// held only for the copy, never across response I/O.
    pub fn snapshot(&self, origin: &Name) -> Option<Zone> {
        let pair = self.get(origin)?;
        let static_zone = pair.static_zone.read();
        let dynamic_zone = pair.dynamic_zone.read();

        let mut merged = static_zone.copy();
        for set in dynamic_zone.rrsets() {
            merged.adopt_rrset(set.clone());
        }
        Some(merged)
    }

    /// Replays an origin's change log into its dynamic zone, for
    /// process restart. Inserts and removals are applied in offset
    /// order; reserved kinds are skipped.
    pub fn replay(&self, origin: &Name) -> Result<usize> {
        let Some(pair) = self.get(origin) else {
            return Err(ZoneError::NotAuthoritative(origin.clone()));
        };
        let Some(log) = &pair.log else {
            return Ok(0);
        };

        let mut bytes = Vec::new();
        log.reader().read_to_end(&mut bytes)?;
        let records = arx_changelog::decode_frames(&bytes, log.lowest_offset())?;
        let count = records.len();

        let mut dynamic = pair.dynamic_zone.write();
        for change in records {
            let rr = match change.parse_record() {
                Ok(rr) => rr,
                Err(e) => {
                    warn!(zone = %origin, offset = change.offset, error = %e, "skipping unreadable change record");
                    continue;
                }
            };
            match change.kind {
                arx_changelog::ChangeKind::Insert => {
                    if let Err(e) = dynamic.insert(rr) {
                        warn!(zone = %origin, offset = change.offset, error = %e, "replay insert failed");
                    }
                }
                arx_changelog::ChangeKind::Remove => dynamic.delete(&rr),
                other => {
                    debug!(zone = %origin, kind = %other, "skipping reserved change kind");
                }
            }
        }
        Ok(count)
    }

    /// Appends a change record to an origin's log, fsynced before
    /// return. A no-op when change logging is disabled.
    pub fn append_change(&self, origin: &Name, record: &ChangeRecord) -> Result<Option<u64>> {
        let Some(pair) = self.get(origin) else {
            return Err(ZoneError::NotAuthoritative(origin.clone()));
        };
        match &pair.log {
            Some(log) => Ok(Some(log.append(record)?)),
            None => Ok(None),
        }
    }

    /// Drives the registry from a source until it ends or shutdown is
    /// signalled. This task is the single serializer of `apply`.
    pub async fn run(
        self: Arc<Self>,
        mut source: impl ZoneSource,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                event = source.next_event() => {
                    let Some(event) = event else {
                        info!("zone source ended");
                        break;
                    };
                    if let Err(e) = self.apply(event) {
                        match e {
                            ZoneError::SerialUnchanged { origin, serial } => {
                                debug!(zone = %origin, serial, "zone unchanged");
                            }
                            other => error!(error = %other, "applying zone event"),
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!("registry shutting down");
                    break;
                }
            }
        }
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("zones", &self.map.load().names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::LookupResult;
    use arx_changelog::ChangeKind;
    use arx_proto::RecordType;
    use std::net::Ipv4Addr;
    use std::str::FromStr;

    const ZONE_TEXT: &str = r#"
@ 3600 IN SOA ns.dns.example.org. hostmaster.example.org. 100 7200 1800 86400 30
@ IN NS ns1.example.org.
mail IN A 192.0.2.5
"#;

    fn origin() -> Name {
        Name::from_str("example.org.").unwrap()
    }

    fn upsert(registry: &Registry, dynamic: Vec<ResourceRecord>) {
        registry
            .apply(ZoneEvent::Upsert {
                origin: origin(),
                zone_text: ZONE_TEXT.to_string(),
                dynamic,
            })
            .unwrap();
    }

    #[test]
    fn longest_suffix_match() {
        let registry = Registry::new(RegistryConfig::default());
        upsert(&registry, Vec::new());
        registry
            .apply(ZoneEvent::Upsert {
                origin: Name::from_str("sub.example.org.").unwrap(),
                zone_text: ZONE_TEXT.to_string(),
                dynamic: Vec::new(),
            })
            .unwrap();

        let matched = registry
            .match_origin(&Name::from_str("a.sub.example.org.").unwrap())
            .unwrap();
        assert_eq!(matched.to_string(), "sub.example.org.");

        assert!(registry
            .match_origin(&Name::from_str("example.com.").unwrap())
            .is_none());
    }

    #[test]
    fn snapshot_merges_dynamic_over_static() {
        let registry = Registry::new(RegistryConfig::default());
        upsert(&registry, Vec::new());

        let pair = registry.get(&origin()).unwrap();
        {
            let mut dynamic = pair.dynamic_zone.write();
            // Shadow the static rrset for mail and add a new name.
            dynamic
                .insert(ResourceRecord::a(
                    Name::from_str("mail.example.org.").unwrap(),
                    60,
                    Ipv4Addr::new(10, 0, 0, 1),
                ))
                .unwrap();
            dynamic
                .insert(ResourceRecord::a(
                    Name::from_str("new.example.org.").unwrap(),
                    60,
                    Ipv4Addr::new(10, 0, 0, 2),
                ))
                .unwrap();
        }

        let snapshot = registry.snapshot(&origin()).unwrap();
        let mail = snapshot.lookup(&Name::from_str("mail.example.org.").unwrap(), RecordType::A);
        assert_eq!(mail.answer.len(), 1);
        assert_eq!(mail.answer[0].ttl(), 60);

        let new = snapshot.lookup(&Name::from_str("new.example.org.").unwrap(), RecordType::A);
        assert_eq!(new.result, LookupResult::Success);

        // Static records without dynamic overrides survive the merge.
        assert_eq!(snapshot.serial(), Some(100));
    }

    #[test]
    fn reinstall_keeps_dynamic_zone() {
        let registry = Registry::new(RegistryConfig::default());
        upsert(&registry, Vec::new());

        let pair = registry.get(&origin()).unwrap();
        pair.dynamic_zone
            .write()
            .insert(ResourceRecord::a(
                Name::from_str("new.example.org.").unwrap(),
                60,
                Ipv4Addr::new(10, 0, 0, 2),
            ))
            .unwrap();

        // Re-publishing the same serial is the sentinel case.
        let err = registry
            .apply(ZoneEvent::Upsert {
                origin: origin(),
                zone_text: ZONE_TEXT.to_string(),
                dynamic: Vec::new(),
            })
            .unwrap_err();
        assert!(matches!(err, ZoneError::SerialUnchanged { serial: 100, .. }));

        // A moved serial reinstalls the static zone and keeps the
        // dynamic side.
        registry
            .apply(ZoneEvent::Upsert {
                origin: origin(),
                zone_text: ZONE_TEXT.replace(" 100 ", " 101 "),
                dynamic: Vec::new(),
            })
            .unwrap();
        let snapshot = registry.snapshot(&origin()).unwrap();
        assert_eq!(snapshot.serial(), Some(101));
        let out = snapshot.lookup(&Name::from_str("new.example.org.").unwrap(), RecordType::A);
        assert_eq!(out.result, LookupResult::Success);
    }

    #[test]
    fn seeds_dynamic_zone_on_first_sight() {
        let registry = Registry::new(RegistryConfig::default());
        upsert(
            &registry,
            vec![ResourceRecord::a(
                Name::from_str("seeded.example.org.").unwrap(),
                60,
                Ipv4Addr::new(10, 0, 0, 3),
            )],
        );

        let snapshot = registry.snapshot(&origin()).unwrap();
        let out = snapshot.lookup(
            &Name::from_str("seeded.example.org.").unwrap(),
            RecordType::A,
        );
        assert_eq!(out.result, LookupResult::Success);
    }

    #[test]
    fn delete_removes_zone_and_log_dir() {
        let root = tempfile::tempdir().unwrap();
        let registry = Registry::new(RegistryConfig {
            change_log_dir: Some(root.path().to_path_buf()),
            segment_max_store_bytes: 0,
        });
        upsert(&registry, Vec::new());

        let log_dir = root.path().join("example.org.");
        assert!(log_dir.is_dir());

        registry
            .apply(ZoneEvent::Delete { origin: origin() })
            .unwrap();
        assert!(registry.get(&origin()).is_none());
        assert!(!log_dir.exists());
    }

    #[test]
    fn replay_restores_dynamic_state() {
        let root = tempfile::tempdir().unwrap();
        let config = RegistryConfig {
            change_log_dir: Some(root.path().to_path_buf()),
            segment_max_store_bytes: 0,
        };

        let rr = ResourceRecord::a(
            Name::from_str("new.example.org.").unwrap(),
            60,
            Ipv4Addr::new(10, 0, 0, 9),
        );
        {
            let registry = Registry::new(config.clone());
            upsert(&registry, Vec::new());
            registry
                .append_change(&origin(), &ChangeRecord::new(&origin(), &rr, ChangeKind::Insert))
                .unwrap();
        }

        let registry = Registry::new(config);
        upsert(&registry, Vec::new());
        assert_eq!(registry.replay(&origin()).unwrap(), 1);

        let snapshot = registry.snapshot(&origin()).unwrap();
        let out = snapshot.lookup(&Name::from_str("new.example.org.").unwrap(), RecordType::A);
        assert_eq!(out.result, LookupResult::Success);
    }
}
