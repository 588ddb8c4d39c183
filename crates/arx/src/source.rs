//! File-backed zone source.
//!
//! Watches the configured master files and feeds the registry event
//! loop: one Upsert per zone at startup, then periodic re-reads that
//! skip unchanged zones via the serial-unchanged sentinel.

use crate::config::{Config, ZoneConfig};
use arx_proto::Name;
use arx_server::Notifier;
use arx_zone::{Parser, Registry, ZoneError, ZoneEvent};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// One watched zone file.
#[derive(Debug, Clone)]
struct WatchedZone {
    origin: Name,
    path: PathBuf,
}

/// Emits [`ZoneEvent`]s for a fixed set of zone files.
pub struct FileSource {
    zones: Vec<WatchedZone>,
    registry: Arc<Registry>,
    notifier: Arc<Notifier>,
}

impl FileSource {
    /// Builds the source from configuration.
    pub fn new(
        config: &Config,
        registry: Arc<Registry>,
        notifier: Arc<Notifier>,
    ) -> anyhow::Result<Self> {
        let mut zones = Vec::with_capacity(config.zones.len());
        for zone in &config.zones {
            zones.push(WatchedZone {
                origin: Name::from_str(&zone.origin)
                    .map_err(|e| anyhow::anyhow!("zone origin {:?}: {e}", zone.origin))?,
                path: ZoneConfig::resolved_path(zone, &config.zone_dir),
            });
        }
        Ok(Self {
            zones,
            registry,
            notifier,
        })
    }

    /// Loads every zone synchronously, replaying change logs into the
    /// dynamic zones. Called once before the listeners start so the
    /// server never answers from a half-loaded registry.
    pub fn load_initial(&self) -> anyhow::Result<()> {
        for zone in &self.zones {
            let text = std::fs::read_to_string(&zone.path).map_err(|e| {
                anyhow::anyhow!("zone {} from {}: {e}", zone.origin, zone.path.display())
            })?;
            self.registry.apply(ZoneEvent::Upsert {
                origin: zone.origin.clone(),
                zone_text: text,
                dynamic: Vec::new(),
            })?;
            match self.registry.replay(&zone.origin) {
                Ok(0) => {}
                Ok(count) => info!(zone = %zone.origin, records = count, "replayed change log"),
                Err(e) => warn!(zone = %zone.origin, error = %e, "change log replay failed"),
            }
        }
        Ok(())
    }

    /// Spawns the reload ticker, feeding `events`. Re-published zones
    /// are announced to the notify peers, matching what happens after
    /// a dynamic update.
    pub fn spawn_reload(self, interval: Duration, events: mpsc::Sender<ZoneEvent>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await; // immediate first tick
            loop {
                ticker.tick().await;
                self.scan(&events).await;
            }
        });
    }

    async fn scan(&self, events: &mpsc::Sender<ZoneEvent>) {
        for zone in &self.zones {
            // The file is compared against the static serial; the
            // dynamic zone bumps independently of the file.
            let current_serial = self
                .registry
                .get(&zone.origin)
                .and_then(|pair| pair.static_zone.read().serial());

            // Parse with the sentinel so unchanged files are skipped
            // without touching live state.
            let parsed = Parser::new(zone.origin.clone())
                .expected_serial(current_serial)
                .parse_file(&zone.path);
            match parsed {
                Ok(_) => {}
                Err(ZoneError::SerialUnchanged { .. }) => {
                    debug!(zone = %zone.origin, "zone file unchanged");
                    continue;
                }
                Err(e) => {
                    error!(zone = %zone.origin, file = %zone.path.display(), error = %e, "zone reload failed");
                    continue;
                }
            }

            let Ok(text) = std::fs::read_to_string(&zone.path) else {
                continue;
            };
            info!(zone = %zone.origin, "zone file changed, reinstalling");
            if events
                .send(ZoneEvent::Upsert {
                    origin: zone.origin.clone(),
                    zone_text: text,
                    dynamic: Vec::new(),
                })
                .await
                .is_err()
            {
                return;
            }

            let notifier = self.notifier.clone();
            let registry = self.registry.clone();
            let origin = zone.origin.clone();
            tokio::spawn(async move {
                if let Some(snapshot) = registry.snapshot(&origin) {
                    notifier.notify(&origin, &snapshot).await;
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arx_zone::RegistryConfig;

    const ZONE_TEXT: &str = r#"
@ 3600 IN SOA ns.dns.example.org. hostmaster.example.org. 100 7200 1800 86400 30
@ IN NS ns1.example.org.
mail IN A 192.0.2.5
"#;

    #[tokio::test]
    async fn initial_load_installs_zones() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.org.zone");
        std::fs::write(&path, ZONE_TEXT).unwrap();

        let config = Config {
            zones: vec![ZoneConfig {
                origin: "example.org.".to_string(),
                file: path,
            }],
            ..Config::default()
        };
        let registry = Arc::new(Registry::new(RegistryConfig::default()));
        let notifier = Arc::new(Notifier::new(Vec::new()));
        let source = FileSource::new(&config, registry.clone(), notifier).unwrap();
        source.load_initial().unwrap();

        let origin = Name::from_str("example.org.").unwrap();
        assert_eq!(registry.snapshot(&origin).unwrap().serial(), Some(100));
    }
}
