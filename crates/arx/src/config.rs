//! Server configuration.
//!
//! The whole configuration is loaded once in `main` and handed down by
//! value; nothing here is global.

use anyhow::{bail, Context};
use arx_proto::{Name, TsigAlgorithm, TsigKey};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Top-level configuration (YAML).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Address for the UDP and TCP listeners.
    pub bind_addr: SocketAddr,
    /// Zones served at startup.
    pub zones: Vec<ZoneConfig>,
    /// Root for relative zone file paths.
    pub zone_dir: PathBuf,
    /// Root for per-zone change logs; unset disables change logging.
    pub change_log_dir: Option<PathBuf>,
    /// Zone file re-read interval in seconds; 0 disables reloading.
    pub reload_interval_secs: u64,
    /// Refuse unsigned UPDATE messages.
    pub tsig_required: bool,
    /// Soft cap for change-log store segments, bytes (0 = default).
    pub segment_max_store_bytes: u64,
    /// TSIG keys accepted for updates and transfers.
    pub tsig_keys: Vec<TsigKeyConfig>,
    /// Secondaries to NOTIFY after zone changes.
    pub notify_peers: Vec<SocketAddr>,
    /// Logging options.
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:53".parse().expect("static addr"),
            zones: Vec::new(),
            zone_dir: PathBuf::from("."),
            change_log_dir: None,
            reload_interval_secs: 0,
            tsig_required: false,
            segment_max_store_bytes: 0,
            tsig_keys: Vec::new(),
            notify_peers: Vec::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// One zone to serve: its origin and master-file path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// The zone origin.
    pub origin: String,
    /// The master file, absolute or relative to `zone_dir`.
    pub file: PathBuf,
}

impl ZoneConfig {
    /// Resolves the file path against the zone directory.
    pub fn resolved_path(&self, zone_dir: &Path) -> PathBuf {
        if self.file.is_absolute() {
            self.file.clone()
        } else {
            zone_dir.join(&self.file)
        }
    }
}

/// A TSIG key definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TsigKeyConfig {
    /// Key name.
    pub name: String,
    /// `hmac-sha256` (default) or `hmac-sha512`.
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    /// Base64-encoded secret.
    pub secret: String,
}

fn default_algorithm() -> String {
    "hmac-sha256".to_string()
}

impl TsigKeyConfig {
    /// Builds the runtime key.
    pub fn to_key(&self) -> anyhow::Result<TsigKey> {
        let name = Name::from_str(&self.name)
            .with_context(|| format!("bad key name {:?}", self.name))?;
        let algorithm = match self.algorithm.to_ascii_lowercase().as_str() {
            "hmac-sha256" => TsigAlgorithm::HmacSha256,
            "hmac-sha512" => TsigAlgorithm::HmacSha512,
            other => bail!("unsupported TSIG algorithm {other:?}"),
        };
        TsigKey::from_base64(name, algorithm, &self.secret)
            .with_context(|| format!("bad secret for key {:?}", self.name))
    }
}

/// Logging options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error.
    pub level: String,
    /// Output format: text or json.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

impl Config {
    /// Loads a YAML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field consistency.
    pub fn validate(&self) -> anyhow::Result<()> {
        for zone in &self.zones {
            Name::from_str(&zone.origin)
                .with_context(|| format!("bad zone origin {:?}", zone.origin))?;
        }
        for key in &self.tsig_keys {
            key.to_key()?;
        }
        if self.tsig_required && self.tsig_keys.is_empty() {
            bail!("tsig_required is set but no tsig_keys are configured");
        }
        Ok(())
    }

    /// Returns the reload interval, `None` when reloading is off.
    pub fn reload_interval(&self) -> Option<Duration> {
        match self.reload_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml() {
        let config: Config = serde_yaml::from_str(
            r#"
bind_addr: "127.0.0.1:5353"
zones:
  - origin: example.org.
    file: example.org.zone
tsig_keys:
  - name: ksdns.tsigKey.
    secret: c2VjcmV0c2VjcmV0c2VjcmV0c2VjcmV0c2VjcmV0c2U=
"#,
        )
        .unwrap();
        config.validate().unwrap();
        assert_eq!(config.reload_interval(), None);
        assert_eq!(config.tsig_keys[0].algorithm, "hmac-sha256");
    }

    #[test]
    fn tsig_required_needs_keys() {
        let config: Config = serde_yaml::from_str("tsig_required: true").unwrap();
        assert!(config.validate().is_err());
    }
}
