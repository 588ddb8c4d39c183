//! TSIG key lookup.

use arx_proto::{Name, TsigKey};
use async_trait::async_trait;
use std::collections::HashMap;

/// Source of TSIG secrets. The front-end resolves the key name carried
/// in a signed message through this seam; how keys are provisioned
/// (config file, secret store) is the caller's concern.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Returns the key with this name, if known.
    async fn get(&self, name: &Name) -> Option<TsigKey>;
}

/// A fixed in-memory key set.
#[derive(Debug, Default)]
pub struct StaticKeyStore {
    keys: HashMap<Name, TsigKey>,
}

impl StaticKeyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key, replacing any previous key of the same name.
    pub fn insert(&mut self, key: TsigKey) {
        self.keys.insert(key.name.clone(), key);
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true when no keys are configured.
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<TsigKey> for StaticKeyStore {
    fn from_iter<I: IntoIterator<Item = TsigKey>>(iter: I) -> Self {
        let mut store = Self::new();
        for key in iter {
            store.insert(key);
        }
        store
    }
}

#[async_trait]
impl KeyStore for StaticKeyStore {
    async fn get(&self, name: &Name) -> Option<TsigKey> {
        self.keys.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arx_proto::TsigAlgorithm;
    use std::str::FromStr;

    #[tokio::test]
    async fn lookup_is_case_insensitive() {
        let mut store = StaticKeyStore::new();
        store.insert(TsigKey::new(
            Name::from_str("update.key.").unwrap(),
            TsigAlgorithm::HmacSha256,
            vec![1; 32],
        ));

        assert!(store
            .get(&Name::from_str("UPDATE.KEY.").unwrap())
            .await
            .is_some());
        assert!(store.get(&Name::from_str("other.").unwrap()).await.is_none());
    }
}
