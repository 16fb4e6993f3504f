use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::info;

use crate::loader::{load_store_config, ConfigError};
use crate::schema::StoreConfig;

/// Process-wide read-through cache of store configs, keyed by chain id.
///
/// Configs are shared as `Arc` snapshots: a reload parses the file off to
/// the side and swaps the pointer, so concurrent parses keep whatever
/// snapshot they already hold and never observe in-place mutation.
#[derive(Debug)]
pub struct ConfigCache {
    dir: PathBuf,
    entries: RwLock<HashMap<String, Arc<StoreConfig>>>,
}

impl ConfigCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ConfigCache { dir: dir.into(), entries: RwLock::new(HashMap::new()) }
    }

    /// Fetch a chain's config, loading it on first use.
    pub fn get(&self, chain_id: &str) -> Result<Arc<StoreConfig>, ConfigError> {
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(cfg) = entries.get(chain_id) {
                return Ok(Arc::clone(cfg));
            }
        }
        let loaded = Arc::new(load_store_config(&self.dir, chain_id)?);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // A racing loader may have inserted first; keep the existing one
        // so all readers share a single snapshot.
        let entry = entries
            .entry(chain_id.to_string())
            .or_insert_with(|| Arc::clone(&loaded));
        Ok(Arc::clone(entry))
    }

    /// Drop a chain's snapshot; the next `get` re-reads from disk.
    pub fn invalidate(&self, chain_id: &str) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(chain_id);
    }

    /// Re-read a chain's config and swap it in. Existing holders keep
    /// their old snapshot.
    pub fn reload(&self, chain_id: &str) -> Result<Arc<StoreConfig>, ConfigError> {
        let fresh = Arc::new(load_store_config(&self.dir, chain_id)?);
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(chain_id.to_string(), Arc::clone(&fresh));
        info!(chain_id, "store config reloaded");
        Ok(fresh)
    }
}
