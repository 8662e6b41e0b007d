//! Kernel configuration
//!
//! Defaults work out of the box. An override can be written into the
//! persisted store as JSON (from the game console, say) and is picked up at
//! the next boot.

use crate::store::Store;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Store key the override is read from
pub const CONFIG_KEY: &str = "kernel.config";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct KernelConfig {
    /// Ticks between persists; 0 persists every tick
    pub persist_interval: u64,
    /// Store key of the kernel record
    pub record_key: String,
    /// Store key of the last-known-good copy written on a partial restore
    pub backup_key: String,
    /// Let tasks spawned mid-tick run in the same pass
    pub same_tick_spawns: bool,
    /// Ticks an unclaimed broadcast stays on the board; 0 keeps it forever
    pub broadcast_ttl: u64,
    /// `EnvFilter` directive for the diagnostic sink
    pub log_filter: String,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            persist_interval: 10,
            record_key: "kernel".to_string(),
            backup_key: "kernel.backup".to_string(),
            same_tick_spawns: false,
            broadcast_ttl: 50,
            log_filter: "info".to_string(),
        }
    }
}

impl KernelConfig {
    /// Read the override at `key`, falling back to defaults
    pub fn load(store: &dyn Store, key: &str) -> Self {
        let Some(raw) = store.get(key) else {
            return Self::default();
        };
        match serde_json::from_str(&raw) {
            Ok(config) => config,
            Err(e) => {
                warn!("ignoring malformed config at {:?}: {}", key, e);
                Self::default()
            }
        }
    }

    /// Whether the kernel persists at the end of `tick`
    pub fn persists_on(&self, tick: u64) -> bool {
        self.persist_interval == 0 || tick % self.persist_interval == 0
    }
}
