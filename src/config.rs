use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Relay configuration.
///
/// Every field has a usable default so the relay runs out of the box against
/// a local collector; a JSON config file can override any subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Base URL of the collector (no trailing slash)
    pub collector_url: String,
    /// Timeout for record/batch submissions, in seconds
    pub request_timeout_secs: u64,
    /// Timeout for the reachability probe, in seconds
    pub health_timeout_secs: u64,
    /// Path of the durable slot holding pending records
    pub queue_slot: PathBuf,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            collector_url: "http://localhost:8765".to_string(),
            request_timeout_secs: 30,
            health_timeout_secs: 5,
            queue_slot: default_queue_slot(),
        }
    }
}

impl RelayConfig {
    /// Load config from a JSON file, falling back to defaults if the file is
    /// missing or malformed (same lossy-but-available policy as the queue
    /// slot itself).
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => config,
                Err(e) => {
                    warn!(
                        "Config at {} is malformed ({}), using defaults",
                        path.display(),
                        e
                    );
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!(
                    "Config at {} is unreadable ({}), using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }
}

/// Default slot location under the platform data dir, falling back to the
/// working directory when no data dir is available.
fn default_queue_slot() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("transcript-relay")
        .join("pending.json")
}
