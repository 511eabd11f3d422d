use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Toolsets
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Runtime settings for the toolset manager and its MCP servers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsetsConfig {
    /// File holding the persisted per-toolset parameters (`enabled`, API keys).
    #[serde(default = "d_config_path")]
    pub config_path: PathBuf,
    /// Upper bound for spawning a server and completing the MCP handshake.
    #[serde(default = "d_60")]
    pub start_timeout_secs: u64,
    /// Upper bound for a single `tools/call` round-trip.
    #[serde(default = "d_120")]
    pub call_timeout_secs: u64,
    /// Max bytes kept in each server's in-memory log buffer.
    #[serde(default = "d_65536")]
    pub log_buffer_bytes: usize,
    /// Default root directory exposed by the `files` toolset.
    #[serde(default)]
    pub files_root: Option<PathBuf>,
}

impl ToolsetsConfig {
    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }
}

impl Default for ToolsetsConfig {
    fn default() -> Self {
        Self {
            config_path: d_config_path(),
            start_timeout_secs: 60,
            call_timeout_secs: 120,
            log_buffer_bytes: 65_536,
            files_root: None,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_config_path() -> PathBuf {
    PathBuf::from("toolsets.toml")
}
fn d_60() -> u64 {
    60
}
fn d_120() -> u64 {
    120
}
fn d_65536() -> usize {
    65_536
}
