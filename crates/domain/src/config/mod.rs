mod observability;
mod toolsets;

pub use observability::*;
pub use toolsets::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub toolsets: ToolsetsConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.toolsets.start_timeout_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "toolsets.start_timeout_secs".into(),
                message: "start timeout must be greater than 0".into(),
            });
        }

        if self.toolsets.call_timeout_secs == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "toolsets.call_timeout_secs".into(),
                message: "call timeout must be greater than 0".into(),
            });
        }

        if self.toolsets.config_path.as_os_str().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "toolsets.config_path".into(),
                message: "config_path must not be empty".into(),
            });
        }

        // Very small buffers drop most of a failing server's output.
        if self.toolsets.log_buffer_bytes < 1024 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "toolsets.log_buffer_bytes".into(),
                message: "log buffer below 1 KiB will truncate server logs aggressively".into(),
            });
        }

        if self.toolsets.files_root.is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "toolsets.files_root".into(),
                message: "no files_root set; the files toolset needs a `root` parameter".into(),
            });
        }

        errors
    }
}
