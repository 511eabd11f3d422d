use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Key in a toolset's parameter bag that records whether the user turned
/// the toolset on.
pub const ENABLED_KEY: &str = "enabled";

/// A tool as the LLM and the UI see it.
///
/// The namespaced id is `{toolset_name}_{display_name_suffix}`; see
/// [`UserTool::id`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserTool {
    pub toolset_name: String,
    pub display_name_suffix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

impl UserTool {
    /// Namespaced identifier, unique within a toolset.
    pub fn id(&self) -> String {
        namespaced_id(&self.toolset_name, &self.display_name_suffix)
    }
}

/// Build the namespaced id for a tool suffix inside a toolset.
pub fn namespaced_id(toolset_name: &str, display_name_suffix: &str) -> String {
    format!("{toolset_name}_{display_name_suffix}")
}

/// A tool as the MCP server advertises it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTool {
    pub name_on_server: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

/// Lifecycle state of a toolset or a single MCP server.
///
/// Serialized as `{"status": "running"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolsetStatus {
    Running,
    Starting,
    #[default]
    Stopped,
}

impl fmt::Display for ToolsetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ToolsetStatus::Running => "running",
            ToolsetStatus::Starting => "starting",
            ToolsetStatus::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// String-keyed parameter bag for one toolset (API keys, flags).
pub type ToolsetParams = BTreeMap<String, String>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolsetConfig
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Persisted per-toolset parameters, keyed by toolset name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolsetConfig {
    toolsets: BTreeMap<String, ToolsetParams>,
}

impl ToolsetConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// The full parameter bag for a toolset, including `enabled`.
    pub fn params(&self, toolset: &str) -> Option<&ToolsetParams> {
        self.toolsets.get(toolset)
    }

    /// Parameters handed to servers on start: everything except `enabled`,
    /// so toggling a toolset never counts as a configuration change.
    pub fn launch_params(&self, toolset: &str) -> ToolsetParams {
        self.toolsets
            .get(toolset)
            .map(|p| {
                p.iter()
                    .filter(|(k, _)| k.as_str() != ENABLED_KEY)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_enabled(&self, toolset: &str) -> bool {
        self.toolsets
            .get(toolset)
            .and_then(|p| p.get(ENABLED_KEY))
            .is_some_and(|v| v == "true")
    }

    pub fn set_enabled(&mut self, toolset: &str, enabled: bool) {
        self.set_param(toolset, ENABLED_KEY, if enabled { "true" } else { "false" });
    }

    pub fn set_param(&mut self, toolset: &str, key: impl Into<String>, value: impl Into<String>) {
        self.toolsets
            .entry(toolset.to_owned())
            .or_default()
            .insert(key.into(), value.into());
    }

    /// Names of every toolset that has stored parameters.
    pub fn toolset_names(&self) -> impl Iterator<Item = &str> {
        self.toolsets.keys().map(String::as_str)
    }
}
