//! Owns every toolset and keeps them in step with the persisted config.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use camp_domain::{Error, Result, ToolsetConfig, ToolsetStatus, UserTool};

use crate::store::ToolsetConfigStore;
use crate::toolset::Toolset;

/// Point-in-time view of one MCP server.
#[derive(Debug, Clone, Serialize)]
pub struct ServerSnapshot {
    pub name: String,
    #[serde(flatten)]
    pub status: ToolsetStatus,
}

/// Point-in-time view of one toolset.
#[derive(Debug, Clone, Serialize)]
pub struct ToolsetSnapshot {
    pub name: String,
    pub enabled: bool,
    #[serde(flatten)]
    pub status: ToolsetStatus,
    pub servers: Vec<ServerSnapshot>,
    pub tool_count: usize,
}

pub struct ToolsetManager {
    toolsets: BTreeMap<String, Toolset>,
    store: Arc<dyn ToolsetConfigStore>,
    config: Mutex<ToolsetConfig>,
}

impl ToolsetManager {
    /// Build a manager over `toolsets`, loading the current config from `store`.
    pub fn new(toolsets: Vec<Toolset>, store: Arc<dyn ToolsetConfigStore>) -> Result<Self> {
        let mut by_name = BTreeMap::new();
        for toolset in toolsets {
            let name = toolset.name().to_owned();
            if by_name.insert(name.clone(), toolset).is_some() {
                return Err(Error::Config(format!("toolset '{name}' registered twice")));
            }
        }
        let config = store.load()?;
        Ok(Self {
            toolsets: by_name,
            store,
            config: Mutex::new(config),
        })
    }

    pub fn toolset(&self, name: &str) -> Option<&Toolset> {
        self.toolsets.get(name)
    }

    pub fn toolset_names(&self) -> impl Iterator<Item = &str> {
        self.toolsets.keys().map(String::as_str)
    }

    /// Copy of the current persisted configuration.
    pub fn config(&self) -> ToolsetConfig {
        self.config.lock().clone()
    }

    fn require(&self, name: &str) -> Result<&Toolset> {
        self.toolsets
            .get(name)
            .ok_or_else(|| Error::UnknownToolset(name.to_owned()))
    }

    /// Apply `change` to the config and persist it. The in-memory copy is
    /// only replaced once the store accepted the new version.
    fn update(&self, change: impl FnOnce(&mut ToolsetConfig)) -> Result<ToolsetConfig> {
        let mut config = self.config.lock();
        let mut next = config.clone();
        change(&mut next);
        self.store.save(&next)?;
        *config = next.clone();
        Ok(next)
    }

    /// Start or stop `toolset` to match `config`.
    async fn sync(&self, toolset: &Toolset, config: &ToolsetConfig, cancel: &CancellationToken) -> bool {
        if config.is_enabled(toolset.name()) {
            toolset
                .ensure_start(&config.launch_params(toolset.name()), cancel)
                .await
        } else {
            toolset.ensure_stop().await;
            true
        }
    }

    // ── Configuration ────────────────────────────────────────────────

    /// Turn a toolset on or off. Returns whether the toolset reached the
    /// requested state.
    pub async fn set_enabled(&self, name: &str, enabled: bool, cancel: &CancellationToken) -> Result<bool> {
        let toolset = self.require(name)?;
        let config = self.update(|c| c.set_enabled(name, enabled))?;
        tracing::info!(toolset = %name, enabled, "toolset toggled");
        Ok(self.sync(toolset, &config, cancel).await)
    }

    /// Store one parameter. An enabled toolset is restarted with it.
    pub async fn set_param(
        &self,
        name: &str,
        key: &str,
        value: &str,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        let toolset = self.require(name)?;
        let config = self.update(|c| c.set_param(name, key, value))?;
        tracing::debug!(toolset = %name, key, "toolset parameter updated");
        if config.is_enabled(name) {
            Ok(self.sync(toolset, &config, cancel).await)
        } else {
            Ok(true)
        }
    }

    /// Bring every toolset in line with the config. Toolsets are synced
    /// concurrently; the result maps each name to its outcome.
    pub async fn refresh(&self, cancel: &CancellationToken) -> BTreeMap<String, bool> {
        let config = self.config();
        let results = join_all(self.toolsets.values().map(|t| self.sync(t, &config, cancel))).await;
        self.toolsets.keys().cloned().zip(results).collect()
    }

    pub async fn shutdown(&self) {
        join_all(self.toolsets.values().map(|t| t.ensure_stop())).await;
        tracing::info!("all toolsets stopped");
    }

    // ── Tools ────────────────────────────────────────────────────────

    /// Tools of every running toolset.
    pub fn list_tools(&self) -> Vec<UserTool> {
        self.toolsets.values().flat_map(Toolset::list_tools).collect()
    }

    /// Run a tool by its namespaced id (`{toolset}_{suffix}`).
    ///
    /// Toolset names may themselves contain `_`, so candidates are tried
    /// longest name first. A candidate that is stopped or lacks the tool
    /// passes the call on to the next one; the first such error is returned
    /// when none of them has it.
    pub async fn execute(&self, tool_id: &str, args: Value, cancel: &CancellationToken) -> Result<String> {
        let mut first_miss = None;
        for (toolset, suffix) in self.candidates(tool_id) {
            match toolset.execute_tool(suffix, args.clone(), cancel).await {
                Err(e @ (Error::UnknownTool(_) | Error::NotRunning(_))) => {
                    tracing::debug!(tool = tool_id, toolset = %toolset.name(), error = %e, "trying next toolset");
                    first_miss.get_or_insert(e);
                }
                other => return other,
            }
        }
        Err(first_miss.unwrap_or_else(|| Error::UnknownTool(tool_id.to_owned())))
    }

    /// Toolsets whose `{name}_` prefixes `tool_id`, longest name first.
    fn candidates<'a>(&self, tool_id: &'a str) -> Vec<(&Toolset, &'a str)> {
        let mut found: Vec<(&Toolset, &'a str)> = self
            .toolsets
            .iter()
            .filter_map(|(name, toolset)| {
                let suffix = tool_id.strip_prefix(name.as_str())?.strip_prefix('_')?;
                (!suffix.is_empty()).then_some((toolset, suffix))
            })
            .collect();
        found.sort_by_key(|(toolset, _)| std::cmp::Reverse(toolset.name().len()));
        found
    }

    // ── Status ───────────────────────────────────────────────────────

    pub fn status(&self) -> Vec<ToolsetSnapshot> {
        let config = self.config();
        self.toolsets
            .values()
            .map(|t| ToolsetSnapshot {
                name: t.name().to_owned(),
                enabled: config.is_enabled(t.name()),
                status: t.status(),
                servers: t
                    .server_statuses()
                    .into_iter()
                    .map(|(name, status)| ServerSnapshot { name, status })
                    .collect(),
                tool_count: t.list_tools().len(),
            })
            .collect()
    }
}

impl std::fmt::Debug for ToolsetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsetManager")
            .field("toolsets", &self.toolsets.values().collect::<Vec<_>>())
            .finish()
    }
}
