//! A named group of tools backed by MCP servers and in-process functions.
//!
//! Starting a toolset starts every member server concurrently. Only when all
//! of them come up is the tool registry rebuilt and the toolset marked
//! `Running`; if any server fails, the ones that did start are stopped again
//! so the toolset never runs half-configured.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use camp_domain::tool::namespaced_id;
use camp_domain::{Error, Result, ToolsetParams, ToolsetStatus, UserTool};
use camp_mcp_client::McpServer;

use crate::custom::CustomTool;
use crate::registration::ServerRegistration;

struct ServerEntry {
    server: McpServer,
    registration: ServerRegistration,
}

struct CustomEntry {
    tool: UserTool,
    implementation: Arc<dyn CustomTool>,
}

/// Where a registered tool is executed.
#[derive(Clone)]
enum Target {
    Server { index: usize, name_on_server: String },
    Custom(Arc<dyn CustomTool>),
}

struct Registered {
    tool: UserTool,
    target: Target,
}

#[derive(Default)]
struct State {
    status: ToolsetStatus,
    /// Keyed by display name suffix.
    registry: BTreeMap<String, Registered>,
}

pub struct Toolset {
    name: String,
    servers: Vec<ServerEntry>,
    custom: Vec<CustomEntry>,
    /// Parameters of the current successful start; serializes start/stop.
    lifecycle: Mutex<Option<ToolsetParams>>,
    state: RwLock<State>,
}

impl Toolset {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            servers: Vec::new(),
            custom: Vec::new(),
            lifecycle: Mutex::new(None),
            state: RwLock::new(State::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ToolsetStatus {
        self.state.read().status
    }

    /// Register a server. It is started with the toolset, not here.
    pub fn add_server(
        &mut self,
        server: McpServer,
        registration: impl Into<ServerRegistration>,
    ) -> &mut Self {
        self.servers.push(ServerEntry {
            server,
            registration: registration.into(),
        });
        self
    }

    /// Register an in-process tool under `name`.
    pub fn add_custom_tool(
        &mut self,
        name: impl Into<String>,
        input_schema: Value,
        implementation: impl CustomTool,
        description: Option<String>,
    ) -> Result<&mut Self> {
        let name = name.into();
        if self.custom.iter().any(|c| c.tool.display_name_suffix == name) {
            return Err(Error::DuplicateTool(namespaced_id(&self.name, &name)));
        }
        self.custom.push(CustomEntry {
            tool: UserTool {
                toolset_name: self.name.clone(),
                display_name_suffix: name,
                description,
                input_schema,
            },
            implementation: Arc::new(implementation),
        });
        Ok(self)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start every member server with `params` and rebuild the registry.
    ///
    /// Returns `true` without touching the servers when the toolset already
    /// runs with identical parameters and every server process is alive.
    /// A server that died is restarted; the others are left as they are.
    pub async fn ensure_start(&self, params: &ToolsetParams, cancel: &CancellationToken) -> bool {
        let mut active = self.lifecycle.lock().await;

        if active.as_ref() == Some(params)
            && self.status() == ToolsetStatus::Running
            && self.servers.iter().all(|e| e.server.is_running())
        {
            return true;
        }

        {
            let mut state = self.state.write();
            state.status = ToolsetStatus::Starting;
            state.registry.clear();
        }

        let started = join_all(
            self.servers
                .iter()
                .map(|e| e.server.ensure_start(params, cancel)),
        )
        .await;

        if started.iter().all(|ok| *ok) {
            let registry = self.build_registry().await;
            let tool_count = registry.len();
            {
                let mut state = self.state.write();
                state.registry = registry;
                state.status = ToolsetStatus::Running;
            }
            *active = Some(params.clone());
            tracing::info!(toolset = %self.name, tools = tool_count, "toolset started");
            return true;
        }

        let failed: Vec<&str> = self
            .servers
            .iter()
            .zip(&started)
            .filter(|(_, ok)| !**ok)
            .map(|(e, _)| e.server.name())
            .collect();
        tracing::warn!(toolset = %self.name, failed = ?failed, "toolset start failed, rolling back");

        join_all(
            self.servers
                .iter()
                .zip(&started)
                .filter(|(_, ok)| **ok)
                .map(|(e, _)| e.server.ensure_stop()),
        )
        .await;

        *active = None;
        let mut state = self.state.write();
        state.status = ToolsetStatus::Stopped;
        state.registry.clear();
        false
    }

    /// Stop every member server. Idempotent.
    pub async fn ensure_stop(&self) {
        let mut active = self.lifecycle.lock().await;
        join_all(self.servers.iter().map(|e| e.server.ensure_stop())).await;
        *active = None;

        let mut state = self.state.write();
        if state.status != ToolsetStatus::Stopped {
            tracing::info!(toolset = %self.name, "toolset stopped");
        }
        state.status = ToolsetStatus::Stopped;
        state.registry.clear();
    }

    async fn build_registry(&self) -> BTreeMap<String, Registered> {
        let mut registry = BTreeMap::new();

        for entry in &self.custom {
            registry.insert(
                entry.tool.display_name_suffix.clone(),
                Registered {
                    tool: entry.tool.clone(),
                    target: Target::Custom(entry.implementation.clone()),
                },
            );
        }

        let catalogs = join_all(self.servers.iter().map(|e| e.server.list_tools())).await;
        for (index, (entry, catalog)) in self.servers.iter().zip(catalogs).enumerate() {
            for (tool, name_on_server) in entry.registration.apply(&self.name, catalog) {
                match registry.entry(tool.display_name_suffix.clone()) {
                    Entry::Occupied(_) => {
                        tracing::warn!(
                            toolset = %self.name,
                            server = %entry.server.name(),
                            tool = %tool.id(),
                            "duplicate tool id, skipping"
                        );
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(Registered {
                            tool,
                            target: Target::Server {
                                index,
                                name_on_server,
                            },
                        });
                    }
                }
            }
        }

        registry
    }

    // ── Tools ────────────────────────────────────────────────────────

    /// Registered tools, sorted by id. Empty unless running.
    pub fn list_tools(&self) -> Vec<UserTool> {
        let state = self.state.read();
        if state.status != ToolsetStatus::Running {
            return Vec::new();
        }
        state.registry.values().map(|r| r.tool.clone()).collect()
    }

    /// Run the tool registered as `display_name_suffix`.
    pub async fn execute_tool(
        &self,
        display_name_suffix: &str,
        args: Value,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let target = {
            let state = self.state.read();
            if state.status != ToolsetStatus::Running {
                return Err(Error::NotRunning(self.name.clone()));
            }
            state
                .registry
                .get(display_name_suffix)
                .map(|r| r.target.clone())
                .ok_or_else(|| Error::UnknownTool(namespaced_id(&self.name, display_name_suffix)))?
        };

        tracing::debug!(toolset = %self.name, tool = display_name_suffix, "executing tool");

        match target {
            Target::Custom(implementation) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        Err(Error::Cancelled(namespaced_id(&self.name, display_name_suffix)))
                    }
                    res = implementation.call(args, cancel.clone()) => res,
                }
            }
            Target::Server {
                index,
                name_on_server,
            } => {
                self.servers[index]
                    .server
                    .execute_tool_call(&name_on_server, args, cancel)
                    .await
            }
        }
    }

    // ── Per-server views ─────────────────────────────────────────────

    pub fn server_statuses(&self) -> Vec<(String, ToolsetStatus)> {
        self.servers
            .iter()
            .map(|e| (e.server.name().to_owned(), e.server.status()))
            .collect()
    }

    pub fn server_logs(&self) -> Vec<(String, String)> {
        self.servers
            .iter()
            .map(|e| (e.server.name().to_owned(), e.server.logs()))
            .collect()
    }
}

impl std::fmt::Debug for Toolset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolset")
            .field("name", &self.name)
            .field("servers", &self.servers.len())
            .field("custom_tools", &self.custom.len())
            .field("status", &self.status())
            .finish()
    }
}
