//! MCP server executor: owns the connection to one external tool provider.
//!
//! Lifecycle: `Stopped → Starting → Running`, and back to `Stopped` on
//! failure or stop. Start and stop failures never propagate: they are
//! written to the server's [`ServerLog`] and collapse to `false`/`Stopped`.
//! Only caller-contract violations (calling a tool while not running) are
//! returned as errors.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use camp_domain::{Error, Result, ServerTool, ToolsetParams, ToolsetStatus};

use crate::log::ServerLog;
use crate::protocol::{self, ToolsListResult};
use crate::spec::McpServerSpec;
use crate::transport::{McpConnector, McpTransport, StdioConnector};

/// Upper bound on `tools/list` pages followed for one catalog.
const MAX_TOOL_PAGES: usize = 64;

/// Timeouts applied to one server.
#[derive(Debug, Clone, Copy)]
pub struct ServerTimeouts {
    /// Spawn + `initialize` handshake.
    pub start: Duration,
    /// One `tools/list` or `tools/call` round-trip.
    pub call: Duration,
}

impl Default for ServerTimeouts {
    fn default() -> Self {
        Self {
            start: Duration::from_secs(60),
            call: Duration::from_secs(120),
        }
    }
}

/// The live connection plus the parameters it was started with.
struct ActiveConnection {
    params: ToolsetParams,
    transport: Arc<dyn McpTransport>,
}

/// One MCP server: a provider spec plus the machinery to run it.
pub struct McpServer {
    spec: Arc<dyn McpServerSpec>,
    connector: Arc<dyn McpConnector>,
    timeouts: ServerTimeouts,
    /// Serializes start/stop so the compare-and-restart sequence is atomic.
    lifecycle: Mutex<Option<ActiveConnection>>,
    /// Transport used by tool calls; set only while running.
    current: RwLock<Option<Arc<dyn McpTransport>>>,
    status: RwLock<ToolsetStatus>,
    log: ServerLog,
}

impl McpServer {
    /// A server that spawns its process over stdio.
    pub fn new(spec: Arc<dyn McpServerSpec>) -> Self {
        Self::with_connector(spec, Arc::new(StdioConnector))
    }

    pub fn with_connector(spec: Arc<dyn McpServerSpec>, connector: Arc<dyn McpConnector>) -> Self {
        Self {
            spec,
            connector,
            timeouts: ServerTimeouts::default(),
            lifecycle: Mutex::new(None),
            current: RwLock::new(None),
            status: RwLock::new(ToolsetStatus::Stopped),
            log: ServerLog::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: ServerTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_log_capacity(mut self, max_bytes: usize) -> Self {
        self.log = ServerLog::new(max_bytes);
        self
    }

    pub fn name(&self) -> &str {
        self.spec.name()
    }

    /// Current status. A `Running` server whose process has gone away
    /// reports `Stopped`; the next `ensure_start` reconnects it.
    pub fn status(&self) -> ToolsetStatus {
        let status = *self.status.read();
        if status == ToolsetStatus::Running && !self.transport_alive() {
            return ToolsetStatus::Stopped;
        }
        status
    }

    /// Running with a live transport.
    pub fn is_running(&self) -> bool {
        self.status() == ToolsetStatus::Running
    }

    fn transport_alive(&self) -> bool {
        self.current.read().as_ref().is_some_and(|t| t.is_alive())
    }

    /// Accumulated log text (start/stop failures, stderr).
    pub fn logs(&self) -> String {
        self.log.contents()
    }

    fn set_status(&self, status: ToolsetStatus) {
        *self.status.write() = status;
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Make sure the server runs with `params`.
    ///
    /// No-op when already running with identical parameters; a running
    /// server with different parameters is stopped first. Returns `false`
    /// on any failure, including timeout and cancellation.
    pub async fn ensure_start(&self, params: &ToolsetParams, cancel: &CancellationToken) -> bool {
        let mut active = self.lifecycle.lock().await;

        if let Some(conn) = active.as_ref() {
            if conn.params == *params && conn.transport.is_alive() {
                return true;
            }
            tracing::info!(server = %self.name(), "MCP server config changed, restarting");
            self.stop_locked(&mut active).await;
        }

        self.set_status(ToolsetStatus::Starting);

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled(format!("start of {}", self.name()))),
            res = tokio::time::timeout(self.timeouts.start, self.connect(params)) => {
                res.unwrap_or_else(|_| {
                    Err(Error::Timeout(format!(
                        "{} did not start within {}s",
                        self.name(),
                        self.timeouts.start.as_secs()
                    )))
                })
            }
        };

        match outcome {
            Ok(transport) => {
                *self.current.write() = Some(transport.clone());
                *active = Some(ActiveConnection {
                    params: params.clone(),
                    transport,
                });
                self.set_status(ToolsetStatus::Running);
                tracing::info!(server = %self.name(), "MCP server started");
                true
            }
            Err(e) => {
                tracing::warn!(server = %self.name(), error = %e, "failed to start MCP server");
                self.log.push(format!("start failed: {e}"));
                self.set_status(ToolsetStatus::Stopped);
                false
            }
        }
    }

    /// Stop the server. Idempotent; close errors are logged, never returned.
    pub async fn ensure_stop(&self) {
        let mut active = self.lifecycle.lock().await;
        self.stop_locked(&mut active).await;
    }

    async fn stop_locked(&self, active: &mut Option<ActiveConnection>) {
        *self.current.write() = None;
        if let Some(conn) = active.take() {
            tracing::info!(server = %self.name(), "shutting down MCP server");
            if let Err(e) = conn.transport.shutdown().await {
                tracing::warn!(server = %self.name(), error = %e, "error shutting down MCP server");
                self.log.push(format!("stop failed: {e}"));
            }
        }
        self.set_status(ToolsetStatus::Stopped);
    }

    /// Spawn and run the `initialize` handshake.
    async fn connect(&self, params: &ToolsetParams) -> Result<Arc<dyn McpTransport>> {
        let launch = self.spec.launch_spec(params)?;
        self.log.push(format!("starting: {launch}"));

        let transport = self.connector.connect(&launch, self.log.clone()).await?;
        if let Err(e) = handshake(transport.as_ref()).await {
            if let Err(close) = transport.shutdown().await {
                tracing::warn!(server = %self.name(), error = %close, "error closing half-started MCP server");
                self.log.push(format!("stop failed: {close}"));
            }
            return Err(e);
        }
        Ok(transport)
    }

    // ── Tools ────────────────────────────────────────────────────────

    /// The server's tool catalog. Errors are logged and yield an empty list.
    pub async fn list_tools(&self) -> Vec<ServerTool> {
        let Some(transport) = self.running_transport() else {
            return Vec::new();
        };

        match tokio::time::timeout(self.timeouts.call, fetch_tools(transport.as_ref())).await {
            Ok(Ok(tools)) => tools,
            Ok(Err(e)) => {
                tracing::warn!(server = %self.name(), error = %e, "tools/list failed");
                self.log.push(format!("tools/list failed: {e}"));
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(server = %self.name(), "tools/list timed out");
                self.log.push("tools/list timed out");
                Vec::new()
            }
        }
    }

    /// Call `name` on the server and render the result as text.
    pub async fn execute_tool_call(
        &self,
        name: &str,
        arguments: Value,
        cancel: &CancellationToken,
    ) -> Result<String> {
        let transport = self
            .running_transport()
            .ok_or_else(|| Error::NotRunning(self.name().to_owned()))?;

        let params = serde_json::json!({
            "name": name,
            "arguments": arguments,
        });

        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled(format!("call to {name}"))),
            res = tokio::time::timeout(self.timeouts.call, transport.send_request("tools/call", Some(params))) => {
                res.map_err(|_| Error::Timeout(format!("{name} on {}", self.name())))??
            }
        };

        let result = resp
            .into_result()
            .map_err(|e| Error::Mcp(format!("tools/call {name} failed: {e}")))?;

        if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
            tracing::debug!(server = %self.name(), tool = name, "tool reported an error result");
        }
        Ok(protocol::render_call_result(&result))
    }

    fn running_transport(&self) -> Option<Arc<dyn McpTransport>> {
        if !self.is_running() {
            return None;
        }
        self.current.read().clone()
    }
}

async fn handshake(transport: &dyn McpTransport) -> Result<()> {
    let params = serde_json::to_value(protocol::initialize_params())?;
    transport
        .send_request("initialize", Some(params))
        .await?
        .into_result()
        .map_err(|e| Error::Mcp(format!("initialize failed: {e}")))?;
    transport.send_notification("notifications/initialized").await?;
    Ok(())
}

async fn fetch_tools(transport: &dyn McpTransport) -> Result<Vec<ServerTool>> {
    let mut tools = Vec::new();
    let mut cursor: Option<String> = None;

    for _ in 0..MAX_TOOL_PAGES {
        let params = cursor.as_ref().map(|c| serde_json::json!({ "cursor": c }));
        let value = transport
            .send_request("tools/list", params)
            .await?
            .into_result()
            .map_err(|e| Error::Mcp(format!("tools/list failed: {e}")))?;
        let page: ToolsListResult = serde_json::from_value(value)?;
        tools.extend(page.tools.into_iter().map(ServerTool::from));

        match page.next_cursor {
            Some(next) if !next.is_empty() => cursor = Some(next),
            _ => return Ok(tools),
        }
    }

    tracing::warn!(pages = MAX_TOOL_PAGES, "tools/list pagination limit reached");
    Ok(tools)
}
