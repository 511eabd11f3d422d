//! Lifecycle tests for `McpServer` against an in-process fake provider.
//!
//! The fake connector hands out transports that answer `initialize`,
//! `tools/list` and `tools/call` directly, and counts connects/shutdowns so
//! the tests can assert exactly when a server was (re)started.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use camp_domain::{Error, ToolsetParams, ToolsetStatus};
use camp_mcp_client::protocol::JsonRpcResponse;
use camp_mcp_client::{
    CommandSpec, LaunchSpec, McpConnector, McpServer, McpTransport, ServerLog, ServerTimeouts,
    TransportError,
};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

// ── Fake provider ───────────────────────────────────────────────────────

#[derive(Default)]
struct FakeState {
    connects: AtomicUsize,
    shutdowns: AtomicUsize,
    fail_connect: AtomicBool,
    hang_initialize: AtomicBool,
    fail_initialize: AtomicBool,
    fail_list: AtomicBool,
    hang_call: AtomicBool,
    fail_shutdown: AtomicBool,
    /// Liveness flag of every transport handed out, in connect order.
    transports: Mutex<Vec<Arc<AtomicBool>>>,
    calls: Mutex<Vec<(String, Value)>>,
    launches: Mutex<Vec<LaunchSpec>>,
    /// Each inner vec is one `tools/list` page.
    pages: Vec<Vec<&'static str>>,
}

struct FakeConnector {
    state: Arc<FakeState>,
}

struct FakeTransport {
    state: Arc<FakeState>,
    alive: Arc<AtomicBool>,
}

impl FakeState {
    /// Simulate the most recent server process dying on its own.
    fn crash_latest(&self) {
        if let Some(alive) = self.transports.lock().unwrap().last() {
            alive.store(false, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl McpConnector for FakeConnector {
    async fn connect(
        &self,
        launch: &LaunchSpec,
        _log: ServerLog,
    ) -> Result<Arc<dyn McpTransport>, TransportError> {
        if self.state.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::ProcessExited);
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        self.state.launches.lock().unwrap().push(launch.clone());
        let alive = Arc::new(AtomicBool::new(true));
        self.state.transports.lock().unwrap().push(alive.clone());
        Ok(Arc::new(FakeTransport {
            state: self.state.clone(),
            alive,
        }))
    }
}

#[async_trait]
impl McpTransport for FakeTransport {
    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse, TransportError> {
        match method {
            "initialize" => {
                if self.state.hang_initialize.load(Ordering::SeqCst) {
                    std::future::pending::<()>().await;
                }
                if self.state.fail_initialize.load(Ordering::SeqCst) {
                    return Ok(JsonRpcResponse::failure(1, -32603, "unsupported protocol"));
                }
                Ok(JsonRpcResponse::success(1, json!({ "protocolVersion": "2024-11-05" })))
            }
            "tools/list" => {
                if self.state.fail_list.load(Ordering::SeqCst) {
                    return Ok(JsonRpcResponse::failure(2, -32603, "catalog unavailable"));
                }
                let page: usize = params
                    .as_ref()
                    .and_then(|p| p["cursor"].as_str())
                    .and_then(|c| c.parse().ok())
                    .unwrap_or(0);
                let tools: Vec<Value> = self.state.pages[page]
                    .iter()
                    .map(|name| json!({ "name": name, "inputSchema": {} }))
                    .collect();
                let mut result = json!({ "tools": tools });
                if page + 1 < self.state.pages.len() {
                    result["nextCursor"] = json!((page + 1).to_string());
                }
                Ok(JsonRpcResponse::success(2, result))
            }
            "tools/call" => {
                if self.state.hang_call.load(Ordering::SeqCst) {
                    std::future::pending::<()>().await;
                }
                let params = params.unwrap_or_default();
                let name = params["name"].as_str().unwrap_or_default().to_owned();
                if name == "broken" {
                    return Ok(JsonRpcResponse::failure(3, -32602, "bad arguments"));
                }
                self.state
                    .calls
                    .lock()
                    .unwrap()
                    .push((name.clone(), params["arguments"].clone()));
                Ok(JsonRpcResponse::success(
                    3,
                    json!({ "content": [{ "type": "text", "text": format!("called {name}") }] }),
                ))
            }
            other => Ok(JsonRpcResponse::failure(9, -32601, format!("unknown method {other}"))),
        }
    }

    async fn send_notification(&self, _method: &str) -> Result<(), TransportError> {
        Ok(())
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        self.alive.store(false, Ordering::SeqCst);
        self.state.shutdowns.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_shutdown.load(Ordering::SeqCst) {
            return Err(TransportError::Io(std::io::Error::other("kill failed")));
        }
        Ok(())
    }
}

fn fake_state(pages: Vec<Vec<&'static str>>) -> Arc<FakeState> {
    Arc::new(FakeState {
        pages,
        ..FakeState::default()
    })
}

fn server(state: &Arc<FakeState>) -> McpServer {
    let spec = CommandSpec::new("slack", "npx")
        .args(["-y", "@modelcontextprotocol/server-slack"])
        .env_from_param("apiToken", "SLACK_BOT_TOKEN");
    McpServer::with_connector(
        Arc::new(spec),
        Arc::new(FakeConnector {
            state: state.clone(),
        }),
    )
}

fn params(token: &str) -> ToolsetParams {
    [("apiToken".to_owned(), token.to_owned())].into_iter().collect()
}

// ── Tests ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn start_list_and_call() {
    let state = fake_state(vec![vec!["send_message", "list_channels"]]);
    let server = server(&state);
    let cancel = CancellationToken::new();

    assert_eq!(server.status(), ToolsetStatus::Stopped);
    assert!(server.ensure_start(&params("x"), &cancel).await);
    assert_eq!(server.status(), ToolsetStatus::Running);

    let launch = state.launches.lock().unwrap()[0].clone();
    assert_eq!(launch.env.get("SLACK_BOT_TOKEN").map(String::as_str), Some("x"));

    let tools = server.list_tools().await;
    let names: Vec<_> = tools.iter().map(|t| t.name_on_server.as_str()).collect();
    assert_eq!(names, vec!["send_message", "list_channels"]);

    let out = server
        .execute_tool_call("send_message", json!({ "text": "hi" }), &cancel)
        .await
        .unwrap();
    assert_eq!(out, "called send_message");
    assert_eq!(state.calls.lock().unwrap()[0].1, json!({ "text": "hi" }));
}

#[tokio::test]
async fn identical_params_do_not_restart() {
    let state = fake_state(vec![vec!["a"]]);
    let server = server(&state);
    let cancel = CancellationToken::new();

    assert!(server.ensure_start(&params("x"), &cancel).await);
    assert!(server.ensure_start(&params("x"), &cancel).await);
    assert_eq!(state.connects.load(Ordering::SeqCst), 1);
    assert_eq!(state.shutdowns.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn changed_params_stop_then_restart() {
    let state = fake_state(vec![vec!["a"]]);
    let server = server(&state);
    let cancel = CancellationToken::new();

    assert!(server.ensure_start(&params("x"), &cancel).await);
    assert!(server.ensure_start(&params("y"), &cancel).await);
    assert_eq!(state.connects.load(Ordering::SeqCst), 2);
    assert_eq!(state.shutdowns.load(Ordering::SeqCst), 1);
    assert_eq!(server.status(), ToolsetStatus::Running);
}

#[tokio::test]
async fn concurrent_starts_connect_once() {
    let state = fake_state(vec![vec!["a"]]);
    let server = server(&state);
    let cancel = CancellationToken::new();
    let p = params("x");

    let (a, b) = tokio::join!(server.ensure_start(&p, &cancel), server.ensure_start(&p, &cancel));
    assert!(a && b);
    assert_eq!(state.connects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn connect_failure_is_logged_not_thrown() {
    let state = fake_state(vec![vec![]]);
    state.fail_connect.store(true, Ordering::SeqCst);
    let server = server(&state);

    assert!(!server.ensure_start(&params("x"), &CancellationToken::new()).await);
    assert_eq!(server.status(), ToolsetStatus::Stopped);
    assert!(server.logs().contains("start failed"));
}

#[tokio::test]
async fn missing_param_fails_before_spawning() {
    let state = fake_state(vec![vec![]]);
    let server = server(&state);

    assert!(!server.ensure_start(&ToolsetParams::new(), &CancellationToken::new()).await);
    assert_eq!(state.connects.load(Ordering::SeqCst), 0);
    assert!(server.logs().contains("apiToken"));
}

#[tokio::test(start_paused = true)]
async fn hung_handshake_times_out() {
    let state = fake_state(vec![vec![]]);
    state.hang_initialize.store(true, Ordering::SeqCst);
    let server = server(&state).with_timeouts(ServerTimeouts {
        start: Duration::from_secs(2),
        call: Duration::from_secs(2),
    });

    assert!(!server.ensure_start(&params("x"), &CancellationToken::new()).await);
    assert_eq!(server.status(), ToolsetStatus::Stopped);
    assert!(server.logs().contains("did not start within 2s"));
}

#[tokio::test]
async fn cancelled_start_returns_false() {
    let state = fake_state(vec![vec![]]);
    state.hang_initialize.store(true, Ordering::SeqCst);
    let server = server(&state);
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(!server.ensure_start(&params("x"), &cancel).await);
    assert!(server.logs().contains("cancelled"));
}

#[tokio::test]
async fn call_before_start_is_not_running() {
    let state = fake_state(vec![vec![]]);
    let server = server(&state);

    let err = server
        .execute_tool_call("send_message", json!({}), &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotRunning(ref name) if name == "slack"));
    assert!(server.list_tools().await.is_empty());
}

#[tokio::test]
async fn stop_is_idempotent() {
    let state = fake_state(vec![vec!["a"]]);
    let server = server(&state);

    server.ensure_stop().await;
    assert!(server.ensure_start(&params("x"), &CancellationToken::new()).await);
    server.ensure_stop().await;
    server.ensure_stop().await;
    assert_eq!(server.status(), ToolsetStatus::Stopped);
    assert_eq!(state.shutdowns.load(Ordering::SeqCst), 1);
    assert!(server.list_tools().await.is_empty());
}

#[tokio::test]
async fn provider_error_surfaces_as_mcp_error() {
    let state = fake_state(vec![vec!["broken"]]);
    let server = server(&state);
    let cancel = CancellationToken::new();
    assert!(server.ensure_start(&params("x"), &cancel).await);

    let err = server.execute_tool_call("broken", json!({}), &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Mcp(ref msg) if msg.contains("bad arguments")));
}

#[tokio::test]
async fn tool_catalog_follows_pagination() {
    let state = fake_state(vec![vec!["a", "b"], vec!["c"], vec!["d"]]);
    let server = server(&state);
    assert!(server.ensure_start(&params("x"), &CancellationToken::new()).await);

    let names: Vec<_> = server
        .list_tools()
        .await
        .into_iter()
        .map(|t| t.name_on_server)
        .collect();
    assert_eq!(names, vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn dead_process_reports_stopped_and_restarts() {
    let state = fake_state(vec![vec!["a"]]);
    let server = server(&state);
    let cancel = CancellationToken::new();

    assert!(server.ensure_start(&params("x"), &cancel).await);
    state.crash_latest();
    assert_eq!(server.status(), ToolsetStatus::Stopped);
    let err = server.execute_tool_call("a", json!({}), &cancel).await.unwrap_err();
    assert!(matches!(err, Error::NotRunning(_)));

    assert!(server.ensure_start(&params("x"), &cancel).await);
    assert_eq!(state.connects.load(Ordering::SeqCst), 2);
    assert_eq!(server.status(), ToolsetStatus::Running);
    assert_eq!(server.execute_tool_call("a", json!({}), &cancel).await.unwrap(), "called a");
}

#[tokio::test(start_paused = true)]
async fn hung_call_times_out() {
    let state = fake_state(vec![vec!["slow"]]);
    state.hang_call.store(true, Ordering::SeqCst);
    let server = server(&state).with_timeouts(ServerTimeouts {
        start: Duration::from_secs(2),
        call: Duration::from_secs(2),
    });
    let cancel = CancellationToken::new();
    assert!(server.ensure_start(&params("x"), &cancel).await);

    let err = server.execute_tool_call("slow", json!({}), &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Timeout(ref msg) if msg.contains("slow")));
    assert_eq!(server.status(), ToolsetStatus::Running);
}

#[tokio::test]
async fn cancelled_call_returns_cancelled() {
    let state = fake_state(vec![vec!["slow"]]);
    state.hang_call.store(true, Ordering::SeqCst);
    let server = server(&state);
    let cancel = CancellationToken::new();
    assert!(server.ensure_start(&params("x"), &cancel).await);

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.cancel();
    });
    let err = server.execute_tool_call("slow", json!({}), &cancel).await.unwrap_err();
    assert!(matches!(err, Error::Cancelled(ref msg) if msg.contains("slow")));
}

#[tokio::test]
async fn failed_catalog_is_logged_and_empty() {
    let state = fake_state(vec![vec!["a"]]);
    state.fail_list.store(true, Ordering::SeqCst);
    let server = server(&state);
    assert!(server.ensure_start(&params("x"), &CancellationToken::new()).await);

    assert!(server.list_tools().await.is_empty());
    let logs = server.logs();
    assert!(logs.contains("tools/list failed"));
    assert!(logs.contains("catalog unavailable"));
}

#[tokio::test]
async fn failed_handshake_logs_close_errors() {
    let state = fake_state(vec![vec![]]);
    state.fail_initialize.store(true, Ordering::SeqCst);
    state.fail_shutdown.store(true, Ordering::SeqCst);
    let server = server(&state);

    assert!(!server.ensure_start(&params("x"), &CancellationToken::new()).await);
    assert_eq!(state.shutdowns.load(Ordering::SeqCst), 1);
    let logs = server.logs();
    assert!(logs.contains("stop failed: transport I/O error: kill failed"));
    assert!(logs.contains("start failed"));
    assert!(logs.contains("unsupported protocol"));
    assert_eq!(server.status(), ToolsetStatus::Stopped);
}
