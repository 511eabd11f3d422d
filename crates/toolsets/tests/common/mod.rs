//! In-process MCP provider used by the toolset integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use camp_domain::ToolsetParams;
use camp_mcp_client::protocol::JsonRpcResponse;
use camp_mcp_client::{
    CommandSpec, LaunchSpec, McpConnector, McpServer, McpTransport, ServerLog, TransportError,
};
use serde_json::{json, Value};

#[derive(Default)]
pub struct FakeProvider {
    pub tools: Vec<&'static str>,
    pub fail_connect: AtomicBool,
    pub connects: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub launches: Mutex<Vec<LaunchSpec>>,
    pub calls: Mutex<Vec<(String, Value)>>,
    /// Liveness flags of the transports handed out, in connect order.
    pub transports: Mutex<Vec<Arc<AtomicBool>>>,
}

impl FakeProvider {
    pub fn new(tools: &[&'static str]) -> Arc<Self> {
        Arc::new(Self {
            tools: tools.to_vec(),
            ..Self::default()
        })
    }

    pub fn failing() -> Arc<Self> {
        let provider = Self::new(&[]);
        provider.fail_connect.store(true, Ordering::SeqCst);
        provider
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(String, Value)> {
        self.calls.lock().unwrap().clone()
    }

    /// Simulate the latest server process exiting on its own.
    pub fn crash(&self) {
        if let Some(alive) = self.transports.lock().unwrap().last() {
            alive.store(false, Ordering::SeqCst);
        }
    }

    pub fn last_launch(&self) -> Option<LaunchSpec> {
        self.launches.lock().unwrap().last().cloned()
    }
}

pub struct FakeConnector(pub Arc<FakeProvider>);

struct FakeTransport {
    provider: Arc<FakeProvider>,
    alive: Arc<AtomicBool>,
}

#[async_trait]
impl McpConnector for FakeConnector {
    async fn connect(
        &self,
        launch: &LaunchSpec,
        _log: ServerLog,
    ) -> Result<Arc<dyn McpTransport>, TransportError> {
        if self.0.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::ProcessExited);
        }
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        self.0.launches.lock().unwrap().push(launch.clone());
        let alive = Arc::new(AtomicBool::new(true));
        self.0.transports.lock().unwrap().push(alive.clone());
        Ok(Arc::new(FakeTransport {
            provider: self.0.clone(),
            alive,
        }))
    }
}

#[async_trait]
impl McpTransport for FakeTransport {
    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse, TransportError> {
        match method {
            "initialize" => Ok(JsonRpcResponse::success(1, json!({}))),
            "tools/list" => {
                let tools: Vec<Value> = self
                    .provider
                    .tools
                    .iter()
                    .map(|name| json!({ "name": name, "description": format!("{name} tool"), "inputSchema": {} }))
                    .collect();
                Ok(JsonRpcResponse::success(2, json!({ "tools": tools })))
            }
            "tools/call" => {
                let params = params.unwrap_or_default();
                let name = params["name"].as_str().unwrap_or_default().to_owned();
                self.provider
                    .calls
                    .lock()
                    .unwrap()
                    .push((name.clone(), params["arguments"].clone()));
                Ok(JsonRpcResponse::success(
                    3,
                    json!({ "content": [{ "type": "text", "text": format!("ran {name}") }] }),
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
        self.provider.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A server named `name` that takes no parameters.
pub fn server(name: &str, provider: &Arc<FakeProvider>) -> McpServer {
    McpServer::with_connector(
        Arc::new(CommandSpec::new(name, "fake-mcp")),
        Arc::new(FakeConnector(provider.clone())),
    )
}

pub fn params(pairs: &[(&str, &str)]) -> ToolsetParams {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect()
}
