//! In-process tools that run without an MCP server.

use std::future::Future;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use camp_domain::Result;

/// Implement this trait to expose a Rust function as a toolset tool.
///
/// # Example
///
/// ```rust,ignore
/// struct Ping;
///
/// #[async_trait::async_trait]
/// impl CustomTool for Ping {
///     async fn call(&self, _args: Value, _cancel: CancellationToken) -> Result<String> {
///         Ok("pong".into())
///     }
/// }
/// ```
#[async_trait]
pub trait CustomTool: Send + Sync + 'static {
    /// Run the tool. The returned string goes back to the conversation.
    async fn call(&self, args: Value, cancel: CancellationToken) -> Result<String>;
}

/// Adapter that turns an async closure into a [`CustomTool`].
pub struct FnTool<F> {
    f: F,
}

impl<F, Fut> FnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> CustomTool for FnTool<F>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String>> + Send + 'static,
{
    async fn call(&self, args: Value, _cancel: CancellationToken) -> Result<String> {
        (self.f)(args).await
    }
}
