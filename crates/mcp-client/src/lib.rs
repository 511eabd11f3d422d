//! `camp-mcp-client`: MCP (Model Context Protocol) client for Camp.
//!
//! This crate provides:
//! - JSON-RPC 2.0 protocol types for communicating with MCP servers.
//! - A stdio transport that spawns child processes and communicates over stdin/stdout.
//! - [`McpServer`], which owns the lifecycle of one server and is configured
//!   through an [`McpServerSpec`] that supplies the launch parameters.
//!
//! # Usage
//!
//! ```rust,ignore
//! use camp_mcp_client::{CommandSpec, McpServer};
//!
//! let spec = CommandSpec::new("slack", "npx")
//!     .args(["-y", "@modelcontextprotocol/server-slack"])
//!     .env_from_param("apiToken", "SLACK_BOT_TOKEN");
//! let server = McpServer::new(Arc::new(spec));
//!
//! if server.ensure_start(&params, &CancellationToken::new()).await {
//!     for tool in server.list_tools().await {
//!         println!("{}", tool.name_on_server);
//!     }
//! }
//! ```

pub mod log;
pub mod protocol;
pub mod server;
pub mod spec;
pub mod transport;

// Re-exports for convenience.
pub use log::ServerLog;
pub use server::{McpServer, ServerTimeouts};
pub use spec::{CommandSpec, LaunchSpec, McpServerSpec};
pub use transport::{McpConnector, McpTransport, StdioConnector, TransportError};
