//! `camp-toolsets`: groups MCP servers and in-process tools into toolsets.
//!
//! A [`Toolset`] owns one or more [`camp_mcp_client::McpServer`]s plus any
//! [`CustomTool`]s, starts and stops them as a unit, and exposes their tools
//! under `{toolset}_{tool}` ids. The [`ToolsetManager`] keeps every toolset
//! in step with the persisted [`camp_domain::ToolsetConfig`].

pub mod builtin;
pub mod custom;
pub mod manager;
pub mod registration;
pub mod store;
pub mod toolset;

pub use builtin::{default_toolsets, default_toolsets_with_connector};
pub use custom::{CustomTool, FnTool};
pub use manager::{ServerSnapshot, ToolsetManager, ToolsetSnapshot};
pub use registration::{ServerRegistration, ToolRegistrationOption};
pub use store::{MemoryConfigStore, TomlConfigStore, ToolsetConfigStore};
pub use toolset::Toolset;
