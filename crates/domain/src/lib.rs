//! `camp-domain`: types shared by every Camp crate.
//!
//! Tool identities, toolset lifecycle status, the shared error type and
//! the configuration structs deserialized from `camp.toml`.

pub mod config;
pub mod error;
pub mod tool;

pub use error::{Error, Result};
pub use tool::{ServerTool, ToolsetConfig, ToolsetParams, ToolsetStatus, UserTool};
