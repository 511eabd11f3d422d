pub mod config;
pub mod tools;
pub mod toolsets;

use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use camp_domain::config::Config;
use camp_toolsets::{default_toolsets, TomlConfigStore, ToolsetManager};

/// Camp: manage the toolsets and MCP servers available to chats.
#[derive(Debug, Parser)]
#[command(name = "camp", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Inspect and configure toolsets.
    #[command(subcommand)]
    Toolsets(ToolsetsCommand),
    /// Start the enabled toolsets and list the tools they expose.
    Tools {
        /// Only list tools from this toolset.
        #[arg(long)]
        toolset: Option<String>,
        /// Print the tools as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Start the enabled toolsets and run one tool.
    Call {
        /// Namespaced tool id, e.g. `slack_send_message`.
        tool_id: String,
        /// Tool arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,
    },
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ToolsetsCommand {
    /// Show every toolset with its enabled flag and stored parameters.
    List {
        /// Print the snapshot as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Enable a toolset and check that its servers start.
    Enable { name: String },
    /// Disable a toolset.
    Disable { name: String },
    /// Store a toolset parameter (API key, root directory, ...).
    Set {
        name: String,
        key: String,
        value: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path in `CAMP_CONFIG` (or `camp.toml`
/// by default). A missing file yields the defaults.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("CAMP_CONFIG").unwrap_or_else(|_| "camp.toml".into());
    let config = load_config_from(&config_path)?;
    Ok((config, config_path))
}

pub fn load_config_from(config_path: &str) -> anyhow::Result<Config> {
    if !std::path::Path::new(config_path).exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(config_path).with_context(|| format!("reading {config_path}"))?;
    toml::from_str(&raw).with_context(|| format!("parsing {config_path}"))
}

/// Build the manager over the built-in toolsets and the persisted toolset
/// parameters.
pub fn build_manager(config: &Config) -> anyhow::Result<ToolsetManager> {
    let store = Arc::new(TomlConfigStore::new(&config.toolsets.config_path));
    let toolsets = default_toolsets(&config.toolsets).context("building built-in toolsets")?;
    ToolsetManager::new(toolsets, store)
        .with_context(|| format!("loading {}", config.toolsets.config_path.display()))
}

/// A token cancelled on Ctrl-C.
pub fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let child = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, cancelling");
            child.cancel();
        }
    });
    token
}
