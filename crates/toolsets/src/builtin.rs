//! The toolsets Camp ships with.

use std::sync::Arc;

use serde_json::{json, Value};

use camp_domain::config::ToolsetsConfig;
use camp_domain::{Error, Result};
use camp_mcp_client::{CommandSpec, McpConnector, McpServer, ServerTimeouts, StdioConnector};

use crate::custom::FnTool;
use crate::registration::{ServerRegistration, ToolRegistrationOption};
use crate::toolset::Toolset;

/// GitHub tools exposed to the model; the write-heavy ones stay hidden.
const GITHUB_TOOLS: &[&str] = &[
    "search_repositories",
    "get_file_contents",
    "list_commits",
    "list_issues",
    "get_issue",
    "create_issue",
    "add_issue_comment",
    "list_pull_requests",
    "get_pull_request",
    "create_pull_request",
];

/// Built-in toolsets whose servers spawn real child processes.
pub fn default_toolsets(config: &ToolsetsConfig) -> Result<Vec<Toolset>> {
    default_toolsets_with_connector(config, Arc::new(StdioConnector))
}

/// Built-in toolsets whose servers connect through `connector`.
pub fn default_toolsets_with_connector(
    config: &ToolsetsConfig,
    connector: Arc<dyn McpConnector>,
) -> Result<Vec<Toolset>> {
    let server = |spec: CommandSpec| {
        McpServer::with_connector(Arc::new(spec), connector.clone())
            .with_timeouts(ServerTimeouts {
                start: config.start_timeout(),
                call: config.call_timeout(),
            })
            .with_log_capacity(config.log_buffer_bytes)
    };

    let mut slack = Toolset::new("slack");
    slack.add_server(
        server(
            CommandSpec::new("slack", "npx")
                .args(["-y", "@modelcontextprotocol/server-slack"])
                .env_from_param("apiToken", "SLACK_BOT_TOKEN")
                .env_from_param("teamId", "SLACK_TEAM_ID"),
        ),
        ToolRegistrationOption::All,
    );

    let mut github = Toolset::new("github");
    github.add_server(
        server(
            CommandSpec::new("github", "npx")
                .args(["-y", "@modelcontextprotocol/server-github"])
                .env_from_param("personalAccessToken", "GITHUB_PERSONAL_ACCESS_TOKEN"),
        ),
        ToolRegistrationOption::select(GITHUB_TOOLS.iter().copied()),
    );

    let files_root = config
        .files_root
        .as_ref()
        .map(|p| p.display().to_string());
    let mut files = Toolset::new("files");
    files.add_server(
        server(
            CommandSpec::new("files", "npx")
                .args(["-y", "@modelcontextprotocol/server-filesystem"])
                .arg_from_param("root", files_root),
        ),
        ToolRegistrationOption::All,
    );

    let mut web = Toolset::new("web");
    web.add_server(
        server(CommandSpec::new("web", "uvx").args(["mcp-server-fetch"])),
        ServerRegistration::new(ToolRegistrationOption::All)
            .rename("fetch", "fetch_url")
            .describe("fetch", "Fetch a URL and return its contents as markdown."),
    );

    let mut clock = Toolset::new("clock");
    clock.add_custom_tool(
        "current_time",
        json!({
            "type": "object",
            "properties": {
                "utc": {
                    "type": "boolean",
                    "description": "Return UTC instead of local time."
                }
            }
        }),
        FnTool::new(|args: Value| async move { current_time(&args) }),
        Some("The current date and time in RFC 3339 format.".to_owned()),
    )?;

    Ok(vec![slack, github, files, web, clock])
}

fn current_time(args: &Value) -> Result<String> {
    let utc = match args.get("utc") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(other) => return Err(Error::Other(format!("`utc` must be a boolean, got {other}"))),
    };
    Ok(if utc {
        chrono::Utc::now().to_rfc3339()
    } else {
        chrono::Local::now().to_rfc3339()
    })
}
