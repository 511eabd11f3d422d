//! `camp tools` and `camp call`.

use anyhow::Context;
use serde_json::Value;

use camp_toolsets::ToolsetManager;

use super::ctrl_c_token;

/// Start the enabled toolsets and warn about the ones that failed.
async fn start_enabled(manager: &ToolsetManager, cancel: &tokio_util::sync::CancellationToken) {
    for (name, ok) in manager.refresh(cancel).await {
        if !ok {
            eprintln!("warning: toolset {name} failed to start (see `camp toolsets enable {name}`)");
        }
    }
}

pub async fn list(manager: &ToolsetManager, toolset: Option<&str>, json: bool) -> anyhow::Result<()> {
    if let Some(name) = toolset {
        anyhow::ensure!(manager.toolset(name).is_some(), "unknown toolset: {name}");
    }

    start_enabled(manager, &ctrl_c_token()).await;
    let tools: Vec<_> = manager
        .list_tools()
        .into_iter()
        .filter(|t| toolset.map_or(true, |name| t.toolset_name == name))
        .collect();
    manager.shutdown().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&tools)?);
        return Ok(());
    }
    if tools.is_empty() {
        println!("no tools available (enable a toolset with `camp toolsets enable <name>`)");
    }
    for tool in &tools {
        match &tool.description {
            Some(desc) => println!("{:<32} {}", tool.id(), first_line(desc)),
            None => println!("{}", tool.id()),
        }
    }
    Ok(())
}

pub async fn call(manager: &ToolsetManager, tool_id: &str, args: &str) -> anyhow::Result<()> {
    let args = parse_args(args)?;
    let cancel = ctrl_c_token();

    start_enabled(manager, &cancel).await;
    let result = manager.execute(tool_id, args, &cancel).await;
    manager.shutdown().await;

    let output = result.with_context(|| format!("calling {tool_id}"))?;
    println!("{output}");
    Ok(())
}

/// Tool arguments must be a JSON object.
fn parse_args(raw: &str) -> anyhow::Result<Value> {
    let value: Value = serde_json::from_str(raw).context("--args is not valid JSON")?;
    anyhow::ensure!(value.is_object(), "--args must be a JSON object");
    Ok(value)
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
