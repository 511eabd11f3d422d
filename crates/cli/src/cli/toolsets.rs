//! `camp toolsets ...`: inspect and configure toolsets.

use camp_domain::tool::ENABLED_KEY;
use camp_toolsets::ToolsetManager;

use super::ctrl_c_token;

/// Print each toolset with its enabled flag and the names (never values)
/// of its stored parameters.
pub fn list(manager: &ToolsetManager, json: bool) -> anyhow::Result<()> {
    let snapshot = manager.status();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let config = manager.config();
    for toolset in &snapshot {
        let keys: Vec<&str> = config
            .params(&toolset.name)
            .map(|p| {
                p.keys()
                    .map(String::as_str)
                    .filter(|k| *k != ENABLED_KEY)
                    .collect()
            })
            .unwrap_or_default();
        let flag = if toolset.enabled { "enabled" } else { "disabled" };
        if keys.is_empty() {
            println!("{:<10} {flag}", toolset.name);
        } else {
            println!("{:<10} {flag:<9} params: {}", toolset.name, keys.join(", "));
        }
    }
    Ok(())
}

/// Enable or disable a toolset. Enabling starts it once to surface
/// configuration problems, then stops it again.
pub async fn set_enabled(manager: &ToolsetManager, name: &str, enabled: bool) -> anyhow::Result<bool> {
    let ok = manager.set_enabled(name, enabled, &ctrl_c_token()).await?;
    if !enabled {
        println!("{name}: disabled");
        return Ok(true);
    }

    report_start(manager, name, ok);
    manager.shutdown().await;
    Ok(ok)
}

pub async fn set_param(manager: &ToolsetManager, name: &str, key: &str, value: &str) -> anyhow::Result<bool> {
    let ok = manager.set_param(name, key, value, &ctrl_c_token()).await?;
    println!("{name}: stored {key}");
    if manager.config().is_enabled(name) {
        report_start(manager, name, ok);
    }
    manager.shutdown().await;
    Ok(ok)
}

fn report_start(manager: &ToolsetManager, name: &str, ok: bool) {
    if ok {
        let count = manager
            .toolset(name)
            .map(|t| t.list_tools().len())
            .unwrap_or_default();
        println!("{name}: started, {count} tool(s)");
        return;
    }

    println!("{name}: failed to start");
    if let Some(toolset) = manager.toolset(name) {
        for (server, log) in toolset.server_logs() {
            if log.is_empty() {
                continue;
            }
            eprintln!("── {server} ──");
            eprint!("{log}");
        }
    }
}
