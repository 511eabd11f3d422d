use clap::Parser;
use tracing_subscriber::EnvFilter;

use camp_cli::cli::{self, Cli, Command, ConfigCommand, ToolsetsCommand};
use camp_domain::config::ObservabilityConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Version => {
            println!("camp {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Config(ConfigCommand::Validate) => {
            let (config, config_path) = cli::load_config()?;
            if !cli::config::validate(&config, &config_path) {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Config(ConfigCommand::Show) => {
            let (config, _) = cli::load_config()?;
            cli::config::show(&config)
        }
        Command::Toolsets(cmd) => {
            let (config, _) = cli::load_config()?;
            init_tracing(&config.observability);
            let manager = cli::build_manager(&config)?;
            let ok = match cmd {
                ToolsetsCommand::List { json } => {
                    cli::toolsets::list(&manager, json)?;
                    true
                }
                ToolsetsCommand::Enable { name } => cli::toolsets::set_enabled(&manager, &name, true).await?,
                ToolsetsCommand::Disable { name } => cli::toolsets::set_enabled(&manager, &name, false).await?,
                ToolsetsCommand::Set { name, key, value } => {
                    cli::toolsets::set_param(&manager, &name, &key, &value).await?
                }
            };
            if !ok {
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Tools { toolset, json } => {
            let (config, _) = cli::load_config()?;
            init_tracing(&config.observability);
            let manager = cli::build_manager(&config)?;
            cli::tools::list(&manager, toolset.as_deref(), json).await
        }
        Command::Call { tool_id, args } => {
            let (config, _) = cli::load_config()?;
            init_tracing(&config.observability);
            let manager = cli::build_manager(&config)?;
            cli::tools::call(&manager, &tool_id, &args).await
        }
    }
}

/// Logs go to stderr so tool output on stdout stays clean. `RUST_LOG`
/// overrides the configured filter.
fn init_tracing(obs: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&obs.log_filter));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if obs.json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}
