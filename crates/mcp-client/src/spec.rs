//! Launch parameters for MCP servers.
//!
//! An [`McpServerSpec`] is the only thing that differs between providers:
//! it turns a toolset's parameter bag into the command line, environment
//! and working directory for one server process.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use camp_domain::{Error, Result, ToolsetParams};

/// How to spawn one MCP server process.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LaunchSpec {
    pub command: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: Option<PathBuf>,
}

impl LaunchSpec {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

/// Prints the command line and env *keys* only; values are usually secrets.
impl fmt::Display for LaunchSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.command)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        if !self.env.is_empty() {
            let keys: Vec<&str> = self.env.keys().map(String::as_str).collect();
            write!(f, " (env: {})", keys.join(", "))?;
        }
        Ok(())
    }
}

/// Provider-specific part of an MCP server.
pub trait McpServerSpec: Send + Sync {
    /// Stable server name, used in logs and per-server status.
    fn name(&self) -> &str;

    /// Resolve the launch parameters for the given toolset parameters.
    fn launch_spec(&self, params: &ToolsetParams) -> Result<LaunchSpec>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CommandSpec
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Where a toolset parameter ends up in the launch spec.
#[derive(Debug, Clone)]
enum ParamBinding {
    Env { param: String, var: String, required: bool },
    Arg { param: String, default: Option<String> },
}

/// Declarative [`McpServerSpec`]: a fixed command plus parameter bindings.
///
/// ```rust,ignore
/// let slack = CommandSpec::new("slack", "npx")
///     .args(["-y", "@modelcontextprotocol/server-slack"])
///     .env_from_param("apiToken", "SLACK_BOT_TOKEN");
/// ```
#[derive(Debug, Clone)]
pub struct CommandSpec {
    name: String,
    base: LaunchSpec,
    bindings: Vec<ParamBinding>,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base: LaunchSpec::new(command),
            bindings: Vec::new(),
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.base = self.base.args(args);
        self
    }

    /// Set a constant environment variable.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.base = self.base.env(key, value);
        self
    }

    /// Copy a required parameter into an environment variable.
    pub fn env_from_param(mut self, param: impl Into<String>, var: impl Into<String>) -> Self {
        self.bindings.push(ParamBinding::Env {
            param: param.into(),
            var: var.into(),
            required: true,
        });
        self
    }

    /// Copy a parameter into an environment variable when it is present.
    pub fn optional_env_from_param(
        mut self,
        param: impl Into<String>,
        var: impl Into<String>,
    ) -> Self {
        self.bindings.push(ParamBinding::Env {
            param: param.into(),
            var: var.into(),
            required: false,
        });
        self
    }

    /// Append a parameter as a trailing argument, falling back to `default`.
    /// Without a default the parameter is required.
    pub fn arg_from_param(mut self, param: impl Into<String>, default: Option<String>) -> Self {
        self.bindings.push(ParamBinding::Arg {
            param: param.into(),
            default,
        });
        self
    }
}

impl McpServerSpec for CommandSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn launch_spec(&self, params: &ToolsetParams) -> Result<LaunchSpec> {
        let mut spec = self.base.clone();
        let missing = |param: &str| Error::MissingParam {
            toolset: self.name.clone(),
            param: param.to_owned(),
        };
        let lookup = |param: &str| params.get(param).filter(|v| !v.trim().is_empty());

        for binding in &self.bindings {
            match binding {
                ParamBinding::Env { param, var, required } => {
                    if let Some(value) = lookup(param) {
                        spec.env.insert(var.clone(), value.clone());
                    } else if *required {
                        return Err(missing(param));
                    }
                }
                ParamBinding::Arg { param, default } => {
                    let value = lookup(param)
                        .cloned()
                        .or_else(|| default.clone())
                        .ok_or_else(|| missing(param))?;
                    spec.args.push(value);
                }
            }
        }
        Ok(spec)
    }
}
