//! Which server tools a toolset imports, and under what names.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use camp_domain::{ServerTool, UserTool};

/// Policy applied to a server's catalog each time the server starts.
#[derive(Clone)]
pub enum ToolRegistrationOption {
    /// Import every tool the server offers.
    All,
    /// Import nothing (the server runs for side effects only).
    None,
    /// Import the tools for which the predicate returns `true`.
    Filter(Arc<dyn Fn(&ServerTool) -> bool + Send + Sync>),
    /// Import exactly the named tools (by name on the server).
    Select(Vec<String>),
}

impl ToolRegistrationOption {
    pub fn filter(predicate: impl Fn(&ServerTool) -> bool + Send + Sync + 'static) -> Self {
        Self::Filter(Arc::new(predicate))
    }

    pub fn select<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Select(names.into_iter().map(Into::into).collect())
    }

    fn includes(&self, tool: &ServerTool) -> bool {
        match self {
            Self::All => true,
            Self::None => false,
            Self::Filter(predicate) => predicate(tool),
            Self::Select(names) => names.iter().any(|n| *n == tool.name_on_server),
        }
    }
}

impl fmt::Debug for ToolRegistrationOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("All"),
            Self::None => f.write_str("None"),
            Self::Filter(_) => f.write_str("Filter(..)"),
            Self::Select(names) => f.debug_tuple("Select").field(names).finish(),
        }
    }
}

/// A registration policy plus optional renames and description overrides,
/// all keyed by the tool's name on the server.
#[derive(Debug, Clone)]
pub struct ServerRegistration {
    pub policy: ToolRegistrationOption,
    pub rename: HashMap<String, String>,
    pub descriptions: HashMap<String, String>,
}

impl ServerRegistration {
    pub fn new(policy: ToolRegistrationOption) -> Self {
        Self {
            policy,
            rename: HashMap::new(),
            descriptions: HashMap::new(),
        }
    }

    /// Expose `name_on_server` as `display_name_suffix`.
    pub fn rename(mut self, name_on_server: impl Into<String>, suffix: impl Into<String>) -> Self {
        self.rename.insert(name_on_server.into(), suffix.into());
        self
    }

    pub fn describe(mut self, name_on_server: impl Into<String>, description: impl Into<String>) -> Self {
        self.descriptions.insert(name_on_server.into(), description.into());
        self
    }

    pub fn with_rename_map(mut self, map: HashMap<String, String>) -> Self {
        self.rename.extend(map);
        self
    }

    pub fn with_description_map(mut self, map: HashMap<String, String>) -> Self {
        self.descriptions.extend(map);
        self
    }

    /// Turn a server catalog into user tools, paired with the server-side name.
    pub(crate) fn apply(&self, toolset_name: &str, tools: Vec<ServerTool>) -> Vec<(UserTool, String)> {
        if let ToolRegistrationOption::Select(names) = &self.policy {
            for name in names {
                if !tools.iter().any(|t| t.name_on_server == *name) {
                    tracing::warn!(
                        toolset = %toolset_name,
                        tool = %name,
                        "selected tool not offered by server"
                    );
                }
            }
        }

        tools
            .into_iter()
            .filter(|t| self.policy.includes(t))
            .map(|t| {
                let suffix = self
                    .rename
                    .get(&t.name_on_server)
                    .cloned()
                    .unwrap_or_else(|| t.name_on_server.clone());
                let description = self
                    .descriptions
                    .get(&t.name_on_server)
                    .cloned()
                    .or(t.description);
                let user_tool = UserTool {
                    toolset_name: toolset_name.to_owned(),
                    display_name_suffix: suffix,
                    description,
                    input_schema: t.input_schema,
                };
                (user_tool, t.name_on_server)
            })
            .collect()
    }
}

impl From<ToolRegistrationOption> for ServerRegistration {
    fn from(policy: ToolRegistrationOption) -> Self {
        Self::new(policy)
    }
}
