//! Persistence for per-toolset parameters.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use camp_domain::{Error, Result, ToolsetConfig};

/// Reads and writes the persisted [`ToolsetConfig`].
pub trait ToolsetConfigStore: Send + Sync {
    fn load(&self) -> Result<ToolsetConfig>;
    fn save(&self, config: &ToolsetConfig) -> Result<()>;
}

/// Keeps the configuration in memory only.
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    config: Mutex<ToolsetConfig>,
}

impl MemoryConfigStore {
    pub fn new(initial: ToolsetConfig) -> Self {
        Self {
            config: Mutex::new(initial),
        }
    }
}

impl ToolsetConfigStore for MemoryConfigStore {
    fn load(&self) -> Result<ToolsetConfig> {
        Ok(self.config.lock().clone())
    }

    fn save(&self, config: &ToolsetConfig) -> Result<()> {
        *self.config.lock() = config.clone();
        Ok(())
    }
}

/// A TOML file with one table per toolset:
///
/// ```toml
/// [slack]
/// enabled = "true"
/// apiToken = "xoxb-..."
/// ```
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ToolsetConfigStore for TomlConfigStore {
    fn load(&self) -> Result<ToolsetConfig> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no toolset config yet");
                return Ok(ToolsetConfig::default());
            }
            Err(e) => return Err(e.into()),
        };
        toml::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", self.path.display())))
    }

    fn save(&self, config: &ToolsetConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let text = toml::to_string_pretty(config)
            .map_err(|e| Error::Config(format!("serializing toolset config: {e}")))?;

        // Write to a sibling file first so a crash never leaves half a config.
        let tmp = self.path.with_extension("toml.tmp");
        std::fs::write(&tmp, text)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
