//! Board configuration loaded with figment
//!
//! Sources in precedence order (later wins):
//! 1. built-in defaults
//! 2. an optional `kanban.{toml,yaml,yml,json}` file
//! 3. `KANBAN_`-prefixed environment variables (`KANBAN_NOTIFY_SUCCESS=false`)

use crate::error::Result;
use crate::view::TaskFilter;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "KANBAN_";

/// Base name of the optional config file
pub const CONFIG_FILE_STEM: &str = "kanban";

/// How persistence calls are scheduled relative to each other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceOrdering {
    /// Every call is sent as soon as its mutation is applied
    #[default]
    Concurrent,
    /// Calls touching the same column are sent one at a time, in issue order
    PerColumn,
}

/// Runtime settings for a board controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Task statuses hidden from the board display
    pub hidden_statuses: Vec<String>,
    pub ordering: PersistenceOrdering,
    /// Show a success notification when a rename or delete is persisted
    pub notify_success: bool,
    /// Fail persistence calls that take longer than this
    pub persistence_timeout_ms: Option<u64>,
    /// Directory used by file-backed storage
    pub storage_dir: PathBuf,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            hidden_statuses: vec!["NOT_STARTED".to_string()],
            ordering: PersistenceOrdering::Concurrent,
            notify_success: true,
            persistence_timeout_ms: None,
            storage_dir: PathBuf::from(".kanban"),
        }
    }
}

impl BoardConfig {
    /// Load from defaults, `kanban.*` in the current directory, and the environment
    pub fn load() -> Result<Self> {
        Self::load_from(".")
    }

    /// Load from defaults, `kanban.*` in `dir`, and the environment
    pub fn load_from(dir: impl AsRef<Path>) -> Result<Self> {
        let figment = Self::figment(dir.as_ref());
        let config: Self = figment.extract()?;
        debug!(?config, "loaded board configuration");
        Ok(config)
    }

    fn figment(dir: &Path) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        for ext in ["toml", "yaml", "yml", "json"] {
            let path = dir.join(format!("{}.{}", CONFIG_FILE_STEM, ext));
            if !path.is_file() {
                continue;
            }
            debug!(path = %path.display(), "merging config file");
            figment = match ext {
                "toml" => figment.merge(Toml::file(path)),
                "json" => figment.merge(Json::file(path)),
                _ => figment.merge(Yaml::file(path)),
            };
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Filter built from `hidden_statuses`
    pub fn task_filter(&self) -> TaskFilter {
        TaskFilter::hiding(self.hidden_statuses.iter().cloned())
    }

    pub fn persistence_timeout(&self) -> Option<Duration> {
        self.persistence_timeout_ms.map(Duration::from_millis)
    }
}
