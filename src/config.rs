//! Configuration types.

use std::path::PathBuf;

use crate::error::ConfigError;

/// Plan Bot runtime configuration, read from `PLAN_BOT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    /// libSQL database file.
    pub db_path: PathBuf,
    /// User whose plan the CLI and HTTP server operate on.
    pub user_id: String,
    /// Serve the REST API on this port. `None` disables it.
    pub http_port: Option<u16>,
    /// Also write daily-rotated log files here.
    pub log_dir: Option<PathBuf>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/plan-bot.db"),
            user_id: "default".to_string(),
            http_port: None,
            log_dir: None,
        }
    }
}

impl PlannerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key lookup. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let http_port = match get("PLAN_BOT_HTTP_PORT") {
            Some(raw) => Some(raw.parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "PLAN_BOT_HTTP_PORT".to_string(),
                message: format!("{raw:?} is not a port number: {e}"),
            })?),
            None => None,
        };

        Ok(Self {
            db_path: get("PLAN_BOT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            user_id: get("PLAN_BOT_USER").unwrap_or(defaults.user_id),
            http_port,
            log_dir: get("PLAN_BOT_LOG_DIR").map(PathBuf::from),
        })
    }
}
