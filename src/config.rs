//! Environment-driven configuration.
//!
//! Values are read from the process environment after loading a `.env`
//! file when one is present.

use dotenv::dotenv;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::services::reconciler::{ApplyMode, ReconcilerOptions};

const DEFAULT_SESSION_IDLE_TTL_SECS: u64 = 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),

    #[error("Invalid value '{value}' for {name}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Which storage backend the session service talks to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageMode {
    Http(StorageApiConfig),
    /// In-memory tables; nothing is persisted
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageApiConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    /// `None` keeps the HTTP client's default behavior
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub storage: StorageMode,
    pub reconciler: ReconcilerOptions,
    /// Reload a session's baseline from storage after each successful save
    pub refresh_after_save: bool,
    /// Editing sessions untouched for this long are dropped; `None` keeps
    /// them until they are closed
    pub session_idle_ttl: Option<Duration>,
    pub port: u16,
}

impl Settings {
    /// Load settings from `.env` and the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let storage = match get("STORAGE_MODE").as_deref().map(str::trim) {
            None | Some("http") => {
                let base_url =
                    get("STORAGE_API_BASE_URL").ok_or(ConfigError::Missing("STORAGE_API_BASE_URL"))?;
                let timeout = parse_var::<u64>(&get, "STORAGE_API_TIMEOUT_SECS")?
                    .map(Duration::from_secs);
                StorageMode::Http(StorageApiConfig {
                    base_url,
                    api_token: get("STORAGE_API_TOKEN"),
                    timeout,
                })
            }
            Some("memory") => StorageMode::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_MODE",
                    value: other.to_string(),
                    reason: "expected 'http' or 'memory'".to_string(),
                })
            }
        };

        let apply_mode = parse_var::<ApplyMode>(&get, "RECONCILER_APPLY_MODE")?.unwrap_or_default();
        let refresh_after_save = match get("RECONCILER_REFRESH_AFTER_SAVE") {
            Some(val) => parse_bool("RECONCILER_REFRESH_AFTER_SAVE", &val)?,
            None => true,
        };
        let session_idle_ttl = match parse_var::<u64>(&get, "SESSION_IDLE_TTL_SECS")? {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => Some(Duration::from_secs(DEFAULT_SESSION_IDLE_TTL_SECS)),
        };
        let port = parse_var::<u16>(&get, "SERVER_PORT")?.unwrap_or(3000);

        Ok(Self {
            storage,
            reconciler: ReconcilerOptions { apply_mode },
            refresh_after_save,
            session_idle_ttl,
            port,
        })
    }

    pub fn log_summary(&self) {
        match &self.storage {
            StorageMode::Http(api) => info!(
                "Using storage API at {} (auth token {})",
                api.base_url,
                if api.api_token.is_some() { "set" } else { "not set" }
            ),
            StorageMode::Memory => {
                info!("Running in simulation mode: timetable data is kept in memory only")
            }
        }
        info!(
            "Reconciler apply mode: {}, refresh after save: {}",
            self.reconciler.apply_mode, self.refresh_after_save
        );
        match self.session_idle_ttl {
            Some(ttl) => info!("Idle editing sessions expire after {}s", ttl.as_secs()),
            None => info!("Idle editing sessions never expire"),
        }
    }
}

fn parse_var<T>(
    get: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: ToString,
{
    get(name)
        .map(|value| {
            value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
                name,
                value: value.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_bool(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}
