use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{anyhow, Result};
use tracing::info;

/// Database connection settings
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub busy_timeout_ms: u64,
}

/// Server settings, loaded from `SALES_*` environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database: DatabaseConfig,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub request_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; missing keys fall back to defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            host: try_load(&lookup, "SALES_HOST", "0.0.0.0")?,
            port: try_load(&lookup, "SALES_PORT", "3000")?,
            database: DatabaseConfig {
                path: try_load(&lookup, "SALES_DATABASE", "sales.db")?,
                busy_timeout_ms: try_load(&lookup, "SALES_DB_BUSY_TIMEOUT_MS", "5000")?,
            },
            upload_dir: try_load(&lookup, "SALES_UPLOAD_DIR", "uploads")?,
            max_upload_bytes: try_load(&lookup, "SALES_MAX_UPLOAD_BYTES", "10485760")?,
            request_timeout: Duration::from_secs(try_load(
                &lookup,
                "SALES_REQUEST_TIMEOUT_SECS",
                "30",
            )?),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn try_load<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: &str,
) -> Result<T>
where
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim()
        .parse()
        .map_err(|e| anyhow!("Invalid {key} value {raw:?}: {e}"))
}
