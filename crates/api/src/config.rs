use std::str::FromStr;

use rapport_core::formats::vcard::MultiValuePolicy;
use rapport_core::importer::{
    ImportConfig, DEFAULT_MAX_FILE_BYTES, DEFAULT_SAMPLE_ROWS, DEFAULT_SESSION_TTL_SECS,
};

/// Default sweep period for expired import sessions.
pub const DEFAULT_EVICTION_INTERVAL_SECS: u64 = 60;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How often expired import sessions are swept (default: `60`).
    pub eviction_interval_secs: u64,
    /// Import pipeline limits and policies.
    pub import: ImportConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                 |
    /// |---------------------------------|-------------------------|
    /// | `HOST`                          | `0.0.0.0`               |
    /// | `PORT`                          | `3000`                  |
    /// | `CORS_ORIGINS`                  | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`          | `30`                    |
    /// | `IMPORT_MAX_FILE_BYTES`         | `5242880`               |
    /// | `IMPORT_MAX_ROWS`               | unset (no cap)          |
    /// | `IMPORT_SESSION_TTL_SECS`       | `1800`                  |
    /// | `IMPORT_SAMPLE_ROWS`            | `5`                     |
    /// | `IMPORT_EVICTION_INTERVAL_SECS` | `60`                    |
    /// | `IMPORT_VCARD_MULTI_VALUE`      | `first`                 |
    ///
    /// Panics on malformed values so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_or("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_or("REQUEST_TIMEOUT_SECS", 30);
        let eviction_interval_secs: u64 =
            env_or("IMPORT_EVICTION_INTERVAL_SECS", DEFAULT_EVICTION_INTERVAL_SECS);

        let max_rows = std::env::var("IMPORT_MAX_ROWS")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(|v| {
                v.trim()
                    .parse::<usize>()
                    .expect("IMPORT_MAX_ROWS must be a valid usize")
            });

        let vcard_policy: MultiValuePolicy =
            env_or("IMPORT_VCARD_MULTI_VALUE", MultiValuePolicy::default());

        let import = ImportConfig {
            max_file_bytes: env_or("IMPORT_MAX_FILE_BYTES", DEFAULT_MAX_FILE_BYTES),
            max_rows,
            session_ttl_secs: env_or("IMPORT_SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS),
            sample_rows: env_or("IMPORT_SAMPLE_ROWS", DEFAULT_SAMPLE_ROWS),
            vcard_policy,
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            eviction_interval_secs,
            import,
        }
    }
}

/// Read and parse an env var, falling back to `default` when unset.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => default,
    }
}
