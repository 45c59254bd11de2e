//! Configuration module for the gallery cache.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::DEFAULT_JOURNAL_RETRIES;

const DEFAULT_API_URL: &str = "https://my-json-server.typicode.com/MostafaKMilly/demo";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

/// Log output format for the subscriber installed by the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the REST backend
    pub api_url: String,
    /// Path to the SQLite file backing the durable key-value store
    pub db_path: PathBuf,
    /// Transport-side request timeout (the cache itself imposes none)
    pub http_timeout: Duration,
    /// Compare-and-swap attempts per journal mutation
    pub journal_retries: usize,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_url = env::var("GALLERY_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());

        let db_path = env::var("GALLERY_DB_PATH")
            .unwrap_or_else(|_| "./data/cache.sqlite".to_string())
            .into();

        let http_timeout = env::var("GALLERY_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));

        let journal_retries = env::var("GALLERY_JOURNAL_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n: &usize| *n > 0)
            .unwrap_or(DEFAULT_JOURNAL_RETRIES);

        let log_level = env::var("GALLERY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let log_format = match env::var("GALLERY_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Self {
            api_url,
            db_path,
            http_timeout,
            journal_retries,
            log_level,
            log_format,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            db_path: PathBuf::from("./data/cache.sqlite"),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            journal_retries: DEFAULT_JOURNAL_RETRIES,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}
