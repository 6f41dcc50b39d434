use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub mod cache;
pub mod calendar;
pub mod day_detail;
pub mod enrichment;
pub mod export;
pub mod holidays;
pub mod sync;

/// The only calendar year this application knows holidays for.
pub const YEAR: i32 = 2026;

/// Result type used throughout this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The error type returned by all fallible operations within this crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("PDF error: {0}")]
    Pdf(#[from] printpdf::Error),
    #[error("enrichment client error: {0}")]
    Gemini(#[from] enrichment::gemini::ClientError),
    #[error("no enrichment fetcher configured")]
    FetcherUnavailable,
    #[error("invalid month: {0}")]
    InvalidMonth(u32),
    #[error("invalid date: {0}")]
    InvalidDate(String),
}

/// Website specific configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct SiteConfig {
    /// The site title.
    pub title: String,
    /// The tagline displayed below the site title.
    pub tagline: String,
    /// Optional site description. This is used in the description meta tag.
    pub description: Option<String>,
}

/// Web server configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct ServerConfig {
    /// Address on which the web server will listen.
    pub listen_addr: SocketAddr,
    /// Automatically reload templates when they are modified.
    pub template_autoreload: bool,
    /// Path to the template directory.
    pub template_dir: PathBuf,
    /// Path to the static directory.
    pub static_dir: PathBuf,
}

/// Configuration of the generative text service.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct EnrichmentConfig {
    /// API key. Without a key no requests are made and fallback texts are shown.
    pub api_key: Option<String>,
    /// Base URL of the generative language API.
    pub endpoint: String,
    /// Model used to generate texts.
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl EnrichmentConfig {
    /// Returns the API key if one is set and not blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Batch sync configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct SyncConfig {
    /// Pause between two batches in milliseconds.
    pub batch_delay_ms: u64,
}

impl SyncConfig {
    pub fn batch_delay(&self) -> Duration {
        Duration::from_millis(self.batch_delay_ms)
    }
}

/// Storage configuration for the day detail cache.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct StorageConfig {
    /// JSON file holding cached day details. Kept in memory only if unset.
    pub cache_path: Option<PathBuf>,
}

/// Global application configuration.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct AppConfig {
    /// Server configuration section.
    pub server: ServerConfig,
    /// Website configuration section.
    pub site: SiteConfig,
    /// Generative text service section.
    pub enrichment: EnrichmentConfig,
    /// Batch sync section.
    pub sync: SyncConfig,
    /// Day detail storage section.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Loads the application configuration from files in the `config/` directory and environment
    /// variables.
    pub fn load() -> Result<AppConfig> {
        let app_env = env::var("APP_ENV").unwrap_or_else(|_| "development".into());

        log::info!("loading configuration using {} environment", app_env);

        let mut config: AppConfig = Config::builder()
            // Configuration defaults from `config/default.toml`.
            .add_source(File::with_name("config/default"))
            // Optional environment specific config overrides, e.g. `config/production.toml`.
            .add_source(File::with_name(&format!("config/{}", app_env)).required(false))
            // Optional local config overrides from `config/local.toml` (on .gitignore).
            .add_source(File::with_name("config/local").required(false))
            // Config from environment variables prefixed with `KAL_`.
            .add_source(
                Environment::with_prefix("KAL")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        if config.enrichment.api_key().is_none() {
            config.enrichment.api_key = env::var("GEMINI_API_KEY").ok();
        }

        // Never log the API key.
        log::debug!(
            "loaded configuration: server={:?} sync={:?} storage={:?} enrichment model={}",
            config.server,
            config.sync,
            config.storage,
            config.enrichment.model
        );

        Ok(config)
    }
}
