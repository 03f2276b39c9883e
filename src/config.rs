use crate::descriptor::ServerDescriptor;
use crate::protocols::discord::DEFAULT_API_BASE;
use crate::protocols::Timeouts;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_ENV: &str = "GAMEPING_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "gameping.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub servers: Vec<ServerDescriptor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_socket_timeout")]
    pub socket_timeout_ms: u64,
    #[serde(default = "default_http_timeout")]
    pub http_timeout_ms: u64,
    #[serde(default = "default_http_total_timeout")]
    pub http_total_timeout_ms: u64,
    /// Outer bound on a whole query, DNS and fallbacks included.
    #[serde(default = "default_query_deadline")]
    pub query_deadline_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_api_base")]
    pub discord_api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// 0 polls once and exits.
    #[serde(default)]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub gs4: bool,
}

fn default_socket_timeout() -> u64 {
    3000
}

fn default_http_timeout() -> u64 {
    5000
}

fn default_http_total_timeout() -> u64 {
    10000
}

fn default_query_deadline() -> u64 {
    15000
}

fn default_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; gameping/{}; server status monitor)",
        env!("CARGO_PKG_VERSION")
    )
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_workers() -> usize {
    10
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            socket_timeout_ms: default_socket_timeout(),
            http_timeout_ms: default_http_timeout(),
            http_total_timeout_ms: default_http_total_timeout(),
            query_deadline_ms: default_query_deadline(),
            user_agent: default_user_agent(),
            discord_api_base: default_api_base(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_cache_ttl(),
        }
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            interval_secs: 0,
        }
    }
}

impl EngineConfig {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            socket: Duration::from_millis(self.socket_timeout_ms),
            http: Duration::from_millis(self.http_timeout_ms),
            http_total: Duration::from_millis(self.http_total_timeout_ms),
        }
    }

    pub fn query_deadline(&self) -> Duration {
        Duration::from_millis(self.query_deadline_ms)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// First CLI argument, then `GAMEPING_CONFIG`, then `gameping.toml`.
    pub fn path_from(arg: Option<String>) -> PathBuf {
        arg.or_else(|| std::env::var(CONFIG_ENV).ok())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    fn validate(&self) -> Result<()> {
        if self.poller.workers == 0 {
            anyhow::bail!("poller.workers must be at least 1");
        }
        if self.engine.socket_timeout_ms == 0 {
            anyhow::bail!("engine.socket_timeout_ms must be positive");
        }
        for server in &self.servers {
            server
                .validate()
                .with_context(|| format!("server {}", server.id))?;
        }
        Ok(())
    }
}
