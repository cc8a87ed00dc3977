//! Configuration loading and validation.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_BIND: &str = "0.0.0.0";
const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:8000/ws/draw";
const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";

/// Top-level sketchwire configuration, read from a JSON5 file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<ServerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub store: Option<StoreConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    /// Largest accepted WebSocket frame, in bytes.
    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,

    /// Replay frames relayed since the last `clear` to new joiners.
    #[serde(default)]
    pub replay_on_join: bool,

    /// Upper bound on retained replay frames; oldest are dropped first.
    #[serde(default = "default_max_replay_frames")]
    pub max_replay_frames: usize,

    /// Upper bound on retained replay bytes; oldest are dropped first.
    #[serde(default = "default_max_replay_bytes")]
    pub max_replay_bytes: usize,

    /// Origins allowed by CORS. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: None,
            max_frame_bytes: default_max_frame_bytes(),
            replay_on_join: false,
            max_replay_frames: default_max_replay_frames(),
            max_replay_bytes: default_max_replay_bytes(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_frame_bytes() -> usize {
    64 * 1024
}

fn default_max_replay_frames() -> usize {
    10_000
}

fn default_max_replay_bytes() -> usize {
    8 * 1024 * 1024
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Diagram directory (default: `~/.sketchwire/diagrams`). `~` is expanded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,

    /// Keep diagrams in memory only.
    #[serde(default)]
    pub ephemeral: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    /// Active username used as diagram owner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_timeout_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconnect: Option<ReconnectConfig>,
}

/// Bounded exponential backoff for re-establishing the relay connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Give up after this many attempts (`null` = keep trying).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_initial_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_max_attempts() -> Option<u32> {
    Some(10)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "sketchwire_relay=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: None,
            filters: Vec::new(),
            output: default_log_output(),
        }
    }
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

static ENV_VAR_PATTERN: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is a valid regex")
});

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures<'_>| {
            std::env::var(&caps[1]).unwrap_or_default()
        })
        .into_owned()
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&raw);

        json5::from_str(&substituted)
            .map_err(|e| crate::error::SketchError::Config(e.to_string()))
    }

    /// Default config file path.
    pub fn config_path() -> PathBuf {
        data_dir().join("config.json")
    }

    pub fn server_port(&self) -> u16 {
        self.server.as_ref().map(|s| s.port).unwrap_or(DEFAULT_PORT)
    }

    pub fn server_bind(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.bind.clone())
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
    }

    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    /// Resolve the diagram store directory.
    pub fn store_dir(&self) -> PathBuf {
        self.store
            .as_ref()
            .and_then(|s| s.dir.as_ref())
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).as_ref()))
            .unwrap_or_else(|| data_dir().join("diagrams"))
    }

    pub fn store_ephemeral(&self) -> bool {
        self.store.as_ref().is_some_and(|s| s.ephemeral)
    }

    pub fn relay_url(&self) -> String {
        self.client
            .as_ref()
            .and_then(|c| c.relay_url.clone())
            .unwrap_or_else(|| DEFAULT_RELAY_URL.to_string())
    }

    pub fn api_base(&self) -> String {
        self.client
            .as_ref()
            .and_then(|c| c.api_base.clone())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn username(&self) -> Option<String> {
        self.client
            .as_ref()
            .and_then(|c| c.username.as_deref())
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
    }

    pub fn gateway_timeout(&self) -> Duration {
        let secs = self
            .client
            .as_ref()
            .and_then(|c| c.gateway_timeout_secs)
            .unwrap_or(10);
        Duration::from_secs(secs)
    }

    pub fn reconnect(&self) -> ReconnectConfig {
        self.client
            .as_ref()
            .and_then(|c| c.reconnect.clone())
            .unwrap_or_default()
    }

    /// Get a config value by dotted path (e.g. "server.port").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate the config. Returns `(warnings, errors)`.
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if let Some(server) = &self.server {
            if server.port == 0 {
                errors.push("server.port must be non-zero".to_string());
            }
            if server.max_frame_bytes < 64 {
                errors.push(format!(
                    "server.max_frame_bytes ({}) is too small for a stroke frame",
                    server.max_frame_bytes
                ));
            }
            if server.replay_on_join
                && (server.max_replay_frames == 0 || server.max_replay_bytes == 0)
            {
                warnings.push(
                    "server.replay_on_join is set but the replay limits are 0; nothing will be replayed"
                        .to_string(),
                );
            }
        }

        let relay = self.relay_url();
        if !(relay.starts_with("ws://") || relay.starts_with("wss://")) {
            errors.push(format!("client.relay_url must be a ws:// or wss:// URL, got '{relay}'"));
        }
        let api = self.api_base();
        if !(api.starts_with("http://") || api.starts_with("https://")) {
            errors.push(format!("client.api_base must be an http(s) URL, got '{api}'"));
        }

        if let Some(client) = &self.client {
            if client.gateway_timeout_secs == Some(0) {
                errors.push("client.gateway_timeout_secs must be at least 1".to_string());
            }
            if let Some(rc) = &client.reconnect {
                if rc.multiplier < 1.0 {
                    errors.push(format!(
                        "client.reconnect.multiplier ({}) must be >= 1.0",
                        rc.multiplier
                    ));
                }
                if rc.initial_delay_ms > rc.max_delay_ms {
                    warnings.push(
                        "client.reconnect.initial_delay_ms exceeds max_delay_ms".to_string(),
                    );
                }
            }
        }

        if let Some(logging) = &self.logging {
            if !matches!(logging.format.as_str(), "plain" | "json") {
                warnings.push(format!(
                    "Unknown logging.format '{}', falling back to plain",
                    logging.format
                ));
            }
        }

        (warnings, errors)
    }
}

/// Resolve the sketchwire data directory (`~/.sketchwire`).
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sketchwire")
}
