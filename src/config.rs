use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Fixed final segment of the signaling endpoint path.
const WS_PATH_SUFFIX: &str = "peerjs";

/// Rendezvous signaling relay server
#[derive(Parser, Serialize, Deserialize, Clone, Debug)]
#[command(name = "rendezvous-server", version, about = "Rendezvous signaling relay server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "RENDEZVOUS_PORT", default_value = "9000")]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "RENDEZVOUS_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: String,

    /// Path to TOML config file
    #[arg(long, default_value = "./rendezvous.toml")]
    pub config: String,

    /// Enable structured JSON logging (for Docker/production)
    #[arg(long, env = "RENDEZVOUS_JSON_LOGS")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    pub generate_config: bool,

    /// Base path prefix for the signaling endpoint
    #[arg(long, env = "RENDEZVOUS_PATH", default_value = "/")]
    pub path: String,

    /// Shared key required on every connection attempt
    #[arg(long, env = "RENDEZVOUS_KEY", default_value = "peerjs")]
    pub key: String,

    /// Maximum simultaneously registered clients
    #[arg(long, env = "RENDEZVOUS_CONCURRENT_LIMIT", default_value = "5000")]
    pub concurrent_limit: usize,

    /// A new connection claiming a registered id evicts the old connection
    /// instead of being rejected
    #[arg(long, env = "RENDEZVOUS_ALLOW_OVERRIDE_CONNECTION")]
    pub allow_override_connection: bool,

    /// Expose the connected-peer listing endpoint
    #[arg(long, env = "RENDEZVOUS_ALLOW_DISCOVERY")]
    pub allow_discovery: bool,

    /// Offline-message retention window in milliseconds
    #[arg(long, env = "RENDEZVOUS_EXPIRE_TIMEOUT", default_value = "5000")]
    pub expire_timeout: u64,

    /// Maximum silence in milliseconds before a connection is evicted
    #[arg(long, env = "RENDEZVOUS_ALIVE_TIMEOUT", default_value = "60000")]
    pub alive_timeout: u64,

    /// Maximum buffered outgoing messages per offline destination
    #[arg(long, env = "RENDEZVOUS_CLEANUP_OUT_MSGS", default_value = "1000")]
    pub cleanup_out_msgs: usize,

    /// Liveness and queue sweep period in milliseconds
    #[arg(long, env = "RENDEZVOUS_SWEEP_INTERVAL", default_value = "300")]
    pub sweep_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 9000,
            bind_address: "0.0.0.0".to_string(),
            config: "./rendezvous.toml".to_string(),
            json_logs: false,
            generate_config: false,
            path: "/".to_string(),
            key: "peerjs".to_string(),
            concurrent_limit: 5000,
            allow_override_connection: false,
            allow_discovery: false,
            expire_timeout: 5000,
            alive_timeout: 60000,
            cleanup_out_msgs: 1000,
            sweep_interval: 300,
        }
    }
}

impl Config {
    /// Load config with layered precedence:
    /// built-in defaults < TOML file < env vars (RENDEZVOUS_*) < CLI args
    pub fn load() -> Result<Self, figment::Error> {
        let cli = Config::parse();
        let config_path = cli.config.clone();

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("RENDEZVOUS_"))
            .merge(Serialized::defaults(cli))
            .extract()
    }

    /// Effective signaling path: the configured base with the fixed suffix
    /// segment appended; the root path collapses to just the suffix.
    pub fn effective_ws_path(&self) -> String {
        if self.path == "/" {
            format!("/{WS_PATH_SUFFIX}")
        } else {
            format!("{}/{}", self.path.trim_end_matches('/'), WS_PATH_SUFFIX)
        }
    }

    /// Route the signaling endpoint is mounted at (leading-slash normalized
    /// form of [`Self::effective_ws_path`]).
    pub fn ws_route(&self) -> String {
        let path = self.effective_ws_path();
        if path.starts_with('/') {
            path
        } else {
            format!("/{path}")
        }
    }

    /// Leading-slash-normalized base prefix for the discovery API, without a
    /// trailing slash. Empty for the root path.
    pub fn api_base(&self) -> String {
        let trimmed = self.path.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        }
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Rendezvous Signaling Relay Server Configuration
# Place this file at ./rendezvous.toml or specify with --config <path>
# All settings can be overridden via environment variables (RENDEZVOUS_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 9000)
# port = 9000

# Bind address (default: 0.0.0.0 — all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging for Docker/production
# json_logs = false

# Base path prefix for the signaling endpoint. The WebSocket endpoint is
# mounted at <path>/peerjs (just /peerjs for the root path).
# path = "/"

# Shared key every connection attempt must present
# key = "peerjs"

# Maximum simultaneously registered clients
# concurrent_limit = 5000

# A new connection claiming a registered id evicts the old connection
# instead of being rejected
# allow_override_connection = false

# Expose GET <path>/<key>/peers listing connected ids
# allow_discovery = false

# How long (ms) a message addressed to an offline peer is retained before
# being dropped (its sender is notified with an EXPIRE message)
# expire_timeout = 5000

# Maximum silence (ms) before a connection is presumed dead and evicted
# alive_timeout = 60000

# Maximum buffered outgoing messages per offline destination; when full,
# the oldest buffered message is dropped to admit the newest
# cleanup_out_msgs = 1000

# Period (ms) of the liveness and offline-buffer sweeps
# sweep_interval = 300
"#
    .to_string()
}
