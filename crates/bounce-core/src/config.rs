use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_ROUTE: &str = "/ws";
pub const DEFAULT_NAME: &str = "Websocket API";
pub const MAX_PAYLOAD_BYTES: usize = 128 * 1024; // 128 KB hard cap per inbound frame
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2_000; // wait for periodic tasks to unwind
pub const DEFAULT_FRAMERATE: f64 = 10.0; // periodic senders: broadcasts per second
pub const SEND_TIMEOUT_MS: u64 = 1_000; // per-connection write bound during fan-out
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256; // frames buffered per WS client

/// Top-level config (bounce.toml + BOUNCE_* env overrides).
///
/// Nested keys are addressed with a double underscore in the environment,
/// e.g. `BOUNCE_GATEWAY__PORT=9000` or `BOUNCE_BROADCAST__SHUTDOWN_GRACE_MS=500`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BounceConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub demo: DemoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// WebSocket route the transport listens on.
    #[serde(default = "default_route")]
    pub route: String,
    /// Human-readable server name used in log lines.
    #[serde(default = "default_name")]
    pub name: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            route: default_route(),
            name: default_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// How long shutdown waits for periodic broadcast tasks before aborting them.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

/// Wiring of the bundled ping demo (`ping` handler/sender + `ping_timed`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemoConfig {
    #[serde(default = "bool_true")]
    pub enabled: bool,
    #[serde(default = "default_framerate")]
    pub timed_ping_framerate: f64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timed_ping_framerate: default_framerate(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_route() -> String {
    DEFAULT_ROUTE.to_string()
}
fn default_name() -> String {
    DEFAULT_NAME.to_string()
}
fn default_shutdown_grace_ms() -> u64 {
    DEFAULT_SHUTDOWN_GRACE_MS
}
fn default_framerate() -> f64 {
    DEFAULT_FRAMERATE
}

impl BounceConfig {
    /// Load config from a TOML file with BOUNCE_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.bounce/bounce.toml
    ///
    /// A missing file is not an error; defaults fill every field.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: BounceConfig = Figment::from(Serialized::defaults(BounceConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("BOUNCE_").split("__"))
            .extract()
            .map_err(|e| crate::error::BounceError::Config(e.to_string()))?;

        tracing::debug!(path = %path, "config loaded");
        Ok(config)
    }

    /// `bind:port` string suitable for `TcpListener::bind`.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.gateway.bind, self.gateway.port)
    }

    pub fn shutdown_grace(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.broadcast.shutdown_grace_ms)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.bounce/bounce.toml", home)
}
