//! Node connection configuration.

use serde::Deserialize;
use std::time::Duration;

/// Default client name sent in the `Client-Name` header.
pub const DEFAULT_CLIENT_NAME: &str = "lavapool";

/// Default heartbeat interval in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 60;

/// Default reconnect backoff base in milliseconds.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 1000;

/// Default ceiling for the backoff retry counter.
pub const DEFAULT_BACKOFF_MAX_RETRIES: u32 = 20;

/// Default number of frame decode workers per node.
pub const DEFAULT_DECODE_WORKERS: usize = 4;

/// Default number of frames that may wait for a decode worker.
pub const DEFAULT_DECODE_QUEUE: usize = 64;

/// Connection settings for one playback server.
///
/// Can be built in code or deserialized from an application's config file:
///
/// ```
/// use lavapool::NodeConfig;
///
/// let config = NodeConfig::new("127.0.0.1", 2333, "youshallnotpass")
///     .identifier("main")
///     .region("eu-west")
///     .user_id(1234);
/// assert_eq!(config.ws_uri(), "ws://127.0.0.1:2333");
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub host: String,
    pub port: u16,
    pub password: String,
    #[serde(default)]
    pub secure: bool,
    /// Seconds between WebSocket pings
    #[serde(default = "default_heartbeat")]
    pub heartbeat: u64,
    /// Geographic affinity used by region-based selection
    #[serde(default)]
    pub region: Option<String>,
    /// Unique node identifier; generated when absent
    #[serde(default)]
    pub identifier: Option<String>,
    /// Bot/user id sent as `User-Id`
    #[serde(default)]
    pub user_id: u64,
    #[serde(default = "default_client_name")]
    pub client_name: String,
    #[serde(default = "default_decode_workers")]
    pub decode_workers: usize,
    #[serde(default = "default_decode_queue")]
    pub decode_queue: usize,
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_max_retries")]
    pub backoff_max_retries: u32,
    /// Enables the Spotify extension on this node
    #[serde(default)]
    pub spotify: Option<SpotifyCredentials>,
}

/// Spotify client-credentials pair
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    /// Token endpoint for the client-credentials exchange
    #[serde(default = "default_token_url")]
    pub token_url: String,
}

fn default_token_url() -> String {
    crate::spotify::TOKEN_URL.to_string()
}

fn default_heartbeat() -> u64 {
    DEFAULT_HEARTBEAT_SECS
}

fn default_client_name() -> String {
    DEFAULT_CLIENT_NAME.to_string()
}

fn default_decode_workers() -> usize {
    DEFAULT_DECODE_WORKERS
}

fn default_decode_queue() -> usize {
    DEFAULT_DECODE_QUEUE
}

fn default_backoff_base() -> u64 {
    DEFAULT_BACKOFF_BASE_MS
}

fn default_backoff_max_retries() -> u32 {
    DEFAULT_BACKOFF_MAX_RETRIES
}

impl NodeConfig {
    pub fn new(host: impl Into<String>, port: u16, password: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            password: password.into(),
            secure: false,
            heartbeat: DEFAULT_HEARTBEAT_SECS,
            region: None,
            identifier: None,
            user_id: 0,
            client_name: default_client_name(),
            decode_workers: DEFAULT_DECODE_WORKERS,
            decode_queue: DEFAULT_DECODE_QUEUE,
            backoff_base_ms: DEFAULT_BACKOFF_BASE_MS,
            backoff_max_retries: DEFAULT_BACKOFF_MAX_RETRIES,
            spotify: None,
        }
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn heartbeat(mut self, secs: u64) -> Self {
        self.heartbeat = secs;
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn user_id(mut self, user_id: u64) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.client_name = name.into();
        self
    }

    pub fn decode_workers(mut self, workers: usize, queue: usize) -> Self {
        self.decode_workers = workers;
        self.decode_queue = queue;
        self
    }

    pub fn backoff(mut self, base_ms: u64, max_retries: u32) -> Self {
        self.backoff_base_ms = base_ms;
        self.backoff_max_retries = max_retries;
        self
    }

    pub fn spotify(mut self, client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        self.spotify = Some(SpotifyCredentials {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token_url: default_token_url(),
        });
        self
    }

    /// Event socket endpoint
    pub fn ws_uri(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// REST base endpoint
    pub fn rest_uri(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub(crate) fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat.max(1))
    }

    pub(crate) fn backoff_base(&self) -> Duration {
        Duration::from_millis(self.backoff_base_ms)
    }
}
