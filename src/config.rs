//! Provider configuration.
//!
//! Defaults hold the constants the node-facing transports are tuned for.
//! `from_env()` layers environment overrides on top of the defaults:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `ETHRPC_RETRY` | [`WsConfig::retry`] (`0`/`false` disables) |
//! | `ETHRPC_KEEPALIVE_SECS` | [`WsConfig::keepalive_interval`] (`0` is ignored) |
//! | `ETHRPC_REQUEST_TIMEOUT_SECS` | [`WsConfig::request_timeout`] (`0` means none) |
//! | `ETHRPC_HTTP_TIMEOUT_SECS` | [`HttpConfig::timeout`] (`0` is ignored) |

use std::time::Duration;

use tracing::warn;

/// Time allowed to read the next frame (pong or otherwise) from the peer.
pub const DEFAULT_PONG_WAIT: Duration = Duration::from_secs(60);

/// Ping period. Must be less than the pong wait.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(54);

/// Time allowed to write a frame to the peer.
pub const DEFAULT_WRITE_WAIT: Duration = Duration::from_secs(60);

/// Delay between connection attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// At most one connect warning per this window.
pub const DEFAULT_CONNECT_WARN_PERIOD: Duration = Duration::from_secs(60);

/// Floor for the ping period. Tokio intervals cannot tick every zero seconds.
pub const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(1);

/// Default HTTP request timeout.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// WebSocket provider settings.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Keep retrying the initial connect instead of failing on the first error.
    pub retry: bool,
    /// Sleep between connect attempts.
    pub retry_interval: Duration,
    /// Minimum spacing between connect-failure warnings.
    pub connect_warn_period: Duration,
    /// Ping period for the write pump.
    pub keepalive_interval: Duration,
    /// Read deadline, reset on every received frame. `None` disables it.
    pub pong_wait: Option<Duration>,
    /// Upper bound on a single frame write.
    pub write_wait: Duration,
    /// Capacity of the queue feeding the write pump. Callers wait when full.
    pub outbound_queue_capacity: usize,
    /// Maximum notification deliveries parked behind full subscription
    /// channels before the read pump waits for one to finish.
    pub max_pending_deliveries: usize,
    /// Buffer of channels created by the `Eth` subscription helpers.
    pub subscription_buffer: usize,
    /// Per-call reply timeout. `None` waits until reply or connection death.
    pub request_timeout: Option<Duration>,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            retry: true,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            connect_warn_period: DEFAULT_CONNECT_WARN_PERIOD,
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            pong_wait: Some(DEFAULT_PONG_WAIT),
            write_wait: DEFAULT_WRITE_WAIT,
            outbound_queue_capacity: 1,
            max_pending_deliveries: 256,
            subscription_buffer: 100,
            request_timeout: None,
        }
    }
}

impl WsConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(retry) = env_bool("ETHRPC_RETRY") {
            config.retry = retry;
        }
        if let Some(secs) = env_nonzero_secs("ETHRPC_KEEPALIVE_SECS") {
            config.keepalive_interval = secs;
        }
        if let Some(secs) = env_secs("ETHRPC_REQUEST_TIMEOUT_SECS") {
            config.request_timeout = Some(secs).filter(|t| !t.is_zero());
        }
        config
    }

    /// Settings as the transport runs them: the keepalive period is at least
    /// [`MIN_KEEPALIVE_INTERVAL`], and a zero read deadline or request
    /// timeout is treated as none.
    pub fn normalized(mut self) -> Self {
        self.keepalive_interval = self.keepalive_interval.max(MIN_KEEPALIVE_INTERVAL);
        self.pong_wait = self.pong_wait.filter(|wait| !wait.is_zero());
        self.request_timeout = self.request_timeout.filter(|limit| !limit.is_zero());
        self
    }

    /// Fail on the first connect error.
    pub fn without_retry(mut self) -> Self {
        self.retry = false;
        self
    }

    /// Set the per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }
}

/// HTTP provider settings.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl HttpConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(secs) = env_nonzero_secs("ETHRPC_HTTP_TIMEOUT_SECS") {
            config.timeout = secs;
        }
        config
    }
}

fn env_secs(key: &str) -> Option<Duration> {
    let value = std::env::var(key).ok()?;
    match value.trim().parse::<u64>() {
        Ok(secs) => Some(Duration::from_secs(secs)),
        Err(_) => {
            warn!("Ignoring {}: not a number of seconds: {}", key, value);
            None
        }
    }
}

fn env_nonzero_secs(key: &str) -> Option<Duration> {
    let secs = env_secs(key)?;
    if secs.is_zero() {
        warn!("Ignoring {}: must be at least one second", key);
        return None;
    }
    Some(secs)
}

fn env_bool(key: &str) -> Option<bool> {
    let value = std::env::var(key).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => {
            warn!("Ignoring {}: not a boolean: {}", key, value);
            None
        }
    }
}
