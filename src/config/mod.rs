//! Runtime configuration (layered: code > env).

use std::sync::OnceLock;

/// Global default config (lazy-initialized from env).
static DEFAULT_CONFIG: OnceLock<WeftConfig> = OnceLock::new();

/// No upstream bytes for this long counts as a stalled connection.
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 30_000;

/// Bound on the outbound chunk channel; backpressure kicks in past this.
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

/// Longest encoded frame the demultiplexer will wait for before treating
/// the candidate as plain text.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Tunables for a stream session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeftConfig {
    /// Inactivity timeout for the upstream connection, in milliseconds.
    /// Zero disables the timeout.
    pub idle_timeout_ms: u64,
    /// Capacity of the outbound chunk channel.
    pub outbound_capacity: usize,
    /// Upper bound on a single encoded frame, in bytes.
    pub max_frame_len: usize,
}

impl Default for WeftConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT_MS,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl WeftConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from environment variables (WEFT_IDLE_TIMEOUT_MS,
    /// WEFT_OUTBOUND_CAPACITY, WEFT_MAX_FRAME_LEN).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::new();

        if let Some(ms) = env_parse("WEFT_IDLE_TIMEOUT_MS") {
            config.idle_timeout_ms = ms;
        }
        if let Some(cap) = env_parse("WEFT_OUTBOUND_CAPACITY") {
            config.outbound_capacity = cap;
        }
        if let Some(len) = env_parse("WEFT_MAX_FRAME_LEN") {
            config.max_frame_len = len;
        }

        config
    }

    /// Get (or create) the global default config.
    pub fn global() -> &'static WeftConfig {
        DEFAULT_CONFIG.get_or_init(Self::from_env)
    }

    pub fn with_idle_timeout_ms(mut self, ms: u64) -> Self {
        self.idle_timeout_ms = ms;
        self
    }

    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }

    pub fn with_max_frame_len(mut self, len: usize) -> Self {
        self.max_frame_len = len;
        self
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    let raw = std::env::var(var).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(var, value = %raw, "ignoring unparseable config value");
            None
        }
    }
}
