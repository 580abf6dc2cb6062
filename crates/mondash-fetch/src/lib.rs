//! # mondash-fetch
//!
//! Transport for the chart core: abortable `values` requests over HTTP and the
//! live-update WebSocket with automatic reconnection.
//! Uses Strategy pattern for reconnection backoff policies.

pub mod live;
pub mod values;

pub use live::*;
pub use values::*;

use mondash_core::WireError;
use thiserror::Error;

/// Default API root when none is injected
pub const DEFAULT_API_ROOT: &str = "http://127.0.0.1:8000/api";

/// Default live-update endpoint
pub const DEFAULT_LIVE_URL: &str = "ws://127.0.0.1:8000/ws";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server responded with HTTP {status} {status_text}")]
    Status { status: u16, status_text: String },

    #[error("invalid response: {0}")]
    Decode(#[from] WireError),

    #[error("request aborted")]
    Aborted,
}

impl FetchError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}

// ============================================================================
// STRATEGY PATTERN: Reconnection Policy
// ============================================================================

/// Strategy trait for reconnection backoff
pub trait ReconnectPolicy: Send + Sync + Clone {
    /// Delay in milliseconds before attempt number `attempt` (0-indexed)
    fn delay_ms(&self, attempt: u32) -> u32;

    fn should_reconnect(&self, attempt: u32) -> bool;

    /// Called on successful connection
    fn reset(&mut self);
}

/// Exponential backoff reconnection policy
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    pub initial_delay_ms: u32,
    pub max_delay_ms: u32,
    pub multiplier: f64,
    /// 0 = unlimited
    pub max_attempts: u32,
    /// Spread reconnects of many dashboards by up to ±20%
    pub jitter: bool,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            multiplier: 1.5,
            max_attempts: 0,
            jitter: true,
        }
    }
}

impl ExponentialBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Wall displays: reconnect quickly, forever
    pub fn kiosk() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 5000,
            multiplier: 1.2,
            max_attempts: 0,
            jitter: true,
        }
    }

    /// Background tabs: back off far and give up eventually
    pub fn conservative() -> Self {
        Self {
            initial_delay_ms: 2000,
            max_delay_ms: 60000,
            multiplier: 2.0,
            max_attempts: 10,
            jitter: true,
        }
    }
}

impl ReconnectPolicy for ExponentialBackoff {
    fn delay_ms(&self, attempt: u32) -> u32 {
        let base_delay = self.initial_delay_ms as f64 * self.multiplier.powi(attempt as i32);
        let mut delay = (base_delay.min(u32::MAX as f64) as u32).min(self.max_delay_ms);

        if self.jitter {
            let range = delay / 5;
            // deterministic spread derived from the attempt number
            let offset = (attempt.wrapping_mul(7919) % (range * 2 + 1)) as i64 - range as i64;
            delay = (delay as i64 + offset).max(100) as u32;
        }

        delay
    }

    fn should_reconnect(&self, attempt: u32) -> bool {
        self.max_attempts == 0 || attempt < self.max_attempts
    }

    fn reset(&mut self) {}
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Where chart data comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub api_root: String,
    pub account_id: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            api_root: DEFAULT_API_ROOT.to_string(),
            account_id: "1".to_string(),
        }
    }
}

impl FetchConfig {
    pub fn new(api_root: impl Into<String>, account_id: impl Into<String>) -> Self {
        Self {
            api_root: api_root.into(),
            account_id: account_id.into(),
        }
    }

    /// Endpoint of the values query
    pub fn values_url(&self) -> String {
        format!(
            "{}/accounts/{}/values/",
            self.api_root.trim_end_matches('/'),
            self.account_id
        )
    }

    /// Live-update subscription pattern for every path of the account
    pub fn live_topic(&self) -> String {
        format!("accounts/{}/values/+", self.account_id)
    }
}

/// Live-update client configuration
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub url: String,
    pub topic: String,
    pub reconnect_policy: ExponentialBackoff,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_LIVE_URL.to_string(),
            topic: FetchConfig::default().live_topic(),
            reconnect_policy: ExponentialBackoff::default(),
        }
    }
}

impl LiveConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_policy(mut self, policy: ExponentialBackoff) -> Self {
        self.reconnect_policy = policy;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exponential_backoff() {
        let policy = ExponentialBackoff {
            initial_delay_ms: 1000,
            max_delay_ms: 10000,
            multiplier: 2.0,
            max_attempts: 5,
            jitter: false,
        };

        assert_eq!(policy.delay_ms(0), 1000);
        assert_eq!(policy.delay_ms(1), 2000);
        assert_eq!(policy.delay_ms(3), 8000);
        assert_eq!(policy.delay_ms(4), 10000);
        assert_eq!(policy.delay_ms(200), 10000);
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let policy = ExponentialBackoff::default();
        for attempt in 0..50 {
            let plain = ExponentialBackoff {
                jitter: false,
                ..policy.clone()
            }
            .delay_ms(attempt);
            let jittered = policy.delay_ms(attempt);
            assert!(jittered as f64 >= plain as f64 * 0.8 - 1.0);
            assert!(jittered as f64 <= plain as f64 * 1.2 + 1.0);
        }
    }

    #[test]
    fn test_should_reconnect() {
        let policy = ExponentialBackoff::new().max_attempts(3);
        assert!(policy.should_reconnect(0));
        assert!(policy.should_reconnect(2));
        assert!(!policy.should_reconnect(3));
        assert!(ExponentialBackoff::kiosk().should_reconnect(10_000));
    }

    #[test]
    fn test_fetch_config_urls() {
        let config = FetchConfig::new("https://mon.example.com/api/", "42");
        assert_eq!(config.values_url(), "https://mon.example.com/api/accounts/42/values/");
        assert_eq!(config.live_topic(), "accounts/42/values/+");
    }

    #[test]
    fn test_live_config() {
        let config = LiveConfig::new("wss://mon.example.com/ws")
            .topic("accounts/7/values/+")
            .with_policy(ExponentialBackoff::conservative());
        assert_eq!(config.url, "wss://mon.example.com/ws");
        assert_eq!(config.topic, "accounts/7/values/+");
        assert_eq!(config.reconnect_policy.max_attempts, 10);
    }

    #[test]
    fn test_fetch_error_messages() {
        let err = FetchError::Status {
            status: 502,
            status_text: "Bad Gateway".to_string(),
        };
        assert_eq!(err.to_string(), "server responded with HTTP 502 Bad Gateway");
        assert!(FetchError::Aborted.is_aborted());
    }
}
