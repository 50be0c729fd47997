//! Messaging handler configuration.

use alloc::string::String;
use embassy_time::Duration;

use super::traits::ServiceType;

/// Default MQTT port.
pub const DEFAULT_PORT: u16 = 1883;
/// How often a connected handler drains the queue and services the transport.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
/// How long to wait before checking the network link again.
pub const DEFAULT_LINK_RETRY: Duration = Duration::from_secs(1);
/// How long to wait after a failed connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// How long to wait between failed connection attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Always wait the same amount of time.
    Fixed(Duration),
    /// Double the delay after every consecutive failure, starting at
    /// `initial` and never exceeding `max`, minus up to a quarter of jitter.
    Exponential { initial: Duration, max: Duration },
}

impl ReconnectPolicy {
    /// Exponential backoff from 1 s up to one minute.
    pub const fn exponential() -> Self {
        ReconnectPolicy::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }

    /// The delay after `failures` consecutive failed attempts (at least one).
    ///
    /// `entropy` feeds the jitter of the exponential policy; any value that
    /// differs between devices and attempts (e.g. clock ticks) will do.
    pub fn delay(&self, failures: u32, entropy: u64) -> Duration {
        match *self {
            ReconnectPolicy::Fixed(delay) => delay,
            ReconnectPolicy::Exponential { initial, max } => {
                let doublings = failures.saturating_sub(1).min(31);
                let base = initial
                    .as_ticks()
                    .saturating_mul(1u64 << doublings)
                    .min(max.as_ticks());
                let jitter_range = base / 4;
                let jitter = if jitter_range == 0 {
                    0
                } else {
                    mix(entropy) % (jitter_range + 1)
                };
                Duration::from_ticks(base - jitter)
            }
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        ReconnectPolicy::Fixed(DEFAULT_RECONNECT_DELAY)
    }
}

/// xorshift64* step; spreads low-entropy inputs such as clock ticks.
fn mix(mut x: u64) -> u64 {
    x ^= x >> 12;
    x ^= x << 25;
    x ^= x >> 27;
    x.wrapping_mul(0x2545_f491_4f6c_dd1d)
}

/// Options for the [`MqttHandler`](super::MqttHandler).
///
/// # Example
///
/// ```ignore
/// let options = MqttOptions::new("chicken-door-1", "devices/chicken-door/1")
///     .with_host("broker.local")
///     .with_reconnect(ReconnectPolicy::exponential());
/// ```
#[derive(Debug, Clone)]
pub struct MqttOptions {
    /// Broker host name. `None` discovers the broker through `service`.
    pub host: Option<String>,
    /// Broker port, used together with `host`. Discovered brokers bring their own port.
    pub port: u16,
    pub client_id: String,
    /// Every topic the handler publishes or subscribes to lives under this prefix.
    pub topic_prefix: String,
    pub poll_interval: Duration,
    pub link_retry: Duration,
    pub reconnect: ReconnectPolicy,
    pub service: ServiceType,
}

impl MqttOptions {
    pub fn new(client_id: impl Into<String>, topic_prefix: impl Into<String>) -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            client_id: client_id.into(),
            topic_prefix: topic_prefix.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            link_retry: DEFAULT_LINK_RETRY,
            reconnect: ReconnectPolicy::default(),
            service: ServiceType::mqtt(),
        }
    }

    /// Connects to a fixed host instead of discovering the broker.
    ///
    /// An empty host name means discovery, the same as not calling this.
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        let host = host.into();
        self.host = if host.is_empty() { None } else { Some(host) };
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_link_retry(mut self, interval: Duration) -> Self {
        self.link_retry = interval;
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    pub fn with_service(mut self, service: ServiceType) -> Self {
        self.service = service;
        self
    }
}
