//! Dispatch pipeline configuration.
//!
//! All knobs that govern request processing flow, including automatic
//! scaling of the connection pool. Durations are expressed as millisecond
//! fields so configs deserialize from plain TOML/JSON numbers; accessor
//! methods return [`Duration`]s.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::domain::Response;
use crate::error::{Error, Result};

mod scale;

pub use scale::Scale;

/// Decides whether a failed push attempt is eligible for another try.
///
/// Called with the response (when the exchange completed) and/or the
/// transport error (when it did not).
#[derive(Clone)]
pub struct RetryEval(Arc<dyn Fn(Option<&Response>, Option<&Error>) -> bool + Send + Sync>);

impl RetryEval {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Option<&Response>, Option<&Error>) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn eval(&self, response: Option<&Response>, error: Option<&Error>) -> bool {
        (self.0)(response, error)
    }
}

impl Default for RetryEval {
    /// Standard classifier: transport errors and retriable APNs statuses
    /// (429 / 5xx and their reason codes) are eligible.
    fn default() -> Self {
        Self::new(|response, error| match (response, error) {
            (Some(r), _) => r.is_retriable(),
            (None, Some(_)) => true,
            (None, None) => false,
        })
    }
}

impl fmt::Debug for RetryEval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RetryEval(..)")
    }
}

/// Backoff applied between gap-fill relaunches of a failed connection.
///
/// A connection that dies is replaced immediately; consecutive deaths are
/// paced by an exponentially growing delay until a replacement survives.
#[derive(Debug, Clone, Deserialize)]
pub struct RelaunchBackoff {
    /// Delay before the second consecutive relaunch (milliseconds).
    #[serde(default = "default_relaunch_initial_ms")]
    pub initial_delay_ms: u64,
    /// Maximum delay between relaunches (milliseconds).
    #[serde(default = "default_relaunch_max_ms")]
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each consecutive relaunch.
    #[serde(default = "default_relaunch_multiplier")]
    pub multiplier: f64,
}

fn default_relaunch_initial_ms() -> u64 {
    100
}

fn default_relaunch_max_ms() -> u64 {
    30_000
}

fn default_relaunch_multiplier() -> f64 {
    2.0
}

impl Default for RelaunchBackoff {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_relaunch_initial_ms(),
            max_delay_ms: default_relaunch_max_ms(),
            multiplier: default_relaunch_multiplier(),
        }
    }
}

/// Parameters that govern request processing flow, including automatic
/// scaling of the connection pool.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Maximum number of times a failed push is reattempted. Only applies
    /// to retriable failures; 0 disables retrying entirely.
    #[serde(default)]
    pub max_retries: u32,

    /// Retry eligibility classifier. Not deserialized; defaults to the
    /// standard status-code classifier.
    #[serde(skip, default)]
    pub retry_eval: RetryEval,

    /// Minimum number of concurrent connections kept open.
    #[serde(default = "default_min_conns")]
    pub min_conns: u32,

    /// Maximum allowed number of concurrent connections.
    #[serde(default = "default_max_conns")]
    pub max_conns: u32,

    /// Throughput cap in notifications per second. Not enforced as a rate
    /// limit; it only prevents additional scaling once the observed rate
    /// reaches it. 0 disables the cap.
    #[serde(default)]
    pub max_rate: f64,

    /// Throughput cap in bits per second. Same gating-only semantics as
    /// `max_rate`. 0 disables the cap.
    #[serde(default)]
    pub max_bandwidth: f64,

    /// The manner of scaling up and winding down.
    #[serde(default)]
    pub scale: Scale,

    /// Minimum duration the pipeline has to experience blocking before a
    /// scale-up attempt, and the minimum non-blocking duration before a
    /// wind-down attempt.
    #[serde(default)]
    pub min_sustain_ms: u64,

    /// Time between performance metric sampling attempts. 0 disables
    /// periodic evaluation (and with it, all scaling past bring-up).
    #[serde(default)]
    pub poll_interval_ms: u64,

    /// Quiet time after a successful scaling action during which sustained
    /// performance analysis is ignored and no new attempt is made.
    #[serde(default)]
    pub settle_period_ms: u64,

    /// Whether the connection layer may probe HTTP/2 stream state for more
    /// precise performance analysis.
    #[serde(default)]
    pub allow_http2_incursion: bool,

    /// Query HTTP/2 stream state on every call that needs it instead of
    /// relying on periodically refreshed samples.
    #[serde(default)]
    pub use_precise_http2_metrics: bool,

    /// Refresh period for cached HTTP/2 stream samples. Ignored when
    /// precise metrics are enabled; 0 disables refresh entirely.
    #[serde(default)]
    pub http2_metrics_refresh_ms: u64,

    /// Pacing for gap-fill relaunches of failed connections.
    #[serde(default)]
    pub relaunch_backoff: RelaunchBackoff,

    /// Capacity of the inbound request channel.
    #[serde(default = "default_inbound_capacity")]
    pub inbound_capacity: usize,

    /// Capacity of the delivery callback channel.
    #[serde(default = "default_callback_capacity")]
    pub callback_capacity: usize,

    /// Capacity of the retry re-injection intake.
    #[serde(default = "default_retry_intake_capacity")]
    pub retry_intake_capacity: usize,
}

const fn default_min_conns() -> u32 {
    1
}

const fn default_max_conns() -> u32 {
    1
}

const fn default_inbound_capacity() -> usize {
    100
}

const fn default_callback_capacity() -> usize {
    100
}

const fn default_retry_intake_capacity() -> usize {
    100
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_eval: RetryEval::default(),
            min_conns: default_min_conns(),
            max_conns: default_max_conns(),
            max_rate: 0.0,
            max_bandwidth: 0.0,
            scale: Scale::default(),
            min_sustain_ms: 0,
            poll_interval_ms: 0,
            settle_period_ms: 0,
            allow_http2_incursion: false,
            use_precise_http2_metrics: false,
            http2_metrics_refresh_ms: 0,
            relaunch_backoff: RelaunchBackoff::default(),
            inbound_capacity: default_inbound_capacity(),
            callback_capacity: default_callback_capacity(),
            retry_intake_capacity: default_retry_intake_capacity(),
        }
    }
}

impl DispatchConfig {
    /// Absolute minimal processing settings: a single connection with no
    /// scaling. HTTP/2 stream samples refresh every 500ms so stream
    /// concurrency stays visible without per-call probing overhead.
    pub fn min_blocking() -> Self {
        Self {
            min_conns: 1,
            max_conns: 1,
            scale: Scale::Constant,
            allow_http2_incursion: true,
            http2_metrics_refresh_ms: 500,
            ..Self::default()
        }
    }

    pub fn min_sustain(&self) -> Duration {
        Duration::from_millis(self.min_sustain_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn settle_period(&self) -> Duration {
        Duration::from_millis(self.settle_period_ms)
    }

    pub fn http2_metrics_refresh_period(&self) -> Duration {
        Duration::from_millis(self.http2_metrics_refresh_ms)
    }

    /// Number of poll periods per sustain window, rounded up. When either
    /// interval is unset the result saturates, which keeps sustained
    /// analysis from ever firing.
    pub fn min_sustain_polls(&self) -> u32 {
        if self.min_sustain_ms == 0 || self.poll_interval_ms == 0 {
            return u32::MAX;
        }
        let polls = self.min_sustain_ms.div_ceil(self.poll_interval_ms);
        u32::try_from(polls).unwrap_or(u32::MAX)
    }

    /// Validate bounds and capacities.
    pub fn validate(&self) -> Result<()> {
        if self.min_conns == 0 {
            return Err(Error::config("min_conns", "must be > 0"));
        }
        if self.max_conns < self.min_conns {
            return Err(Error::config("max_conns", "must be >= min_conns"));
        }
        if self.inbound_capacity == 0 {
            return Err(Error::config("inbound_capacity", "must be > 0"));
        }
        if self.callback_capacity == 0 {
            return Err(Error::config("callback_capacity", "must be > 0"));
        }
        if self.retry_intake_capacity == 0 {
            return Err(Error::config("retry_intake_capacity", "must be > 0"));
        }
        if self.relaunch_backoff.multiplier < 1.0 {
            return Err(Error::config("relaunch_backoff.multiplier", "must be >= 1.0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(DispatchConfig::default().validate().is_ok());
    }

    #[test]
    fn min_blocking_pins_a_single_connection() {
        let cfg = DispatchConfig::min_blocking();
        assert_eq!(cfg.min_conns, 1);
        assert_eq!(cfg.max_conns, 1);
        assert_eq!(cfg.scale, Scale::Constant);
        assert!(cfg.allow_http2_incursion);
        assert_eq!(cfg.http2_metrics_refresh_ms, 500);
        assert_eq!(cfg.max_retries, 0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn min_sustain_polls_rounds_up() {
        let cfg = DispatchConfig {
            min_sustain_ms: 100,
            poll_interval_ms: 30,
            ..DispatchConfig::default()
        };
        assert_eq!(cfg.min_sustain_polls(), 4);

        let exact = DispatchConfig {
            min_sustain_ms: 100,
            poll_interval_ms: 20,
            ..DispatchConfig::default()
        };
        assert_eq!(exact.min_sustain_polls(), 5);
    }

    #[test]
    fn min_sustain_polls_saturates_when_unset() {
        let no_sustain = DispatchConfig {
            min_sustain_ms: 0,
            poll_interval_ms: 20,
            ..DispatchConfig::default()
        };
        assert_eq!(no_sustain.min_sustain_polls(), u32::MAX);

        let no_poll = DispatchConfig {
            min_sustain_ms: 100,
            poll_interval_ms: 0,
            ..DispatchConfig::default()
        };
        assert_eq!(no_poll.min_sustain_polls(), u32::MAX);
    }

    #[test]
    fn validate_rejects_zero_min_conns() {
        let cfg = DispatchConfig {
            min_conns: 0,
            ..DispatchConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_inverted_bounds() {
        let cfg = DispatchConfig {
            min_conns: 4,
            max_conns: 2,
            ..DispatchConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_capacities() {
        for field in ["inbound", "callback", "retry_intake"] {
            let mut cfg = DispatchConfig::default();
            match field {
                "inbound" => cfg.inbound_capacity = 0,
                "callback" => cfg.callback_capacity = 0,
                _ => cfg.retry_intake_capacity = 0,
            }
            assert!(cfg.validate().is_err(), "{field} capacity 0 should fail");
        }
    }

    #[test]
    fn validate_rejects_shrinking_backoff() {
        let cfg = DispatchConfig {
            relaunch_backoff: RelaunchBackoff {
                multiplier: 0.5,
                ..RelaunchBackoff::default()
            },
            ..DispatchConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn default_retry_eval_classifies_transport_errors_as_retriable() {
        let eval = RetryEval::default();
        let err = Error::Transport("connection reset".to_string());
        assert!(eval.eval(None, Some(&err)));
        assert!(!eval.eval(None, None));
    }

    #[test]
    fn deserializes_with_defaults() {
        let cfg: DispatchConfig =
            serde_json::from_str(r#"{"min_conns": 2, "max_conns": 8, "scale": "exponential"}"#)
                .unwrap();
        assert_eq!(cfg.min_conns, 2);
        assert_eq!(cfg.max_conns, 8);
        assert_eq!(cfg.scale, Scale::Exponential);
        assert_eq!(cfg.inbound_capacity, default_inbound_capacity());
    }
}
