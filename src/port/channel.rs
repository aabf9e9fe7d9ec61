//! The HTTP/2 exchange abstraction a connection worker drives.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::DispatchConfig;
use crate::domain::{Notification, Response};
use crate::error::Result;

/// One long-lived HTTP/2 connection to the push service.
///
/// Implementations own the connection state; `exchange` takes `&self` so a
/// worker can multiplex several requests over the same connection
/// concurrently, up to the budget reported by [`stream_budget`].
///
/// [`stream_budget`]: ApnsChannel::stream_budget
#[async_trait]
pub trait ApnsChannel: Send + Sync {
    /// Establish the underlying connection. Called exactly once, before any
    /// exchange; an error here fails the worker launch.
    async fn connect(&mut self) -> Result<()>;

    /// Perform one request/response exchange.
    ///
    /// An `Err` means the exchange never completed at the transport level;
    /// a rejection by the service is an `Ok` response with a non-2xx status.
    async fn exchange(&self, notification: &Notification) -> Result<Response>;

    /// How many more concurrent streams this connection can take right now.
    fn stream_budget(&self) -> u32 {
        1
    }

    fn name(&self) -> &'static str;
}

/// Factory used to create fresh channels on demand (launch and relaunch).
pub type ChannelFactory = Arc<dyn Fn() -> Box<dyn ApnsChannel> + Send + Sync>;

/// Source of HTTP/2 stream-capacity samples for one channel.
///
/// Two live variants: **precise** queries the channel on every call;
/// **cached** refreshes a shared sample on a timer, trading staleness for
/// per-call overhead. When stream probing is disallowed the source is
/// disabled and the budget pins at one in-flight request.
pub enum StreamMetrics {
    Disabled,
    Precise(Arc<dyn ApnsChannel>),
    Cached(Arc<AtomicU32>),
}

impl StreamMetrics {
    /// Build the metrics source the configuration asks for, spawning the
    /// refresher task for the cached variant. The refresher stops when
    /// `ctl` is cancelled.
    pub fn for_channel(
        cfg: &DispatchConfig,
        channel: Arc<dyn ApnsChannel>,
        ctl: &CancellationToken,
    ) -> Self {
        if !cfg.allow_http2_incursion {
            return Self::Disabled;
        }
        if cfg.use_precise_http2_metrics {
            return Self::Precise(channel);
        }
        let period = cfg.http2_metrics_refresh_period();
        if period.is_zero() {
            return Self::Disabled;
        }
        let sample = Arc::new(AtomicU32::new(channel.stream_budget()));
        let cell = Arc::clone(&sample);
        let ctl = ctl.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ctl.cancelled() => break,
                    _ = tick.tick() => cell.store(channel.stream_budget(), Ordering::Relaxed),
                }
            }
            debug!(channel = channel.name(), "stream sample refresher stopped");
        });
        Self::Cached(sample)
    }

    /// Current in-flight budget, never below one so the worker always makes
    /// progress.
    pub fn budget(&self) -> u32 {
        match self {
            Self::Disabled => 1,
            Self::Precise(channel) => channel.stream_budget().max(1),
            Self::Cached(sample) => sample.load(Ordering::Relaxed).max(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::channel::ScriptedChannel;

    #[test]
    fn disabled_budget_is_one() {
        assert_eq!(StreamMetrics::Disabled.budget(), 1);
    }

    #[tokio::test]
    async fn precise_queries_the_channel() {
        let channel: Arc<dyn ApnsChannel> = Arc::new(ScriptedChannel::new().with_budget(12));
        let cfg = DispatchConfig {
            allow_http2_incursion: true,
            use_precise_http2_metrics: true,
            ..DispatchConfig::default()
        };
        let metrics = StreamMetrics::for_channel(&cfg, channel, &CancellationToken::new());
        assert!(matches!(metrics, StreamMetrics::Precise(_)));
        assert_eq!(metrics.budget(), 12);
    }

    #[tokio::test]
    async fn cached_refreshes_on_a_timer() {
        let channel = Arc::new(ScriptedChannel::new().with_budget(3));
        let cfg = DispatchConfig {
            allow_http2_incursion: true,
            http2_metrics_refresh_ms: 10,
            ..DispatchConfig::default()
        };
        let ctl = CancellationToken::new();
        let metrics = StreamMetrics::for_channel(
            &cfg,
            Arc::clone(&channel) as Arc<dyn ApnsChannel>,
            &ctl,
        );
        assert_eq!(metrics.budget(), 3);

        channel.set_budget(7);
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(metrics.budget(), 7);
        ctl.cancel();
    }

    #[tokio::test]
    async fn no_incursion_disables_sampling() {
        let channel: Arc<dyn ApnsChannel> = Arc::new(ScriptedChannel::new().with_budget(40));
        let cfg = DispatchConfig {
            allow_http2_incursion: false,
            use_precise_http2_metrics: true,
            ..DispatchConfig::default()
        };
        let metrics = StreamMetrics::for_channel(&cfg, channel, &CancellationToken::new());
        assert_eq!(metrics.budget(), 1);
    }
}
