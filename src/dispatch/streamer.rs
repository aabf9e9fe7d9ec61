//! Connection worker: drives one HTTP/2 channel against the shared request
//! stream.
//!
//! Each worker multiplexes up to its channel's stream budget of concurrent
//! exchanges, posts outcomes on the delivery callback, and pushes retriable
//! failures onto the governor's retry channel. On exit it reports how it
//! ended so the governor can tell a drained input from a dead connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::DispatchConfig;
use crate::dispatch::client::Delivery;
use crate::dispatch::wait::FoldCounter;
use crate::dispatch::Wiring;
use crate::domain::{Notification, Response};
use crate::error::Result;
use crate::port::{ApnsChannel, ChannelFactory, StreamMetrics};

/// Throughput totals a worker accumulates for the governor's rate gating.
#[derive(Debug, Default)]
pub(crate) struct StreamerStats {
    delivered: AtomicU64,
    wire_bits: AtomicU64,
}

impl StreamerStats {
    pub(crate) fn record(&self, bits: u64) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.wire_bits.fetch_add(bits, Ordering::Relaxed);
    }

    pub(crate) fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub(crate) fn wire_bits(&self) -> u64 {
        self.wire_bits.load(Ordering::Relaxed)
    }
}

/// The governor's grip on a running worker.
pub(crate) struct StreamerHandle {
    pub(crate) ctl: CancellationToken,
    pub(crate) wait_ctr: Arc<FoldCounter>,
    pub(crate) stats: Arc<StreamerStats>,
}

/// Posted to the governor when a worker's run loop ends.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StreamerExit {
    pub(crate) id: u64,
    /// The shared inbound channel closed: graceful end of input.
    pub(crate) in_closed: bool,
    /// The worker terminated itself on a connection failure; the governor
    /// should relaunch to restore the pool.
    pub(crate) did_quit: bool,
}

pub(crate) struct Streamer {
    id: u64,
    name: String,
    cfg: DispatchConfig,
    channel: Arc<dyn ApnsChannel>,
    metrics: StreamMetrics,
    wiring: Wiring,
    ctl: CancellationToken,
    wait_ctr: Arc<FoldCounter>,
    stats: Arc<StreamerStats>,
}

type Exchange = BoxFuture<'static, (Notification, Result<Response>)>;

impl Streamer {
    /// Connect a fresh channel and spawn the run loop.
    ///
    /// Errors synchronously when the initial handshake fails, so the
    /// launcher can report a failed bring-up without a worker ever
    /// existing.
    pub(crate) async fn start(
        id: u64,
        name: String,
        cfg: DispatchConfig,
        factory: &ChannelFactory,
        wiring: Wiring,
        ctl: CancellationToken,
    ) -> Result<StreamerHandle> {
        let mut channel = (factory)();
        channel.connect().await?;
        let channel: Arc<dyn ApnsChannel> = Arc::from(channel);
        let metrics = StreamMetrics::for_channel(&cfg, Arc::clone(&channel), &ctl);
        let wait_ctr = Arc::new(FoldCounter::new());
        let stats = Arc::new(StreamerStats::default());
        let handle = StreamerHandle {
            ctl: ctl.clone(),
            wait_ctr: Arc::clone(&wait_ctr),
            stats: Arc::clone(&stats),
        };
        let streamer = Self {
            id,
            name,
            cfg,
            channel,
            metrics,
            wiring,
            ctl,
            wait_ctr,
            stats,
        };
        tokio::spawn(streamer.run());
        Ok(handle)
    }

    async fn run(self) {
        debug!(streamer = %self.name, channel = self.channel.name(), "running");
        let mut in_flight: FuturesUnordered<Exchange> = FuturesUnordered::new();
        let mut in_closed = false;
        let mut did_quit = false;

        loop {
            let budget = self.metrics.budget() as usize;
            let can_accept = !in_closed && in_flight.len() < budget;
            tokio::select! {
                _ = self.ctl.cancelled() => break,
                req = self.wiring.inbound.recv_async(), if can_accept => match req {
                    Ok(notification) => {
                        let channel = Arc::clone(&self.channel);
                        in_flight.push(Box::pin(async move {
                            let outcome = channel.exchange(&notification).await;
                            (notification, outcome)
                        }));
                    }
                    Err(_) => {
                        in_closed = true;
                        if in_flight.is_empty() {
                            break;
                        }
                    }
                },
                Some((notification, outcome)) = in_flight.next(), if !in_flight.is_empty() => {
                    if self.complete(notification, outcome).await {
                        did_quit = true;
                        break;
                    }
                    if in_closed && in_flight.is_empty() {
                        break;
                    }
                }
            }
        }

        debug!(
            streamer = %self.name,
            in_closed,
            did_quit,
            abandoned = in_flight.len(),
            "exiting"
        );
        let exit = StreamerExit {
            id: self.id,
            in_closed,
            did_quit,
        };
        tokio::select! {
            _ = self.wiring.w_exits.send(exit) => {}
            _ = self.wiring.gov_ctl.cancelled() => {}
        }
    }

    /// Handle one finished exchange. Returns true when the worker should
    /// quit because the connection itself failed.
    async fn complete(&self, notification: Notification, outcome: Result<Response>) -> bool {
        match outcome {
            Ok(response) => {
                self.stats.record(notification.approx_wire_bits());
                if !response.is_success() && self.eligible_for_retry(&notification, Some(&response), None) {
                    self.push_retry(notification).await;
                } else {
                    self.deliver(Delivery::new(notification, Ok(response))).await;
                }
                false
            }
            Err(err) => {
                warn!(streamer = %self.name, error = %err, "connection failure");
                if self.eligible_for_retry(&notification, None, Some(&err)) {
                    self.push_retry(notification).await;
                } else {
                    self.deliver(Delivery::new(notification, Err(err))).await;
                }
                true
            }
        }
    }

    fn eligible_for_retry(
        &self,
        notification: &Notification,
        response: Option<&Response>,
        error: Option<&crate::error::Error>,
    ) -> bool {
        self.cfg.max_retries > 0
            && notification.attempts() < self.cfg.max_retries
            && self.cfg.retry_eval.eval(response, error)
    }

    async fn push_retry(&self, mut notification: Notification) {
        notification.bump_attempts();
        tokio::select! {
            res = self.wiring.retry.send(notification) => {
                if res.is_err() {
                    debug!(streamer = %self.name, "retry channel gone, dropping");
                }
            }
            _ = self.ctl.cancelled() => {}
        }
    }

    /// Post one outcome on the callback channel, counting the send as a
    /// wait event when the channel is full at first attempt.
    async fn deliver(&self, delivery: Delivery) {
        match self.wiring.callback.try_send(delivery) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(delivery)) => {
                self.wait_ctr.bump();
                tokio::select! {
                    res = self.wiring.callback.send(delivery) => {
                        if res.is_err() {
                            debug!(streamer = %self.name, "callback closed, dropping outcome");
                        }
                    }
                    _ = self.ctl.cancelled() => {}
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(streamer = %self.name, "callback closed, dropping outcome");
            }
        }
    }
}
