//! The feedback-driven pool controller.
//!
//! Owns every connection worker and pending launch, samples backpressure on
//! the inbound and callback channels, and grows or shrinks the pool between
//! the configured bounds. Runs as a single task; all worker feedback
//! arrives over channels, so none of this state needs a lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::DispatchConfig;
use crate::dispatch::backoff::Backoff;
use crate::dispatch::client::Delivery;
use crate::dispatch::forwarder;
use crate::dispatch::launcher::{Launcher, LauncherExit};
use crate::dispatch::streamer::{StreamerExit, StreamerHandle};
use crate::dispatch::wait::{FoldCounter, WaitCounter};
use crate::dispatch::Wiring;
use crate::domain::Notification;
use crate::port::ChannelFactory;

const FOR_SCALE_UP: bool = true;
const FOR_WIND_DOWN: bool = false;

pub(crate) struct Governor {
    id: String,
    cfg: DispatchConfig,

    /// Poll periods a condition must hold before it moves the pool.
    min_sust: u32,

    /// Whether new launches may start while others are still pending.
    /// The default serializes launches.
    non_blocking: bool,

    factory: ChannelFactory,
    inbound: flume::Receiver<Notification>,
    in_wait_ctr: Arc<FoldCounter>,
    callback: mpsc::Sender<Delivery>,
    retry_intake: mpsc::Sender<Notification>,
    ctl: CancellationToken,
    done: CancellationToken,

    // Worker bookkeeping, touched only by the run loop.
    streamers: HashMap<u64, StreamerHandle>,
    launchers: HashMap<u64, CancellationToken>,
    next_worker_id: u64,

    // Consecutive-period counters for the inbound and outbound channels.
    in_ctr: WaitCounter,
    out_ctr: WaitCounter,

    // Throughput samples for the soft rate caps.
    prev_delivered: u64,
    prev_wire_bits: u64,
    observed_rate: f64,
    observed_bandwidth: f64,

    last_scale: Option<Instant>,
    is_closing: bool,
    relaunch: Backoff,

    w_exit_tx: mpsc::Sender<StreamerExit>,
    l_exit_tx: mpsc::Sender<LauncherExit>,
    retry_tx: mpsc::Sender<Notification>,
    w_exit_rx: Option<mpsc::Receiver<StreamerExit>>,
    l_exit_rx: Option<mpsc::Receiver<LauncherExit>>,
    retry_rx: Option<mpsc::Receiver<Notification>>,
}

impl Governor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: impl Into<String>,
        cfg: DispatchConfig,
        factory: ChannelFactory,
        inbound: flume::Receiver<Notification>,
        in_wait_ctr: Arc<FoldCounter>,
        callback: mpsc::Sender<Delivery>,
        retry_intake: mpsc::Sender<Notification>,
        ctl: CancellationToken,
        done: CancellationToken,
    ) -> Self {
        let exit_capacity = (cfg.max_conns as usize).max(16);
        let (w_exit_tx, w_exit_rx) = mpsc::channel(exit_capacity);
        let (l_exit_tx, l_exit_rx) = mpsc::channel(exit_capacity);
        let (retry_tx, retry_rx) = mpsc::channel(forwarder::RETRY_CHANNEL_CAPACITY);
        let min_sust = cfg.min_sustain_polls();
        let relaunch = Backoff::new(cfg.relaunch_backoff.clone());
        Self {
            id: id.into(),
            cfg,
            min_sust,
            non_blocking: false,
            factory,
            inbound,
            in_wait_ctr,
            callback,
            retry_intake,
            ctl,
            done,
            streamers: HashMap::new(),
            launchers: HashMap::new(),
            next_worker_id: 0,
            in_ctr: WaitCounter::default(),
            out_ctr: WaitCounter::default(),
            prev_delivered: 0,
            prev_wire_bits: 0,
            observed_rate: 0.0,
            observed_bandwidth: 0.0,
            last_scale: None,
            is_closing: false,
            relaunch,
            w_exit_tx,
            l_exit_tx,
            retry_tx,
            w_exit_rx: Some(w_exit_rx),
            l_exit_rx: Some(l_exit_rx),
            retry_rx: Some(retry_rx),
        }
    }

    /// Run the control loop until a hard stop or a graceful drain
    /// completes. Must be called exactly once.
    pub(crate) async fn run(mut self) {
        info!(governor = %self.id, "starting");
        let Some(mut w_exit_rx) = self.w_exit_rx.take() else {
            return;
        };
        let Some(mut l_exit_rx) = self.l_exit_rx.take() else {
            return;
        };
        if self.cfg.max_retries > 0 {
            if let Some(retry_rx) = self.retry_rx.take() {
                tokio::spawn(forwarder::run(
                    format!("{}-retry-forwarder", self.id),
                    retry_rx,
                    self.retry_intake.clone(),
                    self.ctl.clone(),
                ));
            }
        }

        // Bring the pool up to at least the configured minimum.
        self.try_scale_up();

        let mut ticker = if !self.cfg.poll_interval().is_zero() {
            let mut t = tokio::time::interval(self.cfg.poll_interval());
            t.set_missed_tick_behavior(MissedTickBehavior::Skip);
            Some(t)
        } else {
            None
        };
        let ctl = self.ctl.clone();

        info!(governor = %self.id, "running");
        let mut done = false;
        while !done {
            tokio::select! {
                Some(exit) = l_exit_rx.recv() => self.on_launcher_exit(exit),
                Some(exit) = w_exit_rx.recv() => self.on_streamer_exit(exit),
                _ = next_tick(&mut ticker) => {
                    if !self.is_closing {
                        match self.update_counters_and_eval_scaling() {
                            s if s > 0 => self.try_scale_up(),
                            s if s < 0 => self.try_wind_down(),
                            _ => {}
                        }
                    }
                }
                _ = ctl.cancelled() => {
                    info!(governor = %self.id, "terminating");
                    done = true;
                }
            }
            if !done && self.is_closing {
                done = self.streamers.is_empty() && self.launchers.is_empty();
            }
        }

        info!(governor = %self.id, "terminating launchers and streamers");
        for ctl in self.launchers.values() {
            ctl.cancel();
        }
        for handle in self.streamers.values() {
            handle.ctl.cancel();
        }
        info!(governor = %self.id, "stopped");
        self.done.cancel();
    }

    fn on_launcher_exit(&mut self, exit: LauncherExit) {
        self.launchers.remove(&exit.id);
        match exit.outcome {
            Ok(handle) => {
                self.streamers.insert(exit.id, handle);
            }
            Err(err) => {
                warn!(governor = %self.id, worker = exit.id, error = %err, "error starting streamer");
            }
        }
    }

    fn on_streamer_exit(&mut self, exit: StreamerExit) {
        if exit.in_closed && !self.is_closing {
            // Soft stop: the client closed its inbound channel.
            info!(governor = %self.id, "input closed, stopping");
            self.is_closing = true;
        }
        let handle = self.streamers.remove(&exit.id);
        if exit.did_quit {
            // A worker that got real work done before dying resets the
            // relaunch pacing; one that never delivered keeps it growing.
            if handle.is_some_and(|h| h.stats.delivered() > 0) {
                self.relaunch.reset();
            }
            let delay = self.relaunch.next_delay();
            self.launch_streamer(Some(delay));
        }
    }

    /// Fold the period's backpressure samples into the consecutive
    /// counters and decide a scaling direction: +1 when producers are held
    /// back while workers are not, -1 when producers have been unblocked
    /// for the whole window, 0 otherwise.
    fn update_counters_and_eval_scaling(&mut self) -> i32 {
        // Folds are not synchronized with producer bumps; a rough estimate
        // of the disparity is all the decision needs.
        let inbound_waits = self.in_wait_ctr.fold();
        let mut outbound_waits = 0u32;
        let mut delivered = 0u64;
        let mut wire_bits = 0u64;
        for handle in self.streamers.values() {
            outbound_waits = outbound_waits.saturating_add(handle.wait_ctr.fold());
            delivered = delivered.saturating_add(handle.stats.delivered());
            wire_bits = wire_bits.saturating_add(handle.stats.wire_bits());
        }

        let secs = self.cfg.poll_interval().as_secs_f64();
        if secs > 0.0 {
            self.observed_rate = delivered.saturating_sub(self.prev_delivered) as f64 / secs;
            self.observed_bandwidth =
                wire_bits.saturating_sub(self.prev_wire_bits) as f64 / secs;
        }
        self.prev_delivered = delivered;
        self.prev_wire_bits = wire_bits;

        self.in_ctr.acc(inbound_waits);
        self.out_ctr.acc(outbound_waits);
        if self.in_ctr.waits >= self.min_sust && self.out_ctr.no_waits >= self.min_sust {
            1
        } else if self.in_ctr.no_waits >= self.min_sust {
            -1
        } else {
            0
        }
    }

    fn try_scale_up(&mut self) {
        let delta = self.allowed_scale_delta(FOR_SCALE_UP);
        debug!(governor = %self.id, delta, "scale-up check");
        if delta <= 0 {
            return;
        }
        for _ in 0..delta {
            self.launch_streamer(None);
        }
        self.last_scale = Some(Instant::now());
    }

    fn try_wind_down(&mut self) {
        let delta = self.allowed_scale_delta(FOR_WIND_DOWN);
        debug!(governor = %self.id, delta, "wind-down check");
        if delta >= 0 {
            return;
        }
        // Any victims will do; cleanup rides the normal exit pathway, and a
        // commanded exit does not report a dead connection, so no gap-fill
        // launch follows.
        let victims: Vec<u64> = self
            .streamers
            .keys()
            .copied()
            .take(delta.unsigned_abs() as usize)
            .collect();
        for id in &victims {
            if let Some(handle) = self.streamers.get(id) {
                info!(governor = %self.id, worker = *id, "winding down");
                handle.ctl.cancel();
            }
        }
        if !victims.is_empty() {
            self.last_scale = Some(Instant::now());
        }
    }

    /// Admissible pool-size change in the given direction, respecting the
    /// closing latch, the settle period, launch serialization, the
    /// configured bounds, and (for growth) the soft rate caps.
    fn allowed_scale_delta(&self, for_scale_up: bool) -> i64 {
        if self.is_closing {
            return 0;
        }
        if let Some(last) = self.last_scale {
            if last.elapsed() < self.cfg.settle_period() {
                return 0;
            }
        }
        if !self.non_blocking && !self.launchers.is_empty() {
            return 0;
        }
        let provisioned = (self.streamers.len() + self.launchers.len()) as u32;
        let requested = if for_scale_up {
            if provisioned >= self.cfg.max_conns {
                return 0;
            }
            if self.rate_capped() {
                return 0;
            }
            self.cfg.scale.apply(provisioned)
        } else {
            if provisioned <= self.cfg.min_conns {
                return 0;
            }
            self.cfg.scale.apply_inverse(provisioned)
        };
        let requested = requested.clamp(self.cfg.min_conns, self.cfg.max_conns);
        i64::from(requested) - i64::from(provisioned)
    }

    /// Whether observed throughput has reached a configured cap. Gates
    /// further growth only; existing traffic is never throttled.
    fn rate_capped(&self) -> bool {
        (self.cfg.max_rate > 0.0 && self.observed_rate >= self.cfg.max_rate)
            || (self.cfg.max_bandwidth > 0.0 && self.observed_bandwidth >= self.cfg.max_bandwidth)
    }

    fn launch_streamer(&mut self, delay: Option<std::time::Duration>) {
        let id = self.next_worker_id;
        self.next_worker_id += 1;
        let name = format!("{}-streamer-{}", self.id, id);
        let ctl = self.ctl.child_token();
        let launcher = Launcher {
            id,
            name,
            delay,
            cfg: self.cfg.clone(),
            factory: Arc::clone(&self.factory),
            wiring: Wiring {
                inbound: self.inbound.clone(),
                callback: self.callback.clone(),
                retry: self.retry_tx.clone(),
                w_exits: self.w_exit_tx.clone(),
                gov_ctl: self.ctl.clone(),
            },
            exits: self.l_exit_tx.clone(),
            ctl: ctl.clone(),
        };
        self.launchers.insert(id, ctl);
        tokio::spawn(launcher.launch());
    }
}

/// Tick when periodic evaluation is configured; park forever otherwise.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Scale;
    use crate::dispatch::streamer::StreamerStats;
    use crate::testkit;
    use crate::testkit::channel::ScriptedChannel;
    use std::time::Duration;

    fn governor(cfg: DispatchConfig) -> Governor {
        let factory: ChannelFactory = Arc::new(|| Box::new(ScriptedChannel::new()));
        let (_in_tx, in_rx) = flume::bounded(cfg.inbound_capacity);
        let (cb_tx, _cb_rx) = mpsc::channel(cfg.callback_capacity);
        let (rt_tx, _rt_rx) = mpsc::channel(cfg.retry_intake_capacity);
        Governor::new(
            "gov",
            cfg,
            factory,
            in_rx,
            Arc::new(FoldCounter::new()),
            cb_tx,
            rt_tx,
            CancellationToken::new(),
            CancellationToken::new(),
        )
    }

    fn fake_handle() -> StreamerHandle {
        StreamerHandle {
            ctl: CancellationToken::new(),
            wait_ctr: Arc::new(FoldCounter::new()),
            stats: Arc::new(StreamerStats::default()),
        }
    }

    fn add_streamers(gov: &mut Governor, n: u64) {
        for _ in 0..n {
            let id = gov.next_worker_id;
            gov.next_worker_id += 1;
            gov.streamers.insert(id, fake_handle());
        }
    }

    #[tokio::test]
    async fn empty_pool_scales_up_to_min_conns() {
        let gov = governor(testkit::config::dispatch(2, 8));
        assert_eq!(gov.allowed_scale_delta(FOR_SCALE_UP), 2);
    }

    #[tokio::test]
    async fn closing_pool_never_scales() {
        let mut gov = governor(testkit::config::dispatch(1, 8));
        gov.is_closing = true;
        assert_eq!(gov.allowed_scale_delta(FOR_SCALE_UP), 0);
        assert_eq!(gov.allowed_scale_delta(FOR_WIND_DOWN), 0);
    }

    #[tokio::test]
    async fn settle_period_suppresses_scaling() {
        let cfg = DispatchConfig {
            settle_period_ms: 60_000,
            ..testkit::config::dispatch(1, 8)
        };
        let mut gov = governor(cfg);
        gov.last_scale = Some(Instant::now());
        assert_eq!(gov.allowed_scale_delta(FOR_SCALE_UP), 0);
    }

    #[tokio::test]
    async fn pending_launchers_serialize_launches() {
        let mut gov = governor(testkit::config::dispatch(1, 8));
        gov.launchers.insert(0, CancellationToken::new());
        assert_eq!(gov.allowed_scale_delta(FOR_SCALE_UP), 0);
    }

    #[tokio::test]
    async fn exponential_growth_is_clamped_at_max() {
        let cfg = DispatchConfig {
            scale: Scale::Exponential,
            ..testkit::config::dispatch(1, 6)
        };
        let mut gov = governor(cfg);
        add_streamers(&mut gov, 4);
        // 4 doubles to 8, clamped to 6.
        assert_eq!(gov.allowed_scale_delta(FOR_SCALE_UP), 2);
    }

    #[tokio::test]
    async fn full_pool_does_not_grow() {
        let cfg = DispatchConfig {
            scale: Scale::Exponential,
            ..testkit::config::dispatch(1, 4)
        };
        let mut gov = governor(cfg);
        add_streamers(&mut gov, 4);
        assert_eq!(gov.allowed_scale_delta(FOR_SCALE_UP), 0);
    }

    #[tokio::test]
    async fn minimum_pool_does_not_shrink() {
        let cfg = DispatchConfig {
            scale: Scale::Exponential,
            ..testkit::config::dispatch(2, 8)
        };
        let mut gov = governor(cfg);
        add_streamers(&mut gov, 2);
        assert_eq!(gov.allowed_scale_delta(FOR_WIND_DOWN), 0);
    }

    #[tokio::test]
    async fn wind_down_halves_and_respects_min() {
        let cfg = DispatchConfig {
            scale: Scale::Exponential,
            ..testkit::config::dispatch(3, 8)
        };
        let mut gov = governor(cfg);
        add_streamers(&mut gov, 8);
        // 8 halves to 4.
        assert_eq!(gov.allowed_scale_delta(FOR_WIND_DOWN), -4);

        let mut near_min = governor(DispatchConfig {
            scale: Scale::Exponential,
            ..testkit::config::dispatch(3, 8)
        });
        add_streamers(&mut near_min, 4);
        // 4 halves to 2, clamped up to min 3.
        assert_eq!(near_min.allowed_scale_delta(FOR_WIND_DOWN), -1);
    }

    #[tokio::test]
    async fn scale_up_issues_launchers_and_is_idempotent_until_resolved() {
        let mut gov = governor(testkit::config::dispatch(2, 8));
        gov.try_scale_up();
        assert_eq!(gov.launchers.len(), 2);
        // Launches are serialized: a second check with launches pending
        // admits nothing further.
        assert_eq!(gov.allowed_scale_delta(FOR_SCALE_UP), 0);
        assert!(gov.last_scale.is_some());
    }

    #[tokio::test]
    async fn rate_cap_gates_growth_only() {
        let cfg = DispatchConfig {
            max_rate: 100.0,
            scale: Scale::Exponential,
            ..testkit::config::dispatch(1, 8)
        };
        let mut gov = governor(cfg);
        add_streamers(&mut gov, 2);
        gov.observed_rate = 150.0;
        assert_eq!(gov.allowed_scale_delta(FOR_SCALE_UP), 0);
        // Shrinking is still admissible.
        assert_eq!(gov.allowed_scale_delta(FOR_WIND_DOWN), -1);
    }

    #[tokio::test]
    async fn bandwidth_cap_gates_growth() {
        let cfg = DispatchConfig {
            max_bandwidth: 1_000.0,
            scale: Scale::Incremental,
            ..testkit::config::dispatch(1, 8)
        };
        let mut gov = governor(cfg);
        add_streamers(&mut gov, 1);
        gov.observed_bandwidth = 2_000.0;
        assert_eq!(gov.allowed_scale_delta(FOR_SCALE_UP), 0);
    }

    #[tokio::test]
    async fn eval_scales_up_on_sustained_inbound_pressure() {
        let cfg = DispatchConfig {
            min_sustain_ms: 40,
            poll_interval_ms: 20,
            ..testkit::config::dispatch(1, 8)
        };
        let in_ctr = Arc::new(FoldCounter::new());
        let mut gov = {
            let factory: ChannelFactory = Arc::new(|| Box::new(ScriptedChannel::new()));
            let (_in_tx, in_rx) = flume::bounded(cfg.inbound_capacity);
            let (cb_tx, _cb_rx) = mpsc::channel(cfg.callback_capacity);
            let (rt_tx, _rt_rx) = mpsc::channel(cfg.retry_intake_capacity);
            Governor::new(
                "gov",
                cfg,
                factory,
                in_rx,
                Arc::clone(&in_ctr),
                cb_tx,
                rt_tx,
                CancellationToken::new(),
                CancellationToken::new(),
            )
        };
        assert_eq!(gov.min_sust, 2);

        in_ctr.bump();
        assert_eq!(gov.update_counters_and_eval_scaling(), 0);
        in_ctr.bump();
        assert_eq!(gov.update_counters_and_eval_scaling(), 1);
    }

    #[tokio::test]
    async fn eval_scales_down_after_sustained_idle() {
        let cfg = DispatchConfig {
            min_sustain_ms: 40,
            poll_interval_ms: 20,
            ..testkit::config::dispatch(1, 8)
        };
        let mut gov = governor(cfg);
        assert_eq!(gov.update_counters_and_eval_scaling(), 0);
        assert_eq!(gov.update_counters_and_eval_scaling(), -1);
    }

    #[tokio::test]
    async fn eval_holds_when_workers_are_saturated_downstream() {
        let cfg = DispatchConfig {
            min_sustain_ms: 40,
            poll_interval_ms: 20,
            ..testkit::config::dispatch(1, 8)
        };
        let in_ctr = Arc::new(FoldCounter::new());
        let mut gov = {
            let factory: ChannelFactory = Arc::new(|| Box::new(ScriptedChannel::new()));
            let (_in_tx, in_rx) = flume::bounded(cfg.inbound_capacity);
            let (cb_tx, _cb_rx) = mpsc::channel(cfg.callback_capacity);
            let (rt_tx, _rt_rx) = mpsc::channel(cfg.retry_intake_capacity);
            Governor::new(
                "gov",
                cfg,
                factory,
                in_rx,
                Arc::clone(&in_ctr),
                cb_tx,
                rt_tx,
                CancellationToken::new(),
                CancellationToken::new(),
            )
        };
        let handle = fake_handle();
        let out_ctr = Arc::clone(&handle.wait_ctr);
        gov.streamers.insert(0, handle);

        // Both sides blocked: producers wait, but so do the workers.
        for _ in 0..3 {
            in_ctr.bump();
            out_ctr.bump();
            assert_eq!(gov.update_counters_and_eval_scaling(), 0);
        }
    }

    #[tokio::test]
    async fn wind_down_cancels_victims() {
        let cfg = DispatchConfig {
            scale: Scale::Exponential,
            ..testkit::config::dispatch(1, 8)
        };
        let mut gov = governor(cfg);
        add_streamers(&mut gov, 4);
        gov.try_wind_down();
        let cancelled = gov
            .streamers
            .values()
            .filter(|h| h.ctl.is_cancelled())
            .count();
        assert_eq!(cancelled, 2);
        assert!(gov.last_scale.is_some());
    }

    #[tokio::test]
    async fn wind_down_victims_are_not_relaunched() {
        let mut gov = governor(testkit::config::dispatch(1, 8));
        add_streamers(&mut gov, 2);
        gov.on_streamer_exit(StreamerExit {
            id: 0,
            in_closed: false,
            did_quit: false,
        });
        assert_eq!(gov.streamers.len(), 1);
        assert!(gov.launchers.is_empty());
    }

    #[tokio::test]
    async fn dead_streamer_triggers_gap_fill() {
        let mut gov = governor(testkit::config::dispatch(1, 8));
        add_streamers(&mut gov, 2);
        gov.on_streamer_exit(StreamerExit {
            id: 1,
            in_closed: false,
            did_quit: true,
        });
        assert_eq!(gov.streamers.len(), 1);
        assert_eq!(gov.launchers.len(), 1);
    }

    #[tokio::test]
    async fn input_close_latches_the_closing_flag() {
        let mut gov = governor(testkit::config::dispatch(1, 8));
        add_streamers(&mut gov, 1);
        gov.on_streamer_exit(StreamerExit {
            id: 0,
            in_closed: true,
            did_quit: false,
        });
        assert!(gov.is_closing);
        assert_eq!(gov.allowed_scale_delta(FOR_SCALE_UP), 0);
    }

    #[tokio::test]
    async fn min_sust_saturates_without_polling() {
        let gov = governor(testkit::config::dispatch(1, 8));
        assert_eq!(gov.min_sust, u32::MAX);
    }

    #[tokio::test]
    async fn relaunch_pacing_grows_for_workers_that_never_delivered() {
        let mut gov = governor(testkit::config::dispatch(1, 8));
        add_streamers(&mut gov, 1);
        gov.on_streamer_exit(StreamerExit {
            id: 0,
            in_closed: false,
            did_quit: true,
        });
        assert_eq!(gov.launchers.len(), 1);
        // The immediate gap-fill is spent; the next relaunch would wait.
        assert!(gov.relaunch.next_delay() > Duration::ZERO);
    }

    #[tokio::test]
    async fn productive_worker_death_resets_relaunch_pacing() {
        let cfg = DispatchConfig {
            relaunch_backoff: crate::config::RelaunchBackoff {
                initial_delay_ms: 50,
                max_delay_ms: 10_000,
                multiplier: 2.0,
            },
            ..testkit::config::dispatch(1, 8)
        };
        let mut gov = governor(cfg);
        // Simulate a prior crash loop that pushed the delay well past 50ms.
        for _ in 0..4 {
            gov.relaunch.next_delay();
        }

        let handle = fake_handle();
        handle.stats.record(8);
        gov.streamers.insert(0, handle);
        gov.on_streamer_exit(StreamerExit {
            id: 0,
            in_closed: false,
            did_quit: true,
        });
        // The productive death reset pacing; the relaunch after the next
        // one starts back at the initial delay, not the crash-loop delay.
        let next = gov.relaunch.next_delay();
        assert!(next >= Duration::from_millis(50));
        assert!(next <= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn launch_delay_is_zero_then_grows_under_consecutive_deaths() {
        let cfg = DispatchConfig {
            relaunch_backoff: crate::config::RelaunchBackoff {
                initial_delay_ms: 50,
                max_delay_ms: 200,
                multiplier: 2.0,
            },
            ..testkit::config::dispatch(1, 8)
        };
        let mut gov = governor(cfg);
        assert_eq!(gov.relaunch.next_delay(), Duration::ZERO);
        assert!(gov.relaunch.next_delay() >= Duration::from_millis(50));
        gov.relaunch.reset();
        assert_eq!(gov.relaunch.next_delay(), Duration::ZERO);
    }
}
