//! Mock [`ApnsChannel`] implementations for testing.
//!
//! Two mock channel types for different testing needs:
//!
//! - [`ScriptedChannel`] — Pre-loaded connect/exchange results with an
//!   optional per-exchange delay. Best for: launch failures, transport
//!   errors, throughput shaping, pool scaling.
//!
//! - [`AttemptGatedChannel`] — Answers by the notification's attempt
//!   counter. Best for: retry-path tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{Notification, Response};
use crate::error::Result;
use crate::port::ApnsChannel;
use crate::testkit::domain;

/// Tracks how many mock channels are currently alive (constructed and not
/// yet dropped), which is how tests observe pool size from the outside.
#[derive(Debug, Default)]
pub struct AliveGauge(AtomicU32);

impl AliveGauge {
    pub fn count(&self) -> u32 {
        self.0.load(Ordering::SeqCst)
    }
}

/// A mock channel with scripted connect/exchange results.
///
/// Each `connect()`/`exchange()` pops the next result from the matching
/// queue; exhausted queues answer `Ok` / accepted.
pub struct ScriptedChannel {
    connect_results: Mutex<VecDeque<Result<()>>>,
    exchange_results: Mutex<VecDeque<Result<Response>>>,
    exchange_delay: Option<Duration>,
    budget: AtomicU32,
    connect_count: Arc<AtomicU32>,
    exchange_count: Arc<AtomicU32>,
    alive: Option<Arc<AliveGauge>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self {
            connect_results: Mutex::new(VecDeque::new()),
            exchange_results: Mutex::new(VecDeque::new()),
            exchange_delay: None,
            budget: AtomicU32::new(1),
            connect_count: Arc::new(AtomicU32::new(0)),
            exchange_count: Arc::new(AtomicU32::new(0)),
            alive: None,
        }
    }

    pub fn with_connect_results(self, results: Vec<Result<()>>) -> Self {
        *self.connect_results.lock().unwrap() = results.into();
        self
    }

    pub fn with_exchanges(self, results: Vec<Result<Response>>) -> Self {
        *self.exchange_results.lock().unwrap() = results.into();
        self
    }

    /// Sleep this long inside every exchange, shaping per-connection
    /// throughput for backpressure tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.exchange_delay = Some(delay);
        self
    }

    /// Concurrent-stream budget this channel reports.
    pub fn with_budget(self, budget: u32) -> Self {
        self.budget.store(budget, Ordering::SeqCst);
        self
    }

    pub fn set_budget(&self, budget: u32) {
        self.budget.store(budget, Ordering::SeqCst);
    }

    /// Replace the connect counter with a shared one so a factory's
    /// channels count total connections across launches.
    pub fn set_connect_count(&mut self, counter: Arc<AtomicU32>) {
        self.connect_count = counter;
    }

    /// Register this channel with an alive gauge.
    pub fn with_alive_gauge(mut self, gauge: Arc<AliveGauge>) -> Self {
        gauge.0.fetch_add(1, Ordering::SeqCst);
        self.alive = Some(gauge);
        self
    }

    pub fn connect_count(&self) -> u32 {
        self.connect_count.load(Ordering::SeqCst)
    }

    pub fn exchange_count(&self) -> u32 {
        self.exchange_count.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ScriptedChannel {
    fn drop(&mut self) {
        if let Some(gauge) = &self.alive {
            gauge.0.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl ApnsChannel for ScriptedChannel {
    async fn connect(&mut self) -> Result<()> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        self.connect_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn exchange(&self, _notification: &Notification) -> Result<Response> {
        self.exchange_count.fetch_add(1, Ordering::SeqCst);
        let scripted = self.exchange_results.lock().unwrap().pop_front();
        if let Some(delay) = self.exchange_delay {
            tokio::time::sleep(delay).await;
        }
        scripted.unwrap_or_else(|| Ok(domain::accepted()))
    }

    fn stream_budget(&self) -> u32 {
        self.budget.load(Ordering::SeqCst)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// A mock channel that rejects retriably until a notification has been
/// attempted `fail_below` times, then accepts it.
pub struct AttemptGatedChannel {
    fail_below: u32,
    connect_count: Arc<AtomicU32>,
}

impl AttemptGatedChannel {
    pub fn new(fail_below: u32) -> Self {
        Self {
            fail_below,
            connect_count: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn set_connect_count(&mut self, counter: Arc<AtomicU32>) {
        self.connect_count = counter;
    }
}

#[async_trait]
impl ApnsChannel for AttemptGatedChannel {
    async fn connect(&mut self) -> Result<()> {
        self.connect_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn exchange(&self, notification: &Notification) -> Result<Response> {
        if notification.attempts() < self.fail_below {
            Ok(domain::retriable())
        } else {
            Ok(domain::accepted())
        }
    }

    fn name(&self) -> &'static str {
        "mock-attempt-gated"
    }
}
