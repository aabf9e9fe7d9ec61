//! The user-facing end of the pipeline.
//!
//! A [`Client`] owns the channel fabric the governor and its workers hang
//! off: the bounded inbound request channel every worker reads, the
//! delivery callback channel, and the retry intake that re-injected
//! requests flow back through. Constructing a client spawns the governor;
//! dropping it is a hard stop.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::DispatchConfig;
use crate::dispatch::governor::Governor;
use crate::dispatch::wait::FoldCounter;
use crate::domain::{Notification, Response};
use crate::error::{Error, Result};
use crate::port::ChannelFactory;

/// Outcome of one notification, posted on the callback channel.
///
/// A retriable failure only surfaces here once its retry budget is spent,
/// so a delivery is always terminal for its notification.
#[derive(Debug)]
pub struct Delivery {
    pub notification: Notification,
    pub outcome: Result<Response>,
}

impl Delivery {
    pub(crate) fn new(notification: Notification, outcome: Result<Response>) -> Self {
        Self {
            notification,
            outcome,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(&self.outcome, Ok(r) if r.is_success())
    }
}

/// Entry point to the dispatch pipeline.
pub struct Client {
    inbound_tx: Mutex<Option<flume::Sender<Notification>>>,
    deliveries: Mutex<Option<mpsc::Receiver<Delivery>>>,
    wait_ctr: Arc<FoldCounter>,
    ctl: CancellationToken,
    pump_ctl: CancellationToken,
    done: CancellationToken,
}

impl Client {
    /// Validate the configuration, wire the channel fabric, and spawn the
    /// governor. Must be called from within a tokio runtime.
    pub fn new(cfg: DispatchConfig, factory: ChannelFactory) -> Result<Self> {
        cfg.validate()?;

        let (inbound_tx, inbound_rx) = flume::bounded(cfg.inbound_capacity);
        let (callback_tx, callback_rx) = mpsc::channel(cfg.callback_capacity);
        let (intake_tx, intake_rx) = mpsc::channel(cfg.retry_intake_capacity);
        let wait_ctr = Arc::new(FoldCounter::new());
        let ctl = CancellationToken::new();
        let done = CancellationToken::new();

        // Re-injected requests rejoin the main stream through this pump. A
        // hard stop cancels it through the parent token; a graceful close
        // cancels it directly so the inbound channel can actually close.
        let pump_ctl = ctl.child_token();
        tokio::spawn(retry_pump(
            intake_rx,
            inbound_tx.clone(),
            Arc::clone(&wait_ctr),
            pump_ctl.clone(),
        ));

        let governor = Governor::new(
            "apns",
            cfg,
            factory,
            inbound_rx,
            Arc::clone(&wait_ctr),
            callback_tx,
            intake_tx,
            ctl.clone(),
            done.clone(),
        );
        tokio::spawn(governor.run());

        Ok(Self {
            inbound_tx: Mutex::new(Some(inbound_tx)),
            deliveries: Mutex::new(Some(callback_rx)),
            wait_ctr,
            ctl,
            pump_ctl,
            done,
        })
    }

    /// Submit one notification, waiting when the pipeline is saturated.
    ///
    /// Returns [`Error::Closed`] after [`close`](Self::close) or once the
    /// pipeline has fully stopped.
    pub async fn push(&self, notification: Notification) -> Result<()> {
        let tx = lock_or_recover(&self.inbound_tx).clone();
        let Some(tx) = tx else {
            return Err(Error::Closed);
        };
        match tx.try_send(notification) {
            Ok(()) => Ok(()),
            Err(flume::TrySendError::Full(notification)) => {
                self.wait_ctr.bump();
                tx.send_async(notification)
                    .await
                    .map_err(|_| Error::Closed)
            }
            Err(flume::TrySendError::Disconnected(_)) => Err(Error::Closed),
        }
    }

    /// Take the delivery receiver. Yields one [`Delivery`] per submitted
    /// notification and closes once the governor has fully terminated.
    ///
    /// Returns `None` if it was already taken.
    pub fn take_deliveries(&self) -> Option<mpsc::Receiver<Delivery>> {
        lock_or_recover(&self.deliveries).take()
    }

    /// Graceful stop: close the inbound channel and let the pool drain.
    ///
    /// Workers finish what is in flight, report the closed input, and the
    /// governor terminates once the pool is empty. Retries still inside
    /// the forwarder when the input closes are dropped.
    pub fn close(&self) {
        debug!("closing inbound channel");
        lock_or_recover(&self.inbound_tx).take();
        self.pump_ctl.cancel();
    }

    /// Hard stop: command the governor and everything it owns to exit now.
    pub fn stop(&self) {
        self.ctl.cancel();
    }

    /// Wait until the governor has fully terminated.
    pub async fn done(&self) {
        self.done.cancelled().await;
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.ctl.cancel();
    }
}

/// Move re-injected requests from the retry intake back onto the inbound
/// channel, with the same wait accounting as first-time submissions.
async fn retry_pump(
    mut intake: mpsc::Receiver<Notification>,
    inbound: flume::Sender<Notification>,
    wait_ctr: Arc<FoldCounter>,
    ctl: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = ctl.cancelled() => break,
            req = intake.recv() => {
                let Some(req) = req else { break };
                match inbound.try_send(req) {
                    Ok(()) => {}
                    Err(flume::TrySendError::Full(req)) => {
                        wait_ctr.bump();
                        tokio::select! {
                            res = inbound.send_async(req) => {
                                if res.is_err() {
                                    break;
                                }
                            }
                            _ = ctl.cancelled() => break,
                        }
                    }
                    Err(flume::TrySendError::Disconnected(_)) => {
                        warn!("inbound channel gone, dropping retry");
                        break;
                    }
                }
            }
        }
    }
    debug!("retry pump stopped");
}

/// Lock a mutex, recovering from poisoning.
///
/// If a thread panicked while holding the lock we log and take the data
/// anyway; the client stays operational and the issue surfaces in logs.
fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("mutex poisoned (previous holder panicked), recovering");
            poisoned.into_inner()
        }
    }
}
