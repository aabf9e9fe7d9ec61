//! Retry re-injection, decoupled from the connection workers.
//!
//! A worker that pushed retries straight onto the client's retry intake
//! could block when the intake is full, and a blocked worker starves its
//! HTTP/2 pipeline. The forwarder absorbs bursts instead: it owns the
//! governor-side retry channel and moves each request into a rotating
//! sub-buffer whose own task drains into the intake. 100 buffered
//! forwarders with 500-slot buffers hold 50 000 in-flight retries on 100
//! live tasks, where per-retry tasks would need 50 000.
//!
//! A retry sitting inside a sub-buffer when a hard stop lands is dropped.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::domain::Notification;

/// Capacity of the governor-side retry channel. Slight buffering so workers
/// rarely wait on the forwarder itself.
pub(crate) const RETRY_CHANNEL_CAPACITY: usize = 100;

/// Requests per sub-buffer before the forwarder rotates to a fresh one.
const SUB_BUFFER_SIZE: usize = 500;

/// Drain the retry channel into rotating sub-buffers until `ctl` fires or
/// every retry sender is gone.
pub(crate) async fn run(
    name: String,
    mut retry_rx: mpsc::Receiver<Notification>,
    intake: mpsc::Sender<Notification>,
    ctl: CancellationToken,
) {
    info!(forwarder = %name, "running");
    let mut buf: Option<mpsc::Sender<Notification>> = None;
    let mut count = 0usize;
    loop {
        tokio::select! {
            _ = ctl.cancelled() => break,
            req = retry_rx.recv() => {
                let Some(req) = req else { break };
                if buf.is_none() || count >= SUB_BUFFER_SIZE {
                    // Dropping the previous sender closes its sub-buffer;
                    // that buffered forwarder drains to completion and exits.
                    let (tx, rx) = mpsc::channel(SUB_BUFFER_SIZE);
                    tokio::spawn(buffered_forwarder(rx, intake.clone(), ctl.clone()));
                    buf = Some(tx);
                    count = 0;
                }
                // At most SUB_BUFFER_SIZE sends per sub-buffer, so this only
                // fails when the receiving task is already gone.
                if let Some(tx) = &buf {
                    if tx.try_send(req).is_err() {
                        debug!(forwarder = %name, "sub-buffer gone, dropping retry");
                        buf = None;
                    }
                }
                count += 1;
            }
        }
    }
    info!(forwarder = %name, "stopped");
}

/// Push every request from one sub-buffer onto the client's retry intake.
async fn buffered_forwarder(
    mut sub: mpsc::Receiver<Notification>,
    intake: mpsc::Sender<Notification>,
    ctl: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = ctl.cancelled() => break,
            req = sub.recv() => {
                let Some(req) = req else { break };
                tokio::select! {
                    res = intake.send(req) => {
                        if res.is_err() {
                            break;
                        }
                    }
                    _ = ctl.cancelled() => break,
                }
            }
        }
    }
}
