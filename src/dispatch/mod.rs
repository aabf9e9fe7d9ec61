//! The dispatch core: client-facing channel fabric, the governor that owns
//! the worker pool, and the retry path that feeds recoverable failures
//! back into the stream.

mod backoff;
mod client;
mod forwarder;
mod governor;
mod launcher;
mod streamer;
mod wait;

pub use client::{Client, Delivery};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::dispatch::streamer::StreamerExit;
use crate::domain::Notification;

/// Channel endpoints every worker the governor launches is wired to.
#[derive(Clone)]
pub(crate) struct Wiring {
    /// Shared inbound request stream (many readers).
    pub(crate) inbound: flume::Receiver<Notification>,
    /// Delivery callback (many writers).
    pub(crate) callback: mpsc::Sender<Delivery>,
    /// The governor's retry channel, drained by the forwarder.
    pub(crate) retry: mpsc::Sender<Notification>,
    /// Where workers announce their completion.
    pub(crate) w_exits: mpsc::Sender<StreamerExit>,
    /// The governor's own stop signal, watched so a worker never blocks a
    /// terminated governor with its exit report.
    pub(crate) gov_ctl: CancellationToken,
}
