//! One-shot worker bring-up.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::DispatchConfig;
use crate::dispatch::streamer::{Streamer, StreamerHandle};
use crate::dispatch::Wiring;
use crate::error::Result;
use crate::port::ChannelFactory;
use tokio::sync::mpsc;

/// Posted to the governor when a launch attempt finishes, either way.
pub(crate) struct LauncherExit {
    pub(crate) id: u64,
    pub(crate) outcome: Result<StreamerHandle>,
}

/// Brings up a single worker and reports the outcome without ever blocking
/// the governor.
pub(crate) struct Launcher {
    pub(crate) id: u64,
    pub(crate) name: String,
    /// Relaunch pacing; `None` for ordinary scale-up launches.
    pub(crate) delay: Option<Duration>,
    pub(crate) cfg: DispatchConfig,
    pub(crate) factory: ChannelFactory,
    pub(crate) wiring: Wiring,
    pub(crate) exits: mpsc::Sender<LauncherExit>,
    pub(crate) ctl: CancellationToken,
}

impl Launcher {
    pub(crate) async fn launch(self) {
        if let Some(delay) = self.delay {
            if !delay.is_zero() {
                debug!(
                    streamer = %self.name,
                    delay_ms = delay.as_millis() as u64,
                    "pacing relaunch"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.ctl.cancelled() => return,
                }
            }
        }

        // The worker's control token hangs off the launcher's so that a
        // launcher cancelled mid-handoff takes its half-started worker down
        // with it.
        let streamer_ctl = self.ctl.child_token();
        let outcome = Streamer::start(
            self.id,
            self.name,
            self.cfg,
            &self.factory,
            self.wiring,
            streamer_ctl,
        )
        .await;

        let exit = LauncherExit {
            id: self.id,
            outcome,
        };
        // Reading our own control channel here keeps a terminated governor
        // from being blocked on by an unfinished launch report.
        tokio::select! {
            _ = self.exits.send(exit) => {}
            _ = self.ctl.cancelled() => {}
        }
    }
}
