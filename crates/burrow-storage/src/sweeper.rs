use burrow_core::{RequestContext, Result, Storage};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone, TypedBuilder)]
pub struct SweeperSettings {
    /// Time between two purges. The first purge runs immediately.
    #[builder(default = DEFAULT_SWEEP_INTERVAL)]
    pub interval: Duration,
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Background task that permanently removes soft-deleted records.
///
/// A failed sweep is logged and retried on the next tick. The loop ends when
/// the shutdown token fires, which also cancels a sweep in progress.
#[derive(Debug)]
pub struct Sweeper<S> {
    storage: S,
    settings: SweeperSettings,
    shutdown: CancellationToken,
}

impl<S: Storage> Sweeper<S> {
    pub fn new(storage: S, settings: SweeperSettings, shutdown: CancellationToken) -> Self {
        Self {
            storage,
            settings,
            shutdown,
        }
    }

    /// Runs a single purge.
    pub async fn sweep_once(&self) -> Result<u64> {
        let ctx = RequestContext::system().with_cancellation(self.shutdown.child_token());
        self.storage.delete_hard(&ctx).await
    }

    pub async fn run(self) {
        info!(interval = ?self.settings.interval, "sweeper started");

        let mut ticker = interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.sweep_once().await {
                Ok(0) => debug!("sweep found nothing to remove"),
                Ok(removed) => info!(removed, "sweep removed soft-deleted records"),
                Err(err) => warn!(error = %err, "sweep failed, retrying next tick"),
            }
        }

        info!("sweeper stopped");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
