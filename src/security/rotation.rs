use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use crate::logic::Logic;

/// Background task that rotates the token on a fixed interval.
///
/// Timed rotations always grant grace to the retired token. The wait is
/// interrupted by [`RotationScheduler::shutdown`], which exits without a
/// final rotation.
pub struct RotationScheduler {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RotationScheduler {
    pub fn spawn(logic: Logic, interval: Duration) -> Self {
        let (shutdown, mut stop) = watch::channel(false);

        let handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "token rotation started");
            loop {
                tokio::select! {
                    biased;
                    _ = stop.changed() => break,
                    _ = sleep(interval) => {
                        if !logic.rotate_passive(&stop).await {
                            break;
                        }
                    }
                }
            }
            debug!("token rotation stopped");
        });

        Self { shutdown, handle }
    }

    /// Signal the task and wait for it to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.handle.await {
            warn!(error = %e, "token rotation task ended abnormally");
        }
    }
}
