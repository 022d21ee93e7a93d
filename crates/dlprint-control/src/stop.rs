//! Operator stop requests.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// Cloneable handle that asks a running job to stop.
///
/// The controller checks it at every suspension point.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Handle with no stop requested.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Ask the job to stop. Idempotent.
    pub fn request_stop(&self) {
        if !self.tx.send_replace(true) {
            info!("stop requested");
        }
    }

    /// Whether a stop has been requested.
    pub fn is_stop_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Receiver that flips to `true` on a stop request.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for StopHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once a stop is requested; never resolves if the handle is gone.
pub(crate) async fn stop_requested(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|&stop| stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
