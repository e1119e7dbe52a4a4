use tokio::sync::watch;

/// Shutdown handle for in-flight monitoring.
/// - `subscribe()` の receiver を `ServiceController::with_shutdown` に渡す
/// - `request_shutdown()` で監視中の rollout が `Cancelled` で止まる
#[derive(Debug)]
pub struct ShutdownHandle {
    shutdown_tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self { shutdown_tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Request shutdown for every subscribed monitor.
    /// The orchestrator change itself is not rolled back.
    pub fn request_shutdown(&self) {
        // send_replace: receivers may not exist yet
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        *self.shutdown_tx.borrow()
    }
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}
