//! Cooperative cancellation threaded through every resolution step.

use tokio::sync::watch;

/// Receiving side of a cancellation signal.
///
/// Cheap to clone. Once cancelled it stays cancelled.
#[derive(Debug, Clone)]
pub struct Cancellation {
    rx: watch::Receiver<bool>,
}

/// Sending side; calling [`CancelHandle::cancel`] wakes every waiter.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Create a linked handle/signal pair.
pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, Cancellation { rx })
}

impl CancelHandle {
    pub fn cancel(&self) {
        // send_replace succeeds even when every receiver is gone.
        self.tx.send_replace(true);
    }
}

impl Cancellation {
    /// A signal that is never triggered.
    pub fn never() -> Self {
        let (_handle, signal) = cancellation();
        signal
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Never resolves if the
    /// handle was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}
