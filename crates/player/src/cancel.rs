//! Cooperative cancellation for worker threads.
//!
//! A [`CancelHandle`] sets a shared flag and drops the sender side of a
//! crossbeam channel. Every [`CancelToken`] sleeping on that channel wakes at
//! once with `Disconnected`, so a stopped animation does not finish out its
//! current frame delay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

/// Create a linked handle/token pair.
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let flag = Arc::new(AtomicBool::new(false));
    let (wake_tx, wake_rx) = channel::bounded::<()>(0);
    (
        CancelHandle {
            flag: Arc::clone(&flag),
            wake: Mutex::new(Some(wake_tx)),
        },
        CancelToken {
            flag,
            wake: wake_rx,
        },
    )
}

/// Owner side: requests cancellation. Dropping it also cancels.
#[derive(Debug)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
    wake: Mutex<Option<Sender<()>>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.wake.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Worker side: polled at iteration boundaries.
#[derive(Clone, Debug)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    wake: Receiver<()>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` if the full duration elapsed without cancellation.
    pub fn sleep(&self, duration: Duration) -> bool {
        if self.is_cancelled() {
            return false;
        }
        match self.wake.recv_timeout(duration) {
            Err(RecvTimeoutError::Timeout) => !self.is_cancelled(),
            Ok(()) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}
