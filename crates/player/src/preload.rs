//! Background fast-forward to a start offset.
//!
//! The engine only produces frame `N` after visiting `0..N` in order, so
//! starting playback at frame `N` means stepping through every earlier frame
//! first. That work runs on its own thread; the animation loop joins it and
//! takes over the staged buffer before consuming any frame.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use tracing::{debug, info, warn};

use gp_common::{Dimensions, PlayerError, PlayerResult, SessionId};
use gp_decoder::SessionManager;

use crate::cancel::{cancel_pair, CancelHandle, CancelToken};

/// Pixels of the start frame, ready to present.
pub(crate) type StagedFrame = Option<Vec<u32>>;

/// A running (or finished) preload.
///
/// `handle` is taken by the animation loop when it starts waiting on the
/// preload; `cancel` stays with the scheduler so `stop` can still reach it.
#[derive(Debug)]
pub(crate) struct PreloadTask {
    pub(crate) cancel: CancelHandle,
    pub(crate) handle: Option<JoinHandle<StagedFrame>>,
}

impl PreloadTask {
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.as_ref().is_some_and(JoinHandle::is_finished)
    }
}

pub(crate) struct PreloadJob {
    pub(crate) manager: Arc<SessionManager>,
    pub(crate) session: SessionId,
    pub(crate) offset: u32,
    pub(crate) dims: Dimensions,
    pub(crate) current_frame: Arc<AtomicU32>,
}

impl PreloadJob {
    pub(crate) fn spawn(self, thread_name: String) -> PlayerResult<PreloadTask> {
        let (cancel, token) = cancel_pair();
        let handle = thread::Builder::new()
            .name(thread_name)
            .spawn(move || self.run(&token))
            .map_err(|e| PlayerError::ThreadSpawn(format!("preload: {e}")))?;
        Ok(PreloadTask {
            cancel,
            handle: Some(handle),
        })
    }

    fn run(self, token: &CancelToken) -> StagedFrame {
        let started = Instant::now();
        debug!(id = %self.session, offset = self.offset, "Preload started");

        for frame in 1..=self.offset {
            if token.is_cancelled() {
                debug!(id = %self.session, frame, "Preload cancelled");
                return None;
            }
            if let Err(e) = self.manager.advance_to(frame, self.session) {
                warn!(id = %self.session, frame, error = %e, "Preload step failed");
                return None;
            }
            self.current_frame.store(frame, Ordering::Release);
        }

        let mut pixels = vec![0u32; self.dims.pixel_count()];
        if let Err(e) = self.manager.copy_pixels(&mut pixels, self.session) {
            warn!(id = %self.session, error = %e, "Preload copy failed");
            return None;
        }

        info!(
            id = %self.session,
            offset = self.offset,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Preload finished"
        );
        Some(pixels)
    }
}
