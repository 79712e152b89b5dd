//! Per-surface animation scheduler.
//!
//! State machine: `Idle → Preloading? → Running ⇄ Stopped → (reset) Idle`.
//!
//! Two threads may work for one scheduler at a time:
//!
//! ```text
//!   load(source)
//!     +-- SessionManager::load + metadata
//!     +-- preload thread (start offset > 0): advance 1..=offset, copy once
//!   start()
//!     +-- animation thread:
//!           debounce sleep
//!           join preload, take its staged buffer
//!           loop: advance + copy -> present -> sleep(frame delay)
//! ```
//!
//! Frames are always requested in increasing order (wrapping to 0), and the
//! animation thread consumes nothing until the preload has finished or was
//! cancelled. Cancellation is cooperative: a flag checked at each iteration
//! boundary plus a channel that cuts delay sleeps short.

use std::mem;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use gp_common::{
    GifMetadata, PlayerConfig, PlayerError, PlayerResult, RestoreStrategy, ScaleType,
    SessionError, SessionId,
};
use gp_decoder::{GifSource, SessionManager};

use crate::builder::PlaybackConfig;
use crate::cancel::{cancel_pair, CancelHandle, CancelToken};
use crate::preload::{PreloadJob, PreloadTask, StagedFrame};
use crate::surface::{FrameView, Surface};

/// Scheduler lifecycle phase.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    /// No session loaded.
    Idle,
    /// Fast-forwarding to the start offset.
    Preloading,
    /// Animation thread is presenting frames.
    Running,
    /// Session loaded, nothing animating.
    Stopped,
}

#[derive(Debug)]
struct AnimationTask {
    cancel: CancelHandle,
    handle: JoinHandle<()>,
}

struct SchedulerState {
    phase: Phase,
    session: SessionId,
    metadata: Arc<GifMetadata>,
    start_offset: u32,
    restore: RestoreStrategy,
    scale: ScaleType,
    attached: bool,
    /// Frame that was on screen when the surface was last detached.
    last_frame: u32,
    /// Re-openable copy of the current source, for rebuilding on attach.
    reload: Option<GifSource>,
    preload: Option<PreloadTask>,
    animation: Option<AnimationTask>,
    /// Bumped on every start/stop so stale loop threads leave `phase` alone.
    generation: u64,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            session: SessionId::INVALID,
            metadata: Arc::new(GifMetadata::default()),
            start_offset: 0,
            restore: RestoreStrategy::default(),
            scale: ScaleType::default(),
            attached: false,
            last_frame: 0,
            reload: None,
            preload: None,
            animation: None,
            generation: 0,
        }
    }
}

struct Shared {
    manager: Arc<SessionManager>,
    surface: Arc<dyn Surface>,
    config: PlayerConfig,
    current_frame: Arc<AtomicU32>,
    state: Mutex<SchedulerState>,
    /// Serializes load/apply/attach/detach/reset against each other.
    ops: Mutex<()>,
}

/// Drives one surface: loads GIFs, preloads to a start offset, and animates.
pub struct AnimationScheduler {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for AnimationScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("AnimationScheduler")
            .field("phase", &state.phase)
            .field("session", &state.session)
            .field("attached", &state.attached)
            .field("current_frame", &self.current_frame())
            .finish()
    }
}

impl AnimationScheduler {
    pub fn new(
        manager: Arc<SessionManager>,
        surface: Arc<dyn Surface>,
        config: PlayerConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                manager,
                surface,
                config,
                current_frame: Arc::new(AtomicU32::new(0)),
                state: Mutex::new(SchedulerState::default()),
                ops: Mutex::new(()),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn phase(&self) -> Phase {
        let state = self.shared.state.lock();
        let loop_active = state
            .animation
            .as_ref()
            .is_some_and(|a| !a.handle.is_finished());
        match state.phase {
            // A finished preload with no loop waiting on it leaves the
            // session loaded and idle.
            Phase::Preloading
                if !loop_active && state.preload.as_ref().map_or(true, PreloadTask::is_finished) =>
            {
                Phase::Stopped
            }
            Phase::Running if !loop_active => Phase::Stopped,
            phase => phase,
        }
    }

    pub fn session(&self) -> SessionId {
        self.shared.state.lock().session
    }

    /// Metadata of the loaded GIF; zero frames when nothing is loaded.
    pub fn metadata(&self) -> Arc<GifMetadata> {
        Arc::clone(&self.shared.state.lock().metadata)
    }

    pub fn current_frame(&self) -> u32 {
        self.shared.current_frame.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.shared
            .state
            .lock()
            .animation
            .as_ref()
            .is_some_and(|a| !a.handle.is_finished())
    }

    pub fn is_attached(&self) -> bool {
        self.shared.state.lock().attached
    }

    pub fn start_offset(&self) -> u32 {
        self.shared.state.lock().start_offset
    }

    pub fn restore_strategy(&self) -> RestoreStrategy {
        self.shared.state.lock().restore
    }

    pub fn scale_type(&self) -> ScaleType {
        self.shared.state.lock().scale
    }

    // -----------------------------------------------------------------------
    // Settings
    // -----------------------------------------------------------------------

    /// Frame to fast-forward to on the next load.
    pub fn set_start_offset(&self, offset: u32) {
        self.shared.state.lock().start_offset = offset;
    }

    pub fn set_restore_strategy(&self, restore: RestoreStrategy) {
        self.shared.state.lock().restore = restore;
    }

    /// Takes effect from the next presented frame.
    pub fn set_scale_type(&self, scale: ScaleType) {
        self.shared.state.lock().scale = scale;
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Replace the current GIF with `source`.
    ///
    /// Tears down any previous session first. Starts animating right away
    /// when the surface is attached. Returns `false` if the load failed.
    pub fn load(&self, source: GifSource) -> bool {
        let _ops = self.shared.ops.lock();
        let offset = self.shared.state.lock().start_offset;
        self.load_inner(source, offset)
    }

    /// Apply a built configuration: scale type, start offset, restore
    /// strategy, then source. Fields the config leaves unset keep their
    /// current values.
    ///
    /// Returns the load result, or `true` when the config carries no source.
    pub fn apply(&self, config: PlaybackConfig) -> bool {
        let _ops = self.shared.ops.lock();
        let (source, offset) = {
            let mut state = self.shared.state.lock();
            if let Some(scale) = config.scale_type {
                state.scale = scale;
            }
            if let Some(offset) = config.start_offset {
                state.start_offset = offset;
            }
            if let Some(restore) = config.restore_strategy {
                state.restore = restore;
            }
            (config.source, state.start_offset)
        };
        match source {
            Some(source) => self.load_inner(source, offset),
            None => true,
        }
    }

    /// The surface became visible.
    ///
    /// Resumes a live session, or rebuilds the last re-openable source at
    /// the frame chosen by the restore strategy.
    pub fn attach(&self) {
        let _ops = self.shared.ops.lock();
        let (session, reload, offset) = {
            let mut state = self.shared.state.lock();
            state.attached = true;
            let offset = match state.restore {
                RestoreStrategy::LastFrame => state.last_frame,
                RestoreStrategy::Restart => state.start_offset,
            };
            let reload = state.reload.as_ref().and_then(GifSource::try_clone);
            (state.session, reload, offset)
        };
        debug!(id = %session, offset, "Surface attached");

        if session.is_valid() && self.shared.manager.is_alive(session) {
            self.start_logged();
        } else if let Some(source) = reload {
            self.load_inner(source, offset);
        } else {
            debug!("Nothing to resume on attach");
        }
    }

    /// The surface was hidden: stop, destroy the session, and remember the
    /// frame on screen for [`RestoreStrategy::LastFrame`].
    pub fn detach(&self) {
        let _ops = self.shared.ops.lock();
        self.shared.state.lock().attached = false;
        self.stop();
        {
            let mut state = self.shared.state.lock();
            if state.session.is_valid() {
                state.last_frame = self.shared.current_frame.load(Ordering::Acquire);
            }
            debug!(id = %state.session, last_frame = state.last_frame, "Surface detached");
        }
        self.reset_inner();
    }

    /// Start the animation loop. A no-op while a loop is already active or
    /// when no session is loaded.
    pub fn start(&self) -> PlayerResult<()> {
        let mut state = self.shared.state.lock();
        if !state.session.is_valid() {
            debug!("Start ignored, no session loaded");
            return Ok(());
        }
        if state
            .animation
            .as_ref()
            .is_some_and(|a| !a.handle.is_finished())
        {
            debug!(id = %state.session, "Start ignored, animation already running");
            return Ok(());
        }
        if let Some(finished) = state.animation.take() {
            join_worker(finished.handle, "animation");
        }

        let (cancel, token) = cancel_pair();
        state.generation += 1;
        let run = AnimationLoop {
            shared: Arc::clone(&self.shared),
            token,
            session: state.session,
            metadata: Arc::clone(&state.metadata),
            generation: state.generation,
        };
        let handle = thread::Builder::new()
            .name(self.shared.config.thread_name("anim"))
            .spawn(move || run.run())
            .map_err(|e| PlayerError::ThreadSpawn(format!("animation: {e}")))?;

        state.animation = Some(AnimationTask { cancel, handle });
        state.phase = if state.preload.is_some() {
            Phase::Preloading
        } else {
            Phase::Running
        };
        debug!(id = %state.session, phase = ?state.phase, "Animation started");
        Ok(())
    }

    /// Cancel the animation loop and any outstanding preload.
    ///
    /// The session stays loaded. Calling this on an idle scheduler does
    /// nothing. Safe to call from the animation thread itself.
    pub fn stop(&self) {
        let workers = {
            let mut state = self.shared.state.lock();
            let Some(workers) = Workers::take(&mut state) else {
                return;
            };
            state.phase = if state.session.is_valid() {
                Phase::Stopped
            } else {
                Phase::Idle
            };
            workers
        };
        workers.shutdown();
        debug!("Animation stopped");
    }

    /// Stop and destroy the current session, resetting the frame counter.
    pub fn reset(&self) {
        let _ops = self.shared.ops.lock();
        self.reset_inner();
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn start_logged(&self) {
        if let Err(e) = self.start() {
            error!(error = %e, "Failed to start animation");
        }
    }

    /// Detach workers and the session in one state transition, so a
    /// concurrent `start` either lands before (and is shut down here) or
    /// sees no session.
    fn reset_inner(&self) {
        let (workers, session) = {
            let mut state = self.shared.state.lock();
            let workers = Workers::take(&mut state);
            state.metadata = Arc::new(GifMetadata::default());
            state.phase = Phase::Idle;
            (workers, mem::replace(&mut state.session, SessionId::INVALID))
        };
        if let Some(workers) = workers {
            workers.shutdown();
            debug!(id = %session, "Animation stopped for reset");
        }
        self.shared.current_frame.store(0, Ordering::Release);
        if session.is_valid() {
            self.shared.manager.destroy(session);
        }
    }

    fn load_inner(&self, source: GifSource, offset: u32) -> bool {
        self.reset_inner();

        let reload = source.try_clone();
        let kind = source.kind();
        let manager = &self.shared.manager;
        let session = match manager.load(source) {
            Ok(id) => id,
            Err(e) => {
                warn!(kind, error = %e, "Failed to load GIF");
                self.shared.state.lock().reload = None;
                return false;
            }
        };
        let metadata = match manager.metadata(session) {
            Ok(meta) => meta,
            Err(e) => {
                warn!(id = %session, error = %e, "Failed to read GIF metadata");
                manager.destroy(session);
                self.shared.state.lock().reload = None;
                return false;
            }
        };

        let offset = clamp_offset(offset, metadata.frame_count);
        let dims = metadata.dimensions();
        info!(id = %session, kind, dims = %dims, frames = metadata.frame_count, offset, "GIF loaded");

        let attached = {
            let mut state = self.shared.state.lock();
            state.session = session;
            state.metadata = Arc::new(metadata);
            state.reload = reload;
            state.phase = Phase::Stopped;
            self.shared.current_frame.store(0, Ordering::Release);

            if offset > 0 {
                let job = PreloadJob {
                    manager: Arc::clone(manager),
                    session,
                    offset,
                    dims,
                    current_frame: Arc::clone(&self.shared.current_frame),
                };
                match job.spawn(self.shared.config.thread_name("preload")) {
                    Ok(task) => {
                        state.preload = Some(task);
                        state.phase = Phase::Preloading;
                    }
                    Err(e) => error!(id = %session, error = %e, "Failed to start preload"),
                }
            }
            state.attached
        };

        if attached {
            self.start_logged();
        }
        true
    }
}

impl Drop for AnimationScheduler {
    fn drop(&mut self) {
        self.reset_inner();
    }
}

/// Background threads owned by a scheduler, taken out of its state for
/// shutdown.
struct Workers {
    animation: Option<AnimationTask>,
    preload: Option<PreloadTask>,
}

impl Workers {
    /// Take both tasks and invalidate the running loop's generation.
    /// `None` when nothing was running.
    fn take(state: &mut SchedulerState) -> Option<Self> {
        let animation = state.animation.take();
        let preload = state.preload.take();
        if animation.is_none() && preload.is_none() {
            return None;
        }
        state.generation += 1;
        Some(Self { animation, preload })
    }

    /// Cancel both, then join them (never the calling thread).
    fn shutdown(self) {
        if let Some(preload) = &self.preload {
            preload.cancel.cancel();
        }
        if let Some(animation) = &self.animation {
            animation.cancel.cancel();
        }
        if let Some(handle) = self.preload.and_then(|p| p.handle) {
            join_worker(handle, "preload");
        }
        if let Some(animation) = self.animation {
            join_worker(animation.handle, "animation");
        }
    }
}

fn clamp_offset(offset: u32, frame_count: u32) -> u32 {
    let last = frame_count.saturating_sub(1);
    if offset > last {
        warn!(offset, frame_count, "Start offset beyond last frame, clamping");
        last
    } else {
        offset
    }
}

/// Join a worker thread unless it is the calling thread.
fn join_worker<T>(handle: JoinHandle<T>, role: &str) {
    if handle.thread().id() == thread::current().id() {
        debug!(role, "Stop requested from the worker itself, not joining");
        return;
    }
    if handle.join().is_err() {
        warn!(role, "Worker thread panicked");
    }
}

// ---------------------------------------------------------------------------
// Animation thread
// ---------------------------------------------------------------------------

struct AnimationLoop {
    shared: Arc<Shared>,
    token: CancelToken,
    session: SessionId,
    metadata: Arc<GifMetadata>,
    generation: u64,
}

impl AnimationLoop {
    fn run(self) {
        if !self.token.sleep(self.shared.config.debounce()) {
            return;
        }

        let staged = self.await_preload();
        if self.token.is_cancelled() {
            return;
        }
        self.set_phase(Phase::Running);

        let terminal = self.animate(staged);
        if terminal {
            self.set_phase(Phase::Stopped);
        }
    }

    /// Block until the outstanding preload (if any) is done.
    fn await_preload(&self) -> StagedFrame {
        let handle = {
            let mut state = self.shared.state.lock();
            if state.generation != self.generation {
                return None;
            }
            state.preload.as_mut().and_then(|p| p.handle.take())
        };
        let Some(handle) = handle else {
            return None;
        };

        let staged = match handle.join() {
            Ok(staged) => staged,
            Err(_) => {
                warn!(id = %self.session, "Preload thread panicked");
                None
            }
        };

        let mut state = self.shared.state.lock();
        if state.generation == self.generation {
            state.preload = None;
        }
        staged
    }

    /// Present frames until cancelled or a terminal frame. Returns `true`
    /// when the loop ended on a terminal (negative) delay.
    fn animate(&self, staged: StagedFrame) -> bool {
        let shared = &self.shared;
        let dims = self.metadata.dimensions();
        let mut current = shared.current_frame.load(Ordering::Acquire);

        let mut staged_pending = false;
        let mut buffer = match staged {
            Some(pixels) if pixels.len() == dims.pixel_count() => {
                staged_pending = true;
                shared.surface.buffer_changed(Some(dims));
                Some(pixels)
            }
            _ => None,
        };

        let mut terminal = false;
        while !self.token.is_cancelled() {
            let (mut pixels, fresh) = match buffer.take() {
                Some(pixels) => (pixels, false),
                None => (vec![0u32; dims.pixel_count()], true),
            };

            let step = if fresh {
                shared.surface.buffer_changed(Some(dims));
                shared.manager.copy_pixels(&mut pixels, self.session)
            } else if staged_pending {
                staged_pending = false;
                Ok(())
            } else {
                let next = self.metadata.next_frame(current);
                let result = shared
                    .manager
                    .copy_frame_pixels(&mut pixels, next, self.session);
                current = match result {
                    Ok(()) => next,
                    Err(_) => shared
                        .manager
                        .current_frame(self.session)
                        .unwrap_or(current),
                };
                result
            };

            let mut gone = false;
            match step {
                Ok(()) => {
                    let scale = shared.state.lock().scale;
                    shared.surface.present(FrameView {
                        pixels: &pixels,
                        dims,
                        index: current,
                        scale,
                    });
                }
                Err(SessionError::NoSuchSession(_)) => {
                    warn!(id = %self.session, "Session no longer exists, stopping animation");
                    gone = true;
                }
                Err(e) => {
                    warn!(id = %self.session, frame = current, error = %e, "No frame this tick");
                }
            }
            shared.current_frame.store(current, Ordering::Release);
            buffer = Some(pixels);
            if gone {
                break;
            }

            match shared.config.frame_delay(self.metadata.delay_of(current)) {
                Some(delay) => {
                    if !self.token.sleep(delay) {
                        break;
                    }
                }
                None => {
                    debug!(id = %self.session, frame = current, "Terminal frame reached");
                    terminal = true;
                    break;
                }
            }
        }

        if buffer.is_some() {
            shared.surface.buffer_changed(None);
        }
        terminal
    }

    fn set_phase(&self, phase: Phase) {
        let mut state = self.shared.state.lock();
        if state.generation == self.generation {
            state.phase = phase;
        }
    }
}
