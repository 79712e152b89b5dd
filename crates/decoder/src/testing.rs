//! Scripted in-memory engine for tests.
//!
//! [`ScriptedEngine`] plays back a synthetic GIF described by a
//! [`ScriptedGif`] and records every call in a shared [`Journal`], so tests
//! can assert on call counts and ordering (e.g. "exactly one force_cache",
//! "no copy before the preload's last copy"). Frame `k` is a solid fill of
//! [`ScriptedGif::pixel_for(k)`](ScriptedGif::pixel_for).

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use gp_common::{CachingStrategy, DecodeStatus, PixelCopyStatus, SessionId};

use crate::engine::DecodeEngine;

/// Shape of the synthetic GIF every load produces.
#[derive(Clone, Debug)]
pub struct ScriptedGif {
    pub width: u32,
    pub height: u32,
    /// Delay per frame in ms; the length is the frame count.
    pub delays: Vec<i32>,
}

impl ScriptedGif {
    pub fn new(width: u32, height: u32, delays: Vec<i32>) -> Self {
        Self {
            width,
            height,
            delays,
        }
    }

    /// Opaque ARGB colour used to fill frame `frame`.
    pub fn pixel_for(frame: u32) -> u32 {
        0xFF00_0000 | frame
    }

    fn frame_count(&self) -> u32 {
        self.delays.len() as u32
    }

    fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// One recorded engine call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineCall {
    Load { id: SessionId, kind: &'static str },
    /// `in_order` is false when `frame` skipped ahead of the engine's
    /// current frame (or moved backwards without wrapping).
    Advance {
        id: SessionId,
        frame: u32,
        in_order: bool,
    },
    Copy { id: SessionId, frame: u32 },
    ForceCache { id: SessionId },
    Destroy { id: SessionId },
}

/// Shared, clonable log of engine calls.
#[derive(Clone, Debug, Default)]
pub struct Journal {
    calls: Arc<Mutex<Vec<EngineCall>>>,
}

impl Journal {
    fn record(&self, call: EngineCall) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().clone()
    }

    pub fn load_count(&self) -> usize {
        self.count(|c| matches!(c, EngineCall::Load { .. }))
    }

    pub fn force_cache_count(&self, id: SessionId) -> usize {
        self.count(|c| *c == EngineCall::ForceCache { id })
    }

    pub fn destroy_count(&self, id: SessionId) -> usize {
        self.count(|c| *c == EngineCall::Destroy { id })
    }

    /// Frames passed to `advance_to` for `id`, in call order.
    pub fn advances(&self, id: SessionId) -> Vec<u32> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                EngineCall::Advance { id: i, frame, .. } if *i == id => Some(*frame),
                _ => None,
            })
            .collect()
    }

    /// Frames that were current when `copy_pixels` succeeded for `id`.
    pub fn copies(&self, id: SessionId) -> Vec<u32> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                EngineCall::Copy { id: i, frame } if *i == id => Some(*frame),
                _ => None,
            })
            .collect()
    }

    pub fn saw_out_of_order_advance(&self) -> bool {
        self.calls
            .lock()
            .iter()
            .any(|c| matches!(c, EngineCall::Advance { in_order: false, .. }))
    }

    /// Poll until `predicate` holds for the recorded calls or `timeout` passes.
    pub fn wait_until(
        &self,
        timeout: Duration,
        mut predicate: impl FnMut(&[EngineCall]) -> bool,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if predicate(&self.calls.lock()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    fn count(&self, pred: impl Fn(&EngineCall) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }
}

#[derive(Debug)]
struct ScriptedSession {
    current: u32,
}

/// [`DecodeEngine`] over a [`ScriptedGif`], with knobs for failure injection.
#[derive(Debug)]
pub struct ScriptedEngine {
    gif: ScriptedGif,
    sessions: HashMap<SessionId, ScriptedSession>,
    journal: Journal,
    load_status: i32,
    advance_status: Option<i32>,
    copy_status: Option<i32>,
    decode_status: i32,
    step_latency: Duration,
}

impl ScriptedEngine {
    pub fn new(gif: ScriptedGif) -> Self {
        Self {
            gif,
            sessions: HashMap::new(),
            journal: Journal::default(),
            load_status: 1,
            advance_status: None,
            copy_status: None,
            decode_status: DecodeStatus::Ok.code(),
            step_latency: Duration::ZERO,
        }
    }

    /// Handle to the call log; stays valid after the engine is moved.
    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }

    /// Status every load returns (`<= 0` makes loads fail).
    pub fn with_load_status(mut self, status: i32) -> Self {
        self.load_status = status;
        self
    }

    /// Status every `advance_to` returns instead of stepping.
    pub fn with_advance_status(mut self, status: i32) -> Self {
        self.advance_status = Some(status);
        self
    }

    /// Status every `copy_pixels` returns without touching the buffer.
    pub fn with_copy_status(mut self, status: i32) -> Self {
        self.copy_status = Some(status);
        self
    }

    pub fn with_decode_status(mut self, status: i32) -> Self {
        self.decode_status = status;
        self
    }

    /// Time each `advance_to` call blocks for.
    pub fn with_step_latency(mut self, latency: Duration) -> Self {
        self.step_latency = latency;
        self
    }

    fn register(&mut self, id: SessionId, kind: &'static str) -> i32 {
        self.journal.record(EngineCall::Load { id, kind });
        if self.load_status > 0 {
            self.sessions.insert(id, ScriptedSession { current: 0 });
        }
        self.load_status
    }
}

impl DecodeEngine for ScriptedEngine {
    fn load_path(&mut self, _path: &Path, id: SessionId, _caching: CachingStrategy) -> i32 {
        self.register(id, "path")
    }

    fn load_bytes(&mut self, _data: &[u8], id: SessionId, _caching: CachingStrategy) -> i32 {
        self.register(id, "bytes")
    }

    fn load_stream(
        &mut self,
        stream: &mut dyn Read,
        id: SessionId,
        _caching: CachingStrategy,
    ) -> i32 {
        let mut sink = Vec::new();
        let _ = stream.read_to_end(&mut sink);
        self.register(id, "stream")
    }

    fn advance_to(&mut self, frame: i32, id: SessionId) -> i32 {
        let frame_count = self.gif.frame_count();
        let Some(session) = self.sessions.get_mut(&id) else {
            return -1;
        };
        if !self.step_latency.is_zero() {
            std::thread::sleep(self.step_latency);
        }
        if let Some(status) = self.advance_status {
            return status;
        }
        if frame < 0 || frame as u32 >= frame_count {
            return DecodeStatus::EndOfFrame.code();
        }

        let frame = frame as u32;
        let next = if session.current + 1 >= frame_count {
            0
        } else {
            session.current + 1
        };
        let in_order = frame == session.current || frame == next;
        session.current = frame;
        self.journal.record(EngineCall::Advance {
            id,
            frame,
            in_order,
        });
        1
    }

    fn copy_pixels(&mut self, dest: &mut [u32], id: SessionId) -> i32 {
        if let Some(status) = self.copy_status {
            return status;
        }
        let Some(session) = self.sessions.get(&id) else {
            return PixelCopyStatus::NoSession.code();
        };
        if dest.len() != self.gif.pixel_count() {
            return PixelCopyStatus::WrongBufferSize.code();
        }
        dest.fill(ScriptedGif::pixel_for(session.current));
        self.journal.record(EngineCall::Copy {
            id,
            frame: session.current,
        });
        PixelCopyStatus::Success.code()
    }

    fn width(&self, id: SessionId) -> i32 {
        if self.sessions.contains_key(&id) {
            self.gif.width as i32
        } else {
            -1
        }
    }

    fn height(&self, id: SessionId) -> i32 {
        if self.sessions.contains_key(&id) {
            self.gif.height as i32
        } else {
            -1
        }
    }

    fn frame_count(&self, id: SessionId) -> i32 {
        if self.sessions.contains_key(&id) {
            self.gif.frame_count() as i32
        } else {
            -1
        }
    }

    fn frame_delay(&self, frame: i32, id: SessionId) -> i32 {
        if !self.sessions.contains_key(&id) || frame < 0 {
            return -1;
        }
        self.gif.delays.get(frame as usize).copied().unwrap_or(-1)
    }

    fn current_frame(&self, id: SessionId) -> i32 {
        self.sessions.get(&id).map_or(-1, |s| s.current as i32)
    }

    fn decode_status(&self, id: SessionId) -> i32 {
        if self.sessions.contains_key(&id) {
            self.decode_status
        } else {
            -1
        }
    }

    fn force_cache(&mut self, id: SessionId) {
        self.journal.record(EngineCall::ForceCache { id });
    }

    fn destroy(&mut self, id: SessionId) {
        self.journal.record(EngineCall::Destroy { id });
        self.sessions.remove(&id);
    }
}
