//! Reference [`DecodeEngine`] backed by the `gif` and `gif-dispose` crates.
//!
//! `gif` handles LZW and colour tables, `gif-dispose` composites frames onto
//! a screen buffer honouring each frame's disposal method. Frames are
//! produced strictly in order by a [`FrameCursor`]; asking for an earlier
//! frame that is not cached rewinds the cursor and decodes from frame 0.
//!
//! Caching follows the strategy passed on load:
//! - `Disabled`: only the current frame is held
//! - `WhenDecoded`: every frame is kept the first time it is decoded
//! - `PreCache`: as `WhenDecoded`, and `force_cache` decodes all frames up front

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;
use std::sync::Arc;

use gif::{ColorOutput, DecodeOptions, Decoder};
use gif_dispose::Screen;
use thiserror::Error;
use tracing::{debug, trace, warn};

use gp_common::{CachingStrategy, DecodeStatus, PixelCopyStatus, SessionId};

use crate::engine::DecodeEngine;

const SUCCESS: i32 = 1;
const UNKNOWN_SESSION: i32 = -1;

#[derive(Debug, Error)]
enum CursorError {
    #[error("GIF decoding failed: {0}")]
    Decode(#[from] gif::DecodingError),

    #[error("Frame compositing failed: {0}")]
    Dispose(String),

    #[error("GIF ended before frame {0}")]
    Exhausted(u32),
}

/// Sequential frame decoder over an in-memory GIF.
struct FrameCursor {
    decoder: Decoder<Cursor<Arc<[u8]>>>,
    screen: Screen,
    /// Index of the frame the next `step` produces.
    next: u32,
}

impl FrameCursor {
    fn open(data: Arc<[u8]>) -> Result<Self, CursorError> {
        let mut options = DecodeOptions::new();
        options.set_color_output(ColorOutput::Indexed);
        let decoder = options.read_info(Cursor::new(data))?;
        let screen = Screen::new_decoder(&decoder);
        Ok(Self {
            decoder,
            screen,
            next: 0,
        })
    }

    /// Decode and composite the next frame. `Ok(false)` at end of stream.
    fn step(&mut self) -> Result<bool, CursorError> {
        let Some(frame) = self.decoder.read_next_frame()? else {
            return Ok(false);
        };
        self.screen
            .blit_frame(frame)
            .map_err(|e| CursorError::Dispose(format!("{e:?}")))?;
        self.next += 1;
        Ok(true)
    }

    /// Step until `frame` has been composited.
    fn seek(&mut self, frame: u32) -> Result<(), CursorError> {
        while self.next <= frame {
            if !self.step()? {
                return Err(CursorError::Exhausted(frame));
            }
        }
        Ok(())
    }

    /// The composited screen as `0xAARRGGBB`.
    fn argb(&mut self) -> Arc<[u32]> {
        self.screen
            .pixels_rgba()
            .pixels()
            .map(|px| {
                u32::from(px.a) << 24
                    | u32::from(px.r) << 16
                    | u32::from(px.g) << 8
                    | u32::from(px.b)
            })
            .collect()
    }
}

/// Per-session decode state.
struct GifSession {
    data: Arc<[u8]>,
    width: u32,
    height: u32,
    /// Delay per frame in milliseconds.
    delays: Vec<i32>,
    caching: CachingStrategy,
    cursor: FrameCursor,
    current: u32,
    frame: Arc<[u32]>,
    cache: Vec<Option<Arc<[u32]>>>,
    status: DecodeStatus,
}

impl GifSession {
    fn open(data: Arc<[u8]>, caching: CachingStrategy) -> Result<Self, DecodeStatus> {
        let (width, height, delays, status) = scan(Arc::clone(&data))?;

        let mut cursor = FrameCursor::open(Arc::clone(&data)).map_err(|e| {
            debug!(error = %e, "GIF header rejected");
            DecodeStatus::DataError
        })?;
        cursor.seek(0).map_err(|e| {
            debug!(error = %e, "First GIF frame could not be decoded");
            DecodeStatus::FrameDataError
        })?;
        let frame = cursor.argb();

        let mut cache = vec![None; delays.len()];
        if caching.retains_frames() {
            cache[0] = Some(Arc::clone(&frame));
        }

        Ok(Self {
            data,
            width,
            height,
            delays,
            caching,
            cursor,
            current: 0,
            frame,
            cache,
            status,
        })
    }

    fn frame_count(&self) -> u32 {
        self.delays.len() as u32
    }

    fn advance(&mut self, target: u32) -> Result<(), CursorError> {
        if target == self.current {
            return Ok(());
        }
        if let Some(cached) = &self.cache[target as usize] {
            self.frame = Arc::clone(cached);
            self.current = target;
            return Ok(());
        }

        if self.cursor.next > target + 1 {
            trace!(from = self.cursor.next, target, "Rewinding frame cursor");
            self.cursor = FrameCursor::open(Arc::clone(&self.data))?;
        }
        while self.cursor.next <= target {
            if !self.cursor.step()? {
                return Err(CursorError::Exhausted(target));
            }
            if self.caching.retains_frames() {
                let decoded = self.cursor.next - 1;
                self.cache[decoded as usize] = Some(self.cursor.argb());
            }
        }

        self.frame = match &self.cache[target as usize] {
            Some(cached) => Arc::clone(cached),
            None => self.cursor.argb(),
        };
        self.current = target;
        Ok(())
    }

    /// Decode every frame on a separate cursor and keep them all.
    fn cache_all(&mut self) -> Result<(), CursorError> {
        let mut cursor = FrameCursor::open(Arc::clone(&self.data))?;
        for index in 0..self.frame_count() {
            if !cursor.step()? {
                return Err(CursorError::Exhausted(index));
            }
            let slot = &mut self.cache[index as usize];
            if slot.is_none() {
                *slot = Some(cursor.argb());
            }
        }
        Ok(())
    }
}

/// Read the whole GIF once for its dimensions and frame delays.
///
/// A GIF that breaks off after at least one frame is accepted with status
/// `Working`; the frames read so far are playable.
fn scan(data: Arc<[u8]>) -> Result<(u32, u32, Vec<i32>, DecodeStatus), DecodeStatus> {
    let mut options = DecodeOptions::new();
    options.set_color_output(ColorOutput::Indexed);
    let mut decoder = options.read_info(Cursor::new(data)).map_err(|e| {
        debug!(error = %e, "GIF header rejected");
        DecodeStatus::DataError
    })?;

    let width = u32::from(decoder.width());
    let height = u32::from(decoder.height());
    let mut delays = Vec::new();
    let mut status = DecodeStatus::Ok;
    loop {
        match decoder.read_next_frame() {
            Ok(Some(frame)) => delays.push(i32::from(frame.delay) * 10),
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, frames = delays.len(), "GIF data ends early");
                status = DecodeStatus::Working;
                break;
            }
        }
    }

    if delays.is_empty() {
        return Err(DecodeStatus::InsufficientFrameData);
    }
    Ok((width, height, delays, status))
}

/// In-process decode engine.
#[derive(Default)]
pub struct GifEngine {
    sessions: HashMap<SessionId, GifSession>,
}

impl std::fmt::Debug for GifEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GifEngine")
            .field("sessions", &self.sessions.len())
            .finish()
    }
}

impl GifEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, data: Arc<[u8]>, id: SessionId, caching: CachingStrategy) -> i32 {
        match GifSession::open(data, caching) {
            Ok(session) => {
                self.sessions.insert(id, session);
                SUCCESS
            }
            Err(status) => status.code(),
        }
    }
}

impl DecodeEngine for GifEngine {
    fn load_path(&mut self, path: &Path, id: SessionId, caching: CachingStrategy) -> i32 {
        match std::fs::read(path) {
            Ok(data) => self.register(data.into(), id, caching),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read GIF file");
                0
            }
        }
    }

    fn load_bytes(&mut self, data: &[u8], id: SessionId, caching: CachingStrategy) -> i32 {
        self.register(Arc::from(data), id, caching)
    }

    fn load_stream(
        &mut self,
        stream: &mut dyn Read,
        id: SessionId,
        caching: CachingStrategy,
    ) -> i32 {
        let mut data = Vec::new();
        if let Err(e) = stream.read_to_end(&mut data) {
            warn!(error = %e, "Failed to read GIF stream");
            return 0;
        }
        self.register(data.into(), id, caching)
    }

    fn advance_to(&mut self, frame: i32, id: SessionId) -> i32 {
        let Some(session) = self.sessions.get_mut(&id) else {
            return UNKNOWN_SESSION;
        };
        if frame < 0 || frame as u32 >= session.frame_count() {
            return DecodeStatus::EndOfFrame.code();
        }
        match session.advance(frame as u32) {
            Ok(()) => SUCCESS,
            Err(CursorError::Exhausted(_)) => {
                session.status = DecodeStatus::EndOfFrame;
                DecodeStatus::EndOfFrame.code()
            }
            Err(e) => {
                warn!(id = %id, frame, error = %e, "Frame decode failed");
                session.status = DecodeStatus::FrameDataError;
                DecodeStatus::FrameDataError.code()
            }
        }
    }

    fn copy_pixels(&mut self, dest: &mut [u32], id: SessionId) -> i32 {
        let Some(session) = self.sessions.get(&id) else {
            return PixelCopyStatus::NoSession.code();
        };
        if dest.len() != session.frame.len() {
            return PixelCopyStatus::WrongBufferSize.code();
        }
        dest.copy_from_slice(&session.frame);
        PixelCopyStatus::Success.code()
    }

    fn width(&self, id: SessionId) -> i32 {
        self.sessions.get(&id).map_or(-1, |s| s.width as i32)
    }

    fn height(&self, id: SessionId) -> i32 {
        self.sessions.get(&id).map_or(-1, |s| s.height as i32)
    }

    fn frame_count(&self, id: SessionId) -> i32 {
        self.sessions.get(&id).map_or(-1, |s| s.frame_count() as i32)
    }

    fn frame_delay(&self, frame: i32, id: SessionId) -> i32 {
        let Some(session) = self.sessions.get(&id) else {
            return -1;
        };
        usize::try_from(frame)
            .ok()
            .and_then(|f| session.delays.get(f).copied())
            .unwrap_or(-1)
    }

    fn current_frame(&self, id: SessionId) -> i32 {
        self.sessions.get(&id).map_or(-1, |s| s.current as i32)
    }

    fn decode_status(&self, id: SessionId) -> i32 {
        self.sessions.get(&id).map_or(-1, |s| s.status.code())
    }

    fn force_cache(&mut self, id: SessionId) {
        let Some(session) = self.sessions.get_mut(&id) else {
            return;
        };
        if let Err(e) = session.cache_all() {
            warn!(id = %id, error = %e, "Pre-caching stopped early");
        }
    }

    fn destroy(&mut self, id: SessionId) {
        self.sessions.remove(&id);
    }
}
