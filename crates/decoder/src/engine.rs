//! Decode engine boundary.
//!
//! The [`DecodeEngine`] trait is the narrow interface to the external,
//! stateful GIF decoder. It deliberately speaks raw `i32` status codes, the
//! same way the native codec does; the [`SessionManager`](crate::SessionManager)
//! is the only place that maps them to typed errors.
//!
//! # Forward-only contract
//!
//! Frame `N`'s pixels are only correct once frames `0..=N` have all been
//! visited in order. Frame 0 is valid right after a successful load. Callers
//! that want frame `N` from a fresh session must call
//! [`advance_to`](DecodeEngine::advance_to) for every intermediate frame.
//!
//! # Status codes
//!
//! - load: `> 0` success, `<= 0` failure (no session is registered)
//! - `advance_to`: `>= 0` success, otherwise a negative [`DecodeStatus`](gp_common::DecodeStatus) code
//! - `copy_pixels`: a [`PixelCopyStatus`](gp_common::PixelCopyStatus) code
//! - getters: `-1` for unknown sessions or out-of-range frames
//!
//! All methods may block and burn CPU. They are never called concurrently:
//! the session manager serializes every call behind one process-wide lock.

use std::io::Read;
use std::path::Path;

use gp_common::{CachingStrategy, SessionId};

/// External frame-decoding engine.
pub trait DecodeEngine: Send {
    /// Load a GIF from a file path and register it under `id`.
    fn load_path(&mut self, path: &Path, id: SessionId, caching: CachingStrategy) -> i32;

    /// Load a GIF from an in-memory buffer.
    fn load_bytes(&mut self, data: &[u8], id: SessionId, caching: CachingStrategy) -> i32;

    /// Load a GIF by draining a byte stream. The caller closes the stream.
    fn load_stream(
        &mut self,
        stream: &mut dyn Read,
        id: SessionId,
        caching: CachingStrategy,
    ) -> i32;

    /// Decode forward until `frame` is the current frame.
    fn advance_to(&mut self, frame: i32, id: SessionId) -> i32;

    /// Copy the current frame as ARGB (`0xAARRGGBB`) into `dest`.
    ///
    /// `dest.len()` must equal `width * height`; on mismatch `dest` is untouched.
    fn copy_pixels(&mut self, dest: &mut [u32], id: SessionId) -> i32;

    fn width(&self, id: SessionId) -> i32;

    fn height(&self, id: SessionId) -> i32;

    fn frame_count(&self, id: SessionId) -> i32;

    /// Delay of `frame` in milliseconds.
    fn frame_delay(&self, frame: i32, id: SessionId) -> i32;

    fn current_frame(&self, id: SessionId) -> i32;

    fn decode_status(&self, id: SessionId) -> i32;

    /// Materialize every frame of the session.
    fn force_cache(&mut self, id: SessionId);

    /// Release all resources held for `id`.
    fn destroy(&mut self, id: SessionId);
}
