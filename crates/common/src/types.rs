//! Core types with newtype pattern for type safety.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::status::DecodeStatus;

/// Opaque identifier of one loaded GIF session.
///
/// Values are handed out by the id allocator and are non-negative.
/// [`SessionId::INVALID`] (`-1`) means "no session".
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub i32);

impl SessionId {
    pub const INVALID: Self = Self(-1);

    pub fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> i32 {
        self.0
    }

    /// `true` unless this is the [`INVALID`](Self::INVALID) sentinel.
    ///
    /// Says nothing about whether the engine still holds the session.
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "gif#{}", self.0)
        } else {
            f.write_str("gif#invalid")
        }
    }
}

/// Pixel dimensions of a decoded frame.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of ARGB pixels in one frame (`width * height`).
    pub fn pixel_count(self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Snapshot of a session's decode metadata.
///
/// Re-queryable from the session manager; `current_frame` reflects the engine
/// position at the time of the query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GifMetadata {
    /// Total number of frames.
    pub frame_count: u32,
    /// Delay per frame index in milliseconds. Negative means "terminal frame".
    pub delays: BTreeMap<u32, i32>,
    pub width: u32,
    pub height: u32,
    /// Index of the frame the engine currently holds.
    pub current_frame: u32,
    /// Decode status reported by the engine.
    pub status: DecodeStatus,
}

impl Default for GifMetadata {
    fn default() -> Self {
        Self {
            frame_count: 0,
            delays: BTreeMap::new(),
            width: 0,
            height: 0,
            current_frame: 0,
            status: DecodeStatus::FrameNoDisplay,
        }
    }
}

impl GifMetadata {
    /// Delay of `frame` in milliseconds, `-1` for frames the map does not know.
    pub fn delay_of(&self, frame: u32) -> i32 {
        self.delays.get(&frame).copied().unwrap_or(-1)
    }

    pub fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Whether the GIF has more than one frame to cycle through.
    pub fn is_animated(&self) -> bool {
        self.frame_count > 1
    }

    /// Frame that follows `frame`, wrapping to 0 at `frame_count`.
    pub fn next_frame(&self, frame: u32) -> u32 {
        let next = frame + 1;
        if next >= self.frame_count {
            0
        } else {
            next
        }
    }

    /// Sum of all non-negative frame delays (one loop), in milliseconds.
    pub fn loop_duration_ms(&self) -> u64 {
        self.delays
            .values()
            .filter(|d| **d >= 0)
            .map(|d| *d as u64)
            .sum()
    }
}
