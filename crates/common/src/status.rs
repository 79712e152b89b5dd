//! Engine status codes and playback policy enums.

use serde::{Deserialize, Serialize};

/// Decode status reported by the engine for a session.
///
/// Mirrors the closed set of codes the native decoder returns.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeStatus {
    Working,
    Ok,
    InsufficientFrameData,
    FrameDataError,
    InsufficientData,
    DataError,
    InsufficientMemory,
    FrameNoDisplay,
    EndOfFrame,
}

impl DecodeStatus {
    pub const ALL: [Self; 9] = [
        Self::Working,
        Self::Ok,
        Self::InsufficientFrameData,
        Self::FrameDataError,
        Self::InsufficientData,
        Self::DataError,
        Self::InsufficientMemory,
        Self::FrameNoDisplay,
        Self::EndOfFrame,
    ];

    /// Numeric code on the engine boundary.
    pub fn code(self) -> i32 {
        match self {
            Self::Working => 1,
            Self::Ok => 0,
            Self::InsufficientFrameData => -1,
            Self::FrameDataError => -2,
            Self::InsufficientData => -3,
            Self::DataError => -4,
            Self::InsufficientMemory => -5,
            Self::FrameNoDisplay => -6,
            Self::EndOfFrame => -7,
        }
    }

    /// Map a raw engine code, `None` for codes outside the known set.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    /// Whether the status denotes a usable (fully or partially decoded) GIF.
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok | Self::Working)
    }
}

/// Result of copying the current frame's pixels out of the engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PixelCopyStatus {
    Success,
    NoSession,
    WrongBufferSize,
}

impl PixelCopyStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 1,
            Self::NoSession => -1,
            Self::WrongBufferSize => -2,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Success),
            -1 => Some(Self::NoSession),
            -2 => Some(Self::WrongBufferSize),
            _ => None,
        }
    }
}

/// Process-wide policy for retaining decoded frame data.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachingStrategy {
    /// Nothing is retained; every frame is decoded when visited.
    #[default]
    Disabled,
    /// Frames are retained as they are decoded.
    WhenDecoded,
    /// All frames are materialised right after a successful load.
    PreCache,
}

impl CachingStrategy {
    /// Numeric code passed to the engine on load.
    pub fn code(self) -> u8 {
        match self {
            Self::Disabled => 0,
            Self::WhenDecoded => 1,
            Self::PreCache => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Disabled),
            1 => Some(Self::WhenDecoded),
            2 => Some(Self::PreCache),
            _ => None,
        }
    }

    /// Whether the engine should keep decoded frames at all.
    pub fn retains_frames(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// How playback resumes after a surface is hidden and shown again.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreStrategy {
    /// Start again from the configured start offset.
    #[default]
    Restart,
    /// Resume on the last frame that was displayed.
    LastFrame,
}
