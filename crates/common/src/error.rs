//! Central error types for the player (thiserror-based).

use thiserror::Error;

use crate::status::DecodeStatus;
use crate::types::SessionId;

/// Top-level player error.
#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to spawn worker thread: {0}")]
    ThreadSpawn(String),
}

/// Errors raised by the session manager on top of engine status codes.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("GIF load failed with engine status {status}")]
    LoadFailed { status: i32 },

    #[error("No GIF session with id {0}")]
    NoSuchSession(SessionId),

    #[error("Wrong pixel buffer size: expected {expected}, got {actual}")]
    WrongBufferSize { expected: usize, actual: usize },

    #[error("Unexpected engine status {code} from {op}")]
    UnexpectedStatus { op: &'static str, code: i32 },

    #[error("Decoding frame {frame} failed: {status:?}")]
    DecodeFailed { frame: u32, status: DecodeStatus },

    #[error("Frame {frame} out of range (frame count {frame_count})")]
    FrameOutOfRange { frame: u32, frame_count: u32 },

    #[error("GIF source unavailable: {0}")]
    SourceUnavailable(#[from] std::io::Error),
}

/// Configuration loading/validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid config: {reason}")]
    Invalid { reason: String },
}

/// Convenience Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Convenience Result type for player operations.
pub type PlayerResult<T> = Result<T, PlayerError>;
