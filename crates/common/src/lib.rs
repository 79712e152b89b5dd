//! `gp-common` — Shared types, errors, and configuration for the gifplay engine.
//!
//! This crate is the foundation that the decoder and player crates depend on:
//!
//! - **Types**: `SessionId`, `Dimensions`, `GifMetadata` (newtypes for safety)
//! - **Status**: `DecodeStatus`, `PixelCopyStatus` (engine status codes),
//!   `CachingStrategy`, `RestoreStrategy`
//! - **Scale**: `ScaleType`, `FitRect` (presentation only)
//! - **Errors**: `PlayerError`, `SessionError`, `ConfigError` (thiserror-based)
//! - **Config**: `PlayerConfig`

pub mod config;
pub mod error;
pub mod scale;
pub mod status;
pub mod types;

// Re-export commonly used items at crate root
pub use config::PlayerConfig;
pub use error::{ConfigError, PlayerError, PlayerResult, SessionError, SessionResult};
pub use scale::{FitRect, ScaleType};
pub use status::{CachingStrategy, DecodeStatus, PixelCopyStatus, RestoreStrategy};
pub use types::{Dimensions, GifMetadata, SessionId};
