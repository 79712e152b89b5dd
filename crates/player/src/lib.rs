//! `gp-player` — GIF playback on top of `gp-decoder` sessions.
//!
//! - [`scheduler`] — `AnimationScheduler`: load, preload, animate, attach/detach
//! - `preload` — background fast-forward to a start offset
//! - [`builder`] — `PlaybackBuilder` / `PlaybackConfig`
//! - [`surface`] — `Surface` trait the frames are presented to
//! - [`cancel`] — cooperative cancellation tokens

pub mod builder;
pub mod cancel;
mod preload;
pub mod scheduler;
pub mod surface;

pub use builder::{PlaybackBuilder, PlaybackConfig};
pub use cancel::{cancel_pair, CancelHandle, CancelToken};
pub use scheduler::{AnimationScheduler, Phase};
pub use surface::{FrameView, NullSurface, Surface};
