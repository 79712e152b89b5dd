//! `gp-decoder` — GIF decode sessions.
//!
//! Owns the boundary to the frame-decoding engine and the session layer on
//! top of it: id allocation, caching policy, source dispatch, and typed
//! error reporting.
//!
//! # Architecture
//!
//! The engine is a black box that decodes one frame at a time, where frame
//! `N` depends on frame `N - 1` having been composited first. It is reached
//! only through the [`DecodeEngine`] trait, which speaks raw status codes.
//! [`SessionManager`] serializes every engine call behind one lock and turns
//! those codes into [`SessionError`](gp_common::SessionError)s.
//!
//! ## Module Overview
//!
//! - [`engine`] — `DecodeEngine` trait (the adapter boundary)
//! - [`source`] — `GifSource` sum type, asset/resource providers
//! - [`allocator`] — wrapping session id counter
//! - [`policy`] — process-wide caching strategy
//! - [`manager`] — `SessionManager`
//! - [`gif_engine`] — engine backed by `gif` + `gif-dispose` (feature `gif-engine`)
//! - [`testing`] — scripted engine with a call journal (feature `testing`)
//!
//! ## Usage
//!
//! ```ignore
//! use gp_decoder::{GifEngine, GifSource, SessionManager};
//!
//! let manager = SessionManager::new(GifEngine::new());
//! let id = manager.load(GifSource::path("spinner.gif"))?;
//! let meta = manager.metadata(id)?;
//!
//! let mut pixels = vec![0u32; meta.dimensions().pixel_count()];
//! for frame in 1..meta.frame_count {
//!     manager.copy_frame_pixels(&mut pixels, frame, id)?;
//!     // hand `pixels` to a surface...
//! }
//! manager.destroy(id);
//! ```

pub mod allocator;
pub mod engine;
#[cfg(feature = "gif-engine")]
pub mod gif_engine;
pub mod manager;
pub mod policy;
pub mod source;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use allocator::IdAllocator;
pub use engine::DecodeEngine;
#[cfg(feature = "gif-engine")]
pub use gif_engine::GifEngine;
pub use manager::SessionManager;
pub use policy::CachingPolicy;
pub use source::{
    AssetProvider, BundledResources, DirAssetProvider, GifSource, GifStream, LoadInput,
    ResourceProvider,
};
