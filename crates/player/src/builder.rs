//! Declarative playback requests.
//!
//! ```ignore
//! let applied = PlaybackBuilder::new()
//!     .with_path("spinner.gif")
//!     .with_offset(12)
//!     .with_restore_strategy(RestoreStrategy::LastFrame)
//!     .build()
//!     .apply_to(&scheduler);
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use gp_common::{RestoreStrategy, ScaleType};
use gp_decoder::{AssetProvider, GifSource, ResourceProvider};

use crate::scheduler::AnimationScheduler;

/// Immutable playback request. Unset fields leave the scheduler's current
/// values alone.
#[derive(Debug, Default)]
pub struct PlaybackConfig {
    pub source: Option<GifSource>,
    pub start_offset: Option<u32>,
    pub scale_type: Option<ScaleType>,
    pub restore_strategy: Option<RestoreStrategy>,
}

impl PlaybackConfig {
    /// Apply to `scheduler` in order: scale type, start offset, restore
    /// strategy, source. Returns `false` only if loading the source failed.
    pub fn apply_to(self, scheduler: &AnimationScheduler) -> bool {
        scheduler.apply(self)
    }
}

/// Chainable builder for [`PlaybackConfig`].
#[derive(Debug, Default)]
pub struct PlaybackBuilder {
    config: PlaybackConfig,
}

impl PlaybackBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: GifSource) -> Self {
        self.config.source = Some(source);
        self
    }

    pub fn with_path(self, path: impl Into<PathBuf>) -> Self {
        self.with_source(GifSource::path(path))
    }

    pub fn with_bytes(self, data: impl Into<Arc<[u8]>>) -> Self {
        self.with_source(GifSource::bytes(data))
    }

    /// The stream is read once, on apply.
    pub fn with_stream(self, stream: impl Read + Send + 'static) -> Self {
        self.with_source(GifSource::stream(stream))
    }

    pub fn with_asset(self, provider: Arc<dyn AssetProvider>, name: impl Into<String>) -> Self {
        self.with_source(GifSource::asset(provider, name))
    }

    pub fn with_resource(self, provider: Arc<dyn ResourceProvider>, id: u32) -> Self {
        self.with_source(GifSource::resource(provider, id))
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.config.start_offset = Some(offset);
        self
    }

    pub fn with_scale_type(mut self, scale: ScaleType) -> Self {
        self.config.scale_type = Some(scale);
        self
    }

    pub fn with_restore_strategy(mut self, restore: RestoreStrategy) -> Self {
        self.config.restore_strategy = Some(restore);
        self
    }

    pub fn build(self) -> PlaybackConfig {
        self.config
    }
}
