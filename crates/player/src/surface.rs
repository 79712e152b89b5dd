//! Rendering surface boundary.

use gp_common::{Dimensions, FitRect, ScaleType};

/// One decoded frame, borrowed for the duration of a [`Surface::present`] call.
#[derive(Clone, Copy, Debug)]
pub struct FrameView<'a> {
    /// ARGB pixels, row-major, `dims.pixel_count()` long.
    pub pixels: &'a [u32],
    pub dims: Dimensions,
    /// Frame index within the GIF.
    pub index: u32,
    pub scale: ScaleType,
}

impl FrameView<'_> {
    /// Where this frame should be drawn inside a `target`-sized area.
    pub fn fit(&self, target: Dimensions) -> FitRect {
        self.scale.fit(self.dims, target)
    }
}

/// Consumer of decoded frames.
///
/// Called from the scheduler's animation thread. Implementations must not
/// block for long: frame timing resumes only after `present` returns.
/// Calling [`AnimationScheduler::stop`](crate::AnimationScheduler::stop) from
/// inside `present` is allowed.
pub trait Surface: Send + Sync {
    /// Repaint with `frame`.
    fn present(&self, frame: FrameView<'_>);

    /// The pixel buffer was allocated (`Some`) or released (`None`).
    fn buffer_changed(&self, _dims: Option<Dimensions>) {}
}

/// Surface that drops every frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSurface;

impl Surface for NullSurface {
    fn present(&self, _frame: FrameView<'_>) {}
}
