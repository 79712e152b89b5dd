//! Presentation fit modes.
//!
//! The scale type only affects where a surface draws the frame; decoding
//! always happens at the GIF's native size.

use serde::{Deserialize, Serialize};

use crate::types::Dimensions;

/// How a frame is fitted into the surface's drawing area.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleType {
    /// Stretch to fill the area, ignoring aspect ratio.
    Fill,
    /// Keep aspect ratio, align to the top-left.
    Start,
    /// Keep aspect ratio, centre in the area.
    #[default]
    Center,
    /// Keep aspect ratio, align to the bottom-right.
    End,
}

/// Destination rectangle in surface coordinates.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FitRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ScaleType {
    /// Compute the rectangle a frame of size `src` occupies inside `dst`.
    pub fn fit(self, src: Dimensions, dst: Dimensions) -> FitRect {
        let (dw, dh) = (dst.width as f32, dst.height as f32);
        if src.is_empty() {
            return FitRect { x: 0.0, y: 0.0, width: 0.0, height: 0.0 };
        }
        if self == Self::Fill {
            return FitRect { x: 0.0, y: 0.0, width: dw, height: dh };
        }

        let scale = (dw / src.width as f32).min(dh / src.height as f32);
        let width = src.width as f32 * scale;
        let height = src.height as f32 * scale;
        let (slack_x, slack_y) = (dw - width, dh - height);

        let (x, y) = match self {
            Self::Start | Self::Fill => (0.0, 0.0),
            Self::Center => (slack_x / 2.0, slack_y / 2.0),
            Self::End => (slack_x, slack_y),
        };
        FitRect { x, y, width, height }
    }
}
