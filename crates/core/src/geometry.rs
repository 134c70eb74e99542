//! Layout of the composited canvas.
//!
//! The canvas holds two layers: the background image stretched over the
//! whole canvas, and a vertical slab of the source video on the left. The
//! subtitle caret sits just right of the slab.

use tracing::debug;

/// Axis-aligned pixel rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Canvas and source dimensions a layout is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutInput {
    pub input_width: u32,
    pub input_height: u32,
    pub output_width: u32,
    pub output_height: u32,
    pub bg_offset_x: u32,
    pub bg_offset_y: u32,
}

/// Rectangles for one run. Derived once and never changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Where the scaled background goes; always the full canvas.
    pub background: Rect,
    /// Region of each input frame that feeds the video slab.
    pub slab_source: Rect,
    /// Where the scaled video slab goes.
    pub slab_dest: Rect,
    /// Top-left corner of the subtitle text.
    pub caret: (u32, u32),
}

impl Layout {
    pub fn resolve(input: LayoutInput) -> Self {
        let LayoutInput {
            input_width,
            input_height,
            output_width,
            output_height,
            bg_offset_x,
            bg_offset_y,
        } = input;

        let background = Rect::new(0, 0, output_width, output_height);
        let slab_dest = Rect::new(0, 0, output_height / 2, output_height);
        let slab_source = slab_crop(input_width, input_height);
        let caret = (slab_dest.width + bg_offset_x, bg_offset_y);

        debug!(?slab_source, ?slab_dest, ?caret, "resolved layout");

        Self {
            background,
            slab_source,
            slab_dest,
            caret,
        }
    }
}

/// Crop of the input frame used for the 1:2 video slab.
///
/// Frames shorter than twice their width get a vertically centred band of
/// height `2 * width`, intersected with the frame. A band taller than the
/// frame therefore degrades to the whole frame instead of wrapping around.
fn slab_crop(width: u32, height: u32) -> Rect {
    let band = u64::from(width) * 2;
    if u64::from(height) >= band {
        return Rect::new(0, 0, width, height);
    }

    // Floor division, matching a signed centring offset.
    let offset = (i64::from(height) - band as i64).div_euclid(2);
    let top = offset.max(0);
    let bottom = (offset + band as i64).min(i64::from(height));
    let rows = (bottom - top).max(0);

    Rect::new(0, top as u32, width, rows as u32)
}
