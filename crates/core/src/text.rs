//! Subtitle text rendering onto RGB frames.

use std::collections::HashMap;
use std::path::Path;

use fontdue::layout::{
    CoordinateSystem, GlyphRasterConfig, HorizontalAlign, Layout, LayoutSettings, TextStyle,
    VerticalAlign, WrapStyle,
};
use fontdue::{Font, FontSettings};
use image::RgbImage;
use tracing::warn;

use crate::{
    config::{FontConfig, TextColor},
    error::{NarratorError, Result},
};

/// Something that can burn a subtitle into a frame.
pub trait CaptionPainter {
    fn draw(&mut self, frame: &mut RgbImage, x: u32, y: u32, text: &str);
}

struct GlyphBitmap {
    width: usize,
    height: usize,
    coverage: Vec<u8>,
}

/// Rasterizes text with one font at one size and color.
pub struct TextPainter {
    font: Font,
    size: f32,
    color: TextColor,
    glyph_cache: HashMap<GlyphRasterConfig, GlyphBitmap>,
}

impl TextPainter {
    /// Load the configured font, trying the fallback path once.
    pub fn load(config: &FontConfig) -> Result<Self> {
        let size = config.size as f32;
        let font = match load_font(&config.path, size) {
            Ok(font) => font,
            Err(primary) => {
                warn!(
                    font = %config.path.display(),
                    fallback = %config.fallback_path.display(),
                    error = %primary,
                    "font unavailable, using fallback"
                );
                load_font(&config.fallback_path, size).map_err(|fallback| {
                    NarratorError::FontLoad {
                        primary: config.path.clone(),
                        fallback: config.fallback_path.clone(),
                        reason: format!("{primary}; {fallback}"),
                    }
                })?
            }
        };

        Ok(Self {
            font,
            size,
            color: config.color,
            glyph_cache: HashMap::new(),
        })
    }

    /// Draw `text` with its top-left corner at `(x, y)`. Line breaks in the
    /// text start new lines; anything outside the frame is clipped.
    pub fn draw(&mut self, frame: &mut RgbImage, x: u32, y: u32, text: &str) {
        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x: x as f32,
            y: y as f32,
            max_width: None,
            max_height: None,
            horizontal_align: HorizontalAlign::Left,
            vertical_align: VerticalAlign::Top,
            line_height: 1.0,
            wrap_style: WrapStyle::Letter,
            wrap_hard_breaks: true,
        });
        layout.append(&[&self.font], &TextStyle::new(text, self.size, 0));

        let color = self.color.channels();
        for glyph in layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let bitmap = self.glyph_cache.entry(glyph.key).or_insert_with(|| {
                let (_, coverage) = self.font.rasterize_config(glyph.key);
                GlyphBitmap {
                    width: glyph.width,
                    height: glyph.height,
                    coverage,
                }
            });
            blend_glyph(
                frame,
                glyph.x.round() as i64,
                glyph.y.round() as i64,
                bitmap,
                color,
            );
        }
    }
}

impl CaptionPainter for TextPainter {
    fn draw(&mut self, frame: &mut RgbImage, x: u32, y: u32, text: &str) {
        TextPainter::draw(self, frame, x, y, text);
    }
}

fn load_font(path: &Path, size: f32) -> std::result::Result<Font, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let settings = FontSettings {
        scale: size,
        ..FontSettings::default()
    };
    Font::from_bytes(bytes, settings).map_err(|e| format!("{}: {e}", path.display()))
}

fn blend_glyph(frame: &mut RgbImage, x: i64, y: i64, glyph: &GlyphBitmap, color: [u8; 3]) {
    let (width, height) = (i64::from(frame.width()), i64::from(frame.height()));
    for row in 0..glyph.height {
        let py = y + row as i64;
        if py < 0 || py >= height {
            continue;
        }
        for col in 0..glyph.width {
            let px = x + col as i64;
            if px < 0 || px >= width {
                continue;
            }
            let alpha = u16::from(glyph.coverage[row * glyph.width + col]);
            if alpha == 0 {
                continue;
            }
            let pixel = frame.get_pixel_mut(px as u32, py as u32);
            for (dst, src) in pixel.0.iter_mut().zip(color) {
                let blended = (u16::from(src) * alpha + u16::from(*dst) * (255 - alpha) + 127) / 255;
                *dst = blended as u8;
            }
        }
    }
}
