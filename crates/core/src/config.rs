//! Run configuration.
//!
//! Everything the pipeline needs to know about the deployment (canvas size,
//! background image, fonts, speech engines) lives here instead of in the
//! entry point, so the core can be driven with any values.

use std::path::PathBuf;

/// Text color as configured from the subtitle file.
///
/// The alpha channel is always 0. The canvas has no alpha channel, so it
/// never affects drawing and text is rendered opaque.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl TextColor {
    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0 }
    }

    pub fn channels(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl Default for TextColor {
    fn default() -> Self {
        Self::rgb(0, 0, 0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FontConfig {
    pub path: PathBuf,
    /// Tried once when `path` cannot be opened.
    pub fallback_path: PathBuf,
    pub size: u32,
    pub color: TextColor,
}

pub const DEFAULT_FONT_SIZE: u32 = 54;
pub const FALLBACK_FONT_PATH: &str = "/usr/share/fonts/truetype/takao-mincho/TakaoPMincho.ttf";

#[cfg(windows)]
const DEFAULT_FONT_PATH: &str = r"C:\Windows\Fonts\meiryo.ttc";
#[cfg(not(windows))]
const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/takao-gothic/TakaoPGothic.ttf";

impl Default for FontConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_FONT_PATH),
            fallback_path: PathBuf::from(FALLBACK_FONT_PATH),
            size: DEFAULT_FONT_SIZE,
            color: TextColor::default(),
        }
    }
}

/// Style directives read from the subtitle file, applied on top of [`FontConfig`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleOverrides {
    pub font_path: Option<PathBuf>,
    pub font_size: Option<u32>,
    pub font_color: Option<TextColor>,
}

impl FontConfig {
    pub fn apply(&mut self, overrides: &StyleOverrides) {
        if let Some(path) = &overrides.font_path {
            self.path = path.clone();
        }
        if let Some(size) = overrides.font_size {
            self.size = size;
        }
        if let Some(color) = overrides.font_color {
            self.color = color;
        }
    }
}

/// Canvas and layout settings for the compositing pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub output_width: u32,
    pub output_height: u32,
    pub background: PathBuf,
    /// Horizontal offset of the subtitle caret from the right edge of the video slab.
    pub bg_offset_x: u32,
    pub bg_offset_y: u32,
    pub font: FontConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            output_width: 1280,
            output_height: 720,
            background: PathBuf::from("background.png"),
            bg_offset_x: 20,
            bg_offset_y: 130,
            font: FontConfig::default(),
        }
    }
}

/// Speech engines and narration mixing.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechConfig {
    pub voicevox_url: String,
    pub speaker: u32,
    pub open_jtalk_bin: String,
    pub open_jtalk_dictionary: PathBuf,
    pub open_jtalk_voice: PathBuf,
    /// Added to the speaking rate each time a clip overruns its window.
    pub rate_step: f64,
    pub max_attempts: u32,
    /// Gain applied to the original soundtrack before speech is laid over it.
    pub bed_gain_db: f64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            voicevox_url: "http://localhost:50021".to_string(),
            speaker: 0,
            open_jtalk_bin: "open_jtalk".to_string(),
            open_jtalk_dictionary: PathBuf::from("/var/lib/mecab/dic/open-jtalk/naist-jdic"),
            open_jtalk_voice: PathBuf::from(
                "/usr/share/hts-voice/nitech-jp-atr503-m001/nitech_jp_atr503_m001.htsvoice",
            ),
            rate_step: 0.2,
            max_attempts: 20,
            bed_gain_db: -10.0,
        }
    }
}

impl SpeechConfig {
    /// Apply `VOICEVOX_URL`, `OPEN_JTALK_DIC` and `OPEN_JTALK_VOICE` when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("VOICEVOX_URL") {
            self.voicevox_url = url;
        }
        if let Ok(dic) = std::env::var("OPEN_JTALK_DIC") {
            self.open_jtalk_dictionary = PathBuf::from(dic);
        }
        if let Ok(voice) = std::env::var("OPEN_JTALK_VOICE") {
            self.open_jtalk_voice = PathBuf::from(voice);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_given_fields() {
        let mut font = FontConfig::default();
        font.apply(&StyleOverrides {
            font_size: Some(30),
            ..Default::default()
        });
        assert_eq!(font.size, 30);
        assert_eq!(font.path, PathBuf::from(DEFAULT_FONT_PATH));
        assert_eq!(font.color, TextColor::rgb(0, 0, 0));
    }

    #[test]
    fn text_color_alpha_is_zero() {
        assert_eq!(TextColor::rgb(1, 2, 3).a, 0);
        assert_eq!(TextColor::default().channels(), [0, 0, 0]);
    }
}
