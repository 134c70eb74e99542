//! Narrator Core Library
//!
//! Composites a video onto a background image, burns timed subtitles into
//! the frames, and replaces the soundtrack with synthesized narration mixed
//! over the original audio.

pub mod audio;
pub mod compositor;
pub mod config;
pub mod error;
pub mod format;
pub mod geometry;
pub mod media;
pub mod narration;
pub mod paths;
pub mod pipeline;
pub mod speech;
pub mod subtitles;
pub mod text;

// Re-export commonly used items at crate root
pub use audio::AudioBuffer;
pub use compositor::{CompositeSummary, Compositor, composite_video};
pub use text::{CaptionPainter, TextPainter};
pub use config::{FontConfig, RenderConfig, SpeechConfig, StyleOverrides, TextColor};
pub use error::{NarratorError, Result};
pub use format::{format_duration, format_timestamp};
pub use geometry::{Layout, LayoutInput, Rect};
pub use narration::{NarrationJob, mix_narration, plan_jobs};
pub use paths::{get_audio_path, get_output_path, get_subtitled_path};
pub use pipeline::{Job, PreparedJob, prepare};
pub use speech::{OpenJTalk, SpeechBackend, SpeechError, Synthesizer, Voicevox};
pub use subtitles::{Cue, SubtitleScript, parse_script, resolve_cue};
