//! Video and audio plumbing through ffmpeg and ffprobe.

pub mod ffmpeg;
pub mod frames;
pub mod probe;

pub use ffmpeg::{encode_mp3, extract_audio, mux};
pub use frames::{FrameReader, FrameSink, FrameSource, FrameWriter};
pub use probe::{VideoInfo, probe_video};
