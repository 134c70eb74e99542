use std::path::PathBuf;
use thiserror::Error;

use crate::speech::SpeechError;

#[derive(Error, Debug)]
pub enum NarratorError {
    #[error("{tool} not found in PATH")]
    ToolNotFound { tool: &'static str },

    #[error("ffprobe failed for {path}: {reason}")]
    ProbeFailed { path: PathBuf, reason: String },

    #[error("ffmpeg failed while {action}: {reason}")]
    FfmpegFailed { action: String, reason: String },

    #[error("Invalid video {path}: {reason}")]
    InvalidVideo { path: PathBuf, reason: String },

    #[error("Failed to load font {primary} (fallback {fallback}): {reason}")]
    FontLoad {
        primary: PathBuf,
        fallback: PathBuf,
        reason: String,
    },

    #[error("Background image {path} could not be loaded: {source}")]
    Background {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Subtitle file row {row}: {reason}")]
    SubtitleRow { row: usize, reason: String },

    #[error("Speech synthesis failed: {0}")]
    Speech(#[from] SpeechError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("WAV error: {0}")]
    WavError(#[from] hound::Error),
}

impl NarratorError {
    pub(crate) fn ffmpeg(action: impl Into<String>, stderr: &[u8]) -> Self {
        Self::FfmpegFailed {
            action: action.into(),
            reason: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NarratorError>;
