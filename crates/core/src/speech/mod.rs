//! Text-to-speech with a fallback chain of engines.
//!
//! [`Synthesizer`] asks each [`SpeechBackend`] in priority order and only
//! moves on when a backend reports [`SpeechError::Unavailable`]. If the
//! clip does not fit the time window it retries at a faster speaking rate.

mod openjtalk;
mod voicevox;

pub use openjtalk::OpenJTalk;
pub use voicevox::Voicevox;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::{audio::AudioBuffer, config::SpeechConfig};

#[derive(Error, Debug)]
pub enum SpeechError {
    #[error("{backend} is unavailable: {reason}")]
    Unavailable {
        backend: &'static str,
        reason: String,
    },

    #[error("{backend} failed: {reason}")]
    Backend {
        backend: &'static str,
        reason: String,
    },

    #[error("No speech backend is available (tried: {})", .tried.join(", "))]
    NoBackendAvailable { tried: Vec<&'static str> },

    #[error("Speech for {text:?} does not fit in {limit:.3}s after {attempts} attempts")]
    WindowTooShort {
        text: String,
        limit: f64,
        attempts: u32,
    },

    #[error("Invalid WAV from speech backend: {0}")]
    Wav(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A speech engine that turns text into audio at a given speaking rate.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Human-readable name for logs and errors.
    fn name(&self) -> &'static str;

    /// Synthesize `text`. `rate` is a multiplier on normal speed.
    async fn synthesize(&self, text: &str, rate: f64) -> Result<AudioBuffer, SpeechError>;
}

/// Fits speech into a time window by escalating the speaking rate.
pub struct Synthesizer {
    backends: Vec<Box<dyn SpeechBackend>>,
    rate_step: f64,
    max_attempts: u32,
}

impl Synthesizer {
    pub fn new(backends: Vec<Box<dyn SpeechBackend>>, rate_step: f64, max_attempts: u32) -> Self {
        Self {
            backends,
            rate_step,
            max_attempts,
        }
    }

    /// Open JTalk first, VOICEVOX second.
    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(
            vec![
                Box::new(OpenJTalk::from_config(config)),
                Box::new(Voicevox::from_config(config)),
            ],
            config.rate_step,
            config.max_attempts,
        )
    }

    /// Produce a clip strictly shorter than `limit` seconds.
    pub async fn synthesize(&self, text: &str, limit: f64) -> Result<AudioBuffer, SpeechError> {
        let too_short = |attempts| SpeechError::WindowTooShort {
            text: text.to_string(),
            limit,
            attempts,
        };
        if !(limit > 0.0) {
            return Err(too_short(0));
        }

        let mut rate = 1.0;
        for attempt in 1..=self.max_attempts {
            let clip = self.synthesize_once(text, rate).await?;
            let duration = clip.duration_secs();
            if duration < limit {
                return Ok(clip);
            }
            debug!(attempt, rate, duration, limit, "speech overran its window");
            rate += self.rate_step;
        }

        Err(too_short(self.max_attempts))
    }

    async fn synthesize_once(&self, text: &str, rate: f64) -> Result<AudioBuffer, SpeechError> {
        for backend in &self.backends {
            match backend.synthesize(text, rate).await {
                Err(SpeechError::Unavailable { reason, .. }) => {
                    warn!(
                        backend = backend.name(),
                        %reason,
                        "speech backend unavailable, trying next"
                    );
                }
                other => return other,
            }
        }
        Err(SpeechError::NoBackendAvailable {
            tried: self.backends.iter().map(|b| b.name()).collect(),
        })
    }
}
