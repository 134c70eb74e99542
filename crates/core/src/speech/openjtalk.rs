use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::{io::AsyncWriteExt, process::Command};
use tracing::debug;

use super::{SpeechBackend, SpeechError};
use crate::{audio::AudioBuffer, config::SpeechConfig};

const NAME: &str = "Open JTalk";

/// Local Open JTalk engine driven as a child process.
pub struct OpenJTalk {
    binary: String,
    dictionary: PathBuf,
    voice: PathBuf,
}

impl OpenJTalk {
    pub fn new(binary: impl Into<String>, dictionary: PathBuf, voice: PathBuf) -> Self {
        Self {
            binary: binary.into(),
            dictionary,
            voice,
        }
    }

    pub fn from_config(config: &SpeechConfig) -> Self {
        Self::new(
            config.open_jtalk_bin.clone(),
            config.open_jtalk_dictionary.clone(),
            config.open_jtalk_voice.clone(),
        )
    }

    fn unavailable(reason: impl Into<String>) -> SpeechError {
        SpeechError::Unavailable {
            backend: NAME,
            reason: reason.into(),
        }
    }

    fn check_installed(&self) -> Result<PathBuf, SpeechError> {
        let binary = which::which(&self.binary)
            .map_err(|_| Self::unavailable(format!("{} not found in PATH", self.binary)))?;
        if !self.dictionary.is_dir() {
            return Err(Self::unavailable(format!(
                "dictionary {} does not exist",
                self.dictionary.display()
            )));
        }
        if !self.voice.is_file() {
            return Err(Self::unavailable(format!(
                "voice {} does not exist",
                self.voice.display()
            )));
        }
        Ok(binary)
    }
}

#[async_trait]
impl SpeechBackend for OpenJTalk {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn synthesize(&self, text: &str, rate: f64) -> Result<AudioBuffer, SpeechError> {
        let binary = self.check_installed()?;

        // Removed when dropped, right after the clip is loaded.
        let wav = tempfile::Builder::new()
            .prefix("narrator-jtalk-")
            .suffix(".wav")
            .tempfile()?;

        let mut child = Command::new(binary)
            .arg("-x")
            .arg(&self.dictionary)
            .arg("-m")
            .arg(&self.voice)
            .arg("-r")
            .arg(format!("{rate:.2}"))
            .arg("-ow")
            .arg(wav.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(text.as_bytes()).await?;
            stdin.write_all(b"\n").await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(SpeechError::Backend {
                backend: NAME,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let clip = AudioBuffer::open_wav(wav.path())?;
        debug!(rate, duration = clip.duration_secs(), "open_jtalk clip ready");
        Ok(clip)
    }
}
