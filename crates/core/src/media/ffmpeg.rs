use std::path::Path;

use tokio::process::Command;
use tracing::info;

use crate::error::{NarratorError, Result};

/// Sample rate the narration bed is mixed at.
pub const BED_SAMPLE_RATE: u32 = 44100;
pub const BED_CHANNELS: u16 = 2;

async fn run(action: &str, command: &mut Command) -> Result<()> {
    which::which("ffmpeg").map_err(|_| NarratorError::ToolNotFound { tool: "ffmpeg" })?;
    let output = command.kill_on_drop(true).output().await?;
    if !output.status.success() {
        return Err(NarratorError::ffmpeg(action, &output.stderr));
    }
    Ok(())
}

/// Extract the soundtrack of a video as 16-bit PCM WAV.
pub async fn extract_audio(video_path: &Path, audio_path: &Path) -> Result<()> {
    info!(video = %video_path.display(), "extracting soundtrack");
    run(
        "extracting audio",
        Command::new("ffmpeg")
            .arg("-y")
            .arg("-v")
            .arg("error")
            .arg("-i")
            .arg(video_path)
            .arg("-vn")
            .arg("-acodec")
            .arg("pcm_s16le")
            .arg("-ar")
            .arg(BED_SAMPLE_RATE.to_string())
            .arg("-ac")
            .arg(BED_CHANNELS.to_string())
            .arg(audio_path),
    )
    .await
}

/// Re-encode a WAV file to MP3.
pub async fn encode_mp3(wav_path: &Path, mp3_path: &Path) -> Result<()> {
    run(
        "encoding mp3",
        Command::new("ffmpeg")
            .arg("-y")
            .arg("-v")
            .arg("error")
            .arg("-i")
            .arg(wav_path)
            .arg("-c:a")
            .arg("libmp3lame")
            .arg("-q:a")
            .arg("2")
            .arg(mp3_path),
    )
    .await
}

/// Combine a silent video with an audio track into the final deliverable.
pub async fn mux(video_path: &Path, audio_path: &Path, output_path: &Path) -> Result<()> {
    info!(output = %output_path.display(), "muxing narration");
    run(
        "muxing video and audio",
        Command::new("ffmpeg")
            .arg("-y")
            .arg("-v")
            .arg("error")
            .arg("-i")
            .arg(video_path)
            .arg("-i")
            .arg(audio_path)
            .arg("-map")
            .arg("0:v:0")
            .arg("-map")
            .arg("1:a:0")
            .arg("-c:v")
            .arg("libx264")
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg("-c:a")
            .arg("aac")
            .arg(output_path),
    )
    .await
}
