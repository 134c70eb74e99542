//! The two passes over one input video: compositing, then narration.

use std::path::{Path, PathBuf};

use image::RgbImage;
use tokio::fs;
use tracing::debug;

use crate::{
    compositor::{CompositeSummary, composite_video},
    config::{RenderConfig, SpeechConfig},
    error::{NarratorError, Result},
    geometry::{Layout, LayoutInput},
    media::{VideoInfo, probe_video},
    narration::{NarrationPaths, narrate},
    paths::{get_audio_path, get_output_path, get_subtitled_path},
    speech::Synthesizer,
    subtitles::{SubtitleScript, load_script},
    text::TextPainter,
};

/// What to process and how.
#[derive(Debug, Clone)]
pub struct Job {
    pub input: PathBuf,
    pub subtitles: PathBuf,
    pub render: RenderConfig,
    pub speech: SpeechConfig,
    /// Leave the silent video and mixed audio next to the input.
    pub keep_intermediates: bool,
}

/// A job with every input loaded and validated.
pub struct PreparedJob {
    pub input: PathBuf,
    pub subtitled_path: PathBuf,
    pub audio_path: PathBuf,
    pub output_path: PathBuf,
    pub script: SubtitleScript,
    pub video: VideoInfo,
    pub layout: Layout,
    pub speech: SpeechConfig,
    keep_intermediates: bool,
    background: RgbImage,
    painter: TextPainter,
}

/// Load subtitles, probe the input, and load the background and font.
pub async fn prepare(job: Job) -> Result<PreparedJob> {
    let script = load_script(&job.subtitles).await?;
    let mut render = job.render;
    render.font.apply(&script.style);

    let video = probe_video(&job.input).await?;
    debug!(?video, "probed input");

    let background = image::open(&render.background)
        .map_err(|source| NarratorError::Background {
            path: render.background.clone(),
            source,
        })?
        .to_rgb8();
    let painter = TextPainter::load(&render.font)?;

    let layout = Layout::resolve(LayoutInput {
        input_width: video.width,
        input_height: video.height,
        output_width: render.output_width,
        output_height: render.output_height,
        bg_offset_x: render.bg_offset_x,
        bg_offset_y: render.bg_offset_y,
    });

    Ok(PreparedJob {
        subtitled_path: get_subtitled_path(&job.input),
        audio_path: get_audio_path(&job.input),
        output_path: get_output_path(&job.input),
        input: job.input,
        script,
        video,
        layout,
        speech: job.speech,
        keep_intermediates: job.keep_intermediates,
        background,
        painter,
    })
}

impl PreparedJob {
    /// First pass: write the silent composited video.
    pub async fn composite(&mut self) -> Result<CompositeSummary> {
        composite_video(
            &self.input,
            &self.subtitled_path,
            &self.video,
            self.layout,
            &self.background,
            &self.script.cues,
            &mut self.painter,
        )
        .await
    }

    /// Second pass: synthesize narration and mux the final output.
    pub async fn narrate(&self, synthesizer: &Synthesizer) -> Result<usize> {
        narrate(
            NarrationPaths {
                input: &self.input,
                subtitled: &self.subtitled_path,
                audio: &self.audio_path,
                output: &self.output_path,
            },
            &self.script.cues,
            synthesizer,
            self.speech.bed_gain_db,
        )
        .await
    }

    /// Remove intermediate files unless asked to keep them.
    pub async fn cleanup(&self) -> Result<()> {
        if self.keep_intermediates {
            return Ok(());
        }
        for path in [&self.subtitled_path, &self.audio_path] {
            remove_if_exists(path).await?;
        }
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!(path = %path.display(), "removed intermediate");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_subtitle_file_fails_before_touching_media() {
        let dir = tempfile::tempdir().unwrap();
        let job = Job {
            input: dir.path().join("in.mp4"),
            subtitles: dir.path().join("missing.csv"),
            render: RenderConfig::default(),
            speech: SpeechConfig::default(),
            keep_intermediates: false,
        };
        let err = prepare(job).await.err().unwrap();
        assert!(matches!(err, NarratorError::IoError(_)));
    }

    #[tokio::test]
    async fn remove_if_exists_ignores_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.mp4");
        remove_if_exists(&path).await.unwrap();

        std::fs::write(&path, b"x").unwrap();
        remove_if_exists(&path).await.unwrap();
        assert!(!path.exists());
    }
}
