//! Replace a video's soundtrack with narration laid over its quieted audio.

use std::path::Path;

use tracing::{debug, info};

use crate::{
    audio::AudioBuffer,
    error::Result,
    format::format_timestamp,
    media::{encode_mp3, extract_audio, mux},
    speech::Synthesizer,
    subtitles::Cue,
};

/// One utterance to synthesize: its text, where it starts, and how long it
/// may run before the next cue begins.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationJob {
    pub start: f64,
    pub limit: f64,
    pub text: String,
}

/// One job per cue. The window of the last cue runs to the end of the bed.
pub fn plan_jobs(cues: &[Cue], bed_duration: f64) -> Vec<NarrationJob> {
    let mut timeline = cues.to_vec();
    timeline.push(Cue::new(bed_duration, ""));

    timeline
        .windows(2)
        .map(|pair| NarrationJob {
            start: pair[0].start,
            limit: pair[1].start - pair[0].start,
            text: pair[0].text.replace('\n', ""),
        })
        .collect()
}

/// Overlay synthesized speech for every cue onto `bed`.
pub async fn mix_narration(
    mut bed: AudioBuffer,
    cues: &[Cue],
    synthesizer: &Synthesizer,
) -> Result<AudioBuffer> {
    let jobs = plan_jobs(cues, bed.duration_secs());
    let total = jobs.len();

    for (i, job) in jobs.iter().enumerate() {
        let clip = synthesizer.synthesize(&job.text, job.limit).await?;
        let offset_ms = (job.start.max(0.0) * 1000.0) as u64;
        debug!(
            cue = i + 1,
            total,
            at = %format_timestamp(job.start),
            window = job.limit,
            clip = clip.duration_secs(),
            "narrating cue"
        );
        bed.overlay(&clip, offset_ms);
    }

    Ok(bed)
}

/// Files involved in narrating one video.
#[derive(Debug, Clone, Copy)]
pub struct NarrationPaths<'a> {
    /// Original video; its soundtrack becomes the bed.
    pub input: &'a Path,
    /// Silent composited video.
    pub subtitled: &'a Path,
    /// Mixed narration, encoded to MP3.
    pub audio: &'a Path,
    pub output: &'a Path,
}

/// Extract, attenuate, narrate, encode, and mux. Returns the number of
/// cues narrated.
pub async fn narrate(
    paths: NarrationPaths<'_>,
    cues: &[Cue],
    synthesizer: &Synthesizer,
    bed_gain_db: f64,
) -> Result<usize> {
    let bed_wav = tempfile::Builder::new()
        .prefix("narrator-bed-")
        .suffix(".wav")
        .tempfile()?;

    extract_audio(paths.input, bed_wav.path()).await?;
    let mut bed = AudioBuffer::open_wav(bed_wav.path())?;
    bed.apply_gain_db(bed_gain_db);
    info!(
        duration = bed.duration_secs(),
        cues = cues.len(),
        "synthesizing narration"
    );

    let mixed = mix_narration(bed, cues, synthesizer).await?;
    mixed.write_wav(bed_wav.path())?;

    encode_mp3(bed_wav.path(), paths.audio).await?;
    mux(paths.subtitled, paths.audio, paths.output).await?;

    Ok(cues.len())
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::speech::{SpeechBackend, SpeechError};

    /// Records every request and answers with a 0.1s clip of constant level.
    struct Recorder(Arc<Mutex<Vec<String>>>);

    #[async_trait]
    impl SpeechBackend for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn synthesize(
            &self,
            text: &str,
            _rate: f64,
        ) -> std::result::Result<AudioBuffer, SpeechError> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(AudioBuffer::new(vec![0.5; 100], 1000, 1))
        }
    }

    fn cues() -> Vec<Cue> {
        vec![
            Cue::new(0.0, "first\nline"),
            Cue::new(1.5, ""),
            Cue::new(2.0, "last"),
        ]
    }

    #[test]
    fn one_job_per_cue_with_window_to_next_start() {
        let cues = cues();
        let jobs = plan_jobs(&cues, 5.0);

        assert_eq!(jobs.len(), 3);
        assert_eq!(jobs[0].limit, 1.5);
        assert_eq!(jobs[1].limit, 0.5);
        assert_eq!(jobs[2].limit, 3.0);
        assert_eq!(jobs[0].text, "firstline");
        assert_eq!(cues.len(), 3, "caller's cues are untouched");
    }

    #[test]
    fn no_cues_means_no_jobs() {
        assert!(plan_jobs(&[], 10.0).is_empty());
    }

    #[tokio::test]
    async fn every_cue_is_synthesized_once_and_overlaid_at_its_start() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let synth = Synthesizer::new(vec![Box::new(Recorder(Arc::clone(&calls)))], 0.2, 5);
        let bed = AudioBuffer::silent(5.0, 1000, 1);

        let mixed = mix_narration(bed, &cues(), &synth).await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["firstline", "", "last"]);
        assert_eq!(mixed.samples.len(), 5000);
        assert_eq!(mixed.samples[0], 0.5);
        assert_eq!(mixed.samples[99], 0.5);
        assert_eq!(mixed.samples[100], 0.0);
        assert_eq!(mixed.samples[1500], 0.5);
        assert_eq!(mixed.samples[2050], 0.5);
        assert_eq!(mixed.samples[2100], 0.0);
    }

    #[tokio::test]
    async fn window_too_short_aborts_the_mix() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let synth = Synthesizer::new(vec![Box::new(Recorder(Arc::clone(&calls)))], 0.2, 3);
        // Second cue window is only 0.05s, shorter than every clip.
        let cues = vec![Cue::new(0.0, "a"), Cue::new(0.5, "b"), Cue::new(0.55, "c")];

        let err = mix_narration(AudioBuffer::silent(2.0, 1000, 1), &cues, &synth)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            crate::error::NarratorError::Speech(SpeechError::WindowTooShort { attempts: 3, .. })
        ));
    }
}
