//! In-memory PCM audio: the narration bed and the speech clips laid over it.

use std::io::{Read, Seek};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

/// Interleaved PCM samples normalised to `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    pub fn silent(seconds: f64, sample_rate: u32, channels: u16) -> Self {
        let frames = (seconds * f64::from(sample_rate)).round() as usize;
        Self::new(vec![0.0; frames * usize::from(channels)], sample_rate, channels)
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / usize::from(self.channels)
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    pub fn open_wav(path: &Path) -> Result<Self, hound::Error> {
        Self::read_wav(WavReader::open(path)?)
    }

    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self, hound::Error> {
        Self::read_wav(WavReader::new(std::io::Cursor::new(bytes))?)
    }

    fn read_wav<R: Read + Seek>(reader: WavReader<R>) -> Result<Self, hound::Error> {
        let spec = reader.spec();
        let samples = match spec.sample_format {
            SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<Vec<_>, _>>()?,
            SampleFormat::Int => {
                let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|s| s as f32 / scale))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };
        Ok(Self::new(samples, spec.sample_rate, spec.channels))
    }

    /// Write as 16-bit PCM.
    pub fn write_wav(&self, path: &Path) -> Result<(), hound::Error> {
        let spec = WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec)?;
        for &sample in &self.samples {
            writer.write_sample(to_i16(sample))?;
        }
        writer.finalize()
    }

    pub fn apply_gain_db(&mut self, db: f64) {
        let factor = 10f64.powf(db / 20.0) as f32;
        for sample in &mut self.samples {
            *sample = (*sample * factor).clamp(-1.0, 1.0);
        }
    }

    /// Mix `clip` into this buffer starting `offset_ms` milliseconds in.
    ///
    /// The clip is converted to this buffer's channel layout and sample
    /// rate first. Samples are summed and saturate at full scale; whatever
    /// runs past the end of this buffer is dropped.
    pub fn overlay(&mut self, clip: &AudioBuffer, offset_ms: u64) {
        let clip = clip.converted(self.sample_rate, self.channels);
        let channels = usize::from(self.channels);
        let start_frame = (offset_ms as u128 * u128::from(self.sample_rate) / 1000) as usize;
        let start = start_frame.saturating_mul(channels);
        if start >= self.samples.len() {
            return;
        }

        for (dst, src) in self.samples[start..].iter_mut().zip(&clip.samples) {
            *dst = (*dst + src).clamp(-1.0, 1.0);
        }
    }

    /// Copy with the given sample rate and channel count.
    pub fn converted(&self, sample_rate: u32, channels: u16) -> AudioBuffer {
        self.remixed(channels).resampled(sample_rate)
    }

    fn remixed(&self, channels: u16) -> AudioBuffer {
        if channels == self.channels || self.channels == 0 {
            return self.clone();
        }
        let src = usize::from(self.channels);
        let dst = usize::from(channels);
        let mut samples = Vec::with_capacity(self.frames() * dst);
        for frame in self.samples.chunks_exact(src) {
            if src == 1 {
                samples.extend(std::iter::repeat_n(frame[0], dst));
            } else if dst == 1 {
                samples.push(frame.iter().sum::<f32>() / src as f32);
            } else {
                samples.extend((0..dst).map(|c| frame[c.min(src - 1)]));
            }
        }
        AudioBuffer::new(samples, self.sample_rate, channels)
    }

    /// Linear-interpolation resampling.
    fn resampled(&self, sample_rate: u32) -> AudioBuffer {
        if sample_rate == self.sample_rate || self.sample_rate == 0 || self.frames() == 0 {
            return AudioBuffer::new(self.samples.clone(), sample_rate, self.channels);
        }
        let channels = usize::from(self.channels);
        let src_frames = self.frames();
        let ratio = f64::from(self.sample_rate) / f64::from(sample_rate);
        let dst_frames = (src_frames as f64 / ratio).round() as usize;

        let mut samples = Vec::with_capacity(dst_frames * channels);
        for i in 0..dst_frames {
            let pos = i as f64 * ratio;
            let left = (pos.floor() as usize).min(src_frames - 1);
            let right = (left + 1).min(src_frames - 1);
            let frac = (pos - left as f64) as f32;
            for c in 0..channels {
                let a = self.samples[left * channels + c];
                let b = self.samples[right * channels + c];
                samples.push(a + (b - a) * frac);
            }
        }
        AudioBuffer::new(samples, sample_rate, self.channels)
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)).round() as i16
}
