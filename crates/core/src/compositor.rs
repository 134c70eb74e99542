//! Frame compositing: background, video slab, and burned-in subtitles.

use std::path::Path;

use image::{
    RgbImage,
    imageops::{self, FilterType},
};
use tracing::{debug, info};

use crate::{
    error::Result,
    geometry::Layout,
    media::{FrameReader, FrameSink, FrameSource, FrameWriter, VideoInfo},
    subtitles::{Cue, CueLookup},
    text::{CaptionPainter, TextPainter},
};

/// How many frames a compositing pass produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositeSummary {
    pub frames_written: u64,
    pub frames_expected: u64,
}

/// Builds output frames for one run.
pub struct Compositor<'a> {
    layout: Layout,
    /// Background already scaled to the canvas.
    background: RgbImage,
    cues: &'a [Cue],
    painter: Option<&'a mut dyn CaptionPainter>,
}

impl<'a> Compositor<'a> {
    pub fn new(
        layout: Layout,
        background: &RgbImage,
        cues: &'a [Cue],
        painter: Option<&'a mut dyn CaptionPainter>,
    ) -> Self {
        let dest = layout.background;
        let background =
            imageops::resize(background, dest.width, dest.height, FilterType::Triangle);
        Self {
            layout,
            background,
            cues,
            painter,
        }
    }

    /// Compose one output frame from an input frame and the active subtitle.
    pub fn compose(&mut self, input: &RgbImage, subtitle: Option<&str>) -> RgbImage {
        let Layout {
            background: bg_rect,
            slab_source,
            slab_dest,
            caret,
        } = self.layout;

        let mut canvas = RgbImage::new(bg_rect.width, bg_rect.height);
        imageops::replace(
            &mut canvas,
            &self.background,
            i64::from(bg_rect.x),
            i64::from(bg_rect.y),
        );

        if !slab_source.is_empty() && !slab_dest.is_empty() {
            let crop = imageops::crop_imm(
                input,
                slab_source.x,
                slab_source.y,
                slab_source.width,
                slab_source.height,
            )
            .to_image();
            let slab =
                imageops::resize(&crop, slab_dest.width, slab_dest.height, FilterType::Triangle);
            imageops::replace(
                &mut canvas,
                &slab,
                i64::from(slab_dest.x),
                i64::from(slab_dest.y),
            );
        }

        if let (Some(text), Some(painter)) = (subtitle, self.painter.as_mut()) {
            painter.draw(&mut canvas, caret.0, caret.1, text);
        }

        canvas
    }

    /// Composite up to `frame_count` frames from `source` into `sink`.
    ///
    /// Stops early, without padding, when the source runs dry.
    pub async fn run<S, K>(
        &mut self,
        source: &mut S,
        sink: &mut K,
        frame_count: u64,
        fps: f64,
    ) -> Result<CompositeSummary>
    where
        S: FrameSource,
        K: FrameSink,
    {
        let mut lookup = CueLookup::new(self.cues);
        let mut frames_written = 0;

        for index in 0..frame_count {
            let Some(frame) = source.next_frame().await? else {
                debug!(index, frame_count, "input ended before reported frame count");
                break;
            };
            let t = index as f64 / fps;
            let canvas = self.compose(&frame, lookup.at(t));
            sink.write_frame(&canvas).await?;
            frames_written += 1;
        }

        Ok(CompositeSummary {
            frames_written,
            frames_expected: frame_count,
        })
    }
}

/// Composite `input` into a silent video at `output`.
pub async fn composite_video(
    input: &Path,
    output: &Path,
    info: &VideoInfo,
    layout: Layout,
    background: &RgbImage,
    cues: &[Cue],
    painter: &mut TextPainter,
) -> Result<CompositeSummary> {
    info!(
        input = %input.display(),
        frames = info.frame_count,
        fps = info.fps,
        "compositing frames"
    );

    let canvas = layout.background;
    let mut reader = FrameReader::spawn(input, info.width, info.height)?;
    let mut writer = FrameWriter::spawn(output, canvas.width, canvas.height, info.fps)?;

    let painter: &mut dyn CaptionPainter = painter;
    let mut compositor = Compositor::new(layout, background, cues, Some(painter));
    // Both processes are killed on drop if this fails.
    let summary = compositor
        .run(&mut reader, &mut writer, info.frame_count, info.fps)
        .await?;

    reader.close().await?;
    writer.finish().await?;

    info!(frames = summary.frames_written, "compositing done");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use image::Rgb;

    use super::*;
    use crate::geometry::{LayoutInput, Rect};

    struct FakeSource {
        frames: VecDeque<RgbImage>,
        reads: usize,
    }

    impl FakeSource {
        fn solid(count: usize, color: [u8; 3]) -> Self {
            Self {
                frames: (0..count)
                    .map(|_| RgbImage::from_pixel(8, 8, Rgb(color)))
                    .collect(),
                reads: 0,
            }
        }
    }

    impl FrameSource for FakeSource {
        async fn next_frame(&mut self) -> Result<Option<RgbImage>> {
            self.reads += 1;
            Ok(self.frames.pop_front())
        }
    }

    #[derive(Default)]
    struct FakeSink {
        frames: Vec<RgbImage>,
    }

    impl FrameSink for FakeSink {
        async fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
            self.frames.push(frame.clone());
            Ok(())
        }
    }

    fn layout() -> Layout {
        Layout::resolve(LayoutInput {
            input_width: 8,
            input_height: 8,
            output_width: 16,
            output_height: 8,
            bg_offset_x: 1,
            bg_offset_y: 1,
        })
    }

    fn background() -> RgbImage {
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 200]))
    }

    #[test]
    fn slab_covers_left_region_and_background_the_rest() {
        let layout = layout();
        assert_eq!(layout.slab_dest, Rect::new(0, 0, 4, 8));

        let mut compositor = Compositor::new(layout, &background(), &[], None);
        let frame = RgbImage::from_pixel(8, 8, Rgb([255, 0, 0]));
        let canvas = compositor.compose(&frame, None);

        assert_eq!(canvas.dimensions(), (16, 8));
        assert_eq!(canvas.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(canvas.get_pixel(3, 7), &Rgb([255, 0, 0]));
        assert_eq!(canvas.get_pixel(4, 0), &Rgb([0, 0, 200]));
        assert_eq!(canvas.get_pixel(15, 7), &Rgb([0, 0, 200]));
    }

    #[tokio::test]
    async fn stops_on_early_exhaustion_without_padding() {
        let mut compositor = Compositor::new(layout(), &background(), &[], None);
        let mut source = FakeSource::solid(3, [255, 0, 0]);
        let mut sink = FakeSink::default();

        let summary = compositor.run(&mut source, &mut sink, 10, 30.0).await.unwrap();

        assert_eq!(summary.frames_written, 3);
        assert_eq!(summary.frames_expected, 10);
        assert_eq!(sink.frames.len(), 3);
        assert_eq!(source.reads, 4);
    }

    /// Marks the caret pixel with a shade per subtitle and logs each call.
    #[derive(Default)]
    struct MarkingPainter {
        calls: Vec<(u32, u32, String)>,
    }

    impl CaptionPainter for MarkingPainter {
        fn draw(&mut self, frame: &mut RgbImage, x: u32, y: u32, text: &str) {
            let shade = text.bytes().next().unwrap_or(0);
            frame.put_pixel(x, y, Rgb([shade, shade, shade]));
            self.calls.push((x, y, text.to_string()));
        }
    }

    #[tokio::test]
    async fn each_frame_burns_in_the_cue_active_at_its_time() {
        let cues = vec![Cue::new(0.0, "A"), Cue::new(0.1, "B")];
        let mut painter = MarkingPainter::default();
        let mut source = FakeSource::solid(5, [255, 0, 0]);
        let mut sink = FakeSink::default();

        let mut compositor = Compositor::new(layout(), &background(), &cues, Some(&mut painter));
        compositor.run(&mut source, &mut sink, 5, 30.0).await.unwrap();

        let caret = layout().caret;
        assert_eq!(caret, (5, 1));
        let texts: Vec<&str> = painter.calls.iter().map(|(_, _, t)| t.as_str()).collect();
        assert_eq!(texts, ["A", "A", "A", "B", "B"]);
        assert!(painter.calls.iter().all(|&(x, y, _)| (x, y) == caret));
        assert_eq!(sink.frames[2].get_pixel(5, 1), &Rgb([b'A', b'A', b'A']));
        assert_eq!(sink.frames[3].get_pixel(5, 1), &Rgb([b'B', b'B', b'B']));
    }

    #[tokio::test]
    async fn frames_before_the_first_cue_carry_no_text() {
        let cues = vec![Cue::new(0.05, "late")];
        let mut painter = MarkingPainter::default();
        let mut source = FakeSource::solid(3, [255, 0, 0]);
        let mut sink = FakeSink::default();

        let mut compositor = Compositor::new(layout(), &background(), &cues, Some(&mut painter));
        compositor.run(&mut source, &mut sink, 3, 30.0).await.unwrap();

        assert_eq!(painter.calls.len(), 1);
        assert_eq!(sink.frames[0].get_pixel(5, 1), &Rgb([0, 0, 200]));
        assert_eq!(sink.frames[2].get_pixel(5, 1), &Rgb([b'l', b'l', b'l']));
    }

    #[tokio::test]
    async fn never_writes_more_than_reported_count() {
        let mut compositor = Compositor::new(layout(), &background(), &[], None);
        let mut source = FakeSource::solid(20, [0, 255, 0]);
        let mut sink = FakeSink::default();

        let summary = compositor.run(&mut source, &mut sink, 5, 30.0).await.unwrap();

        assert_eq!(summary.frames_written, 5);
        assert_eq!(sink.frames.len(), 5);
        assert_eq!(source.reads, 5);
    }
}
