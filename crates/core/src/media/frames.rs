//! Raw RGB frame streams backed by ffmpeg child processes.
//!
//! Both ends are spawned with `kill_on_drop`, so an early return or a
//! panic anywhere in the compositing loop still tears the processes down.

use std::io::ErrorKind;
use std::path::Path;
use std::process::{ExitStatus, Stdio};

use image::RgbImage;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::{Child, ChildStdin, ChildStdout, Command},
    task::JoinHandle,
};
use tracing::debug;

use crate::error::{NarratorError, Result};

/// Sequential supplier of decoded frames.
pub trait FrameSource {
    /// The next frame, or `None` once the stream is exhausted.
    async fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

/// Consumer of composited frames.
pub trait FrameSink {
    async fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;
}

/// How much of a child's stderr is kept for error messages.
const STDERR_TAIL: usize = 16 * 1024;

fn ensure_ffmpeg() -> Result<()> {
    which::which("ffmpeg").map_err(|_| NarratorError::ToolNotFound { tool: "ffmpeg" })?;
    Ok(())
}

/// Read `stream` to the end on a background task, keeping only its tail.
///
/// A child that fills an unread stderr pipe stops making progress on its
/// other pipes, so stderr is drained for as long as the child runs.
fn drain_stderr<R>(stream: Option<R>) -> JoinHandle<Vec<u8>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut tail = Vec::new();
        let Some(mut stream) = stream else {
            return tail;
        };
        let mut chunk = [0u8; 4096];
        loop {
            match stream.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    tail.extend_from_slice(&chunk[..n]);
                    if tail.len() > STDERR_TAIL {
                        tail.drain(..tail.len() - STDERR_TAIL);
                    }
                }
            }
        }
        tail
    })
}

/// Wait for `child` and collect what the drain task kept of its stderr.
async fn reap(child: &mut Child, stderr: JoinHandle<Vec<u8>>) -> Result<(ExitStatus, Vec<u8>)> {
    let status = child.wait().await?;
    let stderr = stderr.await.unwrap_or_default();
    Ok((status, stderr))
}

/// Decodes a video into `rgb24` frames.
pub struct FrameReader {
    child: Child,
    stdout: Option<ChildStdout>,
    stderr: JoinHandle<Vec<u8>>,
    width: u32,
    height: u32,
    exhausted: bool,
}

impl FrameReader {
    /// Frames come out in display orientation, so `width` and `height` must
    /// already account for any rotation tag.
    pub fn spawn(path: &Path, width: u32, height: u32) -> Result<Self> {
        ensure_ffmpeg()?;
        let mut command = Command::new("ffmpeg");
        command
            .arg("-v")
            .arg("error")
            .arg("-i")
            .arg(path)
            .arg("-an")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-");
        Self::from_command(command, width, height)
    }

    pub(crate) fn from_command(mut command: Command, width: u32, height: u32) -> Result<Self> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        let stdout = child.stdout.take();
        let stderr = drain_stderr(child.stderr.take());

        Ok(Self {
            child,
            stdout,
            stderr,
            width,
            height,
            exhausted: false,
        })
    }

    /// Stop decoding and reap the process.
    ///
    /// Closing before the end of the stream is normal; a decoder that ran
    /// to the end and still failed is reported.
    pub async fn close(mut self) -> Result<()> {
        drop(self.stdout.take());
        let (status, stderr) = reap(&mut self.child, self.stderr).await?;
        debug!(?status, "frame decoder closed");
        if self.exhausted && !status.success() {
            return Err(NarratorError::ffmpeg("decoding frames", &stderr));
        }
        Ok(())
    }
}

impl FrameSource for FrameReader {
    async fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };
        let mut buf = vec![0u8; self.width as usize * self.height as usize * 3];
        match stdout.read_exact(&mut buf).await {
            Ok(_) => Ok(RgbImage::from_raw(self.width, self.height, buf)),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                self.exhausted = true;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Encodes `rgb24` frames into a silent MPEG-4 video.
pub struct FrameWriter {
    child: Child,
    stdin: Option<ChildStdin>,
    stderr: JoinHandle<Vec<u8>>,
}

impl FrameWriter {
    pub fn spawn(path: &Path, width: u32, height: u32, fps: f64) -> Result<Self> {
        ensure_ffmpeg()?;
        let mut command = Command::new("ffmpeg");
        command
            .arg("-y")
            .arg("-v")
            .arg("error")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-s:v")
            .arg(format!("{width}x{height}"))
            .arg("-r")
            .arg(fps.to_string())
            .arg("-i")
            .arg("-")
            .arg("-an")
            .arg("-c:v")
            .arg("mpeg4")
            .arg("-vtag")
            .arg("mp4v")
            .arg("-q:v")
            .arg("2")
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg(path);
        Self::from_command(command)
    }

    pub(crate) fn from_command(mut command: Command) -> Result<Self> {
        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;
        let stdin = child.stdin.take();
        let stderr = drain_stderr(child.stderr.take());

        Ok(Self {
            child,
            stdin,
            stderr,
        })
    }

    /// Flush the stream and wait for the encoder to finish the file.
    pub async fn finish(mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush().await?;
        }
        let (status, stderr) = reap(&mut self.child, self.stderr).await?;
        if !status.success() {
            return Err(NarratorError::ffmpeg("encoding frames", &stderr));
        }
        Ok(())
    }
}

impl FrameSink for FrameWriter {
    async fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let stdin = self.stdin.as_mut().ok_or_else(|| NarratorError::FfmpegFailed {
            action: "encoding frames".to_string(),
            reason: "encoder input already closed".to_string(),
        })?;
        stdin.write_all(frame.as_raw()).await?;
        Ok(())
    }
}
