// src/export/muxer.rs
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::core::{ReplayError, ReplayResult};
use crate::types::{PixelFormat, RawFrame};

/// Opens one video file for a clip.
pub trait VideoMuxer: Send + Sync {
    fn open(&self, path: &Path, frame_rate: u32) -> ReplayResult<Box<dyn VideoWriter>>;
}

/// Accepts decoded RGB frames in presentation order.
pub trait VideoWriter: Send {
    fn append(&mut self, frame: &RawFrame) -> ReplayResult<()>;
    fn close(self: Box<Self>) -> ReplayResult<()>;
}

/// Pipes raw RGB into an external ffmpeg producing H.264 in MP4.
pub struct FfmpegMuxer {
    ffmpeg_bin: String,
}

impl FfmpegMuxer {
    pub fn new(ffmpeg_bin: impl Into<String>) -> Self {
        Self {
            ffmpeg_bin: ffmpeg_bin.into(),
        }
    }
}

impl VideoMuxer for FfmpegMuxer {
    fn open(&self, path: &Path, frame_rate: u32) -> ReplayResult<Box<dyn VideoWriter>> {
        if frame_rate == 0 {
            return Err(ReplayError::codec("frame rate must be > 0"));
        }
        Ok(Box::new(FfmpegWriter {
            ffmpeg_bin: self.ffmpeg_bin.clone(),
            path: path.to_path_buf(),
            frame_rate,
            dims: None,
            child: None,
            stdin: None,
        }))
    }
}

pub fn ffmpeg_args(width: u32, height: u32, frame_rate: u32) -> Vec<String> {
    [
        "-y",
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pix_fmt",
        "rgb24",
        "-s",
        &format!("{}x{}", width, height),
        "-r",
        &frame_rate.to_string(),
        "-i",
        "-",
        // yuv420p needs even dimensions
        "-vf",
        "scale=trunc(iw/2)*2:trunc(ih/2)*2",
        "-c:v",
        "libx264",
        "-pix_fmt",
        "yuv420p",
        "-movflags",
        "+faststart",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

struct FfmpegWriter {
    ffmpeg_bin: String,
    path: PathBuf,
    frame_rate: u32,
    dims: Option<(u32, u32)>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
}

impl FfmpegWriter {
    // Spawned lazily: the frame size is only known once the first frame arrives.
    fn spawn(&mut self, width: u32, height: u32) -> ReplayResult<()> {
        let mut child = Command::new(&self.ffmpeg_bin)
            .args(ffmpeg_args(width, height, self.frame_rate))
            .arg(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ReplayError::io(format!("spawning {}", self.ffmpeg_bin), e))?;

        log::debug!(
            "[export] {} {}x{} @ {} fps → {}",
            self.ffmpeg_bin,
            width,
            height,
            self.frame_rate,
            self.path.display()
        );

        self.stdin = child.stdin.take();
        self.child = Some(child);
        self.dims = Some((width, height));
        Ok(())
    }
}

impl VideoWriter for FfmpegWriter {
    fn append(&mut self, frame: &RawFrame) -> ReplayResult<()> {
        if frame.format != PixelFormat::Rgb8 {
            return Err(ReplayError::codec(format!(
                "muxer expects Rgb8, got {:?}",
                frame.format
            )));
        }

        match self.dims {
            None => self.spawn(frame.width, frame.height)?,
            Some((w, h)) if (w, h) != (frame.width, frame.height) => {
                return Err(ReplayError::codec(format!(
                    "frame size changed mid-clip: {}x{} → {}x{}",
                    w, h, frame.width, frame.height
                )));
            }
            Some(_) => {}
        }

        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ReplayError::codec("ffmpeg stdin unavailable"))?;
        stdin
            .write_all(&frame.data)
            .map_err(|e| ReplayError::io("writing frame to ffmpeg", e))
    }

    fn close(mut self: Box<Self>) -> ReplayResult<()> {
        // EOF for ffmpeg
        drop(self.stdin.take());

        let Some(mut child) = self.child.take() else {
            return Err(ReplayError::codec("no frames were written"));
        };

        let status = child
            .wait()
            .map_err(|e| ReplayError::io("waiting for ffmpeg", e))?;

        if !status.success() {
            let mut stderr = String::new();
            if let Some(mut err) = child.stderr.take() {
                let _ = err.read_to_string(&mut stderr);
            }
            return Err(ReplayError::codec(format!(
                "ffmpeg exited with {}: {}",
                status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            // abandoned mid-clip
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_describe_raw_rgb_input() {
        let args = ffmpeg_args(1920, 1080, 60);
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgb24 -s 1920x1080 -r 60 -i -"));
        assert!(joined.contains("-c:v libx264"));
        assert_eq!(args[0], "-y");
    }

    #[test]
    fn test_zero_rate_rejected() {
        let muxer = FfmpegMuxer::new("ffmpeg");
        assert!(muxer.open(Path::new("/tmp/never.mp4"), 0).is_err());
    }

    #[test]
    fn test_close_without_frames_fails() {
        let muxer = FfmpegMuxer::new("ffmpeg");
        let writer = muxer.open(Path::new("/tmp/never.mp4"), 30).unwrap();
        assert_eq!(writer.close().unwrap_err().kind(), "codec_failure");
    }

    #[test]
    fn test_missing_binary_is_io_failure() {
        let muxer = FfmpegMuxer::new("/nonexistent/ffmpeg-binary");
        let mut writer = muxer.open(Path::new("/tmp/never.mp4"), 30).unwrap();
        let frame = RawFrame::new(2, 2, PixelFormat::Rgb8, vec![0; 12]).unwrap();
        assert_eq!(writer.append(&frame).unwrap_err().kind(), "io_failure");
    }

    #[test]
    fn test_rejects_non_rgb_frames() {
        let muxer = FfmpegMuxer::new("ffmpeg");
        let mut writer = muxer.open(Path::new("/tmp/never.mp4"), 30).unwrap();
        let frame = RawFrame::new(1, 1, PixelFormat::Bgra8, vec![0; 4]).unwrap();
        assert_eq!(writer.append(&frame).unwrap_err().kind(), "codec_failure");
    }
}
