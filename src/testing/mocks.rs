use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::capture::FrameSource;
use crate::core::{ReplayError, ReplayResult, lock_mutex};
use crate::export::{Notifier, VideoMuxer, VideoWriter};
use crate::trigger::{TriggerEvent, TriggerSource};
use crate::types::{PixelFormat, RawFrame};

// ---------- Frame sources ----------

/// Rgb8 frames whose first byte is the grab index (mod 256).
pub struct MockFrameSource {
    width: u32,
    height: u32,
    grabbed: usize,
}

impl MockFrameSource {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            grabbed: 0,
        }
    }

    pub fn grabbed(&self) -> usize {
        self.grabbed
    }
}

impl FrameSource for MockFrameSource {
    fn describe(&self) -> String {
        format!("mock:{}x{}", self.width, self.height)
    }

    fn grab(&mut self) -> ReplayResult<RawFrame> {
        let mut data = vec![0u8; self.width as usize * self.height as usize * 3];
        data[0] = (self.grabbed % 256) as u8;
        self.grabbed += 1;
        RawFrame::new(self.width, self.height, PixelFormat::Rgb8, data)
    }
}

/// Wraps another source and fails the grabs at the given indices.
pub struct FailingFrameSource<S> {
    inner: S,
    fail_on: Vec<usize>,
    calls: usize,
}

impl<S: FrameSource> FailingFrameSource<S> {
    pub fn new(inner: S, fail_on: Vec<usize>) -> Self {
        Self {
            inner,
            fail_on,
            calls: 0,
        }
    }
}

impl<S: FrameSource> FrameSource for FailingFrameSource<S> {
    fn describe(&self) -> String {
        format!("failing({})", self.inner.describe())
    }

    fn grab(&mut self) -> ReplayResult<RawFrame> {
        let call = self.calls;
        self.calls += 1;
        if self.fail_on.contains(&call) {
            return Err(ReplayError::capture(format!("scripted failure on grab {}", call)));
        }
        self.inner.grab()
    }
}

// ---------- Muxers ----------

#[derive(Debug, Clone)]
pub struct RecordedClip {
    pub path: PathBuf,
    pub frame_rate: u32,
    pub frames: Vec<RawFrame>,
}

impl RecordedClip {
    /// First byte of every frame, i.e. the `MockFrameSource` grab indices.
    pub fn markers(&self) -> Vec<u8> {
        self.frames.iter().map(|f| f.data[0]).collect()
    }
}

/// Keeps every closed clip in memory and writes a stub file at its path.
#[derive(Default)]
pub struct RecordingMuxer {
    clips: Arc<Mutex<Vec<RecordedClip>>>,
}

impl RecordingMuxer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clips(&self) -> Vec<RecordedClip> {
        lock_mutex(&self.clips, "RecordingMuxer::clips").clone()
    }
}

impl VideoMuxer for RecordingMuxer {
    fn open(&self, path: &Path, frame_rate: u32) -> ReplayResult<Box<dyn VideoWriter>> {
        Ok(Box::new(RecordingWriter {
            clip: RecordedClip {
                path: path.to_path_buf(),
                frame_rate,
                frames: Vec::new(),
            },
            sink: self.clips.clone(),
        }))
    }
}

struct RecordingWriter {
    clip: RecordedClip,
    sink: Arc<Mutex<Vec<RecordedClip>>>,
}

impl VideoWriter for RecordingWriter {
    fn append(&mut self, frame: &RawFrame) -> ReplayResult<()> {
        self.clip.frames.push(frame.clone());
        Ok(())
    }

    fn close(self: Box<Self>) -> ReplayResult<()> {
        std::fs::write(&self.clip.path, b"mock clip")
            .map_err(|e| ReplayError::io("writing mock clip", e))?;
        lock_mutex(&self.sink, "RecordingWriter::close").push(self.clip);
        Ok(())
    }
}

/// Fails with a `CodecFailure` once `fail_after` frames were appended.
pub struct FailingMuxer {
    fail_after: usize,
}

impl FailingMuxer {
    pub fn new(fail_after: usize) -> Self {
        Self { fail_after }
    }
}

impl VideoMuxer for FailingMuxer {
    fn open(&self, _path: &Path, _frame_rate: u32) -> ReplayResult<Box<dyn VideoWriter>> {
        Ok(Box::new(FailingWriter {
            remaining: self.fail_after,
        }))
    }
}

struct FailingWriter {
    remaining: usize,
}

impl VideoWriter for FailingWriter {
    fn append(&mut self, _frame: &RawFrame) -> ReplayResult<()> {
        if self.remaining == 0 {
            return Err(ReplayError::codec("scripted muxer failure"));
        }
        self.remaining -= 1;
        Ok(())
    }

    fn close(self: Box<Self>) -> ReplayResult<()> {
        Ok(())
    }
}

// ---------- Notifier ----------

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        lock_mutex(&self.messages, "RecordingNotifier::messages").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) {
        lock_mutex(&self.messages, "RecordingNotifier::notify")
            .push((title.to_string(), body.to_string()));
    }
}

// ---------- Trigger ----------

/// Fires on the listed poll indices (0-based). Every poll counts, including the
/// one that returns `None` after a step drains its events.
pub struct ScriptedTrigger {
    fire_on: Vec<usize>,
    polls: usize,
    stopped: Arc<AtomicBool>,
}

impl ScriptedTrigger {
    pub fn on_polls(fire_on: Vec<usize>) -> Self {
        Self {
            fire_on,
            polls: 0,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn never() -> Self {
        Self::on_polls(Vec::new())
    }

    pub fn stopped_flag(&self) -> Arc<AtomicBool> {
        self.stopped.clone()
    }
}

impl TriggerSource for ScriptedTrigger {
    fn poll(&mut self) -> Option<TriggerEvent> {
        let poll = self.polls;
        self.polls += 1;
        if self.stopped.load(Ordering::SeqCst) || !self.fire_on.contains(&poll) {
            return None;
        }
        Some(TriggerEvent {
            origin: "scripted",
            utc_ns: 0,
        })
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}
