use crate::core::{ComponentLogger, LogContext, ReplayError, ReplayResult};
use crate::types::CompressedFrame;

/// Fixed-capacity circular store of compressed frames.
///
/// The ring is owned by the capture loop and mutated through `&mut self`
/// only; other threads see its contents exclusively through `snapshot()`,
/// which copies on the calling thread.
pub struct CaptureRing {
    slots: Vec<Option<CompressedFrame>>,
    cursor: usize,
    total_inserted: u64,
    overwritten: u64,
    bytes_held: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingStats {
    pub capacity: usize,
    pub occupied: usize,
    pub total_inserted: u64,
    pub overwritten: u64,
    pub bytes_held: usize,
}

impl CaptureRing {
    pub fn new(capacity: usize) -> ReplayResult<Self> {
        if capacity == 0 {
            return Err(ReplayError::config("capture ring capacity must be > 0"));
        }

        Ok(Self {
            slots: vec![None; capacity],
            cursor: 0,
            total_inserted: 0,
            overwritten: 0,
            bytes_held: 0,
        })
    }

    /// `target_rate * retention_seconds` slots.
    pub fn with_retention(target_rate: u32, retention_seconds: u32) -> ReplayResult<Self> {
        Self::new(target_rate as usize * retention_seconds as usize)
    }

    pub fn insert(&mut self, frame: CompressedFrame) {
        let incoming = frame.len();
        if let Some(previous) = self.slots[self.cursor].replace(frame) {
            self.bytes_held -= previous.len();
            self.overwritten += 1;
        }
        self.bytes_held += incoming;

        self.cursor = (self.cursor + 1) % self.slots.len();
        self.total_inserted += 1;

        if self.total_inserted == self.slots.len() as u64 {
            self.debug(&format!(
                "ring full after {} frames, overwriting oldest from now on",
                self.total_inserted
            ));
        }
    }

    /// Occupied slots, oldest first. The cursor always points at the oldest
    /// frame once the ring has wrapped, and at an empty slot before that.
    pub fn snapshot(&self) -> Vec<CompressedFrame> {
        let (newer, older) = self.slots.split_at(self.cursor);
        older
            .iter()
            .chain(newer.iter())
            .flatten()
            .cloned()
            .collect()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        (self.total_inserted as usize).min(self.slots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.total_inserted == 0
    }

    pub fn stats(&self) -> RingStats {
        RingStats {
            capacity: self.slots.len(),
            occupied: self.len(),
            total_inserted: self.total_inserted,
            overwritten: self.overwritten,
            bytes_held: self.bytes_held,
        }
    }
}

impl ComponentLogger for CaptureRing {
    fn log_context(&self) -> LogContext {
        LogContext::new("CaptureRing", &format!("cap={}", self.slots.len()))
    }
}
