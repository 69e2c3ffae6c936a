// src/capture/mod.rs
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::codecs::FrameCompressor;
use crate::core::{ComponentLogger, LogContext, ReplayError, ReplayResult};
use crate::export::{ExportHandle, ExportQueue};
use crate::monitoring::Metrics;
use crate::ring::CaptureRing;
use crate::trigger::{TriggerEvent, TriggerSource};

pub mod rate;
pub mod source;

pub use rate::{BoundaryPolicy, RateAction, RateController};
pub use source::{FrameSource, TestPatternSource};

const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopping,
    Stopped,
}

/// What one iteration did. `exports` holds one handle per trigger event
/// drained in this iteration.
pub struct StepOutcome {
    pub action: RateAction,
    pub captured: bool,
    pub exports: Vec<ExportHandle>,
}

/// Drives grab → compress → insert at the target rate and hands snapshots
/// to the export queue when the trigger fires. Runs on the thread that
/// created the frame source.
pub struct CaptureLoop {
    source: Box<dyn FrameSource>,
    compressor: Arc<dyn FrameCompressor>,
    ring: CaptureRing,
    rate: RateController,
    trigger: Box<dyn TriggerSource>,
    exports: ExportQueue,
    running: Arc<AtomicBool>,
    metrics: Arc<Metrics>,
    state: LoopState,
    wait_pause: Duration,
    last_stats: Instant,
}

impl ComponentLogger for CaptureLoop {
    fn log_context(&self) -> LogContext {
        LogContext::new("CaptureLoop", &self.source.describe())
    }
}

impl CaptureLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: Box<dyn FrameSource>,
        compressor: Arc<dyn FrameCompressor>,
        ring: CaptureRing,
        rate: RateController,
        trigger: Box<dyn TriggerSource>,
        exports: ExportQueue,
        running: Arc<AtomicBool>,
        metrics: Arc<Metrics>,
    ) -> Self {
        metrics
            .buffer_capacity
            .store(ring.capacity() as u64, Ordering::Relaxed);

        Self {
            source,
            compressor,
            ring,
            rate,
            trigger,
            exports,
            running,
            metrics,
            state: LoopState::Running,
            wait_pause: Duration::from_millis(1),
            last_stats: Instant::now(),
        }
    }

    pub fn with_wait_pause(mut self, pause: Duration) -> Self {
        self.wait_pause = pause;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn ring(&self) -> &CaptureRing {
        &self.ring
    }

    pub fn rate(&self) -> &RateController {
        &self.rate
    }

    /// Runs iterations until the shared flag clears, then stops the trigger.
    /// In-flight exports are left to the pipeline.
    pub fn run(&mut self) -> LoopState {
        self.metrics.running.store(true, Ordering::Relaxed);
        self.info(&format!(
            "capturing at {} fps into {} slots",
            self.rate.target_rate(),
            self.ring.capacity()
        ));

        while self.state == LoopState::Running {
            self.step();
            if !self.running.load(Ordering::SeqCst) {
                self.state = LoopState::Stopping;
            }
        }

        self.trigger.stop();
        self.metrics.running.store(false, Ordering::Relaxed);
        self.state = LoopState::Stopped;

        let stats = self.ring.stats();
        self.info(&format!(
            "stopped: {} frames captured, {} held",
            stats.total_inserted, stats.occupied
        ));
        self.state
    }

    pub fn step(&mut self) -> StepOutcome {
        let action = self.rate.tick();

        let captured = match action {
            RateAction::Wait => {
                thread::sleep(self.wait_pause);
                false
            }
            RateAction::Capture => match self.capture_one() {
                Ok(()) => {
                    self.rate.record_capture();
                    true
                }
                Err(e) => {
                    self.metrics.capture_failures.fetch_add(1, Ordering::Relaxed);
                    self.warn(&format!("frame skipped: {}", e));
                    false
                }
            },
        };

        let mut exports = Vec::new();
        while let Some(event) = self.trigger.poll() {
            exports.push(self.export_now(event));
        }

        if self.last_stats.elapsed() >= STATS_INTERVAL {
            self.last_stats = Instant::now();
            self.report_stats();
        }

        StepOutcome {
            action,
            captured,
            exports,
        }
    }

    fn capture_one(&mut self) -> ReplayResult<()> {
        let frame = self
            .source
            .grab()
            .and_then(|raw| raw.into_rgb())
            .and_then(|rgb| self.compressor.compress(&rgb))
            .map_err(as_capture_failure)?;

        self.ring.insert(frame);

        let stats = self.ring.stats();
        self.metrics.frames_captured.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .buffer_frames
            .store(stats.occupied as u64, Ordering::Relaxed);
        self.metrics
            .buffer_bytes
            .store(stats.bytes_held as u64, Ordering::Relaxed);
        self.metrics
            .frames_overwritten
            .store(stats.overwritten, Ordering::Relaxed);
        Ok(())
    }

    fn export_now(&mut self, event: TriggerEvent) -> ExportHandle {
        self.metrics.triggers_received.fetch_add(1, Ordering::Relaxed);

        let snapshot = self.ring.snapshot();
        let frame_rate = self.playback_rate();
        self.info(&format!(
            "trigger from {}: exporting {} frames @ {} fps",
            event.origin,
            snapshot.len(),
            frame_rate
        ));

        self.exports.begin_export(snapshot, frame_rate)
    }

    /// Measured average, or the target while no second has completed yet.
    pub fn playback_rate(&self) -> u32 {
        match self.rate.realized_average_rate() {
            Ok(0) | Err(ReplayError::InsufficientData { .. }) => self.rate.target_rate(),
            Ok(rate) => rate,
            Err(e) => {
                self.warn(&format!("rate unavailable ({}), using target", e));
                self.rate.target_rate()
            }
        }
    }

    fn report_stats(&self) {
        let ring = self.ring.stats();
        let rate = self.rate.stats();
        if let Ok(realized) = self.rate.realized_average_rate() {
            self.metrics
                .realized_rate
                .store(realized as u64, Ordering::Relaxed);
        }
        self.debug(&format!(
            "ring {}/{} ({} KiB), {} s measured, {} frames this second",
            ring.occupied,
            ring.capacity,
            ring.bytes_held / 1024,
            rate.completed_seconds,
            rate.frames_this_second
        ));
    }
}

fn as_capture_failure(e: ReplayError) -> ReplayError {
    match e {
        ReplayError::CaptureFailure { .. } => e,
        other => ReplayError::capture(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::ZstdCompressor;
    use crate::export::{ExportPipeline, ExportSettings};
    use crate::testing::mocks::{
        FailingFrameSource, MockFrameSource, RecordingMuxer, RecordingNotifier, ScriptedTrigger,
    };

    fn pipeline(
        dir: &std::path::Path,
        muxer: Arc<RecordingMuxer>,
        metrics: Arc<Metrics>,
    ) -> ExportPipeline {
        ExportPipeline::start(
            ExportSettings {
                output_dir: dir.to_path_buf(),
                workers: 1,
                notify_title: "replaycap".into(),
                notify_body: "Clip stored".into(),
            },
            Arc::new(ZstdCompressor::default()),
            muxer,
            Arc::new(RecordingNotifier::new()),
            metrics,
        )
        .unwrap()
    }

    fn build(
        source: Box<dyn FrameSource>,
        trigger: ScriptedTrigger,
        exports: ExportQueue,
        metrics: Arc<Metrics>,
        target: u32,
    ) -> CaptureLoop {
        CaptureLoop::new(
            source,
            Arc::new(ZstdCompressor::default()),
            CaptureRing::new(4).unwrap(),
            RateController::new(target, BoundaryPolicy::FixedStep),
            Box::new(trigger),
            exports,
            Arc::new(AtomicBool::new(true)),
            metrics,
        )
        .with_wait_pause(Duration::ZERO)
    }

    #[test]
    fn test_failing_frames_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = Arc::new(Metrics::new());
        let exports = pipeline(dir.path(), Arc::new(RecordingMuxer::new()), metrics.clone());

        let source = FailingFrameSource::new(MockFrameSource::new(4, 2), vec![1]);
        let mut lp = build(
            Box::new(source),
            ScriptedTrigger::never(),
            exports.queue(),
            metrics.clone(),
            1000,
        );

        let outcomes: Vec<bool> = (0..3).map(|_| lp.step().captured).collect();
        assert_eq!(outcomes, vec![true, false, true]);
        assert_eq!(lp.ring().len(), 2);
        assert_eq!(metrics.capture_failures.load(Ordering::Relaxed), 1);
        assert_eq!(lp.state(), LoopState::Running);
        exports.shutdown();
    }

    #[test]
    fn test_early_trigger_exports_at_target_rate() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = Arc::new(Metrics::new());
        let muxer = Arc::new(RecordingMuxer::new());
        let exports = pipeline(dir.path(), muxer.clone(), metrics.clone());

        let mut lp = build(
            Box::new(MockFrameSource::new(4, 2)),
            ScriptedTrigger::on_polls(vec![2]),
            exports.queue(),
            metrics.clone(),
            1000,
        );

        assert!(lp.step().exports.is_empty());
        assert!(lp.step().exports.is_empty());
        let mut handles = lp.step().exports;
        assert_eq!(handles.len(), 1);
        let report = handles.remove(0).wait().unwrap();

        assert_eq!(report.frames, 3);
        assert_eq!(report.frame_rate, 1000);
        assert_eq!(muxer.clips()[0].markers(), vec![0, 1, 2]);
        assert_eq!(metrics.triggers_received.load(Ordering::Relaxed), 1);
        exports.shutdown();
    }

    #[test]
    fn test_skipped_frames_do_not_inflate_playback_rate() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = Arc::new(Metrics::new());
        let exports = pipeline(dir.path(), Arc::new(RecordingMuxer::new()), metrics.clone());

        // 5 capture slots in the first second, 2 grabs succeed
        let source = FailingFrameSource::new(MockFrameSource::new(2, 2), vec![1, 3, 4]);
        let mut lp = build(
            Box::new(source),
            ScriptedTrigger::never(),
            exports.queue(),
            metrics.clone(),
            5,
        );
        for _ in 0..5 {
            assert_eq!(lp.step().action, RateAction::Capture);
        }
        assert_eq!(lp.rate().stats().frames_this_second, 2);

        thread::sleep(Duration::from_millis(1050));
        assert!(lp.step().captured);

        assert_eq!(lp.rate().stats().completed_seconds, 1);
        assert_eq!(lp.rate().realized_average_rate().unwrap(), 2);
        assert_eq!(lp.playback_rate(), 2);
        exports.shutdown();
    }

    #[test]
    fn test_all_failed_grabs_fall_back_to_target_rate() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = Arc::new(Metrics::new());
        let exports = pipeline(dir.path(), Arc::new(RecordingMuxer::new()), metrics.clone());

        let source = FailingFrameSource::new(MockFrameSource::new(2, 2), (0..6).collect());
        let mut lp = build(
            Box::new(source),
            ScriptedTrigger::never(),
            exports.queue(),
            metrics.clone(),
            5,
        );
        for _ in 0..5 {
            assert!(!lp.step().captured);
        }
        thread::sleep(Duration::from_millis(1050));
        lp.step();

        assert_eq!(lp.ring().len(), 0);
        assert_eq!(lp.rate().realized_average_rate().unwrap(), 0);
        assert_eq!(lp.playback_rate(), 5);
        exports.shutdown();
    }

    #[test]
    fn test_run_stops_trigger_when_flag_clears() {
        let dir = tempfile::tempdir().unwrap();
        let metrics = Arc::new(Metrics::new());
        let exports = pipeline(dir.path(), Arc::new(RecordingMuxer::new()), metrics.clone());

        let trigger = ScriptedTrigger::never();
        let stopped = trigger.stopped_flag();
        let mut lp = build(
            Box::new(MockFrameSource::new(2, 2)),
            trigger,
            exports.queue(),
            metrics.clone(),
            30,
        );
        lp.running.store(false, Ordering::SeqCst);

        assert_eq!(lp.run(), LoopState::Stopped);
        assert!(stopped.load(Ordering::SeqCst));
        assert!(!metrics.running.load(Ordering::Relaxed));
        exports.shutdown();
    }
}
