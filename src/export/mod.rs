// src/export/mod.rs
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Local};
use crossbeam::channel::{Receiver, RecvTimeoutError, Sender, bounded, unbounded};

use crate::codecs::FrameCompressor;
use crate::config::ExportConfig;
use crate::core::{ComponentLogger, LogContext, ReplayError, ReplayResult};
use crate::monitoring::Metrics;
use crate::types::CompressedFrame;

pub mod muxer;
pub mod notify;
pub mod output;

pub use muxer::{FfmpegMuxer, VideoMuxer, VideoWriter};
pub use notify::{LogNotifier, NotifySend, Notifier};
pub use output::reserve_clip_path;

#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub output_dir: PathBuf,
    pub workers: usize,
    pub notify_title: String,
    pub notify_body: String,
}

impl ExportSettings {
    pub fn from_config(cfg: &ExportConfig) -> Self {
        Self {
            output_dir: cfg.output_dir.clone(),
            workers: cfg.workers,
            notify_title: cfg.notify_title.clone(),
            notify_body: cfg.notify_body.clone(),
        }
    }
}

/// One snapshot handed from the capture thread to the workers.
pub struct ExportJob {
    pub id: u64,
    pub frames: Vec<CompressedFrame>,
    pub frame_rate: u32,
    pub requested_at: DateTime<Local>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub frames: usize,
    pub frame_rate: u32,
}

/// Result slot of one submitted job. Dropping it leaves the job running.
pub struct ExportHandle {
    id: u64,
    rx: Receiver<ReplayResult<ExportReport>>,
}

impl ExportHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn wait(self) -> ReplayResult<ExportReport> {
        self.rx.recv().unwrap_or_else(|_| Err(pipeline_gone()))
    }

    /// `None` while the job is still queued or running.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<ReplayResult<ExportReport>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(pipeline_gone())),
        }
    }
}

fn pipeline_gone() -> ReplayError {
    ReplayError::io(
        "export pipeline",
        std::io::Error::new(std::io::ErrorKind::BrokenPipe, "export pipeline is shut down"),
    )
}

enum WorkerMsg {
    Job(ExportJob, Sender<ReplayResult<ExportReport>>),
    Shutdown,
}

/// Cloneable submission side of the pipeline, owned by the capture loop.
#[derive(Clone)]
pub struct ExportQueue {
    tx: Sender<WorkerMsg>,
    next_id: Arc<AtomicU64>,
    metrics: Arc<Metrics>,
}

impl ExportQueue {
    /// Enqueues the snapshot and returns immediately.
    pub fn begin_export(&self, frames: Vec<CompressedFrame>, frame_rate: u32) -> ExportHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (result_tx, result_rx) = bounded(1);
        let job = ExportJob {
            id,
            frames,
            frame_rate,
            requested_at: Local::now(),
        };

        self.metrics.exports_requested.fetch_add(1, Ordering::Relaxed);
        log::info!(
            "[export] job {} queued: {} frames @ {} fps",
            id,
            job.frames.len(),
            frame_rate
        );

        if let Err(e) = self.tx.send(WorkerMsg::Job(job, result_tx)) {
            // workers are gone; the dropped result sender makes wait() report it
            self.metrics.exports_failed.fetch_add(1, Ordering::Relaxed);
            log::error!("[export] job {} rejected: {}", id, e);
        }

        ExportHandle { id, rx: result_rx }
    }
}

pub struct ExportPipeline {
    queue: ExportQueue,
    workers: Vec<JoinHandle<()>>,
}

impl ExportPipeline {
    pub fn start(
        settings: ExportSettings,
        compressor: Arc<dyn FrameCompressor>,
        muxer: Arc<dyn VideoMuxer>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<Metrics>,
    ) -> ReplayResult<Self> {
        if settings.workers == 0 {
            return Err(ReplayError::config("export.workers must be > 0"));
        }
        std::fs::create_dir_all(&settings.output_dir).map_err(|e| {
            ReplayError::io(format!("creating {}", settings.output_dir.display()), e)
        })?;

        let (tx, rx) = unbounded::<WorkerMsg>();
        let settings = Arc::new(settings);

        let mut workers = Vec::with_capacity(settings.workers);
        for index in 0..settings.workers {
            let worker = ExportWorker {
                index,
                settings: settings.clone(),
                compressor: compressor.clone(),
                muxer: muxer.clone(),
                notifier: notifier.clone(),
                metrics: metrics.clone(),
            };
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("export-{}", index))
                .spawn(move || worker.run(rx))
                .map_err(|e| ReplayError::io("spawning export worker", e))?;
            workers.push(handle);
        }

        log::info!(
            "[export] {} worker(s), writing to {}",
            workers.len(),
            settings.output_dir.display()
        );

        Ok(Self {
            queue: ExportQueue {
                tx,
                next_id: Arc::new(AtomicU64::new(1)),
                metrics,
            },
            workers,
        })
    }

    pub fn queue(&self) -> ExportQueue {
        self.queue.clone()
    }

    pub fn begin_export(&self, frames: Vec<CompressedFrame>, frame_rate: u32) -> ExportHandle {
        self.queue.begin_export(frames, frame_rate)
    }

    /// Lets every queued and running job finish, then joins the workers.
    /// Jobs submitted through a queue clone afterwards are rejected.
    pub fn shutdown(self) {
        // FIFO: each worker sees its Shutdown only after the jobs queued before it
        for _ in 0..self.workers.len() {
            let _ = self.queue.tx.send(WorkerMsg::Shutdown);
        }
        for handle in self.workers {
            if handle.join().is_err() {
                log::error!("[export] worker panicked");
            }
        }
        log::info!("[export] pipeline drained");
    }
}

struct ExportWorker {
    index: usize,
    settings: Arc<ExportSettings>,
    compressor: Arc<dyn FrameCompressor>,
    muxer: Arc<dyn VideoMuxer>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<Metrics>,
}

impl ComponentLogger for ExportWorker {
    fn log_context(&self) -> LogContext {
        LogContext::new("Export", &format!("worker-{}", self.index))
    }
}

impl ExportWorker {
    fn run(self, rx: Receiver<WorkerMsg>) {
        while let Ok(msg) = rx.recv() {
            match msg {
                WorkerMsg::Job(job, reply) => {
                    let result = self.process(&job);
                    // receiver may be gone (fire-and-forget)
                    let _ = reply.send(result);
                }
                WorkerMsg::Shutdown => break,
            }
        }
        self.debug("stopped");
    }

    fn process(&self, job: &ExportJob) -> ReplayResult<ExportReport> {
        let ctx = self.log_context().with_job(job.id);

        let result = self.export(job);
        match &result {
            Ok(report) => {
                self.metrics.exports_completed.fetch_add(1, Ordering::Relaxed);
                log::info!(
                    "{}",
                    ctx.format(&format!(
                        "stored {} ({} frames @ {} fps)",
                        report.path.display(),
                        report.frames,
                        report.frame_rate
                    ))
                );
                self.notifier
                    .notify(&self.settings.notify_title, &self.settings.notify_body);
            }
            Err(e) => {
                self.metrics.exports_failed.fetch_add(1, Ordering::Relaxed);
                log::error!("{}", ctx.format(&format!("export failed ({}): {}", e.kind(), e)));
            }
        }
        result
    }

    fn export(&self, job: &ExportJob) -> ReplayResult<ExportReport> {
        if job.frames.is_empty() {
            return Err(ReplayError::EmptyExport);
        }

        let path = reserve_clip_path(&self.settings.output_dir, &job.requested_at)?;

        if let Err(e) = self.encode(job, &path) {
            if let Err(rm) = std::fs::remove_file(&path) {
                self.warn(&format!("could not remove {}: {}", path.display(), rm));
            }
            return Err(e);
        }

        Ok(ExportReport {
            path,
            frames: job.frames.len(),
            frame_rate: job.frame_rate,
        })
    }

    fn encode(&self, job: &ExportJob, path: &std::path::Path) -> ReplayResult<()> {
        let mut writer = self.muxer.open(path, job.frame_rate)?;
        let mut dims: Option<(u32, u32)> = None;

        for (i, frame) in job.frames.iter().enumerate() {
            let raw = self
                .compressor
                .decompress(frame)?
                .into_rgb()
                .map_err(|e| ReplayError::codec(format!("frame {}: {}", i, e)))?;

            match dims {
                None => dims = Some((raw.width, raw.height)),
                Some((w, h)) if (w, h) != (raw.width, raw.height) => {
                    return Err(ReplayError::codec(format!(
                        "frame {} is {}x{}, clip is {}x{}",
                        i, raw.width, raw.height, w, h
                    )));
                }
                Some(_) => {}
            }

            writer.append(&raw)?;
        }

        writer.close()
    }
}
