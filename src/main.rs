// src/main.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, bail};
use log::{error, info, warn};

use replaycap::capture::{CaptureLoop, FrameSource, RateController, TestPatternSource};
use replaycap::codecs::build_compressor;
use replaycap::config::{self, Config, SourceKind, TriggerKind};
use replaycap::export::{
    ExportPipeline, ExportSettings, FfmpegMuxer, LogNotifier, Notifier, NotifySend,
};
use replaycap::monitoring::{self, Metrics};
use replaycap::ring::CaptureRing;
use replaycap::trigger::{self, TriggerSender};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // ------------------------------------------------------------
    // Config
    // ------------------------------------------------------------
    let explicit = std::env::args().nth(1);
    let required = explicit.is_some();
    let cfg_path = PathBuf::from(explicit.unwrap_or_else(|| "config.toml".into()));

    let cfg: Config = config::load(&cfg_path, required)?;
    info!("[replaycap] config {}", cfg_path.display());

    // ------------------------------------------------------------
    // Graceful shutdown
    // ------------------------------------------------------------
    let running = Arc::new(AtomicBool::new(true));
    {
        let r = running.clone();
        ctrlc::set_handler(move || {
            info!("[replaycap] shutdown requested");
            r.store(false, Ordering::SeqCst);
        })?;
    }

    let metrics = Arc::new(Metrics::new());

    // ------------------------------------------------------------
    // Source / codec / ring
    // ------------------------------------------------------------
    let source = open_source(&cfg)?;
    info!("[replaycap] source {}", source.describe());

    let compressor = build_compressor(&cfg.compression);
    let ring = CaptureRing::new(cfg.capture.capacity())?;
    let rate = RateController::new(cfg.capture.target_rate, cfg.capture.boundary);

    // ------------------------------------------------------------
    // Export pipeline
    // ------------------------------------------------------------
    let notifier: Arc<dyn Notifier> = if cfg.export.notify {
        Arc::new(NotifySend::new())
    } else {
        Arc::new(LogNotifier)
    };
    let exports = ExportPipeline::start(
        ExportSettings::from_config(&cfg.export),
        compressor.clone(),
        Arc::new(FfmpegMuxer::new(cfg.export.ffmpeg_bin.clone())),
        notifier,
        metrics.clone(),
    )
    .context("starting export pipeline")?;

    // ------------------------------------------------------------
    // Trigger / Monitoring
    // ------------------------------------------------------------
    let (sender, trigger_source) = trigger::trigger_channel();
    start_trigger(&cfg, sender.clone())?;
    start_monitoring(&cfg, metrics.clone(), sender)?;

    // ------------------------------------------------------------
    // Capture loop (main thread)
    // ------------------------------------------------------------
    info!(
        "[replaycap] keeping the last {} s at {} fps – Ctrl+C to stop",
        cfg.capture.retention_seconds, cfg.capture.target_rate
    );

    let mut capture = CaptureLoop::new(
        source,
        compressor,
        ring,
        rate,
        Box::new(trigger_source),
        exports.queue(),
        running,
        metrics,
    )
    .with_wait_pause(Duration::from_millis(cfg.capture.wait_pause_ms));

    let state = capture.run();
    drop(capture);

    // ------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------
    info!("[replaycap] capture {:?}, finishing pending exports…", state);
    exports.shutdown();
    info!("[replaycap] shutdown complete");

    Ok(())
}

//
// ============================================================
// START_* HELPERS
// ============================================================
//

fn open_source(cfg: &Config) -> anyhow::Result<Box<dyn FrameSource>> {
    let c = &cfg.capture;
    match c.source {
        SourceKind::TestPattern => Ok(Box::new(TestPatternSource::new(
            c.test_pattern_width,
            c.test_pattern_height,
        )?)),
        SourceKind::Screen => open_screen(c.display_index),
    }
}

#[cfg(feature = "screen")]
fn open_screen(display_index: usize) -> anyhow::Result<Box<dyn FrameSource>> {
    let source = replaycap::capture::source::ScreenSource::open(display_index)
        .with_context(|| format!("opening display {}", display_index))?;
    Ok(Box::new(source))
}

#[cfg(not(feature = "screen"))]
fn open_screen(_display_index: usize) -> anyhow::Result<Box<dyn FrameSource>> {
    bail!(
        "screen capture needs the `screen` feature; \
         set capture.source = \"test_pattern\" or rebuild with --features screen"
    )
}

fn start_trigger(cfg: &Config, sender: TriggerSender) -> anyhow::Result<()> {
    match cfg.trigger.kind {
        TriggerKind::Keyboard => start_keyboard(&cfg.trigger.key, sender),
        TriggerKind::Stdin => {
            // detached: blocks in read_line until EOF
            let _ = trigger::stdin::spawn_stdin_listener(cfg.trigger.key.clone(), sender);
            Ok(())
        }
        TriggerKind::None => {
            warn!("[replaycap] no local trigger configured");
            Ok(())
        }
    }
}

#[cfg(feature = "hotkey")]
fn start_keyboard(key: &str, sender: TriggerSender) -> anyhow::Result<()> {
    let _ = trigger::keyboard::spawn_keyboard_listener(key, sender)?;
    info!("[replaycap] press {} to store a clip", key);
    Ok(())
}

#[cfg(not(feature = "hotkey"))]
fn start_keyboard(_key: &str, _sender: TriggerSender) -> anyhow::Result<()> {
    bail!(
        "keyboard trigger needs the `hotkey` feature; \
         set trigger.kind = \"stdin\" or rebuild with --features hotkey"
    )
}

fn start_monitoring(
    cfg: &Config,
    metrics: Arc<Metrics>,
    sender: TriggerSender,
) -> anyhow::Result<()> {
    if !cfg.monitoring.enabled {
        return Ok(());
    }

    match monitoring::start_monitoring_server(&cfg.monitoring.bind, metrics, sender) {
        Ok(_) => {
            info!("[replaycap] monitoring on {}", cfg.monitoring.bind);
            Ok(())
        }
        Err(e) => {
            error!("[monitoring] error: {}", e);
            Err(e).with_context(|| format!("binding {}", cfg.monitoring.bind))
        }
    }
}
