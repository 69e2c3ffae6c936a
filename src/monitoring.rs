use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

use tiny_http::{Header, Method, Response, Server, StatusCode};

use crate::trigger::TriggerSender;

/// Counters shared by the capture loop, the export workers and the HTTP
/// endpoint.
#[derive(Default)]
pub struct Metrics {
    pub running: AtomicBool,
    pub frames_captured: AtomicU64,
    pub capture_failures: AtomicU64,
    pub frames_overwritten: AtomicU64,
    pub buffer_frames: AtomicU64,
    pub buffer_capacity: AtomicU64,
    pub buffer_bytes: AtomicU64,
    pub realized_rate: AtomicU64,
    pub triggers_received: AtomicU64,
    pub exports_requested: AtomicU64,
    pub exports_completed: AtomicU64,
    pub exports_failed: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn render_metrics(m: &Metrics) -> String {
    let mut output = String::new();

    let counters: [(&str, &str, &AtomicU64); 6] = [
        (
            "replaycap_frames_captured_total",
            "Frames stored in the capture ring.",
            &m.frames_captured,
        ),
        (
            "replaycap_capture_failures_total",
            "Frames skipped because grab or compression failed.",
            &m.capture_failures,
        ),
        (
            "replaycap_frames_overwritten_total",
            "Frames dropped from the ring by newer ones.",
            &m.frames_overwritten,
        ),
        ("replaycap_exports_requested_total", "Export jobs submitted.", &m.exports_requested),
        ("replaycap_exports_completed_total", "Clips written successfully.", &m.exports_completed),
        ("replaycap_exports_failed_total", "Export jobs that failed.", &m.exports_failed),
    ];
    for (name, help, value) in counters {
        let _ = writeln!(output, "# HELP {} {}", name, help);
        let _ = writeln!(output, "# TYPE {} counter", name);
        let _ = writeln!(output, "{} {}", name, value.load(Ordering::Relaxed));
    }

    let gauges: [(&str, &str, &AtomicU64); 4] = [
        ("replaycap_buffer_frames", "Frames currently held in the ring.", &m.buffer_frames),
        ("replaycap_buffer_capacity_frames", "Ring capacity in frames.", &m.buffer_capacity),
        ("replaycap_buffer_bytes", "Compressed bytes held in the ring.", &m.buffer_bytes),
        ("replaycap_realized_rate", "Measured captures per second.", &m.realized_rate),
    ];
    for (name, help, value) in gauges {
        let _ = writeln!(output, "# HELP {} {}", name, help);
        let _ = writeln!(output, "# TYPE {} gauge", name);
        let _ = writeln!(output, "{} {}", name, value.load(Ordering::Relaxed));
    }

    output
}

pub fn status_json(m: &Metrics) -> serde_json::Value {
    let load = |v: &AtomicU64| v.load(Ordering::Relaxed);
    serde_json::json!({
        "running": m.running.load(Ordering::Relaxed),
        "buffer": {
            "frames": load(&m.buffer_frames),
            "capacity": load(&m.buffer_capacity),
            "bytes": load(&m.buffer_bytes),
        },
        "capture": {
            "frames": load(&m.frames_captured),
            "failures": load(&m.capture_failures),
            "realized_rate": load(&m.realized_rate),
        },
        "exports": {
            "triggers": load(&m.triggers_received),
            "requested": load(&m.exports_requested),
            "completed": load(&m.exports_completed),
            "failed": load(&m.exports_failed),
        },
    })
}

pub fn start_monitoring_server(
    bind: &str,
    metrics: Arc<Metrics>,
    trigger: TriggerSender,
) -> anyhow::Result<thread::JoinHandle<()>> {
    let server = Server::http(bind).map_err(|e| anyhow::anyhow!(e))?;
    log::info!("[monitoring] server on {}", bind);

    let handle = thread::spawn(move || {
        for req in server.incoming_requests() {
            let response = route(req.method(), req.url(), &metrics, &trigger);
            if let Err(e) = req.respond(response) {
                log::debug!("[monitoring] respond failed: {}", e);
            }
        }
    });

    Ok(handle)
}

fn route(
    method: &Method,
    url: &str,
    metrics: &Metrics,
    trigger: &TriggerSender,
) -> Response<std::io::Cursor<Vec<u8>>> {
    match (method, url) {
        (&Method::Get, "/health") => {
            let running = metrics.running.load(Ordering::Relaxed);
            let (status, body) = if running {
                (200, "ok")
            } else {
                (503, "not_running")
            };
            text_response(status, body.to_string(), "text/plain")
        }
        (&Method::Get, "/metrics") => text_response(
            200,
            render_metrics(metrics),
            "text/plain; version=0.0.4",
        ),
        (&Method::Get, "/status") => text_response(
            200,
            status_json(metrics).to_string(),
            "application/json",
        ),
        (&Method::Post, "/trigger") => {
            let accepted = trigger.fire("http");
            let body = if accepted { "queued" } else { "stopped" };
            text_response(202, body.to_string(), "text/plain")
        }
        _ => text_response(404, "not found".to_string(), "text/plain"),
    }
}

fn text_response(
    status: u16,
    body: String,
    content_type: &str,
) -> Response<std::io::Cursor<Vec<u8>>> {
    let mut response = Response::from_string(body).with_status_code(StatusCode(status));
    if let Ok(header) = Header::from_bytes("Content-Type", content_type) {
        response = response.with_header(header);
    }
    response
}
