// src/export/notify.rs
use std::process::{Command, Stdio};
use std::thread;

/// Tells the user a clip was stored. Implementations must not block the
/// export worker for long and never fail the export.
pub trait Notifier: Send + Sync {
    fn notify(&self, title: &str, body: &str);
}

/// Desktop notification through the `notify-send` binary.
pub struct NotifySend {
    program: String,
}

impl NotifySend {
    pub fn new() -> Self {
        Self {
            program: "notify-send".to_string(),
        }
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for NotifySend {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for NotifySend {
    fn notify(&self, title: &str, body: &str) {
        let spawned = Command::new(&self.program)
            .arg(title)
            .arg(body)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();

        match spawned {
            Ok(mut child) => {
                // reap in the background
                thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            Err(e) => log::warn!("[notify] {} failed: {}", self.program, e),
        }
    }
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        log::info!("[notify] {}: {}", title, body);
    }
}
