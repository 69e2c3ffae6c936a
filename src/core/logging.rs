// src/core/logging.rs
use std::sync::atomic::{AtomicU64, Ordering};

use crate::core::timestamp::utc_ns_now;

// Globale Sequenznummer für Korrelation
static LOG_SEQUENCE: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone)]
pub struct LogContext {
    pub component: String,
    pub instance_id: String,
    pub job_id: Option<u64>,
    pub sequence: u64,
    pub timestamp_ns: u64,
}

impl LogContext {
    pub fn new(component: &str, instance_id: &str) -> Self {
        Self {
            component: component.to_string(),
            instance_id: instance_id.to_string(),
            job_id: None,
            sequence: LOG_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            timestamp_ns: utc_ns_now(),
        }
    }

    pub fn with_job(mut self, job_id: u64) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn format(&self, message: &str) -> String {
        let job_info = match self.job_id {
            Some(job) => format!(" job={}", job),
            None => String::new(),
        };

        format!(
            "[seq={:06}][{}:{}{}] {}",
            self.sequence, self.component, self.instance_id, job_info, message
        )
    }
}

/// Uniform, context-prefixed logging for long-lived components.
pub trait ComponentLogger {
    fn log_context(&self) -> LogContext;

    fn debug(&self, message: &str) {
        log::debug!("{}", self.log_context().format(message));
    }

    fn info(&self, message: &str) {
        log::info!("{}", self.log_context().format(message));
    }

    fn warn(&self, message: &str) {
        log::warn!("{}", self.log_context().format(message));
    }

    fn error(&self, message: &str) {
        log::error!("{}", self.log_context().format(message));
    }
}
