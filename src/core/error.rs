use thiserror::Error;

pub type ReplayResult<T> = Result<T, ReplayError>;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("capture failed: {reason}")]
    CaptureFailure { reason: String },
    #[error("not enough rate data yet ({completed_seconds} completed seconds)")]
    InsufficientData { completed_seconds: u64 },
    #[error("codec failure: {reason}")]
    CodecFailure { reason: String },
    #[error("export requested with an empty buffer")]
    EmptyExport,
    #[error("{context}: {source}")]
    IoFailure {
        context: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {message}")]
    Config { message: String },
    #[error("source unavailable: {message}")]
    Source { message: String },
}

impl ReplayError {
    pub fn capture(reason: impl Into<String>) -> Self {
        Self::CaptureFailure {
            reason: reason.into(),
        }
    }

    pub fn codec(reason: impl Into<String>) -> Self {
        Self::CodecFailure {
            reason: reason.into(),
        }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::IoFailure {
            context: context.into(),
            source,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn source(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    /// Short label used for metrics and log tags.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CaptureFailure { .. } => "capture_failure",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::CodecFailure { .. } => "codec_failure",
            Self::EmptyExport => "empty_export",
            Self::IoFailure { .. } => "io_failure",
            Self::Config { .. } => "config",
            Self::Source { .. } => "source",
        }
    }
}
