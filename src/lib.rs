// src/lib.rs
pub mod capture;
pub mod codecs;
pub mod config;
pub mod core;
pub mod export;
pub mod monitoring;
pub mod ring;
pub mod testing;
pub mod trigger;
pub mod types;

// Re-export der wichtigsten Typen
pub use capture::{CaptureLoop, LoopState, StepOutcome};
pub use crate::core::{ComponentLogger, LogContext, ReplayError, ReplayResult};
pub use crate::core::timestamp::utc_ns_now;
pub use export::{ExportHandle, ExportPipeline, ExportReport};
pub use ring::CaptureRing;
pub use types::{CompressedFrame, PixelFormat, RawFrame};
