use std::sync::Arc;

use crate::config::CompressionConfig;
use crate::core::ReplayResult;
use crate::types::{CompressedFrame, RawFrame};

pub mod zstd_frame;

pub use zstd_frame::ZstdCompressor;

/// Opaque per-frame codec. Shared between the capture thread and the
/// export workers, so implementations must not keep per-call state.
pub trait FrameCompressor: Send + Sync {
    fn name(&self) -> &'static str;
    fn compress(&self, frame: &RawFrame) -> ReplayResult<CompressedFrame>;
    fn decompress(&self, frame: &CompressedFrame) -> ReplayResult<RawFrame>;
}

pub fn build_compressor(cfg: &CompressionConfig) -> Arc<dyn FrameCompressor> {
    Arc::new(ZstdCompressor::new(cfg.level))
}
