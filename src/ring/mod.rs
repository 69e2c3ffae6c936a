// src/ring/mod.rs
pub mod capture_ring;

pub use capture_ring::CaptureRing;
pub use capture_ring::RingStats;
