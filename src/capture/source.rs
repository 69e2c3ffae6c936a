use crate::core::{ReplayError, ReplayResult};
use crate::types::{PixelFormat, RawFrame};

/// Produces one raw frame of the configured display per call. Not `Send`:
/// some platform grabbers are bound to the thread that opened them.
pub trait FrameSource {
    fn describe(&self) -> String;
    fn grab(&mut self) -> ReplayResult<RawFrame>;
}

/// Moving gradient in BGRA, for headless runs and tests.
pub struct TestPatternSource {
    width: u32,
    height: u32,
    phase: u32,
}

impl TestPatternSource {
    pub fn new(width: u32, height: u32) -> ReplayResult<Self> {
        if width == 0 || height == 0 {
            return Err(ReplayError::source(format!(
                "test pattern needs a non-empty size, got {}x{}",
                width, height
            )));
        }
        Ok(Self {
            width,
            height,
            phase: 0,
        })
    }
}

impl FrameSource for TestPatternSource {
    fn describe(&self) -> String {
        format!("test_pattern:{}x{}", self.width, self.height)
    }

    fn grab(&mut self) -> ReplayResult<RawFrame> {
        let mut data = Vec::with_capacity(self.width as usize * self.height as usize * 4);
        for y in 0..self.height {
            for x in 0..self.width {
                let b = ((x + self.phase) % 256) as u8;
                let g = ((y + self.phase / 2) % 256) as u8;
                let r = (self.phase % 256) as u8;
                data.extend_from_slice(&[b, g, r, 255]);
            }
        }
        self.phase = self.phase.wrapping_add(1);

        RawFrame::new(self.width, self.height, PixelFormat::Bgra8, data)
    }
}

#[cfg(feature = "screen")]
pub use screen::ScreenSource;

#[cfg(feature = "screen")]
mod screen {
    use xcap::Monitor;

    use super::FrameSource;
    use crate::core::{ReplayError, ReplayResult};
    use crate::types::{PixelFormat, RawFrame};

    /// Full bounds of one display, grabbed through xcap.
    pub struct ScreenSource {
        monitor: Monitor,
        display_index: usize,
    }

    impl ScreenSource {
        pub fn open(display_index: usize) -> ReplayResult<Self> {
            let monitors = Monitor::all()
                .map_err(|e| ReplayError::source(format!("could not list monitors: {}", e)))?;
            let count = monitors.len();

            let monitor = monitors.into_iter().nth(display_index).ok_or_else(|| {
                ReplayError::source(format!(
                    "display {} not found ({} available)",
                    display_index, count
                ))
            })?;

            log::info!(
                "[capture] display {} is {} ({}x{})",
                display_index,
                monitor.name(),
                monitor.width(),
                monitor.height()
            );

            Ok(Self {
                monitor,
                display_index,
            })
        }
    }

    impl FrameSource for ScreenSource {
        fn describe(&self) -> String {
            format!("screen:{}", self.display_index)
        }

        fn grab(&mut self) -> ReplayResult<RawFrame> {
            let image = self
                .monitor
                .capture_image()
                .map_err(|e| ReplayError::capture(format!("screen grab: {}", e)))?;
            let (width, height) = (image.width(), image.height());
            RawFrame::new(width, height, PixelFormat::Rgba8, image.into_raw())
        }
    }
}
