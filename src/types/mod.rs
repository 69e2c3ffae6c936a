use std::fmt;
use std::sync::Arc;

use crate::core::{ReplayError, ReplayResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Blue, green, red, alpha. What most screen grabbers hand out.
    Bgra8,
    Rgba8,
    /// Canonical layout stored in the ring and fed to the muxer.
    Rgb8,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => 4,
            PixelFormat::Rgb8 => 3,
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            PixelFormat::Bgra8 => 1,
            PixelFormat::Rgba8 => 2,
            PixelFormat::Rgb8 => 3,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(PixelFormat::Bgra8),
            2 => Some(PixelFormat::Rgba8),
            3 => Some(PixelFormat::Rgb8),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    pub data: Vec<u8>,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> ReplayResult<Self> {
        let frame = Self {
            width,
            height,
            format,
            data,
        };
        frame.validate()?;
        Ok(frame)
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }

    pub fn validate(&self) -> ReplayResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(ReplayError::capture(format!(
                "degenerate frame {}x{}",
                self.width, self.height
            )));
        }
        if self.data.len() != self.expected_len() {
            return Err(ReplayError::capture(format!(
                "{:?} frame {}x{} carries {} bytes (want {})",
                self.format,
                self.width,
                self.height,
                self.data.len(),
                self.expected_len()
            )));
        }
        Ok(())
    }

    /// Converts into packed RGB: alpha dropped, channels in R,G,B order.
    pub fn into_rgb(self) -> ReplayResult<RawFrame> {
        self.validate()?;

        let data = match self.format {
            PixelFormat::Rgb8 => return Ok(self),
            PixelFormat::Bgra8 => {
                let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
                for px in self.data.chunks_exact(4) {
                    rgb.extend_from_slice(&[px[2], px[1], px[0]]);
                }
                rgb
            }
            PixelFormat::Rgba8 => {
                let mut rgb = Vec::with_capacity(self.width as usize * self.height as usize * 3);
                for px in self.data.chunks_exact(4) {
                    rgb.extend_from_slice(&px[..3]);
                }
                rgb
            }
        };

        Ok(RawFrame {
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgb8,
            data,
        })
    }
}

/// One compressed image. Immutable; clones share the same bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct CompressedFrame(Arc<[u8]>);

impl CompressedFrame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(Arc::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for CompressedFrame {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl fmt::Debug for CompressedFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompressedFrame({} bytes)", self.0.len())
    }
}
