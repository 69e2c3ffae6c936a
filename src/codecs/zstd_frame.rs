use std::io::{Cursor, Read};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::codecs::FrameCompressor;
use crate::core::{ReplayError, ReplayResult};
use crate::types::{CompressedFrame, PixelFormat, RawFrame};

const MAGIC: &[u8; 4] = b"RCF1";
// magic(4) + width(u32) + height(u32) + format(u8)
const HEADER_LEN: usize = 4 + 4 + 4 + 1;
// 16K x 16K BGRA; larger headers are corrupt
const MAX_FRAME_BYTES: usize = 16_384 * 16_384 * 4;

pub struct ZstdCompressor {
    level: i32,
}

impl ZstdCompressor {
    pub fn new(level: i32) -> Self {
        Self { level }
    }

    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::new(1)
    }
}

impl FrameCompressor for ZstdCompressor {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress(&self, frame: &RawFrame) -> ReplayResult<CompressedFrame> {
        frame.validate()?;

        let payload = ::zstd::bulk::compress(&frame.data, self.level)
            .map_err(|e| ReplayError::capture(format!("zstd compress: {}", e)))?;

        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        write_header(&mut out, frame)
            .map_err(|e| ReplayError::capture(format!("frame header: {}", e)))?;
        out.extend_from_slice(&payload);

        Ok(CompressedFrame::new(out))
    }

    fn decompress(&self, frame: &CompressedFrame) -> ReplayResult<RawFrame> {
        let bytes = frame.as_bytes();
        if bytes.len() < HEADER_LEN {
            return Err(ReplayError::codec(format!(
                "payload too short ({} bytes)",
                bytes.len()
            )));
        }

        let mut cur = Cursor::new(bytes);
        let mut magic = [0u8; 4];
        cur.read_exact(&mut magic)
            .map_err(|e| ReplayError::codec(format!("frame header: {}", e)))?;
        if &magic != MAGIC {
            return Err(ReplayError::codec("bad frame magic"));
        }

        let (width, height, format_byte) = read_dims(&mut cur)
            .map_err(|e| ReplayError::codec(format!("frame header: {}", e)))?;
        let format = PixelFormat::from_byte(format_byte)
            .ok_or_else(|| ReplayError::codec(format!("unknown pixel format {}", format_byte)))?;

        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(format.bytes_per_pixel()))
            .filter(|&n| n <= MAX_FRAME_BYTES)
            .ok_or_else(|| {
                ReplayError::codec(format!("implausible frame size {}x{}", width, height))
            })?;
        let data = ::zstd::bulk::decompress(&bytes[HEADER_LEN..], expected)
            .map_err(|e| ReplayError::codec(format!("zstd decompress: {}", e)))?;

        RawFrame::new(width, height, format, data)
            .map_err(|e| ReplayError::codec(format!("decoded frame invalid: {}", e)))
    }
}

fn write_header(out: &mut Vec<u8>, frame: &RawFrame) -> std::io::Result<()> {
    out.extend_from_slice(MAGIC);
    out.write_u32::<BigEndian>(frame.width)?;
    out.write_u32::<BigEndian>(frame.height)?;
    out.write_u8(frame.format.to_byte())
}

fn read_dims(cur: &mut Cursor<&[u8]>) -> std::io::Result<(u32, u32, u8)> {
    let width = cur.read_u32::<BigEndian>()?;
    let height = cur.read_u32::<BigEndian>()?;
    let format = cur.read_u8()?;
    Ok((width, height, format))
}
