//! VIDEO message type
//!
//! Carries one compressed video frame. The body is a 72-byte sub-header
//! followed by the codec payload:
//!
//! | Field          | Type          |
//! |----------------|---------------|
//! | VERSION        | uint16        |
//! | ENDIAN         | uint8         |
//! | CODEC          | `char[4]`     |
//! | FRAME_TYPE     | uint16        |
//! | COORD          | uint8         |
//! | NUM_COMPONENTS | uint8         |
//! | RESERVED       | uint8         |
//! | WIDTH          | uint32        |
//! | HEIGHT         | uint32        |
//! | DEPTH          | uint32        |
//! | MATRIX         | `float32[12]` |
//!
//! FRAME_TYPE is 1 for a key frame and 2 for a delta frame.

use super::image::{CoordinateSystem, Endian};
use super::{get_matrix, put_matrix, IDENTITY_3X4};
use crate::error::{IgtlError, Result};
use crate::protocol::message::Message;
use bytes::{Buf, BufMut};
use std::fmt;

/// Size of the VIDEO sub-header in bytes
pub const VIDEO_HEADER_SIZE: usize = 72;

/// Four-character codec identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    pub const fn new(code: &[u8; 4]) -> Self {
        FourCC(*code)
    }

    /// Parse from a string of exactly four ASCII bytes
    pub fn parse(code: &str) -> Result<Self> {
        let bytes: [u8; 4] = code
            .as_bytes()
            .try_into()
            .map_err(|_| IgtlError::UnknownCodec(format!("{:?} is not a FourCC", code)))?;
        Ok(FourCC(bytes))
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// Whether a frame can be decoded on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Key = 1,
    Delta = 2,
}

impl FrameKind {
    pub fn from_u16(value: u16) -> Result<Self> {
        match value {
            1 => Ok(FrameKind::Key),
            2 => Ok(FrameKind::Delta),
            other => Err(IgtlError::DecodeFailed(format!(
                "Unknown frame type {}",
                other
            ))),
        }
    }
}

/// One compressed frame as carried on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMessage {
    pub version: u16,
    pub endian: Endian,
    pub codec: FourCC,
    pub frame_kind: FrameKind,
    pub coordinate: CoordinateSystem,
    pub num_components: u8,
    /// Original image dimensions [width, height, depth]
    pub size: [u32; 3],
    pub matrix: [[f32; 4]; 3],
    pub payload: Vec<u8>,
}

impl VideoMessage {
    pub fn new(
        codec: FourCC,
        frame_kind: FrameKind,
        num_components: u8,
        size: [u32; 3],
        payload: Vec<u8>,
    ) -> Self {
        VideoMessage {
            version: 1,
            endian: Endian::Big,
            codec,
            frame_kind,
            coordinate: CoordinateSystem::RAS,
            num_components,
            size,
            matrix: IDENTITY_3X4,
            payload,
        }
    }

    pub fn is_key_frame(&self) -> bool {
        self.frame_kind == FrameKind::Key
    }
}

impl Message for VideoMessage {
    fn message_type() -> &'static str {
        "VIDEO"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(VIDEO_HEADER_SIZE + self.payload.len());
        buf.put_u16(self.version);
        buf.put_u8(self.endian as u8);
        buf.put_slice(&self.codec.0);
        buf.put_u16(self.frame_kind as u16);
        buf.put_u8(self.coordinate as u8);
        buf.put_u8(self.num_components);
        buf.put_u8(0);
        for &s in &self.size {
            buf.put_u32(s);
        }
        put_matrix(&mut buf, &self.matrix);
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }

    fn decode_content(mut data: &[u8]) -> Result<Self> {
        if data.len() < VIDEO_HEADER_SIZE {
            return Err(IgtlError::InvalidSize {
                expected: VIDEO_HEADER_SIZE,
                actual: data.len(),
            });
        }
        let version = data.get_u16();
        let endian = Endian::from_u8(data.get_u8())?;
        let mut codec = [0u8; 4];
        data.copy_to_slice(&mut codec);
        let frame_kind = FrameKind::from_u16(data.get_u16())?;
        let coordinate = CoordinateSystem::from_u8(data.get_u8())?;
        let num_components = data.get_u8();
        let _reserved = data.get_u8();
        let size = [data.get_u32(), data.get_u32(), data.get_u32()];
        let matrix = get_matrix(&mut data);

        Ok(VideoMessage {
            version,
            endian,
            codec: FourCC(codec),
            frame_kind,
            coordinate,
            num_components,
            size,
            matrix,
            payload: data.to_vec(),
        })
    }
}
