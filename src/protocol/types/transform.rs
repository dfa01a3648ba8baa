//! TRANSFORM message type
//!
//! A rigid/affine transform sent as the upper 3x4 of a 4x4 matrix, twelve
//! big-endian f32 values in column-major order:
//! R11 R21 R31 R12 R22 R32 R13 R23 R33 TX TY TZ.

use crate::error::{IgtlError, Result};
use crate::protocol::message::Message;
use bytes::{Buf, BufMut};

const TRANSFORM_SIZE: usize = 48;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformMessage {
    /// Full 4x4 matrix; the last row is always `[0, 0, 0, 1]` on decode
    pub matrix: [[f32; 4]; 4],
}

impl TransformMessage {
    pub fn identity() -> Self {
        TransformMessage {
            matrix: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        let mut t = Self::identity();
        t.matrix[0][3] = x;
        t.matrix[1][3] = y;
        t.matrix[2][3] = z;
        t
    }
}

impl Default for TransformMessage {
    fn default() -> Self {
        Self::identity()
    }
}

impl Message for TransformMessage {
    fn message_type() -> &'static str {
        "TRANSFORM"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(TRANSFORM_SIZE);
        for col in 0..4 {
            for row in &self.matrix[..3] {
                buf.put_f32(row[col]);
            }
        }
        Ok(buf)
    }

    fn decode_content(mut data: &[u8]) -> Result<Self> {
        if data.len() != TRANSFORM_SIZE {
            return Err(IgtlError::InvalidSize {
                expected: TRANSFORM_SIZE,
                actual: data.len(),
            });
        }
        let mut t = Self::identity();
        for col in 0..4 {
            for row in &mut t.matrix[..3] {
                row[col] = data.get_f32();
            }
        }
        Ok(t)
    }
}
