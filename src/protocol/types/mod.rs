//! OpenIGTLink body types handled by the device registry

pub mod command;
pub mod image;
pub mod status;
pub mod string;
pub mod transform;
pub mod video;

pub use command::CommandMessage;
pub use image::{CoordinateSystem, Endian, ImageMessage, ImageScalarType};
pub use status::StatusMessage;
pub use string::StringMessage;
pub use transform::TransformMessage;
pub use video::{FourCC, FrameKind, VideoMessage, VIDEO_HEADER_SIZE};

use bytes::{Buf, BufMut};

/// Upper 3x4 of an identity 4x4 matrix
pub const IDENTITY_3X4: [[f32; 4]; 3] = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
];

/// Write a 3x4 orientation/origin matrix, row by row
pub(crate) fn put_matrix(buf: &mut Vec<u8>, matrix: &[[f32; 4]; 3]) {
    for row in matrix {
        for &v in row {
            buf.put_f32(v);
        }
    }
}

pub(crate) fn get_matrix(data: &mut &[u8]) -> [[f32; 4]; 3] {
    let mut matrix = [[0.0f32; 4]; 3];
    for row in &mut matrix {
        for v in row {
            *v = data.get_f32();
        }
    }
    matrix
}

/// Write `s` into a NUL-padded field of `width` bytes, truncating if needed
pub(crate) fn put_fixed_str(buf: &mut Vec<u8>, s: &str, width: usize) {
    let mut field = vec![0u8; width];
    let n = s.len().min(width);
    field[..n].copy_from_slice(&s.as_bytes()[..n]);
    buf.extend_from_slice(&field);
}

pub(crate) fn get_fixed_str(data: &mut &[u8], width: usize) -> String {
    let field = &data[..width];
    let len = field.iter().position(|&b| b == 0).unwrap_or(width);
    let s = String::from_utf8_lossy(&field[..len]).into_owned();
    data.advance(width);
    s
}
