//! IMAGE message type
//!
//! Uncompressed 2-D/3-D pixel data. The body is a 60-byte image header
//! followed by the raw voxels:
//!
//! | Field          | Type          |
//! |----------------|---------------|
//! | VERSION        | uint16        |
//! | NUM_COMPONENTS | uint8         |
//! | SCALAR_TYPE    | uint8         |
//! | ENDIAN         | uint8         |
//! | COORD          | uint8         |
//! | SIZE           | `uint16[3]`   |
//! | MATRIX         | `float32[12]` |
//!
//! # Example
//!
//! ```
//! use openigtlink_devices::protocol::types::{ImageMessage, ImageScalarType};
//!
//! let image = ImageMessage::new(ImageScalarType::Uint8, 3, [4, 2, 1], vec![0; 24])?;
//! assert_eq!(image.num_pixels(), 8);
//! # Ok::<(), openigtlink_devices::IgtlError>(())
//! ```

use super::{get_matrix, put_matrix, IDENTITY_3X4};
use crate::error::{IgtlError, Result};
use crate::protocol::message::Message;
use bytes::{Buf, BufMut};

const IMAGE_HEADER_SIZE: usize = 60;

/// Voxel scalar type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageScalarType {
    Int8 = 2,
    Uint8 = 3,
    Int16 = 4,
    Uint16 = 5,
    Int32 = 6,
    Uint32 = 7,
    Float32 = 10,
    Float64 = 11,
}

impl ImageScalarType {
    /// Size of one scalar in bytes
    pub fn size(&self) -> usize {
        match self {
            Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    pub fn from_u8(value: u8) -> Result<Self> {
        Ok(match value {
            2 => Self::Int8,
            3 => Self::Uint8,
            4 => Self::Int16,
            5 => Self::Uint16,
            6 => Self::Int32,
            7 => Self::Uint32,
            10 => Self::Float32,
            11 => Self::Float64,
            other => {
                return Err(IgtlError::DecodeFailed(format!(
                    "Unknown scalar type {}",
                    other
                )))
            }
        })
    }
}

/// Byte order of multi-byte voxels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big = 1,
    Little = 2,
}

impl Endian {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(Endian::Big),
            2 => Ok(Endian::Little),
            other => Err(IgtlError::DecodeFailed(format!("Unknown endian {}", other))),
        }
    }
}

/// Patient coordinate convention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSystem {
    RAS = 1,
    LPS = 2,
}

impl CoordinateSystem {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            1 => Ok(CoordinateSystem::RAS),
            2 => Ok(CoordinateSystem::LPS),
            other => Err(IgtlError::DecodeFailed(format!(
                "Unknown coordinate system {}",
                other
            ))),
        }
    }
}

/// Uncompressed image content
#[derive(Debug, Clone, PartialEq)]
pub struct ImageMessage {
    pub version: u16,
    /// 1 = scalar, 3 = RGB, 4 = RGBA
    pub num_components: u8,
    pub scalar_type: ImageScalarType,
    pub endian: Endian,
    pub coordinate: CoordinateSystem,
    /// [columns, rows, slices]
    pub size: [u16; 3],
    /// Upper 3x4 of the image-to-patient transform
    pub matrix: [[f32; 4]; 3],
    pub data: Vec<u8>,
}

impl ImageMessage {
    /// Create an image, checking that `data` matches the dimensions
    pub fn new(
        scalar_type: ImageScalarType,
        num_components: u8,
        size: [u16; 3],
        data: Vec<u8>,
    ) -> Result<Self> {
        let expected = expected_len(scalar_type, num_components, size);
        if data.len() != expected {
            return Err(IgtlError::InvalidSize {
                expected,
                actual: data.len(),
            });
        }
        Ok(ImageMessage {
            version: 1,
            num_components,
            scalar_type,
            endian: Endian::Big,
            coordinate: CoordinateSystem::RAS,
            size,
            matrix: IDENTITY_3X4,
            data,
        })
    }

    pub fn with_matrix(mut self, matrix: [[f32; 4]; 3]) -> Self {
        self.matrix = matrix;
        self
    }

    pub fn with_coordinate(mut self, coordinate: CoordinateSystem) -> Self {
        self.coordinate = coordinate;
        self
    }

    pub fn num_pixels(&self) -> usize {
        self.size.iter().map(|&s| s as usize).product()
    }

    /// Dimensions widened to u32, as carried by compressed frames
    pub fn dimensions(&self) -> [u32; 3] {
        [self.size[0] as u32, self.size[1] as u32, self.size[2] as u32]
    }
}

fn expected_len(scalar_type: ImageScalarType, num_components: u8, size: [u16; 3]) -> usize {
    size.iter().map(|&s| s as usize).product::<usize>()
        * num_components as usize
        * scalar_type.size()
}

impl Message for ImageMessage {
    fn message_type() -> &'static str {
        "IMAGE"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(IMAGE_HEADER_SIZE + self.data.len());
        buf.put_u16(self.version);
        buf.put_u8(self.num_components);
        buf.put_u8(self.scalar_type as u8);
        buf.put_u8(self.endian as u8);
        buf.put_u8(self.coordinate as u8);
        for &s in &self.size {
            buf.put_u16(s);
        }
        put_matrix(&mut buf, &self.matrix);
        buf.extend_from_slice(&self.data);
        Ok(buf)
    }

    fn decode_content(mut data: &[u8]) -> Result<Self> {
        if data.len() < IMAGE_HEADER_SIZE {
            return Err(IgtlError::InvalidSize {
                expected: IMAGE_HEADER_SIZE,
                actual: data.len(),
            });
        }

        let version = data.get_u16();
        let num_components = data.get_u8();
        let scalar_type = ImageScalarType::from_u8(data.get_u8())?;
        let endian = Endian::from_u8(data.get_u8())?;
        let coordinate = CoordinateSystem::from_u8(data.get_u8())?;
        let size = [data.get_u16(), data.get_u16(), data.get_u16()];
        let matrix = get_matrix(&mut data);

        let expected = expected_len(scalar_type, num_components, size);
        if data.len() != expected {
            return Err(IgtlError::InvalidSize {
                expected,
                actual: data.len(),
            });
        }

        Ok(ImageMessage {
            version,
            num_components,
            scalar_type,
            endian,
            coordinate,
            size,
            matrix,
            data: data.to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_length() {
        assert!(ImageMessage::new(ImageScalarType::Uint8, 1, [4, 4, 1], vec![0; 16]).is_ok());
        let err = ImageMessage::new(ImageScalarType::Uint16, 1, [4, 4, 1], vec![0; 16]);
        assert!(matches!(
            err,
            Err(IgtlError::InvalidSize {
                expected: 32,
                actual: 16
            })
        ));
    }

    #[test]
    fn test_body_layout() {
        let image = ImageMessage::new(ImageScalarType::Uint8, 3, [2, 1, 1], vec![1, 2, 3, 4, 5, 6])
            .unwrap()
            .with_coordinate(CoordinateSystem::LPS);
        let body = image.encode_content().unwrap();
        assert_eq!(body.len(), 66);
        assert_eq!(body[2], 3);
        assert_eq!(body[3], ImageScalarType::Uint8 as u8);
        assert_eq!(body[5], CoordinateSystem::LPS as u8);
        assert_eq!(&body[6..8], &[0, 2]);
        assert_eq!(&body[60..], &[1, 2, 3, 4, 5, 6]);

        let decoded = ImageMessage::decode_content(&body).unwrap();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_decode_rejects_pixel_mismatch() {
        let image = ImageMessage::new(ImageScalarType::Uint8, 1, [2, 2, 1], vec![9; 4]).unwrap();
        let mut body = image.encode_content().unwrap();
        body.pop();
        assert!(ImageMessage::decode_content(&body).is_err());
    }

    #[test]
    fn test_unknown_scalar_type() {
        assert!(ImageScalarType::from_u8(42).is_err());
        assert_eq!(ImageScalarType::from_u8(11).unwrap(), ImageScalarType::Float64);
    }
}
