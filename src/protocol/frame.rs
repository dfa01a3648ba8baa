//! Message frame codec
//!
//! Pure functions that split raw bytes into a [`Header`] and body and put
//! them back together. Nothing here touches device state; every error is
//! raised before a frame reaches the registry.

use crate::error::{IgtlError, Result};
use crate::protocol::crc::calculate_crc;
use crate::protocol::header::{DeviceName, Header, Timestamp, TypeName};
use tracing::trace;

/// Largest body this crate will allocate for (256 MiB)
pub const MAX_BODY_SIZE: usize = 256 * 1024 * 1024;

/// Protocol version written into outbound headers
pub const PROTOCOL_VERSION: u16 = 2;

/// Parse and validate a header from the start of `buf`
///
/// Fails with `InvalidHeader` when fewer than 58 bytes are present or the
/// header is garbled, and with `InvalidSize` when the declared body does not
/// fit in the remaining bytes.
pub fn parse_header(buf: &[u8]) -> Result<Header> {
    let header = Header::decode(buf)?;
    header.validate()?;

    let available = buf.len() - Header::SIZE;
    let declared = body_len(&header)?;
    if declared > available {
        return Err(IgtlError::InvalidSize {
            expected: declared,
            actual: available,
        });
    }

    trace!(
        msg_type = header.type_str(),
        device_name = header.device_str(),
        body_size = header.body_size,
        "Parsed frame header"
    );
    Ok(header)
}

/// Zeroed buffer sized for the body a header declares
pub fn allocate_body(header: &Header) -> Result<Vec<u8>> {
    Ok(vec![0u8; body_len(header)?])
}

/// Concatenate a header and body into wire bytes
///
/// The header's declared body size must equal `body.len()`.
pub fn assemble_frame(header: &Header, body: &[u8]) -> Result<Vec<u8>> {
    let declared = body_len(header)?;
    if declared != body.len() {
        return Err(IgtlError::InvalidSize {
            expected: declared,
            actual: body.len(),
        });
    }
    let mut buf = Vec::with_capacity(Header::SIZE + body.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(body);
    Ok(buf)
}

fn body_len(header: &Header) -> Result<usize> {
    let size = usize::try_from(header.body_size).unwrap_or(usize::MAX);
    if size > MAX_BODY_SIZE {
        return Err(IgtlError::BodyTooLarge {
            size,
            max: MAX_BODY_SIZE,
        });
    }
    Ok(size)
}

/// One complete protocol message: header plus body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: Header,
    pub body: Vec<u8>,
}

impl Frame {
    /// Build an outbound frame, filling in size, CRC and the current time
    pub fn new(type_name: &str, device_name: &str, body: Vec<u8>) -> Result<Self> {
        Self::with_timestamp(type_name, device_name, Timestamp::now(), body)
    }

    pub fn with_timestamp(
        type_name: &str,
        device_name: &str,
        timestamp: Timestamp,
        body: Vec<u8>,
    ) -> Result<Self> {
        if body.len() > MAX_BODY_SIZE {
            return Err(IgtlError::BodyTooLarge {
                size: body.len(),
                max: MAX_BODY_SIZE,
            });
        }
        let header = Header {
            version: PROTOCOL_VERSION,
            type_name: TypeName::new(type_name)?,
            device_name: DeviceName::new(device_name)?,
            timestamp,
            body_size: body.len() as u64,
            crc: calculate_crc(&body),
        };
        Ok(Frame { header, body })
    }

    /// Parse a buffer holding exactly one frame
    ///
    /// Unlike [`parse_header`], trailing bytes after the declared body are a
    /// size mismatch.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        let header = parse_header(buf)?;
        let expected = Header::SIZE + header.body_size as usize;
        if buf.len() != expected {
            return Err(IgtlError::InvalidSize {
                expected,
                actual: buf.len(),
            });
        }
        Ok(Frame {
            body: buf[Header::SIZE..].to_vec(),
            header,
        })
    }

    /// Wire bytes of this frame
    pub fn encode(&self) -> Result<Vec<u8>> {
        assemble_frame(&self.header, &self.body)
    }

    /// Check the body against the header CRC
    pub fn verify_crc(&self) -> Result<()> {
        let actual = calculate_crc(&self.body);
        if actual != self.header.crc {
            return Err(IgtlError::CrcMismatch {
                expected: self.header.crc,
                actual,
            });
        }
        Ok(())
    }

    pub fn type_name(&self) -> &str {
        self.header.type_str()
    }

    pub fn device_name(&self) -> &str {
        self.header.device_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Frame {
        Frame::with_timestamp("STRING", "Console", Timestamp::new(10, 20), vec![1, 2, 3, 4])
            .unwrap()
    }

    #[test]
    fn test_parse_header_and_reassemble() {
        let frame = sample_frame();
        let bytes = frame.encode().unwrap();
        let header = parse_header(&bytes).unwrap();
        let rebuilt = assemble_frame(&header, &bytes[Header::SIZE..]).unwrap();
        assert_eq!(parse_header(&rebuilt).unwrap(), header);
        assert_eq!(rebuilt, bytes);
    }

    #[test]
    fn test_truncated_header_is_malformed() {
        let bytes = sample_frame().encode().unwrap();
        let result = parse_header(&bytes[..40]);
        assert!(matches!(result, Err(IgtlError::InvalidHeader(_))));
    }

    #[test]
    fn test_declared_body_exceeds_buffer() {
        let bytes = sample_frame().encode().unwrap();
        let result = parse_header(&bytes[..bytes.len() - 1]);
        assert!(matches!(
            result,
            Err(IgtlError::InvalidSize {
                expected: 4,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_frame_parse_rejects_trailing_bytes() {
        let mut bytes = sample_frame().encode().unwrap();
        bytes.push(0);
        assert!(matches!(
            Frame::parse(&bytes),
            Err(IgtlError::InvalidSize { .. })
        ));
    }

    #[test]
    fn test_assemble_size_mismatch() {
        let frame = sample_frame();
        let result = assemble_frame(&frame.header, &[1, 2]);
        assert!(matches!(result, Err(IgtlError::InvalidSize { .. })));
    }

    #[test]
    fn test_allocate_body() {
        let frame = sample_frame();
        assert_eq!(allocate_body(&frame.header).unwrap().len(), 4);

        let mut huge = frame.header.clone();
        huge.body_size = u64::MAX;
        assert!(matches!(
            allocate_body(&huge),
            Err(IgtlError::BodyTooLarge { .. })
        ));
    }

    #[test]
    fn test_crc_detects_corruption() {
        let mut frame = sample_frame();
        assert!(frame.verify_crc().is_ok());
        frame.body[0] ^= 0xFF;
        assert!(matches!(
            frame.verify_crc(),
            Err(IgtlError::CrcMismatch { .. })
        ));
    }
}
