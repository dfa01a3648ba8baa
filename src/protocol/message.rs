//! Typed message bodies
//!
//! Every body type (IMAGE, TRANSFORM, VIDEO, ...) implements [`Message`];
//! [`IgtlMessage`] pairs a typed body with its frame header.

use crate::error::{IgtlError, Result};
use crate::protocol::frame::Frame;
use crate::protocol::header::Header;

/// Common interface for all OpenIGTLink body types
pub trait Message: Sized {
    /// Wire type name (e.g. "TRANSFORM", "VIDEO")
    fn message_type() -> &'static str;

    /// Encode the body (without header)
    fn encode_content(&self) -> Result<Vec<u8>>;

    /// Decode the body (without header)
    fn decode_content(data: &[u8]) -> Result<Self>;
}

/// A typed body together with its header
#[derive(Debug, Clone)]
pub struct IgtlMessage<T: Message> {
    pub header: Header,
    pub content: T,
}

impl<T: Message> IgtlMessage<T> {
    /// Wrap `content` in a fresh header for `device_name`
    pub fn new(content: T, device_name: &str) -> Result<Self> {
        let frame = Frame::new(T::message_type(), device_name, content.encode_content()?)?;
        Ok(IgtlMessage {
            header: frame.header,
            content,
        })
    }

    /// Encode header and body; size and CRC are recomputed from the content
    pub fn encode(&self) -> Result<Vec<u8>> {
        self.to_frame()?.encode()
    }

    pub fn to_frame(&self) -> Result<Frame> {
        Frame::with_timestamp(
            T::message_type(),
            self.header.device_name.as_str()?,
            self.header.timestamp,
            self.content.encode_content()?,
        )
    }

    /// Decode one complete frame, optionally verifying its CRC
    pub fn decode(data: &[u8], verify_crc: bool) -> Result<Self> {
        Self::from_frame(Frame::parse(data)?, verify_crc)
    }

    pub fn from_frame(frame: Frame, verify_crc: bool) -> Result<Self> {
        if frame.type_name() != T::message_type() {
            return Err(IgtlError::DeviceTypeMismatch {
                expected: T::message_type().to_string(),
                actual: frame.type_name().to_string(),
            });
        }
        if verify_crc {
            frame.verify_crc()?;
        }
        let content = T::decode_content(&frame.body)?;
        Ok(IgtlMessage {
            header: frame.header,
            content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::{StringMessage, TransformMessage};

    #[test]
    fn test_encode_decode() {
        let msg = IgtlMessage::new(StringMessage::new("hello"), "Console").unwrap();
        let bytes = msg.encode().unwrap();
        let decoded = IgtlMessage::<StringMessage>::decode(&bytes, true).unwrap();
        assert_eq!(decoded.content.string, "hello");
        assert_eq!(decoded.header.device_name.as_str().unwrap(), "Console");
        assert_eq!(decoded.header.body_size, bytes.len() as u64 - 58);
    }

    #[test]
    fn test_wrong_type_rejected() {
        let bytes = IgtlMessage::new(StringMessage::new("x"), "A")
            .unwrap()
            .encode()
            .unwrap();
        let result = IgtlMessage::<TransformMessage>::decode(&bytes, true);
        assert!(matches!(result, Err(IgtlError::DeviceTypeMismatch { .. })));
    }

    #[test]
    fn test_crc_only_checked_when_requested() {
        let mut bytes = IgtlMessage::new(StringMessage::new("abc"), "A")
            .unwrap()
            .encode()
            .unwrap();
        let last = bytes.len() - 1;
        bytes[last] = b'z';
        assert!(IgtlMessage::<StringMessage>::decode(&bytes, true).is_err());
        let relaxed = IgtlMessage::<StringMessage>::decode(&bytes, false).unwrap();
        assert_eq!(relaxed.content.string, "abz");
    }
}
