//! STRING message type
//!
//! Body: encoding (u16, IANA MIBenum), length (u16), then the bytes.

use crate::error::{IgtlError, Result};
use crate::protocol::message::Message;
use bytes::{Buf, BufMut};

/// MIBenum for US-ASCII
pub const ENCODING_US_ASCII: u16 = 3;
/// MIBenum for UTF-8
pub const ENCODING_UTF8: u16 = 106;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringMessage {
    pub encoding: u16,
    pub string: String,
}

impl StringMessage {
    /// US-ASCII string
    pub fn new(string: impl Into<String>) -> Self {
        Self::with_encoding(ENCODING_US_ASCII, string)
    }

    pub fn utf8(string: impl Into<String>) -> Self {
        Self::with_encoding(ENCODING_UTF8, string)
    }

    pub fn with_encoding(encoding: u16, string: impl Into<String>) -> Self {
        StringMessage {
            encoding,
            string: string.into(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.string
    }
}

impl Message for StringMessage {
    fn message_type() -> &'static str {
        "STRING"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let len = u16::try_from(self.string.len()).map_err(|_| IgtlError::BodyTooLarge {
            size: self.string.len(),
            max: u16::MAX as usize,
        })?;
        let mut buf = Vec::with_capacity(4 + self.string.len());
        buf.put_u16(self.encoding);
        buf.put_u16(len);
        buf.extend_from_slice(self.string.as_bytes());
        Ok(buf)
    }

    fn decode_content(mut data: &[u8]) -> Result<Self> {
        if data.len() < 4 {
            return Err(IgtlError::InvalidSize {
                expected: 4,
                actual: data.len(),
            });
        }
        let encoding = data.get_u16();
        let len = data.get_u16() as usize;
        if data.len() < len {
            return Err(IgtlError::InvalidSize {
                expected: len,
                actual: data.len(),
            });
        }
        let string = String::from_utf8(data[..len].to_vec())?;
        Ok(StringMessage { encoding, string })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let msg = StringMessage::utf8("Öffnen");
        let body = msg.encode_content().unwrap();
        assert_eq!(&body[..2], &ENCODING_UTF8.to_be_bytes());
        assert_eq!(StringMessage::decode_content(&body).unwrap(), msg);
    }

    #[test]
    fn test_declared_length_too_long() {
        let body = [0, 3, 0, 10, b'a', b'b'];
        assert!(StringMessage::decode_content(&body).is_err());
    }
}
