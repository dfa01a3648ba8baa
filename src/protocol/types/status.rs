//! STATUS message type
//!
//! Body: code (u16), subcode (i64), error name (`char[20]`), then a
//! NUL-terminated status string.

use super::{get_fixed_str, put_fixed_str};
use crate::error::{IgtlError, Result};
use crate::protocol::message::Message;
use bytes::{Buf, BufMut};

const MIN_STATUS_SIZE: usize = 2 + 8 + 20 + 1;

/// Status code meaning success
pub const STATUS_OK: u16 = 1;
/// Generic error status code
pub const STATUS_ERROR: u16 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub code: u16,
    pub subcode: i64,
    pub error_name: String,
    pub status_string: String,
}

impl StatusMessage {
    pub fn ok(status_string: &str) -> Self {
        StatusMessage {
            code: STATUS_OK,
            subcode: 0,
            error_name: String::new(),
            status_string: status_string.to_string(),
        }
    }

    pub fn error(error_name: &str, status_string: &str) -> Self {
        StatusMessage {
            code: STATUS_ERROR,
            subcode: 0,
            error_name: error_name.to_string(),
            status_string: status_string.to_string(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == STATUS_OK
    }
}

impl Message for StatusMessage {
    fn message_type() -> &'static str {
        "STATUS"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(MIN_STATUS_SIZE + self.status_string.len());
        buf.put_u16(self.code);
        buf.put_i64(self.subcode);
        put_fixed_str(&mut buf, &self.error_name, 20);
        buf.extend_from_slice(self.status_string.as_bytes());
        buf.put_u8(0);
        Ok(buf)
    }

    fn decode_content(mut data: &[u8]) -> Result<Self> {
        if data.len() < MIN_STATUS_SIZE {
            return Err(IgtlError::InvalidSize {
                expected: MIN_STATUS_SIZE,
                actual: data.len(),
            });
        }
        let code = data.get_u16();
        let subcode = data.get_i64();
        let error_name = get_fixed_str(&mut data, 20);
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        let status_string = String::from_utf8(data[..end].to_vec())?;

        Ok(StatusMessage {
            code,
            subcode,
            error_name,
            status_string,
        })
    }
}
