//! COMMAND message type
//!
//! Body: command id (u32), command name (`char[20]`), encoding (u16),
//! length (u32), then the command text (usually XML).

use super::string::ENCODING_US_ASCII;
use super::{get_fixed_str, put_fixed_str};
use crate::error::{IgtlError, Result};
use crate::protocol::message::Message;
use bytes::{Buf, BufMut};

const COMMAND_HEADER_SIZE: usize = 4 + 20 + 2 + 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMessage {
    pub command_id: u32,
    pub command_name: String,
    pub encoding: u16,
    pub command: String,
}

impl CommandMessage {
    pub fn new(
        command_id: u32,
        command_name: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        CommandMessage {
            command_id,
            command_name: command_name.into(),
            encoding: ENCODING_US_ASCII,
            command: command.into(),
        }
    }
}

impl Message for CommandMessage {
    fn message_type() -> &'static str {
        "COMMAND"
    }

    fn encode_content(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(COMMAND_HEADER_SIZE + self.command.len());
        buf.put_u32(self.command_id);
        put_fixed_str(&mut buf, &self.command_name, 20);
        buf.put_u16(self.encoding);
        buf.put_u32(self.command.len() as u32);
        buf.extend_from_slice(self.command.as_bytes());
        Ok(buf)
    }

    fn decode_content(mut data: &[u8]) -> Result<Self> {
        if data.len() < COMMAND_HEADER_SIZE {
            return Err(IgtlError::InvalidSize {
                expected: COMMAND_HEADER_SIZE,
                actual: data.len(),
            });
        }
        let command_id = data.get_u32();
        let command_name = get_fixed_str(&mut data, 20);
        let encoding = data.get_u16();
        let len = data.get_u32() as usize;
        if data.len() < len {
            return Err(IgtlError::InvalidSize {
                expected: len,
                actual: data.len(),
            });
        }
        let command = String::from_utf8(data[..len].to_vec())?;
        Ok(CommandMessage {
            command_id,
            command_name,
            encoding,
            command,
        })
    }
}
