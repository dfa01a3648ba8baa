//! OpenIGTLink wire protocol: header, framing, CRC and typed bodies

pub mod crc;
pub mod frame;
pub mod header;
pub mod message;
pub mod types;

pub use crc::{calculate_crc, verify_crc};
pub use frame::{allocate_body, assemble_frame, parse_header, Frame, MAX_BODY_SIZE};
pub use header::{DeviceName, Header, Timestamp, TypeName};
pub use message::{IgtlMessage, Message};
