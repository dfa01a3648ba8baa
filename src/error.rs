//! Error types for OpenIGTLink device and codec operations
//!
//! Every fallible operation in this crate returns [`Result<T>`]. Frame-level
//! errors (`InvalidHeader`, `InvalidSize`, `CrcMismatch`) are raised at the
//! framing boundary before any device state is touched.

use thiserror::Error;

/// OpenIGTLink error types
#[derive(Error, Debug)]
pub enum IgtlError {
    /// Truncated or garbled header
    ///
    /// This error occurs when:
    /// - Fewer than 58 bytes are available for the header
    /// - Header version field is not 1, 2, or 3
    /// - Type or device name is not valid UTF-8, or the type name is empty
    ///
    /// # Example
    /// ```no_run
    /// # use openigtlink_devices::error::IgtlError;
    /// let err = IgtlError::InvalidHeader("Version must be 1, 2, or 3".to_string());
    /// ```
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// CRC checksum mismatch
    ///
    /// The frame must be discarded; no device content is modified.
    #[error("CRC mismatch: expected {expected:#x}, got {actual:#x}")]
    CrcMismatch {
        /// CRC value declared in the header
        expected: u64,
        /// CRC value calculated over the received body
        actual: u64,
    },

    /// No constructor is registered for this message type
    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    /// Declared and actual sizes disagree
    ///
    /// This error occurs when:
    /// - The header declares more body bytes than the buffer holds
    /// - A message body is shorter than its fixed-size fields
    /// - Pixel data length doesn't match image dimensions
    #[error("Invalid message size: expected {expected}, got {actual}")]
    InvalidSize {
        /// Expected size in bytes
        expected: usize,
        /// Actual size in bytes
        actual: usize,
    },

    /// I/O error while reading frames from a transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error in a text field
    #[error("UTF-8 conversion error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Message body size exceeds maximum allowed
    ///
    /// Protects against headers that declare impossibly large bodies.
    #[error("Message body too large: {size} bytes (max: {max})")]
    BodyTooLarge {
        /// Declared body size in bytes
        size: usize,
        /// Maximum allowed size in bytes
        max: usize,
    },

    /// Source content required to produce an outbound body is absent
    #[error("Device not ready: {0}")]
    NotReady(String),

    /// No video codec is registered under this FourCC
    #[error("Unknown video codec: {0}")]
    UnknownCodec(String),

    /// Codec failed to encode an image
    #[error("Encode failed: {0}")]
    EncodeFailed(String),

    /// Codec failed to decode a compressed frame
    #[error("Decode failed: {0}")]
    DecodeFailed(String),

    /// A device with the same (type, name) pair is already registered
    #[error("Device already registered: {type_name}/{device_name}")]
    DuplicateDevice {
        /// Device type name
        type_name: String,
        /// Device name
        device_name: String,
    },

    /// No device with this (type, name) pair exists
    #[error("Device not found: {type_name}/{device_name}")]
    DeviceNotFound {
        /// Device type name
        type_name: String,
        /// Device name
        device_name: String,
    },

    /// Frame type does not match the device it was routed to
    #[error("Device type mismatch: expected {expected}, got {actual}")]
    DeviceTypeMismatch {
        /// Device type name
        expected: String,
        /// Type name found in the frame header
        actual: String,
    },

    /// Codec parameter rejected during configuration
    #[error("Invalid codec parameter {name}={value}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// Rejected value
        value: String,
    },
}

/// Result type alias for OpenIGTLink operations
pub type Result<T> = std::result::Result<T, IgtlError>;
