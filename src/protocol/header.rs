//! OpenIGTLink frame header
//!
//! The header is a fixed 58-byte big-endian record that precedes every body.

use crate::error::{IgtlError, Result};
use bytes::{Buf, BufMut, BytesMut};

/// Message type name (12 bytes, NUL-padded)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName([u8; 12]);

impl TypeName {
    /// Maximum encoded length in bytes
    pub const MAX_LEN: usize = 12;

    pub fn new(name: &str) -> Result<Self> {
        if name.len() > Self::MAX_LEN {
            return Err(IgtlError::InvalidHeader(format!(
                "Type name too long: {} bytes (max: {})",
                name.len(),
                Self::MAX_LEN
            )));
        }
        let mut bytes = [0u8; 12];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Ok(TypeName(bytes))
    }

    /// Type name with trailing NUL bytes removed
    pub fn as_str(&self) -> Result<&str> {
        trimmed(&self.0, "type name")
    }
}

impl From<[u8; 12]> for TypeName {
    fn from(bytes: [u8; 12]) -> Self {
        TypeName(bytes)
    }
}

/// Device name (20 bytes, NUL-padded)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceName([u8; 20]);

impl DeviceName {
    /// Maximum encoded length in bytes
    pub const MAX_LEN: usize = 20;

    pub fn new(name: &str) -> Result<Self> {
        if name.len() > Self::MAX_LEN {
            return Err(IgtlError::InvalidHeader(format!(
                "Device name too long: {} bytes (max: {})",
                name.len(),
                Self::MAX_LEN
            )));
        }
        let mut bytes = [0u8; 20];
        bytes[..name.len()].copy_from_slice(name.as_bytes());
        Ok(DeviceName(bytes))
    }

    /// Device name with trailing NUL bytes removed
    pub fn as_str(&self) -> Result<&str> {
        trimmed(&self.0, "device name")
    }
}

impl From<[u8; 20]> for DeviceName {
    fn from(bytes: [u8; 20]) -> Self {
        DeviceName(bytes)
    }
}

fn trimmed<'a>(raw: &'a [u8], field: &str) -> Result<&'a str> {
    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    std::str::from_utf8(&raw[..len])
        .map_err(|_| IgtlError::InvalidHeader(format!("Invalid UTF-8 in {}", field)))
}

/// OpenIGTLink timestamp
///
/// On the wire this is a single u64: the upper 32 bits hold seconds since the
/// Unix epoch and the lower 32 bits hold the fraction of a second in units of
/// 2^-32 s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Timestamp {
    /// Seconds since Unix epoch
    pub seconds: u32,
    /// Fractional seconds scaled to 2^32
    pub fraction: u32,
}

impl Timestamp {
    pub fn new(seconds: u32, fraction: u32) -> Self {
        Timestamp { seconds, fraction }
    }

    /// Current wall-clock time
    ///
    /// A clock set before the epoch yields the zero timestamp.
    pub fn now() -> Self {
        let since_epoch = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default();
        Self::from_nanos(since_epoch.as_nanos() as u64)
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn to_u64(self) -> u64 {
        ((self.seconds as u64) << 32) | (self.fraction as u64)
    }

    pub fn from_u64(value: u64) -> Self {
        Timestamp {
            seconds: (value >> 32) as u32,
            fraction: value as u32,
        }
    }

    /// Convert to nanoseconds since Unix epoch
    ///
    /// # Examples
    ///
    /// ```
    /// use openigtlink_devices::protocol::header::Timestamp;
    ///
    /// let ts = Timestamp::new(1000, 0x8000_0000);
    /// assert_eq!(ts.to_nanos(), 1_000_500_000_000);
    /// ```
    pub fn to_nanos(self) -> u64 {
        let frac_nanos = ((self.fraction as u64) * 1_000_000_000) >> 32;
        (self.seconds as u64) * 1_000_000_000 + frac_nanos
    }

    pub fn from_nanos(nanos: u64) -> Self {
        let seconds = (nanos / 1_000_000_000) as u32;
        let rem = nanos % 1_000_000_000;
        let fraction = ((rem << 32) / 1_000_000_000) as u32;
        Timestamp { seconds, fraction }
    }

    pub fn to_f64(self) -> f64 {
        self.seconds as f64 + (self.fraction as f64) / 4_294_967_296.0
    }
}

/// OpenIGTLink frame header (58 bytes)
///
/// # Layout (big-endian)
/// - Version: u16
/// - Type: `char[12]`, NUL-padded
/// - Device Name: `char[20]`, NUL-padded
/// - Timestamp: u64
/// - Body Size: u64
/// - CRC: u64 (CRC-64 of the body)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u16,
    pub type_name: TypeName,
    pub device_name: DeviceName,
    pub timestamp: Timestamp,
    pub body_size: u64,
    pub crc: u64,
}

impl Header {
    /// Header size in bytes
    pub const SIZE: usize = 58;

    /// Decode the first 58 bytes of `buf`
    ///
    /// Only the fixed-width fields are converted here; use
    /// [`Header::validate`] to check version and names.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < Self::SIZE {
            return Err(IgtlError::InvalidHeader(format!(
                "Truncated header: {} bytes (need {})",
                buf.len(),
                Self::SIZE
            )));
        }

        let mut cursor = &buf[..Self::SIZE];
        let version = cursor.get_u16();

        let mut type_bytes = [0u8; 12];
        cursor.copy_to_slice(&mut type_bytes);

        let mut device_bytes = [0u8; 20];
        cursor.copy_to_slice(&mut device_bytes);

        let timestamp = Timestamp::from_u64(cursor.get_u64());
        let body_size = cursor.get_u64();
        let crc = cursor.get_u64();

        Ok(Header {
            version,
            type_name: TypeName::from(type_bytes),
            device_name: DeviceName::from(device_bytes),
            timestamp,
            body_size,
            crc,
        })
    }

    /// Encode into 58 wire bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = BytesMut::with_capacity(Self::SIZE);
        buf.put_u16(self.version);
        buf.put_slice(&self.type_name.0);
        buf.put_slice(&self.device_name.0);
        buf.put_u64(self.timestamp.to_u64());
        buf.put_u64(self.body_size);
        buf.put_u64(self.crc);
        buf.to_vec()
    }

    /// Reject headers that cannot belong to a well-formed frame
    pub fn validate(&self) -> Result<()> {
        if !(1..=3).contains(&self.version) {
            return Err(IgtlError::InvalidHeader(format!(
                "Unsupported version {}",
                self.version
            )));
        }
        if self.type_name.as_str()?.is_empty() {
            return Err(IgtlError::InvalidHeader("Empty type name".to_string()));
        }
        self.device_name.as_str()?;
        Ok(())
    }

    /// Type name, or an empty string when it is not valid UTF-8
    pub fn type_str(&self) -> &str {
        self.type_name.as_str().unwrap_or("")
    }

    /// Device name, or an empty string when it is not valid UTF-8
    pub fn device_str(&self) -> &str {
        self.device_name.as_str().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Header {
        Header {
            version: 2,
            type_name: TypeName::new("VIDEO").unwrap(),
            device_name: DeviceName::new("USProbe").unwrap(),
            timestamp: Timestamp::new(1234567890, 0x12345678),
            body_size: 72,
            crc: 0xDEADBEEFCAFEBABE,
        }
    }

    #[test]
    fn test_type_name_too_long() {
        assert!(TypeName::new("VERY_LONG_TYPE_NAME").is_err());
        assert!(DeviceName::new("ThisDeviceNameIsWayTooLong").is_err());
    }

    #[test]
    fn test_full_width_names() {
        let name = TypeName::new("TWELVE_CHARS").unwrap();
        assert_eq!(name.as_str().unwrap(), "TWELVE_CHARS");
        let dev = DeviceName::new("TWENTY_CHARACTERS_XX").unwrap();
        assert_eq!(dev.as_str().unwrap(), "TWENTY_CHARACTERS_XX");
    }

    #[test]
    fn test_timestamp_conversion() {
        let ts = Timestamp::new(1000, 0x80000000);
        assert_eq!(ts.to_nanos(), 1_000_500_000_000);
        let back = Timestamp::from_nanos(ts.to_nanos());
        assert_eq!(back.seconds, 1000);
        assert!((back.fraction as i64 - 0x80000000_i64).abs() < 100);
        assert!((ts.to_f64() - 1000.5).abs() < 1e-6);
    }

    #[test]
    fn test_timestamp_now() {
        assert!(Timestamp::now().seconds > 0);
    }

    #[test]
    fn test_header_roundtrip() {
        let original = sample();
        let encoded = original.encode();
        assert_eq!(encoded.len(), Header::SIZE);
        assert_eq!(Header::decode(&encoded).unwrap(), original);
    }

    #[test]
    fn test_decode_short_buffer() {
        let result = Header::decode(&[0u8; 30]);
        assert!(matches!(result, Err(IgtlError::InvalidHeader(_))));
    }

    #[test]
    fn test_big_endian_layout() {
        let mut header = sample();
        header.version = 0x0102;
        header.timestamp = Timestamp::from_u64(0x0102030405060708);
        let encoded = header.encode();
        assert_eq!(&encoded[0..2], &[0x01, 0x02]);
        assert_eq!(&encoded[2..7], b"VIDEO");
        assert_eq!(encoded[7], 0);
        assert_eq!(&encoded[34..38], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_validate() {
        assert!(sample().validate().is_ok());

        let mut bad_version = sample();
        bad_version.version = 9;
        assert!(bad_version.validate().is_err());

        let mut empty_type = sample();
        empty_type.type_name = TypeName::from([0u8; 12]);
        assert!(empty_type.validate().is_err());

        let mut bad_utf8 = sample();
        let mut raw = [0u8; 20];
        raw[0] = 0xFF;
        bad_utf8.device_name = DeviceName::from(raw);
        assert!(bad_utf8.validate().is_err());
        assert_eq!(bad_utf8.device_str(), "");
    }
}
