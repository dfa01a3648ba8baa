//! CRC-64 checksum used by OpenIGTLink frame headers
//!
//! CRC-64/ECMA-182: polynomial `0x42F0E1EBA9EA3693`, MSB-first, initial
//! value 0, no final xor. Computed over the message body only.

const POLYNOMIAL: u64 = 0x42F0_E1EB_A9EA_3693;

const CRC_TABLE: [u64; 256] = build_table();

const fn build_table() -> [u64; 256] {
    let mut table = [0u64; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u64) << 56;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000_0000_0000 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Calculate the CRC-64 of a byte slice
///
/// # Examples
///
/// ```
/// use openigtlink_devices::protocol::crc::calculate_crc;
///
/// assert_eq!(calculate_crc(b"123456789"), 0x6C40_DF5F_0B49_7347);
/// ```
pub fn calculate_crc(data: &[u8]) -> u64 {
    data.iter().fold(0u64, |crc, &byte| {
        let index = ((crc >> 56) as u8 ^ byte) as usize;
        CRC_TABLE[index] ^ (crc << 8)
    })
}

/// Check a body against the CRC declared in its header
pub fn verify_crc(data: &[u8], expected: u64) -> bool {
    calculate_crc(data) == expected
}
