//! Byte-level wire format checks
//!
//! Verify the exact header and VIDEO sub-header layouts that other
//! OpenIGTLink peers expect.

use openigtlink_devices::codec::{PlanarCodec, VideoCodec};
use openigtlink_devices::protocol::crc::calculate_crc;
use openigtlink_devices::protocol::frame::Frame;
use openigtlink_devices::protocol::header::{Header, Timestamp};
use openigtlink_devices::protocol::message::{IgtlMessage, Message};
use openigtlink_devices::protocol::types::{
    ImageMessage, ImageScalarType, StringMessage, VideoMessage, VIDEO_HEADER_SIZE,
};

#[test]
fn test_crc64_check_value() {
    // CRC-64/ECMA-182 check value for "123456789"
    assert_eq!(calculate_crc(b"123456789"), 0x6C40_DF5F_0B49_7347);
    assert_eq!(calculate_crc(&[]), 0);
}

#[test]
fn test_header_layout() {
    let frame = Frame::with_timestamp(
        "STRING",
        "Console",
        Timestamp::new(0x0102_0304, 0x0506_0708),
        StringMessage::new("hi").encode_content().unwrap(),
    )
    .unwrap();
    let bytes = frame.encode().unwrap();

    assert_eq!(&bytes[0..2], &[0x00, 0x02], "version 2, big-endian");
    assert_eq!(&bytes[2..8], b"STRING");
    assert!(bytes[8..14].iter().all(|&b| b == 0), "type name NUL-padded to 12");
    assert_eq!(&bytes[14..21], b"Console");
    assert!(bytes[21..34].iter().all(|&b| b == 0), "device name NUL-padded to 20");
    assert_eq!(&bytes[34..42], &[1, 2, 3, 4, 5, 6, 7, 8]);
    assert_eq!(u64::from_be_bytes(bytes[42..50].try_into().unwrap()), 6);
    assert_eq!(
        u64::from_be_bytes(bytes[50..58].try_into().unwrap()),
        calculate_crc(&bytes[Header::SIZE..])
    );
}

#[test]
fn test_string_body_layout() {
    let body = StringMessage::new("ready").encode_content().unwrap();
    assert_eq!(&body[0..2], &[0x00, 0x03], "US-ASCII encoding");
    assert_eq!(&body[2..4], &[0x00, 0x05], "length");
    assert_eq!(&body[4..], b"ready");
}

#[test]
fn test_typed_message_roundtrip() {
    let msg = IgtlMessage::new(StringMessage::utf8("Überwachung"), "Console").unwrap();
    let bytes = msg.encode().unwrap();
    let decoded: IgtlMessage<StringMessage> = IgtlMessage::decode(&bytes, true).unwrap();
    assert_eq!(decoded.content.as_str(), "Überwachung");
    assert_eq!(decoded.header.device_name.as_str().unwrap(), "Console");
}

#[test]
fn test_video_sub_header_layout() {
    let image = ImageMessage::new(ImageScalarType::Uint8, 3, [320, 240, 1], vec![9; 320 * 240 * 3])
        .unwrap();
    let frame = PlanarCodec::new().encode(&image, true).unwrap();
    let body = frame.to_video_message().encode_content().unwrap();

    assert_eq!(&body[0..2], &[0x00, 0x01], "sub-header version");
    assert_eq!(body[2], 1, "big-endian payload");
    assert_eq!(&body[3..7], b"PLN1");
    assert_eq!(&body[7..9], &[0x00, 0x01], "key frame");
    assert_eq!(body[10], 3, "components");
    assert_eq!(u32::from_be_bytes(body[12..16].try_into().unwrap()), 320);
    assert_eq!(u32::from_be_bytes(body[16..20].try_into().unwrap()), 240);
    assert_eq!(u32::from_be_bytes(body[20..24].try_into().unwrap()), 1);
    assert_eq!(f32::from_be_bytes(body[24..28].try_into().unwrap()), 1.0);
    assert_eq!(body.len(), VIDEO_HEADER_SIZE + frame.payload.len());

    let decoded = VideoMessage::decode_content(&body).unwrap();
    assert_eq!(decoded.size, [320, 240, 1]);
    assert!(decoded.is_key_frame());
}
