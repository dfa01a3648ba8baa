//! Registry dispatch scenarios
//!
//! Frames are built the way a remote peer would send them and pushed
//! through the public registry API.

use openigtlink_devices::device::{Device, DeviceKey};
use openigtlink_devices::event::DeviceEventKind;
use openigtlink_devices::protocol::frame::{assemble_frame, parse_header, Frame};
use openigtlink_devices::protocol::message::Message;
use openigtlink_devices::protocol::types::{
    CommandMessage, ImageMessage, ImageScalarType, StatusMessage, TransformMessage,
};
use openigtlink_devices::{DeviceRegistry, IgtlError, RegistryConfig};
use std::sync::Arc;

fn image_frame(name: &str, fill: u8) -> Vec<u8> {
    let image = ImageMessage::new(ImageScalarType::Uint8, 1, [4, 4, 1], vec![fill; 16]).unwrap();
    Frame::new("IMAGE", name, image.encode_content().unwrap())
        .unwrap()
        .encode()
        .unwrap()
}

#[test]
fn test_header_roundtrip() {
    let bytes = image_frame("Probe1", 3);
    let header = parse_header(&bytes).unwrap();
    let body = &bytes[openigtlink_devices::protocol::Header::SIZE..];

    let rebuilt = assemble_frame(&header, body).unwrap();
    assert_eq!(rebuilt, bytes);
    assert_eq!(parse_header(&rebuilt).unwrap(), header);
}

#[test]
fn test_truncated_frame_is_size_mismatch() {
    let bytes = image_frame("Probe1", 3);
    let result = parse_header(&bytes[..bytes.len() - 1]);
    assert!(matches!(result, Err(IgtlError::InvalidSize { .. })));

    let mut registry = DeviceRegistry::new();
    assert!(registry.dispatch_inbound(&bytes[..40], true).is_err());
    assert!(registry.is_empty());
}

#[test]
fn test_two_probes_two_devices() {
    let mut registry = DeviceRegistry::new();
    registry.register_device(Device::image("Probe1")).unwrap();

    registry.dispatch_inbound(&image_frame("Probe1", 1), true).unwrap();
    registry.dispatch_inbound(&image_frame("Probe2", 2), true).unwrap();
    registry.dispatch_inbound(&image_frame("Probe1", 3), true).unwrap();

    let names: Vec<&str> = registry
        .devices_by_type("IMAGE")
        .map(|d| d.device_name())
        .collect();
    assert_eq!(names, vec!["Probe1", "Probe2"]);
    assert_eq!(registry.len(), 2);
    assert_eq!(
        registry.find("IMAGE", "Probe1").unwrap().image_content().unwrap().data,
        vec![3; 16]
    );
}

#[test]
fn test_repeated_dispatch_returns_same_device() {
    let mut registry = DeviceRegistry::new();
    for fill in 0..10 {
        let device = registry.dispatch_inbound(&image_frame("Probe1", fill), true).unwrap();
        assert_eq!(device.key(), &DeviceKey::new("IMAGE", "Probe1"));
        assert_eq!(device.modified_count(), fill as u64 + 1);
    }
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_names_are_case_sensitive() {
    let mut registry = DeviceRegistry::new();
    registry.dispatch_inbound(&image_frame("Probe1", 1), true).unwrap();
    registry.dispatch_inbound(&image_frame("PROBE1", 1), true).unwrap();
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_corrupted_body_discarded() {
    let mut registry = DeviceRegistry::new();
    registry.dispatch_inbound(&image_frame("Probe1", 1), true).unwrap();

    let mut corrupted = image_frame("Probe1", 2);
    let last = corrupted.len() - 1;
    corrupted[last] = 0xAA;
    assert!(matches!(
        registry.dispatch_inbound(&corrupted, true),
        Err(IgtlError::CrcMismatch { .. })
    ));

    let device = registry.find("IMAGE", "Probe1").unwrap();
    assert_eq!(device.image_content().unwrap().data, vec![1; 16]);
    assert_eq!(device.modified_count(), 1);

    // Without the integrity check the same bytes are accepted
    registry.dispatch_inbound(&corrupted, false).unwrap();
    let device = registry.find("IMAGE", "Probe1").unwrap();
    assert_eq!(device.image_content().unwrap().data[15], 0xAA);
}

#[test]
fn test_all_builtin_types_dispatch() {
    let mut registry = DeviceRegistry::new();
    let frames = vec![
        Frame::new(
            "TRANSFORM",
            "Needle",
            TransformMessage::translation(1.0, 2.0, 3.0)
                .encode_content()
                .unwrap(),
        ),
        Frame::new(
            "STATUS",
            "Robot",
            StatusMessage::error("Halted", "E-stop").encode_content().unwrap(),
        ),
        Frame::new(
            "COMMAND",
            "Robot",
            CommandMessage::new(7, "Move", "<Go/>").encode_content().unwrap(),
        ),
    ];
    for frame in frames {
        let bytes = frame.unwrap().encode().unwrap();
        registry.dispatch_inbound(&bytes, true).unwrap();
    }

    let needle = registry.find("TRANSFORM", "Needle").unwrap();
    assert_eq!(needle.transform_content().unwrap().matrix[2][3], 3.0);
    let status = registry.find("STATUS", "Robot").unwrap();
    assert!(!status.status_content().unwrap().is_ok());
    let command = registry.find("COMMAND", "Robot").unwrap();
    assert_eq!(command.command_content().unwrap().command_name, "Move");
    assert_eq!(
        registry.device_by_mrml_tag("IGTLCommand").unwrap().key(),
        command.key()
    );
}

#[test]
fn test_custom_type_registration() {
    let mut registry = DeviceRegistry::new();
    let bytes = Frame::new("SENSOR", "Force", vec![1, 2, 3, 4]).unwrap().encode().unwrap();
    assert!(matches!(
        registry.dispatch_inbound(&bytes, true),
        Err(IgtlError::UnknownMessageType(_))
    ));

    registry.factory_mut().register(
        "SENSOR",
        "Sensor",
        Arc::new(|name: &str| Ok(Device::generic("SENSOR", name))),
    );
    let device = registry.dispatch_inbound(&bytes, true).unwrap();
    assert_eq!(device.raw_content(), Some(&[1u8, 2, 3, 4][..]));
    assert!(registry.device_by_mrml_tag("Sensor").is_some());
}

#[test]
fn test_unrestricted_mode_shares_device() {
    let mut registry = DeviceRegistry::with_config(RegistryConfig::unrestricted()).unwrap();
    registry.dispatch_inbound(&image_frame("Probe1", 1), true).unwrap();
    registry.dispatch_inbound(&image_frame("Probe2", 2), true).unwrap();
    assert_eq!(registry.len(), 1);

    let device = registry.device_by_type("IMAGE").unwrap();
    assert_eq!(device.device_name(), "Probe1");
    assert_eq!(device.image_content().unwrap().data, vec![2; 16]);
}

#[test]
fn test_event_lifecycle() {
    let mut registry = DeviceRegistry::new();
    let key = DeviceKey::new("IMAGE", "Probe1");
    let mut all = registry.subscribe(None);

    registry.dispatch_inbound(&image_frame("Probe1", 1), true).unwrap();
    registry.dispatch_inbound(&image_frame("Probe1", 2), true).unwrap();
    registry.flush_notifications();
    registry.unregister_device(&key).unwrap();
    // Removal twice is harmless
    assert!(registry.unregister_device(&key).is_err());

    let kinds: Vec<DeviceEventKind> = all.drain().into_iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            DeviceEventKind::Registered,
            DeviceEventKind::ContentModified,
            DeviceEventKind::Unregistered,
        ]
    );
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_connector_pump() {
    use openigtlink_devices::io::forward_frames;
    use tokio_test::io::Builder;

    let mut registry = DeviceRegistry::new();
    let sender = registry.add_connector("scanner");

    let first = image_frame("Probe1", 1);
    let second = image_frame("Probe2", 2);
    let reader = Builder::new().read(&first).read(&second).build();
    let forwarded = forward_frames(reader, sender).await.unwrap();
    assert_eq!(forwarded, 2);

    let report = registry.call_periodic_handler();
    assert_eq!(report.dispatched, 2);
    assert_eq!(report.rejected, 0);
    assert_eq!(report.notified, 2);
    assert_eq!(registry.connector_stats("scanner").unwrap().pending(), 0);
}
