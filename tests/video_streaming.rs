//! End-to-end video streaming scenarios
//!
//! A sending registry encodes images on a VIDEO device, frames travel
//! through a connector into a receiving registry, and adapters mirror the
//! result.

use openigtlink_devices::codec::{CodecFactory, PlanarCodec, VideoCodec};
use openigtlink_devices::device::{Device, DeviceKey};
use openigtlink_devices::protocol::frame::Frame;
use openigtlink_devices::protocol::message::Message;
use openigtlink_devices::protocol::types::{FrameKind, ImageMessage, ImageScalarType, VideoMessage};
use openigtlink_devices::{
    DeviceRegistry, IgtlError, RegistryConfig, StreamingCompressionAdapter, VideoCodecConfig,
};

fn rgb(width: u16, height: u16, t: u8) -> ImageMessage {
    let mut data = Vec::with_capacity(width as usize * height as usize * 3);
    for y in 0..height {
        for x in 0..width {
            data.push((x as u8).wrapping_mul(9).wrapping_add(t));
            data.push((y as u8).wrapping_mul(5));
            data.push(t.wrapping_mul(3) ^ (x as u8));
        }
    }
    ImageMessage::new(ImageScalarType::Uint8, 3, [width, height, 1], data).unwrap()
}

fn sender_registry(distance: &str) -> (DeviceRegistry, DeviceKey) {
    let video = VideoCodecConfig::default().with_parameter("keyFrameDistance", distance);
    let mut registry =
        DeviceRegistry::with_config(RegistryConfig::default().with_video(video)).unwrap();
    let key = DeviceKey::new("VIDEO", "Endoscope");
    let device = registry.factory().create("VIDEO", "Endoscope").unwrap();
    registry.register_device(device).unwrap();
    (registry, key)
}

fn send(registry: &mut DeviceRegistry, key: &DeviceKey, image: ImageMessage) -> Vec<u8> {
    let device = registry.device_mut(key).unwrap();
    device.set_image(image).unwrap();
    device.produce_frame().unwrap().encode().unwrap()
}

#[test]
fn test_key_frame_schedule_over_the_wire() {
    let (mut sender, key) = sender_registry("4");
    let kinds: Vec<FrameKind> = (0..9)
        .map(|t| {
            let bytes = send(&mut sender, &key, rgb(8, 8, t));
            let frame = Frame::parse(&bytes).unwrap();
            VideoMessage::decode_content(&frame.body).unwrap().frame_kind
        })
        .collect();

    use FrameKind::{Delta, Key};
    assert_eq!(
        kinds,
        vec![Key, Delta, Delta, Delta, Key, Delta, Delta, Delta, Key]
    );
}

#[test]
fn test_lossless_stream_is_bit_exact() {
    let (mut sender, key) = sender_registry("5");
    let mut receiver = DeviceRegistry::new();
    let connector = receiver.add_connector("endoscope");

    let images: Vec<ImageMessage> = (0..12).map(|t| rgb(10, 6, t * 7)).collect();
    for image in &images {
        connector.send(send(&mut sender, &key, image.clone())).unwrap();
        let report = receiver.call_periodic_handler();
        assert_eq!(report.rejected, 0);

        let decoded = receiver.device(&key).unwrap().image_content().unwrap();
        assert_eq!(decoded.data, image.data);
        assert_eq!(decoded.size, image.size);
    }
}

#[test]
fn test_lossy_stream_keeps_dimensions() {
    let video = VideoCodecConfig::default()
        .with_parameter("losslessEncoding", "false")
        .with_parameter("bitRate", "100000");
    let config = RegistryConfig::default().with_video(video.clone());
    let mut sender = DeviceRegistry::with_config(config.clone()).unwrap();
    let mut receiver = DeviceRegistry::with_config(config).unwrap();
    let key = DeviceKey::new("VIDEO", "Endoscope");
    sender
        .register_device(Device::video("Endoscope", video.build(&CodecFactory::new()).unwrap()))
        .unwrap();

    for t in 0..4 {
        let image = rgb(15, 9, t * 20);
        let bytes = send(&mut sender, &key, image.clone());
        let decoded = receiver.dispatch_inbound(&bytes, true).unwrap().image_content().unwrap();
        assert_eq!(decoded.size, image.size);
        assert_eq!(decoded.num_components, 3);
        assert_eq!(decoded.data.len(), image.data.len());
    }
}

#[test]
fn test_late_joiner_needs_key_frame() {
    let (mut sender, key) = sender_registry("50");
    let key_frame = send(&mut sender, &key, rgb(8, 8, 0));
    let delta = send(&mut sender, &key, rgb(8, 8, 1));

    let mut receiver = DeviceRegistry::new();
    assert!(matches!(
        receiver.dispatch_inbound(&delta, true),
        Err(IgtlError::DecodeFailed(_))
    ));
    assert!(receiver.is_empty());

    // Replaying the stored key frame first makes the delta decodable
    let stored = sender.device(&key).unwrap().video_device().unwrap().key_frame().to_vec();
    assert_eq!(
        Frame::parse(&stored).unwrap().body,
        Frame::parse(&key_frame).unwrap().body
    );
    receiver.dispatch_inbound(&stored, true).unwrap();
    let device = receiver.dispatch_inbound(&delta, true).unwrap();
    assert_eq!(device.image_content().unwrap().data, rgb(8, 8, 1).data);
}

#[test]
fn test_adapter_follows_receiving_device() {
    let (mut sender, key) = sender_registry("3");
    let mut receiver = DeviceRegistry::new();
    receiver.dispatch_inbound(&send(&mut sender, &key, rgb(6, 6, 0)), true).unwrap();

    let mut adapter = StreamingCompressionAdapter::new();
    adapter.link_video_device(&mut receiver, &key).unwrap();
    assert!(adapter.key_frame_updated());
    adapter.reset_key_frame_updated();

    let mut key_frames_seen = 0;
    for t in 1..10 {
        receiver.dispatch_inbound(&send(&mut sender, &key, rgb(6, 6, t)), true).unwrap();
        receiver.flush_notifications();
        adapter.process_events(&receiver);
        assert_eq!(adapter.image().unwrap().data, rgb(6, 6, t).data);
        if adapter.key_frame_updated() {
            key_frames_seen += 1;
            adapter.reset_key_frame_updated();
        }
    }
    // Frames 3, 6 and 9 are key frames
    assert_eq!(key_frames_seen, 3);

    receiver.unregister_device(&key).unwrap();
    adapter.process_events(&receiver);
    assert!(!adapter.is_linked());
}

#[test]
fn test_adapter_reencodes_with_own_codec() {
    let mut registry = DeviceRegistry::new();
    let key = DeviceKey::new("IMAGE", "Probe1");
    registry.register_device(Device::image("Probe1")).unwrap();

    let mut adapter = StreamingCompressionAdapter::with_codec(PlanarCodec::boxed());
    assert!(adapter.set_codec_parameter("keyFrameDistance", "2"));
    assert!(!adapter.set_codec_parameter("bitRate", "-1"));
    assert_eq!(adapter.codec().parameter("bitRate").as_deref(), Some("0"));
    adapter.set_compress_on_update(true);
    adapter.link_image_device(&mut registry, &key).unwrap();

    let mut decoder = StreamingCompressionAdapter::new();
    let mut scratch = DeviceRegistry::new();
    for t in 0..4 {
        registry.device_mut(&key).unwrap().set_image(rgb(7, 5, t)).unwrap();
        registry.flush_notifications();
        adapter.process_events(&registry);

        let frame = adapter.frame().to_vec();
        assert!(decoder.decode_inbound_bitstream(&mut scratch, &frame, true));
        assert_eq!(decoder.image().unwrap().data, rgb(7, 5, t).data);
    }
    assert_eq!(decoder.device_name(), "Probe1");
}

#[test]
fn test_codec_swap_restarts_with_key_frame() {
    let (mut sender, key) = sender_registry("50");
    send(&mut sender, &key, rgb(4, 4, 0));
    send(&mut sender, &key, rgb(4, 4, 1));

    let codec: Box<dyn VideoCodec> = PlanarCodec::boxed();
    sender
        .device_mut(&key)
        .unwrap()
        .video_device_mut()
        .unwrap()
        .set_codec(codec);
    let bytes = send(&mut sender, &key, rgb(4, 4, 2));
    let frame = Frame::parse(&bytes).unwrap();
    assert!(VideoMessage::decode_content(&frame.body).unwrap().is_key_frame());
}

#[test]
fn test_invalid_video_config_aborts_startup() {
    let video = VideoCodecConfig::default().with_parameter("bitRate", "-1");
    let result = DeviceRegistry::with_config(RegistryConfig::default().with_video(video));
    assert!(matches!(result, Err(IgtlError::InvalidParameter { .. })));
}
