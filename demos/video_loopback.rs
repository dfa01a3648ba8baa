//! Video loopback: encode, transport and decode a synthetic image stream
//!
//! An adapter linked to an IMAGE device compresses each new image. The
//! frames are written into an in-memory pipe, pumped into a connector of a
//! second registry, and decoded there by the periodic handler.
//!
//! ```bash
//! RUST_LOG=info cargo run --example video_loopback
//! RUST_LOG=openigtlink_devices=debug cargo run --example video_loopback
//! ```

use openigtlink_devices::device::{Device, DeviceKey};
use openigtlink_devices::io::forward_frames;
use openigtlink_devices::protocol::types::{ImageMessage, ImageScalarType};
use openigtlink_devices::{DeviceRegistry, StreamingCompressionAdapter};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

const WIDTH: u16 = 160;
const HEIGHT: u16 = 120;
const FRAMES: u8 = 30;

fn synthetic_image(t: u8) -> openigtlink_devices::Result<ImageMessage> {
    let mut data = Vec::with_capacity(WIDTH as usize * HEIGHT as usize * 3);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let shift = x.wrapping_add(t as u16 * 2) as u8;
            data.extend_from_slice(&[shift, (y as u8).wrapping_mul(2), shift ^ (y as u8)]);
        }
    }
    ImageMessage::new(ImageScalarType::Uint8, 3, [WIDTH, HEIGHT, 1], data)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Sending side: an IMAGE device mirrored by a compressing adapter
    let mut source = DeviceRegistry::new();
    let probe = DeviceKey::new("IMAGE", "Probe1");
    source.register_device(Device::image("Probe1"))?;

    let mut adapter = StreamingCompressionAdapter::new();
    adapter.set_compress_on_update(true);
    adapter.set_codec_parameter("keyFrameDistance", "10");
    adapter.link_image_device(&mut source, &probe)?;

    // Receiving side: connector fed by an async pump
    let mut sink = DeviceRegistry::new();
    let connector = sink.add_connector("loopback");
    let (mut writer, reader) = tokio::io::duplex(1 << 20);
    let pump = tokio::spawn(forward_frames(reader, connector));

    let mut bytes_sent = 0usize;
    let mut key_frames = 0usize;
    for t in 0..FRAMES {
        source.device_mut(&probe).ok_or("probe missing")?.set_image(synthetic_image(t)?)?;
        source.flush_notifications();
        adapter.process_events(&source);

        if adapter.key_frame_updated() {
            key_frames += 1;
            adapter.reset_key_frame_updated();
        }
        bytes_sent += adapter.frame().len();
        writer.write_all(adapter.frame()).await?;
    }
    drop(writer);
    let forwarded = pump.await??;

    let mut ticker = tokio::time::interval(Duration::from_millis(10));
    let mut dispatched = 0;
    while dispatched < forwarded {
        ticker.tick().await;
        let report = sink.call_periodic_handler();
        dispatched += report.dispatched + report.rejected;
        if report.rejected > 0 {
            info!(rejected = report.rejected, "Frames rejected");
        }
    }

    let received = sink
        .find("VIDEO", "Probe1")
        .and_then(|d| d.image_content())
        .ok_or("no image decoded")?;
    let expected = synthetic_image(FRAMES - 1)?;
    let raw_bytes = expected.data.len() * FRAMES as usize;

    info!(
        frames = FRAMES,
        key_frames,
        delta_frames = FRAMES as usize - key_frames,
        bytes_sent,
        raw_bytes,
        ratio = raw_bytes as f64 / bytes_sent.max(1) as f64,
        lossless_match = received.data == expected.data,
        "Loopback finished"
    );
    Ok(())
}
