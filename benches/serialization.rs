//! Frame serialization and dispatch benchmarks
//!
//! Measures header/body encoding, frame parsing with CRC, and registry
//! dispatch without any network I/O.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use openigtlink_devices::protocol::{
    frame::Frame,
    message::{IgtlMessage, Message},
    types::{ImageMessage, ImageScalarType, TransformMessage},
};
use openigtlink_devices::DeviceRegistry;

fn bench_transform_roundtrip(c: &mut Criterion) {
    let msg = IgtlMessage::new(TransformMessage::translation(1.0, 2.0, 3.0), "Needle").unwrap();
    let data = msg.encode().unwrap();

    c.bench_function("transform_encode", |b| {
        b.iter(|| black_box(msg.encode().unwrap()))
    });
    c.bench_function("transform_decode", |b| {
        b.iter(|| {
            let _: IgtlMessage<TransformMessage> =
                black_box(IgtlMessage::decode(&data, true).unwrap());
        })
    });
}

fn bench_frame_parse_by_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_parse_crc");

    for (width, height) in [(64u16, 64u16), (256, 256), (512, 512)] {
        let size = width as usize * height as usize;
        group.throughput(Throughput::Bytes(size as u64));

        let image =
            ImageMessage::new(ImageScalarType::Uint8, 1, [width, height, 1], vec![128u8; size])
                .unwrap();
        let bytes = Frame::new("IMAGE", "Probe1", image.encode_content().unwrap())
            .unwrap()
            .encode()
            .unwrap();

        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}", width, height)),
            &bytes,
            |b, bytes| {
                b.iter(|| {
                    let frame = Frame::parse(bytes).unwrap();
                    frame.verify_crc().unwrap();
                    black_box(frame)
                });
            },
        );
    }

    group.finish();
}

fn bench_registry_dispatch(c: &mut Criterion) {
    let bytes = Frame::new(
        "TRANSFORM",
        "Needle",
        TransformMessage::identity().encode_content().unwrap(),
    )
    .unwrap()
    .encode()
    .unwrap();
    let mut registry = DeviceRegistry::new();

    c.bench_function("registry_dispatch_transform", |b| {
        b.iter(|| {
            registry.dispatch_inbound(black_box(&bytes), true).unwrap();
        })
    });
}

criterion_group!(
    benches,
    bench_transform_roundtrip,
    bench_frame_parse_by_size,
    bench_registry_dispatch
);

criterion_main!(benches);
