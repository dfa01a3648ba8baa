//! OpenIGTLink device registry with streaming video compression
//!
//! This library keeps the live state of every device seen on one or more
//! OpenIGTLink connections, and turns image streams into compressed VIDEO
//! bitstreams (and back) through a pluggable codec.
//!
//! # Features
//!
//! - **Frame codec** - 58-byte big-endian header, CRC-64 body integrity check
//! - **Typed devices** - IMAGE, TRANSFORM, STATUS, STRING, COMMAND and VIDEO content
//! - **Device registry** - lazy device creation on dispatch, lookups by type and node tag
//! - **Change events** - channel-based subscriptions, one event per modified device
//! - **Video codecs** - key/delta frame scheduling behind the `VideoCodec` trait
//! - **Streaming adapter** - mirrors an image or video device as a compressed stream
//!
//! # Quick Start
//!
//! ## Receiving frames
//!
//! Transport workers push raw frames into a connector; a timer on the
//! controlling thread calls the periodic handler.
//!
//! ```
//! use openigtlink_devices::protocol::frame::Frame;
//! use openigtlink_devices::protocol::message::Message;
//! use openigtlink_devices::protocol::types::{ImageMessage, ImageScalarType};
//! use openigtlink_devices::DeviceRegistry;
//!
//! let mut registry = DeviceRegistry::new();
//! let scanner = registry.add_connector("scanner");
//!
//! let image = ImageMessage::new(ImageScalarType::Uint8, 1, [4, 4, 1], vec![0; 16])?;
//! let bytes = Frame::new("IMAGE", "Probe1", image.encode_content()?)?.encode()?;
//! std::thread::spawn(move || scanner.send(bytes)).join().unwrap()?;
//!
//! let report = registry.call_periodic_handler();
//! assert_eq!(report.dispatched, 1);
//! assert!(registry.find("IMAGE", "Probe1").is_some());
//! # Ok::<(), openigtlink_devices::IgtlError>(())
//! ```
//!
//! ## Compressing an image stream
//!
//! ```
//! use openigtlink_devices::device::Device;
//! use openigtlink_devices::protocol::types::{ImageMessage, ImageScalarType, VideoMessage};
//! use openigtlink_devices::protocol::message::Message;
//! use openigtlink_devices::codec::PlanarCodec;
//!
//! let mut camera = Device::video("Endoscope", PlanarCodec::boxed());
//! camera.video_device_mut().unwrap().set_codec_parameter("keyFrameDistance", "10");
//!
//! for i in 0..3u8 {
//!     let image = ImageMessage::new(ImageScalarType::Uint8, 3, [8, 8, 1], vec![i; 192])?;
//!     camera.set_image(image)?;
//!     let body = camera.produce_outbound()?;
//!     let msg = VideoMessage::decode_content(&body)?;
//!     assert_eq!(msg.is_key_frame(), i == 0);
//! }
//! # Ok::<(), openigtlink_devices::IgtlError>(())
//! ```
//!
//! # Architecture
//!
//! - **`protocol`** - Wire format
//!   - `header` / `frame` - header codec, frame parse and assembly
//!   - `crc` - CRC-64 checksum
//!   - `types` - typed bodies (IMAGE, TRANSFORM, STATUS, STRING, COMMAND, VIDEO)
//! - **`codec`** - `VideoCodec` trait, `CodecFactory`, the planar codec
//! - **`device`** - `Device`, `VideoDevice`, `DeviceFactory`
//! - **`registry`** - `DeviceRegistry` and the periodic handler
//! - **`event`** - device change subscriptions
//! - **`streaming`** - `StreamingCompressionAdapter`
//! - **`io`** - connector inboxes and the async frame pump
//! - **`config`** - serde configuration
//! - **`error`** - `IgtlError` and `Result<T>`
//!
//! # Error Handling
//!
//! Operations return `Result<T, IgtlError>`. A frame that fails to parse,
//! fails its CRC or fails to decode is discarded whole; device content
//! keeps its last good state.
//!
//! ```
//! use openigtlink_devices::{DeviceRegistry, IgtlError};
//!
//! let mut registry = DeviceRegistry::new();
//! match registry.dispatch_inbound(&[0u8; 12], true) {
//!     Err(IgtlError::InvalidHeader(msg)) => println!("dropped: {}", msg),
//!     other => panic!("unexpected: {:?}", other.map(|d| d.key().clone())),
//! }
//! ```

pub mod codec;
pub mod compression;
pub mod config;
pub mod device;
pub mod error;
pub mod event;
pub mod io;
pub mod protocol;
pub mod registry;
pub mod streaming;

// Re-export commonly used types
pub use codec::{CodecFactory, CompressedFrame, PlanarCodec, VideoCodec};
pub use config::{RegistryConfig, VideoCodecConfig};
pub use device::{Device, DeviceContent, DeviceFactory, DeviceKey, VideoDevice};
pub use error::{IgtlError, Result};
pub use event::{DeviceEvent, DeviceEventKind, EventSubscription};
pub use registry::{DeviceRegistry, PeriodicReport};
pub use streaming::{LinkKind, StreamingCompressionAdapter};
