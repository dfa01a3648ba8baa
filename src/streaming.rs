//! Streaming compression adapter
//!
//! Mirrors one registry device as a compressed video stream. Linked to a
//! VIDEO device it copies that device's image and bitstreams; linked to an
//! IMAGE device it encodes the image with its own codec. The adapter holds
//! only the device key: the registry keeps ownership, and change
//! notifications arrive over an event subscription drained by
//! [`StreamingCompressionAdapter::process_events`].
//!
//! Every operation reports failure as `false` or an empty buffer, so the
//! adapter can be polled from a timer without error plumbing.
//!
//! # Example
//!
//! ```
//! use openigtlink_devices::device::{Device, DeviceKey};
//! use openigtlink_devices::protocol::types::{ImageMessage, ImageScalarType};
//! use openigtlink_devices::{DeviceRegistry, StreamingCompressionAdapter};
//!
//! let mut registry = DeviceRegistry::new();
//! registry.register_device(Device::image("Probe1"))?;
//! let key = DeviceKey::new("IMAGE", "Probe1");
//!
//! let mut adapter = StreamingCompressionAdapter::new();
//! adapter.set_compress_on_update(true);
//! adapter.link_image_device(&mut registry, &key)?;
//!
//! let image = ImageMessage::new(ImageScalarType::Uint8, 1, [8, 8, 1], vec![7; 64])?;
//! registry.device_mut(&key).unwrap().set_image(image)?;
//! registry.flush_notifications();
//! adapter.process_events(&registry);
//!
//! assert!(adapter.key_frame_updated());
//! assert!(!adapter.frame().is_empty());
//! # Ok::<(), openigtlink_devices::IgtlError>(())
//! ```

use crate::codec::{PlanarCodec, VideoCodec};
use crate::device::{Device, DeviceContent, DeviceKey, VideoContent, VideoDevice};
use crate::error::{IgtlError, Result};
use crate::event::{DeviceEventKind, EventSubscription};
use crate::protocol::frame::Frame;
use crate::protocol::message::Message;
use crate::protocol::types::{FourCC, ImageMessage, VideoMessage};
use crate::registry::DeviceRegistry;
use tracing::{debug, warn};

/// Kind of device an adapter mirrors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Video,
    Image,
}

#[derive(Debug)]
struct Link {
    key: DeviceKey,
    kind: LinkKind,
    events: EventSubscription,
    // Key-frame generation of the linked VIDEO device last copied
    seen_generation: u64,
}

#[derive(Debug)]
pub struct StreamingCompressionAdapter {
    link: Option<Link>,
    device_name: String,
    content: VideoContent,
    encoder: VideoDevice,
    compress_on_update: bool,
}

impl StreamingCompressionAdapter {
    /// Adapter with its own planar codec
    pub fn new() -> Self {
        Self::with_codec(PlanarCodec::boxed())
    }

    pub fn with_codec(codec: Box<dyn VideoCodec>) -> Self {
        let encoder = VideoDevice::new(codec);
        let content = encoder.content().clone();
        StreamingCompressionAdapter {
            link: None,
            device_name: String::new(),
            content,
            encoder,
            compress_on_update: false,
        }
    }

    /// Mirror a VIDEO device
    ///
    /// Copies its name, codec type, image and bitstreams, then follows its
    /// change events.
    pub fn link_video_device(
        &mut self,
        registry: &mut DeviceRegistry,
        key: &DeviceKey,
    ) -> Result<()> {
        let device = linked_device(registry, key)?;
        let video = device.video_device().ok_or_else(|| IgtlError::DeviceTypeMismatch {
            expected: VideoMessage::message_type().to_string(),
            actual: device.type_name().to_string(),
        })?;

        self.device_name = key.device_name.clone();
        self.content.key_frame_updated = false;
        mirror(&mut self.content, video, video.key_frame_updated());
        let seen_generation = video.key_frame_generation();

        self.link = Some(Link {
            key: key.clone(),
            kind: LinkKind::Video,
            events: registry.subscribe(Some(key.clone())),
            seen_generation,
        });
        debug!(device = %key, "Adapter linked to video device");
        Ok(())
    }

    /// Mirror an IMAGE device, encoding with the adapter's own codec
    ///
    /// A present image is encoded immediately as a key frame so the stream
    /// starts decodable.
    pub fn link_image_device(
        &mut self,
        registry: &mut DeviceRegistry,
        key: &DeviceKey,
    ) -> Result<()> {
        let device = linked_device(registry, key)?;
        let image = match device.content() {
            DeviceContent::Image(image) => image.clone(),
            _ => {
                return Err(IgtlError::DeviceTypeMismatch {
                    expected: ImageMessage::message_type().to_string(),
                    actual: device.type_name().to_string(),
                })
            }
        };

        let device_name = key.device_name.clone();
        match image {
            Some(image) => {
                self.encoder.encode_image(&device_name, image, true)?;
                self.content.key_frame_updated = false;
                mirror(&mut self.content, &self.encoder, self.encoder.key_frame_updated());
            }
            None => {
                self.content.codec_type = self.encoder.codec().fourcc();
                self.content.frame.clear();
                self.content.key_frame.clear();
                self.content.frame_kind = None;
                self.content.key_frame_updated = false;
                self.content.image = None;
            }
        }
        self.device_name = device_name;

        self.link = Some(Link {
            key: key.clone(),
            kind: LinkKind::Image,
            events: registry.subscribe(Some(key.clone())),
            seen_generation: 0,
        });
        debug!(device = %key, "Adapter linked to image device");
        Ok(())
    }

    pub fn unlink(&mut self) {
        if let Some(link) = self.link.take() {
            debug!(device = %link.key, "Adapter unlinked");
        }
    }

    pub fn is_linked(&self) -> bool {
        self.link.is_some()
    }

    pub fn linked_key(&self) -> Option<&DeviceKey> {
        self.link.as_ref().map(|l| &l.key)
    }

    pub fn link_kind(&self) -> Option<LinkKind> {
        self.link.as_ref().map(|l| l.kind)
    }

    /// Apply queued change events of the linked device
    ///
    /// Several modifications between two calls collapse into one refresh.
    /// An `Unregistered` event unlinks the adapter. Returns the number of
    /// events consumed.
    pub fn process_events(&mut self, registry: &DeviceRegistry) -> usize {
        let Some(link) = self.link.as_mut() else {
            return 0;
        };
        let events = link.events.drain();
        let closed = link.events.is_closed();
        let unregistered = events.iter().any(|e| e.kind == DeviceEventKind::Unregistered);
        let modified = events.iter().any(|e| e.kind == DeviceEventKind::ContentModified);

        if unregistered || closed {
            self.unlink();
        } else if modified {
            self.refresh(registry);
        }
        events.len()
    }

    fn refresh(&mut self, registry: &DeviceRegistry) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        let Some(device) = registry.device(&link.key) else {
            return;
        };

        match link.kind {
            LinkKind::Video => {
                let Some(video) = device.video_device() else {
                    return;
                };
                let generation = video.key_frame_generation();
                let refreshed = generation != link.seen_generation;
                link.seen_generation = generation;
                self.device_name = link.key.device_name.clone();
                mirror(&mut self.content, video, refreshed);
            }
            LinkKind::Image => {
                let Some(image) = device.image_content().cloned() else {
                    return;
                };
                self.device_name = link.key.device_name.clone();
                if self.compress_on_update {
                    if let Err(e) = self.encode(image) {
                        warn!(error = %e, "Failed to encode linked image");
                    }
                } else {
                    self.content.image = Some(image);
                }
            }
        }
    }

    /// Decode an IMAGE or VIDEO frame into the adapter
    ///
    /// VIDEO frames go to the linked VIDEO device when there is one, else to
    /// the adapter's own codec. On any failure prior state is kept.
    pub fn decode_inbound_bitstream(
        &mut self,
        registry: &mut DeviceRegistry,
        bytes: &[u8],
        check_crc: bool,
    ) -> bool {
        if bytes.is_empty() {
            warn!("Empty inbound bitstream");
            return false;
        }
        match self.decode_frame(registry, bytes, check_crc) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, size = bytes.len(), "Failed to decode inbound bitstream");
                false
            }
        }
    }

    fn decode_frame(
        &mut self,
        registry: &mut DeviceRegistry,
        bytes: &[u8],
        check_crc: bool,
    ) -> Result<()> {
        let frame = Frame::parse(bytes)?;
        if check_crc {
            frame.verify_crc()?;
        }

        match frame.type_name() {
            "VIDEO" => {
                let linked_video = self
                    .link
                    .as_ref()
                    .filter(|l| l.kind == LinkKind::Video)
                    .map(|l| l.key.clone());
                match linked_video {
                    Some(key) => {
                        let device = registry.device_mut(&key).ok_or_else(|| not_found(&key))?;
                        device.apply_inbound(&frame, false)?;
                        self.refresh(registry);
                    }
                    None => {
                        self.encoder.apply_inbound(&frame)?;
                        self.device_name = frame.device_name().to_string();
                        let key_refreshed = self.encoder.key_frame_updated();
                        mirror(&mut self.content, &self.encoder, key_refreshed);
                    }
                }
            }
            "IMAGE" => {
                let image = ImageMessage::decode_content(&frame.body)?;
                self.device_name = frame.device_name().to_string();
                self.content.image = Some(image);
            }
            other => return Err(IgtlError::UnknownMessageType(other.to_string())),
        }
        Ok(())
    }

    /// Re-encode the current image; empty when there is none or encoding fails
    pub fn compressed_stream(&mut self) -> Vec<u8> {
        let Some(image) = self.content.image.clone() else {
            return Vec::new();
        };
        match self.encode(image) {
            Ok(()) => self.content.frame.clone(),
            Err(e) => {
                warn!(error = %e, "Failed to encode compressed stream");
                Vec::new()
            }
        }
    }

    fn encode(&mut self, image: ImageMessage) -> Result<()> {
        self.encoder.set_image(&self.device_name, image)?;
        let key_refreshed = self.encoder.key_frame_updated();
        mirror(&mut self.content, &self.encoder, key_refreshed);
        Ok(())
    }

    pub fn content(&self) -> &VideoContent {
        &self.content
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn set_device_name(&mut self, name: impl Into<String>) {
        self.device_name = name.into();
    }

    pub fn codec_type(&self) -> FourCC {
        self.content.codec_type
    }

    pub fn image(&self) -> Option<&ImageMessage> {
        self.content.image.as_ref()
    }

    /// Set the image directly, encoding it when compress-on-update is on
    pub fn set_image(&mut self, image: ImageMessage) -> Result<()> {
        if self.compress_on_update {
            self.encode(image)
        } else {
            self.content.image = Some(image);
            Ok(())
        }
    }

    pub fn frame(&self) -> &[u8] {
        &self.content.frame
    }

    pub fn key_frame(&self) -> &[u8] {
        &self.content.key_frame
    }

    /// Stays set until [`Self::reset_key_frame_updated`] once a key frame arrived
    pub fn key_frame_updated(&self) -> bool {
        self.content.key_frame_updated
    }

    pub fn reset_key_frame_updated(&mut self) {
        self.content.key_frame_updated = false;
    }

    pub fn compress_on_update(&self) -> bool {
        self.compress_on_update
    }

    pub fn set_compress_on_update(&mut self, enabled: bool) {
        self.compress_on_update = enabled;
    }

    pub fn codec(&self) -> &dyn VideoCodec {
        self.encoder.codec()
    }

    /// Replace the adapter's own codec; the next encode is a key frame
    pub fn set_codec(&mut self, codec: Box<dyn VideoCodec>) {
        self.encoder.set_codec(codec);
        if self.link_kind() != Some(LinkKind::Video) {
            self.content.codec_type = self.encoder.codec().fourcc();
        }
    }

    pub fn set_codec_parameter(&mut self, name: &str, value: &str) -> bool {
        self.encoder.set_codec_parameter(name, value)
    }

    pub fn request_key_frame(&mut self) {
        self.encoder.request_key_frame();
    }
}

impl Default for StreamingCompressionAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn linked_device<'a>(registry: &'a DeviceRegistry, key: &DeviceKey) -> Result<&'a Device> {
    registry.device(key).ok_or_else(|| not_found(key))
}

fn not_found(key: &DeviceKey) -> IgtlError {
    IgtlError::DeviceNotFound {
        type_name: key.type_name.clone(),
        device_name: key.device_name.clone(),
    }
}

/// Copy codec type, image, frame and key frame from `src`
///
/// The key-frame flag is only raised here; consumers clear it.
fn mirror(dst: &mut VideoContent, src: &VideoDevice, key_refreshed: bool) {
    let content = src.content();
    dst.codec_type = content.codec_type;
    dst.image = content.image.clone();
    dst.frame = content.frame.clone();
    dst.frame_kind = content.frame_kind;
    dst.key_frame = content.key_frame.clone();
    if key_refreshed {
        dst.key_frame_updated = true;
    }
}
