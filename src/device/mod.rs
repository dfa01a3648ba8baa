//! Devices: named, typed endpoints holding the latest content of one stream
//!
//! A [`Device`] is identified by its (type name, device name) pair, which
//! never changes after creation. Its [`DeviceContent`] is the tagged variant
//! selected by the type name. Inbound frames and local setters both mutate
//! content in place and mark the device as having a pending change
//! notification; the registry turns those into events.
//!
//! # Example
//!
//! ```
//! use openigtlink_devices::device::Device;
//! use openigtlink_devices::protocol::frame::Frame;
//! use openigtlink_devices::protocol::message::Message;
//! use openigtlink_devices::protocol::types::TransformMessage;
//!
//! let mut tracker = Device::transform("Needle");
//! assert!(tracker.produce_outbound().is_err());
//!
//! let body = TransformMessage::translation(1.0, 2.0, 3.0).encode_content()?;
//! let frame = Frame::new("TRANSFORM", "Needle", body)?;
//! tracker.apply_inbound(&frame, true)?;
//! assert_eq!(tracker.transform_content().unwrap().matrix[0][3], 1.0);
//! # Ok::<(), openigtlink_devices::IgtlError>(())
//! ```

pub mod factory;
pub mod video;

pub use factory::{DeviceConstructor, DeviceFactory};
pub use video::{VideoContent, VideoDevice};

use crate::codec::VideoCodec;
use crate::error::{IgtlError, Result};
use crate::protocol::frame::Frame;
use crate::protocol::header::Timestamp;
use crate::protocol::message::Message;
use crate::protocol::types::{
    CommandMessage, ImageMessage, StatusMessage, StringMessage, TransformMessage, VideoMessage,
};
use std::fmt;
use tracing::debug;

/// Registry key: exact, case-sensitive (type name, device name)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceKey {
    pub type_name: String,
    pub device_name: String,
}

impl DeviceKey {
    pub fn new(type_name: impl Into<String>, device_name: impl Into<String>) -> Self {
        DeviceKey {
            type_name: type_name.into(),
            device_name: device_name.into(),
        }
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.type_name, self.device_name)
    }
}

/// Content payload, one variant per device kind
#[derive(Debug)]
pub enum DeviceContent {
    Image(Option<ImageMessage>),
    Transform(Option<TransformMessage>),
    Status(Option<StatusMessage>),
    String(Option<StringMessage>),
    Command(Option<CommandMessage>),
    Video(VideoDevice),
    /// Raw body of a host-registered type with no typed decoder
    Generic(Option<Vec<u8>>),
}

/// One live device
#[derive(Debug)]
pub struct Device {
    key: DeviceKey,
    content: DeviceContent,
    timestamp: Timestamp,
    modified_count: u64,
    pending_notification: bool,
}

impl Device {
    pub fn new(
        type_name: impl Into<String>,
        device_name: impl Into<String>,
        content: DeviceContent,
    ) -> Self {
        Device {
            key: DeviceKey::new(type_name, device_name),
            content,
            timestamp: Timestamp::zero(),
            modified_count: 0,
            pending_notification: false,
        }
    }

    pub fn image(device_name: impl Into<String>) -> Self {
        Self::new(ImageMessage::message_type(), device_name, DeviceContent::Image(None))
    }

    pub fn transform(device_name: impl Into<String>) -> Self {
        Self::new(
            TransformMessage::message_type(),
            device_name,
            DeviceContent::Transform(None),
        )
    }

    pub fn status(device_name: impl Into<String>) -> Self {
        Self::new(StatusMessage::message_type(), device_name, DeviceContent::Status(None))
    }

    pub fn string(device_name: impl Into<String>) -> Self {
        Self::new(StringMessage::message_type(), device_name, DeviceContent::String(None))
    }

    pub fn command(device_name: impl Into<String>) -> Self {
        Self::new(CommandMessage::message_type(), device_name, DeviceContent::Command(None))
    }

    pub fn video(device_name: impl Into<String>, codec: Box<dyn VideoCodec>) -> Self {
        Self::new(
            VideoMessage::message_type(),
            device_name,
            DeviceContent::Video(VideoDevice::new(codec)),
        )
    }

    pub fn generic(type_name: impl Into<String>, device_name: impl Into<String>) -> Self {
        Self::new(type_name, device_name, DeviceContent::Generic(None))
    }

    pub fn key(&self) -> &DeviceKey {
        &self.key
    }

    pub fn type_name(&self) -> &str {
        &self.key.type_name
    }

    pub fn device_name(&self) -> &str {
        &self.key.device_name
    }

    pub fn content(&self) -> &DeviceContent {
        &self.content
    }

    /// Timestamp of the last applied inbound frame
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Number of content updates since creation
    pub fn modified_count(&self) -> u64 {
        self.modified_count
    }

    pub fn is_pending(&self) -> bool {
        self.pending_notification
    }

    /// Clear and return the pending notification flag
    pub fn take_pending(&mut self) -> bool {
        std::mem::take(&mut self.pending_notification)
    }

    /// Current image; for VIDEO devices, the last decoded or encoded image
    pub fn image_content(&self) -> Option<&ImageMessage> {
        match &self.content {
            DeviceContent::Image(image) => image.as_ref(),
            DeviceContent::Video(video) => video.image(),
            _ => None,
        }
    }

    pub fn transform_content(&self) -> Option<&TransformMessage> {
        match &self.content {
            DeviceContent::Transform(t) => t.as_ref(),
            _ => None,
        }
    }

    pub fn status_content(&self) -> Option<&StatusMessage> {
        match &self.content {
            DeviceContent::Status(s) => s.as_ref(),
            _ => None,
        }
    }

    pub fn string_content(&self) -> Option<&StringMessage> {
        match &self.content {
            DeviceContent::String(s) => s.as_ref(),
            _ => None,
        }
    }

    pub fn command_content(&self) -> Option<&CommandMessage> {
        match &self.content {
            DeviceContent::Command(c) => c.as_ref(),
            _ => None,
        }
    }

    pub fn raw_content(&self) -> Option<&[u8]> {
        match &self.content {
            DeviceContent::Generic(body) => body.as_deref(),
            _ => None,
        }
    }

    pub fn video_device(&self) -> Option<&VideoDevice> {
        match &self.content {
            DeviceContent::Video(video) => Some(video),
            _ => None,
        }
    }

    /// Mutable video state; changes made here are not flagged as modified
    pub fn video_device_mut(&mut self) -> Option<&mut VideoDevice> {
        match &mut self.content {
            DeviceContent::Video(video) => Some(video),
            _ => None,
        }
    }

    /// Unpack an inbound frame into content
    ///
    /// The frame's type must match the device. With `check_crc` set, a
    /// corrupted body is rejected with `CrcMismatch`. Content is replaced only
    /// after the whole body decoded successfully.
    pub fn apply_inbound(&mut self, frame: &Frame, check_crc: bool) -> Result<()> {
        if frame.type_name() != self.type_name() {
            return Err(IgtlError::DeviceTypeMismatch {
                expected: self.key.type_name.clone(),
                actual: frame.type_name().to_string(),
            });
        }
        if check_crc {
            frame.verify_crc()?;
        }

        let body = frame.body.as_slice();
        match &mut self.content {
            DeviceContent::Image(slot) => *slot = Some(ImageMessage::decode_content(body)?),
            DeviceContent::Transform(slot) => {
                *slot = Some(TransformMessage::decode_content(body)?)
            }
            DeviceContent::Status(slot) => *slot = Some(StatusMessage::decode_content(body)?),
            DeviceContent::String(slot) => *slot = Some(StringMessage::decode_content(body)?),
            DeviceContent::Command(slot) => *slot = Some(CommandMessage::decode_content(body)?),
            DeviceContent::Video(video) => video.apply_inbound(frame)?,
            DeviceContent::Generic(slot) => *slot = Some(body.to_vec()),
        }

        self.timestamp = frame.header.timestamp;
        self.mark_modified();
        debug!(
            device = %self.key,
            body_size = body.len(),
            "Applied inbound frame"
        );
        Ok(())
    }

    /// Serialize content into a body
    ///
    /// Fails with `NotReady` when no content has been set yet.
    pub fn produce_outbound(&self) -> Result<Vec<u8>> {
        let not_ready = || IgtlError::NotReady(format!("{} has no content", self.key));
        match &self.content {
            DeviceContent::Image(c) => c.as_ref().ok_or_else(not_ready)?.encode_content(),
            DeviceContent::Transform(c) => c.as_ref().ok_or_else(not_ready)?.encode_content(),
            DeviceContent::Status(c) => c.as_ref().ok_or_else(not_ready)?.encode_content(),
            DeviceContent::String(c) => c.as_ref().ok_or_else(not_ready)?.encode_content(),
            DeviceContent::Command(c) => c.as_ref().ok_or_else(not_ready)?.encode_content(),
            DeviceContent::Video(video) => video.outbound_body().ok_or_else(not_ready),
            DeviceContent::Generic(c) => c.clone().ok_or_else(not_ready),
        }
    }

    /// Complete outbound frame for this device
    pub fn produce_frame(&self) -> Result<Frame> {
        Frame::new(self.type_name(), self.device_name(), self.produce_outbound()?)
    }

    /// Set the image of an IMAGE device, or encode it on a VIDEO device
    pub fn set_image(&mut self, image: ImageMessage) -> Result<()> {
        match &mut self.content {
            DeviceContent::Image(slot) => *slot = Some(image),
            DeviceContent::Video(video) => video.set_image(&self.key.device_name, image)?,
            _ => return Err(self.mismatch(ImageMessage::message_type())),
        }
        self.mark_modified();
        Ok(())
    }

    pub fn set_transform(&mut self, transform: TransformMessage) -> Result<()> {
        match &mut self.content {
            DeviceContent::Transform(slot) => *slot = Some(transform),
            _ => return Err(self.mismatch(TransformMessage::message_type())),
        }
        self.mark_modified();
        Ok(())
    }

    pub fn set_status(&mut self, status: StatusMessage) -> Result<()> {
        match &mut self.content {
            DeviceContent::Status(slot) => *slot = Some(status),
            _ => return Err(self.mismatch(StatusMessage::message_type())),
        }
        self.mark_modified();
        Ok(())
    }

    pub fn set_string(&mut self, string: StringMessage) -> Result<()> {
        match &mut self.content {
            DeviceContent::String(slot) => *slot = Some(string),
            _ => return Err(self.mismatch(StringMessage::message_type())),
        }
        self.mark_modified();
        Ok(())
    }

    pub fn set_command(&mut self, command: CommandMessage) -> Result<()> {
        match &mut self.content {
            DeviceContent::Command(slot) => *slot = Some(command),
            _ => return Err(self.mismatch(CommandMessage::message_type())),
        }
        self.mark_modified();
        Ok(())
    }

    /// Flag a change made through [`Device::video_device_mut`]
    pub fn mark_modified(&mut self) {
        self.modified_count += 1;
        self.pending_notification = true;
    }

    fn mismatch(&self, actual: &str) -> IgtlError {
        IgtlError::DeviceTypeMismatch {
            expected: self.key.type_name.clone(),
            actual: actual.to_string(),
        }
    }
}
