//! VIDEO device content
//!
//! A video device keeps the uncompressed image and the compressed bitstream
//! side by side. Both directions go through the device's own codec:
//! local images are encoded immediately, inbound VIDEO frames are decoded
//! immediately, so `frame` always holds the encoding of `image`.

use crate::codec::{CompressedFrame, VideoCodec};
use crate::error::{IgtlError, Result};
use crate::protocol::frame::Frame;
use crate::protocol::header::Header;
use crate::protocol::message::Message;
use crate::protocol::types::{FourCC, FrameKind, ImageMessage, VideoMessage};
use std::sync::Arc;
use tracing::debug;

/// Snapshot of a video device's content
#[derive(Debug, Clone, PartialEq)]
pub struct VideoContent {
    /// Most recent uncompressed image
    pub image: Option<ImageMessage>,
    /// Complete VIDEO frame (header + body) encoding `image`
    pub frame: Vec<u8>,
    /// Complete VIDEO frame of the most recent key frame
    pub key_frame: Vec<u8>,
    pub codec_type: FourCC,
    /// Set when the latest encode/decode refreshed `key_frame`
    pub key_frame_updated: bool,
    pub frame_kind: Option<FrameKind>,
}

/// VIDEO device state and its codec
#[derive(Debug)]
pub struct VideoDevice {
    codec: Box<dyn VideoCodec>,
    content: VideoContent,
    last_frame: Option<Arc<CompressedFrame>>,
    key_frame_generation: u64,
    force_next_key_frame: bool,
}

impl VideoDevice {
    pub fn new(codec: Box<dyn VideoCodec>) -> Self {
        let codec_type = codec.fourcc();
        VideoDevice {
            codec,
            content: VideoContent {
                image: None,
                frame: Vec::new(),
                key_frame: Vec::new(),
                codec_type,
                key_frame_updated: false,
                frame_kind: None,
            },
            last_frame: None,
            key_frame_generation: 0,
            force_next_key_frame: false,
        }
    }

    pub fn content(&self) -> &VideoContent {
        &self.content
    }

    pub fn image(&self) -> Option<&ImageMessage> {
        self.content.image.as_ref()
    }

    pub fn frame(&self) -> &[u8] {
        &self.content.frame
    }

    pub fn key_frame(&self) -> &[u8] {
        &self.content.key_frame
    }

    pub fn key_frame_updated(&self) -> bool {
        self.content.key_frame_updated
    }

    /// Mark the current key frame as consumed
    pub fn reset_key_frame_updated(&mut self) {
        self.content.key_frame_updated = false;
    }

    /// Incremented every time `key_frame` is replaced
    pub fn key_frame_generation(&self) -> u64 {
        self.key_frame_generation
    }

    pub fn codec(&self) -> &dyn VideoCodec {
        self.codec.as_ref()
    }

    /// Swap the codec; stream history is dropped and the next encode is a key frame
    pub fn set_codec(&mut self, codec: Box<dyn VideoCodec>) {
        self.content.codec_type = codec.fourcc();
        self.codec = codec;
        self.last_frame = None;
        self.force_next_key_frame = true;
    }

    pub fn set_codec_parameter(&mut self, name: &str, value: &str) -> bool {
        self.codec.set_parameter(name, value)
    }

    /// Make the next encode produce a key frame
    pub fn request_key_frame(&mut self) {
        self.force_next_key_frame = true;
    }

    /// Encode `image` and store both representations
    ///
    /// On failure the previous content is kept.
    pub fn set_image(&mut self, device_name: &str, image: ImageMessage) -> Result<()> {
        self.encode_image(device_name, image, false)
    }

    /// [`set_image`](Self::set_image), optionally forcing a key frame
    ///
    /// A failed encode leaves any pending key-frame request in place.
    pub fn encode_image(
        &mut self,
        device_name: &str,
        image: ImageMessage,
        force_key_frame: bool,
    ) -> Result<()> {
        let force = force_key_frame || self.force_next_key_frame;
        let compressed = self.codec.encode(&image, force)?;

        let mut msg = compressed.to_video_message();
        msg.matrix = image.matrix;
        msg.coordinate = image.coordinate;
        let frame = Frame::new(VideoMessage::message_type(), device_name, msg.encode_content()?)?;
        let bytes = frame.encode()?;

        self.force_next_key_frame = false;
        self.commit(image, compressed, bytes);
        Ok(())
    }

    /// Re-encode the current image
    pub fn encode_frame(&mut self, device_name: &str, force_key_frame: bool) -> Result<Frame> {
        let image = self.content.image.clone().ok_or_else(|| {
            IgtlError::NotReady(format!("VIDEO/{} has no image to encode", device_name))
        })?;
        if force_key_frame {
            self.force_next_key_frame = true;
        }
        self.set_image(device_name, image)?;
        Frame::parse(&self.content.frame)
    }

    /// Decode an inbound VIDEO frame into the image
    ///
    /// Delta frames are linked to the previous frame this device handled
    /// before decode. On failure the previous content is kept.
    pub fn apply_inbound(&mut self, frame: &Frame) -> Result<()> {
        let msg = VideoMessage::decode_content(&frame.body)?;
        if msg.codec != self.codec.fourcc() {
            return Err(IgtlError::DecodeFailed(format!(
                "Frame codec {} does not match device codec {}",
                msg.codec,
                self.codec.fourcc()
            )));
        }
        let (matrix, coordinate) = (msg.matrix, msg.coordinate);

        let compressed = Arc::new(CompressedFrame::from_video_message(
            msg,
            self.last_frame.clone(),
        ));
        let image = self
            .codec
            .decode(&compressed, self.content.image.as_ref())?
            .with_matrix(matrix)
            .with_coordinate(coordinate);
        let bytes = frame.encode()?;

        self.commit(image, compressed, bytes);
        Ok(())
    }

    /// VIDEO body of the current frame
    pub fn outbound_body(&self) -> Option<Vec<u8>> {
        self.content
            .frame
            .get(Header::SIZE..)
            .map(|body| body.to_vec())
    }

    fn commit(&mut self, image: ImageMessage, compressed: Arc<CompressedFrame>, bytes: Vec<u8>) {
        let is_key = compressed.is_key_frame();
        if is_key {
            self.content.key_frame = bytes.clone();
            self.key_frame_generation += 1;
        }
        self.content.key_frame_updated = is_key;
        self.content.frame_kind = Some(compressed.kind);
        self.content.frame = bytes;
        self.content.image = Some(image);
        self.last_frame = Some(compressed);

        debug!(
            key_frame = is_key,
            frame_size = self.content.frame.len(),
            generation = self.key_frame_generation,
            "Video content updated"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PlanarCodec;
    use crate::protocol::types::ImageScalarType;

    fn image(seed: u8) -> ImageMessage {
        let data = (0..48).map(|i: u8| i.wrapping_mul(3) ^ seed).collect();
        ImageMessage::new(ImageScalarType::Uint8, 3, [4, 4, 1], data).unwrap()
    }

    fn device() -> VideoDevice {
        VideoDevice::new(Box::new(PlanarCodec::new()))
    }

    #[test]
    fn test_first_image_is_key_frame() {
        let mut dev = device();
        dev.set_image("Cam", image(1)).unwrap();
        assert_eq!(dev.content().frame_kind, Some(FrameKind::Key));
        assert!(dev.key_frame_updated());
        assert_eq!(dev.frame(), dev.key_frame());
        assert_eq!(dev.key_frame_generation(), 1);

        let frame = Frame::parse(dev.frame()).unwrap();
        assert_eq!(frame.type_name(), "VIDEO");
        assert_eq!(frame.device_name(), "Cam");
    }

    #[test]
    fn test_delta_clears_key_frame_flag() {
        let mut dev = device();
        dev.set_image("Cam", image(1)).unwrap();
        let key = dev.key_frame().to_vec();
        dev.set_image("Cam", image(2)).unwrap();
        assert_eq!(dev.content().frame_kind, Some(FrameKind::Delta));
        assert!(!dev.key_frame_updated());
        assert_eq!(dev.key_frame(), key.as_slice());
        assert_ne!(dev.frame(), key.as_slice());
    }

    #[test]
    fn test_request_key_frame() {
        let mut dev = device();
        dev.set_image("Cam", image(1)).unwrap();
        dev.request_key_frame();
        dev.set_image("Cam", image(2)).unwrap();
        assert_eq!(dev.content().frame_kind, Some(FrameKind::Key));
        assert_eq!(dev.key_frame_generation(), 2);
    }

    #[test]
    fn test_inbound_stream_decodes() {
        let mut sender = device();
        let mut receiver = device();
        for seed in 0..5 {
            let img = image(seed).with_matrix([
                [1.0, 0.0, 0.0, 5.0],
                [0.0, 1.0, 0.0, 6.0],
                [0.0, 0.0, 1.0, 7.0],
            ]);
            sender.set_image("Cam", img.clone()).unwrap();
            let frame = Frame::parse(sender.frame()).unwrap();
            receiver.apply_inbound(&frame).unwrap();
            assert_eq!(receiver.image().unwrap().data, img.data);
            assert_eq!(receiver.image().unwrap().matrix, img.matrix);
            assert_eq!(receiver.frame(), sender.frame());
        }
        assert_eq!(receiver.key_frame(), sender.key_frame());
    }

    #[test]
    fn test_failed_decode_keeps_content() {
        let mut sender = device();
        sender.set_image("Cam", image(1)).unwrap();
        sender.set_image("Cam", image(2)).unwrap();
        let delta = Frame::parse(sender.frame()).unwrap();

        let mut receiver = device();
        assert!(receiver.apply_inbound(&delta).is_err());
        assert!(receiver.image().is_none());
        assert!(receiver.frame().is_empty());
    }

    #[test]
    fn test_encode_frame_requires_image() {
        let mut dev = device();
        assert!(matches!(
            dev.encode_frame("Cam", false),
            Err(IgtlError::NotReady(_))
        ));
        dev.set_image("Cam", image(3)).unwrap();
        let frame = dev.encode_frame("Cam", true).unwrap();
        let msg = VideoMessage::decode_content(&frame.body).unwrap();
        assert!(msg.is_key_frame());
        assert_eq!(dev.outbound_body().unwrap(), frame.body);
    }

    #[test]
    fn test_set_codec_forces_key_frame() {
        let mut dev = device();
        dev.set_image("Cam", image(1)).unwrap();
        dev.set_codec(Box::new(PlanarCodec::new()));
        dev.set_image("Cam", image(2)).unwrap();
        assert_eq!(dev.content().frame_kind, Some(FrameKind::Key));
    }
}
