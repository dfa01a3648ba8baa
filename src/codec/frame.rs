//! Codec-level compressed frame

use crate::protocol::types::{FourCC, FrameKind, VideoMessage};
use std::sync::Arc;

/// One encoded frame plus the link to its decode predecessor
///
/// A key frame never has a predecessor. A delta frame produced by an encoder
/// always points at the frame encoded just before it; a delta frame received
/// from the wire is linked by the receiving device before decode.
#[derive(Debug)]
pub struct CompressedFrame {
    pub codec: FourCC,
    pub kind: FrameKind,
    /// [width, height, depth]
    pub dimensions: [u32; 3],
    pub num_components: u8,
    pub payload: Vec<u8>,
    previous: Option<Arc<CompressedFrame>>,
}

impl CompressedFrame {
    pub fn key(codec: FourCC, dimensions: [u32; 3], num_components: u8, payload: Vec<u8>) -> Self {
        CompressedFrame {
            codec,
            kind: FrameKind::Key,
            dimensions,
            num_components,
            payload,
            previous: None,
        }
    }

    pub fn delta(
        codec: FourCC,
        dimensions: [u32; 3],
        num_components: u8,
        payload: Vec<u8>,
        previous: Option<Arc<CompressedFrame>>,
    ) -> Self {
        CompressedFrame {
            codec,
            kind: FrameKind::Delta,
            dimensions,
            num_components,
            payload,
            previous,
        }
    }

    /// Rebuild from a VIDEO body; `previous` is ignored for key frames
    pub fn from_video_message(msg: VideoMessage, previous: Option<Arc<CompressedFrame>>) -> Self {
        let previous = match msg.frame_kind {
            FrameKind::Key => None,
            FrameKind::Delta => previous,
        };
        CompressedFrame {
            codec: msg.codec,
            kind: msg.frame_kind,
            dimensions: msg.size,
            num_components: msg.num_components,
            payload: msg.payload,
            previous,
        }
    }

    /// VIDEO body carrying this frame (identity matrix)
    pub fn to_video_message(&self) -> VideoMessage {
        VideoMessage::new(
            self.codec,
            self.kind,
            self.num_components,
            self.dimensions,
            self.payload.clone(),
        )
    }

    pub fn is_key_frame(&self) -> bool {
        self.kind == FrameKind::Key
    }

    pub fn previous(&self) -> Option<&Arc<CompressedFrame>> {
        self.previous.as_ref()
    }

    /// Number of predecessor steps to the nearest key frame
    ///
    /// `None` when the chain ends at a delta frame with no predecessor.
    pub fn chain_depth(&self) -> Option<usize> {
        let mut depth = 0;
        let mut current = self;
        loop {
            if current.is_key_frame() {
                return Some(depth);
            }
            current = current.previous.as_deref()?;
            depth += 1;
        }
    }
}

impl Drop for CompressedFrame {
    // Unlink iteratively so long delta chains don't recurse on drop.
    fn drop(&mut self) {
        let mut next = self.previous.take();
        while let Some(frame) = next {
            match Arc::try_unwrap(frame) {
                Ok(mut inner) => next = inner.previous.take(),
                Err(_) => break,
            }
        }
    }
}
