//! Pluggable video codecs
//!
//! A [`VideoCodec`] turns an [`ImageMessage`] into a [`CompressedFrame`] and
//! back. Codecs keep their own encoder and decoder state (key-frame counter,
//! last reference), so one instance serves exactly one logical stream and
//! must not be shared between threads mid-stream.
//!
//! Tunables are exposed as string key/value pairs so hosts can configure any
//! codec without knowing its concrete type:
//!
//! ```
//! use openigtlink_devices::codec::{CodecFactory, PlanarCodec};
//!
//! let factory = CodecFactory::new();
//! let mut codec = factory.create(PlanarCodec::FOURCC).unwrap();
//! assert!(codec.set_parameter("keyFrameDistance", "10"));
//! assert!(!codec.set_parameter("bitRate", "-1"));
//! assert_eq!(codec.parameter("keyFrameDistance").as_deref(), Some("10"));
//! ```

pub mod frame;
pub mod planar;

pub use frame::CompressedFrame;
pub use planar::PlanarCodec;

use crate::error::{IgtlError, Result};
use crate::protocol::types::{FourCC, ImageMessage};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Image <-> bitstream strategy used by video devices
pub trait VideoCodec: Send + fmt::Debug {
    /// Identifier written into every frame this codec produces
    fn fourcc(&self) -> FourCC;

    /// Encode `image`
    ///
    /// Produces a key frame when `force_key_frame` is set, on the first
    /// encode, or when the key-frame distance counter runs out. Any other
    /// frame is a delta whose predecessor is the previously encoded frame.
    fn encode(&mut self, image: &ImageMessage, force_key_frame: bool)
        -> Result<Arc<CompressedFrame>>;

    /// Decode `frame`
    ///
    /// Delta frames need a reference: the frame's predecessor, or
    /// `previous` when it matches the frame's dimensions.
    fn decode(
        &mut self,
        frame: &Arc<CompressedFrame>,
        previous: Option<&ImageMessage>,
    ) -> Result<ImageMessage>;

    /// Fixed set of parameter names this codec understands
    fn parameter_names(&self) -> &'static [&'static str];

    /// Validate and apply one parameter
    ///
    /// Returns `false`, leaving state untouched, for unknown names or
    /// invalid values.
    fn set_parameter(&mut self, name: &str, value: &str) -> bool;

    /// Current value of a parameter
    fn parameter(&self, name: &str) -> Option<String>;

    /// Human-readable description; empty for unknown names
    fn parameter_description(&self, name: &str) -> &'static str;

    /// Forget encoder and decoder history
    fn reset(&mut self);

    /// Every parameter with its current value
    fn parameters(&self) -> Vec<(&'static str, String)> {
        self.parameter_names()
            .iter()
            .filter_map(|&name| self.parameter(name).map(|v| (name, v)))
            .collect()
    }
}

/// Constructor stored in a [`CodecFactory`]
pub type CodecConstructor = fn() -> Box<dyn VideoCodec>;

/// Registry of available codecs keyed by FourCC
#[derive(Clone)]
pub struct CodecFactory {
    constructors: HashMap<FourCC, CodecConstructor>,
    default_codec: FourCC,
}

impl CodecFactory {
    /// Factory with the built-in [`PlanarCodec`] registered as default
    pub fn new() -> Self {
        let mut factory = CodecFactory {
            constructors: HashMap::new(),
            default_codec: PlanarCodec::FOURCC,
        };
        factory.register(PlanarCodec::FOURCC, PlanarCodec::boxed);
        factory
    }

    /// Add or replace a codec constructor
    pub fn register(&mut self, fourcc: FourCC, constructor: CodecConstructor) {
        self.constructors.insert(fourcc, constructor);
    }

    pub fn set_default(&mut self, fourcc: FourCC) -> Result<()> {
        if !self.constructors.contains_key(&fourcc) {
            return Err(IgtlError::UnknownCodec(fourcc.to_string()));
        }
        self.default_codec = fourcc;
        Ok(())
    }

    pub fn default_codec(&self) -> FourCC {
        self.default_codec
    }

    pub fn create(&self, fourcc: FourCC) -> Result<Box<dyn VideoCodec>> {
        self.constructors
            .get(&fourcc)
            .map(|ctor| ctor())
            .ok_or_else(|| IgtlError::UnknownCodec(fourcc.to_string()))
    }

    pub fn create_default(&self) -> Result<Box<dyn VideoCodec>> {
        self.create(self.default_codec)
    }

    pub fn supports(&self, fourcc: FourCC) -> bool {
        self.constructors.contains_key(&fourcc)
    }

    /// Registered codecs, sorted
    pub fn codecs(&self) -> Vec<FourCC> {
        let mut codecs: Vec<FourCC> = self.constructors.keys().copied().collect();
        codecs.sort();
        codecs
    }
}

impl Default for CodecFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CodecFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecFactory")
            .field("codecs", &self.codecs())
            .field("default_codec", &self.default_codec)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_codec_available() {
        let factory = CodecFactory::new();
        assert!(factory.supports(PlanarCodec::FOURCC));
        let codec = factory.create_default().unwrap();
        assert_eq!(codec.fourcc(), PlanarCodec::FOURCC);
    }

    #[test]
    fn test_unknown_codec() {
        let factory = CodecFactory::new();
        let vp9 = FourCC::new(b"VP90");
        assert!(matches!(factory.create(vp9), Err(IgtlError::UnknownCodec(_))));
        let mut factory = factory;
        assert!(factory.set_default(vp9).is_err());
        assert_eq!(factory.default_codec(), PlanarCodec::FOURCC);
    }

    #[test]
    fn test_parameters_listing() {
        let codec = PlanarCodec::new();
        let params = codec.parameters();
        assert_eq!(params.len(), 3);
        assert!(params.contains(&("losslessEncoding", "true".to_string())));
        assert!(params.contains(&("keyFrameDistance", "50".to_string())));
    }
}
