//! Registry and codec configuration
//!
//! Every field has a default, so a partial document deserializes cleanly:
//!
//! ```
//! use openigtlink_devices::config::RegistryConfig;
//!
//! let config = RegistryConfig::default();
//! assert!(config.restrict_device_name);
//! assert!(config.check_crc);
//! assert_eq!(config.video.codec, "PLN1");
//! ```

use crate::codec::{CodecFactory, PlanarCodec, VideoCodec};
use crate::error::{IgtlError, Result};
use crate::protocol::types::FourCC;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Settings of a [`crate::DeviceRegistry`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Route inbound frames by (type, name) rather than by type alone
    pub restrict_device_name: bool,
    /// Verify body CRCs of frames drained by the periodic handler
    pub check_crc: bool,
    /// Per-connector cap on frames dispatched per periodic call (None = all)
    pub max_frames_per_cycle: Option<usize>,
    /// Codec used by newly created VIDEO devices
    pub video: VideoCodecConfig,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            restrict_device_name: true,
            check_crc: true,
            max_frames_per_cycle: None,
            video: VideoCodecConfig::default(),
        }
    }
}

impl RegistryConfig {
    /// Route every frame of a type to the first device of that type
    pub fn unrestricted() -> Self {
        Self {
            restrict_device_name: false,
            ..Default::default()
        }
    }

    pub fn with_max_frames_per_cycle(mut self, max: usize) -> Self {
        self.max_frames_per_cycle = Some(max);
        self
    }

    pub fn with_video(mut self, video: VideoCodecConfig) -> Self {
        self.video = video;
        self
    }
}

/// Codec FourCC plus string parameters applied to each new instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoCodecConfig {
    pub codec: String,
    pub parameters: BTreeMap<String, String>,
}

impl Default for VideoCodecConfig {
    fn default() -> Self {
        Self {
            codec: PlanarCodec::FOURCC.to_string(),
            parameters: BTreeMap::new(),
        }
    }
}

impl VideoCodecConfig {
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn fourcc(&self) -> Result<FourCC> {
        FourCC::parse(&self.codec)
    }

    /// Instantiate the codec and apply every parameter
    ///
    /// Fails with `UnknownCodec` or `InvalidParameter`; nothing is built
    /// from a partially valid configuration.
    pub fn build(&self, codecs: &CodecFactory) -> Result<Box<dyn VideoCodec>> {
        let mut codec = codecs.create(self.fourcc()?)?;
        for (name, value) in &self.parameters {
            if !codec.set_parameter(name, value) {
                return Err(IgtlError::InvalidParameter {
                    name: name.clone(),
                    value: value.clone(),
                });
            }
        }
        Ok(codec)
    }
}
