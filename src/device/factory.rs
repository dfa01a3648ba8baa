//! Device factory: type name -> constructor
//!
//! Ships with constructors for IMAGE, TRANSFORM, STATUS, STRING, COMMAND and
//! VIDEO. Each type also carries the host node tag used for tag lookups.
//! Hosts can register further types at runtime:
//!
//! ```
//! use openigtlink_devices::device::{Device, DeviceFactory};
//! use std::sync::Arc;
//!
//! let mut factory = DeviceFactory::new();
//! factory.register(
//!     "SENSOR",
//!     "Sensor",
//!     Arc::new(|name: &str| Ok(Device::generic("SENSOR", name))),
//! );
//! let device = factory.create("SENSOR", "Thermometer")?;
//! assert_eq!(device.type_name(), "SENSOR");
//! assert!(factory.create("NDARRAY", "x").is_err());
//! # Ok::<(), openigtlink_devices::IgtlError>(())
//! ```

use super::Device;
use crate::codec::CodecFactory;
use crate::config::VideoCodecConfig;
use crate::error::{IgtlError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Builds a device for a given device name
pub type DeviceConstructor = Arc<dyn Fn(&str) -> Result<Device> + Send + Sync>;

#[derive(Clone)]
struct Registration {
    node_tag: String,
    constructor: DeviceConstructor,
}

#[derive(Clone)]
pub struct DeviceFactory {
    registrations: HashMap<String, Registration>,
}

impl DeviceFactory {
    /// Built-in device types using the default video codec
    pub fn new() -> Self {
        let mut factory = DeviceFactory {
            registrations: HashMap::new(),
        };
        factory.register_builtin();
        factory.register_video(CodecFactory::new(), VideoCodecConfig::default());
        factory
    }

    /// Built-in device types with VIDEO devices built from `video`
    ///
    /// The configuration is validated once here so a bad codec name or
    /// parameter fails at startup rather than on the first VIDEO frame.
    pub fn with_video_config(codecs: CodecFactory, video: VideoCodecConfig) -> Result<Self> {
        video.build(&codecs)?;
        let mut factory = DeviceFactory {
            registrations: HashMap::new(),
        };
        factory.register_builtin();
        factory.register_video(codecs, video);
        Ok(factory)
    }

    fn register_builtin(&mut self) {
        self.register("IMAGE", "Volume", Arc::new(|name: &str| Ok(Device::image(name))));
        self.register(
            "TRANSFORM",
            "LinearTransform",
            Arc::new(|name: &str| Ok(Device::transform(name))),
        );
        self.register("STATUS", "IGTLStatus", Arc::new(|name: &str| Ok(Device::status(name))));
        self.register("STRING", "Text", Arc::new(|name: &str| Ok(Device::string(name))));
        self.register(
            "COMMAND",
            "IGTLCommand",
            Arc::new(|name: &str| Ok(Device::command(name))),
        );
    }

    fn register_video(&mut self, codecs: CodecFactory, video: VideoCodecConfig) {
        self.register(
            "VIDEO",
            "StreamingVolume",
            Arc::new(move |name: &str| -> Result<Device> {
                Ok(Device::video(name, video.build(&codecs)?))
            }),
        );
    }

    /// Add or replace the constructor for `type_name`
    pub fn register(
        &mut self,
        type_name: impl Into<String>,
        node_tag: impl Into<String>,
        constructor: DeviceConstructor,
    ) {
        self.registrations.insert(
            type_name.into(),
            Registration {
                node_tag: node_tag.into(),
                constructor,
            },
        );
    }

    pub fn unregister(&mut self, type_name: &str) -> bool {
        self.registrations.remove(type_name).is_some()
    }

    pub fn supports(&self, type_name: &str) -> bool {
        self.registrations.contains_key(type_name)
    }

    /// Registered type names, sorted
    pub fn supported_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.registrations.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn node_tag(&self, type_name: &str) -> Option<&str> {
        self.registrations
            .get(type_name)
            .map(|r| r.node_tag.as_str())
    }

    /// Construct a device, checking it reports the requested type
    pub fn create(&self, type_name: &str, device_name: &str) -> Result<Device> {
        let registration = self
            .registrations
            .get(type_name)
            .ok_or_else(|| IgtlError::UnknownMessageType(type_name.to_string()))?;
        let device = (registration.constructor)(device_name)?;
        if device.type_name() != type_name {
            return Err(IgtlError::DeviceTypeMismatch {
                expected: type_name.to_string(),
                actual: device.type_name().to_string(),
            });
        }
        trace!(type_name, device_name, "Created device");
        Ok(device)
    }
}

impl Default for DeviceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DeviceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceFactory")
            .field("types", &self.supported_types())
            .finish()
    }
}
