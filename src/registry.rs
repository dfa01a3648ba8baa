//! Device registry: owns every live device and routes inbound frames
//!
//! The registry is driven from a single controlling thread. Transport
//! workers hand frames over through connectors ([`DeviceRegistry::add_connector`]);
//! [`DeviceRegistry::call_periodic_handler`] drains them, dispatches each
//! frame to its device and publishes one change event per modified device.
//!
//! # Example
//!
//! ```
//! use openigtlink_devices::protocol::frame::Frame;
//! use openigtlink_devices::protocol::message::Message;
//! use openigtlink_devices::protocol::types::TransformMessage;
//! use openigtlink_devices::DeviceRegistry;
//!
//! let mut registry = DeviceRegistry::new();
//! let mut events = registry.subscribe(None);
//!
//! let body = TransformMessage::translation(10.0, 0.0, 0.0).encode_content()?;
//! let bytes = Frame::new("TRANSFORM", "Needle", body)?.encode()?;
//! let device = registry.dispatch_inbound(&bytes, true)?;
//! assert_eq!(device.device_name(), "Needle");
//!
//! registry.flush_notifications();
//! assert_eq!(events.drain().len(), 2); // Registered + ContentModified
//! # Ok::<(), openigtlink_devices::IgtlError>(())
//! ```

use crate::codec::CodecFactory;
use crate::config::RegistryConfig;
use crate::device::{Device, DeviceFactory, DeviceKey};
use crate::error::{IgtlError, Result};
use crate::event::{DeviceEvent, DeviceEventKind, EventBus, EventSubscription, SubscriptionId};
use crate::io::inbox::{FrameInbox, FrameSender, InboxStats};
use crate::protocol::frame::Frame;
use tracing::{debug, info, warn};

/// Outcome of one [`DeviceRegistry::call_periodic_handler`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodicReport {
    /// Frames applied to a device
    pub dispatched: usize,
    /// Frames discarded (parse, integrity, type or decode failure)
    pub rejected: usize,
    /// Devices for which a change event was published
    pub notified: usize,
}

#[derive(Debug)]
pub struct DeviceRegistry {
    config: RegistryConfig,
    factory: DeviceFactory,
    // Registration order; unrestricted routing picks the first device of a type
    devices: Vec<Device>,
    events: EventBus,
    connectors: Vec<FrameInbox>,
}

impl DeviceRegistry {
    /// Registry with default configuration and built-in device types
    pub fn new() -> Self {
        Self::with_factory(RegistryConfig::default(), DeviceFactory::new())
    }

    /// Registry with a validated configuration
    ///
    /// Fails when the configured video codec is unknown or one of its
    /// parameters is rejected.
    pub fn with_config(config: RegistryConfig) -> Result<Self> {
        let factory = DeviceFactory::with_video_config(CodecFactory::new(), config.video.clone())?;
        Ok(Self::with_factory(config, factory))
    }

    pub fn with_factory(config: RegistryConfig, factory: DeviceFactory) -> Self {
        DeviceRegistry {
            config,
            factory,
            devices: Vec::new(),
            events: EventBus::new(),
            connectors: Vec::new(),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn factory(&self) -> &DeviceFactory {
        &self.factory
    }

    /// Register custom device types here
    pub fn factory_mut(&mut self) -> &mut DeviceFactory {
        &mut self.factory
    }

    /// Add a device; fails if its (type, name) pair is already registered
    pub fn register_device(&mut self, device: Device) -> Result<&mut Device> {
        if self.position(device.key()).is_some() {
            return Err(IgtlError::DuplicateDevice {
                type_name: device.type_name().to_string(),
                device_name: device.device_name().to_string(),
            });
        }
        Ok(self.insert(device))
    }

    /// Remove a device and close subscriptions filtered to it
    ///
    /// Safe to repeat; later calls fail with `DeviceNotFound`.
    pub fn unregister_device(&mut self, key: &DeviceKey) -> Result<Device> {
        let index = self.position(key).ok_or_else(|| not_found(key))?;
        let device = self.devices.remove(index);
        self.events
            .publish(DeviceEvent::new(key.clone(), DeviceEventKind::Unregistered));
        self.events.close_filtered(key);
        info!(device = %key, "Device unregistered");
        Ok(device)
    }

    /// Parse a frame and apply it to its device
    ///
    /// Unseen devices are created through the factory and registered only
    /// once the frame applied cleanly. A failed frame leaves every device
    /// untouched.
    pub fn dispatch_inbound(&mut self, buffer: &[u8], check_crc: bool) -> Result<&Device> {
        match self.dispatch_frame(buffer, check_crc) {
            Ok(index) => Ok(&self.devices[index]),
            Err(e) => {
                warn!(error = %e, size = buffer.len(), "Discarded inbound frame");
                Err(e)
            }
        }
    }

    fn dispatch_frame(&mut self, buffer: &[u8], check_crc: bool) -> Result<usize> {
        let frame = Frame::parse(buffer)?;
        let type_name = frame.type_name();
        let device_name = frame.device_name();
        if device_name.is_empty() {
            return Err(IgtlError::InvalidHeader(format!(
                "{} frame has an empty device name",
                type_name
            )));
        }

        if let Some(index) = self.route(type_name, device_name) {
            self.devices[index].apply_inbound(&frame, check_crc)?;
            debug!(device = %self.devices[index].key(), "Dispatched frame");
            return Ok(index);
        }

        let mut device = self.factory.create(type_name, device_name)?;
        device.apply_inbound(&frame, check_crc)?;
        self.insert(device);
        Ok(self.devices.len() - 1)
    }

    fn route(&self, type_name: &str, device_name: &str) -> Option<usize> {
        if self.config.restrict_device_name {
            self.devices
                .iter()
                .position(|d| d.type_name() == type_name && d.device_name() == device_name)
        } else {
            self.devices.iter().position(|d| d.type_name() == type_name)
        }
    }

    fn position(&self, key: &DeviceKey) -> Option<usize> {
        self.devices.iter().position(|d| d.key() == key)
    }

    fn insert(&mut self, device: Device) -> &mut Device {
        let key = device.key().clone();
        self.devices.push(device);
        self.events
            .publish(DeviceEvent::new(key.clone(), DeviceEventKind::Registered));
        info!(device = %key, "Device registered");
        let last = self.devices.len() - 1;
        &mut self.devices[last]
    }

    pub fn device(&self, key: &DeviceKey) -> Option<&Device> {
        self.devices.iter().find(|d| d.key() == key)
    }

    /// Mutable access for local content updates
    ///
    /// Setters mark the device pending; the change event goes out on the
    /// next flush.
    pub fn device_mut(&mut self, key: &DeviceKey) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.key() == key)
    }

    pub fn find(&self, type_name: &str, device_name: &str) -> Option<&Device> {
        self.devices
            .iter()
            .find(|d| d.type_name() == type_name && d.device_name() == device_name)
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Every device of `type_name`, in registration order
    pub fn devices_by_type<'a>(
        &'a self,
        type_name: &'a str,
    ) -> impl Iterator<Item = &'a Device> + 'a {
        self.devices.iter().filter(move |d| d.type_name() == type_name)
    }

    /// First device of `type_name`
    pub fn device_by_type(&self, type_name: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.type_name() == type_name)
    }

    /// First device whose type maps to the host node tag `tag`
    pub fn device_by_mrml_tag(&self, tag: &str) -> Option<&Device> {
        self.devices
            .iter()
            .find(|d| self.factory.node_tag(d.type_name()) == Some(tag))
    }

    /// Complete outbound frame for a device
    pub fn produce_frame(&self, key: &DeviceKey) -> Result<Frame> {
        self.device(key).ok_or_else(|| not_found(key))?.produce_frame()
    }

    pub fn subscribe(&mut self, filter: Option<DeviceKey>) -> EventSubscription {
        self.events.subscribe(filter)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Publish one `ContentModified` per pending device; returns the device count
    pub fn flush_notifications(&mut self) -> usize {
        let mut notified = 0;
        for device in &mut self.devices {
            if device.take_pending() {
                self.events.publish(DeviceEvent::new(
                    device.key().clone(),
                    DeviceEventKind::ContentModified,
                ));
                notified += 1;
            }
        }
        notified
    }

    /// Open an inbox for a transport worker
    pub fn add_connector(&mut self, name: &str) -> FrameSender {
        let (sender, inbox) = FrameInbox::channel(name);
        self.connectors.push(inbox);
        info!(connector = name, "Connector added");
        sender
    }

    /// Close every inbox named `name`; queued frames are dropped
    pub fn remove_connector(&mut self, name: &str) -> bool {
        let before = self.connectors.len();
        self.connectors.retain(|c| {
            if c.name() != name {
                return true;
            }
            let pending = c.stats().pending();
            if pending > 0 {
                warn!(connector = name, pending, "Dropping queued frames");
            }
            false
        });
        let removed = self.connectors.len() != before;
        if removed {
            info!(connector = name, "Connector removed");
        }
        removed
    }

    pub fn connector_stats(&self, name: &str) -> Option<InboxStats> {
        self.connectors
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.stats())
    }

    /// Drain connectors, dispatch their frames and flush notifications
    ///
    /// Each connector contributes at most `max_frames_per_cycle` frames.
    /// Rejected frames are logged and counted, never fatal.
    pub fn call_periodic_handler(&mut self) -> PeriodicReport {
        let max = self.config.max_frames_per_cycle;
        let check_crc = self.config.check_crc;
        let batches: Vec<Vec<Vec<u8>>> =
            self.connectors.iter_mut().map(|c| c.drain(max)).collect();

        let mut report = PeriodicReport::default();
        for buffer in batches.iter().flatten() {
            match self.dispatch_inbound(buffer, check_crc) {
                Ok(_) => report.dispatched += 1,
                Err(_) => report.rejected += 1,
            }
        }
        report.notified = self.flush_notifications();

        if report != PeriodicReport::default() {
            debug!(
                dispatched = report.dispatched,
                rejected = report.rejected,
                notified = report.notified,
                "Periodic handler ran"
            );
        }
        report
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(key: &DeviceKey) -> IgtlError {
    IgtlError::DeviceNotFound {
        type_name: key.type_name.clone(),
        device_name: key.device_name.clone(),
    }
}
