//! Device registry seam and an in-memory implementation.

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::{Channel, Device, RegistryError, Target};

/// Registry result type.
pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Device registry.
///
/// Mutations must be idempotent: deactivating an inactive or unknown device
/// and rotating an id onto itself are no-ops.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// List a channel's devices as dispatch targets.
    async fn list(&self, channel: Channel, active_only: bool) -> RegistryResult<Vec<Target>>;

    /// Find a device by registration id.
    async fn find(&self, channel: Channel, registration_id: &str)
    -> RegistryResult<Option<Device>>;

    /// Mark a device inactive.
    async fn deactivate(&self, channel: Channel, registration_id: &str) -> RegistryResult<()>;

    /// Replace `old_id` with the canonical `new_id`.
    ///
    /// If an active device already holds `new_id` the old device is
    /// deactivated; otherwise the old device is renamed.
    async fn rotate(&self, channel: Channel, old_id: &str, new_id: &str) -> RegistryResult<()>;
}

/// In-memory device registry.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    devices: RwLock<Vec<Device>>,
}

impl MemoryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the given devices.
    pub fn with_devices(devices: impl IntoIterator<Item = Device>) -> RegistryResult<Self> {
        let registry = Self::new();
        for device in devices {
            registry.register(device)?;
        }
        Ok(registry)
    }

    /// Add a device. Registration ids are unique per channel.
    pub fn register(&self, device: Device) -> RegistryResult<()> {
        let mut devices = self.devices.write();
        if devices
            .iter()
            .any(|d| d.channel == device.channel && d.registration_id() == device.registration_id())
        {
            return Err(RegistryError::Duplicate(device.target.registration_id));
        }
        devices.push(device);
        Ok(())
    }

    /// Snapshot of a device.
    pub fn get(&self, channel: Channel, registration_id: &str) -> Option<Device> {
        self.devices
            .read()
            .iter()
            .find(|d| d.channel == channel && d.registration_id() == registration_id)
            .cloned()
    }

    /// Whether a device exists and is active.
    pub fn is_active(&self, channel: Channel, registration_id: &str) -> bool {
        self.get(channel, registration_id)
            .is_some_and(|device| device.active)
    }

    /// Whether a device exists, active or not.
    pub fn contains(&self, channel: Channel, registration_id: &str) -> bool {
        self.get(channel, registration_id).is_some()
    }

    /// Registration ids for a channel, in insertion order.
    pub fn registration_ids(&self, channel: Channel) -> Vec<String> {
        self.devices
            .read()
            .iter()
            .filter(|d| d.channel == channel)
            .map(|d| d.target.registration_id.clone())
            .collect()
    }

    /// Number of devices across all channels.
    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    /// Whether the registry holds no devices.
    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}

#[async_trait]
impl DeviceRegistry for MemoryRegistry {
    async fn list(&self, channel: Channel, active_only: bool) -> RegistryResult<Vec<Target>> {
        Ok(self
            .devices
            .read()
            .iter()
            .filter(|d| d.channel == channel && (d.active || !active_only))
            .map(|d| d.target.clone())
            .collect())
    }

    async fn find(
        &self,
        channel: Channel,
        registration_id: &str,
    ) -> RegistryResult<Option<Device>> {
        Ok(self.get(channel, registration_id))
    }

    async fn deactivate(&self, channel: Channel, registration_id: &str) -> RegistryResult<()> {
        let mut devices = self.devices.write();
        if let Some(device) = devices
            .iter_mut()
            .find(|d| d.channel == channel && d.registration_id() == registration_id)
        {
            device.active = false;
            debug!(channel = %channel, registration_id, "Device deactivated");
        }
        Ok(())
    }

    async fn rotate(&self, channel: Channel, old_id: &str, new_id: &str) -> RegistryResult<()> {
        if old_id == new_id {
            return Ok(());
        }

        let mut devices = self.devices.write();
        let Some(old_index) = devices
            .iter()
            .position(|d| d.channel == channel && d.registration_id() == old_id)
        else {
            return Ok(());
        };
        let new_index = devices
            .iter()
            .position(|d| d.channel == channel && d.registration_id() == new_id);

        match new_index {
            Some(index) if devices[index].active => {
                devices[old_index].active = false;
                debug!(channel = %channel, old_id, new_id, "Canonical id already registered, old device deactivated");
            }
            stale => {
                devices[old_index].target.registration_id = new_id.to_string();
                if let Some(stale_index) = stale {
                    let removed = devices.remove(stale_index);
                    debug!(
                        channel = %channel,
                        registration_id = removed.registration_id(),
                        application_id = removed.target.application_id.as_deref(),
                        "Inactive record holding the canonical id removed"
                    );
                }
                debug!(channel = %channel, old_id, new_id, "Device renamed to canonical id");
            }
        }
        Ok(())
    }
}
