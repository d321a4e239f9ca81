//! Delivery channels, dispatch targets and registered devices.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Legacy cloud messaging JSON API.
    Gcm,
    /// Firebase cloud messaging JSON API.
    Fcm,
    /// APNS binary streaming protocol.
    Apns,
}

impl Channel {
    /// Channel name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gcm => "gcm",
            Self::Fcm => "fcm",
            Self::Apns => "apns",
        }
    }

    /// Whether the channel speaks the JSON HTTP API.
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Gcm | Self::Fcm)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recipient for one dispatch call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    /// Channel-specific registration id or device token.
    pub registration_id: String,
    /// Application id used to select send credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_id: Option<String>,
}

impl Target {
    /// Create a target using the default credential.
    pub fn new(registration_id: impl Into<String>) -> Self {
        Self {
            registration_id: registration_id.into(),
            application_id: None,
        }
    }

    /// Set the application id.
    pub fn application_id(mut self, application_id: impl Into<String>) -> Self {
        self.application_id = Some(application_id.into());
        self
    }
}

impl From<&str> for Target {
    fn from(registration_id: &str) -> Self {
        Self::new(registration_id)
    }
}

impl From<String> for Target {
    fn from(registration_id: String) -> Self {
        Self::new(registration_id)
    }
}

/// A device record held by a registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Delivery channel.
    pub channel: Channel,
    /// Registration id and application id.
    #[serde(flatten)]
    pub target: Target,
    /// Inactive devices are skipped by active-only listings.
    pub active: bool,
}

impl Device {
    /// Create an active device.
    pub fn new(channel: Channel, target: impl Into<Target>) -> Self {
        Self {
            channel,
            target: target.into(),
            active: true,
        }
    }

    /// Create a GCM device.
    pub fn gcm(registration_id: impl Into<String>) -> Self {
        Self::new(Channel::Gcm, Target::new(registration_id))
    }

    /// Create an FCM device.
    pub fn fcm(registration_id: impl Into<String>) -> Self {
        Self::new(Channel::Fcm, Target::new(registration_id))
    }

    /// Create an APNS device.
    pub fn apns(token: impl Into<String>) -> Self {
        Self::new(Channel::Apns, Target::new(token))
    }

    /// Set the application id.
    pub fn application_id(mut self, application_id: impl Into<String>) -> Self {
        self.target.application_id = Some(application_id.into());
        self
    }

    /// Set the active flag.
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Registration id.
    pub fn registration_id(&self) -> &str {
        &self.target.registration_id
    }
}
