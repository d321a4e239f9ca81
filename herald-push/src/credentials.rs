//! Send credentials and per-credential target grouping.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::{Channel, CredentialError, Target};

/// Default APNS gateway host.
pub const APNS_HOST: &str = "gateway.push.apple.com";

/// APNS sandbox gateway host.
pub const APNS_SANDBOX_HOST: &str = "gateway.sandbox.push.apple.com";

/// Default APNS gateway port.
pub const APNS_PORT: u16 = 2195;

/// Credential material for one channel/application pair.
///
/// JSON channels need `api_key`; the streaming channel needs
/// `certificate`, `host` and `port`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Credential {
    /// Server API key.
    pub api_key: Option<String>,
    /// PEM file holding the client certificate and its private key.
    pub certificate: Option<PathBuf>,
    /// Gateway host.
    pub host: Option<String>,
    /// Gateway port.
    pub port: Option<u16>,
}

impl Credential {
    /// API key credential for the JSON channels.
    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
            ..Self::default()
        }
    }

    /// Certificate credential for the streaming channel, using the default gateway.
    pub fn certificate(path: impl Into<PathBuf>) -> Self {
        Self {
            certificate: Some(path.into()),
            host: Some(APNS_HOST.to_string()),
            port: Some(APNS_PORT),
            ..Self::default()
        }
    }

    /// Override the gateway host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Override the gateway port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// The API key, or an error naming the channel.
    pub fn require_api_key(&self, channel: Channel) -> Result<&str, CredentialError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| incomplete(channel, "api_key"))
    }

    /// Certificate path, host and port, or an error naming the missing field.
    pub fn require_endpoint(&self, channel: Channel) -> Result<(&Path, &str, u16), CredentialError> {
        let certificate = self
            .certificate
            .as_deref()
            .ok_or_else(|| incomplete(channel, "certificate"))?;
        let host = self.host.as_deref().ok_or_else(|| incomplete(channel, "host"))?;
        let port = self.port.ok_or_else(|| incomplete(channel, "port"))?;
        Ok((certificate, host, port))
    }
}

fn incomplete(channel: Channel, field: &'static str) -> CredentialError {
    CredentialError::Incomplete {
        channel: channel.to_string(),
        field,
    }
}

/// Resolves credential material by application id.
pub trait CredentialProvider: Send + Sync {
    /// Resolve the credential for a channel. `None` selects the default credential.
    fn resolve(
        &self,
        channel: Channel,
        application_id: Option<&str>,
    ) -> Result<Credential, CredentialError>;
}

/// Fixed credential table.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    entries: HashMap<(Channel, Option<String>), Credential>,
}

impl StaticCredentials {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default credential for a channel.
    pub fn with_default(mut self, channel: Channel, credential: Credential) -> Self {
        self.entries.insert((channel, None), credential);
        self
    }

    /// Set the credential for an application id.
    pub fn with_application(
        mut self,
        channel: Channel,
        application_id: impl Into<String>,
        credential: Credential,
    ) -> Self {
        self.entries
            .insert((channel, Some(application_id.into())), credential);
        self
    }
}

impl CredentialProvider for StaticCredentials {
    fn resolve(
        &self,
        channel: Channel,
        application_id: Option<&str>,
    ) -> Result<Credential, CredentialError> {
        self.entries
            .get(&(channel, application_id.map(str::to_string)))
            .cloned()
            .ok_or_else(|| CredentialError::NotFound {
                channel: channel.to_string(),
                application_id: application_id.map(str::to_string),
            })
    }
}

/// Targets sharing one application id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroup {
    /// Shared application id.
    pub application_id: Option<String>,
    /// Members in original relative order.
    pub targets: Vec<Target>,
}

impl TargetGroup {
    /// Registration ids of the members.
    pub fn registration_ids(&self) -> Vec<&str> {
        self.targets
            .iter()
            .map(|t| t.registration_id.as_str())
            .collect()
    }
}

/// A target group with its resolved credential.
#[derive(Debug, Clone)]
pub struct CredentialGroup {
    /// The grouped targets.
    pub group: TargetGroup,
    /// Resolved credential, or the reason none could be resolved.
    pub credential: Result<Credential, CredentialError>,
}

/// Partition targets by application id.
///
/// Groups are emitted in first-occurrence order of their application id.
pub fn group_targets(targets: &[Target]) -> Vec<TargetGroup> {
    let mut groups: Vec<TargetGroup> = Vec::new();
    let mut index: HashMap<Option<&str>, usize> = HashMap::new();

    for target in targets {
        let key = target.application_id.as_deref();
        let slot = *index.entry(key).or_insert_with(|| {
            groups.push(TargetGroup {
                application_id: target.application_id.clone(),
                targets: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].targets.push(target.clone());
    }

    groups
}

/// Group targets and resolve each group's credential.
pub fn resolve_groups(
    channel: Channel,
    targets: &[Target],
    provider: &dyn CredentialProvider,
) -> Vec<CredentialGroup> {
    group_targets(targets)
        .into_iter()
        .map(|group| {
            let credential = provider.resolve(channel, group.application_id.as_deref());
            CredentialGroup { group, credential }
        })
        .collect()
}
