//! Push dispatch error types.
//!
//! Errors are split by blast radius:
//!
//! - [`EncodingError`] affects a single target.
//! - [`TransportError`] affects the remaining work of one credential group.
//! - [`DeviceErrorKind`] is reported per recipient and absorbed into a
//!   registry decision.
//! - [`ServiceErrorKind`] is reported per recipient and raised, aggregated,
//!   once the whole call has finished.

use std::fmt;

use thiserror::Error;

use crate::dispatch::DispatchError;

/// Result type for push operations.
pub type Result<T> = std::result::Result<T, PushError>;

/// Top-level push error.
#[derive(Debug, Error)]
pub enum PushError {
    /// Invalid or incomplete configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Credential lookup failed.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Registry operation failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Payload could not be encoded.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// Transport-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A dispatch call finished with batch-level failures.
    #[error(transparent)]
    Dispatch(#[from] Box<DispatchError>),
}

/// Payload encoding errors. Fatal for a single target only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// Serialized payload exceeds the channel's frame ceiling.
    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge {
        /// Actual size.
        size: usize,
        /// Maximum allowed size.
        limit: usize,
    },

    /// Device token is not a valid hex string or is too long to frame.
    #[error("Invalid device token: {0}")]
    InvalidToken(String),
}

/// Transport-level errors. Fatal for the remaining work of a credential group.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The service could not be reached.
    #[error("Service unreachable: {0}")]
    Unreachable(String),

    /// The call exceeded the configured timeout.
    #[error("Operation timed out")]
    Timeout,

    /// The service answered with a non-success status.
    #[error("Service unavailable: HTTP {status}")]
    ServiceUnavailable {
        /// HTTP status code.
        status: u16,
    },

    /// The service answered with a body that could not be understood.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// No credential is configured for the group's application id.
    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    /// A streaming connection failed mid-batch.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// TLS setup or handshake failed.
    #[error("TLS error: {0}")]
    Tls(String),
}

impl TransportError {
    /// Check if retrying the same call later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unreachable(_) | Self::Timeout | Self::ConnectionLost(_) => true,
            Self::ServiceUnavailable { status } => *status >= 500 || *status == 429,
            Self::MalformedResponse(_) | Self::CredentialNotFound(_) | Self::Tls(_) => false,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::ServiceUnavailable {
                status: status.as_u16(),
            }
        } else if err.is_decode() || err.is_body() {
            Self::MalformedResponse(err.to_string())
        } else {
            Self::Unreachable(err.to_string())
        }
    }
}

impl From<CredentialError> for TransportError {
    fn from(err: CredentialError) -> Self {
        Self::CredentialNotFound(err.to_string())
    }
}

/// Credential resolution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// No mapping exists for the application id.
    #[error("no {channel} credential configured for application {application_id:?}")]
    NotFound {
        /// Channel the credential was requested for.
        channel: String,
        /// Requested application id, `None` for the default credential.
        application_id: Option<String>,
    },

    /// A credential exists but lacks a field the channel needs.
    #[error("{channel} credential is missing {field}")]
    Incomplete {
        /// Channel the credential was requested for.
        channel: String,
        /// Missing field name.
        field: &'static str,
    },
}

/// Registry operation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Backend storage failure.
    #[error("Registry backend error: {0}")]
    Backend(String),

    /// A device with this registration id already exists.
    #[error("Device already registered: {0}")]
    Duplicate(String),
}

/// Device-specific error kinds. The device is deactivated, nothing is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceErrorKind {
    /// The token is no longer registered with the service.
    Unregistered,
    /// The token is not a valid registration id.
    InvalidIdentifier,
}

impl DeviceErrorKind {
    /// Wire code reported by the service.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unregistered => "NotRegistered",
            Self::InvalidIdentifier => "InvalidRegistration",
        }
    }

    /// Map a wire error code to a device error kind.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "NotRegistered" => Some(Self::Unregistered),
            "InvalidRegistration" => Some(Self::InvalidIdentifier),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Service-level error kinds. Not device specific and raised after the call.
///
/// Codes the service may add later land in [`ServiceErrorKind::Unknown`] and
/// are treated as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServiceErrorKind {
    /// The sender is not allowed to message this registration id.
    SenderMismatch,
    /// The request did not carry a registration id.
    MissingRegistration,
    /// The payload exceeded the service limit.
    MessageTooBig,
    /// The payload used a reserved data key.
    InvalidDataKey,
    /// The time to live was out of range.
    InvalidTtl,
    /// The service timed out processing the message.
    Unavailable,
    /// The service hit an internal error.
    InternalServerError,
    /// Too many messages to one device.
    DeviceMessageRateExceeded,
    /// Any other error code.
    Unknown(String),
}

impl ServiceErrorKind {
    /// Map a wire error code to a service error kind.
    pub fn from_code(code: &str) -> Self {
        match code {
            "MismatchSenderId" => Self::SenderMismatch,
            "MissingRegistration" => Self::MissingRegistration,
            "MessageTooBig" => Self::MessageTooBig,
            "InvalidDataKey" => Self::InvalidDataKey,
            "InvalidTtl" => Self::InvalidTtl,
            "Unavailable" => Self::Unavailable,
            "InternalServerError" => Self::InternalServerError,
            "DeviceMessageRateExceeded" => Self::DeviceMessageRateExceeded,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Wire code reported by the service.
    pub fn code(&self) -> &str {
        match self {
            Self::SenderMismatch => "MismatchSenderId",
            Self::MissingRegistration => "MissingRegistration",
            Self::MessageTooBig => "MessageTooBig",
            Self::InvalidDataKey => "InvalidDataKey",
            Self::InvalidTtl => "InvalidTtl",
            Self::Unavailable => "Unavailable",
            Self::InternalServerError => "InternalServerError",
            Self::DeviceMessageRateExceeded => "DeviceMessageRateExceeded",
            Self::Unknown(code) => code,
        }
    }
}

impl fmt::Display for ServiceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
