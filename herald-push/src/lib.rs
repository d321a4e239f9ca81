//! # Herald Push
//!
//! Push notification dispatch and device reconciliation.
//!
//! ## Features
//!
//! - **GCM**: legacy cloud messaging JSON API
//! - **FCM**: Firebase cloud messaging JSON API
//! - **APNS**: binary streaming protocol over TLS (`tls` feature)
//! - **Per-application credentials**: targets are grouped by application id
//!   and each group is sent with its own key or certificate
//! - **Reconciliation**: unregistered devices are deactivated and canonical
//!   ids are rotated into the registry after every call
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use herald_push::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(MemoryRegistry::with_devices([Device::fcm("device-token")])?);
//!     let credentials = StaticCredentials::new()
//!         .with_default(Channel::Fcm, Credential::api_key("server-key"));
//!
//!     let dispatcher = Dispatcher::builder()
//!         .registry(registry)
//!         .credentials(Arc::new(credentials))
//!         .build()?;
//!
//!     let message = Message::new("You have a new message!").title("Inbox");
//!     let report = dispatcher.dispatch_active(Channel::Fcm, &message).await?;
//!     println!("delivered to {} devices", report.delivered());
//!     Ok(())
//! }
//! ```
//!
//! ## Error handling
//!
//! Device errors never surface as errors: the device is deactivated and the
//! call carries on. Service errors, transport failures and encoding failures
//! are collected across all credential groups and raised together as a
//! [`DispatchError`] once every registry decision has been applied.

pub mod credentials;
pub mod dispatch;
mod error;
pub mod message;
pub mod payload;
pub mod registry;
pub mod response;
mod target;
pub mod transport;
pub mod wire;

pub use credentials::{Credential, CredentialProvider, StaticCredentials, TargetGroup};
pub use dispatch::{
    BatchFailure, DispatchConfig, DispatchError, DispatchReport, Dispatcher, DispatcherBuilder,
};
pub use error::{
    CredentialError, DeviceErrorKind, EncodingError, PushError, RegistryError, Result,
    ServiceErrorKind, TransportError,
};
pub use message::Message;
pub use payload::Envelope;
pub use registry::{DeviceRegistry, MemoryRegistry};
pub use response::{DispatchResult, Outcome, RegistryDecision, UndeliveredReason};
pub use target::{Channel, Device, Target};
pub use transport::{
    FrameSink, HttpTransport, HttpTransportConfig, JsonRequest, JsonTransport, StreamConnector,
    StreamEndpoint,
};

#[cfg(feature = "tls")]
pub use transport::TlsConnector;

/// Prelude for common imports.
///
/// ```
/// use herald_push::prelude::*;
/// ```
pub mod prelude {
    pub use crate::credentials::{Credential, CredentialProvider, StaticCredentials};
    pub use crate::dispatch::{DispatchConfig, DispatchError, DispatchReport, Dispatcher};
    pub use crate::error::{PushError, Result};
    pub use crate::message::Message;
    pub use crate::registry::{DeviceRegistry, MemoryRegistry};
    pub use crate::response::{Outcome, RegistryDecision};
    pub use crate::target::{Channel, Device, Target};
}
