//! Transport seams for the JSON and streaming channels.

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::{Channel, Credential, CredentialError, TransportError};

mod http;
mod stream;

pub use http::{FCM_POST_URL, GCM_POST_URL, HttpTransport, HttpTransportConfig};
pub use stream::ConnectionPool;

#[cfg(feature = "tls")]
pub use stream::TlsConnector;

/// One JSON channel POST.
#[derive(Clone, PartialEq, Eq)]
pub struct JsonRequest {
    /// Channel selecting the endpoint.
    pub channel: Channel,
    /// Server API key sent as `Authorization: key=<api_key>`.
    pub api_key: String,
    /// Encoded request body.
    pub body: Vec<u8>,
}

impl fmt::Debug for JsonRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsonRequest")
            .field("channel", &self.channel)
            .field("api_key", &"<redacted>")
            .field("body", &String::from_utf8_lossy(&self.body))
            .finish()
    }
}

/// HTTP transport for the JSON channels.
#[async_trait]
pub trait JsonTransport: Send + Sync {
    /// POST a request and return the raw response body of a 2xx answer.
    async fn post(&self, request: JsonRequest) -> Result<Vec<u8>, TransportError>;
}

/// Writable half of a streaming connection.
pub type FrameSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Where and how to open a streaming connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamEndpoint {
    /// PEM file holding the client certificate and private key.
    pub certificate: PathBuf,
    /// Gateway host.
    pub host: String,
    /// Gateway port.
    pub port: u16,
}

impl StreamEndpoint {
    /// Build an endpoint from a resolved credential.
    pub fn from_credential(channel: Channel, credential: &Credential) -> Result<Self, CredentialError> {
        let (certificate, host, port) = credential.require_endpoint(channel)?;
        Ok(Self {
            certificate: certificate.to_path_buf(),
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for StreamEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Opens streaming connections.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    /// Connect and complete the TLS handshake.
    async fn connect(&self, endpoint: &StreamEndpoint) -> Result<FrameSink, TransportError>;
}
