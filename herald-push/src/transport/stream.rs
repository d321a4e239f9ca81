//! Streaming channel connections.

use std::collections::HashMap;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{FrameSink, StreamConnector, StreamEndpoint};
use crate::TransportError;

/// Connections opened during one dispatch call, keyed by endpoint.
///
/// A faulted connection is dropped and never reused. Call
/// [`ConnectionPool::shutdown`] when the call is done.
pub struct ConnectionPool<'a> {
    connector: &'a dyn StreamConnector,
    timeout: Duration,
    connections: HashMap<StreamEndpoint, FrameSink>,
}

impl<'a> ConnectionPool<'a> {
    /// Create an empty pool. `timeout` bounds every connect and write.
    pub fn new(connector: &'a dyn StreamConnector, timeout: Duration) -> Self {
        Self {
            connector,
            timeout,
            connections: HashMap::new(),
        }
    }

    /// Number of open connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connection is open.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Open a connection for `endpoint` unless one is already pooled.
    pub async fn connect(&mut self, endpoint: &StreamEndpoint) -> Result<(), TransportError> {
        if self.connections.contains_key(endpoint) {
            return Ok(());
        }

        debug!(endpoint = %endpoint, "Opening streaming connection");
        let sink = timeout(self.timeout, self.connector.connect(endpoint))
            .await
            .map_err(|_| TransportError::Timeout)??;
        self.connections.insert(endpoint.clone(), sink);
        Ok(())
    }

    /// Write one frame, connecting first if needed.
    ///
    /// On failure the connection is removed from the pool.
    pub async fn send(&mut self, endpoint: &StreamEndpoint, frame: &[u8]) -> Result<(), TransportError> {
        self.connect(endpoint).await?;

        let Some(sink) = self.connections.get_mut(endpoint) else {
            return Err(TransportError::ConnectionLost(format!("{endpoint} not connected")));
        };

        let written = match timeout(self.timeout, write_frame(sink, frame)).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout),
        };

        if let Err(err) = &written {
            warn!(endpoint = %endpoint, error = %err, "Streaming connection faulted");
            self.connections.remove(endpoint);
        }
        written
    }

    /// Shut down every pooled connection.
    pub async fn shutdown(mut self) {
        for (endpoint, mut sink) in self.connections.drain() {
            match timeout(self.timeout, sink.shutdown()).await {
                Ok(Ok(())) => debug!(endpoint = %endpoint, "Streaming connection closed"),
                Ok(Err(err)) => debug!(endpoint = %endpoint, error = %err, "Streaming shutdown failed"),
                Err(_) => debug!(endpoint = %endpoint, "Streaming shutdown timed out"),
            }
        }
    }
}

async fn write_frame(sink: &mut FrameSink, frame: &[u8]) -> Result<(), TransportError> {
    sink.write_all(frame)
        .await
        .map_err(|e| TransportError::ConnectionLost(e.to_string()))?;
    sink.flush()
        .await
        .map_err(|e| TransportError::ConnectionLost(e.to_string()))
}

#[cfg(feature = "tls")]
pub use tls::TlsConnector;

#[cfg(feature = "tls")]
mod tls {
    use async_trait::async_trait;
    use native_tls::Identity;
    use tokio::net::TcpStream;
    use tracing::debug;

    use super::super::{FrameSink, StreamConnector, StreamEndpoint};
    use crate::TransportError;

    /// TLS connector presenting a client certificate.
    ///
    /// The certificate file must hold the PEM certificate chain followed by
    /// a PKCS#8 private key.
    #[derive(Debug, Clone, Default)]
    pub struct TlsConnector {
        accept_invalid_certs: bool,
    }

    impl TlsConnector {
        /// Create a connector verifying the gateway certificate.
        pub fn new() -> Self {
            Self::default()
        }

        /// Skip gateway certificate verification. Only for local gateways.
        pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
            self.accept_invalid_certs = accept;
            self
        }

        async fn identity(&self, endpoint: &StreamEndpoint) -> Result<Identity, TransportError> {
            let pem = tokio::fs::read(&endpoint.certificate).await.map_err(|e| {
                TransportError::Tls(format!("{}: {e}", endpoint.certificate.display()))
            })?;
            Identity::from_pkcs8(&pem, &pem).map_err(|e| TransportError::Tls(e.to_string()))
        }
    }

    #[async_trait]
    impl StreamConnector for TlsConnector {
        async fn connect(&self, endpoint: &StreamEndpoint) -> Result<FrameSink, TransportError> {
            let identity = self.identity(endpoint).await?;
            let connector = native_tls::TlsConnector::builder()
                .identity(identity)
                .danger_accept_invalid_certs(self.accept_invalid_certs)
                .build()
                .map_err(|e| TransportError::Tls(e.to_string()))?;

            let tcp = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
                .await
                .map_err(|e| TransportError::Unreachable(format!("{endpoint}: {e}")))?;

            let stream = tokio_native_tls::TlsConnector::from(connector)
                .connect(&endpoint.host, tcp)
                .await
                .map_err(|e| TransportError::Tls(e.to_string()))?;

            debug!(endpoint = %endpoint, "TLS handshake complete");
            Ok(Box::new(stream))
        }
    }
}
