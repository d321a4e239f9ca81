// Recording transports and registries for testing

use async_trait::async_trait;
use herald_push::registry::RegistryResult;
use herald_push::{
    Channel, Device, DeviceRegistry, FrameSink, JsonRequest, JsonTransport, MemoryRegistry,
    RegistryError, StreamConnector, StreamEndpoint, Target, TransportError,
};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

type Scripted = std::result::Result<Vec<u8>, TransportError>;

/// JSON transport that records every request and answers from a script.
///
/// Once the script runs out the fallback answer is used; without a fallback
/// the transport reports the service as unreachable.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    requests: Arc<Mutex<Vec<JsonRequest>>>,
    script: Arc<Mutex<VecDeque<Scripted>>>,
    fallback: Arc<Mutex<Option<Scripted>>>,
}

impl RecordingTransport {
    /// Create a transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response body.
    pub fn respond(self, body: impl Into<String>) -> Self {
        self.script.lock().push_back(Ok(body.into().into_bytes()));
        self
    }

    /// Queue a transport failure.
    pub fn fail(self, error: TransportError) -> Self {
        self.script.lock().push_back(Err(error));
        self
    }

    /// Answer every unscripted request with `body`.
    pub fn always(self, body: impl Into<String>) -> Self {
        *self.fallback.lock() = Some(Ok(body.into().into_bytes()));
        self
    }

    /// Number of requests received.
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<JsonRequest> {
        self.requests.lock().clone()
    }

    /// Request bodies as strings.
    pub fn bodies(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|r| String::from_utf8_lossy(&r.body).into_owned())
            .collect()
    }

    /// API keys used, in request order.
    pub fn api_keys(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .map(|r| r.api_key.clone())
            .collect()
    }

    /// Clear recorded requests.
    pub fn clear(&self) {
        self.requests.lock().clear();
    }
}

#[async_trait]
impl JsonTransport for RecordingTransport {
    async fn post(&self, request: JsonRequest) -> std::result::Result<Vec<u8>, TransportError> {
        self.requests.lock().push(request);

        if let Some(next) = self.script.lock().pop_front() {
            return next;
        }
        self.fallback
            .lock()
            .clone()
            .unwrap_or_else(|| Err(TransportError::Unreachable("no scripted response".to_string())))
    }
}

#[derive(Default)]
struct ConnectorState {
    endpoints: Vec<StreamEndpoint>,
    written: Vec<u8>,
    frames_written: usize,
    shutdowns: usize,
}

/// Streaming connector that records connections and written bytes.
#[derive(Clone, Default)]
pub struct RecordingConnector {
    state: Arc<Mutex<ConnectorState>>,
    fail_after: Option<usize>,
    refuse: Option<TransportError>,
}

impl RecordingConnector {
    /// Create a connector that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every write after `frames` successful writes across all connections.
    pub fn fail_after(mut self, frames: usize) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// Refuse every connection attempt.
    pub fn refuse(mut self, error: TransportError) -> Self {
        self.refuse = Some(error);
        self
    }

    /// Endpoints connected to, in order.
    pub fn endpoints(&self) -> Vec<StreamEndpoint> {
        self.state.lock().endpoints.clone()
    }

    /// Number of connections opened.
    pub fn connect_count(&self) -> usize {
        self.state.lock().endpoints.len()
    }

    /// Number of connections shut down cleanly.
    pub fn shutdown_count(&self) -> usize {
        self.state.lock().shutdowns
    }

    /// Every byte written, across all connections.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().written.clone()
    }
}

#[async_trait]
impl StreamConnector for RecordingConnector {
    async fn connect(&self, endpoint: &StreamEndpoint) -> std::result::Result<FrameSink, TransportError> {
        if let Some(error) = &self.refuse {
            return Err(error.clone());
        }
        self.state.lock().endpoints.push(endpoint.clone());
        Ok(Box::new(RecordingSink {
            state: self.state.clone(),
            fail_after: self.fail_after,
        }))
    }
}

struct RecordingSink {
    state: Arc<Mutex<ConnectorState>>,
    fail_after: Option<usize>,
}

impl AsyncWrite for RecordingSink {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let mut state = self.state.lock();
        if self.fail_after.is_some_and(|limit| state.frames_written >= limit) {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        state.written.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        // Frames are written with one `write_all` followed by one flush.
        self.state.lock().frames_written += 1;
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.state.lock().shutdowns += 1;
        Poll::Ready(Ok(()))
    }
}

/// Registry wrapper that fails mutations for chosen registration ids.
pub struct FaultyRegistry {
    inner: Arc<MemoryRegistry>,
    failing: Mutex<HashSet<String>>,
}

impl FaultyRegistry {
    /// Wrap a memory registry.
    pub fn new(inner: Arc<MemoryRegistry>) -> Self {
        Self {
            inner,
            failing: Mutex::new(HashSet::new()),
        }
    }

    /// Fail deactivations and rotations of `registration_id`.
    pub fn fail_on(self, registration_id: impl Into<String>) -> Self {
        self.failing.lock().insert(registration_id.into());
        self
    }

    fn check(&self, registration_id: &str) -> RegistryResult<()> {
        if self.failing.lock().contains(registration_id) {
            return Err(RegistryError::Backend(format!(
                "write rejected for {registration_id}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceRegistry for FaultyRegistry {
    async fn list(&self, channel: Channel, active_only: bool) -> RegistryResult<Vec<Target>> {
        self.inner.list(channel, active_only).await
    }

    async fn find(&self, channel: Channel, registration_id: &str) -> RegistryResult<Option<Device>> {
        self.inner.find(channel, registration_id).await
    }

    async fn deactivate(&self, channel: Channel, registration_id: &str) -> RegistryResult<()> {
        self.check(registration_id)?;
        self.inner.deactivate(channel, registration_id).await
    }

    async fn rotate(&self, channel: Channel, old_id: &str, new_id: &str) -> RegistryResult<()> {
        self.check(old_id)?;
        self.inner.rotate(channel, old_id, new_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tokio::io::AsyncWriteExt;

    fn request(body: &str) -> JsonRequest {
        JsonRequest {
            channel: Channel::Gcm,
            api_key: "abc".to_string(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_transport_script_then_fallback() {
        let transport = RecordingTransport::new()
            .respond("first")
            .fail(TransportError::Timeout)
            .always("fallback");

        assert_eq!(transport.post(request("1")).await.unwrap(), b"first");
        assert_eq!(transport.post(request("2")).await, Err(TransportError::Timeout));
        assert_eq!(transport.post(request("3")).await.unwrap(), b"fallback");
        assert_eq!(transport.bodies(), vec!["1", "2", "3"]);
        assert_eq!(transport.api_keys(), vec!["abc"; 3]);
    }

    #[tokio::test]
    async fn test_transport_without_script() {
        let transport = RecordingTransport::new();
        assert!(matches!(
            transport.post(request("x")).await,
            Err(TransportError::Unreachable(_))
        ));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_connector_fail_after() {
        let connector = RecordingConnector::new().fail_after(1);
        let endpoint = StreamEndpoint {
            certificate: PathBuf::from("/certs/apns.pem"),
            host: "localhost".to_string(),
            port: 2195,
        };

        let mut sink = connector.connect(&endpoint).await.unwrap();
        sink.write_all(b"frame").await.unwrap();
        sink.flush().await.unwrap();
        assert!(sink.write_all(b"next").await.is_err());

        assert_eq!(connector.written(), b"frame");
        assert_eq!(connector.endpoints(), vec![endpoint]);
    }

    #[tokio::test]
    async fn test_faulty_registry() {
        let inner = Arc::new(MemoryRegistry::with_devices([Device::gcm("a"), Device::gcm("b")]).unwrap());
        let registry = FaultyRegistry::new(inner.clone()).fail_on("a");

        assert!(registry.deactivate(Channel::Gcm, "a").await.is_err());
        registry.deactivate(Channel::Gcm, "b").await.unwrap();

        assert!(inner.is_active(Channel::Gcm, "a"));
        assert!(!inner.is_active(Channel::Gcm, "b"));
    }
}
