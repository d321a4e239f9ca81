//! Dispatch orchestration.
//!
//! A dispatch call builds one envelope, groups the targets by application
//! id, sends each group with its own credential, classifies every
//! recipient's outcome and applies the resulting registry decisions. Groups
//! are sent one after another; a failing group never stops the others.
//! Every batch-level failure is collected into a single [`DispatchError`]
//! that is raised only after all decisions have been applied.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::credentials::{CredentialGroup, resolve_groups};
use crate::payload::{Envelope, build_envelope};
use crate::registry::DeviceRegistry;
use crate::response::{DispatchResult, Outcome, RegistryDecision, UndeliveredReason, process_response};
use crate::transport::{
    ConnectionPool, HttpTransport, HttpTransportConfig, JsonRequest, JsonTransport,
    StreamConnector, StreamEndpoint,
};
use crate::wire::{DEFAULT_MAX_FRAME_PAYLOAD, FrameOptions, encode_frame, encode_json};
use crate::{
    Channel, CredentialProvider, EncodingError, Message, PushError, RegistryError, Result,
    ServiceErrorKind, Target, TransportError,
};

/// Maximum recipients per JSON request accepted by the service.
pub const DEFAULT_MAX_RECIPIENTS: usize = 1000;

/// Dispatch tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Bound on every transport call (POST, connect, frame write).
    pub timeout: Duration,
    /// Recipients per JSON request.
    pub max_recipients: usize,
    /// Streaming payload ceiling in bytes.
    pub max_frame_payload: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_recipients: DEFAULT_MAX_RECIPIENTS,
            max_frame_payload: DEFAULT_MAX_FRAME_PAYLOAD,
        }
    }
}

impl DispatchConfig {
    /// Set the transport timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the recipients per JSON request. Zero is treated as one.
    pub fn max_recipients(mut self, max: usize) -> Self {
        self.max_recipients = max;
        self
    }

    /// Set the streaming payload ceiling.
    pub fn max_frame_payload(mut self, max: usize) -> Self {
        self.max_frame_payload = max;
        self
    }
}

/// Outcome of a dispatch call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// One result per target, in credential group order.
    pub results: Vec<DispatchResult>,
    /// Registry decisions that were applied successfully.
    pub decisions: Vec<RegistryDecision>,
}

impl DispatchReport {
    /// Whether the call had no targets.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Outcome of the first result for a registration id.
    pub fn outcome(&self, registration_id: &str) -> Option<&Outcome> {
        self.results
            .iter()
            .find(|r| r.registration_id() == registration_id)
            .map(|r| &r.outcome)
    }

    /// Number of targets accepted by the service.
    pub fn delivered(&self) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome.is_delivered())
            .count()
    }
}

/// One batch-level failure collected during a dispatch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchFailure {
    /// The service rejected a recipient with a non-device error.
    Service {
        /// Offending recipient.
        target: Target,
        /// Error reported by the service.
        kind: ServiceErrorKind,
    },
    /// The payload for one recipient could not be encoded.
    Encoding {
        /// Affected recipient.
        target: Target,
        /// Encoding failure.
        error: EncodingError,
    },
    /// A credential group's remaining work failed.
    Transport {
        /// Group application id.
        application_id: Option<String>,
        /// Recipients left undelivered.
        registration_ids: Vec<String>,
        /// Transport failure.
        error: TransportError,
    },
    /// A registry decision could not be applied.
    Registry {
        /// Decision that failed.
        decision: RegistryDecision,
        /// Registry failure.
        error: RegistryError,
    },
}

impl fmt::Display for BatchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service { target, kind } => write!(f, "{}: {kind}", target.registration_id),
            Self::Encoding { target, error } => write!(f, "{}: {error}", target.registration_id),
            Self::Transport {
                application_id,
                registration_ids,
                error,
            } => write!(
                f,
                "group {} ({} targets): {error}",
                application_id.as_deref().unwrap_or("default"),
                registration_ids.len()
            ),
            Self::Registry { decision, error } => write!(f, "{decision:?}: {error}"),
        }
    }
}

fn summarize(failures: &[BatchFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Aggregated failure of a dispatch call.
///
/// Raised after every group was attempted and every registry decision was
/// applied. Carries the full report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("dispatch finished with {} failure(s): {}", .failures.len(), summarize(.failures))]
pub struct DispatchError {
    /// Every failure, in the order it was observed.
    pub failures: Vec<BatchFailure>,
    /// Results and applied decisions.
    pub report: DispatchReport,
}

impl DispatchError {
    /// Recipients rejected with a service error.
    pub fn service_errors(&self) -> impl Iterator<Item = (&Target, &ServiceErrorKind)> {
        self.failures.iter().filter_map(|f| match f {
            BatchFailure::Service { target, kind } => Some((target, kind)),
            _ => None,
        })
    }

    /// Group-level transport failures.
    pub fn transport_errors(&self) -> impl Iterator<Item = &TransportError> {
        self.failures.iter().filter_map(|f| match f {
            BatchFailure::Transport { error, .. } => Some(error),
            _ => None,
        })
    }

    /// Whether the same call could succeed later.
    pub fn is_retryable(&self) -> bool {
        !self.failures.is_empty()
            && self.failures.iter().all(|f| match f {
                BatchFailure::Transport { error, .. } => error.is_retryable(),
                BatchFailure::Service { kind, .. } => matches!(
                    kind,
                    ServiceErrorKind::Unavailable | ServiceErrorKind::InternalServerError
                ),
                BatchFailure::Encoding { .. } | BatchFailure::Registry { .. } => false,
            })
    }
}

impl From<DispatchError> for PushError {
    fn from(err: DispatchError) -> Self {
        Self::Dispatch(Box::new(err))
    }
}

/// Per-call accumulator.
#[derive(Default)]
struct Run {
    results: Vec<DispatchResult>,
    failures: Vec<BatchFailure>,
}

impl Run {
    fn record(&mut self, target: &Target, outcome: Outcome) {
        self.results.push(DispatchResult {
            target: target.clone(),
            outcome,
        });
    }

    /// Mark a group's remaining targets undelivered.
    fn fail_group(&mut self, application_id: Option<&str>, remaining: &[Target], error: TransportError) {
        warn!(
            application_id = application_id.unwrap_or("default"),
            targets = remaining.len(),
            error = %error,
            "Credential group failed"
        );
        for target in remaining {
            self.record(target, Outcome::Undelivered(UndeliveredReason::Transport(error.clone())));
        }
        self.failures.push(BatchFailure::Transport {
            application_id: application_id.map(str::to_string),
            registration_ids: remaining.iter().map(|t| t.registration_id.clone()).collect(),
            error,
        });
    }
}

/// Push dispatcher.
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use herald_push::prelude::*;
///
/// let dispatcher = Dispatcher::builder()
///     .registry(Arc::new(MemoryRegistry::new()))
///     .credentials(Arc::new(
///         StaticCredentials::new().with_default(Channel::Fcm, Credential::api_key("key")),
///     ))
///     .build()?;
///
/// let report = dispatcher
///     .dispatch(Channel::Fcm, &["abc".into()], &Message::new("Hello world"))
///     .await?;
/// ```
pub struct Dispatcher {
    registry: Arc<dyn DeviceRegistry>,
    credentials: Arc<dyn CredentialProvider>,
    json: Arc<dyn JsonTransport>,
    stream: Option<Arc<dyn StreamConnector>>,
    config: DispatchConfig,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("streaming", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a builder.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Dispatch configuration.
    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Send `message` to every active device of `channel` in the registry.
    pub async fn dispatch_active(&self, channel: Channel, message: &Message) -> Result<DispatchReport> {
        let targets = self.registry.list(channel, true).await?;
        Ok(self.dispatch(channel, &targets, message).await?)
    }

    /// Send `message` to `targets` and reconcile the registry.
    ///
    /// Zero targets is not an error and makes no transport call.
    pub async fn dispatch(
        &self,
        channel: Channel,
        targets: &[Target],
        message: &Message,
    ) -> std::result::Result<DispatchReport, DispatchError> {
        if targets.is_empty() {
            debug!(channel = %channel, "No targets, nothing to dispatch");
            return Ok(DispatchReport::default());
        }

        let envelope = build_envelope(channel, message);
        let groups = resolve_groups(channel, targets, self.credentials.as_ref());
        info!(channel = %channel, targets = targets.len(), groups = groups.len(), "Dispatching push message");

        let mut run = Run::default();
        if channel.is_json() {
            self.send_json(channel, &envelope, groups, &mut run).await;
        } else {
            self.send_stream(channel, &envelope, message, groups, &mut run).await;
        }

        let decisions = self.apply_decisions(channel, &mut run).await;

        let mut failures = Vec::new();
        for result in &run.results {
            match &result.outcome {
                Outcome::ServiceError(kind) => failures.push(BatchFailure::Service {
                    target: result.target.clone(),
                    kind: kind.clone(),
                }),
                Outcome::Undelivered(UndeliveredReason::Encoding(error)) => {
                    failures.push(BatchFailure::Encoding {
                        target: result.target.clone(),
                        error: error.clone(),
                    })
                }
                _ => {}
            }
        }
        failures.append(&mut run.failures);

        let report = DispatchReport {
            results: run.results,
            decisions,
        };
        if failures.is_empty() {
            debug!(channel = %channel, delivered = report.delivered(), "Dispatch complete");
            Ok(report)
        } else {
            warn!(channel = %channel, failures = failures.len(), "Dispatch finished with failures");
            Err(DispatchError { failures, report })
        }
    }

    async fn send_json(
        &self,
        channel: Channel,
        envelope: &Envelope,
        groups: Vec<CredentialGroup>,
        run: &mut Run,
    ) {
        let chunk_size = self.config.max_recipients.max(1);

        for CredentialGroup { group, credential } in groups {
            let application_id = group.application_id.as_deref();
            let api_key = match credential.and_then(|c| c.require_api_key(channel).map(str::to_string)) {
                Ok(key) => key,
                Err(err) => {
                    run.fail_group(application_id, &group.targets, err.into());
                    continue;
                }
            };

            for (index, chunk) in group.targets.chunks(chunk_size).enumerate() {
                let ids: Vec<&str> = chunk.iter().map(|t| t.registration_id.as_str()).collect();
                let request = JsonRequest {
                    channel,
                    api_key: api_key.clone(),
                    body: encode_json(envelope, &ids),
                };
                debug!(channel = %channel, recipients = chunk.len(), "Sending JSON batch");

                let processed = match timeout(self.config.timeout, self.json.post(request)).await {
                    Ok(raw) => raw.and_then(|raw| process_response(chunk, &raw)),
                    Err(_) => Err(TransportError::Timeout),
                };

                match processed {
                    Ok(batch) => run.results.extend(batch.results),
                    Err(err) => {
                        run.fail_group(application_id, &group.targets[index * chunk_size..], err);
                        break;
                    }
                }
            }
        }
    }

    async fn send_stream(
        &self,
        channel: Channel,
        envelope: &Envelope,
        message: &Message,
        groups: Vec<CredentialGroup>,
        run: &mut Run,
    ) {
        let Some(connector) = self.stream.as_deref() else {
            for CredentialGroup { group, .. } in groups {
                let error = TransportError::Tls("streaming transport not configured".to_string());
                run.fail_group(group.application_id.as_deref(), &group.targets, error);
            }
            return;
        };

        let options = FrameOptions::from_message(message, SystemTime::now());
        let mut pool = ConnectionPool::new(connector, self.config.timeout);

        for CredentialGroup { group, credential } in groups {
            let application_id = group.application_id.as_deref();
            let endpoint = match credential.and_then(|c| StreamEndpoint::from_credential(channel, &c)) {
                Ok(endpoint) => endpoint,
                Err(err) => {
                    run.fail_group(application_id, &group.targets, err.into());
                    continue;
                }
            };

            for (index, target) in group.targets.iter().enumerate() {
                let frame = match encode_frame(
                    &target.registration_id,
                    envelope,
                    options,
                    self.config.max_frame_payload,
                ) {
                    Ok(frame) => frame,
                    Err(err) => {
                        warn!(registration_id = %target.registration_id, error = %err, "Frame encoding failed");
                        run.record(target, Outcome::Undelivered(UndeliveredReason::Encoding(err)));
                        continue;
                    }
                };

                match pool.send(&endpoint, &frame).await {
                    Ok(()) => {
                        debug!(endpoint = %endpoint, registration_id = %target.registration_id, "Frame written");
                        run.record(target, Outcome::Delivered { message_id: None });
                    }
                    Err(err) => {
                        run.fail_group(application_id, &group.targets[index..], err);
                        break;
                    }
                }
            }
        }

        pool.shutdown().await;
    }

    /// Apply every non-noop decision once, in result order.
    ///
    /// A registration id leaves active use at most once per call: after a
    /// rotation or deactivation of an id, later deactivations of it are skipped.
    async fn apply_decisions(&self, channel: Channel, run: &mut Run) -> Vec<RegistryDecision> {
        let mut seen = HashSet::new();
        let mut retired: HashSet<String> = HashSet::new();
        let mut applied = Vec::new();

        for result in &run.results {
            let decision = RegistryDecision::for_outcome(&result.target, &result.outcome);
            let skip = match &decision {
                RegistryDecision::NoOp => true,
                RegistryDecision::Deactivate(id) => retired.contains(id),
                RegistryDecision::Rotate { .. } => seen.contains(&decision),
            };
            if skip {
                continue;
            }
            seen.insert(decision.clone());
            match &decision {
                RegistryDecision::Deactivate(id) | RegistryDecision::Rotate { old: id, .. } => {
                    retired.insert(id.clone());
                }
                RegistryDecision::NoOp => {}
            }

            let outcome = match &decision {
                RegistryDecision::Deactivate(id) => self.registry.deactivate(channel, id).await,
                RegistryDecision::Rotate { old, new } => self.registry.rotate(channel, old, new).await,
                RegistryDecision::NoOp => Ok(()),
            };

            match outcome {
                Ok(()) => applied.push(decision),
                Err(error) => {
                    warn!(channel = %channel, decision = ?decision, error = %error, "Registry update failed");
                    run.failures.push(BatchFailure::Registry { decision, error });
                }
            }
        }

        applied
    }
}

/// Builder for [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    registry: Option<Arc<dyn DeviceRegistry>>,
    credentials: Option<Arc<dyn CredentialProvider>>,
    json: Option<Arc<dyn JsonTransport>>,
    stream: Option<Arc<dyn StreamConnector>>,
    http: Option<HttpTransportConfig>,
    config: DispatchConfig,
}

impl DispatcherBuilder {
    /// Set the device registry.
    pub fn registry(mut self, registry: Arc<dyn DeviceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the credential provider.
    pub fn credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Use a custom JSON transport instead of [`HttpTransport`].
    pub fn json_transport(mut self, transport: Arc<dyn JsonTransport>) -> Self {
        self.json = Some(transport);
        self
    }

    /// Configure the default [`HttpTransport`].
    pub fn http_config(mut self, config: HttpTransportConfig) -> Self {
        self.http = Some(config);
        self
    }

    /// Use a custom streaming connector.
    pub fn stream_connector(mut self, connector: Arc<dyn StreamConnector>) -> Self {
        self.stream = Some(connector);
        self
    }

    /// Set the dispatch configuration.
    pub fn config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the dispatcher.
    ///
    /// Without an explicit JSON transport an [`HttpTransport`] is created.
    /// Without an explicit connector the TLS connector is used when the
    /// `tls` feature is enabled.
    pub fn build(self) -> Result<Dispatcher> {
        let registry = self
            .registry
            .ok_or_else(|| PushError::Config("dispatcher requires a device registry".to_string()))?;
        let credentials = self.credentials.ok_or_else(|| {
            PushError::Config("dispatcher requires a credential provider".to_string())
        })?;

        let json = match self.json {
            Some(json) => json,
            None => {
                let http = self
                    .http
                    .unwrap_or_else(|| HttpTransportConfig::default().timeout(self.config.timeout));
                Arc::new(HttpTransport::new(http)?) as Arc<dyn JsonTransport>
            }
        };

        Ok(Dispatcher {
            registry,
            credentials,
            json,
            stream: self.stream.or_else(default_connector),
            config: self.config,
        })
    }
}

#[cfg(feature = "tls")]
fn default_connector() -> Option<Arc<dyn StreamConnector>> {
    Some(Arc::new(crate::transport::TlsConnector::new()))
}

#[cfg(not(feature = "tls"))]
fn default_connector() -> Option<Arc<dyn StreamConnector>> {
    None
}
