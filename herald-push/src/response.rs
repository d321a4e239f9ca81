//! JSON channel response processing.
//!
//! A cloud messaging response carries no recipient ids, only a `results`
//! array aligned by position with the request's `registration_ids`. Each
//! entry is classified into an [`Outcome`], and each outcome yields one
//! [`RegistryDecision`].

use serde::Deserialize;

use crate::{DeviceErrorKind, EncodingError, ServiceErrorKind, Target, TransportError};

/// Why a target never reached the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndeliveredReason {
    /// The payload for this target could not be encoded.
    Encoding(EncodingError),
    /// The target's credential group hit a transport failure.
    Transport(TransportError),
}

/// Per-recipient outcome of a dispatch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Accepted by the service.
    Delivered {
        /// Service message id. The streaming channel has none.
        message_id: Option<String>,
    },
    /// Device-specific failure; the device gets deactivated.
    DeviceError(DeviceErrorKind),
    /// Service-level failure; raised after the call.
    ServiceError(ServiceErrorKind),
    /// Delivered, and the service reported a canonical id to use instead.
    IdentifierRotated {
        /// Registration id the message was sent to.
        old: String,
        /// Canonical registration id.
        new: String,
    },
    /// Never reached the service.
    Undelivered(UndeliveredReason),
}

impl Outcome {
    /// Whether the message was accepted by the service.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. } | Self::IdentifierRotated { .. })
    }

    /// Whether the device should be marked inactive.
    pub fn should_deactivate(&self) -> bool {
        matches!(self, Self::DeviceError(_))
    }
}

/// Outcome for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchResult {
    /// The recipient.
    pub target: Target,
    /// What happened to it.
    pub outcome: Outcome,
}

impl DispatchResult {
    /// Registration id of the recipient.
    pub fn registration_id(&self) -> &str {
        &self.target.registration_id
    }
}

/// Registry mutation derived from an outcome.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegistryDecision {
    /// Mark the device inactive.
    Deactivate(String),
    /// Replace `old` with `new`.
    Rotate {
        /// Current registration id.
        old: String,
        /// Canonical registration id.
        new: String,
    },
    /// Leave the registry untouched.
    NoOp,
}

impl RegistryDecision {
    /// Derive the decision for an outcome.
    pub fn for_outcome(target: &Target, outcome: &Outcome) -> Self {
        match outcome {
            Outcome::DeviceError(_) => Self::Deactivate(target.registration_id.clone()),
            Outcome::IdentifierRotated { old, new } => Self::Rotate {
                old: old.clone(),
                new: new.clone(),
            },
            Outcome::Delivered { .. } | Outcome::ServiceError(_) | Outcome::Undelivered(_) => {
                Self::NoOp
            }
        }
    }
}

/// Parsed JSON channel response.
#[derive(Debug, Clone, Deserialize)]
pub struct CloudResponse {
    /// Number of accepted messages.
    #[serde(default)]
    pub success: u64,
    /// Number of failed messages.
    #[serde(default)]
    pub failure: u64,
    /// Number of canonical id rewrites.
    #[serde(default)]
    pub canonical_ids: Option<u64>,
    /// Per-recipient results in request order.
    pub results: Vec<ResultEntry>,
}

/// One entry of a response's `results` array.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultEntry {
    /// Service message id on success.
    pub message_id: Option<String>,
    /// Canonical registration id.
    pub registration_id: Option<String>,
    /// Error code on failure.
    pub error: Option<String>,
}

/// Parse a raw JSON channel response.
pub fn parse_response(raw: &[u8]) -> Result<CloudResponse, TransportError> {
    serde_json::from_slice(raw).map_err(|e| TransportError::MalformedResponse(e.to_string()))
}

/// Classify one result entry for the registration id sent at its position.
pub fn classify(original: &str, entry: &ResultEntry) -> Outcome {
    if let Some(code) = entry.error.as_deref() {
        return match DeviceErrorKind::from_code(code) {
            Some(kind) => Outcome::DeviceError(kind),
            None => Outcome::ServiceError(ServiceErrorKind::from_code(code)),
        };
    }

    match (&entry.message_id, &entry.registration_id) {
        (Some(_), Some(canonical)) if canonical != original => Outcome::IdentifierRotated {
            old: original.to_string(),
            new: canonical.clone(),
        },
        (Some(message_id), _) => Outcome::Delivered {
            message_id: Some(message_id.clone()),
        },
        (None, _) => Outcome::ServiceError(ServiceErrorKind::Unknown(
            "missing message_id".to_string(),
        )),
    }
}

/// Classified results and registry decisions for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessedBatch {
    /// One result per target, in request order.
    pub results: Vec<DispatchResult>,
    /// One decision per target, in request order.
    pub decisions: Vec<RegistryDecision>,
}

impl ProcessedBatch {
    /// Targets that hit a service-level error.
    pub fn service_errors(&self) -> impl Iterator<Item = (&Target, &ServiceErrorKind)> {
        self.results.iter().filter_map(|r| match &r.outcome {
            Outcome::ServiceError(kind) => Some((&r.target, kind)),
            _ => None,
        })
    }
}

/// Parse a raw response and align it with the request's targets.
pub fn process_response(targets: &[Target], raw: &[u8]) -> Result<ProcessedBatch, TransportError> {
    let response = parse_response(raw)?;
    if response.results.len() != targets.len() {
        return Err(TransportError::MalformedResponse(format!(
            "expected {} results, got {}",
            targets.len(),
            response.results.len()
        )));
    }

    let mut batch = ProcessedBatch::default();
    for (target, entry) in targets.iter().zip(&response.results) {
        let outcome = classify(&target.registration_id, entry);
        batch
            .decisions
            .push(RegistryDecision::for_outcome(target, &outcome));
        batch.results.push(DispatchResult {
            target: target.clone(),
            outcome,
        });
    }

    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIPLE_ERROR_B: &str = r#"{"success":1, "failure": 2, "canonical_ids": 0,
        "cast_id": 6358665107659088804, "results": [{"error": "MismatchSenderId"},
        {"message_id": "0:1433830664381654%3449593ff9fd7ecd"}, {"error": "InvalidRegistration"}]}"#;

    fn targets(ids: &[&str]) -> Vec<Target> {
        ids.iter().map(|id| Target::new(*id)).collect()
    }

    #[test]
    fn test_classify_delivered() {
        let entry = ResultEntry {
            message_id: Some("1:08".into()),
            ..Default::default()
        };
        assert_eq!(
            classify("abc", &entry),
            Outcome::Delivered {
                message_id: Some("1:08".into())
            }
        );
    }

    #[test]
    fn test_classify_rotation() {
        let entry = ResultEntry {
            message_id: Some("1".into()),
            registration_id: Some("NEW_ID".into()),
            error: None,
        };
        assert_eq!(
            classify("foo", &entry),
            Outcome::IdentifierRotated {
                old: "foo".into(),
                new: "NEW_ID".into()
            }
        );
    }

    #[test]
    fn test_classify_self_rotation_is_delivery() {
        let entry = ResultEntry {
            message_id: Some("1".into()),
            registration_id: Some("bar".into()),
            error: None,
        };
        let outcome = classify("bar", &entry);
        assert!(matches!(outcome, Outcome::Delivered { .. }));
        assert_eq!(
            RegistryDecision::for_outcome(&Target::new("bar"), &outcome),
            RegistryDecision::NoOp
        );
    }

    #[test]
    fn test_classify_errors() {
        let entry = |code: &str| ResultEntry {
            error: Some(code.into()),
            ..Default::default()
        };

        assert_eq!(
            classify("a", &entry("NotRegistered")),
            Outcome::DeviceError(DeviceErrorKind::Unregistered)
        );
        assert_eq!(
            classify("a", &entry("InvalidRegistration")),
            Outcome::DeviceError(DeviceErrorKind::InvalidIdentifier)
        );
        assert!(classify("a", &entry("NotRegistered")).should_deactivate());
        assert!(!classify("a", &entry("MismatchSenderId")).should_deactivate());
        assert_eq!(
            classify("a", &entry("MismatchSenderId")),
            Outcome::ServiceError(ServiceErrorKind::SenderMismatch)
        );
        assert_eq!(
            classify("a", &entry("Brand New Code")),
            Outcome::ServiceError(ServiceErrorKind::Unknown("Brand New Code".into()))
        );
    }

    #[test]
    fn test_classify_empty_entry_is_service_error() {
        assert!(matches!(
            classify("a", &ResultEntry::default()),
            Outcome::ServiceError(ServiceErrorKind::Unknown(_))
        ));
    }

    #[test]
    fn test_process_mixed_batch() {
        let batch = process_response(&targets(&["abc", "abc1", "abc2"]), MULTIPLE_ERROR_B.as_bytes())
            .unwrap();

        assert_eq!(
            batch.decisions,
            vec![
                RegistryDecision::NoOp,
                RegistryDecision::NoOp,
                RegistryDecision::Deactivate("abc2".into()),
            ]
        );
        let service: Vec<&str> = batch
            .service_errors()
            .map(|(t, _)| t.registration_id.as_str())
            .collect();
        assert_eq!(service, vec!["abc"]);
    }

    #[test]
    fn test_process_device_error_yields_one_deactivation() {
        let raw = br#"{"success":1,"failure":1,"results":[{"error":"NotRegistered"},{"message_id":"0:1"}]}"#;
        let batch = process_response(&targets(&["abc", "abc1"]), raw).unwrap();

        let deactivations: Vec<_> = batch
            .decisions
            .iter()
            .filter(|d| matches!(d, RegistryDecision::Deactivate(_)))
            .collect();
        assert_eq!(deactivations, vec![&RegistryDecision::Deactivate("abc".into())]);
        assert_eq!(batch.service_errors().count(), 0);
    }

    #[test]
    fn test_process_rejects_misaligned_results() {
        let raw = br#"{"success":1,"failure":0,"results":[{"message_id":"1"}]}"#;
        let err = process_response(&targets(&["a", "b"]), raw).unwrap_err();
        assert!(matches!(err, TransportError::MalformedResponse(_)));
    }

    #[test]
    fn test_process_rejects_malformed_json() {
        for raw in [&b"not json"[..], br#"{"success":1}"#, b""] {
            let err = process_response(&targets(&["a"]), raw).unwrap_err();
            assert!(matches!(err, TransportError::MalformedResponse(_)));
        }
    }

    #[test]
    fn test_parse_counts() {
        let raw = br#"{"multicast_id":108,"success":2,"failure":0,"canonical_ids":0,"results":[{"message_id":"1:08"},{"message_id":"1:09"}]}"#;
        let response = parse_response(raw).unwrap();
        assert_eq!(response.success, 2);
        assert_eq!(response.failure, 0);
        assert_eq!(response.canonical_ids, Some(0));
        assert_eq!(response.results.len(), 2);
    }
}
