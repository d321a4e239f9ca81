// Canned cloud messaging responses

use serde_json::{Value, json};

pub const GCM_JSON_RESPONSE: &str =
    r#"{"cast_id":108,"success":1,"failure":0,"canonical_ids":0,"results":[{"message_id":"1:08"}]}"#;

pub const GCM_JSON_RESPONSE_ERROR_NOTREGISTERED: &str = r#"{"success":1, "failure": 1, "canonical_ids": 0, "cast_id": 6358665107659088804, "results": [{"error": "NotRegistered"}, {"message_id": "0:1433830664381654%3449593ff9fd7ecd"}]}"#;

pub const GCM_JSON_RESPONSE_ERROR_INVALIDREGISTRATION: &str = r#"{"success":1, "failure": 1, "canonical_ids": 0, "cast_id": 6358665107659088804, "results": [{"error": "InvalidRegistration"}, {"message_id": "0:1433830664381654%3449593ff9fd7ecd"}]}"#;

pub const GCM_JSON_RESPONSE_ERROR_MISMATCHSENDERID: &str =
    r#"{"success":0, "failure": 1, "canonical_ids": 0, "results": [{"error": "MismatchSenderId"}]}"#;

pub const GCM_JSON_CANONICAL_ID_RESPONSE: &str = r#"{"failure":0,"canonical_ids":1,"success":1,"cast_id":7173139966327257000,"results":[{"registration_id":"NEW_REGISTRATION_ID","message_id":"0:1440068396670935%6868637df9fd7ecd"}]}"#;

pub const GCM_JSON_CANONICAL_ID_SAME_DEVICE_RESPONSE: &str = r#"{"failure":0,"canonical_ids":1,"success":1,"cast_id":7173139966327257000,"results":[{"registration_id":"bar","message_id":"0:1440068396670935%6868637df9fd7ecd"}]}"#;

pub const GCM_JSON_MULTIPLE_RESPONSE: &str = r#"{"multicast_id":108,"success":2,"failure":0,"canonical_ids":0,"results":[{"message_id":"1:08"}, {"message_id": "1:09"}]}"#;

pub const GCM_JSON_MULTIPLE_RESPONSE_ERROR: &str = r#"{"success":1, "failure": 2, "canonical_ids": 0, "cast_id": 6358665107659088804, "results": [{"error": "NotRegistered"}, {"message_id": "0:1433830664381654%3449593ff9fd7ecd"}, {"error": "InvalidRegistration"}]}"#;

pub const GCM_JSON_MULTIPLE_RESPONSE_ERROR_B: &str = r#"{"success":1, "failure": 2, "canonical_ids": 0, "cast_id": 6358665107659088804, "results": [{"error": "MismatchSenderId"}, {"message_id": "0:1433830664381654%3449593ff9fd7ecd"}, {"error": "InvalidRegistration"}]}"#;

pub const GCM_JSON_MULTIPLE_CANONICAL_ID_RESPONSE: &str = r#"{"failure":0,"canonical_ids":1,"success":2,"multicast_id":7173139966327257000,"results":[{"registration_id":"NEW_REGISTRATION_ID","message_id":"0:1440068396670935%6868637df9fd7ecd"},{"message_id":"0:1440068396670937%6868637df9fd7ecd"}]}"#;

pub const GCM_JSON_MULTIPLE_CANONICAL_ID_SAME_DEVICE_RESPONSE: &str = r#"{"failure":0,"canonical_ids":1,"success":2,"multicast_id":7173139966327257000,"results":[{"registration_id":"bar","message_id":"0:1440068396670935%6868637df9fd7ecd"},{"message_id":"0:1440068396670937%6868637df9fd7ecd"}]}"#;

/// Builds a cloud messaging response one result at a time.
///
/// ```
/// use herald_testing::ResponseBuilder;
///
/// let body = ResponseBuilder::new()
///     .error("NotRegistered")
///     .delivered()
///     .canonical("NEW_ID")
///     .build();
/// assert!(body.contains(r#""canonical_ids":1"#));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ResponseBuilder {
    results: Vec<Value>,
    next_id: u64,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn message_id(&mut self) -> String {
        self.next_id += 1;
        format!("0:{}", self.next_id)
    }

    /// Append a successful result.
    pub fn delivered(mut self) -> Self {
        let id = self.message_id();
        self.results.push(json!({ "message_id": id }));
        self
    }

    /// Append a successful result carrying a canonical registration id.
    pub fn canonical(mut self, registration_id: &str) -> Self {
        let id = self.message_id();
        self.results
            .push(json!({ "message_id": id, "registration_id": registration_id }));
        self
    }

    /// Append a failed result.
    pub fn error(mut self, code: &str) -> Self {
        self.results.push(json!({ "error": code }));
        self
    }

    /// Append a raw result entry.
    pub fn raw(mut self, entry: Value) -> Self {
        self.results.push(entry);
        self
    }

    /// Serialize the response body.
    pub fn build(&self) -> String {
        let success = self
            .results
            .iter()
            .filter(|r| r.get("message_id").is_some())
            .count();
        let canonical = self
            .results
            .iter()
            .filter(|r| r.get("registration_id").is_some())
            .count();

        json!({
            "multicast_id": 108,
            "success": success,
            "failure": self.results.len() - success,
            "canonical_ids": canonical,
            "results": self.results,
        })
        .to_string()
    }
}
