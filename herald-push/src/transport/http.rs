//! reqwest-backed JSON channel transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, warn};
use url::Url;

use super::{JsonRequest, JsonTransport};
use crate::wire::JSON_CONTENT_TYPE;
use crate::{Channel, PushError, Result, TransportError};

/// Default GCM endpoint.
pub const GCM_POST_URL: &str = "https://android.googleapis.com/gcm/send";

/// Default FCM endpoint.
pub const FCM_POST_URL: &str = "https://fcm.googleapis.com/fcm/send";

/// HTTP transport configuration.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// GCM endpoint.
    pub gcm_url: String,
    /// FCM endpoint.
    pub fcm_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// User agent string.
    pub user_agent: String,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            gcm_url: GCM_POST_URL.to_string(),
            fcm_url: FCM_POST_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: format!("herald-push/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpTransportConfig {
    /// Override the GCM endpoint.
    pub fn gcm_url(mut self, url: impl Into<String>) -> Self {
        self.gcm_url = url.into();
        self
    }

    /// Override the FCM endpoint.
    pub fn fcm_url(mut self, url: impl Into<String>) -> Self {
        self.fcm_url = url.into();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// JSON channel transport over HTTPS.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    gcm_url: Url,
    fcm_url: Url,
}

impl HttpTransport {
    /// Create a transport, validating both endpoints.
    pub fn new(config: HttpTransportConfig) -> Result<Self> {
        let gcm_url = parse_endpoint(&config.gcm_url)?;
        let fcm_url = parse_endpoint(&config.fcm_url)?;

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| PushError::Config(e.to_string()))?;

        Ok(Self {
            client,
            gcm_url,
            fcm_url,
        })
    }

    /// Endpoint for a JSON channel.
    pub fn endpoint(&self, channel: Channel) -> Option<&Url> {
        match channel {
            Channel::Gcm => Some(&self.gcm_url),
            Channel::Fcm => Some(&self.fcm_url),
            Channel::Apns => None,
        }
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| PushError::Config(format!("invalid endpoint {raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(PushError::Config(format!(
            "unsupported endpoint scheme {scheme} in {raw}"
        ))),
    }
}

#[async_trait]
impl JsonTransport for HttpTransport {
    async fn post(&self, request: JsonRequest) -> std::result::Result<Vec<u8>, TransportError> {
        let url = self.endpoint(request.channel).ok_or_else(|| {
            TransportError::Unreachable(format!("{} has no HTTP endpoint", request.channel))
        })?;

        debug!(channel = %request.channel, url = %url, bytes = request.body.len(), "Posting push request");

        let response = self
            .client
            .post(url.clone())
            .header(AUTHORIZATION, format!("key={}", request.api_key))
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .body(request.body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            warn!(channel = %request.channel, status = status.as_u16(), "Push service rejected request");
            return Err(TransportError::ServiceUnavailable {
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}
