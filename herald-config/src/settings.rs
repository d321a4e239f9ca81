// Push credential settings

use crate::{ConfigError, ConfigLoader, EnvLoader, FileFormat, Result, Rules, Validate};
use herald_push::credentials::{APNS_HOST, APNS_PORT, APNS_SANDBOX_HOST};
use herald_push::dispatch::DEFAULT_MAX_RECIPIENTS;
use herald_push::transport::{FCM_POST_URL, GCM_POST_URL};
use herald_push::wire::DEFAULT_MAX_FRAME_PAYLOAD;
use herald_push::{
    Channel, Credential, CredentialError, CredentialProvider, DispatchConfig, HttpTransportConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Push credential and transport settings.
///
/// Per-application maps (`gcm_api_keys`, `apns_certificates`, ...) are only
/// read from JSON and TOML files; environment variables carry scalar keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushSettings {
    /// Default GCM server key.
    pub gcm_api_key: Option<String>,
    /// GCM server keys by application id.
    pub gcm_api_keys: HashMap<String, String>,
    /// Default FCM server key.
    pub fcm_api_key: Option<String>,
    /// FCM server keys by application id.
    pub fcm_api_keys: HashMap<String, String>,
    pub gcm_post_url: String,
    pub fcm_post_url: String,
    /// Default APNS client certificate (PEM with key).
    pub apns_certificate: Option<PathBuf>,
    /// APNS certificates by application id.
    pub apns_certificates: HashMap<String, PathBuf>,
    /// Gateway host override. Unset picks the production or sandbox gateway.
    pub apns_host: Option<String>,
    /// Gateway hosts by application id.
    pub apns_hosts: HashMap<String, String>,
    pub apns_port: u16,
    /// Gateway ports by application id.
    pub apns_ports: HashMap<String, u16>,
    /// Use the sandbox gateway when no host is set.
    pub apns_use_sandbox: bool,
    /// Bound on every POST, connect and frame write.
    pub timeout_secs: u64,
    /// Recipients per JSON request.
    pub max_recipients: usize,
    /// Largest APNS payload in bytes.
    pub apns_max_payload_size: usize,
}

impl Default for PushSettings {
    fn default() -> Self {
        Self {
            gcm_api_key: None,
            gcm_api_keys: HashMap::new(),
            fcm_api_key: None,
            fcm_api_keys: HashMap::new(),
            gcm_post_url: GCM_POST_URL.to_string(),
            fcm_post_url: FCM_POST_URL.to_string(),
            apns_certificate: None,
            apns_certificates: HashMap::new(),
            apns_host: None,
            apns_hosts: HashMap::new(),
            apns_port: APNS_PORT,
            apns_ports: HashMap::new(),
            apns_use_sandbox: false,
            timeout_secs: 30,
            max_recipients: DEFAULT_MAX_RECIPIENTS,
            apns_max_payload_size: DEFAULT_MAX_FRAME_PAYLOAD,
        }
    }
}

impl PushSettings {
    /// Load settings from a JSON, TOML or `.env` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let loader = ConfigLoader::auto(&path)?;
        let value = loader.load_file(&path)?;

        match loader.format() {
            FileFormat::Env => {
                let vars = value
                    .as_object()
                    .into_iter()
                    .flatten()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())));
                let mut settings = Self::default();
                settings.apply_vars(&EnvLoader::default().collect(vars))?;
                Ok(settings)
            }
            FileFormat::Json | FileFormat::Toml => serde_json::from_value(value)
                .map_err(|e| ConfigError::Shape(e.to_string())),
        }
    }

    /// Load settings from `PUSH_NOTIFICATIONS_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().merge_env(&EnvLoader::default())
    }

    /// Load a `.env` file into the process environment, then read it.
    ///
    /// A missing default `.env` file is not an error.
    pub fn from_dotenv(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                dotenvy::from_path(path)?;
            }
            None => {
                dotenvy::dotenv().ok();
            }
        }
        Self::from_env()
    }

    /// Overlay environment variables from `loader` onto these settings.
    pub fn merge_env(mut self, loader: &EnvLoader) -> Result<Self> {
        let vars = loader.load()?;
        self.apply_vars(&vars)?;
        Ok(self)
    }

    /// Overlay already normalized (lowercase, unprefixed) variables.
    pub fn apply_vars(&mut self, vars: &HashMap<String, String>) -> Result<()> {
        for (key, value) in vars {
            match key.as_str() {
                "gcm_api_key" => self.gcm_api_key = Some(value.clone()),
                "fcm_api_key" => self.fcm_api_key = Some(value.clone()),
                "gcm_post_url" => self.gcm_post_url = value.clone(),
                "fcm_post_url" => self.fcm_post_url = value.clone(),
                "apns_certificate" => self.apns_certificate = Some(PathBuf::from(value)),
                "apns_host" => self.apns_host = Some(value.clone()),
                "apns_port" => self.apns_port = parse_var(key, value)?,
                "apns_use_sandbox" => self.apns_use_sandbox = parse_flag(key, value)?,
                "timeout_secs" => self.timeout_secs = parse_var(key, value)?,
                "max_recipients" => self.max_recipients = parse_var(key, value)?,
                "apns_max_payload_size" => self.apns_max_payload_size = parse_var(key, value)?,
                _ => continue,
            }
            debug!(key = %key, "Applied push setting from environment");
        }
        Ok(())
    }

    /// Transport timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// HTTP transport settings for the JSON channels.
    pub fn http_transport_config(&self) -> HttpTransportConfig {
        HttpTransportConfig::default()
            .gcm_url(self.gcm_post_url.clone())
            .fcm_url(self.fcm_post_url.clone())
            .timeout(self.timeout())
    }

    /// Dispatch tuning.
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig::default()
            .timeout(self.timeout())
            .max_recipients(self.max_recipients)
            .max_frame_payload(self.apns_max_payload_size)
    }

    fn default_apns_host(&self) -> &str {
        match (&self.apns_host, self.apns_use_sandbox) {
            (Some(host), _) => host,
            (None, true) => APNS_SANDBOX_HOST,
            (None, false) => APNS_HOST,
        }
    }

    fn api_key(
        channel: Channel,
        default: &Option<String>,
        per_app: &HashMap<String, String>,
        application_id: Option<&str>,
    ) -> std::result::Result<Credential, CredentialError> {
        let key = match application_id {
            Some(app) => per_app.get(app),
            None => default.as_ref(),
        };
        key.map(Credential::api_key).ok_or_else(|| not_found(channel, application_id))
    }

    fn apns(&self, application_id: Option<&str>) -> std::result::Result<Credential, CredentialError> {
        let certificate = match application_id {
            Some(app) => self.apns_certificates.get(app),
            None => self.apns_certificate.as_ref(),
        }
        .ok_or_else(|| not_found(Channel::Apns, application_id))?;

        let host = application_id
            .and_then(|app| self.apns_hosts.get(app))
            .map(String::as_str)
            .unwrap_or_else(|| self.default_apns_host());
        let port = application_id
            .and_then(|app| self.apns_ports.get(app).copied())
            .unwrap_or(self.apns_port);

        Ok(Credential::certificate(certificate.clone()).host(host).port(port))
    }
}

fn not_found(channel: Channel, application_id: Option<&str>) -> CredentialError {
    CredentialError::NotFound {
        channel: channel.to_string(),
        application_id: application_id.map(str::to_string),
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        message: e.to_string(),
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            message: "expected a boolean".to_string(),
        }),
    }
}

impl CredentialProvider for PushSettings {
    fn resolve(
        &self,
        channel: Channel,
        application_id: Option<&str>,
    ) -> std::result::Result<Credential, CredentialError> {
        match channel {
            Channel::Gcm => Self::api_key(channel, &self.gcm_api_key, &self.gcm_api_keys, application_id),
            Channel::Fcm => Self::api_key(channel, &self.fcm_api_key, &self.fcm_api_keys, application_id),
            Channel::Apns => self.apns(application_id),
        }
    }
}

impl Validate for PushSettings {
    fn validate(&self) -> Result<()> {
        let mut rules = Rules::new();
        rules
            .endpoint("gcm_post_url", &self.gcm_post_url)
            .endpoint("fcm_post_url", &self.fcm_post_url)
            .bounded("timeout_secs", self.timeout_secs, 1..=3600)
            .bounded("max_recipients", self.max_recipients, 1..=DEFAULT_MAX_RECIPIENTS)
            .bounded(
                "apns_max_payload_size",
                self.apns_max_payload_size,
                1..=usize::from(u16::MAX),
            )
            .port("apns_port", self.apns_port);

        if let Some(key) = &self.gcm_api_key {
            rules.present("gcm_api_key", key);
        }
        if let Some(key) = &self.fcm_api_key {
            rules.present("fcm_api_key", key);
        }
        for (app, key) in &self.gcm_api_keys {
            rules.present(&format!("gcm_api_keys.{app}"), key);
        }
        for (app, key) in &self.fcm_api_keys {
            rules.present(&format!("fcm_api_keys.{app}"), key);
        }
        if let Some(host) = &self.apns_host {
            rules.present("apns_host", host);
        }
        for (app, port) in &self.apns_ports {
            rules.port(&format!("apns_ports.{app}"), *port);
        }
        let endpoint_apps: BTreeSet<&String> =
            self.apns_hosts.keys().chain(self.apns_ports.keys()).collect();
        for app in endpoint_apps {
            rules.require(
                &format!("apns_certificates.{app}"),
                self.apns_certificates.contains_key(app),
                "is required when an apns endpoint is configured for the application",
            );
        }
        rules.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let settings = PushSettings::default();
        assert_eq!(settings.gcm_post_url, GCM_POST_URL);
        assert_eq!(settings.apns_port, 2195);
        assert_eq!(settings.max_recipients, 1000);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_resolve_api_keys() {
        let mut settings = PushSettings {
            fcm_api_key: Some("default".to_string()),
            ..PushSettings::default()
        };
        settings
            .fcm_api_keys
            .insert("qwerty".to_string(), "qwerty-key".to_string());

        let default = settings.resolve(Channel::Fcm, None).unwrap();
        assert_eq!(default.api_key.as_deref(), Some("default"));

        let app = settings.resolve(Channel::Fcm, Some("qwerty")).unwrap();
        assert_eq!(app.api_key.as_deref(), Some("qwerty-key"));

        // Application ids never fall back to the default key.
        assert!(matches!(
            settings.resolve(Channel::Fcm, Some("other")),
            Err(CredentialError::NotFound { .. })
        ));
        assert!(settings.resolve(Channel::Gcm, None).is_err());
    }

    #[test]
    fn test_resolve_apns_endpoints() {
        let mut settings = PushSettings {
            apns_certificate: Some(PathBuf::from("/certs/default.pem")),
            apns_use_sandbox: true,
            ..PushSettings::default()
        };
        settings
            .apns_certificates
            .insert("app".to_string(), PathBuf::from("/certs/app.pem"));
        settings.apns_hosts.insert("app".to_string(), "localhost".to_string());
        settings.apns_ports.insert("app".to_string(), 2196);

        let default = settings.resolve(Channel::Apns, None).unwrap();
        assert_eq!(default.host.as_deref(), Some(APNS_SANDBOX_HOST));
        assert_eq!(default.port, Some(2195));

        let app = settings.resolve(Channel::Apns, Some("app")).unwrap();
        assert_eq!(app.certificate, Some(PathBuf::from("/certs/app.pem")));
        assert_eq!(app.host.as_deref(), Some("localhost"));
        assert_eq!(app.port, Some(2196));

        assert!(settings.resolve(Channel::Apns, Some("missing")).is_err());
    }

    #[test]
    fn test_apply_vars() {
        let mut settings = PushSettings::default();
        settings
            .apply_vars(&vars(&[
                ("gcm_api_key", "abc"),
                ("apns_port", "2196"),
                ("apns_use_sandbox", "true"),
                ("timeout_secs", "5"),
                ("unrelated", "ignored"),
            ]))
            .unwrap();

        assert_eq!(settings.gcm_api_key.as_deref(), Some("abc"));
        assert_eq!(settings.apns_port, 2196);
        assert!(settings.apns_use_sandbox);
        assert_eq!(settings.dispatch_config().timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_apply_vars_rejects_bad_numbers() {
        let mut settings = PushSettings::default();
        let err = settings
            .apply_vars(&vars(&[("apns_port", "not-a-port")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "apns_port"));

        assert!(settings.apply_vars(&vars(&[("apns_use_sandbox", "maybe")])).is_err());
    }

    #[test]
    fn test_validation_failures() {
        let settings = PushSettings {
            max_recipients: 5000,
            ..PushSettings::default()
        };
        assert!(settings.validate().is_err());

        let settings = PushSettings {
            gcm_post_url: "android.googleapis.com".to_string(),
            ..PushSettings::default()
        };
        assert!(settings.validate().is_err());

        let mut settings = PushSettings::default();
        settings.apns_hosts.insert("app".to_string(), "localhost".to_string());
        settings.apns_ports.insert("app".to_string(), 0);
        let err = settings.validate().unwrap_err();
        assert_eq!(err.rejected_fields(), vec!["apns_ports.app", "apns_certificates.app"]);
    }

    #[test]
    fn test_http_transport_config() {
        let settings = PushSettings {
            fcm_post_url: "http://localhost:9000/fcm/send".to_string(),
            ..PushSettings::default()
        };
        let http = settings.http_transport_config();
        assert_eq!(http.fcm_url, "http://localhost:9000/fcm/send");
        assert_eq!(http.gcm_url, GCM_POST_URL);
    }
}
