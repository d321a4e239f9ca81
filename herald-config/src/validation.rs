// Settings validation

use crate::error::Violation;
use crate::{ConfigError, Result};
use std::fmt::Display;
use std::ops::RangeInclusive;
use url::Url;

/// Settings that can check themselves before use.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Accumulates rule violations so a single error names every bad field.
///
/// ```
/// use herald_config::Rules;
///
/// let mut rules = Rules::new();
/// rules
///     .endpoint("fcm_post_url", "https://fcm.googleapis.com/fcm/send")
///     .port("apns_port", 0);
/// assert_eq!(rules.finish().unwrap_err().rejected_fields(), vec!["apns_port"]);
/// ```
#[derive(Debug, Default)]
pub struct Rules {
    violations: Vec<Violation>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation unless `ok` holds.
    pub fn require(&mut self, field: &str, ok: bool, reason: impl Into<String>) -> &mut Self {
        if !ok {
            self.violations.push(Violation {
                field: field.to_string(),
                reason: reason.into(),
            });
        }
        self
    }

    /// Value must contain something other than whitespace.
    pub fn present(&mut self, field: &str, value: &str) -> &mut Self {
        self.require(field, !value.trim().is_empty(), "must not be blank")
    }

    /// Value must be an absolute http(s) URL with a host.
    pub fn endpoint(&mut self, field: &str, value: &str) -> &mut Self {
        let ok = Url::parse(value)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.host().is_some())
            .unwrap_or(false);
        self.require(field, ok, "is not an http(s) endpoint")
    }

    pub fn port(&mut self, field: &str, value: u16) -> &mut Self {
        self.require(field, value != 0, "must not be 0")
    }

    pub fn bounded<T>(&mut self, field: &str, value: T, range: RangeInclusive<T>) -> &mut Self
    where
        T: PartialOrd + Display,
    {
        let reason = format!(
            "must be within {}..={}, got {}",
            range.start(),
            range.end(),
            value
        );
        self.require(field, range.contains(&value), reason)
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn finish(self) -> Result<()> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Rejected(self.violations))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_rules_pass() {
        let mut rules = Rules::new();
        rules
            .present("gcm_api_key", "abc")
            .endpoint("gcm_post_url", "https://android.googleapis.com/gcm/send")
            .endpoint("fcm_post_url", "http://localhost:9000/fcm/send")
            .port("apns_port", 2195)
            .bounded("timeout_secs", 30, 1..=3600);

        assert!(rules.is_clean());
        assert!(rules.finish().is_ok());
    }

    #[test]
    fn test_every_violation_is_reported() {
        let mut rules = Rules::new();
        rules
            .present("apns_host", "   ")
            .endpoint("gcm_post_url", "android.googleapis.com")
            .endpoint("fcm_post_url", "ftp://fcm.googleapis.com")
            .bounded("max_recipients", 1001, 1..=1000);

        let err = rules.finish().unwrap_err();
        assert_eq!(
            err.rejected_fields(),
            vec!["apns_host", "gcm_post_url", "fcm_post_url", "max_recipients"]
        );
        assert!(err.to_string().contains("max_recipients must be within 1..=1000, got 1001"));
    }

    #[test]
    fn test_port_zero_is_rejected() {
        let mut rules = Rules::new();
        rules.port("apns port for qwerty", 0);
        assert!(!rules.is_clean());
        assert!(rules.finish().unwrap_err().is_rejected());
    }
}
