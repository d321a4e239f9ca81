// Environment variable overrides

use crate::{ConfigError, Result};
use std::collections::HashMap;
use std::env;

/// Prefix of the push settings environment variables.
pub const DEFAULT_PREFIX: &str = "PUSH_NOTIFICATIONS";

/// Maps environment variables onto settings keys.
///
/// With the default prefix `PUSH_NOTIFICATIONS_APNS_PORT` becomes
/// `apns_port`. Variables outside the prefix are ignored.
#[derive(Debug, Clone)]
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    /// Read `{prefix}_*` variables. The separating underscore is implied.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
        }
    }

    /// Every variable is a candidate key, lowercased as is.
    pub fn unprefixed() -> Self {
        Self { prefix: None }
    }

    /// Snapshot the process environment. Non-unicode variables are skipped.
    pub fn load(&self) -> Result<HashMap<String, String>> {
        let vars = env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)));
        Ok(self.collect(vars))
    }

    /// Keep the variables under the prefix, keyed by their lowercase suffix.
    pub fn collect<I>(&self, vars: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        vars.into_iter()
            .filter_map(|(name, value)| {
                let key = self.settings_key(&name)?;
                (!key.is_empty()).then(|| (key.to_lowercase(), value))
            })
            .collect()
    }

    fn settings_key<'a>(&self, name: &'a str) -> Option<&'a str> {
        match &self.prefix {
            Some(prefix) => name.strip_prefix(prefix.as_str())?.strip_prefix('_'),
            None => Some(name),
        }
    }

    /// Environment variable name that carries settings key `key`.
    pub fn var_name(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}_{}", prefix, key.to_uppercase()),
            None => key.to_uppercase(),
        }
    }

    /// Read a single settings key from the process environment.
    pub fn var(&self, key: &str) -> Result<String> {
        let name = self.var_name(key);
        env::var(&name).map_err(|source| ConfigError::Env { name, source })
    }

    /// Like [`EnvLoader::var`], falling back to `default` when unset or not unicode.
    pub fn var_or(&self, key: &str, default: &str) -> String {
        self.var(key).unwrap_or_else(|_| default.to_string())
    }
}

impl Default for EnvLoader {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_PREFIX)
    }
}
