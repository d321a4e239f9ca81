//! Push credential settings for Herald.
//!
//! Settings are read from JSON, TOML or `.env` files and from
//! `PUSH_NOTIFICATIONS_*` environment variables. [`PushSettings`] resolves
//! per-application credentials for the dispatcher.
//!
//! ```rust,ignore
//! use herald_config::{PushSettings, Validate, EnvLoader};
//!
//! let settings = PushSettings::from_file("push.toml")?.merge_env(&EnvLoader::default())?;
//! settings.validate()?;
//! ```

pub mod env;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use env::{DEFAULT_PREFIX, EnvLoader};
pub use error::{ConfigError, Result, Violation};
pub use loader::{ConfigLoader, FileFormat};
pub use settings::PushSettings;
pub use validation::{Rules, Validate};

use std::path::Path;

/// Load settings from an optional file, overlay the environment and validate.
pub fn load_settings(path: Option<&Path>) -> Result<PushSettings> {
    let settings = match path {
        Some(path) => PushSettings::from_file(path)?,
        None => PushSettings::default(),
    };
    let settings = settings.merge_env(&EnvLoader::default())?;
    settings.validate()?;
    Ok(settings)
}
