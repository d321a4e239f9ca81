// Settings file loaders

use crate::{ConfigError, Result};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

/// On-disk settings formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
    /// `KEY=value` lines, as read by dotenv.
    Env,
}

impl FileFormat {
    const ALL: [FileFormat; 3] = [FileFormat::Json, FileFormat::Toml, FileFormat::Env];

    pub fn name(self) -> &'static str {
        match self {
            FileFormat::Json => "json",
            FileFormat::Toml => "toml",
            FileFormat::Env => "env",
        }
    }

    /// Case-insensitive lookup by extension, without the dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|format| ext.eq_ignore_ascii_case(format.name()))
    }

    /// Format of `path`. A bare `.env` file counts as `Env`.
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name == ".env" {
            return Some(FileFormat::Env);
        }
        Self::from_extension(path.extension()?.to_str()?)
    }
}

/// Reads one settings file into a JSON table.
#[derive(Debug, Clone, Copy)]
pub struct ConfigLoader {
    format: FileFormat,
}

impl ConfigLoader {
    pub fn new(format: FileFormat) -> Self {
        Self { format }
    }

    /// Pick the loader from the file name.
    pub fn auto(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        FileFormat::detect(path)
            .map(Self::new)
            .ok_or_else(|| ConfigError::UnsupportedFile(path.to_path_buf()))
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        debug!(path = %path.display(), format = self.format.name(), "Reading push settings");

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse(&content)
    }

    /// Parse `content`. The root must be a table; `Env` values are always strings.
    pub fn parse(&self, content: &str) -> Result<Value> {
        let table = match self.format {
            FileFormat::Json => match serde_json::from_str::<Value>(content).map_err(|e| self.malformed(e))? {
                Value::Object(table) => table,
                _ => return Err(self.malformed("root must be a table of keys")),
            },
            FileFormat::Toml => {
                let table: toml::Table = toml::from_str(content).map_err(|e| self.malformed(e))?;
                match serde_json::to_value(table).map_err(|e| self.malformed(e))? {
                    Value::Object(table) => table,
                    _ => return Err(self.malformed("root must be a table of keys")),
                }
            }
            FileFormat::Env => dotenvy::from_read_iter(content.as_bytes())
                .map(|entry| entry.map(|(key, value)| (key, Value::String(value))))
                .collect::<std::result::Result<Map<_, _>, _>>()
                .map_err(|e| self.malformed(e))?,
        };

        Ok(Value::Object(table))
    }

    fn malformed(&self, err: impl std::fmt::Display) -> ConfigError {
        ConfigError::Malformed {
            format: self.format.name(),
            message: err.to_string(),
        }
    }
}
