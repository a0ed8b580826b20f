//! Layered configuration for the toggles service.
//!
//! Values are collected from configuration files, `.env` files and the
//! process environment into a flat key space. Later layers override earlier
//! ones, so the usual order is file, then `.env`, then environment.
//!
//! ```
//! use toggles_config::ConfigManager;
//!
//! let mut config = ConfigManager::with_prefix("TOGGLES");
//! config.set("max_connections", 4).unwrap();
//! assert_eq!(config.get_parsed::<u32>("max_connections").unwrap(), 4);
//! ```

pub mod env;
pub mod error;
pub mod loader;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use validation::{ConfigValidator, Validate};

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// Flat key/value configuration store
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    values: HashMap<String, Value>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            values: HashMap::new(),
            env_prefix: Some(prefix.into()),
        }
    }

    fn env_loader(&self) -> EnvLoader {
        EnvLoader::new(self.env_prefix.clone())
    }

    /// Overlay the process environment
    pub fn load_env(&mut self) -> &mut Self {
        let vars = self.env_loader().load();
        self.extend_strings(vars);
        self
    }

    /// Overlay a `.env` file, then the process environment.
    ///
    /// Without an explicit path a missing `.env` in the working directory is
    /// not an error. The file is read without touching the process
    /// environment.
    pub fn load_dotenv(&mut self, path: Option<&Path>) -> Result<&mut Self> {
        let pairs = match path {
            Some(path) => {
                let iter = dotenvy::from_path_iter(path).map_err(|e| {
                    ConfigError::LoadError(format!("{}: {}", path.display(), e))
                })?;
                collect_dotenv(iter)?
            }
            None => match dotenvy::dotenv_iter() {
                Ok(iter) => collect_dotenv(iter)?,
                Err(e) if e.not_found() => Vec::new(),
                Err(e) => return Err(ConfigError::LoadError(e.to_string())),
            },
        };

        let vars = self.env_loader().collect(pairs);
        self.extend_strings(vars);
        Ok(self.load_env())
    }

    /// Overlay a configuration file of the given format.
    ///
    /// Nested tables are flattened into dotted keys (`database.url`).
    pub fn load_file(&mut self, path: impl AsRef<Path>, format: FileFormat) -> Result<&mut Self> {
        let data = ConfigLoader::new(format).load_file(path.as_ref())?;

        match format {
            FileFormat::Env => {
                let pairs = match data {
                    Value::Object(map) => map
                        .into_iter()
                        .map(|(k, v)| (k, value_to_string(&v)))
                        .collect::<Vec<_>>(),
                    _ => Vec::new(),
                };
                let vars = self.env_loader().collect(pairs);
                self.extend_strings(vars);
            }
            FileFormat::Json | FileFormat::Toml => match data {
                Value::Object(map) => {
                    for (key, value) in map {
                        self.insert_flattened(key, value);
                    }
                }
                _ => {
                    return Err(ConfigError::ParseError(format!(
                        "{}: top level must be a table",
                        path.as_ref().display()
                    )));
                }
            },
        }

        Ok(self)
    }

    /// Overlay a configuration file, picking the format from its extension
    pub fn load_auto(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let format = FileFormat::from_path(path.as_ref())?;
        self.load_file(path, format)
    }

    fn insert_flattened(&mut self, key: String, value: Value) {
        match value {
            Value::Object(map) => {
                for (child, value) in map {
                    self.insert_flattened(format!("{}.{}", key, child), value);
                }
            }
            other => {
                self.values.insert(key, other);
            }
        }
    }

    fn extend_strings(&mut self, vars: HashMap<String, String>) {
        self.values
            .extend(vars.into_iter().map(|(k, v)| (k, Value::String(v))));
    }

    /// Set a configuration value
    pub fn set<T: serde::Serialize>(&mut self, key: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Deserialize a value as stored.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.raw(key)?;
        serde_json::from_value(value.clone()).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })
    }

    /// Get a configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// Get a value rendered as a string, whatever its stored type
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.raw(key).map(value_to_string)
    }

    /// Parse a value with [`FromStr`].
    ///
    /// Environment layers only carry strings, so this is the accessor to use
    /// for numbers and flags.
    pub fn get_parsed<T>(&self, key: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.get_string(key)?;
        raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("'{}': {}", raw, e),
        })
    }

    /// Like [`get_parsed`](Self::get_parsed), falling back when the key is absent.
    ///
    /// A present but malformed value is still an error.
    pub fn get_parsed_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        if self.has(key) {
            self.get_parsed(key)
        } else {
            Ok(default)
        }
    }

    fn raw(&self, key: &str) -> Result<&Value> {
        self.values
            .get(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))
    }

    /// Check if a key exists
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// All configuration keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.values.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Deserialize every value into `T` and run its validation.
    ///
    /// Values are taken as stored, so numbers coming from the environment
    /// must be declared as strings in `T` or read with
    /// [`get_parsed`](Self::get_parsed) instead.
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let object: serde_json::Map<String, Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let loaded: T = serde_json::from_value(Value::Object(object))
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        loaded.validate()?;
        Ok(loaded)
    }
}

fn collect_dotenv<R: std::io::Read>(iter: dotenvy::Iter<R>) -> Result<Vec<(String, String)>> {
    iter.map(|item| item.map_err(|e| ConfigError::ParseError(e.to_string())))
        .collect()
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
