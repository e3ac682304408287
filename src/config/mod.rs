//! Loading and validating [`ApiConfig`].

pub mod models;

pub use models::ApiConfig;

use crate::constants;
use crate::error::Error;
use std::path::Path;

/// Appends a trailing `/` unless present. An empty URL becomes `/`.
#[must_use]
pub fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    }
}

impl ApiConfig {
    /// # Errors
    ///
    /// Returns a TOML error for malformed input and a configuration error
    /// when the parsed values are invalid.
    pub fn from_toml_str(content: &str) -> Result<Self, Error> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a TOML file. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be read, and the
    /// errors of [`ApiConfig::from_toml_str`].
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Applies `CORK_API_BASE_URL` and `CORK_API_TIMEOUT_MS`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a non-numeric timeout.
    pub fn with_env_overrides(self) -> Result<Self, Error> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides read through `lookup`, keyed by environment
    /// variable name.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for a non-numeric timeout.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        if let Some(base_url) = lookup(constants::ENV_BASE_URL) {
            self.base_url = base_url;
        }
        if let Some(raw) = lookup(constants::ENV_TIMEOUT_MS) {
            let timeout = raw.trim().parse::<u64>().map_err(|e| {
                Error::invalid_config(format!("{} '{raw}': {e}", constants::ENV_TIMEOUT_MS))
            })?;
            self.timeout_ms = Some(timeout);
        }
        self.validate()?;
        Ok(self)
    }

    /// # Errors
    ///
    /// Returns a configuration error for a zero timeout or a blank header
    /// name.
    pub fn validate(&self) -> Result<(), Error> {
        if self.timeout_ms == Some(0) {
            return Err(Error::invalid_config("timeout_ms must be greater than zero"));
        }
        if self.headers.keys().any(|name| name.trim().is_empty()) {
            return Err(Error::invalid_config("header names must not be empty"));
        }
        Ok(())
    }
}
