use crate::constants;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_base_url() -> String {
    constants::DEFAULT_BASE_URL.to_string()
}

/// Settings of an [`Api`](crate::api::Api) and of its default transport.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Prefix for every relative URL. Always ends with `/` once normalised.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Default timeout applied by the HTTP transport, in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Headers sent with every call.
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: None,
            headers: HashMap::new(),
        }
    }
}

impl ApiConfig {
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}
