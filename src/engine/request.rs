//! Per-call request state and the response type flowing through the pipeline.

use crate::constants;
use crate::error::Error;
use crate::merge::{deep_extend, extend_map};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Hook applied to a request body before sending, or to a response body
/// after receiving.
pub type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// The result of a call, as produced by a transport or supplied by middleware.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub data: Value,
}

impl Response {
    #[must_use]
    pub fn new(status: u16, data: Value) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            data,
        }
    }

    /// A `200` response carrying `data`.
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self::new(200, data)
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Everything a transport needs to perform one call.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpConfig {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xsrf_header_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xsrf_cookie_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<bool>,
    /// Milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_credentials: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_type: Option<String>,
    #[serde(skip)]
    pub transform_request: Vec<Transform>,
    #[serde(skip)]
    pub transform_response: Vec<Transform>,
}

impl fmt::Debug for HttpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpConfig")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("params", &self.params)
            .field("data", &self.data)
            .field("headers", &self.headers)
            .field("xsrf_header_name", &self.xsrf_header_name)
            .field("xsrf_cookie_name", &self.xsrf_cookie_name)
            .field("cache", &self.cache)
            .field("timeout", &self.timeout)
            .field("with_credentials", &self.with_credentials)
            .field("response_type", &self.response_type)
            .field("transform_request", &self.transform_request.len())
            .field("transform_response", &self.transform_response.len())
            .finish()
    }
}

/// Mutable state of one logical call.
///
/// The JSON fields hold both the transport options listed in
/// [`constants::CONFIG_KEYS`] and free-form call state such as `urlParams`
/// or values stashed by middleware. Only the former reach the transport.
#[derive(Clone, Default)]
pub struct Request {
    fields: Map<String, Value>,
    transform_request: Vec<Transform>,
    transform_response: Vec<Transform>,
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl Request {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A request seeded with a deep copy of `template`. Non-object templates
    /// seed nothing.
    #[must_use]
    pub fn from_template(template: &Value) -> Self {
        let mut request = Self::new();
        request.merge(template);
        request
    }

    /// Deep-merges `overrides` into the request fields.
    pub fn merge(&mut self, overrides: &Value) {
        if let Value::Object(source) = overrides {
            extend_map(&mut self.fields, source);
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Path placeholder values; empty when none were set.
    #[must_use]
    pub fn url_params(&self) -> Map<String, Value> {
        match self.fields.get(constants::REQUEST_URL_PARAMS) {
            Some(Value::Object(params)) => params.clone(),
            _ => Map::new(),
        }
    }

    pub fn set_url_param(&mut self, name: impl Into<String>, value: Value) {
        object_field(&mut self.fields, constants::REQUEST_URL_PARAMS).insert(name.into(), value);
    }

    /// Sets one query string parameter.
    pub fn set_param(&mut self, name: impl Into<String>, value: Value) {
        object_field(&mut self.fields, constants::CONFIG_PARAMS).insert(name.into(), value);
    }

    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        object_field(&mut self.fields, constants::CONFIG_HEADERS)
            .insert(name.into(), Value::String(value.into()));
    }

    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.fields.get(constants::CONFIG_DATA)
    }

    pub fn set_data(&mut self, data: Value) {
        self.fields.insert(constants::CONFIG_DATA.to_string(), data);
    }

    pub fn add_transform_request(&mut self, transform: Transform) {
        self.transform_request.push(transform);
    }

    pub fn add_transform_response(&mut self, transform: Transform) {
        self.transform_response.push(transform);
    }

    /// Transport configuration built from a deep copy of the recognised
    /// configuration fields. `method` and `url` are left for the caller.
    ///
    /// # Errors
    ///
    /// Returns a JSON error when a recognised field has the wrong shape,
    /// e.g. a non-numeric `timeout`.
    pub fn config(&self) -> Result<HttpConfig, Error> {
        let mut selected = Map::new();
        for key in constants::CONFIG_KEYS {
            if key == constants::CONFIG_TRANSFORM_REQUEST
                || key == constants::CONFIG_TRANSFORM_RESPONSE
            {
                continue;
            }
            if let Some(value) = self.fields.get(key).filter(|value| !value.is_null()) {
                let mut copy = Value::Null;
                deep_extend(&mut copy, value);
                selected.insert(key.to_string(), copy);
            }
        }

        let mut config: HttpConfig = serde_json::from_value(Value::Object(selected))?;
        config.transform_request.clone_from(&self.transform_request);
        config.transform_response.clone_from(&self.transform_response);
        Ok(config)
    }
}

fn object_field<'a>(fields: &'a mut Map<String, Value>, key: &str) -> &'a mut Map<String, Value> {
    let slot = fields
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    if !slot.is_object() {
        *slot = Value::Object(Map::new());
    }
    match slot {
        Value::Object(map) => map,
        _ => unreachable!("slot was just set to an object"),
    }
}

/// Re-issues a call with the live state of a request.
#[async_trait]
pub trait Replay: Send + Sync {
    async fn replay(&self, request: RequestHandle) -> Result<Response, Error>;
}

/// Shared handle on the request of one call.
///
/// Cloning is cheap; every clone sees the same request. Accessors lock for
/// the duration of the closure only, so handles may be held across awaits.
#[derive(Clone)]
pub struct RequestHandle {
    inner: Arc<Mutex<Request>>,
    replayer: Option<Arc<dyn Replay>>,
}

impl fmt::Debug for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandle")
            .field("request", &*self.lock())
            .field("replayable", &self.replayer.is_some())
            .finish()
    }
}

impl RequestHandle {
    #[must_use]
    pub fn new(request: Request) -> Self {
        Self {
            inner: Arc::new(Mutex::new(request)),
            replayer: None,
        }
    }

    #[must_use]
    pub fn with_replayer(mut self, replayer: Arc<dyn Replay>) -> Self {
        self.replayer = Some(replayer);
        self
    }

    fn lock(&self) -> MutexGuard<'_, Request> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn read<R>(&self, f: impl FnOnce(&Request) -> R) -> R {
        f(&*self.lock())
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut Request) -> R) -> R {
        f(&mut *self.lock())
    }

    /// A detached copy of the current request state.
    #[must_use]
    pub fn snapshot(&self) -> Request {
        self.lock().clone()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.lock().set(key, value);
    }

    #[must_use]
    pub fn can_replay(&self) -> bool {
        self.replayer.is_some()
    }

    /// Merges `overrides` into the request and dispatches it again.
    ///
    /// Request-stage middleware and the argument mapper are not re-run; the
    /// replay goes straight to URL compilation, the transport and the
    /// success or error stage.
    ///
    /// # Errors
    ///
    /// Returns whatever the replayed dispatch returns, or a definition error
    /// when the request was not created by a service method.
    pub async fn replay(&self, overrides: Value) -> Result<Response, Error> {
        let Some(replayer) = self.replayer.clone() else {
            return Err(Error::invalid_definition(
                "Request was not issued by a service method and cannot be replayed.",
            ));
        };
        self.update(|request| request.merge(&overrides));
        replayer.replay(self.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_keeps_only_recognised_fields() {
        let mut request = Request::from_template(&json!({
            "params": {"page": 2},
            "timeout": 1500,
            "cache": true,
            "urlParams": {"id": 1},
            "attempt": 3
        }));
        request.set_header("X-Trace", "abc");

        let config = request.config().unwrap();
        assert_eq!(config.params, Some(json!({"page": 2}).as_object().unwrap().clone()));
        assert_eq!(config.timeout, Some(1500));
        assert_eq!(config.cache, Some(true));
        assert_eq!(config.headers.unwrap()["X-Trace"], json!("abc"));
        assert!(config.method.is_empty());
        assert!(config.url.is_empty());
    }

    #[test]
    fn test_config_is_a_deep_copy() {
        let request = Request::from_template(&json!({"data": {"name": "a"}}));
        let mut config = request.config().unwrap();
        config.data = Some(json!({"name": "b"}));
        assert_eq!(request.data(), Some(&json!({"name": "a"})));
    }

    #[test]
    fn test_config_rejects_badly_typed_fields() {
        let request = Request::from_template(&json!({"timeout": "soon"}));
        assert!(matches!(request.config(), Err(Error::Json(_))));
    }

    #[test]
    fn test_url_params_default_to_empty() {
        let mut request = Request::new();
        assert!(request.url_params().is_empty());
        request.set_url_param("id", json!(5));
        assert_eq!(request.url_params().get("id"), Some(&json!(5)));
    }

    #[tokio::test]
    async fn test_replay_without_replayer_is_rejected() {
        let handle = RequestHandle::new(Request::new());
        assert!(!handle.can_replay());
        assert!(handle.replay(json!({})).await.is_err());
    }

    #[test]
    fn test_handle_clones_share_state() {
        let handle = RequestHandle::new(Request::new());
        let other = handle.clone();
        other.set("token", json!("t"));
        assert_eq!(handle.get("token"), Some(json!("t")));
    }
}
